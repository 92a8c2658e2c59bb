//! Refresh a device on a fixed schedule and publish its data.
use std::sync::Arc;

use thiserror::Error;
use tokio::{
    select,
    sync::mpsc,
    task::JoinHandle,
    time::{interval, timeout, MissedTickBehavior},
};
use tracing::{debug, error, info};

use crate::{
    devices::Device,
    pipes::{stateless, PIPE_SIZE},
    spawn,
    timings::Timings,
};

/// Published after every refresh.
#[derive(Debug, Clone)]
pub enum Update<T> {
    /// The latest data, which may be stale if the refresh failed.
    Data(Option<Arc<T>>),

    /// The refresh token was rejected. Polling stops until resumed.
    ReauthRequired,
}

/// The refresh token was rejected and the user needs to log in again.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Reauthentication required")]
pub struct ReauthRequired;

/// A command to send to a running coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Refresh now.
    Refresh,
    /// Start polling again after a reauthentication.
    Resume,
    /// Stop the coordinator.
    Shutdown,
}

/// Refreshes one device.
pub struct Coordinator<D: Device> {
    name: String,
    device: Arc<D>,
    timings: Timings,
}

impl<D: Device> Coordinator<D> {
    /// Create a coordinator for a device.
    pub fn new(device: Arc<D>, timings: Timings) -> Self {
        let name = device.device_id().to_string();
        Self {
            name,
            device,
            timings,
        }
    }

    /// Refresh the device once.
    ///
    /// Any failure other than a rejected refresh token gives the last known data.
    ///
    /// # Errors
    ///
    /// Returns `ReauthRequired` if the refresh token was rejected.
    pub async fn update(&self) -> Result<Option<Arc<D::Data>>, ReauthRequired> {
        let name = &self.name;

        match timeout(self.timings.coordinator_timeout, self.device.fetch()).await {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(err)) if err.is_auth_failure() => {
                error!("{name}: Reauthentication required: {err}");
                Err(ReauthRequired)
            }
            Ok(Err(err)) => {
                error!("{name}: Error updating data: {err}");
                Ok(self.device.current_data())
            }
            Err(_) => {
                error!("{name}: Timeout updating data");
                Ok(self.device.current_data())
            }
        }
    }

    /// Publish one refresh, returns true if polling should be suspended.
    async fn tick(&self, tx: &stateless::Sender<Update<D::Data>>) -> bool {
        match self.update().await {
            Ok(data) => {
                tx.try_send(Update::Data(data));
                false
            }
            Err(ReauthRequired) => {
                tx.try_send(Update::ReauthRequired);
                true
            }
        }
    }

    /// Run the coordinator until shutdown.
    ///
    /// The first refresh happens straight away. Subscribe to the pipe before calling this to
    /// see it.
    #[must_use]
    pub fn run(self, tx: stateless::Sender<Update<D::Data>>) -> (Handle, JoinHandle<()>) {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(PIPE_SIZE);
        let handle = Handle {
            name: self.name.clone(),
            tx: cmd_tx,
        };

        let join = spawn(async move {
            let name = self.name.clone();
            debug!("{name}: Starting coordinator");

            let mut timer = interval(self.timings.update_interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut suspended = false;

            loop {
                select! {
                    _ = timer.tick() => {
                        if suspended {
                            debug!("{name}: Suspended, waiting for reauthentication");
                        } else {
                            suspended = self.tick(&tx).await;
                        }
                    }
                    Some(command) = cmd_rx.recv() => {
                        match command {
                            Command::Refresh if suspended => {
                                debug!("{name}: Suspended, ignoring refresh");
                            }
                            Command::Refresh => {
                                suspended = self.tick(&tx).await;
                            }
                            Command::Resume => {
                                info!("{name}: Resuming");
                                suspended = self.tick(&tx).await;
                                timer.reset();
                            }
                            Command::Shutdown => {
                                info!("{name}: Shutting down");
                                break;
                            }
                        }
                    }
                }
            }
        });

        (handle, join)
    }
}

/// Control a running coordinator.
#[derive(Debug, Clone)]
pub struct Handle {
    name: String,
    tx: mpsc::Sender<Command>,
}

impl Handle {
    async fn send(&self, command: Command) {
        if let Err(err) = self.tx.send(command).await {
            error!("{}: Coordinator is not running: {err}", self.name);
        }
    }

    /// Refresh now.
    pub async fn refresh(&self) {
        self.send(Command::Refresh).await;
    }

    /// Start polling again, after the refresh token was replaced.
    pub async fn resume(&self) {
        self.send(Command::Resume).await;
    }

    /// Stop the coordinator. A refresh in progress is allowed to finish.
    pub async fn shutdown(&self) {
        self.send(Command::Shutdown).await;
    }
}
