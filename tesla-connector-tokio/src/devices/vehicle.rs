//! A vehicle that is allowed to sleep.
//!
//! Polling the owner API keeps the modem awake and drains the battery, so the
//! vehicle is only polled while it is charging and for a while after the last
//! command. Commands wake the vehicle first and are retried a few times.
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tesla_connector_common::{
    datetime::duration,
    vehicle::{ChargingState, VehicleData, OFFLINE, ONLINE},
};
use tokio::{
    sync::Mutex,
    time::{sleep, timeout, Instant},
};
use tracing::{debug, error, info, warn};

use super::{Device, DeviceId, Error};
use crate::{
    services::tesla::api::{Api, Command, Response},
    timings::Timings,
};

#[derive(Debug, Default)]
struct Timestamps {
    last_wake_up: Option<Instant>,
    last_command_send: Option<Instant>,
}

#[derive(Debug, Clone, Copy)]
enum PollMode<'a> {
    AllowSkip(&'a Timestamps),
    Live,
}

/// A Tesla vehicle.
pub struct Vehicle {
    id: DeviceId,
    api: Arc<dyn Api>,
    timings: Timings,
    data: ArcSwapOption<VehicleData>,

    // Held for the whole of every refresh or command.
    timestamps: Mutex<Timestamps>,
}

impl std::fmt::Debug for Vehicle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vehicle")
            .field("id", &self.id)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

impl Vehicle {
    /// Create a vehicle with no data.
    pub fn new(vin: impl Into<String>, api: Arc<dyn Api>, timings: Timings) -> Self {
        Self {
            id: DeviceId::new(vin),
            api,
            timings,
            data: ArcSwapOption::empty(),
            timestamps: Mutex::new(Timestamps::default()),
        }
    }

    /// The vehicle identification number.
    #[must_use]
    pub fn vin(&self) -> &str {
        self.id.as_str()
    }

    /// The last known data.
    #[must_use]
    pub fn current_data(&self) -> Option<Arc<VehicleData>> {
        self.data.load_full()
    }

    /// Refresh the vehicle data, unless the vehicle should be left to sleep.
    ///
    /// The vehicle is not polled if no command was sent for a while, or if it is
    /// not charging. In that case the last snapshot is returned marked offline.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call failed with anything but a request timeout.
    pub async fn get_vehicle_data(&self) -> Result<Option<Arc<VehicleData>>, Error> {
        let timestamps = self.timestamps.lock().await;
        self.poll(PollMode::AllowSkip(&timestamps)).await
    }

    /// Wake the vehicle if it may be asleep.
    ///
    /// # Errors
    ///
    /// Returns an error if the wake up failed or timed out.
    pub async fn ensure_car_woke_up(&self, force: bool) -> Result<(), Error> {
        let mut timestamps = self.timestamps.lock().await;
        self.ensure_awake(&mut timestamps, force).await
    }

    /// Send a command, waking the vehicle and retrying as required.
    ///
    /// # Errors
    ///
    /// Returns an error if the vehicle couldn't be woken or every attempt failed.
    pub async fn send_command(&self, command: Command) -> Result<Response, Error> {
        let mut timestamps = self.timestamps.lock().await;
        self.send_command_locked(&mut timestamps, command).await
    }

    /// Start charging and wait until the vehicle reports it is charging.
    ///
    /// # Errors
    ///
    /// Returns an error if the command failed or charging didn't start in time.
    pub async fn start_charge(&self) -> Result<(), Error> {
        let mut timestamps = self.timestamps.lock().await;
        self.send_command_locked(&mut timestamps, Command::ChargeStart)
            .await?;
        self.wait_charging_state(ChargingState::Charging).await
    }

    /// Stop charging and wait until the vehicle reports it has stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if the command failed or charging didn't stop in time.
    pub async fn stop_charge(&self) -> Result<(), Error> {
        let mut timestamps = self.timestamps.lock().await;
        self.send_command_locked(&mut timestamps, Command::ChargeStop)
            .await?;
        self.wait_charging_state(ChargingState::Stopped).await
    }

    /// Set the charge limit in percent.
    ///
    /// # Errors
    ///
    /// Returns an error if the command failed.
    pub async fn set_charge_limit(&self, percent: u8) -> Result<(), Error> {
        self.send_command(Command::SetChargeLimit(percent)).await?;
        Ok(())
    }

    /// Set the charging current in amps.
    ///
    /// # Errors
    ///
    /// Returns an error if the command failed.
    pub async fn set_charge_amps(&self, amps: u8) -> Result<(), Error> {
        self.send_command(Command::SetChargingAmps(amps)).await?;
        Ok(())
    }

    /// Lock the doors.
    ///
    /// # Errors
    ///
    /// Returns an error if the command failed.
    pub async fn lock_doors(&self) -> Result<(), Error> {
        self.send_command(Command::DoorLock).await?;
        Ok(())
    }

    /// Unlock the doors.
    ///
    /// # Errors
    ///
    /// Returns an error if the command failed.
    pub async fn unlock_doors(&self) -> Result<(), Error> {
        self.send_command(Command::DoorUnlock).await?;
        Ok(())
    }

    fn should_skip(&self, timestamps: &Timestamps) -> bool {
        let now = Instant::now();

        let sleeping = timestamps
            .last_command_send
            .is_some_and(|sent| now.duration_since(sent) > self.timings.sleep_threshold);

        let not_charging = self
            .data
            .load()
            .as_ref()
            .is_some_and(|data| !data.charge_state.charging_state.is_charging());

        sleeping || not_charging
    }

    fn mark_offline(&self) -> Option<Arc<VehicleData>> {
        let current = self.data.load_full()?;
        let mut data = (*current).clone();
        data.mark_offline();
        let data = Arc::new(data);
        self.data.store(Some(data.clone()));
        Some(data)
    }

    async fn poll(&self, mode: PollMode<'_>) -> Result<Option<Arc<VehicleData>>, Error> {
        let vin = self.vin();

        let skip = match mode {
            PollMode::AllowSkip(timestamps) => self.should_skip(timestamps),
            PollMode::Live => false,
        };

        if skip {
            debug!("{vin}: Letting the vehicle sleep, not polling");
            return Ok(self.mark_offline());
        }

        match self.api.get_vehicle_data(vin).await {
            Ok(response) => {
                let data = Arc::new(VehicleData::decode(&response.data));
                debug!("{vin}: Got vehicle data: {data:?}");
                self.data.store(Some(data.clone()));
                Ok(Some(data))
            }
            Err(err) if err.status() == Some(StatusCode::REQUEST_TIMEOUT) => {
                info!("{vin}: Vehicle is not reachable, marking offline");
                Ok(self.mark_offline())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn wake_up_required(&self, timestamps: &Timestamps, force: bool) -> bool {
        let now = Instant::now();

        let stale_wake_up = timestamps
            .last_wake_up
            .is_none_or(|woken| now.duration_since(woken) > self.timings.wake_up_threshold);

        let offline = self
            .data
            .load()
            .as_ref()
            .is_none_or(|data| data.is_offline());

        force || stale_wake_up || offline
    }

    async fn ensure_awake(&self, timestamps: &mut Timestamps, force: bool) -> Result<(), Error> {
        if !self.wake_up_required(timestamps, force) {
            return Ok(());
        }

        self.wake_up().await?;

        let now = Instant::now();
        timestamps.last_wake_up = Some(now);
        timestamps.last_command_send = Some(now);
        Ok(())
    }

    /// Ask the vehicle to wake up until it is online.
    ///
    /// No new attempt is started once the wake up timeout has passed, but an attempt
    /// already running is allowed to finish.
    async fn wake_up(&self) -> Result<(), Error> {
        let vin = self.vin();
        info!("{vin}: Trying to wake up");

        let wake_up_timeout = self.timings.wake_up_timeout;
        let backoff = self.timings.wake_up_poll_backoff;
        let started = Instant::now();

        while started.elapsed() < wake_up_timeout {
            let response = self.api.wake_up(vin).await?;
            let state = response
                .data
                .get("state")
                .and_then(Value::as_str)
                .unwrap_or(OFFLINE);

            if state == ONLINE {
                info!("{vin}: Vehicle is online");
                // Give the vehicle a moment before sending anything.
                sleep(backoff).await;
                return Ok(());
            }

            debug!("{vin}: Vehicle is {state}, waiting");
            sleep(backoff).await;
        }

        error!(
            "{vin}: Vehicle did not wake up within {}",
            duration::to_string(&wake_up_timeout)
        );
        Err(Error::WakeUpTimeout(wake_up_timeout))
    }

    async fn send_command_locked(
        &self,
        timestamps: &mut Timestamps,
        command: Command,
    ) -> Result<Response, Error> {
        let vin = self.vin();
        self.ensure_awake(timestamps, false).await?;

        let attempts = self.timings.command_retries.max(1);
        let command_timeout = self.timings.command_timeout;
        let mut attempt = 1;

        loop {
            let started = Instant::now();
            let result = timeout(command_timeout, self.api.send_command(vin, command)).await;

            let err = match result {
                Ok(Ok(response)) if response.result => {
                    timestamps.last_command_send = Some(Instant::now());
                    info!(
                        "{vin}: Command {command} succeeded in {:.3}s",
                        started.elapsed().as_secs_f64()
                    );
                    return Ok(response);
                }
                Ok(Ok(response)) => Error::CommandRejected {
                    vin: vin.to_string(),
                    command,
                    reason: response.reason,
                },
                Ok(Err(err)) => {
                    error!("{vin}: Command {command} failed: {err}");
                    return Err(err.into());
                }
                Err(_) => Error::CommandTimeout {
                    command,
                    duration: command_timeout,
                },
            };

            if attempt >= attempts {
                error!("{vin}: Giving up after {attempt} attempts: {err}");
                return Err(err);
            }

            warn!("{vin}: Attempt {attempt}/{attempts} failed: {err}, retrying");
            sleep(self.timings.command_retry_backoff).await;
            attempt += 1;
        }
    }

    async fn wait_charging_state(&self, wanted: ChargingState) -> Result<(), Error> {
        let vin = self.vin();
        let deadline = Instant::now() + self.timings.charging_state_wait;

        loop {
            sleep(self.timings.charging_state_poll_interval).await;

            let data = self.poll(PollMode::Live).await?;
            let state = data.map(|data| data.charge_state.charging_state);
            if state == Some(wanted) {
                info!("{vin}: Charging state is now {wanted}");
                return Ok(());
            }

            if Instant::now() >= deadline {
                warn!("{vin}: Charging state is {state:?}, wanted {wanted}");
                return Err(Error::StateNotReached(wanted));
            }
        }
    }
}

#[async_trait]
impl Device for Vehicle {
    type Data = VehicleData;

    fn device_id(&self) -> &DeviceId {
        &self.id
    }

    fn current_data(&self) -> Option<Arc<VehicleData>> {
        Vehicle::current_data(self)
    }

    async fn fetch(&self) -> Result<Option<Arc<VehicleData>>, Error> {
        self.get_vehicle_data().await
    }
}
