//! Bridge a Tesla account's vehicle and wall connector to a home automation entity model.
#![warn(missing_docs)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::use_self)]

pub mod coordinator;
pub mod devices;
pub mod entities;
pub mod pipes;
pub mod services;
pub mod timings;

#[cfg(test)]
mod testing;

use std::future::Future;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Spawn a task and automatically monitor its execution.
pub fn spawn<T>(future: T) -> JoinHandle<()>
where
    T: Future + Send + 'static,
    T::Output: Send + 'static,
{
    let task = tokio::spawn(future);

    tokio::spawn(async move {
        let rc = task.await;

        match rc {
            Ok(_rc) => {
                debug!("The task terminated normally");
            }
            Err(err) if err.is_cancelled() => {
                debug!("The task was cancelled");
            }
            Err(err) => {
                error!("The task aborted with error: {err}");
                std::process::exit(1);
            }
        };
    })
}
