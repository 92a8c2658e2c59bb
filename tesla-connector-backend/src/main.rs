//! Poll a Tesla vehicle and wall connector and publish their entities.
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod logging;

use std::sync::Arc;

use anyhow::Result;
use tesla_connector_tokio::{
    coordinator::{Coordinator, Handle, Update},
    devices::{vehicle::Vehicle, wall_connector::WallConnector, Device, DeviceId},
    entities::{self, Description, Field, VEHICLE_ENTITIES, WALL_CONNECTOR_ENTITIES},
    pipes::stateless,
    services::{
        persistent_state::PersistentStateDatabase,
        tesla::{api::Client, token::StoredToken},
    },
    spawn,
    timings::Timings,
};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use self::config::Environment;

#[tokio::main]
async fn main() -> Result<()> {
    color_backtrace::install();

    let env = Environment::load()?;
    let config = env.config()?;

    logging::init_tracing_subscriber(&config.logging)?;
    info!("Starting for vehicle {}", config.tesla.vin);

    let psd = PersistentStateDatabase::new(&config.persistent_state)?;
    let token_store = psd.for_name::<StoredToken>("tesla_token");

    let refresh_token = match token_store.load() {
        Ok(token) => {
            info!("Using refresh token saved at {}", token.updated_at);
            token.refresh_token
        }
        Err(err) if err.is_not_found() => config.tesla.refresh_token.clone(),
        Err(err) => {
            warn!("Can't load saved refresh token, using configured token: {err}");
            config.tesla.refresh_token.clone()
        }
    };

    let client =
        Arc::new(Client::new(config.tesla.api.clone(), refresh_token).with_token_store(token_store));

    let vehicle = Arc::new(Vehicle::new(
        config.tesla.vin.clone(),
        client.clone(),
        config.timings.clone(),
    ));

    if let Err(err) = vehicle.ensure_car_woke_up(false).await {
        error!("{}: Can't wake up vehicle: {err}", vehicle.vin());
    }

    let mut running = vec![start(vehicle, &config.timings, VEHICLE_ENTITIES).await];

    if let Some(site_id) = &config.tesla.wall_connector_id {
        let wall_connector = Arc::new(WallConnector::new(site_id.clone(), client.clone()));
        running.push(start(wall_connector, &config.timings, WALL_CONNECTOR_ENTITIES).await);
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    for (handle, _) in &running {
        handle.shutdown().await;
    }
    for (_, join) in running {
        join.await?;
    }

    Ok(())
}

/// Start refreshing a device, logging its entities after every update.
async fn start<D, F>(
    device: Arc<D>,
    timings: &Timings,
    descriptions: &'static [Description<F>],
) -> (Handle, JoinHandle<()>)
where
    D: Device,
    F: Field<Data = D::Data> + Send + Sync + 'static,
{
    let device_id = device.device_id().clone();
    let (tx, rx) = stateless::create_pipe(device_id.to_string());
    let mut sub = rx.subscribe().await;

    spawn(async move {
        while let Ok(update) = sub.recv().await {
            publish(&device_id, descriptions, &update);
        }
    });

    Coordinator::new(device, timings.clone()).run(tx)
}

fn publish<F: Field>(
    device_id: &DeviceId,
    descriptions: &[Description<F>],
    update: &Update<F::Data>,
) {
    match update {
        Update::Data(data) => {
            for description in descriptions {
                let state = entities::render(device_id, description, data.as_deref());
                info!("{state}");
            }
        }
        Update::ReauthRequired => {
            warn!("{device_id}: Refresh token rejected, update the refresh token and restart");
        }
    }
}
