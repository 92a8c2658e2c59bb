//! In-memory owner API for device tests.
#![allow(clippy::unwrap_used)]

use std::{collections::VecDeque, sync::Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tesla_connector_common::vehicle::ChargingState;
use tokio::time::Instant;

use crate::services::tesla::api::{self, Api, Command, Response};

/// What the fake answers to the next call.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(Value),
    Slow(std::time::Duration, Value),
    Rejected(&'static str),
    Status(u16),
    TokenInvalid,
    Hang,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    VehicleData,
    WakeUp,
    Command(Command),
    WallConnector,
}

#[derive(Debug, Clone, Copy)]
pub struct Call {
    pub kind: CallKind,
    pub at: Instant,
}

#[derive(Default)]
struct Inner {
    vehicle_data: VecDeque<Reply>,
    wake_up: VecDeque<Reply>,
    commands: VecDeque<Reply>,
    wall_connector: VecDeque<Reply>,
    calls: Vec<Call>,
}

/// Scripted replies per endpoint, with sensible defaults once a script runs out.
#[derive(Default)]
pub struct FakeApi {
    inner: Mutex<Inner>,
}

pub fn vehicle_payload(state: &str, charging_state: ChargingState) -> Value {
    json!({
        "state": state,
        "charge_state": {
            "battery_level": 55,
            "charge_amps": 16,
            "charge_limit_soc": 80,
            "charging_state": charging_state.as_str(),
        },
        "vehicle_state": {
            "odometer": 1000.0,
            "locked": true,
        },
    })
}

impl FakeApi {
    pub fn push_vehicle_data(&self, reply: Reply) {
        self.inner.lock().unwrap().vehicle_data.push_back(reply);
    }

    pub fn push_wake_up(&self, reply: Reply) {
        self.inner.lock().unwrap().wake_up.push_back(reply);
    }

    pub fn push_command(&self, reply: Reply) {
        self.inner.lock().unwrap().commands.push_back(reply);
    }

    pub fn push_wall_connector(&self, reply: Reply) {
        self.inner.lock().unwrap().wall_connector.push_back(reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn kinds(&self) -> Vec<CallKind> {
        self.calls().iter().map(|call| call.kind).collect()
    }

    pub fn count(&self, wanted: fn(&CallKind) -> bool) -> usize {
        self.calls().iter().filter(|call| wanted(&call.kind)).count()
    }

    async fn answer(&self, kind: CallKind) -> Result<Response, api::Error> {
        let reply = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(Call {
                kind,
                at: Instant::now(),
            });
            let queue = match kind {
                CallKind::VehicleData => &mut inner.vehicle_data,
                CallKind::WakeUp => &mut inner.wake_up,
                CallKind::Command(_) => &mut inner.commands,
                CallKind::WallConnector => &mut inner.wall_connector,
            };
            queue.pop_front()
        };

        let reply = reply.unwrap_or_else(|| match kind {
            CallKind::VehicleData => Reply::Ok(json!({
                "response": vehicle_payload("online", ChargingState::NotCharging)
            })),
            CallKind::WakeUp => Reply::Ok(json!({ "response": { "state": "online" } })),
            CallKind::Command(_) => Reply::Ok(json!({ "response": { "result": true, "reason": "" } })),
            CallKind::WallConnector => Reply::Ok(json!({ "response": { "wall_connectors": [] } })),
        });

        match reply {
            Reply::Ok(body) => Ok(Response::from_body(body)),
            Reply::Slow(delay, body) => {
                tokio::time::sleep(delay).await;
                Ok(Response::from_body(body))
            }
            Reply::Rejected(reason) => Ok(Response::from_body(json!({
                "response": { "result": false, "reason": reason }
            }))),
            Reply::Status(status) => Err(api::Error::Http {
                status: StatusCode::from_u16(status).unwrap(),
                url: "http://fake".to_string(),
            }),
            Reply::TokenInvalid => Err(api::Error::TokenInvalid),
            Reply::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl Api for FakeApi {
    async fn get_vehicle_data(&self, _vin: &str) -> Result<Response, api::Error> {
        self.answer(CallKind::VehicleData).await
    }

    async fn wake_up(&self, _vin: &str) -> Result<Response, api::Error> {
        self.answer(CallKind::WakeUp).await
    }

    async fn send_command(&self, _vin: &str, command: Command) -> Result<Response, api::Error> {
        self.answer(CallKind::Command(command)).await
    }

    async fn get_wall_connector_status(&self, _site_id: &str) -> Result<Response, api::Error> {
        self.answer(CallKind::WallConnector).await
    }
}
