//! A wall connector attached to an energy site.
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use tesla_connector_common::wall_connector::WallConnectorData;
use tokio::sync::Mutex;
use tracing::debug;

use super::{Device, DeviceId, Error};
use crate::services::tesla::api::Api;

/// A Tesla wall connector.
///
/// Wall connectors don't sleep, so every refresh is a live request.
pub struct WallConnector {
    id: DeviceId,
    api: Arc<dyn Api>,
    data: ArcSwapOption<WallConnectorData>,
    guard: Mutex<()>,
}

impl std::fmt::Debug for WallConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WallConnector")
            .field("id", &self.id)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

impl WallConnector {
    /// Create a wall connector for an energy site.
    pub fn new(site_id: impl Into<String>, api: Arc<dyn Api>) -> Self {
        Self {
            id: DeviceId::new(site_id),
            api,
            data: ArcSwapOption::empty(),
            guard: Mutex::new(()),
        }
    }

    /// The last known data.
    #[must_use]
    pub fn current_data(&self) -> Option<Arc<WallConnectorData>> {
        self.data.load_full()
    }

    /// Get the live status of the wall connector.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call failed.
    pub async fn get_wall_connector_data(&self) -> Result<Arc<WallConnectorData>, Error> {
        let _guard = self.guard.lock().await;
        let site_id = self.id.as_str();

        let response = self.api.get_wall_connector_status(site_id).await?;
        let data = Arc::new(WallConnectorData::decode(&response.data));
        debug!("{site_id}: Got wall connector data: {data:?}");
        self.data.store(Some(data.clone()));
        Ok(data)
    }
}

#[async_trait]
impl Device for WallConnector {
    type Data = WallConnectorData;

    fn device_id(&self) -> &DeviceId {
        &self.id
    }

    fn current_data(&self) -> Option<Arc<WallConnectorData>> {
        WallConnector::current_data(self)
    }

    async fn fetch(&self) -> Result<Option<Arc<WallConnectorData>>, Error> {
        self.get_wall_connector_data().await.map(Some)
    }
}
