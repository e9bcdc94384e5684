//! Best-effort location detection.
//!
//! An ordered list of [`LocationStrategy`] values is tried one at a time; the
//! first that yields a place wins. A stage's failure is logged and the next
//! stage runs. Only total exhaustion is reported, as `LocationUnresolved`.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    Config,
    error::{PositionError, Result, WeatherError},
    model::{LocationSource, LocationTarget, ResolvedLocation},
};

pub mod device;
pub mod geo;
pub mod stages;

use device::PositionSource;
use geo::GeoClient;
use stages::{DeviceGpsStage, IpCityStage, IpGeolocationStage};

/// Why a single stage produced nothing.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Service(#[from] WeatherError),

    #[error("device position: {0}")]
    Position(#[from] PositionError),

    #[error("no usable place: {0}")]
    NoPlace(String),
}

#[async_trait]
pub trait LocationStrategy: Send + Sync {
    fn source(&self) -> LocationSource;

    async fn attempt(&self) -> std::result::Result<LocationTarget, StageError>;
}

pub struct LocationResolver {
    stages: Vec<Box<dyn LocationStrategy>>,
}

impl LocationResolver {
    pub fn new(stages: Vec<Box<dyn LocationStrategy>>) -> Self {
        Self { stages }
    }

    /// IP geolocation, then device GPS, then IP-to-city.
    pub fn standard(config: &Config, device: Arc<dyn PositionSource>) -> Result<Self> {
        let geo = GeoClient::from_config(config)?;

        Ok(Self::new(vec![
            Box::new(IpGeolocationStage::new(geo.clone())),
            Box::new(DeviceGpsStage::new(device, geo.clone(), config.gps_timeout())),
            Box::new(IpCityStage::new(geo)),
        ]))
    }

    pub async fn resolve(&self) -> Result<ResolvedLocation> {
        for stage in &self.stages {
            let source = stage.source();
            debug!(%source, "trying location source");

            match stage.attempt().await {
                Ok(target) => {
                    let resolved = ResolvedLocation { target, source };
                    info!(location = %resolved, "location resolved");
                    return Ok(resolved);
                }
                Err(e) => warn!(%source, error = %e, "location source failed"),
            }
        }

        Err(WeatherError::LocationUnresolved)
    }
}
