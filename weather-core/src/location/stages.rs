use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tokio::time;
use tracing::debug;

use crate::{
    error::PositionError,
    model::{LocationSource, LocationTarget, PlaceQuery},
};

use super::{
    LocationStrategy, StageError,
    device::PositionSource,
    geo::GeoClient,
};

fn place(name: &str) -> Result<LocationTarget, StageError> {
    Ok(LocationTarget::Place(PlaceQuery::parse(name)?))
}

/// IP position, reverse geocoded; falls back to the country's capital.
#[derive(Debug, Clone)]
pub struct IpGeolocationStage {
    geo: GeoClient,
}

impl IpGeolocationStage {
    pub fn new(geo: GeoClient) -> Self {
        Self { geo }
    }
}

#[async_trait]
impl LocationStrategy for IpGeolocationStage {
    fn source(&self) -> LocationSource {
        LocationSource::IpGeolocation
    }

    async fn attempt(&self) -> Result<LocationTarget, StageError> {
        let coordinate = self.geo.ip_geolocate().await?;
        let address = self.geo.reverse_geocode(coordinate).await?;

        if let Some(city) = address.settlement() {
            return place(city);
        }

        let country = address
            .country()
            .ok_or_else(|| StageError::NoPlace(format!("no settlement or country at {coordinate}")))?;
        debug!(country, "no settlement in address, looking up capital");

        match self.geo.capital_of(country).await? {
            Some(capital) => place(&capital),
            None => Err(StageError::NoPlace(format!("no capital listed for {country}"))),
        }
    }
}

/// Device position, bounded by `timeout`, reverse geocoded.
#[derive(Debug, Clone)]
pub struct DeviceGpsStage {
    device: Arc<dyn PositionSource>,
    geo: GeoClient,
    timeout: Duration,
}

impl DeviceGpsStage {
    pub fn new(device: Arc<dyn PositionSource>, geo: GeoClient, timeout: Duration) -> Self {
        Self {
            device,
            geo,
            timeout,
        }
    }
}

#[async_trait]
impl LocationStrategy for DeviceGpsStage {
    fn source(&self) -> LocationSource {
        LocationSource::DeviceGps
    }

    async fn attempt(&self) -> Result<LocationTarget, StageError> {
        let position = time::timeout(self.timeout, self.device.current_position())
            .await
            .map_err(|_| PositionError::Timeout)?;
        let coordinate = position?;

        let address = self.geo.reverse_geocode(coordinate).await?;
        match address.settlement() {
            Some(city) => place(city),
            None => Err(StageError::NoPlace(format!("no settlement at {coordinate}"))),
        }
    }
}

/// City reported directly by an IP-to-city service.
#[derive(Debug, Clone)]
pub struct IpCityStage {
    geo: GeoClient,
}

impl IpCityStage {
    pub fn new(geo: GeoClient) -> Self {
        Self { geo }
    }
}

#[async_trait]
impl LocationStrategy for IpCityStage {
    fn source(&self) -> LocationSource {
        LocationSource::IpCity
    }

    async fn attempt(&self) -> Result<LocationTarget, StageError> {
        match self.geo.ip_city().await? {
            Some(city) => place(&city),
            None => Err(StageError::NoPlace("lookup returned no city".to_string())),
        }
    }
}
