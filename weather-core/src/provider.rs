use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

use crate::{
    Config,
    error::Result,
    model::{Coordinate, ForecastFeed, PlaceQuery, WeatherSnapshot},
    provider::openweather::OpenWeatherProvider,
};

pub mod openweather;

/// Source of current conditions and the 3-hour forecast feed.
///
/// Each call issues exactly one request and never retries; retry policy
/// belongs to the caller.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Fails with `Configuration` when no request could be authorized.
    fn ensure_configured(&self) -> Result<()> {
        Ok(())
    }

    async fn current_by_coordinate(&self, coordinate: Coordinate) -> Result<WeatherSnapshot>;

    /// Fails with `PlaceNotFound` when the provider does not know `place`.
    async fn current_by_name(&self, place: &PlaceQuery) -> Result<WeatherSnapshot>;

    async fn forecast_by_coordinate(&self, coordinate: Coordinate) -> Result<ForecastFeed>;
}

/// Construct the configured provider.
///
/// A missing API key is not an error here; every fetch reports it instead.
pub fn provider_from_config(config: &Config) -> Result<Arc<dyn WeatherProvider>> {
    Ok(Arc::new(OpenWeatherProvider::from_config(config)?))
}
