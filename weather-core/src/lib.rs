//! Core library for the `weather` dashboard.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The OpenWeather client behind the `WeatherProvider` trait
//! - Location detection as an ordered cascade of sources
//! - Daily aggregation of the 3-hour forecast feed
//! - The weather state store that front ends subscribe to
//!
//! It is used by `weather-cli`, but can also be reused by other front ends.

pub mod cities;
pub mod config;
pub mod error;
pub mod forecast;
pub mod location;
pub mod model;
pub mod provider;
pub mod store;

pub use cities::CityIndex;
pub use config::Config;
pub use error::{PositionError, Result, WeatherError};
pub use forecast::aggregate_daily;
pub use location::{LocationResolver, LocationStrategy, device::position_source_from_config};
pub use model::{
    Condition, Coordinate, ForecastDay, LocationSource, LocationTarget, PlaceQuery,
    ResolvedLocation, WeatherSnapshot,
};
pub use provider::{WeatherProvider, provider_from_config};
pub use store::{FetchOutcome, Status, WeatherState, WeatherStore};
