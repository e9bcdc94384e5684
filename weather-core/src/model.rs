use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WeatherError};

/// Geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Free-form place name ("Paris" or "Paris, FR"), trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlaceQuery(String);

impl PlaceQuery {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(WeatherError::InvalidPlace(
                "place name must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PlaceQuery {
    type Error = WeatherError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PlaceQuery> for String {
    fn from(value: PlaceQuery) -> Self {
        value.0
    }
}

impl std::fmt::Display for PlaceQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One weather descriptor, e.g. `Rain` / `light rain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Primary category ("Clear", "Rain", "Snow", ...).
    pub main: String,
    pub description: String,
}

/// Current conditions for one place at fetch time.
///
/// Units are metric as delivered by the provider: °C, m/s, hPa, %.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub place: String,
    pub coordinate: Coordinate,
    /// Never empty.
    pub conditions: Vec<Condition>,
    pub temperature: f64,
    pub wind_speed: f64,
    pub humidity: u8,
    pub pressure: f64,
    /// Epoch seconds.
    pub sunrise: i64,
    /// Epoch seconds.
    pub sunset: i64,
    /// Seconds east of UTC for the place.
    pub utc_offset_secs: i32,
}

impl WeatherSnapshot {
    pub fn primary_condition(&self) -> Option<&Condition> {
        self.conditions.first()
    }
}

/// Raw 3-hour record from the forecast feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastInterval {
    /// Epoch seconds.
    pub dt: i64,
    pub temp: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub pressure: f64,
    pub humidity: u8,
    pub conditions: Vec<Condition>,
    pub clouds: u8,
    pub wind_speed: f64,
    pub wind_deg: u16,
    /// Probability of precipitation (0.0..=1.0) when the feed carries it.
    pub pop: Option<f64>,
}

/// Interval records for one place plus the place's UTC offset.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastFeed {
    pub utc_offset: FixedOffset,
    pub intervals: Vec<ForecastInterval>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSummary {
    pub day: f64,
    pub min: f64,
    pub max: f64,
    pub night: f64,
    pub eve: f64,
    pub morn: f64,
}

/// One calendar day's outlook built from the feed's intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    /// Epoch seconds of the first interval seen for the day.
    pub dt: i64,
    pub date: NaiveDate,
    pub temp: TemperatureSummary,
    pub conditions: Vec<Condition>,
    pub clouds: u8,
    pub pressure: f64,
    pub humidity: u8,
    pub wind_speed: f64,
    pub wind_deg: u16,
    pub pop: f64,
    pub uvi: f64,
}

/// Which location source produced a [`ResolvedLocation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    IpGeolocation,
    DeviceGps,
    IpCity,
}

impl LocationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationSource::IpGeolocation => "ip-geolocation",
            LocationSource::DeviceGps => "device-gps",
            LocationSource::IpCity => "ip-city",
        }
    }
}

impl std::fmt::Display for LocationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationTarget {
    Place(PlaceQuery),
    Coordinate(Coordinate),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub target: LocationTarget,
    pub source: LocationSource,
}

impl std::fmt::Display for ResolvedLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.target {
            LocationTarget::Place(place) => write!(f, "{place} (via {})", self.source),
            LocationTarget::Coordinate(coord) => write!(f, "{coord} (via {})", self.source),
        }
    }
}
