use async_trait::async_trait;
use chrono::FixedOffset;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::debug;

use crate::{
    Config,
    config::missing_api_key,
    error::{Result, WeatherError},
    model::{
        Condition, Coordinate, ForecastFeed, ForecastInterval, PlaceQuery, WeatherSnapshot,
    },
};

use super::WeatherProvider;

const SERVICE: &str = "OpenWeather";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: Option<String>,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: Option<String>, base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WeatherError::configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.api_key().ok().map(str::to_owned),
            &config.endpoints.openweather,
            config.request_timeout(),
        )
    }

    fn credential(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(missing_api_key)
    }

    /// GET `{base}/{endpoint}` with metric units; `place` turns a 404 into `PlaceNotFound`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        place: Option<&PlaceQuery>,
    ) -> Result<T> {
        let api_key = self.credential()?;
        let url = format!("{}/{endpoint}", self.base_url);
        debug!(%url, "requesting OpenWeather {endpoint}");

        let res = self
            .http
            .get(&url)
            .query(query)
            .query(&[("units", "metric"), ("appid", api_key)])
            .send()
            .await
            .map_err(|e| {
                WeatherError::unavailable(SERVICE, format!("{endpoint} request failed: {e}"))
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            WeatherError::unavailable(SERVICE, format!("failed to read {endpoint} body: {e}"))
        })?;

        if let (StatusCode::NOT_FOUND, Some(place)) = (status, place) {
            return Err(WeatherError::PlaceNotFound(place.to_string()));
        }

        if !status.is_success() {
            return Err(WeatherError::unavailable(
                SERVICE,
                format!(
                    "{endpoint} request failed with status {status}: {}",
                    truncate_body(&body)
                ),
            ));
        }

        serde_json::from_str(&body)
            .map_err(|e| WeatherError::malformed(SERVICE, format!("{endpoint}: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OwCondition {
    main: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentMain {
    temp: f64,
    pressure: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwForecastMain {
    temp: f64,
    temp_min: f64,
    temp_max: f64,
    pressure: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
    #[serde(default)]
    deg: u16,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    sunrise: i64,
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct OwClouds {
    all: u8,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    #[serde(default)]
    name: String,
    coord: OwCoord,
    weather: Vec<OwCondition>,
    main: OwCurrentMain,
    wind: OwWind,
    sys: OwSys,
    #[serde(default)]
    timezone: i32,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwForecastMain,
    weather: Vec<OwCondition>,
    clouds: OwClouds,
    wind: OwWind,
    #[serde(default)]
    pop: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwForecastCity {
    #[serde(default)]
    timezone: i32,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
    #[serde(default)]
    city: Option<OwForecastCity>,
}

fn conditions(weather: Vec<OwCondition>, what: &str) -> Result<Vec<Condition>> {
    if weather.is_empty() {
        return Err(WeatherError::malformed(
            SERVICE,
            format!("{what} has no weather conditions"),
        ));
    }

    Ok(weather
        .into_iter()
        .map(|w| Condition {
            main: w.main,
            description: w.description,
        })
        .collect())
}

fn utc_offset(seconds: i32) -> Result<FixedOffset> {
    FixedOffset::east_opt(seconds).ok_or_else(|| {
        WeatherError::malformed(SERVICE, format!("timezone offset {seconds} out of range"))
    })
}

impl OwCurrentResponse {
    fn into_snapshot(self) -> Result<WeatherSnapshot> {
        let coordinate = Coordinate::new(self.coord.lat, self.coord.lon);
        if !coordinate.is_valid() {
            return Err(WeatherError::malformed(
                SERVICE,
                format!("invalid coordinate {coordinate}"),
            ));
        }
        utc_offset(self.timezone)?;

        let place = if self.name.trim().is_empty() {
            coordinate.to_string()
        } else {
            self.name
        };

        Ok(WeatherSnapshot {
            place,
            coordinate,
            conditions: conditions(self.weather, "current conditions")?,
            temperature: self.main.temp,
            wind_speed: self.wind.speed,
            humidity: self.main.humidity,
            pressure: self.main.pressure,
            sunrise: self.sys.sunrise,
            sunset: self.sys.sunset,
            utc_offset_secs: self.timezone,
        })
    }
}

impl OwForecastResponse {
    fn into_feed(self) -> Result<ForecastFeed> {
        let utc_offset = utc_offset(self.city.map(|c| c.timezone).unwrap_or_default())?;

        let intervals = self
            .list
            .into_iter()
            .map(|entry| {
                Ok(ForecastInterval {
                    dt: entry.dt,
                    temp: entry.main.temp,
                    temp_min: entry.main.temp_min,
                    temp_max: entry.main.temp_max,
                    pressure: entry.main.pressure,
                    humidity: entry.main.humidity,
                    conditions: conditions(entry.weather, "forecast interval")?,
                    clouds: entry.clouds.all,
                    wind_speed: entry.wind.speed,
                    wind_deg: entry.wind.deg,
                    pop: entry.pop,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ForecastFeed {
            utc_offset,
            intervals,
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn ensure_configured(&self) -> Result<()> {
        self.credential().map(|_| ())
    }

    async fn current_by_coordinate(&self, coordinate: Coordinate) -> Result<WeatherSnapshot> {
        let query = [
            ("lat", coordinate.latitude.to_string()),
            ("lon", coordinate.longitude.to_string()),
        ];
        let parsed: OwCurrentResponse = self.get_json("weather", &query, None).await?;
        parsed.into_snapshot()
    }

    async fn current_by_name(&self, place: &PlaceQuery) -> Result<WeatherSnapshot> {
        let query = [("q", place.as_str().to_string())];
        let parsed: OwCurrentResponse = self.get_json("weather", &query, Some(place)).await?;
        parsed.into_snapshot()
    }

    async fn forecast_by_coordinate(&self, coordinate: Coordinate) -> Result<ForecastFeed> {
        let query = [
            ("lat", coordinate.latitude.to_string()),
            ("lon", coordinate.longitude.to_string()),
        ];
        let parsed: OwForecastResponse = self.get_json("forecast", &query, None).await?;
        parsed.into_feed()
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
