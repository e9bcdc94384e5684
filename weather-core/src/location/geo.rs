//! Unauthenticated geolocation hosts used by the location stages.

use reqwest::{Client, Url};
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::debug;

use crate::{
    Config,
    config::Endpoints,
    error::{Result, WeatherError},
    model::Coordinate,
};

const IP_GEOLOCATION: &str = "IP geolocation";
const REVERSE_GEOCODER: &str = "reverse geocoder";
const COUNTRY_LOOKUP: &str = "country lookup";
const IP_CITY: &str = "IP city lookup";

// The public reverse geocoder rejects requests without one.
const USER_AGENT: &str = concat!("weatherdash/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct IpGeolocationResponse {
    location: Option<IpGeolocationPoint>,
}

#[derive(Debug, Deserialize)]
struct IpGeolocationPoint {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct ReverseGeocodeResponse {
    address: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct CountryRecord {
    #[serde(default)]
    capital: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct IpCityResponse {
    city: Option<String>,
}

/// Address parts returned by the reverse geocoder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Address {
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub country: Option<String>,
}

impl Address {
    /// City, else town, else village.
    pub fn settlement(&self) -> Option<&str> {
        [&self.city, &self.town, &self.village]
            .into_iter()
            .find_map(|part| non_blank(part.as_deref()))
    }

    pub fn country(&self) -> Option<&str> {
        non_blank(self.country.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone)]
pub struct GeoClient {
    http: Client,
    endpoints: Endpoints,
}

impl GeoClient {
    pub fn new(endpoints: Endpoints, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WeatherError::configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { http, endpoints })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.endpoints.clone(), config.request_timeout())
    }

    async fn get_json<T: DeserializeOwned>(&self, service: &'static str, url: Url) -> Result<T> {
        debug!(%url, "requesting {service}");

        let res = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| WeatherError::unavailable(service, e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            return Err(WeatherError::unavailable(service, format!("status {status}")));
        }

        let body = res
            .text()
            .await
            .map_err(|e| WeatherError::unavailable(service, e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| WeatherError::malformed(service, e.to_string()))
    }

    fn parse_url(service: &'static str, raw: &str) -> Result<Url> {
        Url::parse(raw).map_err(|e| {
            WeatherError::configuration(format!("Invalid {service} endpoint '{raw}': {e}"))
        })
    }

    /// Coarse position of this host from its public IP.
    pub async fn ip_geolocate(&self) -> Result<Coordinate> {
        let url = Self::parse_url(IP_GEOLOCATION, &self.endpoints.ip_geolocation)?;
        let parsed: IpGeolocationResponse = self.get_json(IP_GEOLOCATION, url).await?;

        let point = parsed
            .location
            .ok_or_else(|| WeatherError::malformed(IP_GEOLOCATION, "missing location"))?;
        let coordinate = Coordinate::new(point.lat, point.lng);
        if !coordinate.is_valid() {
            return Err(WeatherError::malformed(
                IP_GEOLOCATION,
                format!("invalid coordinate {coordinate}"),
            ));
        }

        Ok(coordinate)
    }

    pub async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<Address> {
        let mut url = Self::parse_url(REVERSE_GEOCODER, &self.endpoints.reverse_geocode)?;
        url.query_pairs_mut()
            .append_pair("lat", &coordinate.latitude.to_string())
            .append_pair("lon", &coordinate.longitude.to_string())
            .append_pair("format", "json");

        let parsed: ReverseGeocodeResponse = self.get_json(REVERSE_GEOCODER, url).await?;
        parsed
            .address
            .ok_or_else(|| WeatherError::malformed(REVERSE_GEOCODER, "missing address"))
    }

    /// First listed capital of `country`, if the lookup knows one.
    pub async fn capital_of(&self, country: &str) -> Result<Option<String>> {
        let mut url = Self::parse_url(COUNTRY_LOOKUP, &self.endpoints.country_lookup)?;
        url.path_segments_mut()
            .map_err(|_| {
                WeatherError::configuration(format!(
                    "Invalid {COUNTRY_LOOKUP} endpoint '{}'",
                    self.endpoints.country_lookup
                ))
            })?
            .pop_if_empty()
            .push(country);

        let records: Vec<CountryRecord> = self.get_json(COUNTRY_LOOKUP, url).await?;
        Ok(records
            .into_iter()
            .next()
            .and_then(|record| record.capital.into_iter().next())
            .filter(|capital| !capital.trim().is_empty()))
    }

    /// City of this host's public IP, straight from the lookup service.
    pub async fn ip_city(&self) -> Result<Option<String>> {
        let url = Self::parse_url(IP_CITY, &self.endpoints.ip_city)?;
        let parsed: IpCityResponse = self.get_json(IP_CITY, url).await?;

        Ok(non_blank(parsed.city.as_deref()).map(str::to_owned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settlement_prefers_city_then_town_then_village() {
        let address = Address {
            city: None,
            town: Some("Hallstatt".into()),
            village: Some("Lahn".into()),
            country: Some("Austria".into()),
        };
        assert_eq!(address.settlement(), Some("Hallstatt"));

        let address = Address {
            city: Some("  ".into()),
            village: Some("Lahn".into()),
            ..Address::default()
        };
        assert_eq!(address.settlement(), Some("Lahn"));
    }

    #[test]
    fn country_only_address_has_no_settlement() {
        let address: Address =
            serde_json::from_str(r#"{"country": "France", "country_code": "fr"}"#)
                .expect("fixture parses");
        assert_eq!(address.settlement(), None);
        assert_eq!(address.country(), Some("France"));
    }

    #[test]
    fn bad_endpoint_is_a_configuration_error() {
        let err = GeoClient::parse_url(IP_CITY, "not a url").unwrap_err();
        assert!(matches!(err, WeatherError::Configuration(_)));
    }
}
