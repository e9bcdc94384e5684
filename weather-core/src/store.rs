//! Owned weather state with watch-channel subscribers.
//!
//! Fetch operations are the only way to change the state. Each fetch takes a
//! generation number when it starts; a completion is applied only if no newer
//! fetch has started since, so a slow stale fetch can never overwrite a newer one.

use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    error::{Result, WeatherError},
    forecast::aggregate_daily,
    location::LocationResolver,
    model::{Coordinate, ForecastDay, LocationTarget, PlaceQuery, ResolvedLocation, WeatherSnapshot},
    provider::WeatherProvider,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Read-only view handed to subscribers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeatherState {
    pub status: Status,
    pub snapshot: Option<WeatherSnapshot>,
    pub forecast: Vec<ForecastDay>,
    pub error_message: Option<String>,
    /// Where the held snapshot's place was detected; `None` when it was searched.
    /// Follows the snapshot, so a failed fetch leaves both in place.
    pub location: Option<ResolvedLocation>,
    /// Generation of the fetch that last wrote this state.
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// A newer fetch started before this one finished; its result was dropped.
    Superseded,
}

pub struct WeatherStore {
    provider: Arc<dyn WeatherProvider>,
    state: watch::Sender<WeatherState>,
    latest: AtomicU64,
}

type Loaded = (WeatherSnapshot, Vec<ForecastDay>);

impl WeatherStore {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        let (state, _) = watch::channel(WeatherState::default());
        Self {
            provider,
            state,
            latest: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WeatherState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> WeatherState {
        self.state.borrow().clone()
    }

    pub async fn fetch_by_coordinate(&self, coordinate: Coordinate) -> Result<FetchOutcome> {
        let generation = self.begin();
        let result = self.load_by_coordinate(coordinate).await;
        self.finish(generation, result, None)
    }

    pub async fn fetch_by_name(&self, place: &str) -> Result<FetchOutcome> {
        let generation = self.begin();
        let result = match PlaceQuery::parse(place) {
            Ok(place) => self.load_by_name(&place).await,
            Err(e) => Err(e),
        };
        self.finish(generation, result, None)
    }

    /// Detect the location with `resolver`, then fetch it.
    ///
    /// An unconfigured provider fails the fetch before any location source runs.
    pub async fn fetch_auto(&self, resolver: &LocationResolver) -> Result<FetchOutcome> {
        let generation = self.begin();

        if let Err(e) = self.provider.ensure_configured() {
            return self.finish(generation, Err(e), None);
        }

        let resolved = match resolver.resolve().await {
            Ok(resolved) => resolved,
            Err(e) => return self.finish(generation, Err(e), None),
        };

        let result = match &resolved.target {
            LocationTarget::Place(place) => self.load_by_name(place).await,
            LocationTarget::Coordinate(coordinate) => self.load_by_coordinate(*coordinate).await,
        };
        self.finish(generation, result, Some(resolved))
    }

    fn begin(&self) -> u64 {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation, "fetch started");

        self.state.send_modify(|state| {
            state.status = Status::Loading;
            state.error_message = None;
        });
        generation
    }

    fn finish(
        &self,
        generation: u64,
        result: Result<Loaded>,
        location: Option<ResolvedLocation>,
    ) -> Result<FetchOutcome> {
        let latest = self.latest.load(Ordering::SeqCst);
        if generation != latest {
            match &result {
                Ok(_) => debug!(generation, latest, "discarding stale fetch result"),
                Err(e) => debug!(generation, latest, error = %e, "discarding stale fetch failure"),
            }
            return Ok(FetchOutcome::Superseded);
        }

        match result {
            Ok((snapshot, forecast)) => {
                info!(
                    generation,
                    place = %snapshot.place,
                    days = forecast.len(),
                    "weather updated"
                );
                self.state.send_modify(|state| {
                    state.status = Status::Ready;
                    state.snapshot = Some(snapshot);
                    state.forecast = forecast;
                    state.error_message = None;
                    state.location = location;
                    state.generation = generation;
                });
                Ok(FetchOutcome::Applied)
            }
            Err(e) => {
                warn!(generation, error = %e, "weather fetch failed");
                let message = describe_failure(&e);
                self.state.send_modify(|state| {
                    state.status = Status::Failed;
                    state.error_message = Some(message);
                    state.generation = generation;
                });
                Err(e)
            }
        }
    }

    async fn load_by_coordinate(&self, coordinate: Coordinate) -> Result<Loaded> {
        let snapshot = self.provider.current_by_coordinate(coordinate).await?;
        self.with_forecast(snapshot).await
    }

    async fn load_by_name(&self, place: &PlaceQuery) -> Result<Loaded> {
        let snapshot = self.provider.current_by_name(place).await?;
        self.with_forecast(snapshot).await
    }

    /// The forecast is requested only after current conditions succeeded.
    async fn with_forecast(&self, snapshot: WeatherSnapshot) -> Result<Loaded> {
        let feed = self.provider.forecast_by_coordinate(snapshot.coordinate).await?;
        let forecast = aggregate_daily(&feed)?;
        Ok((snapshot, forecast))
    }
}

/// User-facing text for a failed fetch.
pub fn describe_failure(error: &WeatherError) -> String {
    match error {
        WeatherError::Configuration(_) => {
            "The weather service is not configured. Set an OpenWeather API key and try again."
                .to_string()
        }
        WeatherError::PlaceNotFound(place) => format!("City \"{place}\" not found."),
        WeatherError::InvalidPlace(_) => "Please enter a city name.".to_string(),
        WeatherError::ProviderUnavailable { .. } => {
            "Weather data is unavailable right now. Please try again later.".to_string()
        }
        WeatherError::LocationUnresolved => {
            "Could not detect your location. Please search for a city manually.".to_string()
        }
        WeatherError::MalformedResponse { .. } => {
            "The weather service sent an unexpected response. Please try again later.".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        location::{LocationStrategy, StageError},
        model::{Condition, ForecastFeed, ForecastInterval, LocationSource},
    };
    use async_trait::async_trait;
    use chrono::FixedOffset;
    use std::{
        collections::HashMap,
        sync::Mutex,
        sync::atomic::AtomicUsize,
    };
    use tokio::sync::Notify;

    fn snapshot(place: &str, temperature: f64) -> WeatherSnapshot {
        WeatherSnapshot {
            place: place.to_string(),
            coordinate: Coordinate::new(48.85, 2.35),
            conditions: vec![Condition {
                main: "Clear".into(),
                description: "clear sky".into(),
            }],
            temperature,
            wind_speed: 2.0,
            humidity: 60,
            pressure: 1015.0,
            sunrise: 1_700_000_000,
            sunset: 1_700_033_000,
            utc_offset_secs: 0,
        }
    }

    fn feed() -> ForecastFeed {
        ForecastFeed {
            utc_offset: FixedOffset::east_opt(0).expect("zero offset"),
            intervals: vec![ForecastInterval {
                dt: 1_700_006_400,
                temp: 12.0,
                temp_min: 10.0,
                temp_max: 14.0,
                pressure: 1010.0,
                humidity: 75,
                conditions: vec![Condition {
                    main: "Clouds".into(),
                    description: "few clouds".into(),
                }],
                clouds: 20,
                wind_speed: 3.0,
                wind_deg: 90,
                pop: None,
            }],
        }
    }

    /// Answers by place name; a gate per place lets tests hold a fetch in flight.
    #[derive(Debug, Default)]
    struct ScriptedProvider {
        temperatures: HashMap<&'static str, f64>,
        gates: HashMap<&'static str, Arc<Notify>>,
        fail_forecast: bool,
        unconfigured: bool,
        forecast_calls: AtomicUsize,
        requested: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl WeatherProvider for ScriptedProvider {
        fn ensure_configured(&self) -> Result<()> {
            if self.unconfigured {
                return Err(WeatherError::configuration("no API key"));
            }
            Ok(())
        }

        async fn current_by_coordinate(&self, _coordinate: Coordinate) -> Result<WeatherSnapshot> {
            Ok(snapshot("Here", 9.0))
        }

        async fn current_by_name(&self, place: &PlaceQuery) -> Result<WeatherSnapshot> {
            let (name, temperature) = self
                .temperatures
                .get_key_value(place.as_str())
                .map(|(k, v)| (*k, *v))
                .ok_or_else(|| WeatherError::PlaceNotFound(place.to_string()))?;

            self.requested.lock().expect("lock").push(name);
            if let Some(gate) = self.gates.get(name) {
                gate.notified().await;
            }
            Ok(snapshot(name, temperature))
        }

        async fn forecast_by_coordinate(&self, _coordinate: Coordinate) -> Result<ForecastFeed> {
            self.forecast_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_forecast {
                return Err(WeatherError::unavailable("OpenWeather", "status 502"));
            }
            Ok(feed())
        }
    }

    fn provider(places: &[(&'static str, f64)]) -> ScriptedProvider {
        ScriptedProvider {
            temperatures: places.iter().copied().collect(),
            ..ScriptedProvider::default()
        }
    }

    #[tokio::test]
    async fn successful_fetch_publishes_snapshot_and_forecast() {
        let store = WeatherStore::new(Arc::new(provider(&[("Paris", 15.0)])));
        let mut rx = store.subscribe();
        assert_eq!(store.state().status, Status::Idle);

        let outcome = store.fetch_by_name("Paris").await.expect("fetch succeeds");

        assert_eq!(outcome, FetchOutcome::Applied);
        assert!(rx.has_changed().expect("store alive"));
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.status, Status::Ready);
        assert_eq!(state.snapshot.expect("snapshot").temperature, 15.0);
        assert_eq!(state.forecast.len(), 1);
        assert_eq!(state.error_message, None);
    }

    #[tokio::test]
    async fn status_is_loading_while_in_flight() {
        let gate = Arc::new(Notify::new());
        let mut scripted = provider(&[("Paris", 15.0)]);
        scripted.gates.insert("Paris", Arc::clone(&gate));
        let store = WeatherStore::new(Arc::new(scripted));

        let (outcome, seen) = tokio::join!(store.fetch_by_name("Paris"), async {
            let seen = store.state().status;
            gate.notify_one();
            seen
        });

        assert_eq!(seen, Status::Loading);
        assert_eq!(outcome.expect("fetch succeeds"), FetchOutcome::Applied);
        assert_eq!(store.state().status, Status::Ready);
    }

    #[tokio::test]
    async fn unknown_place_keeps_previous_data_under_failed() {
        let store = WeatherStore::new(Arc::new(provider(&[("Paris", 15.0)])));
        store.fetch_by_name("Paris").await.expect("fetch succeeds");

        let err = store.fetch_by_name("Zzzzznotacity").await.unwrap_err();

        assert!(matches!(err, WeatherError::PlaceNotFound(_)));
        let state = store.state();
        assert_eq!(state.status, Status::Failed);
        assert_eq!(state.snapshot.expect("stale snapshot kept").place, "Paris");
        assert_eq!(state.forecast.len(), 1);
        assert_eq!(
            state.error_message.as_deref(),
            Some("City \"Zzzzznotacity\" not found.")
        );
    }

    #[tokio::test]
    async fn forecast_failure_fails_the_whole_fetch() {
        let mut scripted = provider(&[("Paris", 15.0)]);
        scripted.fail_forecast = true;
        let store = WeatherStore::new(Arc::new(scripted));

        let err = store.fetch_by_name("Paris").await.unwrap_err();

        assert!(matches!(err, WeatherError::ProviderUnavailable { .. }));
        let state = store.state();
        assert_eq!(state.status, Status::Failed);
        assert!(state.snapshot.is_none());
        assert!(state.forecast.is_empty());
    }

    #[tokio::test]
    async fn forecast_is_not_requested_when_current_conditions_fail() {
        let scripted = Arc::new(provider(&[]));
        let store = WeatherStore::new(scripted.clone());

        assert!(store.fetch_by_name("Nowhere").await.is_err());
        assert_eq!(scripted.forecast_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blank_place_fails_without_provider_call() {
        let scripted = Arc::new(provider(&[("Paris", 15.0)]));
        let store = WeatherStore::new(scripted.clone());

        let err = store.fetch_by_name("   ").await.unwrap_err();

        assert!(matches!(err, WeatherError::InvalidPlace(_)));
        assert!(scripted.requested.lock().expect("lock").is_empty());
        assert_eq!(store.state().status, Status::Failed);
    }

    #[tokio::test]
    async fn new_fetch_clears_previous_error() {
        let store = WeatherStore::new(Arc::new(provider(&[("Paris", 15.0)])));
        let _ = store.fetch_by_name("Atlantis").await;
        assert!(store.state().error_message.is_some());

        store.fetch_by_name("Paris").await.expect("fetch succeeds");
        assert_eq!(store.state().error_message, None);
    }

    #[tokio::test]
    async fn stale_completion_does_not_overwrite_newer_fetch() {
        let slow_gate = Arc::new(Notify::new());
        let mut scripted = provider(&[("Slowtown", 1.0), ("Fastville", 2.0)]);
        scripted.gates.insert("Slowtown", Arc::clone(&slow_gate));
        let store = WeatherStore::new(Arc::new(scripted));

        let (slow, fast) = tokio::join!(store.fetch_by_name("Slowtown"), async {
            let fast = store.fetch_by_name("Fastville").await;
            slow_gate.notify_one();
            fast
        });

        assert_eq!(fast.expect("fast fetch succeeds"), FetchOutcome::Applied);
        assert_eq!(slow.expect("stale fetch reported"), FetchOutcome::Superseded);
        let state = store.state();
        assert_eq!(state.status, Status::Ready);
        assert_eq!(state.snapshot.expect("snapshot").place, "Fastville");
        assert_eq!(state.generation, 2);
    }

    #[tokio::test]
    async fn fetch_by_coordinate_routes_through_the_same_pipeline() {
        let scripted = Arc::new(provider(&[]));
        let store = WeatherStore::new(scripted.clone());

        store
            .fetch_by_coordinate(Coordinate::new(48.85, 2.35))
            .await
            .expect("fetch succeeds");

        assert_eq!(store.state().snapshot.expect("snapshot").place, "Here");
        assert_eq!(scripted.forecast_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn auto_fetch_without_any_location_asks_for_manual_input() {
        let store = WeatherStore::new(Arc::new(provider(&[("Paris", 15.0)])));
        let resolver = LocationResolver::new(Vec::new());

        let err = store.fetch_auto(&resolver).await.unwrap_err();

        assert!(matches!(err, WeatherError::LocationUnresolved));
        let state = store.state();
        assert_eq!(state.status, Status::Failed);
        assert!(
            state
                .error_message
                .expect("message")
                .contains("search for a city manually")
        );
    }

    struct CountingStage(Arc<AtomicUsize>);

    #[async_trait]
    impl LocationStrategy for CountingStage {
        fn source(&self) -> LocationSource {
            LocationSource::IpCity
        }

        async fn attempt(&self) -> std::result::Result<LocationTarget, StageError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(LocationTarget::Place(PlaceQuery::parse("Paris")?))
        }
    }

    #[tokio::test]
    async fn auto_fetch_checks_configuration_before_locating() {
        let mut scripted = provider(&[("Paris", 15.0)]);
        scripted.unconfigured = true;
        let store = WeatherStore::new(Arc::new(scripted));
        let attempts = Arc::new(AtomicUsize::new(0));
        let resolver =
            LocationResolver::new(vec![Box::new(CountingStage(Arc::clone(&attempts)))]);

        let err = store.fetch_auto(&resolver).await.unwrap_err();

        assert!(matches!(err, WeatherError::Configuration(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
        assert_eq!(store.state().status, Status::Failed);
    }

    #[tokio::test]
    async fn detected_location_follows_the_held_snapshot() {
        let store = WeatherStore::new(Arc::new(provider(&[("Paris", 15.0)])));
        let resolver = LocationResolver::new(vec![Box::new(CountingStage(Arc::new(
            AtomicUsize::new(0),
        )))]);
        store.fetch_auto(&resolver).await.expect("fetch succeeds");

        assert!(store.fetch_by_name("Atlantis").await.is_err());
        let state = store.state();
        assert_eq!(state.status, Status::Failed);
        assert_eq!(state.snapshot.expect("stale snapshot kept").place, "Paris");
        assert_eq!(
            state.location.expect("location kept with snapshot").source,
            LocationSource::IpCity
        );

        store.fetch_by_name("Paris").await.expect("fetch succeeds");
        assert_eq!(store.state().location, None);
    }

    #[test]
    fn every_error_kind_has_a_message() {
        let errors = [
            WeatherError::configuration("x"),
            WeatherError::PlaceNotFound("Oslo".into()),
            WeatherError::InvalidPlace("x".into()),
            WeatherError::unavailable("OpenWeather", "x"),
            WeatherError::LocationUnresolved,
            WeatherError::malformed("OpenWeather", "x"),
        ];
        for err in &errors {
            assert!(!describe_failure(err).is_empty());
        }
        assert!(describe_failure(&errors[1]).contains("Oslo"));
    }
}
