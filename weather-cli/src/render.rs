//! Plain-text rendering of the store's state.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use std::fmt::Write;
use weatherdash_core::{ForecastDay, Status, WeatherSnapshot, WeatherState};

pub fn dashboard(state: &WeatherState) -> String {
    let mut out = String::new();

    if let Some(message) = &state.error_message {
        let _ = writeln!(out, "! {message}");
    }

    match &state.snapshot {
        Some(snapshot) => {
            if state.status == Status::Failed {
                let _ = writeln!(out, "(showing last known weather)");
            }
            out.push_str(&current(snapshot));
            if !state.forecast.is_empty() {
                out.push('\n');
                out.push_str(&forecast(&state.forecast));
            }
        }
        None if state.error_message.is_none() => {
            let _ = writeln!(out, "No weather data.");
        }
        None => {}
    }

    out
}

fn current(snapshot: &WeatherSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", snapshot.place);
    match snapshot.primary_condition() {
        Some(condition) => {
            let _ = writeln!(
                out,
                "  {:.0}°C  {} ({})",
                snapshot.temperature, condition.main, condition.description
            );
        }
        None => {
            let _ = writeln!(out, "  {:.0}°C", snapshot.temperature);
        }
    }
    let _ = writeln!(
        out,
        "  wind {:.1} m/s  humidity {}%  pressure {:.0} hPa",
        snapshot.wind_speed, snapshot.humidity, snapshot.pressure
    );
    let _ = writeln!(
        out,
        "  sunrise {}  sunset {}",
        local_time(snapshot.sunrise, snapshot.utc_offset_secs),
        local_time(snapshot.sunset, snapshot.utc_offset_secs)
    );
    out
}

fn forecast(days: &[ForecastDay]) -> String {
    let mut out = String::new();
    for day in days {
        let condition = day
            .conditions
            .first()
            .map(|c| c.main.as_str())
            .unwrap_or("-");
        let _ = writeln!(
            out,
            "  {}  {:>4.0}°  {:>4.0}° / {:<4.0}°  {}",
            day.date.format("%a %d"),
            day.temp.day,
            day.temp.min,
            day.temp.max,
            condition
        );
    }
    out
}

/// `HH:MM` in the place's own time.
fn local_time(epoch: i64, utc_offset_secs: i32) -> String {
    let offset = FixedOffset::east_opt(utc_offset_secs).unwrap_or_else(|| Utc.fix());
    DateTime::from_timestamp(epoch, 0)
        .map(|utc| utc.with_timezone(&offset).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string())
}
