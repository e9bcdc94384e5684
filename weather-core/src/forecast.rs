//! Collapses the 3-hour forecast feed into one record per calendar day.
//!
//! Days are bucketed in the place's local time, using the UTC offset the feed
//! reports for the city. The feed is assumed to be in ascending time order and
//! is not re-sorted.

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::{
    error::{Result, WeatherError},
    model::{ForecastDay, ForecastFeed, ForecastInterval, TemperatureSummary},
};

/// Upper bound on the number of days returned.
pub const MAX_FORECAST_DAYS: usize = 7;

pub fn aggregate_daily(feed: &ForecastFeed) -> Result<Vec<ForecastDay>> {
    let mut days: Vec<ForecastDay> = Vec::new();

    for interval in &feed.intervals {
        let date = local_date(interval.dt, feed.utc_offset)?;

        match days.iter_mut().find(|day| day.date == date) {
            Some(day) => {
                day.temp.min = day.temp.min.min(interval.temp_min);
                day.temp.max = day.temp.max.max(interval.temp_max);
            }
            None => days.push(seed_day(interval, date)),
        }
    }

    days.truncate(MAX_FORECAST_DAYS);
    Ok(days)
}

fn local_date(dt: i64, offset: FixedOffset) -> Result<NaiveDate> {
    DateTime::from_timestamp(dt, 0)
        .map(|utc| utc.with_timezone(&offset).date_naive())
        .ok_or_else(|| {
            WeatherError::malformed("OpenWeather", format!("forecast timestamp {dt} out of range"))
        })
}

/// First interval of a day: its temperature stands in for every part of the day.
fn seed_day(interval: &ForecastInterval, date: NaiveDate) -> ForecastDay {
    ForecastDay {
        dt: interval.dt,
        date,
        temp: TemperatureSummary {
            day: interval.temp,
            min: interval.temp_min,
            max: interval.temp_max,
            night: interval.temp,
            eve: interval.temp,
            morn: interval.temp,
        },
        conditions: interval.conditions.clone(),
        clouds: interval.clouds,
        pressure: interval.pressure,
        humidity: interval.humidity,
        wind_speed: interval.wind_speed,
        wind_deg: interval.wind_deg,
        pop: interval.pop.unwrap_or(0.0),
        uvi: 0.0,
    }
}
