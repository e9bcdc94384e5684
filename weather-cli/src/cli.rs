use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use inquire::{
    CustomUserError, Password, PasswordDisplayMode, Text,
    autocompletion::{Autocomplete, Replacement},
};
use std::{process::ExitCode, sync::Arc};
use weatherdash_core::{
    CityIndex, Config, Coordinate, LocationResolver, Status, WeatherStore,
    position_source_from_config, provider_from_config, store::describe_failure,
};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather dashboard for the terminal")]
pub struct Cli {
    /// Log debug output to stderr (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key.
    Configure {
        /// Key to store; prompts when absent.
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Show current weather and the daily forecast.
    ///
    /// Without a place or coordinates the location is detected automatically.
    Show {
        /// City name, optionally "City, Country".
        #[arg(conflicts_with_all = ["lat", "lon"])]
        place: Option<String>,

        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,

        /// Print the full state as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Detect the current location without fetching weather.
    Locate,

    /// Pick a city interactively, then show its weather.
    Search {
        /// Print the full state as JSON.
        #[arg(long)]
        json: bool,
    },
}

enum Target {
    Auto,
    Name(String),
    Coordinate(Coordinate),
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        match self.command {
            Command::Configure { api_key } => configure(api_key),
            Command::Show {
                place,
                lat,
                lon,
                json,
            } => {
                let target = match (place, lat, lon) {
                    (Some(place), _, _) => Target::Name(place),
                    (None, Some(lat), Some(lon)) => Target::Coordinate(Coordinate::new(lat, lon)),
                    _ => Target::Auto,
                };
                show(&Config::load()?, target, json).await
            }
            Command::Locate => locate(&Config::load()?).await,
            Command::Search { json } => {
                let config = Config::load()?;
                let place = prompt_city(&config)?;
                show(&config, Target::Name(place), json).await
            }
        }
    }
}

fn configure(api_key: Option<String>) -> anyhow::Result<ExitCode> {
    let mut config = Config::load_stored()?;

    let api_key = match api_key {
        Some(key) => key,
        None => Password::new("OpenWeather API key:")
            .with_display_mode(PasswordDisplayMode::Masked)
            .without_confirmation()
            .prompt()
            .context("Failed to read API key")?,
    };
    if api_key.trim().is_empty() {
        bail!("API key must not be empty");
    }

    config.set_api_key(api_key);
    config.save()?;

    println!("Saved API key to {}", Config::config_file_path()?.display());
    Ok(ExitCode::SUCCESS)
}

async fn show(config: &Config, target: Target, json: bool) -> anyhow::Result<ExitCode> {
    let store = WeatherStore::new(provider_from_config(config)?);

    let result = match target {
        Target::Name(place) => store.fetch_by_name(&place).await,
        Target::Coordinate(coordinate) => store.fetch_by_coordinate(coordinate).await,
        Target::Auto => {
            let resolver =
                LocationResolver::standard(config, position_source_from_config(config))?;
            store.fetch_auto(&resolver).await
        }
    };
    // The user-facing message is already in the store's state.
    if let Err(e) = result {
        tracing::debug!(error = %e, "fetch failed");
    }

    let state = store.state();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&state).context("Failed to serialize weather state")?
        );
    } else {
        print!("{}", render::dashboard(&state));
    }

    Ok(match state.status {
        Status::Failed => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

async fn locate(config: &Config) -> anyhow::Result<ExitCode> {
    let resolver = LocationResolver::standard(config, position_source_from_config(config))?;

    match resolver.resolve().await {
        Ok(resolved) => {
            println!("{resolved}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", describe_failure(&e));
            Ok(ExitCode::FAILURE)
        }
    }
}

#[derive(Clone)]
struct CitySuggester(Arc<CityIndex>);

impl Autocomplete for CitySuggester {
    fn get_suggestions(&mut self, input: &str) -> Result<Vec<String>, CustomUserError> {
        Ok(self.0.suggest(input))
    }

    fn get_completion(
        &mut self,
        _input: &str,
        highlighted_suggestion: Option<String>,
    ) -> Result<Replacement, CustomUserError> {
        Ok(highlighted_suggestion)
    }
}

fn prompt_city(config: &Config) -> anyhow::Result<String> {
    let path = config.cities_file.clone().ok_or_else(|| {
        anyhow!(
            "No city list configured.\n\
             Hint: set `cities_file` in the config file to a JSON list of {{\"name\", \"country\"}}."
        )
    })?;
    let suggester = CitySuggester(Arc::new(CityIndex::new(path)));

    let place = Text::new("City:")
        .with_autocomplete(suggester)
        .prompt()
        .context("Failed to read city")?;

    Ok(place.trim().to_string())
}
