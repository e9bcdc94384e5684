//! Local city list for search suggestions.

use anyhow::Context;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};
use tracing::{debug, warn};

/// Most suggestions returned for one input.
pub const MAX_SUGGESTIONS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct City {
    pub name: String,
    pub country: String,
}

impl City {
    pub fn label(&self) -> String {
        format!("{}, {}", self.name, self.country)
    }
}

/// City list read from disk on the first non-blank query.
///
/// A file that cannot be read or parsed leaves the index empty.
#[derive(Debug)]
pub struct CityIndex {
    path: PathBuf,
    cities: OnceLock<Vec<City>>,
}

impl CityIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cities: OnceLock::new(),
        }
    }

    pub fn from_cities(cities: Vec<City>) -> Self {
        let index = Self::new(PathBuf::new());
        // freshly created, cannot already be set
        let _ = index.cities.set(cities);
        index
    }

    pub fn is_loaded(&self) -> bool {
        self.cities.get().is_some()
    }

    /// Up to [`MAX_SUGGESTIONS`] `"Name, Country"` labels whose name starts with `input`.
    pub fn suggest(&self, input: &str) -> Vec<String> {
        let needle = input.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        self.cities()
            .iter()
            .filter(|city| city.name.to_lowercase().starts_with(&needle))
            .take(MAX_SUGGESTIONS)
            .map(City::label)
            .collect()
    }

    fn cities(&self) -> &[City] {
        self.cities.get_or_init(|| match load_cities(&self.path) {
            Ok(cities) => {
                debug!(count = cities.len(), path = %self.path.display(), "city list loaded");
                cities
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "city list unavailable");
                Vec::new()
            }
        })
    }
}

fn load_cities(path: &Path) -> anyhow::Result<Vec<City>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read city list: {}", path.display()))?;

    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse city list: {}", path.display()))
}
