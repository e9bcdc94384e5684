//! Device-reported position.

use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

use crate::{Config, error::PositionError, model::Coordinate};

#[async_trait]
pub trait PositionSource: Send + Sync + Debug {
    async fn current_position(&self) -> Result<Coordinate, PositionError>;
}

/// Host without a positioning service.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPositionSource;

#[async_trait]
impl PositionSource for NoPositionSource {
    async fn current_position(&self) -> Result<Coordinate, PositionError> {
        Err(PositionError::Unavailable)
    }
}

/// Position pinned in configuration.
#[derive(Debug, Clone, Copy)]
pub struct FixedPosition(pub Coordinate);

#[async_trait]
impl PositionSource for FixedPosition {
    async fn current_position(&self) -> Result<Coordinate, PositionError> {
        if self.0.is_valid() {
            Ok(self.0)
        } else {
            Err(PositionError::Unavailable)
        }
    }
}

pub fn position_source_from_config(config: &Config) -> Arc<dyn PositionSource> {
    match config.device_position {
        Some(coordinate) => Arc::new(FixedPosition(coordinate)),
        None => Arc::new(NoPositionSource),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_position_source_is_unavailable() {
        let err = NoPositionSource.current_position().await.unwrap_err();
        assert_eq!(err, PositionError::Unavailable);
    }

    #[tokio::test]
    async fn fixed_position_rejects_out_of_range() {
        let source = FixedPosition(Coordinate::new(123.0, 0.0));
        assert_eq!(
            source.current_position().await,
            Err(PositionError::Unavailable)
        );
    }

    #[tokio::test]
    async fn config_position_is_reported() {
        let mut cfg = Config::default();
        cfg.device_position = Some(Coordinate::new(59.91, 10.75));

        let source = position_source_from_config(&cfg);
        assert_eq!(
            source.current_position().await,
            Ok(Coordinate::new(59.91, 10.75))
        );
    }
}
