//! Run configuration.
//!
//! Loaded from JSON by the binaries and overridden field by field from the
//! command line. The core only ever sees a validated value.
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::classify::Thresholds;
use crate::distance::validate_resolution;
use crate::error::{ConnectivityError, Result};
use crate::vectorize::validate_tolerance;

/// Which engine runs the mask → distance → classify → vectorize chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineKind {
    /// Whole raster in memory.
    Local,
    /// Windows of `tile_size` pixels, each read with a halo of `neighborhood`
    /// pixels.
    Tiled { tile_size: usize, neighborhood: usize },
}

impl EngineKind {
    pub const DEFAULT_TILE_SIZE: usize = 256;
    pub const DEFAULT_NEIGHBORHOOD: usize = 256;

    pub fn tiled() -> Self {
        Self::Tiled {
            tile_size: Self::DEFAULT_TILE_SIZE,
            neighborhood: Self::DEFAULT_NEIGHBORHOOD,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Tiled { .. } => "tiled",
        }
    }
}

impl Default for EngineKind {
    fn default() -> Self {
        Self::Local
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// LULC codes counted as forest.
    pub forest_classes: BTreeSet<i32>,
    pub resolution_m: f64,
    pub edge_threshold_m: f64,
    pub core_threshold_m: f64,
    /// `None` = one third of the resolution.
    pub simplify_tolerance_m: Option<f64>,
    pub engine: EngineKind,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            forest_classes: BTreeSet::from([3, 4]),
            resolution_m: 30.0,
            edge_threshold_m: 100.0,
            core_threshold_m: 300.0,
            simplify_tolerance_m: None,
            engine: EngineKind::Local,
        }
    }
}

impl ConnectivityConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| ConnectivityError::parameter(format!("config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            edge_m: self.edge_threshold_m,
            core_m: self.core_threshold_m,
        }
    }

    pub fn effective_simplify_tolerance(&self) -> f64 {
        self.simplify_tolerance_m.unwrap_or(self.resolution_m / 3.0)
    }

    pub fn validate(&self) -> Result<()> {
        validate_resolution(self.resolution_m)?;
        self.thresholds().validate()?;
        validate_tolerance(self.effective_simplify_tolerance())?;
        if let EngineKind::Tiled { tile_size, neighborhood } = self.engine {
            if tile_size == 0 {
                return Err(ConnectivityError::parameter("tile_size must be at least 1 pixel"));
            }
            let reach = neighborhood as f64 * self.resolution_m;
            if reach < self.core_threshold_m {
                return Err(ConnectivityError::parameter(format!(
                    "neighborhood of {neighborhood} px reaches {reach} m, below the core threshold {} m",
                    self.core_threshold_m
                )));
            }
        }
        Ok(())
    }
}
