//! Threshold classification of distance-from-edge into connectivity classes.
use serde::{Deserialize, Serialize};

use crate::error::{ConnectivityError, Result};
use crate::raster::{ClassRaster, DistanceGrid};

/// Class id written for non-forest / nodata cells.
pub const NON_FOREST: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConnectivityClass {
    Fragmented,
    Edge,
    Core,
}

impl ConnectivityClass {
    pub const ALL: [Self; 3] = [Self::Fragmented, Self::Edge, Self::Core];

    pub fn id(self) -> u8 {
        match self {
            Self::Fragmented => 1,
            Self::Edge => 2,
            Self::Core => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Fragmented => "Fragmented",
            Self::Edge => "Edge",
            Self::Core => "Core",
        }
    }

    /// `None` for 0 (non-forest) and any id outside 1..=3.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::Fragmented),
            2 => Some(Self::Edge),
            3 => Some(Self::Core),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConnectivityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Edge and core distance thresholds in metres, `0 < edge < core`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub edge_m: f64,
    pub core_m: f64,
}

impl Thresholds {
    pub fn new(edge_m: f64, core_m: f64) -> Result<Self> {
        let t = Self { edge_m, core_m };
        t.validate()?;
        Ok(t)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.edge_m.is_finite() || !self.core_m.is_finite() {
            return Err(ConnectivityError::parameter(format!(
                "thresholds must be finite, got edge {} / core {}",
                self.edge_m, self.core_m
            )));
        }
        if !(0.0 < self.edge_m && self.edge_m < self.core_m) {
            return Err(ConnectivityError::parameter(format!(
                "thresholds must satisfy 0 < edge < core, got edge {} / core {}",
                self.edge_m, self.core_m
            )));
        }
        Ok(())
    }

    /// Class for one forest distance. Intervals are half-open and a distance
    /// exactly on a threshold belongs to the higher class.
    #[inline]
    pub fn class_for(&self, distance_m: f64) -> ConnectivityClass {
        if distance_m < self.edge_m {
            ConnectivityClass::Fragmented
        } else if distance_m < self.core_m {
            ConnectivityClass::Edge
        } else {
            ConnectivityClass::Core
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { edge_m: 100.0, core_m: 300.0 }
    }
}

/// Classify every cell of `distances`.
///
/// ```text
///   distance == 0              → 0  non-forest
///   0 < distance < edge        → 1  Fragmented
///   edge ≤ distance < core     → 2  Edge
///   distance ≥ core            → 3  Core
/// ```
pub fn classify_connectivity(distances: &DistanceGrid, thresholds: Thresholds) -> Result<ClassRaster> {
    thresholds.validate()?;
    if distances.values.is_empty() {
        return Err(ConnectivityError::input("distance grid has zero cells"));
    }
    if let Some(bad) = distances.values.data.iter().find(|d| d.is_nan() || **d < 0.0) {
        return Err(ConnectivityError::input(format!(
            "distance grid holds an invalid value {bad}"
        )));
    }

    let classes = distances.values.map(|&d| {
        if d > 0.0 {
            thresholds.class_for(d).id()
        } else {
            NON_FOREST
        }
    });
    Ok(ClassRaster::new(classes, distances.georef.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{Georef, Grid};

    fn grid(values: Vec<f64>) -> DistanceGrid {
        DistanceGrid {
            values: Grid::from_vec(values.len(), 1, values).unwrap(),
            resolution: 10.0,
            georef: Georef::default(),
        }
    }

    #[test]
    fn classifies_each_band() {
        let t = Thresholds::new(10.0, 30.0).unwrap();
        let c = classify_connectivity(&grid(vec![0.0, 5.0, 15.0, 35.0]), t).unwrap();
        assert_eq!(c.classes.data, vec![0, 1, 2, 3]);
    }

    #[test]
    fn ties_go_to_the_higher_class() {
        let c = classify_connectivity(&grid(vec![99.999, 100.0, 299.999, 300.0]), Thresholds::default())
            .unwrap();
        assert_eq!(c.classes.data, vec![1, 2, 2, 3]);
    }

    #[test]
    fn degenerate_or_unordered_thresholds_fail() {
        let g = grid(vec![1.0]);
        for (e, k) in [(100.0, 100.0), (300.0, 100.0), (0.0, 100.0), (-5.0, 10.0), (f64::NAN, 10.0)] {
            let err = classify_connectivity(&g, Thresholds { edge_m: e, core_m: k }).unwrap_err();
            assert!(err.is_invalid_parameter(), "edge {e} core {k}");
        }
    }

    #[test]
    fn negative_distance_is_invalid_input() {
        let err = classify_connectivity(&grid(vec![1.0, -1.0]), Thresholds::default()).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn class_ids_round_trip_through_from_id() {
        for class in ConnectivityClass::ALL {
            assert_eq!(ConnectivityClass::from_id(class.id()), Some(class));
        }
        assert_eq!(ConnectivityClass::from_id(NON_FOREST), None);
        assert_eq!(ConnectivityClass::Core.to_string(), "Core");
    }
}
