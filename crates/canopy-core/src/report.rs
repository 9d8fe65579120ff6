//! Per-class area statistics and the fragmentation index.
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::classify::ConnectivityClass;
use crate::patches::PatchAnalysis;
use crate::raster::{ClassRaster, Crs};
use crate::vectorize::ClassPolygon;

/// Non-fatal conditions attached to a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportWarning {
    /// No forest pixel in the raster. Areas are zero and the index is 0.
    NoForest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityReport {
    pub total_forest_area_ha: f64,
    /// Keyed by class name; all three classes are always present.
    pub class_areas_ha: BTreeMap<String, f64>,
    pub class_pixel_counts: BTreeMap<String, usize>,
    /// `1 − core / total`, 0 when there is no forest.
    pub fragmentation_index: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ReportWarning>,
}

impl ConnectivityReport {
    fn from_totals(areas: [f64; 3], counts: [usize; 3]) -> Self {
        let total: f64 = areas.iter().sum();
        let core = areas[ConnectivityClass::Core.id() as usize - 1];

        let mut warnings = Vec::new();
        let fragmentation_index = if total > 0.0 {
            (1.0 - core / total).clamp(0.0, 1.0)
        } else {
            log::warn!("no forest pixels: report holds zero areas");
            warnings.push(ReportWarning::NoForest);
            0.0
        };

        let mut class_areas_ha = BTreeMap::new();
        let mut class_pixel_counts = BTreeMap::new();
        for class in ConnectivityClass::ALL {
            let i = class.id() as usize - 1;
            class_areas_ha.insert(class.name().to_string(), areas[i]);
            class_pixel_counts.insert(class.name().to_string(), counts[i]);
        }

        Self {
            total_forest_area_ha: total,
            class_areas_ha,
            class_pixel_counts,
            fragmentation_index,
            warnings,
        }
    }

    pub fn area_ha(&self, class: ConnectivityClass) -> f64 {
        self.class_areas_ha.get(class.name()).copied().unwrap_or(0.0)
    }

    pub fn pixel_count(&self, class: ConnectivityClass) -> usize {
        self.class_pixel_counts.get(class.name()).copied().unwrap_or(0)
    }

    pub fn has_forest(&self) -> bool {
        !self.warnings.contains(&ReportWarning::NoForest)
    }
}

/// Aggregate polygon areas per class.
pub fn summarize<I>(polygons: I) -> ConnectivityReport
where
    I: IntoIterator<Item = ClassPolygon>,
{
    let mut areas = [0.0f64; 3];
    let mut counts = [0usize; 3];
    for p in polygons {
        let i = p.class_id() as usize - 1;
        areas[i] += p.area_ha;
        counts[i] += p.pixel_count;
    }
    let report = ConnectivityReport::from_totals(areas, counts);
    log::info!(
        "summary: {:.2} ha forest, fragmentation index {:.4}",
        report.total_forest_area_ha,
        report.fragmentation_index
    );
    report
}

/// The same report computed from pixel counts, `count × resolution² / 10 000`.
pub fn pixel_statistics(class_raster: &ClassRaster, resolution: f64) -> ConnectivityReport {
    let counts = class_raster.class_counts();
    let pixel_ha = resolution * resolution / 10_000.0;
    let pixels = [counts[1], counts[2], counts[3]];
    let areas = pixels.map(|n| n as f64 * pixel_ha);
    ConnectivityReport::from_totals(areas, pixels)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub crs: Crs,
    pub resolution_m: f64,
    pub width: usize,
    pub height: usize,
    pub engine: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParameters {
    pub edge_threshold_m: f64,
    pub core_threshold_m: f64,
    pub simplify_tolerance_m: f64,
    pub forest_classes: BTreeSet<i32>,
}

/// Everything written to `report.json` for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub meta: RunMeta,
    pub statistics: ConnectivityReport,
    pub parameters: RunParameters,
    pub patches: PatchAnalysis,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{Georef, Grid};
    use crate::vectorize::geometry::MultiPolygon;
    use approx::assert_relative_eq;

    fn poly(class: ConnectivityClass, area_ha: f64, pixel_count: usize) -> ClassPolygon {
        ClassPolygon {
            class,
            region_id: 1,
            pixel_count,
            area_ha,
            geometry: MultiPolygon::default(),
        }
    }

    #[test]
    fn fragmentation_index_from_core_share() {
        let report = summarize(vec![
            poly(ConnectivityClass::Fragmented, 1.0, 10),
            poly(ConnectivityClass::Edge, 2.0, 20),
            poly(ConnectivityClass::Core, 1.0, 10),
            poly(ConnectivityClass::Core, 4.0, 40),
        ]);
        assert_relative_eq!(report.total_forest_area_ha, 8.0);
        assert_relative_eq!(report.area_ha(ConnectivityClass::Core), 5.0);
        assert_eq!(report.pixel_count(ConnectivityClass::Core), 50);
        assert_relative_eq!(report.fragmentation_index, 1.0 - 5.0 / 8.0);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn empty_input_is_a_valid_report() {
        let report = summarize(Vec::new());
        assert_eq!(report.total_forest_area_ha, 0.0);
        assert_eq!(report.fragmentation_index, 0.0);
        assert_eq!(report.warnings, vec![ReportWarning::NoForest]);
        assert_eq!(report.class_areas_ha.len(), 3);
        assert!(!report.has_forest());
    }

    #[test]
    fn pixel_statistics_scale_by_resolution() {
        let classes = Grid::from_vec(4, 1, vec![0u8, 1, 3, 3]).unwrap();
        let report = pixel_statistics(&ClassRaster::new(classes, Georef::default()), 30.0);
        assert_relative_eq!(report.area_ha(ConnectivityClass::Fragmented), 0.09);
        assert_relative_eq!(report.total_forest_area_ha, 0.27);
        assert_relative_eq!(report.fragmentation_index, 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn all_core_is_unfragmented() {
        let report = summarize(vec![poly(ConnectivityClass::Core, 3.0, 30)]);
        assert_eq!(report.fragmentation_index, 0.0);
    }
}
