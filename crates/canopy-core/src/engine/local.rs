use std::collections::BTreeSet;

use super::ConnectivityEngine;
use crate::classify::{self, Thresholds};
use crate::distance;
use crate::error::Result;
use crate::mask;
use crate::raster::{AffineTransform, ClassRaster, DistanceGrid, ForestMask, LulcRaster};
use crate::vectorize::{self, Polygons};

/// Whole-raster, in-memory engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalEngine;

impl ConnectivityEngine for LocalEngine {
    fn name(&self) -> &'static str {
        "local"
    }

    fn extract_forest_mask(&self, lulc: &LulcRaster, forest_classes: &BTreeSet<i32>) -> ForestMask {
        mask::extract_forest_mask(lulc, forest_classes)
    }

    fn compute_distance_from_edge(&self, mask: &ForestMask, resolution: f64) -> Result<DistanceGrid> {
        distance::compute_distance_from_edge(mask, resolution)
    }

    fn classify_connectivity(&self, distances: &DistanceGrid, thresholds: Thresholds) -> Result<ClassRaster> {
        classify::classify_connectivity(distances, thresholds)
    }

    fn vectorize(
        &self,
        class_raster: &ClassRaster,
        transform: &AffineTransform,
        simplify_tolerance: f64,
    ) -> Result<Polygons> {
        vectorize::vectorize(class_raster, transform, simplify_tolerance)
    }
}
