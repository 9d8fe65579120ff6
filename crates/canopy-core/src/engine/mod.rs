//! Interchangeable engines for the mask → distance → classify → vectorize chain.
//!
//! Both engines share the distance kernel, the threshold comparisons and the
//! canonical region numbering, so under matched parameters they agree on every
//! class assignment and every polygon.
mod local;
mod tiled;

pub use local::LocalEngine;
pub use tiled::TiledEngine;

use std::collections::BTreeSet;

use crate::classify::Thresholds;
use crate::config::EngineKind;
use crate::error::Result;
use crate::raster::{AffineTransform, ClassRaster, DistanceGrid, ForestMask, LulcRaster};
use crate::vectorize::Polygons;

/// The stage operations an engine has to provide.
pub trait ConnectivityEngine: Send + Sync {
    /// Short identifier written into run reports.
    fn name(&self) -> &'static str;

    fn extract_forest_mask(&self, lulc: &LulcRaster, forest_classes: &BTreeSet<i32>) -> ForestMask;

    fn compute_distance_from_edge(&self, mask: &ForestMask, resolution: f64) -> Result<DistanceGrid>;

    fn classify_connectivity(&self, distances: &DistanceGrid, thresholds: Thresholds) -> Result<ClassRaster>;

    fn vectorize(
        &self,
        class_raster: &ClassRaster,
        transform: &AffineTransform,
        simplify_tolerance: f64,
    ) -> Result<Polygons>;
}

/// Build the engine selected by `kind`.
pub fn engine_for(kind: &EngineKind) -> Result<Box<dyn ConnectivityEngine>> {
    Ok(match *kind {
        EngineKind::Local => Box::new(LocalEngine),
        EngineKind::Tiled { tile_size, neighborhood } => Box::new(TiledEngine::new(tile_size, neighborhood)?),
    })
}
