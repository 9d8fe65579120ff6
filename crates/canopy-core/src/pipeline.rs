//! One analysis run: LULC raster in, every artifact out.
use std::time::Instant;

use crate::config::ConnectivityConfig;
use crate::engine::engine_for;
use crate::error::Result;
use crate::patches::{analyze_patches, PatchAnalysis};
use crate::raster::{ClassRaster, DistanceGrid, ForestMask, LulcRaster};
use crate::report::{summarize, ConnectivityReport, RunMeta, RunParameters, RunReport};
use crate::vectorize::Polygons;

/// Artifacts of one run, each produced once and handed out read-only.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub engine: &'static str,
    pub mask: ForestMask,
    pub distances: DistanceGrid,
    pub classes: ClassRaster,
    pub polygons: Polygons,
    pub report: ConnectivityReport,
    pub patches: PatchAnalysis,
}

impl AnalysisOutput {
    /// Bundle the output with its run parameters for `report.json`.
    pub fn run_report(&self, config: &ConnectivityConfig) -> RunReport {
        RunReport {
            meta: RunMeta {
                crs: self.classes.georef.crs.clone(),
                resolution_m: config.resolution_m,
                width: self.classes.width(),
                height: self.classes.height(),
                engine: self.engine.to_string(),
            },
            statistics: self.report.clone(),
            parameters: RunParameters {
                edge_threshold_m: config.edge_threshold_m,
                core_threshold_m: config.core_threshold_m,
                simplify_tolerance_m: config.effective_simplify_tolerance(),
                forest_classes: config.forest_classes.clone(),
            },
            patches: self.patches.clone(),
        }
    }
}

/// Run the whole chain with the engine `config.engine` selects.
pub fn run_analysis(lulc: &LulcRaster, config: &ConnectivityConfig) -> Result<AnalysisOutput> {
    config.validate()?;
    let engine = engine_for(&config.engine)?;
    let transform = lulc.georef.transform;

    let pixel = transform.pixel_area().sqrt();
    if !lulc.georef.crs.is_geographic() && (pixel - config.resolution_m).abs() > 1e-6 * config.resolution_m {
        log::warn!(
            "resolution_m {} disagrees with the transform's {pixel} m pixels",
            config.resolution_m
        );
    }

    let t0 = Instant::now();
    let mask = engine.extract_forest_mask(lulc, &config.forest_classes);
    let distances = engine.compute_distance_from_edge(&mask, config.resolution_m)?;
    let classes = engine.classify_connectivity(&distances, config.thresholds())?;
    let polygons = engine.vectorize(&classes, &transform, config.effective_simplify_tolerance())?;
    let report = summarize(&polygons);
    let patches = analyze_patches(&mask, config.resolution_m)?;

    log::info!(
        "{} engine: {}×{} raster, {} forest px, {} polygons in {:.2?}",
        engine.name(),
        lulc.width(),
        lulc.height(),
        mask.forest_count(),
        polygons.len(),
        t0.elapsed()
    );

    Ok(AnalysisOutput {
        engine: engine.name(),
        mask,
        distances,
        classes,
        polygons,
        report,
        patches,
    })
}
