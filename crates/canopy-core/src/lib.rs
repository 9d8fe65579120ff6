pub mod classify;
pub mod config;
pub mod distance;
pub mod engine;
pub mod error;
pub mod export;
pub mod mask;
pub mod patches;
pub mod pipeline;
pub mod raster;
pub mod report;
pub mod vectorize;

pub use classify::{classify_connectivity, ConnectivityClass, Thresholds};
pub use config::{ConnectivityConfig, EngineKind};
pub use distance::compute_distance_from_edge;
pub use engine::{engine_for, ConnectivityEngine, LocalEngine, TiledEngine};
pub use error::{ConnectivityError, Result};
pub use mask::extract_forest_mask;
pub use patches::{analyze_patches, PatchAnalysis};
pub use pipeline::{run_analysis, AnalysisOutput};
pub use raster::{AffineTransform, ClassRaster, Crs, DistanceGrid, ForestMask, Georef, Grid, LulcRaster};
pub use report::{pixel_statistics, summarize, ConnectivityReport, ReportWarning, RunReport};
pub use vectorize::{vectorize, ClassPolygon, Polygons};
