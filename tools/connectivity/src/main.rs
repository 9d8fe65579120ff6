/// Forest connectivity classification of a LULC GeoTIFF.
///
/// Writes into the output directory:
///   connectivity.tif      class raster (0 non-forest, 1 Fragmented, 2 Edge, 3 Core)
///   connectivity.geojson  one feature per contiguous class region
///   report.json           statistics, parameters and patch inventory
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use canopy_core::export::{geojson_string, report_json};
use canopy_core::{run_analysis, ConnectivityClass, ConnectivityConfig, EngineKind};
use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "connectivity", about = "Classify forest pixels into Fragmented / Edge / Core")]
struct Args {
    /// Input LULC GeoTIFF (single band, integer codes)
    input: PathBuf,

    /// Output directory (created if absent)
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// JSON config file; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// LULC codes counted as forest, comma separated
    #[arg(long, value_delimiter = ',')]
    forest_classes: Option<Vec<i32>>,

    /// Pixel size in metres
    #[arg(long)]
    resolution: Option<f64>,

    /// Edge threshold in metres
    #[arg(long)]
    edge: Option<f64>,

    /// Core threshold in metres
    #[arg(long)]
    core: Option<f64>,

    /// Simplification tolerance in CRS units (default: resolution / 3)
    #[arg(long)]
    simplify: Option<f64>,

    #[arg(long, value_enum)]
    engine: Option<EngineArg>,

    /// Tile size in pixels (tiled engine)
    #[arg(long, default_value_t = EngineKind::DEFAULT_TILE_SIZE)]
    tile_size: usize,

    /// Halo width in pixels (tiled engine)
    #[arg(long, default_value_t = EngineKind::DEFAULT_NEIGHBORHOOD)]
    neighborhood: usize,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EngineArg {
    Local,
    Tiled,
}

fn load_config(args: &Args) -> Result<ConnectivityConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Cannot read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        }
        None => ConnectivityConfig::default(),
    };

    if let Some(classes) = &args.forest_classes {
        config.forest_classes = classes.iter().copied().collect();
    }
    if let Some(v) = args.resolution {
        config.resolution_m = v;
    }
    if let Some(v) = args.edge {
        config.edge_threshold_m = v;
    }
    if let Some(v) = args.core {
        config.core_threshold_m = v;
    }
    if args.simplify.is_some() {
        config.simplify_tolerance_m = args.simplify;
    }
    match args.engine {
        Some(EngineArg::Local) => config.engine = EngineKind::Local,
        Some(EngineArg::Tiled) => {
            config.engine = EngineKind::Tiled {
                tile_size: args.tile_size,
                neighborhood: args.neighborhood,
            }
        }
        None => {}
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = load_config(&args)?;

    eprintln!("[connectivity] Reading {}", args.input.display());
    let lulc = canopy_geotiff::read_lulc(&args.input)
        .with_context(|| format!("Cannot load LULC raster {}", args.input.display()))?;
    eprintln!(
        "[connectivity] {}×{} px, {}, forest classes {:?}",
        lulc.width(),
        lulc.height(),
        lulc.georef.crs,
        config.forest_classes
    );

    let out = run_analysis(&lulc, &config).context("Analysis failed")?;

    fs::create_dir_all(&args.output)
        .with_context(|| format!("Cannot create {}", args.output.display()))?;

    let tif_path = args.output.join("connectivity.tif");
    canopy_geotiff::write_class_raster(&tif_path, &out.classes)
        .with_context(|| format!("Write failed: {}", tif_path.display()))?;

    let geojson_path = args.output.join("connectivity.geojson");
    fs::write(&geojson_path, geojson_string(&out.polygons))
        .with_context(|| format!("Write failed: {}", geojson_path.display()))?;

    let report_path = args.output.join("report.json");
    fs::write(&report_path, report_json(&out.run_report(&config))?)
        .with_context(|| format!("Write failed: {}", report_path.display()))?;

    for class in ConnectivityClass::ALL {
        eprintln!(
            "  {:<10} {:>10} px {:>12.2} ha",
            class.name(),
            out.report.pixel_count(class),
            out.report.area_ha(class)
        );
    }
    eprintln!(
        "  total forest {:.2} ha, fragmentation index {:.4}, {} patches, {} polygons",
        out.report.total_forest_area_ha,
        out.report.fragmentation_index,
        out.patches.patch_count,
        out.polygons.len()
    );
    if !out.report.has_forest() {
        eprintln!("  [warn] No forest pixels matched {:?}", config.forest_classes);
    }
    eprintln!("[connectivity] Done → {}", args.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn config_file(dir: &tempfile::TempDir, json: &str) -> String {
        let path = dir.path().join("config.json");
        fs::write(&path, json).unwrap();
        path.display().to_string()
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file(&dir, r#"{ "forest_classes": [3], "edge_threshold_m": 90, "engine": { "kind": "local" } }"#);
        let args = Args::parse_from([
            "connectivity", "in.tif", "--config", &path, "--engine", "tiled", "--tile-size", "64",
            "--neighborhood", "12", "--core", "270",
        ]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.engine, EngineKind::Tiled { tile_size: 64, neighborhood: 12 });
        assert_eq!(config.edge_threshold_m, 90.0);
        assert_eq!(config.core_threshold_m, 270.0);
        assert_eq!(config.forest_classes, BTreeSet::from([3]));
    }

    #[test]
    fn engine_from_file_survives_without_engine_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file(
            &dir,
            r#"{ "core_threshold_m": 240, "engine": { "kind": "tiled", "tile_size": 32, "neighborhood": 10 } }"#,
        );
        let args = Args::parse_from(["connectivity", "in.tif", "--config", &path, "--edge", "60"]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.engine, EngineKind::Tiled { tile_size: 32, neighborhood: 10 });
        assert_eq!(config.edge_threshold_m, 60.0);
    }

    #[test]
    fn short_halo_from_flags_is_rejected() {
        let args = Args::parse_from(["connectivity", "in.tif", "--engine", "tiled", "--neighborhood", "5"]);
        assert!(load_config(&args).is_err());
    }
}
