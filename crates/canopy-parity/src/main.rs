/// Cross-engine parity harness.
///
/// Runs the local and the tiled engine on the same raster with the same
/// parameters and compares per-class pixel counts, per-class areas and the
/// number of polygons. Exits non-zero when a difference exceeds tolerance.
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use canopy_core::{
    run_analysis, AffineTransform, AnalysisOutput, ConnectivityClass, ConnectivityConfig, Crs, EngineKind,
    Georef, Grid, LulcRaster,
};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "canopy-parity", about = "Compare local and tiled engine outputs")]
struct Args {
    /// LULC GeoTIFF; a synthetic raster is generated when omitted
    #[arg(long)]
    input: Option<PathBuf>,

    /// JSON config file shared by both runs
    #[arg(long)]
    config: Option<PathBuf>,

    /// Side length of the synthetic raster in pixels
    #[arg(long, default_value = "384")]
    size: usize,

    #[arg(long, default_value = "42")]
    seed: u64,

    /// Tile size of the tiled engine
    #[arg(long, default_value = "64")]
    tile_size: usize,

    /// Halo of the tiled engine in pixels (default: just enough for the core threshold)
    #[arg(long)]
    neighborhood: Option<usize>,

    /// Allowed per-class pixel count difference
    #[arg(long, default_value = "0")]
    pixel_tolerance: usize,

    /// Allowed relative per-class area difference
    #[arg(long, default_value = "0.005")]
    area_tolerance: f64,

    /// Print the comparison as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct ClassDelta {
    class: &'static str,
    local_pixels: usize,
    tiled_pixels: usize,
    local_area_ha: f64,
    tiled_area_ha: f64,
    relative_area_delta: f64,
}

#[derive(Debug, Serialize)]
struct ParityReport {
    width: usize,
    height: usize,
    tile_size: usize,
    neighborhood: usize,
    mismatched_pixels: usize,
    local_polygons: usize,
    tiled_polygons: usize,
    classes: Vec<ClassDelta>,
    defects: Vec<String>,
}

/// Scattered discs of forest (code 3) on agriculture (code 6).
fn synthetic_lulc(size: usize, seed: u64) -> Result<LulcRaster> {
    let mut rng = StdRng::seed_from_u64(seed);
    let discs: Vec<(i64, i64, i64)> = (0..size / 8 + 1)
        .map(|_| {
            (
                rng.gen_range(0..size.max(1)) as i64,
                rng.gen_range(0..size.max(1)) as i64,
                rng.gen_range(2..(size as i64 / 6).max(3)),
            )
        })
        .collect();
    let codes = Grid::from_fn(size, size, |r, c| {
        let inside = discs.iter().any(|&(dr, dc, rad)| {
            let (y, x) = (r as i64 - dr, c as i64 - dc);
            x * x + y * y < rad * rad
        });
        if inside {
            3
        } else {
            6
        }
    });
    let georef = Georef::new(
        AffineTransform::from_origin(700_000.0, 2_500_000.0, 30.0, 30.0),
        Crs::epsg(32644),
    );
    Ok(LulcRaster::new(codes, georef)?)
}

fn compare(
    local: &AnalysisOutput,
    tiled: &AnalysisOutput,
    args: &Args,
    neighborhood: usize,
) -> ParityReport {
    let mismatched_pixels = local
        .classes
        .classes
        .data
        .iter()
        .zip(&tiled.classes.classes.data)
        .filter(|(a, b)| a != b)
        .count();

    let mut defects = Vec::new();
    let classes = ConnectivityClass::ALL
        .iter()
        .map(|&class| {
            let (lp, tp) = (local.report.pixel_count(class), tiled.report.pixel_count(class));
            let (la, ta) = (local.report.area_ha(class), tiled.report.area_ha(class));
            let relative_area_delta = if la > 0.0 { (ta - la).abs() / la } else { ta.abs() };
            if lp.abs_diff(tp) > args.pixel_tolerance {
                defects.push(format!("{class}: {lp} px local vs {tp} px tiled"));
            }
            if relative_area_delta > args.area_tolerance {
                defects.push(format!("{class}: area differs by {:.3}%", relative_area_delta * 100.0));
            }
            ClassDelta {
                class: class.name(),
                local_pixels: lp,
                tiled_pixels: tp,
                local_area_ha: la,
                tiled_area_ha: ta,
                relative_area_delta,
            }
        })
        .collect();

    ParityReport {
        width: local.classes.width(),
        height: local.classes.height(),
        tile_size: args.tile_size,
        neighborhood,
        mismatched_pixels,
        local_polygons: local.polygons.len(),
        tiled_polygons: tiled.polygons.len(),
        classes,
        defects,
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Cannot read {}", path.display()))?;
            ConnectivityConfig::from_json(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => ConnectivityConfig::default(),
    };

    let lulc = match &args.input {
        Some(path) => canopy_geotiff::read_lulc(path)
            .with_context(|| format!("Cannot load LULC raster {}", path.display()))?,
        None => {
            eprintln!("[parity] Synthetic {0}×{0} raster, seed {1}", args.size, args.seed);
            synthetic_lulc(args.size, args.seed)?
        }
    };

    let neighborhood = args
        .neighborhood
        .unwrap_or_else(|| (config.core_threshold_m / config.resolution_m).ceil() as usize);
    let local_config = ConnectivityConfig { engine: EngineKind::Local, ..config.clone() };
    let tiled_config = ConnectivityConfig {
        engine: EngineKind::Tiled { tile_size: args.tile_size, neighborhood },
        ..config
    };

    eprintln!("[parity] Local engine ...");
    let local = run_analysis(&lulc, &local_config).context("Local engine failed")?;
    eprintln!("[parity] Tiled engine ({} px tiles, {neighborhood} px halo) ...", args.tile_size);
    let tiled = run_analysis(&lulc, &tiled_config).context("Tiled engine failed")?;

    let report = compare(&local, &tiled, &args, neighborhood);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{:<11} {:>10} {:>10} {:>12} {:>12} {:>9}",
            "Class", "LocalPx", "TiledPx", "LocalHa", "TiledHa", "ΔArea%"
        );
        println!("{}", "-".repeat(69));
        for c in &report.classes {
            println!(
                "{:<11} {:>10} {:>10} {:>12.3} {:>12.3} {:>9.4}",
                c.class,
                c.local_pixels,
                c.tiled_pixels,
                c.local_area_ha,
                c.tiled_area_ha,
                c.relative_area_delta * 100.0
            );
        }
        println!(
            "mismatched pixels: {}, polygons: {} local / {} tiled",
            report.mismatched_pixels, report.local_polygons, report.tiled_polygons
        );
    }

    if !report.defects.is_empty() {
        for d in &report.defects {
            eprintln!("  [defect] {d}");
        }
        bail!("{} parity defect(s)", report.defects.len());
    }
    eprintln!("[parity] Engines agree.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_raster_runs_clean() {
        let args = Args::parse_from(["canopy-parity", "--size", "96", "--tile-size", "20"]);
        let lulc = synthetic_lulc(args.size, args.seed).unwrap();
        let config = ConnectivityConfig::default();
        let local = run_analysis(&lulc, &config).unwrap();
        let tiled = run_analysis(
            &lulc,
            &ConnectivityConfig {
                engine: EngineKind::Tiled { tile_size: 20, neighborhood: 10 },
                ..config
            },
        )
        .unwrap();
        let report = compare(&local, &tiled, &args, 10);
        assert_eq!(report.mismatched_pixels, 0);
        assert!(report.defects.is_empty(), "{:?}", report.defects);
        assert_eq!(report.local_polygons, report.tiled_polygons);
    }
}
