/// Synthetic LULC GeoTIFF for demos: agriculture background, one large
/// circular forest in the middle and a scatter of small forest patches.
///
/// Codes: 1 water, 2 built-up, 3 deciduous forest, 4 evergreen forest,
/// 6 agriculture. Only 6 and 3 are written.
use std::path::PathBuf;

use anyhow::{Context, Result};
use canopy_core::{AffineTransform, Crs, Georef, Grid, LulcRaster};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const AGRICULTURE: i32 = 6;
const DECIDUOUS_FOREST: i32 = 3;

/// UTM 44N.
const EPSG: u32 = 32644;
const ORIGIN_EAST: f64 = 700_000.0;
const ORIGIN_NORTH: f64 = 2_500_000.0;
const PIXEL_M: f64 = 30.0;

#[derive(Parser, Debug)]
#[command(name = "sample_lulc", about = "Write a synthetic LULC GeoTIFF")]
struct Args {
    /// Output GeoTIFF path
    #[arg(short, long, default_value = "data/sample_lulc.tif")]
    output: PathBuf,

    /// Raster rows
    #[arg(long, default_value = "500")]
    rows: usize,

    /// Raster columns
    #[arg(long, default_value = "500")]
    cols: usize,

    /// Number of small scattered patches
    #[arg(long, default_value = "20")]
    patches: usize,

    #[arg(long, default_value = "42")]
    seed: u64,
}

struct Disc {
    row: i64,
    col: i64,
    radius: i64,
}

impl Disc {
    /// Strictly inside: `dx² + dy² < r²`.
    fn contains(&self, row: usize, col: usize) -> bool {
        let dy = row as i64 - self.row;
        let dx = col as i64 - self.col;
        dx * dx + dy * dy < self.radius * self.radius
    }
}

fn generate(rows: usize, cols: usize, patches: usize, seed: u64) -> Grid<i32> {
    let mut discs = vec![Disc {
        row: (rows / 2) as i64,
        col: (cols / 2) as i64,
        radius: (rows / 4) as i64,
    }];
    let mut rng = StdRng::seed_from_u64(seed);
    for _ in 0..patches {
        let col = rng.gen_range(0..cols.max(1)) as i64;
        let row = rng.gen_range(0..rows.max(1)) as i64;
        let radius = rng.gen_range(5..20);
        discs.push(Disc { row, col, radius });
    }

    Grid::from_fn(cols, rows, |r, c| {
        if discs.iter().any(|d| d.contains(r, c)) {
            DECIDUOUS_FOREST
        } else {
            AGRICULTURE
        }
    })
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let codes = generate(args.rows, args.cols, args.patches, args.seed);
    let forest = codes.data.iter().filter(|&&c| c == DECIDUOUS_FOREST).count();
    let georef = Georef::new(
        AffineTransform::from_origin(ORIGIN_EAST, ORIGIN_NORTH, PIXEL_M, PIXEL_M),
        Crs::epsg(EPSG),
    );
    let raster = LulcRaster::new(codes, georef).context("Invalid raster shape")?;

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create {}", parent.display()))?;
    }
    canopy_geotiff::write_lulc(&args.output, &raster)
        .with_context(|| format!("Write failed: {}", args.output.display()))?;

    eprintln!(
        "[sample_lulc] {}×{} px, {} forest px ({:.1}%) → {}",
        args.cols,
        args.rows,
        forest,
        100.0 * forest as f64 / (args.rows * args.cols).max(1) as f64,
        args.output.display()
    );
    Ok(())
}
