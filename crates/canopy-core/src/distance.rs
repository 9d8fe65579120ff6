//! Exact Euclidean distance from forest cells to the nearest non-forest cell.
//!
//! Separable lower-envelope-of-parabolas transform (Felzenszwalb &
//! Huttenlocher 2012): one 1D pass down every column, then one along every row.
//! Squared distances are sums of squared integers and stay exact in f64, so
//! any engine running this transform on the same sites gets bit-identical
//! output.
//!
//! Boundary policy: the raster is surrounded by a one-cell ring of virtual
//! non-forest cells. A forest cell at row `r` is therefore never farther than
//! `r + 1` pixels from the top edge, and an all-forest raster still gets finite
//! distances that peak in its centre.
use crate::error::{ConnectivityError, Result};
use crate::raster::{DistanceGrid, ForestMask, Grid};

#[cfg(feature = "threading")]
use rayon::prelude::*;

/// Which sides of a padded grid count as non-forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundarySides {
    pub top: bool,
    pub bottom: bool,
    pub left: bool,
    pub right: bool,
}

impl BoundarySides {
    /// The whole raster edge is treated as non-forest.
    pub const ALL: Self = Self { top: true, bottom: true, left: true, right: true };
}

/// Compute distance-from-edge in metres for every cell of `mask`.
///
/// Non-forest cells map to exactly 0. Forest cells map to
/// `sqrt(d²) × resolution` where `d²` is the squared pixel distance to the
/// nearest non-forest cell or virtual boundary cell, so every forest cell is
/// at least `resolution` away.
pub fn compute_distance_from_edge(mask: &ForestMask, resolution: f64) -> Result<DistanceGrid> {
    validate_resolution(resolution)?;
    if mask.cells.is_empty() {
        return Err(ConnectivityError::input("forest mask has zero cells"));
    }

    let sites = padded_sites(&mask.cells, BoundarySides::ALL);
    let sq = squared_distance_to_sites(&sites);
    let values = unpad_distances(&mask.cells, &sq, resolution, f64::INFINITY);

    log::debug!(
        "distance transform: {}×{} cells, resolution {resolution} m",
        mask.cells.width,
        mask.cells.height
    );

    Ok(DistanceGrid {
        values,
        resolution,
        georef: mask.georef.clone(),
    })
}

pub(crate) fn validate_resolution(resolution: f64) -> Result<()> {
    if !resolution.is_finite() || resolution <= 0.0 {
        return Err(ConnectivityError::parameter(format!(
            "resolution must be a positive finite number of metres, got {resolution}"
        )));
    }
    Ok(())
}

/// Surround `forest` with a one-cell ring and invert it into a site grid
/// (`true` = non-forest). Ring cells on a side flagged in `sides` are sites.
pub(crate) fn padded_sites(forest: &Grid<bool>, sides: BoundarySides) -> Grid<bool> {
    let w = forest.width + 2;
    let h = forest.height + 2;
    Grid::from_fn(w, h, |r, c| {
        if r == 0 {
            sides.top || (c == 0 && sides.left) || (c == w - 1 && sides.right)
        } else if r == h - 1 {
            sides.bottom || (c == 0 && sides.left) || (c == w - 1 && sides.right)
        } else if c == 0 {
            sides.left
        } else if c == w - 1 {
            sides.right
        } else {
            !forest.get(r - 1, c - 1)
        }
    })
}

/// Strip the padding ring from a squared-distance grid and scale to metres.
/// Distances are capped at `saturation` metres; non-forest cells are 0.
pub(crate) fn unpad_distances(
    forest: &Grid<bool>,
    sq: &Grid<f64>,
    resolution: f64,
    saturation: f64,
) -> Grid<f64> {
    Grid::from_fn(forest.width, forest.height, |r, c| {
        if !forest.get(r, c) {
            return 0.0;
        }
        let d = sq.get(r + 1, c + 1).sqrt() * resolution;
        d.min(saturation)
    })
}

/// Squared Euclidean distance, in pixel units, from every cell to the nearest
/// `true` cell. Cells with no site anywhere in the grid get `f64::INFINITY`.
pub fn squared_distance_to_sites(sites: &Grid<bool>) -> Grid<f64> {
    let (w, h) = (sites.width, sites.height);
    if w == 0 || h == 0 {
        return Grid { data: Vec::new(), width: w, height: h };
    }

    // Column pass, stored transposed so each column is a contiguous line.
    let mut columns = vec![0.0f64; w * h];
    for_each_line(&mut columns, h, |c, line| {
        let f: Vec<f64> = (0..h)
            .map(|r| if sites.get(r, c) { 0.0 } else { f64::INFINITY })
            .collect();
        lower_envelope_1d(&f, line);
    });

    // Row pass over the column result.
    let mut data = vec![0.0f64; w * h];
    for_each_line(&mut data, w, |r, line| {
        let f: Vec<f64> = (0..w).map(|c| columns[c * h + r]).collect();
        lower_envelope_1d(&f, line);
    });

    Grid { data, width: w, height: h }
}

#[cfg(feature = "threading")]
fn for_each_line(buf: &mut [f64], len: usize, op: impl Fn(usize, &mut [f64]) + Sync + Send) {
    buf.par_chunks_mut(len).enumerate().for_each(|(i, line)| op(i, line));
}

#[cfg(not(feature = "threading"))]
fn for_each_line(buf: &mut [f64], len: usize, op: impl Fn(usize, &mut [f64])) {
    buf.chunks_mut(len).enumerate().for_each(|(i, line)| op(i, line));
}

/// 1D squared distance transform of sampled function `f` into `out`:
/// `out[q] = min_p ((q − p)² + f[p])`. Infinite samples contribute nothing.
fn lower_envelope_1d(f: &[f64], out: &mut [f64]) {
    let n = f.len();
    // v: parabola apexes on the envelope; z: left boundary of each parabola.
    let mut v = vec![0usize; n];
    let mut z = vec![0.0f64; n];
    let mut count = 0usize;

    for q in 0..n {
        if !f[q].is_finite() {
            continue;
        }
        let fq = f[q] + (q * q) as f64;
        let mut s = f64::NEG_INFINITY;
        while count > 0 {
            let p = v[count - 1];
            s = (fq - (f[p] + (p * p) as f64)) / (2.0 * (q - p) as f64);
            if s <= z[count - 1] {
                count -= 1;
            } else {
                break;
            }
        }
        if count == 0 {
            s = f64::NEG_INFINITY;
        }
        v[count] = q;
        z[count] = s;
        count += 1;
    }

    if count == 0 {
        out.iter_mut().for_each(|d| *d = f64::INFINITY);
        return;
    }

    let mut k = 0usize;
    for (q, d) in out.iter_mut().enumerate() {
        while k + 1 < count && z[k + 1] < q as f64 {
            k += 1;
        }
        let dq = q as f64 - v[k] as f64;
        *d = dq * dq + f[v[k]];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Georef;
    use approx::assert_relative_eq;

    fn mask_from(width: usize, rows: &[&str]) -> ForestMask {
        let data: Vec<bool> = rows.iter().flat_map(|r| r.chars().map(|ch| ch == '#')).collect();
        let height = data.len() / width;
        ForestMask::new(Grid::from_vec(width, height, data).unwrap(), Georef::default())
    }

    /// Brute force over every site, boundary ring included.
    fn brute_force(mask: &ForestMask) -> Vec<f64> {
        let sites = padded_sites(&mask.cells, BoundarySides::ALL);
        let mut out = Vec::new();
        for r in 0..mask.cells.height {
            for c in 0..mask.cells.width {
                if !mask.cells.get(r, c) {
                    out.push(0.0);
                    continue;
                }
                let mut best = f64::INFINITY;
                for sr in 0..sites.height {
                    for sc in 0..sites.width {
                        if sites.get(sr, sc) {
                            let dr = sr as f64 - (r + 1) as f64;
                            let dc = sc as f64 - (c + 1) as f64;
                            best = best.min(dr * dr + dc * dc);
                        }
                    }
                }
                out.push(best.sqrt());
            }
        }
        out
    }

    #[test]
    fn center_of_forest_block_is_two_pixels_out() {
        let mask = mask_from(5, &[".....", ".###.", ".###.", ".###.", "....."]);
        let d = compute_distance_from_edge(&mask, 10.0).unwrap();
        assert_eq!(d.values.get(2, 2), 20.0);
        assert_eq!(d.values.get(1, 1), 10.0);
        assert_eq!(d.values.get(0, 0), 0.0);
    }

    #[test]
    fn diagonal_distances_are_euclidean() {
        // Single non-forest cell in the middle of a 9×9 forest: the cell two
        // rows and one column away is sqrt(5) pixels from it.
        let mut rows = vec!["#########"; 9];
        rows[4] = "####.####";
        let mask = mask_from(9, &rows);
        let d = compute_distance_from_edge(&mask, 1.0).unwrap();
        assert_relative_eq!(d.values.get(2, 3), 5f64.sqrt());
        assert_relative_eq!(d.values.get(3, 3), 2f64.sqrt());
    }

    #[test]
    fn matches_brute_force_on_irregular_mask() {
        let mask = mask_from(
            8,
            &[
                "########", "###..###", "##....##", "########", "#.######", "########", "######.#",
            ],
        );
        let d = compute_distance_from_edge(&mask, 1.0).unwrap();
        for (got, want) in d.values.data.iter().zip(brute_force(&mask)) {
            assert_relative_eq!(*got, want);
        }
    }

    #[test]
    fn all_forest_uses_raster_boundary() {
        let mask = ForestMask::new(Grid::new(10, 10, true), Georef::default());
        let d = compute_distance_from_edge(&mask, 30.0).unwrap();
        assert_eq!(d.values.get(0, 0), 30.0);
        assert_eq!(d.values.get(4, 4), 150.0);
        assert_eq!(d.values.get(5, 5), 150.0);
        assert_eq!(d.max_distance(), 150.0);
        assert!(d.values.data.iter().all(|v| v.is_finite() && *v > 0.0));
    }

    #[test]
    fn rejects_bad_resolution_and_empty_mask() {
        let mask = ForestMask::new(Grid::new(2, 2, true), Georef::default());
        assert!(compute_distance_from_edge(&mask, 0.0).unwrap_err().is_invalid_parameter());
        assert!(compute_distance_from_edge(&mask, -30.0).unwrap_err().is_invalid_parameter());
        assert!(compute_distance_from_edge(&mask, f64::NAN).unwrap_err().is_invalid_parameter());

        let empty = ForestMask::new(Grid::new(0, 0, true), Georef::default());
        assert!(compute_distance_from_edge(&empty, 30.0).unwrap_err().is_invalid_input());
    }

    #[test]
    fn no_sites_gives_infinity() {
        let sites = Grid::new(3, 2, false);
        let sq = squared_distance_to_sites(&sites);
        assert!(sq.data.iter().all(|v| v.is_infinite()));
    }
}
