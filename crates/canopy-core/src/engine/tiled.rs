//! Windowed engine.
//!
//! Each `tile_size` window is processed on its own, reading `neighborhood`
//! extra pixels on every side. Window sides on the raster boundary get the
//! same virtual non-forest ring the local engine uses; interior sides do not,
//! so distances are exact below `neighborhood × resolution` and saturate at
//! that value. Regions are labelled per window and joined across window seams
//! with a union–find before canonical numbering.
use std::collections::{BTreeSet, VecDeque};

use super::ConnectivityEngine;
use crate::classify::{self, Thresholds, NON_FOREST};
use crate::distance::{padded_sites, squared_distance_to_sites, unpad_distances, validate_resolution, BoundarySides};
use crate::error::{ConnectivityError, Result};
use crate::mask;
use crate::raster::{AffineTransform, ClassRaster, DistanceGrid, ForestMask, Grid, LulcRaster};
use crate::vectorize::regions::{RegionLabels, NEIGHBORS_8};
use crate::vectorize::{self, Polygons};

#[cfg(feature = "threading")]
use rayon::prelude::*;

#[derive(Debug, Clone, Copy)]
pub struct TiledEngine {
    tile_size: usize,
    neighborhood: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tile {
    row0: usize,
    col0: usize,
    width: usize,
    height: usize,
}

impl TiledEngine {
    pub fn new(tile_size: usize, neighborhood: usize) -> Result<Self> {
        if tile_size == 0 {
            return Err(ConnectivityError::parameter("tile_size must be at least 1 pixel"));
        }
        if neighborhood == 0 {
            return Err(ConnectivityError::parameter("neighborhood must be at least 1 pixel"));
        }
        Ok(Self { tile_size, neighborhood })
    }

    /// Largest distance, in metres, the engine resolves at `resolution`.
    pub fn saturation_distance(&self, resolution: f64) -> f64 {
        self.neighborhood as f64 * resolution
    }

    fn tiles(&self, width: usize, height: usize) -> Vec<Tile> {
        let mut tiles = Vec::new();
        for row0 in (0..height).step_by(self.tile_size) {
            for col0 in (0..width).step_by(self.tile_size) {
                tiles.push(Tile {
                    row0,
                    col0,
                    width: self.tile_size.min(width - col0),
                    height: self.tile_size.min(height - row0),
                });
            }
        }
        tiles
    }

    fn tile_distances(&self, forest: &Grid<bool>, tile: Tile, resolution: f64) -> Grid<f64> {
        let n = self.neighborhood;
        let r0 = tile.row0.saturating_sub(n);
        let c0 = tile.col0.saturating_sub(n);
        let r1 = (tile.row0 + tile.height + n).min(forest.height);
        let c1 = (tile.col0 + tile.width + n).min(forest.width);

        let halo = forest.window(r0, c0, c1 - c0, r1 - r0);
        let sides = BoundarySides {
            top: r0 == 0,
            bottom: r1 == forest.height,
            left: c0 == 0,
            right: c1 == forest.width,
        };
        let sq = squared_distance_to_sites(&padded_sites(&halo, sides));
        let values = unpad_distances(&halo, &sq, resolution, self.saturation_distance(resolution));
        values.window(tile.row0 - r0, tile.col0 - c0, tile.width, tile.height)
    }
}

/// Flood-fill labels inside one tile; labels are 1-based and tile-local.
fn label_tile(classes: &Grid<u8>, tile: Tile) -> (Vec<u32>, u32) {
    let (w, h) = (tile.width, tile.height);
    let mut local = vec![0u32; w * h];
    let mut next = 0u32;
    let mut queue = VecDeque::new();
    let class_at = |i: usize| classes.get(tile.row0 + i / w, tile.col0 + i % w);

    for start in 0..w * h {
        let class = class_at(start);
        if class == NON_FOREST || local[start] != 0 {
            continue;
        }
        next += 1;
        local[start] = next;
        queue.push_back(start);
        while let Some(i) = queue.pop_front() {
            let (r, c) = ((i / w) as isize, (i % w) as isize);
            for (dr, dc) in NEIGHBORS_8 {
                let (nr, nc) = (r + dr, c + dc);
                if nr < 0 || nc < 0 || nr >= h as isize || nc >= w as isize {
                    continue;
                }
                let j = nr as usize * w + nc as usize;
                if local[j] == 0 && class_at(j) == class {
                    local[j] = next;
                    queue.push_back(j);
                }
            }
        }
    }
    (local, next)
}

struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n as u32).collect() }
    }

    fn find(&mut self, mut x: u32) -> u32 {
        while self.parent[x as usize] != x {
            let grand = self.parent[self.parent[x as usize] as usize];
            self.parent[x as usize] = grand;
            x = grand;
        }
        x
    }

    fn union(&mut self, a: u32, b: u32) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb) as usize] = ra.min(rb);
        }
    }
}

impl TiledEngine {
    fn label_regions(&self, classes: &Grid<u8>) -> RegionLabels {
        let (w, h) = (classes.width, classes.height);
        let tiles = self.tiles(w, h);

        #[cfg(feature = "threading")]
        let per_tile: Vec<(Vec<u32>, u32)> = tiles.par_iter().map(|&t| label_tile(classes, t)).collect();
        #[cfg(not(feature = "threading"))]
        let per_tile: Vec<(Vec<u32>, u32)> = tiles.iter().map(|&t| label_tile(classes, t)).collect();

        // Lift tile-local labels into one global label space.
        let mut raw = vec![0u32; w * h];
        let mut offset = 0u32;
        for (tile, (local, count)) in tiles.iter().zip(&per_tile) {
            for (i, &l) in local.iter().enumerate() {
                if l != 0 {
                    raw[classes.index(tile.row0 + i / tile.width, tile.col0 + i % tile.width)] = offset + l;
                }
            }
            offset += count;
        }

        // Join labels across seams. Only neighbours in another tile can carry
        // a different label for the same region.
        let tile_of = |r: usize, c: usize| (r / self.tile_size, c / self.tile_size);
        let mut uf = UnionFind::new(offset as usize + 1);
        for r in 0..h {
            for c in 0..w {
                let idx = classes.index(r, c);
                if raw[idx] == 0 {
                    continue;
                }
                for (dr, dc) in [(0isize, 1isize), (1, -1), (1, 0), (1, 1)] {
                    let (nr, nc) = (r as isize + dr, c as isize + dc);
                    if nc < 0 || nr >= h as isize || nc >= w as isize {
                        continue;
                    }
                    let (nr, nc) = (nr as usize, nc as usize);
                    if tile_of(r, c) == tile_of(nr, nc) {
                        continue;
                    }
                    let n = classes.index(nr, nc);
                    if raw[n] != 0 && classes.data[n] == classes.data[idx] {
                        uf.union(raw[idx], raw[n]);
                    }
                }
            }
        }
        for l in raw.iter_mut().filter(|l| **l != 0) {
            *l = uf.find(*l);
        }

        log::debug!("tiled labelling: {} tiles, {offset} provisional labels", tiles.len());
        RegionLabels::from_raw(classes, &raw)
    }
}

impl ConnectivityEngine for TiledEngine {
    fn name(&self) -> &'static str {
        "tiled"
    }

    fn extract_forest_mask(&self, lulc: &LulcRaster, forest_classes: &BTreeSet<i32>) -> ForestMask {
        mask::extract_forest_mask(lulc, forest_classes)
    }

    fn compute_distance_from_edge(&self, mask: &ForestMask, resolution: f64) -> Result<DistanceGrid> {
        validate_resolution(resolution)?;
        let forest = &mask.cells;
        if forest.is_empty() {
            return Err(ConnectivityError::input("forest mask has zero cells"));
        }
        let tiles = self.tiles(forest.width, forest.height);

        #[cfg(feature = "threading")]
        let blocks: Vec<Grid<f64>> = tiles.par_iter().map(|&t| self.tile_distances(forest, t, resolution)).collect();
        #[cfg(not(feature = "threading"))]
        let blocks: Vec<Grid<f64>> = tiles.iter().map(|&t| self.tile_distances(forest, t, resolution)).collect();

        let mut values = Grid::new(forest.width, forest.height, 0.0f64);
        for (tile, block) in tiles.iter().zip(&blocks) {
            for r in 0..tile.height {
                let dst = values.index(tile.row0 + r, tile.col0);
                let src = r * tile.width;
                values.data[dst..dst + tile.width].copy_from_slice(&block.data[src..src + tile.width]);
            }
        }

        log::debug!(
            "tiled distance transform: {} tiles of {} px, halo {} px",
            tiles.len(),
            self.tile_size,
            self.neighborhood
        );
        Ok(DistanceGrid {
            values,
            resolution,
            georef: mask.georef.clone(),
        })
    }

    fn classify_connectivity(&self, distances: &DistanceGrid, thresholds: Thresholds) -> Result<ClassRaster> {
        thresholds.validate()?;
        let saturation = self.saturation_distance(distances.resolution);
        if thresholds.core_m > saturation {
            return Err(ConnectivityError::parameter(format!(
                "core threshold {} m exceeds the {saturation} m a {} px neighborhood resolves",
                thresholds.core_m, self.neighborhood
            )));
        }
        classify::classify_connectivity(distances, thresholds)
    }

    fn vectorize(
        &self,
        class_raster: &ClassRaster,
        transform: &AffineTransform,
        simplify_tolerance: f64,
    ) -> Result<Polygons> {
        vectorize::validate_inputs(class_raster, transform, simplify_tolerance)?;
        let labels = self.label_regions(&class_raster.classes);
        Ok(Polygons::from_labels(
            labels,
            *transform,
            class_raster.georef.crs.clone(),
            simplify_tolerance,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::compute_distance_from_edge;
    use crate::raster::Georef;
    use crate::vectorize::regions::label_regions;

    fn mask_from_fn(w: usize, h: usize, f: impl FnMut(usize, usize) -> bool) -> ForestMask {
        ForestMask::new(Grid::from_fn(w, h, f), Georef::default())
    }

    #[test]
    fn tiles_cover_raster_once() {
        let engine = TiledEngine::new(4, 2).unwrap();
        let tiles = engine.tiles(10, 5);
        assert_eq!(tiles.len(), 6);
        let covered: usize = tiles.iter().map(|t| t.width * t.height).sum();
        assert_eq!(covered, 50);
        assert_eq!(tiles[2], Tile { row0: 0, col0: 8, width: 2, height: 4 });
    }

    #[test]
    fn distances_match_local_below_saturation() {
        let mask = mask_from_fn(23, 17, |r, c| (r * 7 + c * 3) % 11 != 0 && !(r == 8 && c > 4));
        let local = compute_distance_from_edge(&mask, 30.0).unwrap();
        let engine = TiledEngine::new(5, 4).unwrap();
        let tiled = engine.compute_distance_from_edge(&mask, 30.0).unwrap();
        let cap = engine.saturation_distance(30.0);
        for (a, b) in local.values.data.iter().zip(&tiled.values.data) {
            assert_eq!(a.min(cap), *b);
        }
    }

    #[test]
    fn all_forest_saturates_in_the_middle() {
        let mask = mask_from_fn(40, 40, |_, _| true);
        let engine = TiledEngine::new(8, 3).unwrap();
        let d = engine.compute_distance_from_edge(&mask, 10.0).unwrap();
        assert_eq!(d.values.get(0, 0), 10.0);
        assert_eq!(d.values.get(1, 20), 20.0);
        assert_eq!(d.values.get(20, 20), 30.0);
    }

    #[test]
    fn seam_labels_match_whole_raster_labels() {
        let classes = Grid::from_fn(13, 11, |r, c| match (r + 2 * c) % 7 {
            0 | 1 => 0u8,
            2 | 3 => 1,
            4 => 2,
            _ => 3,
        });
        let engine = TiledEngine::new(3, 3).unwrap();
        assert_eq!(engine.label_regions(&classes), label_regions(&classes));
    }

    #[test]
    fn refuses_core_threshold_beyond_halo() {
        let mask = mask_from_fn(4, 4, |_, _| true);
        let engine = TiledEngine::new(2, 5).unwrap();
        let d = engine.compute_distance_from_edge(&mask, 30.0).unwrap();
        let err = engine
            .classify_connectivity(&d, Thresholds::new(100.0, 151.0).unwrap())
            .unwrap_err();
        assert!(err.is_invalid_parameter());
        assert!(engine.classify_connectivity(&d, Thresholds::new(100.0, 150.0).unwrap()).is_ok());
    }
}
