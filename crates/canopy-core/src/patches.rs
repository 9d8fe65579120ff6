//! Forest patch inventory: 8-connected forest components of the mask.
use serde::{Deserialize, Serialize};

use crate::distance::validate_resolution;
use crate::error::Result;
use crate::raster::ForestMask;
use crate::vectorize::regions::label_regions;

/// Pixel bounding box, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBounds {
    pub min_row: usize,
    pub min_col: usize,
    pub max_row: usize,
    pub max_col: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub id: u32,
    pub pixel_count: usize,
    pub area_ha: f64,
    pub bounds: PixelBounds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchAnalysis {
    pub patch_count: usize,
    /// `min(1, patch_count / sqrt(forest pixels))`; 0 without forest.
    pub patch_density_index: f64,
    /// Largest first, ties by id.
    pub patches: Vec<Patch>,
}

impl PatchAnalysis {
    pub fn largest(&self) -> Option<&Patch> {
        self.patches.first()
    }
}

pub fn analyze_patches(mask: &ForestMask, resolution: f64) -> Result<PatchAnalysis> {
    validate_resolution(resolution)?;
    let binary = mask.cells.map(|&f| u8::from(f));
    let labels = label_regions(&binary);
    let width = mask.cells.width;
    let pixel_ha = resolution * resolution / 10_000.0;

    let mut patches: Vec<Patch> = labels
        .regions
        .iter()
        .map(|region| {
            let mut bounds = PixelBounds {
                min_row: usize::MAX,
                min_col: usize::MAX,
                max_row: 0,
                max_col: 0,
            };
            for &idx in labels.cells_of(region.id) {
                let (r, c) = (idx as usize / width, idx as usize % width);
                bounds.min_row = bounds.min_row.min(r);
                bounds.min_col = bounds.min_col.min(c);
                bounds.max_row = bounds.max_row.max(r);
                bounds.max_col = bounds.max_col.max(c);
            }
            Patch {
                id: region.id,
                pixel_count: region.pixel_count,
                area_ha: region.pixel_count as f64 * pixel_ha,
                bounds,
            }
        })
        .collect();
    patches.sort_by(|a, b| b.pixel_count.cmp(&a.pixel_count).then(a.id.cmp(&b.id)));

    let forest: usize = patches.iter().map(|p| p.pixel_count).sum();
    let patch_density_index = if forest == 0 {
        0.0
    } else {
        (patches.len() as f64 / (forest as f64).sqrt()).min(1.0)
    };

    log::debug!("patches: {} patches over {forest} forest pixels", patches.len());
    Ok(PatchAnalysis {
        patch_count: patches.len(),
        patch_density_index,
        patches,
    })
}
