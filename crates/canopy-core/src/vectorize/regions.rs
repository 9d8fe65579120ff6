//! 8-connected region grouping of same-class cells.
//!
//! Region ids are canonical: regions are numbered 1.. in raster order of their
//! first cell, so any labelling algorithm that finds the same regions yields
//! the same [`RegionLabels`].
use std::collections::VecDeque;

use crate::classify::NON_FOREST;
use crate::raster::Grid;

/// Row/column offsets of the eight neighbours.
pub(crate) const NEIGHBORS_8: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Canonical id, 1-based. Matches the value in [`RegionLabels::labels`].
    pub id: u32,
    pub class_id: u8,
    /// Row-major index of the region's first cell.
    pub first_cell: usize,
    pub pixel_count: usize,
}

/// Region id per cell (0 = non-forest) plus per-region cell lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionLabels {
    pub labels: Grid<u32>,
    pub regions: Vec<Region>,
    /// Cells grouped by region: cells of region `id` are
    /// `cells[offsets[id - 1]..offsets[id]]`, in raster order.
    cells: Vec<u32>,
    offsets: Vec<usize>,
}

impl RegionLabels {
    /// Canonicalise an arbitrary labelling. `raw` holds any non-zero label per
    /// forest cell with equal labels meaning "same region", 0 elsewhere.
    pub(crate) fn from_raw(classes: &Grid<u8>, raw: &[u32]) -> Self {
        let mut remap = std::collections::HashMap::<u32, u32>::new();
        let mut regions = Vec::<Region>::new();
        let mut labels = Grid::new(classes.width, classes.height, 0u32);

        for (idx, &r) in raw.iter().enumerate() {
            if r == 0 {
                continue;
            }
            let id = *remap.entry(r).or_insert_with(|| {
                let id = regions.len() as u32 + 1;
                regions.push(Region {
                    id,
                    class_id: classes.data[idx],
                    first_cell: idx,
                    pixel_count: 0,
                });
                id
            });
            labels.data[idx] = id;
            regions[id as usize - 1].pixel_count += 1;
        }

        let mut offsets = Vec::with_capacity(regions.len() + 1);
        offsets.push(0usize);
        for region in &regions {
            let last = offsets.last().copied().unwrap_or(0);
            offsets.push(last + region.pixel_count);
        }
        let mut fill = offsets.clone();
        let mut cells = vec![0u32; offsets.last().copied().unwrap_or(0)];
        for (idx, &id) in labels.data.iter().enumerate() {
            if id == 0 {
                continue;
            }
            let slot = &mut fill[id as usize - 1];
            cells[*slot] = idx as u32;
            *slot += 1;
        }

        Self { labels, regions, cells, offsets }
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Row-major indices of the cells in region `id`.
    pub fn cells_of(&self, id: u32) -> &[u32] {
        let i = id as usize - 1;
        &self.cells[self.offsets[i]..self.offsets[i + 1]]
    }
}

/// Group contiguous same-class cells with an 8-connected breadth-first flood.
/// Class 0 is never grouped.
pub fn label_regions(classes: &Grid<u8>) -> RegionLabels {
    let (w, h) = (classes.width, classes.height);
    let mut raw = vec![0u32; w * h];
    let mut next = 0u32;
    let mut queue = VecDeque::<usize>::new();

    for start in 0..w * h {
        let class = classes.data[start];
        if class == NON_FOREST || raw[start] != 0 {
            continue;
        }
        next += 1;
        raw[start] = next;
        queue.push_back(start);

        while let Some(idx) = queue.pop_front() {
            let r = (idx / w) as isize;
            let c = (idx % w) as isize;
            for (dr, dc) in NEIGHBORS_8 {
                let nr = r + dr;
                let nc = c + dc;
                if nr < 0 || nc < 0 || nr >= h as isize || nc >= w as isize {
                    continue;
                }
                let n = nr as usize * w + nc as usize;
                if raw[n] == 0 && classes.data[n] == class {
                    raw[n] = next;
                    queue.push_back(n);
                }
            }
        }
    }

    RegionLabels::from_raw(classes, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes(width: usize, rows: &[&str]) -> Grid<u8> {
        let data: Vec<u8> = rows
            .iter()
            .flat_map(|r| r.bytes().map(|b| b - b'0'))
            .collect();
        Grid::from_vec(width, data.len() / width, data).unwrap()
    }

    #[test]
    fn diagonal_cells_join_one_region() {
        let g = classes(4, &["1000", "0100", "0010", "0001"]);
        let labels = label_regions(&g);
        assert_eq!(labels.region_count(), 1);
        assert_eq!(labels.regions[0].pixel_count, 4);
        assert_eq!(labels.cells_of(1), &[0, 5, 10, 15]);
    }

    #[test]
    fn different_classes_stay_apart() {
        let g = classes(4, &["1122", "1122", "0033", "3000"]);
        let labels = label_regions(&g);
        let summary: Vec<(u8, usize)> = labels
            .regions
            .iter()
            .map(|r| (r.class_id, r.pixel_count))
            .collect();
        // 3s at (2,2),(2,3) and (3,0) do not touch, even diagonally.
        assert_eq!(summary, vec![(1, 4), (2, 4), (3, 2), (3, 1)]);
        assert_eq!(labels.labels.get(0, 0), 1);
        assert_eq!(labels.labels.get(2, 0), 0);
    }

    #[test]
    fn ids_follow_first_cell_order() {
        let g = classes(3, &["020", "101", "000"]);
        let labels = label_regions(&g);
        let firsts: Vec<usize> = labels.regions.iter().map(|r| r.first_cell).collect();
        assert_eq!(firsts, vec![1, 3, 5]);
    }

    #[test]
    fn labellings_compare_as_values() {
        fn total_eq<T: Eq>(a: &T, b: &T) -> bool {
            a == b
        }
        let g = classes(3, &["110", "003", "303"]);
        assert!(total_eq(&label_regions(&g), &label_regions(&g)));
        assert!(!total_eq(&label_regions(&g), &label_regions(&classes(3, &["110", "000", "303"]))));
    }
}
