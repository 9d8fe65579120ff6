//! Forest mask extraction from categorical LULC codes.
use std::collections::BTreeSet;

use crate::raster::{ForestMask, LulcRaster};

/// `true` wherever the LULC code is one of `forest_classes`.
///
/// An empty class set yields an all-`false` mask; downstream stages read that
/// as "no forest" rather than an error.
pub fn extract_forest_mask(lulc: &LulcRaster, forest_classes: &BTreeSet<i32>) -> ForestMask {
    let cells = if forest_classes.is_empty() {
        lulc.codes.map(|_| false)
    } else {
        lulc.codes.map(|code| forest_classes.contains(code))
    };
    ForestMask::new(cells, lulc.georef.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{Georef, Grid};

    fn lulc(width: usize, codes: Vec<i32>) -> LulcRaster {
        let height = codes.len() / width;
        LulcRaster::new(Grid::from_vec(width, height, codes).unwrap(), Georef::default()).unwrap()
    }

    #[test]
    fn marks_configured_classes() {
        let raster = lulc(3, vec![1, 2, 3, 4, 5, 0, 3, 3, 1]);
        let mask = extract_forest_mask(&raster, &BTreeSet::from([3, 4]));
        assert_eq!(
            mask.cells.data,
            vec![false, false, true, true, false, false, true, true, false]
        );
        assert_eq!(mask.forest_count(), 4);
        assert_eq!(mask.georef, raster.georef);
    }

    #[test]
    fn empty_class_set_means_no_forest() {
        let raster = lulc(2, vec![3, 4, 3, 4]);
        let mask = extract_forest_mask(&raster, &BTreeSet::new());
        assert_eq!(mask.forest_count(), 0);
        assert_eq!(mask.cells.len(), 4);
    }
}
