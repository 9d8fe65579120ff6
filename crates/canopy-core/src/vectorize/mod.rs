//! Class raster → polygon features.
//!
//! One feature per 8-connected region of same-class cells. Features are
//! emitted lazily, grouped by class id and ordered within a class by the
//! raster position of the region's first cell. `area_ha` is measured on the
//! unsimplified pixel-edge geometry; simplification only touches the geometry
//! handed out, and keeps its area within 1% of `area_ha`.
pub mod geometry;
pub mod regions;
pub mod simplify;
mod trace;

use serde_json::json;

use crate::classify::ConnectivityClass;
use crate::error::{ConnectivityError, Result};
use crate::raster::{AffineTransform, ClassRaster, Crs};

use geometry::{MultiPolygon, Polygon, Ring};
use regions::{label_regions, RegionLabels};
use simplify::simplify_polygon;
use trace::{trace_region, GridPoint};

const M2_PER_HA: f64 = 10_000.0;

/// One contiguous region of a single connectivity class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassPolygon {
    pub class: ConnectivityClass,
    /// Canonical region id in the labelling the polygon came from.
    pub region_id: u32,
    pub pixel_count: usize,
    /// Area of the unsimplified geometry, hectares.
    pub area_ha: f64,
    /// Simplified geometry in CRS coordinates. Exteriors counter-clockwise,
    /// holes clockwise.
    pub geometry: MultiPolygon,
}

impl ClassPolygon {
    pub fn class_id(&self) -> u8 {
        self.class.id()
    }

    pub fn class_name(&self) -> &'static str {
        self.class.name()
    }

    pub fn to_feature(&self) -> geojson::Feature {
        let properties = json!({
            "class_id": self.class_id(),
            "class_name": self.class_name(),
            "area_ha": self.area_ha,
            "pixel_count": self.pixel_count,
        });
        geojson::Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(self.geometry.to_geojson())),
            id: None,
            properties: properties.as_object().cloned(),
            foreign_members: None,
        }
    }
}

/// Deterministic, restartable sequence of [`ClassPolygon`]s.
///
/// Holds the region labelling; geometry is traced on demand by [`Polygons::iter`].
#[derive(Debug, Clone)]
pub struct Polygons {
    labels: RegionLabels,
    order: Vec<u32>,
    transform: AffineTransform,
    crs: Crs,
    tolerance: f64,
}

impl Polygons {
    pub(crate) fn from_labels(
        labels: RegionLabels,
        transform: AffineTransform,
        crs: Crs,
        tolerance: f64,
    ) -> Self {
        let mut order: Vec<u32> = labels.regions.iter().map(|r| r.id).collect();
        // Ids already follow first-cell order; a stable sort keeps it per class.
        order.sort_by_key(|&id| labels.regions[id as usize - 1].class_id);
        Self { labels, order, transform, crs, tolerance }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn simplify_tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn labels(&self) -> &RegionLabels {
        &self.labels
    }

    /// Start a fresh pass over the features.
    pub fn iter(&self) -> PolygonIter<'_> {
        PolygonIter { polygons: self, pos: 0 }
    }

    fn build(&self, id: u32) -> Option<ClassPolygon> {
        let region = self.labels.regions.get(id as usize - 1)?;
        let class = ConnectivityClass::from_id(region.class_id)?;

        // North-up rasters flip the y axis; reverse so exteriors stay CCW.
        let flip = self.transform.determinant() < 0.0;
        let to_ring = |points: &[GridPoint]| {
            let mut ring = Ring(
                points
                    .iter()
                    .map(|p| {
                        let (x, y) = self.transform.apply(p.x as f64, p.y as f64);
                        [x, y]
                    })
                    .collect(),
            );
            if flip {
                ring.reverse();
            }
            ring
        };

        let exact = MultiPolygon(
            trace_region(&self.labels, id)
                .iter()
                .map(|part| Polygon {
                    exterior: to_ring(&part.exterior[..]),
                    holes: part.holes.iter().map(|h| to_ring(&h[..])).collect(),
                })
                .collect(),
        );
        let area_ha = exact.area_m2(&self.crs) / M2_PER_HA;

        let geometry = if self.tolerance > 0.0 {
            MultiPolygon(
                exact
                    .0
                    .iter()
                    .map(|p| simplify_polygon(p, self.tolerance, &self.crs))
                    .collect(),
            )
        } else {
            exact
        };

        Some(ClassPolygon {
            class,
            region_id: id,
            pixel_count: region.pixel_count,
            area_ha,
            geometry,
        })
    }
}

pub struct PolygonIter<'a> {
    polygons: &'a Polygons,
    pos: usize,
}

impl Iterator for PolygonIter<'_> {
    type Item = ClassPolygon;

    fn next(&mut self) -> Option<ClassPolygon> {
        while let Some(&id) = self.polygons.order.get(self.pos) {
            self.pos += 1;
            if let Some(p) = self.polygons.build(id) {
                return Some(p);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.polygons.order.len() - self.pos))
    }
}

impl<'a> IntoIterator for &'a Polygons {
    type Item = ClassPolygon;
    type IntoIter = PolygonIter<'a>;

    fn into_iter(self) -> PolygonIter<'a> {
        self.iter()
    }
}

/// Group `class_raster` into per-region polygon features.
///
/// `simplify_tolerance` is in CRS units; 0 keeps the exact pixel-edge rings.
pub fn vectorize(
    class_raster: &ClassRaster,
    transform: &AffineTransform,
    simplify_tolerance: f64,
) -> Result<Polygons> {
    validate_inputs(class_raster, transform, simplify_tolerance)?;
    let labels = label_regions(&class_raster.classes);
    log::debug!(
        "vectorize: {} regions in {}×{} raster",
        labels.region_count(),
        class_raster.width(),
        class_raster.height()
    );
    Ok(Polygons::from_labels(
        labels,
        *transform,
        class_raster.georef.crs.clone(),
        simplify_tolerance,
    ))
}

pub(crate) fn validate_inputs(
    class_raster: &ClassRaster,
    transform: &AffineTransform,
    simplify_tolerance: f64,
) -> Result<()> {
    validate_tolerance(simplify_tolerance)?;
    transform.validate()?;
    if class_raster.classes.is_empty() {
        return Err(ConnectivityError::input("class raster has zero cells"));
    }
    if let Some(bad) = class_raster.classes.data.iter().find(|&&c| c > 3) {
        return Err(ConnectivityError::input(format!(
            "class raster holds id {bad}, expected 0..=3"
        )));
    }
    if *transform != class_raster.georef.transform {
        log::warn!("vectorize: transform differs from the class raster's own georeference");
    }
    Ok(())
}

pub(crate) fn validate_tolerance(tolerance: f64) -> Result<()> {
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(ConnectivityError::parameter(format!(
            "simplify tolerance must be finite and >= 0, got {tolerance}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{Georef, Grid};
    use approx::assert_relative_eq;

    fn raster(width: usize, rows: &[&str], transform: AffineTransform) -> ClassRaster {
        let data: Vec<u8> = rows.iter().flat_map(|r| r.bytes().map(|b| b - b'0')).collect();
        let classes = Grid::from_vec(width, data.len() / width, data).unwrap();
        ClassRaster::new(classes, Georef::new(transform, Crs::epsg(32644)))
    }

    #[test]
    fn features_group_by_class_then_position() {
        let t = AffineTransform::from_origin(0.0, 90.0, 30.0, 30.0);
        let r = raster(3, &["301", "000", "102"], t);
        let polys = vectorize(&r, &t, 0.0).unwrap();
        let order: Vec<(u8, u32)> = polys.iter().map(|p| (p.class_id(), p.region_id)).collect();
        // Region ids follow first-cell order: 3@0, 1@2, 1@6, 2@8.
        assert_eq!(order, vec![(1, 2), (1, 3), (2, 4), (3, 1)]);
    }

    #[test]
    fn area_matches_pixel_count_for_north_up_raster() {
        let t = AffineTransform::from_origin(700_000.0, 2_500_000.0, 30.0, 30.0);
        let r = raster(4, &["3330", "3030", "3330", "0002"], t);
        let polys = vectorize(&r, &t, 10.0).unwrap();
        for p in &polys {
            assert_relative_eq!(p.area_ha, p.pixel_count as f64 * 900.0 / 10_000.0, epsilon = 1e-9);
        }
        let core = polys.iter().find(|p| p.class_id() == 3).unwrap();
        assert_eq!(core.geometry.parts().len(), 1);
        assert_eq!(core.geometry.parts()[0].holes.len(), 1);
        assert!(core.geometry.parts()[0].exterior.signed_area() > 0.0);
        assert!(core.geometry.parts()[0].holes[0].signed_area() < 0.0);
    }

    #[test]
    fn iteration_restarts() {
        let t = AffineTransform::identity();
        let r = raster(2, &["12", "00"], t);
        let polys = vectorize(&r, &t, 0.0).unwrap();
        let a: Vec<ClassPolygon> = polys.iter().collect();
        let b: Vec<ClassPolygon> = polys.iter().collect();
        assert_eq!(a.len(), 2);
        assert_eq!(a, b);
    }

    #[test]
    fn non_forest_only_gives_no_features() {
        let t = AffineTransform::identity();
        let polys = vectorize(&raster(2, &["00", "00"], t), &t, 1.0).unwrap();
        assert!(polys.is_empty());
        assert_eq!(polys.iter().count(), 0);
    }

    #[test]
    fn rejects_bad_arguments() {
        let t = AffineTransform::identity();
        let r = raster(2, &["10", "00"], t);
        assert!(vectorize(&r, &t, -1.0).unwrap_err().is_invalid_parameter());
        assert!(vectorize(&r, &t, f64::NAN).unwrap_err().is_invalid_parameter());

        let bad = raster(2, &["40", "00"], t);
        assert!(vectorize(&bad, &t, 0.0).unwrap_err().is_invalid_input());

        let singular = AffineTransform::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert!(vectorize(&r, &singular, 0.0).unwrap_err().is_invalid_input());
    }

    #[test]
    fn feature_carries_properties() {
        let t = AffineTransform::identity();
        let polys = vectorize(&raster(1, &["2"], t), &t, 0.0).unwrap();
        let feature = polys.iter().next().unwrap().to_feature();
        let props = feature.properties.unwrap();
        assert_eq!(props["class_id"], 2);
        assert_eq!(props["class_name"], "Edge");
        assert_eq!(props["pixel_count"], 1);
    }
}
