//! Polygon geometry in CRS coordinates and its area.
use serde::{Deserialize, Serialize};

use crate::raster::Crs;

/// Metres per degree of latitude (and of longitude at the equator).
const METRES_PER_DEGREE: f64 = 111_320.0;

/// Closed ring; the first vertex is repeated at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ring(pub Vec<[f64; 2]>);

impl Ring {
    pub fn points(&self) -> &[[f64; 2]] {
        &self.0
    }

    /// Shoelace signed area; positive for counter-clockwise rings in a
    /// y-up coordinate system.
    pub fn signed_area(&self) -> f64 {
        signed_area(&self.0)
    }

    pub fn reverse(&mut self) {
        self.0.reverse();
    }

    /// Ring area in square metres. Geographic CRSs are projected with a local
    /// equirectangular approximation centred on the ring's mid-latitude.
    pub fn area_m2(&self, crs: &Crs) -> f64 {
        if !crs.is_geographic() {
            return self.signed_area().abs();
        }
        let (lo, hi) = self
            .0
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p[1]), hi.max(p[1])));
        let kx = METRES_PER_DEGREE * ((lo + hi) / 2.0).to_radians().cos();
        let projected: Vec<[f64; 2]> = self
            .0
            .iter()
            .map(|p| [p[0] * kx, p[1] * METRES_PER_DEGREE])
            .collect();
        signed_area(&projected).abs()
    }
}

fn signed_area(points: &[[f64; 2]]) -> f64 {
    if points.len() < 4 {
        return 0.0;
    }
    // Relative to the first vertex: keeps the cross products small for
    // projected coordinates in the millions.
    let [ox, oy] = points[0];
    let mut acc = 0.0;
    for pair in points.windows(2) {
        let (ax, ay) = (pair[0][0] - ox, pair[0][1] - oy);
        let (bx, by) = (pair[1][0] - ox, pair[1][1] - oy);
        acc += ax * by - bx * ay;
    }
    acc * 0.5
}

/// One polygon part: counter-clockwise exterior, clockwise holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Ring,
    pub holes: Vec<Ring>,
}

impl Polygon {
    pub fn area_m2(&self, crs: &Crs) -> f64 {
        let holes: f64 = self.holes.iter().map(|h| h.area_m2(crs)).sum();
        self.exterior.area_m2(crs) - holes
    }

    pub fn vertex_count(&self) -> usize {
        self.exterior.0.len() + self.holes.iter().map(|h| h.0.len()).sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MultiPolygon(pub Vec<Polygon>);

impl MultiPolygon {
    pub fn parts(&self) -> &[Polygon] {
        &self.0
    }

    pub fn area_m2(&self, crs: &Crs) -> f64 {
        self.0.iter().map(|p| p.area_m2(crs)).sum()
    }

    pub fn vertex_count(&self) -> usize {
        self.0.iter().map(Polygon::vertex_count).sum()
    }

    pub fn to_geojson(&self) -> geojson::Value {
        let polygons: Vec<Vec<Vec<Vec<f64>>>> = self
            .0
            .iter()
            .map(|p| {
                std::iter::once(&p.exterior)
                    .chain(p.holes.iter())
                    .map(|ring| ring.0.iter().map(|xy| xy.to_vec()).collect::<Vec<_>>())
                    .collect::<Vec<_>>()
            })
            .collect();
        geojson::Value::MultiPolygon(polygons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(x0: f64, y0: f64, size: f64) -> Ring {
        Ring(vec![
            [x0, y0],
            [x0 + size, y0],
            [x0 + size, y0 + size],
            [x0, y0 + size],
            [x0, y0],
        ])
    }

    #[test]
    fn polygon_area_subtracts_holes() {
        let crs = Crs::epsg(32643);
        let mut hole = square(10.0, 10.0, 10.0);
        hole.reverse();
        let p = Polygon { exterior: square(0.0, 0.0, 30.0), holes: vec![hole] };
        assert_relative_eq!(p.area_m2(&crs), 800.0);
        assert!(p.exterior.signed_area() > 0.0);
        assert!(p.holes[0].signed_area() < 0.0);
    }

    #[test]
    fn geographic_area_uses_local_scale() {
        // 0.001° square on the equator ≈ 111.32 m on a side.
        let ring = square(0.0, 0.0, 0.001);
        let area = ring.area_m2(&Crs::epsg(4326));
        assert_relative_eq!(area, 111.32 * 111.32, max_relative = 1e-6);
    }

    #[test]
    fn geojson_keeps_ring_nesting() {
        let mp = MultiPolygon(vec![Polygon { exterior: square(0.0, 0.0, 1.0), holes: vec![] }]);
        match mp.to_geojson() {
            geojson::Value::MultiPolygon(parts) => {
                assert_eq!(parts.len(), 1);
                assert_eq!(parts[0].len(), 1);
                assert_eq!(parts[0][0].len(), 5);
            }
            other => panic!("unexpected geometry {other:?}"),
        }
    }
}
