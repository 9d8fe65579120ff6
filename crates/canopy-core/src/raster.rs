//! Raster artifacts handed between pipeline stages.
//!
//! Every grid is row-major with row 0 at the top of the image (north for a
//! north-up transform). Grid coordinates are `(row, col)`; the affine transform
//! maps pixel-corner coordinates `(col, row)` to CRS coordinates.
use serde::{Deserialize, Serialize};

use crate::error::{ConnectivityError, Result};

/// A 2D row-major grid of cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    pub data: Vec<T>,
    pub width: usize,
    pub height: usize,
}

impl<T: Clone> Grid<T> {
    /// Create a grid filled with `fill`.
    pub fn new(width: usize, height: usize, fill: T) -> Self {
        Self {
            data: vec![fill; width * height],
            width,
            height,
        }
    }
}

impl<T> Grid<T> {
    /// Wrap an existing row-major buffer. Fails if the buffer length does not
    /// match `width × height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != width * height {
            return Err(ConnectivityError::input(format!(
                "buffer holds {} cells but shape is {}×{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self { data, width, height })
    }

    /// Build a grid by evaluating `f(row, col)` for every cell.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for r in 0..height {
            for c in 0..width {
                data.push(f(r, c));
            }
        }
        Self { data, width, height }
    }

    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn same_shape<U>(&self, other: &Grid<U>) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Apply `f` to every cell, keeping the shape.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Grid<U> {
        Grid {
            data: self.data.iter().map(f).collect(),
            width: self.width,
            height: self.height,
        }
    }
}

impl<T: Copy> Grid<T> {
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: T) {
        self.data[row * self.width + col] = val;
    }

    /// Copy the window `[row0, row0+height) × [col0, col0+width)` out of the grid.
    /// Caller must keep the window inside the grid.
    pub fn window(&self, row0: usize, col0: usize, width: usize, height: usize) -> Grid<T> {
        let mut data = Vec::with_capacity(width * height);
        for r in row0..row0 + height {
            let start = r * self.width + col0;
            data.extend_from_slice(&self.data[start..start + width]);
        }
        Grid { data, width, height }
    }
}

/// Affine map from pixel-corner coordinates to CRS coordinates, laid out the
/// way GDAL and rasterio name the coefficients:
///
/// ```text
///   x = a·col + b·row + c
///   y = d·col + e·row + f
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl AffineTransform {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// North-up transform with the top-left corner at `(west, north)`.
    pub fn from_origin(west: f64, north: f64, x_size: f64, y_size: f64) -> Self {
        Self::new(x_size, 0.0, west, 0.0, -y_size, north)
    }

    /// Unit pixels with the origin at the top-left corner and y growing downward.
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0)
    }

    #[inline]
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// Area of one pixel in CRS units squared.
    pub fn pixel_area(&self) -> f64 {
        self.determinant().abs()
    }

    pub fn is_invertible(&self) -> bool {
        let det = self.determinant();
        det.is_finite() && det != 0.0
    }

    /// Transform of the sub-window whose top-left pixel is `(row0, col0)`.
    pub fn shifted(&self, row0: usize, col0: usize) -> Self {
        let (c, f) = self.apply(col0 as f64, row0 as f64);
        Self { c, f, ..*self }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let finite = [self.a, self.b, self.c, self.d, self.e, self.f]
            .iter()
            .all(|v| v.is_finite());
        if !finite || !self.is_invertible() {
            return Err(ConnectivityError::input(format!(
                "affine transform {:?} is not invertible",
                self
            )));
        }
        Ok(())
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Coordinate reference system descriptor, e.g. `"EPSG:32643"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Crs(pub String);

impl Crs {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn epsg(code: u32) -> Self {
        Self(format!("EPSG:{code}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric EPSG code when the descriptor has the `EPSG:<n>` form.
    pub fn epsg_code(&self) -> Option<u32> {
        let s = self.0.trim();
        let (authority, code) = s.split_once(':')?;
        if !authority.eq_ignore_ascii_case("epsg") {
            return None;
        }
        code.trim().parse().ok()
    }

    /// True for geographic (lon/lat degree) systems. EPSG 4001–4999 is the
    /// geographic 2D block; everything else is treated as projected.
    pub fn is_geographic(&self) -> bool {
        matches!(self.epsg_code(), Some(4001..=4999))
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::epsg(32643)
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transform + CRS pair carried by every raster artifact.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Georef {
    pub transform: AffineTransform,
    pub crs: Crs,
}

impl Georef {
    pub fn new(transform: AffineTransform, crs: Crs) -> Self {
        Self { transform, crs }
    }
}

/// Categorical land-use/land-cover raster. Immutable input of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LulcRaster {
    pub codes: Grid<i32>,
    pub georef: Georef,
}

impl LulcRaster {
    /// Validate and wrap a LULC grid. Fails on a zero-size grid or a
    /// non-invertible transform.
    pub fn new(codes: Grid<i32>, georef: Georef) -> Result<Self> {
        if codes.is_empty() {
            return Err(ConnectivityError::input("LULC raster has zero cells"));
        }
        georef.transform.validate()?;
        Ok(Self { codes, georef })
    }

    pub fn width(&self) -> usize {
        self.codes.width
    }

    pub fn height(&self) -> usize {
        self.codes.height
    }
}

/// Binary forest mask, `true` = forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestMask {
    pub cells: Grid<bool>,
    pub georef: Georef,
}

impl ForestMask {
    pub fn new(cells: Grid<bool>, georef: Georef) -> Self {
        Self { cells, georef }
    }

    pub fn forest_count(&self) -> usize {
        self.cells.data.iter().filter(|&&f| f).count()
    }
}

/// Distance from each forest cell to the nearest non-forest cell, in metres.
/// Non-forest cells hold exactly 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceGrid {
    pub values: Grid<f64>,
    /// Pixel size in metres the distances were scaled by.
    pub resolution: f64,
    pub georef: Georef,
}

impl DistanceGrid {
    pub fn max_distance(&self) -> f64 {
        self.values.data.iter().cloned().fold(0.0, f64::max)
    }
}

/// Connectivity class per cell: 0 non-forest, 1 Fragmented, 2 Edge, 3 Core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRaster {
    pub classes: Grid<u8>,
    pub georef: Georef,
}

impl ClassRaster {
    pub fn new(classes: Grid<u8>, georef: Georef) -> Self {
        Self { classes, georef }
    }

    /// Pixel counts indexed by class id 0..=3.
    pub fn class_counts(&self) -> [usize; 4] {
        let mut counts = [0usize; 4];
        for &c in &self.classes.data {
            if let Some(slot) = counts.get_mut(c as usize) {
                *slot += 1;
            }
        }
        counts
    }

    pub fn width(&self) -> usize {
        self.classes.width
    }

    pub fn height(&self) -> usize {
        self.classes.height
    }
}
