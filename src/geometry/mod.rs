//! Coordinate types: bounding boxes, affine geotransforms and map bounds.

pub mod projection;

use std::fmt;

/// Bounding box in a coordinate reference system
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl BoundingBox {
    /// Create a new bounding box
    #[must_use]
    pub fn new(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Self {
        Self { minx, miny, maxx, maxy }
    }

    /// Left edge (minimum x)
    #[inline]
    #[must_use]
    pub fn left(&self) -> f64 {
        self.minx
    }

    /// Bottom edge (minimum y)
    #[inline]
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.miny
    }

    /// Right edge (maximum x)
    #[inline]
    #[must_use]
    pub fn right(&self) -> f64 {
        self.maxx
    }

    /// Top edge (maximum y)
    #[inline]
    #[must_use]
    pub fn top(&self) -> f64 {
        self.maxy
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.maxx - self.minx
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.maxy - self.miny
    }
}

/// Affine transformation from pixel (col, row) to CRS (x, y) coordinates.
///
/// Coefficients follow the GDAL ordering:
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// For north-up rasters both rotations are 0 and `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform anchored at the upper-left corner.
    #[must_use]
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            row_rotation: 0.0,
            origin_y,
            col_rotation: 0.0,
            pixel_height,
        }
    }

    /// Build from GDAL-style coefficients `[c, a, b, f, d, e]`.
    #[must_use]
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    #[must_use]
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Build from GeoTIFF `ModelTiepoint` (I, J, K, X, Y, Z) and `ModelPixelScale` (Sx, Sy, Sz).
    ///
    /// Returns `None` if either array is too short.
    #[must_use]
    pub fn from_tiepoint_and_scale(tiepoint: &[f64], scale: &[f64]) -> Option<Self> {
        if tiepoint.len() < 6 || scale.len() < 2 {
            return None;
        }
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        Some(Self::north_up(origin_x, origin_y, scale[0], -scale[1]))
    }

    /// Build from a GeoTIFF `ModelTransformation` 4x4 row-major matrix.
    #[must_use]
    pub fn from_model_transformation(matrix: &[f64]) -> Option<Self> {
        if matrix.len() < 16 {
            return None;
        }
        Some(Self::from_gdal([
            matrix[3], matrix[0], matrix[1], matrix[7], matrix[4], matrix[5],
        ]))
    }

    /// 4x4 row-major `ModelTransformation` matrix for this transform.
    #[must_use]
    pub fn to_model_transformation(&self) -> [f64; 16] {
        [
            self.pixel_width, self.row_rotation, 0.0, self.origin_x,
            self.col_rotation, self.pixel_height, 0.0, self.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ]
    }

    #[inline]
    #[must_use]
    pub fn is_north_up(&self) -> bool {
        self.row_rotation == 0.0 && self.col_rotation == 0.0 && self.pixel_height < 0.0
    }

    /// Map continuous pixel coordinates to CRS coordinates.
    #[inline]
    #[must_use]
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }

    /// Inverse of this transform, or `None` if it is singular.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv_det = 1.0 / det;
        let a = self.pixel_height * inv_det;
        let b = -self.row_rotation * inv_det;
        let d = -self.col_rotation * inv_det;
        let e = self.pixel_width * inv_det;
        Some(Self {
            origin_x: -(a * self.origin_x + b * self.origin_y),
            pixel_width: a,
            row_rotation: b,
            origin_y: -(d * self.origin_x + e * self.origin_y),
            col_rotation: d,
            pixel_height: e,
        })
    }

    /// Envelope of a `width` x `height` raster placed with this transform.
    #[must_use]
    pub fn bounds(&self, width: usize, height: usize) -> BoundingBox {
        #[allow(clippy::cast_precision_loss)]
        let (w, h) = (width as f64, height as f64);
        let corners = [
            self.pixel_to_world(0.0, 0.0),
            self.pixel_to_world(w, 0.0),
            self.pixel_to_world(0.0, h),
            self.pixel_to_world(w, h),
        ];
        let mut bbox = BoundingBox::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in corners {
            bbox.minx = bbox.minx.min(x);
            bbox.maxx = bbox.maxx.max(x);
            bbox.miny = bbox.miny.min(y);
            bbox.maxy = bbox.maxy.max(y);
        }
        bbox
    }
}

/// South-west / north-east corners for placing an image overlay on a web map.
///
/// Displays as `[ [bottom, left], [top, right] ]`, the Leaflet `LatLngBounds`
/// literal. Downstream map configuration is pasted from this text, so the
/// ordering is fixed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapBounds {
    pub bottom: f64,
    pub left: f64,
    pub top: f64,
    pub right: f64,
}

impl From<BoundingBox> for MapBounds {
    fn from(bbox: BoundingBox) -> Self {
        Self {
            bottom: bbox.bottom(),
            left: bbox.left(),
            top: bbox.top(),
            right: bbox.right(),
        }
    }
}

impl MapBounds {
    /// Corners as `[[south, west], [north, east]]`.
    #[must_use]
    pub fn corners(&self) -> [[f64; 2]; 2] {
        [[self.bottom, self.left], [self.top, self.right]]
    }
}

impl fmt::Display for MapBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[ [{}, {}], [{}, {}] ]",
            format_coordinate(self.bottom),
            format_coordinate(self.left),
            format_coordinate(self.top),
            format_coordinate(self.right),
        )
    }
}

/// Shortest round-trip float text, always with a fractional part or exponent
/// (`100.0`, `0.25`, `1e-05`, `1e+16`).
#[must_use]
pub fn format_coordinate(value: f64) -> String {
    let text = format!("{value:?}");
    let Some((mantissa, exponent)) = text.split_once('e') else {
        return text;
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    format!("{mantissa}e{sign}{digits:0>2}")
}
