//! EPSG lookups and point transforms using pure Rust (proj4rs + crs-definitions).

use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use crate::error::{Error, Result};

/// EPSG code of WGS84 longitude/latitude, the web-map overlay CRS.
pub const WGS84: i32 = 4326;

/// Get PROJ4 string for an EPSG code using the crs-definitions database
#[inline]
#[must_use]
pub fn get_proj_string(epsg: i32) -> Option<&'static str> {
    u16::try_from(epsg).ok()
        .and_then(crs_definitions::from_code)
        .map(|def| def.proj4)
}

/// Check if an EPSG code represents a geographic (lon/lat) CRS
#[inline]
#[must_use]
pub fn is_geographic_crs(epsg: i32) -> bool {
    if let Some(proj_str) = get_proj_string(epsg) {
        proj_str.contains("+proj=longlat")
    } else {
        // Fallback: 4326 and similar are geographic
        epsg == WGS84 || (4000..5000).contains(&epsg)
    }
}

/// Reusable transformer between two EPSG codes.
///
/// Parses both PROJ strings once; geographic coordinates are taken and
/// returned in degrees.
pub struct CoordTransformer {
    source_epsg: i32,
    target_epsg: i32,
    /// `None` when source and target are the same CRS
    projs: Option<(Proj, Proj)>,
    source_is_geographic: bool,
    target_is_geographic: bool,
}

impl CoordTransformer {
    /// Create a transformer from `source_epsg` to `target_epsg`.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedCrs`] if either code is missing from the
    /// crs-definitions database or its PROJ string cannot be parsed.
    pub fn new(source_epsg: i32, target_epsg: i32) -> Result<Self> {
        let projs = if source_epsg == target_epsg {
            None
        } else {
            Some((parse_proj(source_epsg)?, parse_proj(target_epsg)?))
        };

        Ok(Self {
            source_epsg,
            target_epsg,
            projs,
            source_is_geographic: is_geographic_crs(source_epsg),
            target_is_geographic: is_geographic_crs(target_epsg),
        })
    }

    #[must_use]
    pub fn source_epsg(&self) -> i32 {
        self.source_epsg
    }

    #[must_use]
    pub fn target_epsg(&self) -> i32 {
        self.target_epsg
    }

    /// Transform coordinates from source CRS to target CRS
    ///
    /// # Errors
    /// Returns [`Error::Projection`] if proj4rs rejects the point.
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let Some((source_proj, target_proj)) = &self.projs else {
            return Ok((x, y));
        };

        // proj4rs uses radians for geographic coordinates
        let mut point = if self.source_is_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        transform(source_proj, target_proj, &mut point).map_err(|e| {
            Error::Projection(format!(
                "Transform from EPSG:{} to EPSG:{} failed: {e:?}",
                self.source_epsg, self.target_epsg
            ))
        })?;

        let (out_x, out_y) = if self.target_is_geographic {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        if out_x.is_finite() && out_y.is_finite() {
            Ok((out_x, out_y))
        } else {
            Err(Error::Projection(format!(
                "({x}, {y}) has no finite image in EPSG:{}",
                self.target_epsg
            )))
        }
    }
}

fn parse_proj(epsg: i32) -> Result<Proj> {
    let proj_str = get_proj_string(epsg)
        .ok_or_else(|| Error::UnsupportedCrs(format!("EPSG:{epsg} is not in the crs-definitions database")))?;
    Proj::from_proj_string(proj_str)
        .map_err(|e| Error::UnsupportedCrs(format!("Invalid projection EPSG:{epsg}: {e:?}")))
}

/// Project a single point from one CRS to another.
///
/// # Errors
/// Returns an error if either EPSG code is unsupported or the transformation fails.
#[inline]
pub fn project_point(source_epsg: i32, target_epsg: i32, x: f64, y: f64) -> Result<(f64, f64)> {
    CoordTransformer::new(source_epsg, target_epsg)?.transform(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn test_project_point_same_crs() {
        let (x, y) = project_point(4326, 4326, 10.0, 51.5).unwrap();
        assert!(approx_eq(x, 10.0));
        assert!(approx_eq(y, 51.5));
    }

    #[test]
    fn test_mercator_origin_to_lon_lat() {
        let (lon, lat) = project_point(3857, 4326, 0.0, 0.0).unwrap();
        assert!(approx_eq(lon, 0.0));
        assert!(approx_eq(lat, 0.0));
    }

    #[test]
    fn test_mercator_100m_square() {
        // 100 m east of the origin is ~0.000898 degrees of longitude
        let (lon, lat) = project_point(3857, 4326, 100.0, 100.0).unwrap();
        assert!((lon - 0.000_898_315).abs() < 1e-8, "lon: {lon}");
        assert!(lat > 0.000_898 && lat < 0.000_91, "lat: {lat}");
    }

    #[test]
    fn test_roundtrip_4326_3857() {
        let test_points = [
            (0.0, 0.0),
            (10.0, 51.5),   // London-ish
            (-122.4, 37.8), // San Francisco
            (139.7, 35.7),  // Tokyo
        ];

        let forward = CoordTransformer::new(4326, 3857).unwrap();
        let back = CoordTransformer::new(3857, 4326).unwrap();
        for (lon, lat) in test_points {
            let (x, y) = forward.transform(lon, lat).unwrap();
            let (lon2, lat2) = back.transform(x, y).unwrap();
            assert!(approx_eq(lon, lon2), "lon: {} != {}", lon, lon2);
            assert!(approx_eq(lat, lat2), "lat: {} != {}", lat, lat2);
        }
    }

    #[test]
    fn test_project_point_roundtrip_utm() {
        let (x, y) = project_point(4326, 32633, 15.0, 52.0).unwrap();
        // UTM coordinates should be in meters, roughly 500000 for easting near zone center
        assert!(x > 400_000.0 && x < 600_000.0, "UTM easting: {}", x);
        assert!(y > 5_000_000.0 && y < 6_000_000.0, "UTM northing: {}", y);

        let (lon, lat) = project_point(32633, 4326, x, y).unwrap();
        assert!((lon - 15.0).abs() < 1e-5, "lon roundtrip: {}", lon);
        assert!((lat - 52.0).abs() < 1e-5, "lat roundtrip: {}", lat);
    }

    #[test]
    fn test_is_geographic_crs() {
        assert!(is_geographic_crs(4326), "4326 is geographic");
        assert!(!is_geographic_crs(3857), "3857 is projected");
        assert!(!is_geographic_crs(32633), "UTM is projected");
    }

    #[test]
    fn test_unsupported_epsg_code() {
        let result = CoordTransformer::new(999_999, 4326);
        assert!(matches!(result, Err(Error::UnsupportedCrs(_))));
    }

    #[test]
    fn test_identity_transformer_skips_proj() {
        let t = CoordTransformer::new(4326, 4326).unwrap();
        assert!(t.projs.is_none());
        assert_eq!(t.transform(1.5, -2.5).unwrap(), (1.5, -2.5));
    }
}
