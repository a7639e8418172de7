//! Regions of interest and their coordinate reference systems.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{BoundingBox, ImageryError, ImageryResult};

/// An EPSG coordinate reference system code.
///
/// Accepts formats like:
/// - "EPSG:32617"
/// - "epsg:4326"
/// - "CRS:84" (equivalent to EPSG:4326)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CrsCode(u32);

impl CrsCode {
    /// WGS84 geographic lon/lat, the fallback export CRS.
    pub const WGS84: CrsCode = CrsCode(4326);

    pub fn epsg(code: u32) -> Self {
        Self(code)
    }

    pub fn code(&self) -> u32 {
        self.0
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self.0, 4326 | 4269)
    }
}

impl Default for CrsCode {
    fn default() -> Self {
        Self::WGS84
    }
}

impl FromStr for CrsCode {
    type Err = ImageryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        if normalized == "CRS:84" {
            return Ok(Self::WGS84);
        }

        normalized
            .strip_prefix("EPSG:")
            .and_then(|code| code.parse::<u32>().ok())
            .filter(|code| *code > 0)
            .map(CrsCode)
            .ok_or_else(|| ImageryError::InvalidCrs(s.to_string()))
    }
}

impl TryFrom<String> for CrsCode {
    type Error = ImageryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CrsCode> for String {
    fn from(value: CrsCode) -> Self {
        value.to_string()
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// A polygonal region of interest.
///
/// Coordinates are `[lon, lat]` pairs in degrees. The ring is always stored
/// closed (first point == last point). `crs` is the projection exports of
/// this region should use, not the CRS of `coordinates`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    coordinates: Vec<[f64; 2]>,
    crs: CrsCode,
}

impl Region {
    /// Build a region from a polygon ring, closing it if needed.
    pub fn new(mut coordinates: Vec<[f64; 2]>, crs: CrsCode) -> ImageryResult<Self> {
        if let (Some(first), Some(last)) = (coordinates.first(), coordinates.last()) {
            if first != last {
                let first = *first;
                coordinates.push(first);
            }
        }

        // A closed triangle is the smallest usable ring.
        if coordinates.len() < 4 {
            return Err(ImageryError::InvalidRegion(format!(
                "polygon needs at least 3 distinct points, got {}",
                coordinates.len().saturating_sub(1)
            )));
        }

        if let Some(bad) = coordinates
            .iter()
            .find(|p| !(-180.0..=180.0).contains(&p[0]) || !(-90.0..=90.0).contains(&p[1]))
        {
            return Err(ImageryError::InvalidRegion(format!(
                "coordinate [{}, {}] is outside lon/lat bounds",
                bad[0], bad[1]
            )));
        }

        Ok(Self { coordinates, crs })
    }

    pub fn coordinates(&self) -> &[[f64; 2]] {
        &self.coordinates
    }

    pub fn crs(&self) -> CrsCode {
        self.crs
    }

    /// Extent of the polygon ring.
    pub fn bounds(&self) -> BoundingBox {
        // Construction guarantees a non-empty ring.
        BoundingBox::from_points(&self.coordinates)
            .unwrap_or_else(|| BoundingBox::new(0.0, 0.0, 0.0, 0.0))
    }
}
