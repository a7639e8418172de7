//! Export parameters: geometry precedence, CRS and folder defaults, naming.

use catalog::{ExportGeometry, ResolvedExportParams};
use imagery_common::{CrsCode, ImageryError, ImageryResult};

use crate::query::{QueryWarning, Warnings};

/// Export parameters as requested. At least one of `scale`, `crs_transform`
/// or `dimensions` must be given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportParams {
    /// Metres per pixel.
    pub scale: Option<f64>,
    pub crs_transform: Option<[f64; 6]>,
    /// `(width, height)` in pixels.
    pub dimensions: Option<(u32, u32)>,
    pub crs: Option<CrsCode>,
    pub folder: Option<String>,
}

impl ExportParams {
    pub fn with_scale(scale: f64) -> Self {
        Self {
            scale: Some(scale),
            ..Default::default()
        }
    }

    pub fn crs(mut self, crs: CrsCode) -> Self {
        self.crs = Some(crs);
        self
    }

    pub fn folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    /// The geometry that applies: dimensions, then crs_transform, then
    /// scale. Overridden choices produce a warning.
    pub fn geometry(&self, warnings: &mut Warnings) -> ImageryResult<ExportGeometry> {
        let given = [
            self.dimensions.is_some(),
            self.crs_transform.is_some(),
            self.scale.is_some(),
        ]
        .iter()
        .filter(|g| **g)
        .count();

        let (geometry, used) = if let Some((width, height)) = self.dimensions {
            (ExportGeometry::Dimensions { width, height }, "dimensions")
        } else if let Some(transform) = self.crs_transform {
            (ExportGeometry::CrsTransform(transform), "crs_transform")
        } else if let Some(scale) = self.scale {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(ImageryError::InvalidExportParams(format!(
                    "scale must be positive, got {}",
                    scale
                )));
            }
            (ExportGeometry::Scale(scale), "scale")
        } else {
            return Err(ImageryError::InvalidExportParams(
                "one of scale, crs_transform or dimensions must be provided".to_string(),
            ));
        };

        if given > 1 {
            warnings.push(QueryWarning::ExportGeometryOverridden {
                used: used.to_string(),
            });
        }
        Ok(geometry)
    }

    /// Apply defaults. `crs` falls back to `roi_crs`, then WGS84.
    pub fn resolve(
        &self,
        roi_crs: Option<CrsCode>,
        default_folder: String,
        warnings: &mut Warnings,
    ) -> ImageryResult<ResolvedExportParams> {
        Ok(ResolvedExportParams {
            geometry: self.geometry(warnings)?,
            crs: self.crs.or(roi_crs).unwrap_or(CrsCode::WGS84),
            folder: self.folder.clone().unwrap_or(default_folder),
        })
    }
}

/// `{roi}/{collection}_{season}/{keys joined by _}`.
pub fn default_folder(roi: &str, collection: &str, season: &str, keys: &[String]) -> String {
    format!("{}/{}_{}/{}", roi, collection, season, keys.join("_"))
}

/// `{collection}[_{keys}][_{scale}m]`.
pub fn export_basename(collection: &str, keys: &[String], geometry: &ExportGeometry) -> String {
    let mut name = collection.to_string();
    if !keys.is_empty() {
        name.push('_');
        name.push_str(&keys.join("_"));
    }
    if let Some(scale) = geometry.scale() {
        name.push_str(&format!("_{}m", scale));
    }
    name
}

/// Parse `WIDTHxHEIGHT`, e.g. `1024x768`.
pub fn parse_dimensions(s: &str) -> ImageryResult<(u32, u32)> {
    let invalid = || ImageryError::InvalidExportParams(format!("dimensions '{}' must be WIDTHxHEIGHT", s));
    let (width, height) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
    let width: u32 = width.trim().parse().map_err(|_| invalid())?;
    let height: u32 = height.trim().parse().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}
