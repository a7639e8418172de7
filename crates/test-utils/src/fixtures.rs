//! Common test fixtures for imagery tests.
//!
//! The sample registry mirrors `config/rois.yaml`: one region with two
//! seasons, S1 grouped by instrument mode and polarisation, S2 filtered by
//! cloud cover.

use imagery_common::{CrsCode, Region};

/// Name of the region in [`SAMPLE_REGISTRY_YAML`].
pub const SAMPLE_ROI: &str = "belcher_islands";

/// Polygon ring of the sample region, `[lon, lat]`.
pub const SAMPLE_ROI_COORDS: [[f64; 2]; 5] = [
    [-80.399, 55.433],
    [-78.306, 55.433],
    [-78.306, 57.077],
    [-80.399, 57.077],
    [-80.399, 55.433],
];

/// Export CRS of the sample region.
pub const SAMPLE_ROI_EPSG: u32 = 32617;

pub const SAMPLE_REGISTRY_YAML: &str = r#"
rois:
  belcher_islands:
    roi_coords:
      - [-80.399, 55.433]
      - [-78.306, 55.433]
      - [-78.306, 57.077]
      - [-80.399, 57.077]
      - [-80.399, 55.433]
    crs: "EPSG:32617"
    image_collections:
      S1: COPERNICUS/S1_GRD
      S2: COPERNICUS/S2
    imagery_filters:
      "2022":
        date_start: 2021-12-01
        date_end: 2022-05-31
        S1:
          EW:
            HH:
              filters:
                - {type: eq, args: [instrumentMode, EW]}
                - {type: listContains, args: [transmitterReceiverPolarisation, HH]}
            HV:
              filters:
                - {type: eq, args: [instrumentMode, EW]}
                - {type: listContains, args: [transmitterReceiverPolarisation, HV]}
          IW:
            filters:
              - {type: eq, args: [instrumentMode, IW]}
        S2:
          filters:
            - {type: lt, args: [CLOUDY_PIXEL_PERCENTAGE, 80]}
      "2023":
        date_start: 2022-12-01
        date_end: 2023-05-31
        S2:
          filters: []
  ungrouped_bay:
    roi_coords:
      - [-79.5, 56.0]
      - [-79.0, 56.0]
      - [-79.0, 56.5]
      - [-79.5, 56.5]
"#;

/// The sample region as a [`Region`].
pub fn sample_region() -> Region {
    // Fixture coordinates are known-valid.
    Region::new(SAMPLE_ROI_COORDS.to_vec(), CrsCode::epsg(SAMPLE_ROI_EPSG))
        .expect("sample region is valid")
}
