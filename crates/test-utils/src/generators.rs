//! Image record generators and a seeded in-memory catalog.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::BTreeMap;

use catalog::{FilterValue, ImageRecord, InMemoryCatalog};
use imagery_common::BoundingBox;

/// Footprint covering the sample region and some surroundings.
pub const SAMPLE_FOOTPRINT: BoundingBox = BoundingBox {
    min_x: -81.0,
    min_y: 55.0,
    max_x: -78.0,
    max_y: 58.0,
};

/// UTC timestamp shorthand.
pub fn utc(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .expect("valid fixture timestamp")
}

/// A Sentinel-1 style record with `instrumentMode` and polarisations.
pub fn create_s1_image(
    id: &str,
    timestamp: DateTime<Utc>,
    mode: &str,
    polarisations: &[&str],
) -> ImageRecord {
    let mut properties = BTreeMap::new();
    properties.insert("instrumentMode".to_string(), FilterValue::from(mode));
    properties.insert(
        "transmitterReceiverPolarisation".to_string(),
        FilterValue::List(polarisations.iter().map(|p| FilterValue::from(*p)).collect()),
    );
    ImageRecord {
        id: id.to_string(),
        timestamp,
        footprint: SAMPLE_FOOTPRINT,
        bands: polarisations.iter().map(|p| p.to_string()).collect(),
        properties,
    }
}

/// A Sentinel-2 style record with `CLOUDY_PIXEL_PERCENTAGE`.
pub fn create_s2_image(id: &str, timestamp: DateTime<Utc>, cloud_percent: f64) -> ImageRecord {
    let mut properties = BTreeMap::new();
    properties.insert(
        "CLOUDY_PIXEL_PERCENTAGE".to_string(),
        FilterValue::Number(cloud_percent),
    );
    ImageRecord {
        id: id.to_string(),
        timestamp,
        footprint: SAMPLE_FOOTPRINT,
        bands: ["B2", "B3", "B4", "B8"].iter().map(|b| b.to_string()).collect(),
        properties,
    }
}

/// `count` S2 records starting at `start`, one every `step`, cloud cover
/// cycling through 10, 50 and 90 percent.
pub fn create_s2_series(start: DateTime<Utc>, step: Duration, count: usize) -> Vec<ImageRecord> {
    (0..count)
        .map(|i| {
            let cloud = [10.0, 50.0, 90.0][i % 3];
            create_s2_image(&format!("s2_{:03}", i), start + step * i as i32, cloud)
        })
        .collect()
}

/// Catalog matching the sample registry's sources.
///
/// S1 (January 2022): two EW HH+HV passes on the 3rd, one EW HH pass on the
/// 5th, one IW pass on the 4th, and one EW pass outside every season.
/// S2: six daily images from 2022-01-10 and three from 2023-01-10.
pub fn seeded_catalog() -> InMemoryCatalog {
    let s1 = vec![
        create_s1_image("s1_ew_a", utc(2022, 1, 3, 11), "EW", &["HH", "HV"]),
        create_s1_image("s1_ew_b", utc(2022, 1, 3, 23), "EW", &["HH", "HV"]),
        create_s1_image("s1_ew_c", utc(2022, 1, 5, 11), "EW", &["HH"]),
        create_s1_image("s1_iw_a", utc(2022, 1, 4, 11), "IW", &["VV", "VH"]),
        create_s1_image("s1_ew_old", utc(2021, 7, 1, 11), "EW", &["HH", "HV"]),
    ];

    let mut s2 = create_s2_series(utc(2022, 1, 10, 16), Duration::days(1), 6);
    s2.extend(
        create_s2_series(utc(2023, 1, 10, 16), Duration::days(1), 3)
            .into_iter()
            .map(|mut image| {
                image.id = image.id.replace("s2_", "s2_2023_");
                image
            }),
    );

    InMemoryCatalog::new()
        .with_collection("COPERNICUS/S1_GRD", s1)
        .with_collection("COPERNICUS/S2", s2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::ImageCatalog;

    #[test]
    fn test_s2_series_cycles_cloud_cover() {
        let series = create_s2_series(utc(2022, 1, 1, 0), Duration::hours(1), 4);
        assert_eq!(series.len(), 4);
        assert_eq!(series[3].timestamp, utc(2022, 1, 1, 3));
        assert_eq!(
            series[3].properties["CLOUDY_PIXEL_PERCENTAGE"],
            FilterValue::Number(10.0)
        );
    }

    #[tokio::test]
    async fn test_seeded_catalog_sources() {
        let catalog = seeded_catalog();
        let s1 = catalog.open("COPERNICUS/S1_GRD").unwrap();
        let s2 = catalog.open("COPERNICUS/S2").unwrap();
        assert_eq!(catalog.count(&s1).await.unwrap(), 5);
        assert_eq!(catalog.count(&s2).await.unwrap(), 9);
    }
}
