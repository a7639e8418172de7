//! Integration tests for flattening, tree building and processing.

use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;

use catalog::{FilterValue, ImageCatalog, ImageRecord, InMemoryCatalog};
use filter_tree::{
    flatten, flatten_seasons, GroupNode, GroupedCollectionBuilder, ImageryNode, Node,
    ProcessingOptions, Season, TreeProcessor, DEFAULT_MAX_DEPTH, TRUNCATED_SEGMENT,
};
use imagery_common::{
    BoundingBox, CrsCode, DateRange, MosaicWindow, Region, DEFAULT_DATE_FORMAT,
};

const S1_GROUPS: &str = r#"
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
"#;

fn s1_groups() -> GroupNode {
    serde_yaml::from_str(S1_GROUPS).unwrap()
}

fn keys(path: &[&str]) -> Vec<String> {
    path.iter().map(|k| k.to_string()).collect()
}

fn region() -> Region {
    Region::new(
        vec![[-80.4, 55.4], [-78.3, 55.4], [-78.3, 57.1], [-80.4, 57.1]],
        CrsCode::epsg(32617),
    )
    .unwrap()
}

fn sources() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("S1".to_string(), "COPERNICUS/S1_GRD".to_string()),
        ("S2".to_string(), "COPERNICUS/S2".to_string()),
    ])
}

fn s1_image(id: &str, day: u32, hour: u32, mode: &str, pols: &[&str]) -> ImageRecord {
    let mut properties = BTreeMap::new();
    properties.insert("instrumentMode".to_string(), FilterValue::from(mode));
    properties.insert(
        "transmitterReceiverPolarisation".to_string(),
        FilterValue::List(pols.iter().map(|p| FilterValue::from(*p)).collect()),
    );
    ImageRecord {
        id: id.to_string(),
        timestamp: Utc.with_ymd_and_hms(2022, 1, day, hour, 0, 0).unwrap(),
        footprint: BoundingBox::new(-81.0, 55.0, -79.0, 57.0),
        bands: pols.iter().map(|p| p.to_string()).collect(),
        properties,
    }
}

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_collection(
            "COPERNICUS/S1_GRD",
            vec![
                s1_image("ew_hh_1", 3, 11, "EW", &["HH", "HV"]),
                s1_image("ew_hh_2", 3, 23, "EW", &["HH", "HV"]),
                s1_image("ew_hh_3", 5, 11, "EW", &["HH"]),
                s1_image("iw_1", 4, 11, "IW", &["VV", "VH"]),
            ],
        )
        .with_collection("COPERNICUS/S2", vec![])
}

fn season() -> Season {
    Season::new(
        "2022",
        DateRange::parse("2022-01-01", "2022-01-31", DEFAULT_DATE_FORMAT).unwrap(),
    )
    .with_collection("S1", s1_groups())
    .with_collection(
        "S2",
        serde_yaml::from_str("filters:\n  - {type: lt, args: [CLOUDY_PIXEL_PERCENTAGE, 80]}\n")
            .unwrap(),
    )
}

// ============================================================================
// Flattening
// ============================================================================

#[test]
fn test_flatten_then_rebuild_round_trip() {
    let config = s1_groups();
    let entries = flatten(&config, DEFAULT_MAX_DEPTH);
    assert_eq!(entries.len(), 3);

    let mut rebuilt = GroupNode::empty_group();
    for entry in &entries {
        rebuilt.insert(&entry.path, entry.filters.clone()).unwrap();
    }

    assert_eq!(rebuilt.leaf_paths(), config.leaf_paths());
    assert_eq!(rebuilt, config);
}

#[test]
fn test_flatten_paths_unique_and_complete() {
    let entries = flatten(&s1_groups(), DEFAULT_MAX_DEPTH);
    let paths: Vec<_> = entries.iter().map(|e| e.path.clone()).collect();
    assert_eq!(
        paths,
        vec![keys(&["EW", "HH"]), keys(&["EW", "HV"]), keys(&["IW"])]
    );
    assert!(entries.iter().all(|e| !e.truncated));
}

#[test]
fn test_depth_limit_one_entry_per_truncated_branch() {
    let entries = flatten(&s1_groups(), 1);
    // IW is a leaf one level down; EW's children sit past the limit.
    let paths: Vec<_> = entries.iter().map(|e| e.path.clone()).collect();
    assert_eq!(
        paths,
        vec![keys(&["EW", TRUNCATED_SEGMENT]), keys(&["IW"])]
    );
    assert!(entries[0].truncated);
    assert!(entries[0].filters.is_empty());
    assert!(!entries[1].truncated);
}

// ============================================================================
// Building
// ============================================================================

#[test]
fn test_builder_installs_every_leaf_at_declared_path() {
    let cat = catalog();
    let region = region();
    let sources = sources();
    let seasons = vec![season()];
    let tree = GroupedCollectionBuilder::new(&cat, &region, &sources)
        .build(&seasons, &flatten_seasons(&seasons, DEFAULT_MAX_DEPTH))
        .unwrap();

    assert_eq!(tree.season_names(), vec!["2022"]);
    assert_eq!(tree.collections("2022"), vec!["S1", "S2"]);
    assert_eq!(
        tree.leaf_paths("2022", "S1"),
        vec![keys(&["EW", "HH"]), keys(&["EW", "HV"]), keys(&["IW"])]
    );

    let s1_hh = tree
        .get("2022", "S1")
        .and_then(|n| n.get(&keys(&["EW", "HH"])))
        .and_then(Node::as_leaf)
        .unwrap();
    let s2 = tree.get("2022", "S2").and_then(Node::as_leaf).unwrap();

    // Both share the season baseline of date, bounds and clip.
    let baseline = |ops: &[catalog::CollectionOp]| {
        ops[..3].iter().map(ToString::to_string).collect::<Vec<_>>()
    };
    assert_eq!(baseline(s1_hh.ops()), baseline(s2.ops()));
    assert_eq!(s1_hh.ops().len(), 5);
    assert_eq!(s2.ops().len(), 4);
}

#[test]
fn test_builder_entry_order_does_not_matter() {
    let cat = catalog();
    let region = region();
    let sources = sources();
    let seasons = vec![season()];
    let builder = GroupedCollectionBuilder::new(&cat, &region, &sources);

    let index = flatten_seasons(&seasons, DEFAULT_MAX_DEPTH);
    let mut reversed = index.clone();
    for entries in reversed.values_mut() {
        entries.reverse();
    }

    assert_eq!(
        builder.build(&seasons, &index).unwrap(),
        builder.build(&seasons, &reversed).unwrap()
    );
}

#[tokio::test]
async fn test_built_leaves_realise_to_filtered_images() {
    let cat = catalog();
    let region = region();
    let sources = sources();
    let seasons = vec![season()];
    let tree = GroupedCollectionBuilder::new(&cat, &region, &sources)
        .build(&seasons, &flatten_seasons(&seasons, DEFAULT_MAX_DEPTH))
        .unwrap();

    let s1 = tree.get("2022", "S1").unwrap();
    let hv = s1.get(&keys(&["EW", "HV"])).and_then(Node::as_leaf).unwrap();
    let iw = s1.get(&keys(&["IW"])).and_then(Node::as_leaf).unwrap();

    assert_eq!(cat.count(hv).await.unwrap(), 2);
    assert_eq!(cat.count(iw).await.unwrap(), 1);
}

// ============================================================================
// Processing
// ============================================================================

#[test]
fn test_processing_no_options_is_identity() {
    let cat = catalog();
    let region = region();
    let sources = sources();
    let seasons = vec![season()];
    let tree = GroupedCollectionBuilder::new(&cat, &region, &sources)
        .build(&seasons, &flatten_seasons(&seasons, DEFAULT_MAX_DEPTH))
        .unwrap();

    let subtree = tree.get("2022", "S1").unwrap();
    let processed = TreeProcessor::new(&cat, &region)
        .apply(subtree, &ProcessingOptions::new(), &keys(&["S1"]))
        .unwrap();
    assert_eq!(&processed, subtree);
}

#[tokio::test]
async fn test_daily_mosaic_of_group() {
    let cat = catalog();
    let region = region();
    let sources = sources();
    let seasons = vec![season()];
    let tree = GroupedCollectionBuilder::new(&cat, &region, &sources)
        .build(&seasons, &flatten_seasons(&seasons, DEFAULT_MAX_DEPTH))
        .unwrap();

    let ew: &ImageryNode = tree
        .get("2022", "S1")
        .and_then(|n| n.get(&keys(&["EW"])))
        .unwrap();
    let options = ProcessingOptions::new()
        .bands(vec!["HH".to_string()])
        .mosaic(MosaicWindow::Day, seasons[0].range);

    let processed = TreeProcessor::new(&cat, &region)
        .apply(ew, &options, &keys(&["S1", "EW"]))
        .unwrap();

    let hh = processed.get(&keys(&["HH"])).and_then(Node::as_leaf).unwrap();
    let images = cat.images(hh).await.unwrap();
    // Two images on the 3rd composite into one; the 5th stands alone.
    assert_eq!(images.len(), 2);
    assert_eq!(images[0].bands, vec!["HH"]);
    assert_eq!(images[0].properties["source_count"], FilterValue::Number(2.0));
    assert_eq!(
        images[0].timestamp,
        Utc.with_ymd_and_hms(2022, 1, 3, 0, 0, 0).unwrap()
    );
}
