//! Construction of the grouped imagery tree.

use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, instrument};

use catalog::{CollectionHandle, ImageCatalog};
use imagery_common::{ImageryError, ImageryResult, Region};

use crate::flatten::{flatten, FlattenedEntry};
use crate::season::Season;
use crate::tree::Outline;
use crate::Node;

/// Realised imagery node: a collection handle or a group of them.
pub type ImageryNode = Node<CollectionHandle>;

/// Flattened configuration per `(season, collection)`.
pub type FlattenedIndex = BTreeMap<(String, String), Vec<FlattenedEntry>>;

/// Flatten the grouping configuration of every season/collection pair.
pub fn flatten_seasons(seasons: &[Season], max_depth: usize) -> FlattenedIndex {
    let mut index = FlattenedIndex::new();
    for season in seasons {
        for (collection, config) in &season.collections {
            index.insert(
                (season.name.clone(), collection.clone()),
                flatten(config, max_depth),
            );
        }
    }
    index
}

/// Filtered collections keyed `[season][collection][group keys...]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageryTree {
    seasons: BTreeMap<String, BTreeMap<String, ImageryNode>>,
}

impl ImageryTree {
    pub fn season_names(&self) -> Vec<&str> {
        self.seasons.keys().map(String::as_str).collect()
    }

    pub fn has_season(&self, season: &str) -> bool {
        self.seasons.contains_key(season)
    }

    /// Collections loaded for a season.
    pub fn collections(&self, season: &str) -> Vec<&str> {
        self.seasons
            .get(season)
            .map(|c| c.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// The subtree for one season and collection.
    pub fn get(&self, season: &str, collection: &str) -> Option<&ImageryNode> {
        self.seasons.get(season)?.get(collection)
    }

    /// Paths, relative to the collection, of every leaf under it.
    pub fn leaf_paths(&self, season: &str, collection: &str) -> Vec<Vec<String>> {
        self.get(season, collection)
            .map(Node::leaf_paths)
            .unwrap_or_default()
    }

    fn slot(&mut self, season: &str, collection: &str) -> &mut ImageryNode {
        self.seasons
            .entry(season.to_string())
            .or_default()
            .entry(collection.to_string())
            .or_default()
    }
}

impl fmt::Display for ImageryTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (season, collections) in &self.seasons {
            writeln!(f, "{}:", season)?;
            for (collection, node) in collections {
                writeln!(f, "  {}:", collection)?;
                for line in Outline(node).to_string().lines() {
                    writeln!(f, "    {}", line)?;
                }
            }
        }
        Ok(())
    }
}

/// Builds the [`ImageryTree`] for one region from flattened configuration.
pub struct GroupedCollectionBuilder<'a> {
    catalog: &'a dyn ImageCatalog,
    region: &'a Region,
    /// Collection short name to catalog source id.
    sources: &'a BTreeMap<String, String>,
}

impl<'a> GroupedCollectionBuilder<'a> {
    pub fn new(
        catalog: &'a dyn ImageCatalog,
        region: &'a Region,
        sources: &'a BTreeMap<String, String>,
    ) -> Self {
        Self {
            catalog,
            region,
            sources,
        }
    }

    /// Date, bounds and clip filters shared by every entry of a pair.
    fn baseline(&self, season: &Season, collection: &str) -> ImageryResult<CollectionHandle> {
        let source = self.sources.get(collection).ok_or_else(|| {
            ImageryError::Configuration(format!(
                "season {} configures collection '{}', which has no catalog source",
                season.name, collection
            ))
        })?;

        let handle = self.catalog.open(source)?;
        let handle = self.catalog.filter_date_range(&handle, &season.range);
        let handle = self.catalog.filter_bounds(&handle, self.region);
        Ok(self.catalog.clip(&handle, self.region))
    }

    fn filtered(
        &self,
        baseline: &CollectionHandle,
        season: &str,
        collection: &str,
        entry: &FlattenedEntry,
    ) -> ImageryResult<CollectionHandle> {
        let mut handle = baseline.clone();
        for filter in &entry.filters {
            if !self.catalog.supports_predicate(&filter.kind) {
                return Err(ImageryError::UnsupportedFilter {
                    season: season.to_string(),
                    collection: collection.to_string(),
                    filter: filter.kind.clone(),
                });
            }
            handle = self.catalog.apply_predicate(&handle, filter)?;
        }
        Ok(handle)
    }

    /// Build the whole tree. Nothing is returned unless every entry installs.
    ///
    /// Every source collection gets a slot in every season, empty unless the
    /// season configures it.
    #[instrument(skip_all, fields(seasons = seasons.len()))]
    pub fn build(&self, seasons: &[Season], flattened: &FlattenedIndex) -> ImageryResult<ImageryTree> {
        let mut tree = ImageryTree::default();

        for season in seasons {
            for collection in self.sources.keys() {
                tree.slot(&season.name, collection);
            }

            for collection in season.collections.keys() {
                let baseline = self.baseline(season, collection)?;
                let slot = tree.slot(&season.name, collection);

                let entries = flattened
                    .get(&(season.name.clone(), collection.clone()))
                    .map(Vec::as_slice)
                    .unwrap_or_default();

                for entry in entries {
                    let handle = self.filtered(&baseline, &season.name, collection, entry)?;
                    debug!(
                        season = %season.name,
                        collection = %collection,
                        path = %entry.path.join("/"),
                        plan = %handle,
                        "Installing filtered collection"
                    );
                    slot.insert(&entry.path, handle)?;
                }
            }
        }

        info!(seasons = ?tree.season_names(), "Imagery tree built");
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{CollectionOp, FilterSpec, InMemoryCatalog};
    use imagery_common::{CrsCode, DateRange, DEFAULT_DATE_FORMAT};

    use crate::config::GroupNode;
    use crate::flatten::DEFAULT_MAX_DEPTH;

    fn region() -> Region {
        Region::new(
            vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            CrsCode::WGS84,
        )
        .unwrap()
    }

    fn sources() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("S1".to_string(), "COPERNICUS/S1_GRD".to_string()),
            ("S2".to_string(), "COPERNICUS/S2".to_string()),
        ])
    }

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new()
            .with_collection("COPERNICUS/S1_GRD", vec![])
            .with_collection("COPERNICUS/S2", vec![])
    }

    fn season() -> Season {
        let s1: GroupNode = serde_yaml::from_str(
            "EW:\n  filters:\n    - {type: eq, args: [instrumentMode, EW]}\n",
        )
        .unwrap();
        let s2: GroupNode = serde_yaml::from_str(
            "filters:\n  - {type: lt, args: [CLOUDY_PIXEL_PERCENTAGE, 80]}\n",
        )
        .unwrap();
        Season::new(
            "2022",
            DateRange::parse("2021-12-01", "2022-05-31", DEFAULT_DATE_FORMAT).unwrap(),
        )
        .with_collection("S1", s1)
        .with_collection("S2", s2)
    }

    #[test]
    fn test_leaves_carry_baseline_then_filters() {
        let cat = catalog();
        let region = region();
        let sources = sources();
        let seasons = vec![season()];
        let tree = GroupedCollectionBuilder::new(&cat, &region, &sources)
            .build(&seasons, &flatten_seasons(&seasons, DEFAULT_MAX_DEPTH))
            .unwrap();

        let s1 = tree
            .get("2022", "S1")
            .and_then(|n| n.get(&["EW".to_string()]))
            .and_then(Node::as_leaf)
            .unwrap();
        assert_eq!(s1.source_id(), "COPERNICUS/S1_GRD");
        assert!(matches!(s1.ops()[0], CollectionOp::FilterDate { range } if range == seasons[0].range));
        assert!(matches!(s1.ops()[1], CollectionOp::FilterBounds { .. }));
        assert!(matches!(s1.ops()[2], CollectionOp::Clip { .. }));
        assert!(matches!(&s1.ops()[3], CollectionOp::Predicate { filter } if filter.kind == "eq"));

        // Empty path installs directly at the collection slot.
        let s2 = tree.get("2022", "S2").and_then(Node::as_leaf).unwrap();
        assert_eq!(s2.ops().len(), 4);
    }

    #[test]
    fn test_unknown_collection_key_is_config_error() {
        let cat = catalog();
        let region = region();
        let sources = BTreeMap::from([("S2".to_string(), "COPERNICUS/S2".to_string())]);
        let seasons = vec![season()];
        let err = GroupedCollectionBuilder::new(&cat, &region, &sources)
            .build(&seasons, &flatten_seasons(&seasons, DEFAULT_MAX_DEPTH))
            .unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_unsupported_filter_names_season_and_collection() {
        let cat = catalog();
        let region = region();
        let sources = sources();
        let bad: GroupNode = Node::Leaf(vec![FilterSpec::new("withinDistance", vec![])]);
        let seasons = vec![Season::new(
            "2023",
            DateRange::parse("2023-01-01", "2023-02-01", DEFAULT_DATE_FORMAT).unwrap(),
        )
        .with_collection("S2", bad)];

        let err = GroupedCollectionBuilder::new(&cat, &region, &sources)
            .build(&seasons, &flatten_seasons(&seasons, DEFAULT_MAX_DEPTH))
            .unwrap_err();
        match err {
            ImageryError::UnsupportedFilter {
                season,
                collection,
                filter,
            } => {
                assert_eq!(season, "2023");
                assert_eq!(collection, "S2");
                assert_eq!(filter, "withinDistance");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_grouping_yields_empty_slot() {
        let cat = catalog();
        let region = region();
        let sources = sources();
        let seasons = vec![Season::new(
            "2023",
            DateRange::parse("2023-01-01", "2023-02-01", DEFAULT_DATE_FORMAT).unwrap(),
        )
        .with_collection("S1", GroupNode::empty_group())];

        let tree = GroupedCollectionBuilder::new(&cat, &region, &sources)
            .build(&seasons, &flatten_seasons(&seasons, DEFAULT_MAX_DEPTH))
            .unwrap();
        assert_eq!(tree.get("2023", "S1"), Some(&Node::empty_group()));
        // Every configured collection gets a slot, grouped or not.
        assert_eq!(tree.collections("2023"), vec!["S1", "S2"]);
        assert_eq!(tree.get("2023", "S2"), Some(&Node::empty_group()));
    }
}
