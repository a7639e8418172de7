//! Seasons and matching of ad-hoc date ranges onto them.

use std::collections::BTreeMap;
use tracing::debug;

use imagery_common::{DateRange, ImageryError, ImageryResult};

use crate::config::GroupNode;

/// A named, dated window with per-collection grouping configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Season {
    pub name: String,
    pub range: DateRange,
    /// Collection short name (e.g. `S1`) to its grouping configuration.
    pub collections: BTreeMap<String, GroupNode>,
}

impl Season {
    pub fn new(name: impl Into<String>, range: DateRange) -> Self {
        Self {
            name: name.into(),
            range,
            collections: BTreeMap::new(),
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>, config: GroupNode) -> Self {
        self.collections.insert(collection.into(), config);
        self
    }
}

/// The season a query resolved to and the part of the query inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonMatch {
    pub season: String,
    pub overlap: DateRange,
}

/// Match `query` to the first season, in declaration order, it overlaps.
///
/// Only the first overlapping season is returned even when the query spans
/// several.
pub fn match_season(query: &DateRange, seasons: &[Season]) -> ImageryResult<SeasonMatch> {
    seasons
        .iter()
        .find_map(|season| {
            season.range.overlap(query).map(|overlap| SeasonMatch {
                season: season.name.clone(),
                overlap,
            })
        })
        .inspect(|m| debug!(season = %m.season, overlap = %m.overlap, "Matched date query to season"))
        .ok_or_else(|| ImageryError::NoMatchingSeason {
            start: query.start(),
            end: query.end(),
        })
}
