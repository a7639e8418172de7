//! Nested filter-configuration engine.
//!
//! Turns per-season, per-collection grouping configuration into a tree of
//! filtered catalog collections:
//!
//! - [`flatten`] walks a [`GroupNode`] into `(path, filters)` entries;
//! - [`match_season`] maps an ad-hoc date range onto the configured seasons;
//! - [`GroupedCollectionBuilder`] installs one filtered handle per entry in an
//!   [`ImageryTree`];
//! - [`TreeProcessor`] rewrites every leaf under a subtree with date, band
//!   and mosaic operations.

pub mod builder;
pub mod config;
pub mod flatten;
pub mod processor;
pub mod season;
pub mod tree;

pub use builder::{flatten_seasons, FlattenedIndex, GroupedCollectionBuilder, ImageryNode, ImageryTree};
pub use config::{FilterSet, GroupNode, FILTERS_KEY, TRUNCATED_SEGMENT};
pub use flatten::{flatten, FlattenedEntry, DEFAULT_MAX_DEPTH};
pub use processor::{MosaicOptions, ProcessingOptions, TreeProcessor};
pub use season::{match_season, Season, SeasonMatch};
pub use tree::{Node, Outline};
