//! Realised image metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use imagery_common::BoundingBox;

use crate::FilterValue;

/// Metadata for one image in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    /// Acquisition start time.
    pub timestamp: DateTime<Utc>,
    pub footprint: BoundingBox,
    pub bands: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, FilterValue>,
}
