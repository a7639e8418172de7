//! Lazy collection handles.
//!
//! A handle never holds imagery. It records the source collection and the
//! ordered operations to apply to it; a catalog realises the plan only when
//! asked for images, counts or band names.

use serde::Serialize;
use std::fmt;

use imagery_common::{DateRange, MosaicWindow, Region};

use crate::FilterSpec;

/// One step of a collection plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CollectionOp {
    FilterDate { range: DateRange },
    FilterBounds { region: Region },
    Clip { region: Region },
    Predicate { filter: FilterSpec },
    SelectBands { bands: Vec<String> },
    Mosaic {
        range: DateRange,
        window: MosaicWindow,
        region: Region,
    },
}

impl fmt::Display for CollectionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionOp::FilterDate { range } => write!(f, "filterDate({})", range),
            CollectionOp::FilterBounds { .. } => write!(f, "filterBounds(roi)"),
            CollectionOp::Clip { .. } => write!(f, "clip(roi)"),
            CollectionOp::Predicate { filter } => write!(f, "filter({})", filter),
            CollectionOp::SelectBands { bands } => write!(f, "select({})", bands.join(",")),
            CollectionOp::Mosaic { window, .. } => write!(f, "mosaic({})", window),
        }
    }
}

/// A reference to a filtered, possibly transformed image collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionHandle {
    source_id: String,
    ops: Vec<CollectionOp>,
}

impl CollectionHandle {
    /// Unfiltered handle on a catalog source.
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            ops: Vec::new(),
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn ops(&self) -> &[CollectionOp] {
        &self.ops
    }

    /// New handle with `op` appended; `self` is left untouched.
    pub fn then(&self, op: CollectionOp) -> Self {
        let mut ops = Vec::with_capacity(self.ops.len() + 1);
        ops.extend_from_slice(&self.ops);
        ops.push(op);
        Self {
            source_id: self.source_id.clone(),
            ops,
        }
    }

    /// True if this plan extends `base` (same source, `base` ops as prefix).
    pub fn derives_from(&self, base: &CollectionHandle) -> bool {
        self.source_id == base.source_id && self.ops.starts_with(&base.ops)
    }
}

impl fmt::Display for CollectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageCollection({})", self.source_id)?;
        for op in &self.ops {
            write!(f, ".{}", op)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_then_does_not_mutate_base() {
        let base = CollectionHandle::new("COPERNICUS/S2");
        let narrowed = base.then(CollectionOp::SelectBands {
            bands: vec!["B4".to_string()],
        });
        assert!(base.ops().is_empty());
        assert_eq!(narrowed.ops().len(), 1);
        assert!(narrowed.derives_from(&base));
        assert!(!base.derives_from(&narrowed));
    }

    #[test]
    fn test_display_lists_ops() {
        let handle = CollectionHandle::new("COPERNICUS/S2").then(CollectionOp::SelectBands {
            bands: vec!["B2".to_string(), "B3".to_string()],
        });
        assert_eq!(handle.to_string(), "ImageCollection(COPERNICUS/S2).select(B2,B3)");
    }
}
