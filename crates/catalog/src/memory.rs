//! In-memory catalog backed by image metadata records.
//!
//! Evaluates collection plans locally. Used by the CLI with a JSON snapshot
//! of a catalog and by tests.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

use imagery_common::{
    format_compact, DateRange, ImageryError, ImageryResult, MosaicWindow, Region,
};

use crate::{CollectionHandle, CollectionOp, FilterValue, ImageCatalog, ImageRecord, PredicateKind};

/// JSON snapshot layout: `{"collections": {"<source id>": [ImageRecord, ...]}}`.
#[derive(Debug, Deserialize)]
struct CatalogSnapshot {
    collections: HashMap<String, Vec<ImageRecord>>,
}

/// Catalog holding every image of every source in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    collections: HashMap<String, Vec<ImageRecord>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a source collection.
    pub fn with_collection(mut self, source_id: impl Into<String>, images: Vec<ImageRecord>) -> Self {
        self.insert(source_id, images);
        self
    }

    pub fn insert(&mut self, source_id: impl Into<String>, mut images: Vec<ImageRecord>) {
        images.sort_by_key(|image| image.timestamp);
        self.collections.insert(source_id.into(), images);
    }

    pub fn from_json_str(json: &str) -> ImageryResult<Self> {
        let snapshot: CatalogSnapshot = serde_json::from_str(json)?;
        let mut catalog = Self::new();
        for (source_id, images) in snapshot.collections {
            catalog.insert(source_id, images);
        }
        Ok(catalog)
    }

    /// Load a catalog snapshot file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ImageryResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    pub fn source_ids(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// Run a plan against the stored records.
    pub fn evaluate(&self, handle: &CollectionHandle) -> ImageryResult<Vec<ImageRecord>> {
        let mut images = self
            .collections
            .get(handle.source_id())
            .cloned()
            .ok_or_else(|| ImageryError::UnknownSource(handle.source_id().to_string()))?;

        for op in handle.ops() {
            images = apply_op(images, op)?;
            debug!(op = %op, remaining = images.len(), "Applied collection op");
        }

        Ok(images)
    }
}

fn apply_op(images: Vec<ImageRecord>, op: &CollectionOp) -> ImageryResult<Vec<ImageRecord>> {
    Ok(match op {
        // Half-open, matching catalog date filters: [start, end).
        CollectionOp::FilterDate { range } => images
            .into_iter()
            .filter(|image| image.timestamp >= range.start() && image.timestamp < range.end())
            .collect(),
        CollectionOp::FilterBounds { region } => {
            let bounds = region.bounds();
            images
                .into_iter()
                .filter(|image| image.footprint.intersects(&bounds))
                .collect()
        }
        CollectionOp::Clip { region } => {
            let bounds = region.bounds();
            images
                .into_iter()
                .filter_map(|mut image| {
                    image.footprint = image.footprint.intersection(&bounds)?;
                    Some(image)
                })
                .collect()
        }
        CollectionOp::Predicate { filter } => {
            let kind = PredicateKind::check(filter)?.ok_or_else(|| {
                ImageryError::Catalog(format!("cannot evaluate filter type '{}'", filter.kind))
            })?;
            images
                .into_iter()
                .filter(|image| kind.evaluate(&filter.args, &image.properties))
                .collect()
        }
        CollectionOp::SelectBands { bands } => images
            .into_iter()
            .map(|image| select_bands(image, bands))
            .collect::<ImageryResult<Vec<_>>>()?,
        CollectionOp::Mosaic {
            range,
            window,
            region,
        } => mosaic(images, range, *window, region),
    })
}

fn select_bands(mut image: ImageRecord, bands: &[String]) -> ImageryResult<ImageRecord> {
    if let Some(missing) = bands.iter().find(|b| !image.bands.contains(b)) {
        return Err(ImageryError::MissingBand {
            band: missing.clone(),
            image: image.id,
        });
    }
    image.bands = bands.to_vec();
    Ok(image)
}

/// One composite per non-empty window; later images are drawn on top.
fn mosaic(
    mut images: Vec<ImageRecord>,
    range: &DateRange,
    window: MosaicWindow,
    region: &Region,
) -> Vec<ImageRecord> {
    images.sort_by_key(|image| image.timestamp);
    let bounds = region.bounds();

    let mut composites = Vec::new();
    for (k, start) in window.window_starts(range).into_iter().enumerate() {
        let end = u32::try_from(k + 1)
            .ok()
            .and_then(|next| window.nth_start(range.start(), next));
        let tiles: Vec<&ImageRecord> = images
            .iter()
            .filter(|image| image.timestamp >= start && end.map_or(true, |e| image.timestamp < e))
            .collect();

        let Some(first) = tiles.first() else {
            continue;
        };

        let footprint = tiles
            .iter()
            .skip(1)
            .fold(first.footprint, |acc, tile| acc.union(&tile.footprint));
        let Some(footprint) = footprint.intersection(&bounds) else {
            continue;
        };

        let mut properties = BTreeMap::new();
        for tile in &tiles {
            properties.extend(tile.properties.clone());
        }
        properties.insert(
            "source_count".to_string(),
            FilterValue::Number(tiles.len() as f64),
        );
        properties.insert(
            "source_ids".to_string(),
            FilterValue::List(tiles.iter().map(|t| FilterValue::Text(t.id.clone())).collect()),
        );

        composites.push(ImageRecord {
            id: format!("mosaic_{}", format_compact(&start)),
            timestamp: start,
            footprint,
            bands: first.bands.clone(),
            properties,
        });
    }

    composites
}

#[async_trait]
impl ImageCatalog for InMemoryCatalog {
    fn open(&self, source_id: &str) -> ImageryResult<CollectionHandle> {
        if !self.collections.contains_key(source_id) {
            return Err(ImageryError::UnknownSource(source_id.to_string()));
        }
        Ok(CollectionHandle::new(source_id))
    }

    async fn images(&self, handle: &CollectionHandle) -> ImageryResult<Vec<ImageRecord>> {
        self.evaluate(handle)
    }
}
