//! The imagery catalog seam.

use async_trait::async_trait;

use imagery_common::{DateRange, ImageryError, ImageryResult, MosaicWindow, Region};

use crate::{CollectionHandle, CollectionOp, FilterSpec, ImageRecord, PredicateKind};

/// A source of filterable, clippable, mosaic-able image collections.
///
/// Handle operations only extend the lazy plan and never contact the
/// backend. Realisation (`images`, `count`, `first_band_names`) is async
/// because real backends are remote.
#[async_trait]
pub trait ImageCatalog: Send + Sync {
    /// Handle on an unfiltered source collection.
    fn open(&self, source_id: &str) -> ImageryResult<CollectionHandle>;

    /// Whether `kind` names a predicate this catalog can evaluate.
    fn supports_predicate(&self, kind: &str) -> bool {
        PredicateKind::from_name(kind).is_some()
    }

    fn filter_date_range(&self, handle: &CollectionHandle, range: &DateRange) -> CollectionHandle {
        handle.then(CollectionOp::FilterDate { range: *range })
    }

    fn filter_bounds(&self, handle: &CollectionHandle, region: &Region) -> CollectionHandle {
        handle.then(CollectionOp::FilterBounds {
            region: region.clone(),
        })
    }

    fn clip(&self, handle: &CollectionHandle, region: &Region) -> CollectionHandle {
        handle.then(CollectionOp::Clip {
            region: region.clone(),
        })
    }

    /// Narrow a collection with one configured predicate.
    fn apply_predicate(
        &self,
        handle: &CollectionHandle,
        filter: &FilterSpec,
    ) -> ImageryResult<CollectionHandle> {
        if !self.supports_predicate(&filter.kind) {
            return Err(ImageryError::Configuration(format!(
                "unsupported filter type '{}'",
                filter.kind
            )));
        }
        PredicateKind::check(filter)?;
        Ok(handle.then(CollectionOp::Predicate {
            filter: filter.clone(),
        }))
    }

    fn select_bands(&self, handle: &CollectionHandle, bands: &[String]) -> CollectionHandle {
        handle.then(CollectionOp::SelectBands {
            bands: bands.to_vec(),
        })
    }

    /// Composite images per `window` across `range`, clipped to `region`.
    fn mosaic_by_window(
        &self,
        handle: &CollectionHandle,
        range: &DateRange,
        region: &Region,
        window: MosaicWindow,
    ) -> CollectionHandle {
        handle.then(CollectionOp::Mosaic {
            range: *range,
            window,
            region: region.clone(),
        })
    }

    /// Realise the plan into image metadata, ordered by timestamp.
    async fn images(&self, handle: &CollectionHandle) -> ImageryResult<Vec<ImageRecord>>;

    async fn count(&self, handle: &CollectionHandle) -> ImageryResult<usize> {
        Ok(self.images(handle).await?.len())
    }

    /// Band names of the first image in the collection.
    async fn first_band_names(&self, handle: &CollectionHandle) -> ImageryResult<Vec<String>> {
        self.images(handle)
            .await?
            .into_iter()
            .next()
            .map(|image| image.bands)
            .ok_or_else(|| ImageryError::EmptyCollection(handle.to_string()))
    }
}
