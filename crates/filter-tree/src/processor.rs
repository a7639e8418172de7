//! Uniform per-leaf processing of imagery subtrees.

use tracing::info;

use catalog::{CollectionHandle, ImageCatalog};
use imagery_common::{DateRange, ImageryResult, MosaicWindow, Region};

use crate::builder::ImageryNode;

/// Temporal compositing request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MosaicOptions {
    pub window: MosaicWindow,
    /// Range the windows are laid out across.
    pub range: DateRange,
}

/// Operations applied to every leaf of a subtree.
///
/// Leaves are always processed date filter, then band selection, then
/// mosaic, whichever order the options were set in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessingOptions {
    date_range: Option<DateRange>,
    bands: Option<Vec<String>>,
    mosaic: Option<MosaicOptions>,
}

impl ProcessingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn bands(mut self, bands: Vec<String>) -> Self {
        self.bands = Some(bands);
        self
    }

    pub fn mosaic(mut self, window: MosaicWindow, range: DateRange) -> Self {
        self.mosaic = Some(MosaicOptions { window, range });
        self
    }

    pub fn get_date_range(&self) -> Option<&DateRange> {
        self.date_range.as_ref()
    }

    pub fn get_bands(&self) -> Option<&[String]> {
        self.bands.as_deref()
    }

    pub fn get_mosaic(&self) -> Option<&MosaicOptions> {
        self.mosaic.as_ref()
    }

    /// Nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.date_range.is_none() && self.bands.is_none() && self.mosaic.is_none()
    }
}

/// Applies [`ProcessingOptions`] to imagery subtrees of one region.
pub struct TreeProcessor<'a> {
    catalog: &'a dyn ImageCatalog,
    region: &'a Region,
}

impl<'a> TreeProcessor<'a> {
    pub fn new(catalog: &'a dyn ImageCatalog, region: &'a Region) -> Self {
        Self { catalog, region }
    }

    /// Return a processed copy of `subtree` with the same shape.
    ///
    /// `base_path` (collection and group keys above `subtree`) is only used
    /// for diagnostics.
    pub fn apply(
        &self,
        subtree: &ImageryNode,
        options: &ProcessingOptions,
        base_path: &[String],
    ) -> ImageryResult<ImageryNode> {
        subtree.try_map_leaves(base_path, &mut |path, handle| {
            Ok(self.process_leaf(handle, options, path))
        })
    }

    fn process_leaf(
        &self,
        handle: &CollectionHandle,
        options: &ProcessingOptions,
        path: &[String],
    ) -> CollectionHandle {
        let mut handle = handle.clone();

        if let Some(range) = &options.date_range {
            handle = self.catalog.filter_date_range(&handle, range);
        }

        if let Some(bands) = &options.bands {
            handle = self.catalog.select_bands(&handle, bands);
        }

        if let Some(mosaic) = &options.mosaic {
            info!(
                path = %path.join("/"),
                window = %mosaic.window,
                "Mosaicking collection"
            );
            handle = self
                .catalog
                .mosaic_by_window(&handle, &mosaic.range, self.region, mosaic.window);
        }

        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{CollectionOp, InMemoryCatalog};
    use imagery_common::{CrsCode, DEFAULT_DATE_FORMAT};

    use crate::Node;

    fn range() -> DateRange {
        DateRange::parse("2022-01-01", "2022-01-31", DEFAULT_DATE_FORMAT).unwrap()
    }

    fn region() -> Region {
        Region::new(
            vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            CrsCode::WGS84,
        )
        .unwrap()
    }

    fn subtree() -> ImageryNode {
        let mut node = ImageryNode::empty_group();
        node.insert(&["EW".to_string(), "HH".to_string()], CollectionHandle::new("S1"))
            .unwrap();
        node.insert(&["IW".to_string()], CollectionHandle::new("S1"))
            .unwrap();
        node
    }

    fn op_names(handle: &CollectionHandle) -> Vec<String> {
        handle
            .ops()
            .iter()
            .map(|op| match op {
                CollectionOp::FilterDate { .. } => "date",
                CollectionOp::SelectBands { .. } => "bands",
                CollectionOp::Mosaic { .. } => "mosaic",
                _ => "other",
            })
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_empty_options_are_identity() {
        let cat = InMemoryCatalog::new();
        let region = region();
        let tree = subtree();
        let out = TreeProcessor::new(&cat, &region)
            .apply(&tree, &ProcessingOptions::new(), &[])
            .unwrap();
        assert_eq!(out, tree);
        assert!(ProcessingOptions::new().is_empty());
    }

    #[test]
    fn test_fixed_order_regardless_of_builder_order() {
        let cat = InMemoryCatalog::new();
        let region = region();
        let options = ProcessingOptions::new()
            .mosaic(MosaicWindow::Day, range())
            .bands(vec!["HH".to_string()])
            .date_range(range());

        let out = TreeProcessor::new(&cat, &region)
            .apply(&subtree(), &options, &["S1".to_string()])
            .unwrap();

        let leaf = out
            .get(&["EW".to_string(), "HH".to_string()])
            .and_then(Node::as_leaf)
            .unwrap();
        assert_eq!(op_names(leaf), vec!["date", "bands", "mosaic"]);
    }

    #[test]
    fn test_option_order_gives_identical_trees() {
        let cat = InMemoryCatalog::new();
        let region = region();
        let processor = TreeProcessor::new(&cat, &region);
        let base = ["S1".to_string()];

        let forward = ProcessingOptions::new()
            .date_range(range())
            .bands(vec!["HH".to_string()])
            .mosaic(MosaicWindow::Week, range());
        let backward = ProcessingOptions::new()
            .mosaic(MosaicWindow::Week, range())
            .bands(vec!["HH".to_string()])
            .date_range(range());

        let a = processor.apply(&subtree(), &forward, &base).unwrap();
        let b = processor.apply(&subtree(), &backward, &base).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_shape_preserved_and_source_untouched() {
        let cat = InMemoryCatalog::new();
        let region = region();
        let tree = subtree();
        let options = ProcessingOptions::new().bands(vec!["HV".to_string()]);

        let out = TreeProcessor::new(&cat, &region)
            .apply(&tree, &options, &[])
            .unwrap();

        assert_eq!(out.leaf_paths(), tree.leaf_paths());
        tree.walk(&mut |_, handle| assert!(handle.ops().is_empty()));
        out.walk(&mut |_, handle| assert_eq!(op_names(handle), vec!["bands"]));
    }

    #[test]
    fn test_single_leaf_subtree() {
        let cat = InMemoryCatalog::new();
        let region = region();
        let leaf = Node::Leaf(CollectionHandle::new("S2"));
        let out = TreeProcessor::new(&cat, &region)
            .apply(&leaf, &ProcessingOptions::new().date_range(range()), &[])
            .unwrap();
        assert_eq!(op_names(out.as_leaf().unwrap()), vec!["date"]);
    }
}
