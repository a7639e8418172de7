//! Retrieval and export of grouped imagery for one region of interest.

use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use catalog::{CollectionHandle, ExportTask, Exporter, ImageCatalog, ResolvedExportParams};
use filter_tree::{
    flatten_seasons, FlattenedEntry, FlattenedIndex, GroupedCollectionBuilder, ImageryNode,
    ImageryTree, Outline, ProcessingOptions, TreeProcessor, DEFAULT_MAX_DEPTH,
};
use imagery_common::{ImageryError, ImageryResult};

use crate::config_loader::{RoiConfig, RoiRegistry};
use crate::export::{default_folder, export_basename, ExportParams};
use crate::query::{resolve_time_selector, ImageryRequest, QueryWarning, Warnings};

/// Result of [`ImagerySession::get_imagery`].
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub season: String,
    /// Group keys actually descended, in order.
    pub path: Vec<String>,
    pub node: ImageryNode,
    pub warnings: Vec<QueryWarning>,
}

/// A single collection ready to export.
#[derive(Debug, Clone)]
pub struct ExportPlan {
    pub season: String,
    pub collection: String,
    pub path: Vec<String>,
    pub handle: CollectionHandle,
    pub params: ResolvedExportParams,
    pub basename: String,
    pub image_count: usize,
    /// Band names of the first image; empty when there are no images.
    pub bands: Vec<String>,
    pub warnings: Vec<QueryWarning>,
}

impl fmt::Display for ExportPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Season:      {}", self.season)?;
        writeln!(f, "Collection:  {}", join_path(&self.collection, &self.path))?;
        writeln!(f, "Images:      {}", self.image_count)?;
        writeln!(f, "Bands:       {}", self.bands.join(", "))?;
        writeln!(f, "Basename:    {}", self.basename)?;
        writeln!(f, "Folder:      {}", self.params.folder)?;
        writeln!(f, "CRS:         {}", self.params.crs)?;
        write!(f, "Geometry:    {:?}", self.params.geometry)
    }
}

/// A submitted export.
pub struct ExportSubmission {
    pub plan: ExportPlan,
    pub tasks: Vec<Box<dyn ExportTask>>,
}

/// Grouped imagery of one region, built once and queried many times.
pub struct ImagerySession {
    roi: RoiConfig,
    catalog: Arc<dyn ImageCatalog>,
    flattened: FlattenedIndex,
    tree: ImageryTree,
}

impl ImagerySession {
    /// Flatten every season's grouping and build the imagery tree. Any
    /// configuration error aborts the whole session.
    #[instrument(skip(registry, catalog))]
    pub fn new(
        registry: &RoiRegistry,
        roi_name: &str,
        catalog: Arc<dyn ImageCatalog>,
    ) -> ImageryResult<Self> {
        let roi = registry.get(roi_name)?.clone();
        let flattened = flatten_seasons(&roi.seasons, DEFAULT_MAX_DEPTH);

        let tree = GroupedCollectionBuilder::new(catalog.as_ref(), &roi.region, &roi.collections)
            .build(&roi.seasons, &flattened)?;

        info!(
            roi = %roi.name,
            seasons = ?tree.season_names(),
            "Imagery session ready"
        );

        Ok(Self {
            roi,
            catalog,
            flattened,
            tree,
        })
    }

    pub fn roi(&self) -> &RoiConfig {
        &self.roi
    }

    pub fn catalog(&self) -> &dyn ImageCatalog {
        self.catalog.as_ref()
    }

    pub fn tree(&self) -> &ImageryTree {
        &self.tree
    }

    /// Sorted names of the seasons in the tree.
    pub fn seasons_loaded(&self) -> Vec<&str> {
        self.tree.season_names()
    }

    pub fn flattened(&self, season: &str, collection: &str) -> Option<&[FlattenedEntry]> {
        self.flattened
            .get(&(season.to_string(), collection.to_string()))
            .map(Vec::as_slice)
    }

    /// Resolve a request to a subtree of the imagery tree, processed when
    /// the request asks for a date filter, bands or mosaicking.
    pub fn get_imagery(&self, request: &ImageryRequest) -> ImageryResult<Retrieval> {
        let mut warnings = Warnings::new();
        let time = resolve_time_selector(
            request.season.as_deref(),
            request.date_query.as_ref(),
            &self.roi.seasons,
            &mut warnings,
        )?;

        let root = self
            .tree
            .get(&time.season, &request.collection)
            .ok_or_else(|| ImageryError::CollectionNotLoaded {
                season: time.season.clone(),
                collection: request.collection.clone(),
            })?;

        let mut node = root;
        let mut path = Vec::new();
        for key in &request.path {
            match node.child(key) {
                Some(child) => {
                    node = child;
                    path.push(key.clone());
                }
                None => warnings.push(QueryWarning::PathNotFound {
                    key: key.clone(),
                    at: join_path(&request.collection, &path),
                }),
            }
        }

        let mut options = ProcessingOptions::new();
        if let Some(range) = time.date_filter {
            options = options.date_range(range);
        }
        if !request.bands.is_empty() {
            options = options.bands(request.bands.clone());
        }
        if let Some(window) = request.mosaic {
            let range = match time.date_filter {
                Some(range) => range,
                None => self.season_range(&time.season)?,
            };
            options = options.mosaic(window, range);
        }

        let node = if options.is_empty() {
            node.clone()
        } else {
            let mut base = vec![request.collection.clone()];
            base.extend(path.iter().cloned());
            TreeProcessor::new(self.catalog.as_ref(), &self.roi.region).apply(node, &options, &base)?
        };

        Ok(Retrieval {
            season: time.season,
            path,
            node,
            warnings: warnings.into_vec(),
        })
    }

    /// Retrieve a single collection and work out how it will be exported.
    #[instrument(skip(self, params), fields(roi = %self.roi.name, collection = %request.collection))]
    pub async fn prepare_export(
        &self,
        request: &ImageryRequest,
        params: &ExportParams,
    ) -> ImageryResult<ExportPlan> {
        let retrieval = self.get_imagery(request)?;

        let handle = match retrieval.node.as_leaf() {
            Some(handle) => handle.clone(),
            None => {
                return Err(ImageryError::WrongShape {
                    path: join_path(&request.collection, &retrieval.path),
                    valid_paths: retrieval
                        .node
                        .leaf_paths()
                        .iter()
                        .map(|leaf| {
                            let mut full = retrieval.path.clone();
                            full.extend(leaf.iter().cloned());
                            join_path(&request.collection, &full)
                        })
                        .collect(),
                })
            }
        };

        let mut warnings = Warnings::new();
        let roi_crs = self.roi.crs_configured.then(|| self.roi.region.crs());
        let folder = default_folder(
            &self.roi.name,
            &request.collection,
            &retrieval.season,
            &retrieval.path,
        );
        let params = params.resolve(roi_crs, folder, &mut warnings)?;
        let basename = export_basename(&request.collection, &retrieval.path, &params.geometry);

        let image_count = self.catalog.count(&handle).await?;
        let bands = if image_count > 0 {
            self.catalog.first_band_names(&handle).await?
        } else {
            warn!(plan = %handle, "Export selection contains no images");
            Vec::new()
        };

        let mut all_warnings = retrieval.warnings;
        all_warnings.extend(warnings.into_vec());

        Ok(ExportPlan {
            season: retrieval.season,
            collection: request.collection.clone(),
            path: retrieval.path,
            handle,
            params,
            basename,
            image_count,
            bands,
            warnings: all_warnings,
        })
    }

    /// Hand a prepared plan to an exporter.
    pub async fn submit_export(
        &self,
        plan: &ExportPlan,
        exporter: &dyn Exporter,
    ) -> ImageryResult<Vec<Box<dyn ExportTask>>> {
        let tasks = exporter
            .export(
                self.catalog.as_ref(),
                &plan.handle,
                &self.roi.region,
                &plan.basename,
                &plan.params,
            )
            .await?;

        info!(
            basename = %plan.basename,
            folder = %plan.params.folder,
            tasks = tasks.len(),
            "Export submitted"
        );
        Ok(tasks)
    }

    /// [`prepare_export`](Self::prepare_export) then
    /// [`submit_export`](Self::submit_export).
    pub async fn export_imagery(
        &self,
        request: &ImageryRequest,
        params: &ExportParams,
        exporter: &dyn Exporter,
    ) -> ImageryResult<ExportSubmission> {
        let plan = self.prepare_export(request, params).await?;
        let tasks = self.submit_export(&plan, exporter).await?;
        Ok(ExportSubmission { plan, tasks })
    }

    fn season_range(&self, season: &str) -> ImageryResult<imagery_common::DateRange> {
        self.roi
            .seasons
            .iter()
            .find(|s| s.name == season)
            .map(|s| s.range)
            .ok_or(ImageryError::MissingTimeSelector)
    }
}

impl fmt::Display for ImagerySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seasons = self.seasons_loaded();
        writeln!(f, "ROI: {}", self.roi.name)?;
        writeln!(f, "Seasons loaded: {}", seasons.join(", "))?;

        if let Some(latest) = seasons.last() {
            writeln!(f, "Structure of season {}:", latest)?;
            for collection in self.tree.collections(latest) {
                writeln!(f, "  {}:", collection)?;
                if let Some(node) = self.tree.get(latest, collection) {
                    for line in Outline(node).to_string().lines() {
                        writeln!(f, "    {}", line)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn join_path(collection: &str, keys: &[String]) -> String {
    std::iter::once(collection)
        .chain(keys.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join("/")
}
