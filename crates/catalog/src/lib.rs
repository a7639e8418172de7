//! Imagery catalog and export collaborators.
//!
//! The [`ImageCatalog`] trait is the seam between the filter-tree engine and
//! a backend holding image collections. Collections are addressed through
//! lazy [`CollectionHandle`] plans; [`InMemoryCatalog`] evaluates those plans
//! locally. The [`Exporter`] trait receives a resolved collection and hands
//! back pollable [`ExportTask`]s.

pub mod catalog;
pub mod export;
pub mod handle;
pub mod image;
pub mod memory;
pub mod predicate;

pub use catalog::ImageCatalog;
pub use export::{
    ExportGeometry, ExportTask, Exporter, LocalExportTask, LocalExporter, ResolvedExportParams,
    TaskState,
};
pub use handle::{CollectionHandle, CollectionOp};
pub use image::ImageRecord;
pub use memory::InMemoryCatalog;
pub use predicate::{FilterSpec, FilterValue, PredicateKind};
