//! Error types for the seasonal imagery workspace.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias using ImageryError.
pub type ImageryResult<T> = Result<T, ImageryError>;

/// Primary error type for imagery configuration, retrieval and export.
#[derive(Debug, Error)]
pub enum ImageryError {
    // === Configuration Errors ===
    #[error("Region of interest '{0}' is not registered")]
    UnknownRegion(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Unsupported filter type '{filter}' for collection {collection} in season {season}")]
    UnsupportedFilter {
        season: String,
        collection: String,
        filter: String,
    },

    #[error("Filter '{filter}' expects {expected} argument(s), got {found}")]
    FilterArity {
        filter: String,
        expected: usize,
        found: usize,
    },

    #[error("Invalid CRS: {0}")]
    InvalidCrs(String),

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    // === Query Errors ===
    #[error("Could not parse '{value}' with date format '{format}'")]
    InvalidDate { value: String, format: String },

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Invalid mosaic window '{0}': expected hour, day, week or month")]
    InvalidMosaicWindow(String),

    #[error("Date range {start} to {end} does not overlap any configured season")]
    NoMatchingSeason {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("A valid season or a complete date range is required")]
    MissingTimeSelector,

    #[error("Imagery not loaded for season {season}, collection {collection}")]
    CollectionNotLoaded { season: String, collection: String },

    #[error(
        "'{path}' is a group, not a single collection; add nested keys. Valid paths: {}",
        valid_paths.join(", ")
    )]
    WrongShape {
        path: String,
        valid_paths: Vec<String>,
    },

    // === Catalog Errors ===
    #[error("Unknown catalog source: {0}")]
    UnknownSource(String),

    #[error("Band '{band}' not present in image {image}")]
    MissingBand { band: String, image: String },

    #[error("Collection is empty: {0}")]
    EmptyCollection(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    // === Export Errors ===
    #[error("Invalid export parameters: {0}")]
    InvalidExportParams(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("{failed} of {total} export task(s) failed: {}", tasks.join(", "))]
    RemoteTaskFailure {
        failed: usize,
        total: usize,
        tasks: Vec<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImageryError {
    /// Category name from the error taxonomy, logged when the CLI exits on failure.
    pub fn category(&self) -> &'static str {
        match self {
            ImageryError::UnknownRegion(_)
            | ImageryError::Configuration(_)
            | ImageryError::UnsupportedFilter { .. }
            | ImageryError::FilterArity { .. }
            | ImageryError::InvalidCrs(_)
            | ImageryError::InvalidRegion(_) => "ConfigurationError",
            ImageryError::InvalidDate { .. }
            | ImageryError::InvalidDateRange { .. }
            | ImageryError::InvalidMosaicWindow(_)
            | ImageryError::MissingTimeSelector
            | ImageryError::InvalidExportParams(_) => "InvalidRequest",
            ImageryError::NoMatchingSeason { .. } => "NoMatchingSeason",
            ImageryError::CollectionNotLoaded { .. } => "CollectionNotLoaded",
            ImageryError::WrongShape { .. } => "WrongShapeError",
            ImageryError::UnknownSource(_)
            | ImageryError::MissingBand { .. }
            | ImageryError::EmptyCollection(_)
            | ImageryError::Catalog(_) => "CatalogError",
            ImageryError::Export(_) | ImageryError::Io(_) => "ExportError",
            ImageryError::RemoteTaskFailure { .. } => "RemoteTaskFailure",
        }
    }

    /// True for errors raised while loading configuration.
    pub fn is_configuration_error(&self) -> bool {
        self.category() == "ConfigurationError"
    }
}

impl From<serde_json::Error> for ImageryError {
    fn from(err: serde_json::Error) -> Self {
        ImageryError::Catalog(format!("JSON error: {}", err))
    }
}
