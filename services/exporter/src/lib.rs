//! Seasonal imagery exporter.
//!
//! Loads the ROI registry, builds the grouped imagery tree of one region
//! and exports selected collections through an [`catalog::Exporter`].

pub mod config_loader;
pub mod export;
pub mod monitor;
pub mod query;
pub mod session;

pub use config_loader::{load_registry, parse_registry, RoiConfig, RoiRegistry};
pub use export::{default_folder, export_basename, parse_dimensions, ExportParams};
pub use monitor::{monitor_tasks, ExportReport, MonitorOptions, TaskFailure};
pub use query::{resolve_time_selector, DateQuery, ImageryRequest, QueryWarning, ResolvedTime, Warnings};
pub use session::{ExportPlan, ExportSubmission, ImagerySession, Retrieval};
