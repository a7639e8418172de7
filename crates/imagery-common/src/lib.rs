//! Common types and utilities shared across the seasonal imagery workspace.

pub mod bbox;
pub mod error;
pub mod region;
pub mod time;

pub use bbox::BoundingBox;
pub use error::{ImageryError, ImageryResult};
pub use region::{CrsCode, Region};
pub use time::{format_compact, parse_date, DateRange, MosaicWindow, DEFAULT_DATE_FORMAT};
