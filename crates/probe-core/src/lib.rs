pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;

pub use catalog::{Catalog, CatalogEntry, Probe};
pub use config::{HarnessConfig, parse_duration};
pub use error::{CatalogError, ConfigError};
pub use extract::{DEFAULT_EXAMPLE_MARKER, extract_example, extract_example_file};
