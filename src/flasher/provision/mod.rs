//! Probe discovery and per-channel configuration artifacts.

mod scanner;
mod template;

pub use scanner::{DeviceScanner, ScanReport, extract_serials};
pub use template::{ConfigTemplateRenderer, prepare_artifact_dir};
