//! Cascata UDC - usage data collection
//!
//! Periodically gathers JSON snapshots of a running instance (platform
//! information, deployed applications, host system) into dated files under a
//! repository directory, with frequency-based retention.

pub mod collector;
pub mod manager;

// Re-export commonly used types
pub use collector::{
    AboutCollector, ApiCollector, ApplicationsCollector, Collector, SystemCollector, set_value,
};
pub use manager::{FileFrequency, UsageDataManager, FILE_EXT, FILE_PREFIX};
