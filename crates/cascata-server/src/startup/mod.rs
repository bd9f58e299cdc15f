//! Application startup utilities

pub mod logging;
pub mod shutdown;

pub use logging::{LogRotation, LoggingConfig, init_logging};
pub use shutdown::{GracefulShutdown, ShutdownSignal, wait_for_shutdown_signal};
