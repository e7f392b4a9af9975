//! Core data types for kumascope.

/// Monitor records and the aggregate health signal.
pub mod monitor;
/// Service URL derivation from health-check URLs.
pub mod service_url;
/// Status-page sections and monitor groups.
pub mod status_page;

pub use monitor::{AggregateStatus, Monitor, MonitorStatus};
pub use service_url::service_url;
pub use status_page::{MonitorGroup, StatusPageSection};
