//! Metrics definitions for bridge and partition task monitoring.

/// Label for the job identifier in metrics.
pub const JOB_ID_LABEL: &str = "job_id";

/// Label for the loader mode in metrics.
pub const LOADER_MODE_LABEL: &str = "loader_mode";

/// Label for error kind in metrics.
pub const ERROR_KIND_LABEL: &str = "error_kind";

// Bridge metrics

/// Counter for records accepted by the output bridge.
pub const TRANSFER_RECORDS_WRITTEN_TOTAL: &str = "transfer_records_written_total";

/// Counter for records handed to loaders.
pub const TRANSFER_RECORDS_READ_TOTAL: &str = "transfer_records_read_total";

/// Counter for loader runs that ended in failure, labelled by error kind.
pub const TRANSFER_LOADER_FAILURES_TOTAL: &str = "transfer_loader_failures_total";

/// Histogram for seconds a writer spent suspended on a full buffer.
pub const TRANSFER_WRITE_BLOCKED_SECONDS: &str = "transfer_write_blocked_seconds";

/// Histogram for seconds a loader ran, from spawn to completion.
pub const TRANSFER_LOADER_DURATION_SECONDS: &str = "transfer_loader_duration_seconds";

// Task metrics

/// Counter for partition task attempts that failed, labelled by error kind.
pub const TRANSFER_PARTITION_FAILURES_TOTAL: &str = "transfer_partition_failures_total";
