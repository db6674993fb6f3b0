//! Shared primitive types used across the pipeline.

/// Database identifier of a persisted clustering run.
pub type RunId = i64;

/// Stable external customer identifier (the customer code).
pub type CustomerId = String;

/// Integer cluster label. Density-based algorithms use [`NOISE_LABEL`].
pub type ClusterLabel = i64;

/// Label given to points that belong to no cluster.
pub const NOISE_LABEL: ClusterLabel = -1;
