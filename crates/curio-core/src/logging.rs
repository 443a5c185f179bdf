//! Structured logging schema and field name constants for curio.
//!
//! All crates use these constants for consistent structured logging fields.
//! This ensures log aggregation tools (Loki, Elasticsearch) can query by
//! standardized field names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (batch members, links) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "fetch", "sync"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "classifiers", "content", "youtube", "spotify", "controller"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "save_item", "merge", "fetch_batch", "download_new_items"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Classifier UUID being operated on.
pub const CLASSIFIER_ID: &str = "classifier_id";

/// Content item UUID being operated on.
pub const CONTENT_ID: &str = "content_id";

/// Source-native item identifier (video id, episode id, post name).
pub const ITEM_ID: &str = "item_id";

/// Content kind ("youtube", "spotify", "ob_post", "essay").
pub const CONTENT_KIND: &str = "content_kind";

/// Classifier kind ("author", "idea", "topic", "tag").
pub const CLASSIFIER_KIND: &str = "classifier_kind";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a query or fetch.
pub const RESULT_COUNT: &str = "result_count";

/// Number of input ids sent to a source fetcher.
pub const INPUT_COUNT: &str = "input_count";

/// Number of items created by a bulk operation.
pub const CREATED_COUNT: &str = "created_count";

/// Number of items updated by a bulk operation.
pub const UPDATED_COUNT: &str = "updated_count";

/// Number of external links internalized.
pub const INTERNALIZED_COUNT: &str = "internalized_count";

/// Batch ordinal within a bulk operation.
pub const BATCH_INDEX: &str = "batch_index";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

/// Database table or entity affected.
pub const DB_TABLE: &str = "db_table";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Slow operation threshold exceeded.
pub const SLOW: &str = "slow";
