//! Rich diagnostic error types for the audiolith core.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]`
//! derives, providing error codes, help text, and source chains so callers
//! know exactly what went wrong and how to fix it. No error in this crate
//! is swallowed or downgraded to a log message; everything propagates.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for audiolith.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain (error codes, help text) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum AudiolithError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Array(#[from] ArrayError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Array-model errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ArrayError {
    #[error("rank mismatch: buffer has rank {rank}, got {dims} dimension value(s)")]
    #[diagnostic(
        code(audiolith::array::rank_mismatch),
        help(
            "A dimensioned array needs exactly one Dimension per axis. \
             Check the dimension list you passed against the buffer's shape."
        )
    )]
    RankMismatch { rank: usize, dims: usize },

    #[error("dimension mismatch on axis {axis}: {message}")]
    #[diagnostic(
        code(audiolith::array::dim_mismatch),
        help(
            "The operation requires compatible dimension metadata on this axis. \
             Concatenation needs identical Dimensions on every non-concatenated \
             axis, and semantic slices must match the axis's variant (a time \
             span against a Time axis, a frequency band against a Frequency axis)."
        )
    )]
    DimensionMismatch { axis: usize, message: String },

    #[error("incompatible resize from {old_size} to {new_size}")]
    #[diagnostic(
        code(audiolith::array::incompatible_resize),
        help(
            "No consistent dimension mapping exists for this size change. \
             Windowed reshapes require the old length to be an exact multiple \
             of the new length."
        )
    )]
    IncompatibleResize { old_size: usize, new_size: usize },
}

// ---------------------------------------------------------------------------
// Feature-graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("feature '{feature}' depends on unknown feature '{dependency}'")]
    #[diagnostic(
        code(audiolith::graph::unknown_dependency),
        help(
            "Every dependency name must resolve to a feature declared in the \
             same schema. Check the spelling, and make sure the dependency is \
             added to the builder (declaration order does not matter)."
        )
    )]
    UnknownDependency { feature: String, dependency: String },

    #[error("dependency cycle through feature '{feature}'")]
    #[diagnostic(
        code(audiolith::graph::cyclic_dependency),
        help(
            "The feature dependency relation must be acyclic. Follow the \
             `needs` chain starting from the named feature to find the loop."
        )
    )]
    CyclicDependency { feature: String },

    #[error(
        "contract violation in feature '{feature}': declared {expected}, produced {actual}"
    )]
    #[diagnostic(
        code(audiolith::graph::contract_violation),
        help(
            "An extractor's output must match its declared shape and element \
             type exactly. Fix the extractor's `process` body or its `dim`/\
             `dtype` declaration; the mismatched row was not persisted."
        )
    )]
    ContractViolation {
        feature: String,
        expected: String,
        actual: String,
    },

    #[error("extractor does not implement `process`")]
    #[diagnostic(
        code(audiolith::graph::not_implemented),
        help(
            "The Extractor trait's `process` has a failing default body. \
             Concrete extractors must override it to take part in execution."
        )
    )]
    NotImplemented,
}

// ---------------------------------------------------------------------------
// Frame-store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("schema mismatch: {message}")]
    #[diagnostic(
        code(audiolith::store::schema_mismatch),
        help(
            "The store file was created from a different frame schema. \
             A store is bound to one schema for its lifetime — open it with \
             the schema it was created from, or use a fresh file."
        )
    )]
    SchemaMismatch { message: String },

    #[error("I/O error: {source}")]
    #[diagnostic(
        code(audiolith::store::io),
        help(
            "A filesystem operation failed. Check that the store location \
             exists, has correct permissions, and that the disk is not full. \
             If this happened on close, buffered row groups may not have \
             reached durable storage."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("storage backend error: {message}")]
    #[diagnostic(
        code(audiolith::store::backend),
        help(
            "The embedded database reported a transaction or table error. \
             This may indicate corruption — try a fresh store file. If the \
             problem persists, file a bug report."
        )
    )]
    Backend { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(audiolith::store::serde),
        help(
            "Failed to serialize or deserialize a column value. This usually \
             means the stored data format has changed between versions — try \
             re-ingesting your data."
        )
    )]
    Serialization { message: String },

    #[error("pattern not found: {pattern_id}")]
    #[diagnostic(
        code(audiolith::store::pattern_not_found),
        help(
            "No row group exists for this pattern id. Verify the id, and \
             remember that buffered appends are only visible on this handle \
             until flushed."
        )
    )]
    PatternNotFound { pattern_id: String },

    #[error("pattern already stored: {pattern_id}")]
    #[diagnostic(
        code(audiolith::store::duplicate_pattern),
        help(
            "Row groups are append-only and keyed by pattern id; a second \
             append for the same id would mutate history. Use a new id."
        )
    )]
    DuplicatePattern { pattern_id: String },

    #[error("column not found: {column}")]
    #[diagnostic(
        code(audiolith::store::column_not_found),
        help(
            "Only features declared with `store = true` (plus the raw audio \
             column) become columns. Check the column name against \
             `column_names()`."
        )
    )]
    ColumnNotFound { column: String },

    #[error("column '{column}' is not indexed")]
    #[diagnostic(
        code(audiolith::store::not_indexed),
        help(
            "Equality and range lookups need a per-column index, declared at \
             schema-definition time. Unindexed columns support full scans \
             only — use `scan()` instead."
        )
    )]
    NotIndexed { column: String },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("invalid audio configuration: {message}")]
    #[diagnostic(
        code(audiolith::config::invalid),
        help(
            "Sample rate, window size, and step size must all be nonzero, \
             and the step size must not exceed the window size."
        )
    )]
    InvalidConfig { message: String },
}

/// Convenience alias for functions returning audiolith results.
pub type AudiolithResult<T> = std::result::Result<T, AudiolithError>;
