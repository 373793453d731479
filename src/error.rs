//! Error types for fixdb
//!
//! One crate-level error enum covering the whole build/query pipeline.
//! Build-time errors (fixture parsing, schema coercion, strict FK
//! resolution) abort collection construction; query-time errors are scoped
//! to the single call that raised them.

use thiserror::Error;

/// The main error type for fixdb operations
#[derive(Debug, Error)]
pub enum Error {
    // ==========================================================================
    // Fixture Errors (build-time)
    // ==========================================================================
    #[error("Fixture '{path}' is empty")]
    EmptyFixture { path: String },

    #[error("Unsupported fixture format for '{path}'")]
    UnsupportedFixture { path: String },

    #[error("Malformed fixture '{path}': {message}")]
    MalformedFixture { path: String, message: String },

    // ==========================================================================
    // Schema Errors (build-time)
    // ==========================================================================
    #[error("Cannot coerce value '{value}' of field '{field}' to {expected}")]
    SchemaCoercion {
        field: String,
        expected: String,
        value: String,
    },

    #[error("Field '{field}' is declared as a custom kind but has no extractor")]
    MissingExtractor { field: String },

    // ==========================================================================
    // Identity Errors (construction-time)
    // ==========================================================================
    #[error("Explicit id {id} is below the sequence cursor (next is {next})")]
    IdentityOrderViolation { id: u64, next: u64 },

    #[error("Explicit id must be a positive integer, got '{value}'")]
    InvalidExplicitId { value: String },

    // ==========================================================================
    // Lookup Errors (query-time)
    // ==========================================================================
    #[error("Unsupported lookup type '{suffix}'")]
    UnsupportedLookup { suffix: String },

    #[error("Chained lookups are not supported: '{key}'")]
    ChainedLookup { key: String },

    #[error("Field '{field}' is not numeric and cannot be summed")]
    NonNumericAggregate { field: String },

    #[error("No fake generator for field '{field}'; register an override")]
    NoFakeGenerator { field: String },

    // ==========================================================================
    // Cardinality Errors (query-time, collection-scoped)
    // ==========================================================================
    #[error("{collection} matching {criteria} does not exist")]
    DoesNotExist { collection: String, criteria: String },

    #[error("get() on {collection} returned {count} objects instead of one")]
    MultipleObjectsReturned { collection: String, count: usize },

    // ==========================================================================
    // Registry Errors
    // ==========================================================================
    #[error("Collection '{name}' is not registered")]
    UnknownCollection { name: String },

    // ==========================================================================
    // IO / Serialization
    // ==========================================================================
    #[error("Failed to read fixture '{path}': {source}")]
    FixtureRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML: {message}")]
    YamlParse { message: String },
}

/// Result type alias for fixdb operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::YamlParse {
            message: err.to_string(),
        }
    }
}

impl Error {
    /// Returns true if this error aborts a collection build, as opposed to
    /// failing a single query call.
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            Error::EmptyFixture { .. }
                | Error::UnsupportedFixture { .. }
                | Error::MalformedFixture { .. }
                | Error::SchemaCoercion { .. }
                | Error::MissingExtractor { .. }
                | Error::IdentityOrderViolation { .. }
                | Error::InvalidExplicitId { .. }
                | Error::FixtureRead { .. }
                | Error::YamlParse { .. }
        )
    }
}
