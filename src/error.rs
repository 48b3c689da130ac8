//! Error taxonomy for the export pipeline
//!
//! Most code returns `anyhow::Result`; these variants are attached where a
//! caller (or a test) needs to tell failure kinds apart via `downcast_ref`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    /// The identifier did not resolve to any mapped resource type
    #[error("No ResourceTypeName for {0:?}")]
    NoResourceType(String),

    /// The VM lookup request itself failed
    #[error("Failed to look up {id:?}: {message}")]
    LookupTransport { id: String, message: String },

    /// The VM lookup returned a body that is not a JSON object
    #[error("Malformed response for {id:?}: {message}")]
    MalformedLookupResponse { id: String, message: String },

    /// The provider process could not be installed, started or configured
    #[error("Provider initialization failed: {0}")]
    ProviderInit(String),

    /// `ReadResource` returned a null state
    #[error("Null state on read for {0:?}")]
    NullState(String),

    /// The provider returned a type that is missing from its own schema
    #[error("No schema for resource type {0:?}")]
    MissingSchema(String),

    /// A captured value needed to build the import identifier was absent
    #[error("{name} not found in match values")]
    MissingMatchValue { name: String },

    /// The resolved type has no template, or its template no longer matches
    #[error("Endpoint not found for resourceTypeName {0:?}")]
    UnknownResourceType(String),

    #[error("Failed to match resource type name {type_name:?} against {id:?}")]
    TemplateMismatch { type_name: String, id: String },

    /// Child listing failed for a node during a recursive crawl
    #[error("Error expanding {id:?}: {message}")]
    Expansion { id: String, message: String },

    #[error("Deadline exceeded while {0}")]
    DeadlineExceeded(String),
}
