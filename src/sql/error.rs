//! Error taxonomy for the translation/composition/planning core.
//!
//! These are distinct from [`crate::error::ApiError`], the transport-facing
//! enum: this one is produced by pure code and carries enough detail (the
//! offending node, in debug form, where relevant) for UI attribution;
//! [`crate::error::ApiError`] is what that gets mapped onto at the HTTP
//! boundary.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TranslatorError {
    #[error("unknown AST node: {node}")]
    UnknownNode { node: String },

    #[error("unsupported comparator: {node}")]
    UnsupportedComparator { node: String },

    #[error("comparison needs a column reference: {node}")]
    NeedsColumn { node: String },

    #[error("unknown call id: {call_id}")]
    UnknownCall { call_id: String },

    #[error("unsupported legacy filter type: {filter_type}")]
    UnsupportedLegacyFilter { filter_type: String },

    #[error("invalid pagination cursor")]
    InvalidCursor,

    #[error("upstream analytics error: {0}")]
    Upstream(String),
}
