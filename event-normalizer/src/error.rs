//! Error types for the event-normalizer crate.

/// A known channel's decoder could not make sense of a payload.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Payload is not JSON
    #[error("Payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Payload is JSON but not an object
    #[error("Payload is a JSON {0}, expected an object")]
    NotAnObject(&'static str),

    /// A field the event cannot exist without is absent or empty
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A field is present with an unusable value
    #[error("Invalid value for {field}: {reason}")]
    InvalidField {
        /// Payload key
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Registry-level failures.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum NormalizerError {
    /// Subscribed channels with neither a decoder nor an ignore entry
    #[error("No decoder registered for channel(s): {}", .0.join(", "))]
    UnhandledChannels(Vec<String>),
}
