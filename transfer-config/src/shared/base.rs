use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field holds a value outside of its accepted range.
    #[error("Invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// A connector selection does not name a connector.
    #[error("`{0}.connector_id` cannot be empty")]
    ConnectorIdEmpty(&'static str),
}
