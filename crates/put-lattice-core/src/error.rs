use thiserror::Error;

#[derive(Debug, Error)]
pub enum LatticeError {
    #[error("Invalid parameter: {field} — {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("Numeric overflow: {context} at {steps} steps; reduce the step count or rescale the inputs")]
    NumericOverflow { steps: u32, context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl LatticeError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        LatticeError::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for LatticeError {
    fn from(e: serde_json::Error) -> Self {
        LatticeError::SerializationError(e.to_string())
    }
}
