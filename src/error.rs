//! Error types for triangle construction and reserving calculations

use thiserror::Error;

/// Result alias used throughout the crate
pub type ReservingResult<T> = Result<T, ReservingError>;

/// Errors raised by triangle construction, factor selection and Mack estimation
#[derive(Error, Debug)]
pub enum ReservingError {
    /// Input cannot be arranged into a valid triangle
    #[error("Invalid triangle shape: {reason}")]
    InvalidTriangleShape { reason: String },

    /// A development factor has a zero-weight denominator or is non-finite
    #[error("Undefined development factor at dev {dev}: {reason}")]
    UndefinedFactor { dev: i32, reason: String },

    /// Not enough origins or development periods for the requested estimate
    #[error("Insufficient data: {reason}")]
    InsufficientData { reason: String },

    /// Log-normal interval parameters are undefined for an origin
    #[error("Domain error for origin {origin}: {reason}")]
    DomainComputation { origin: i32, reason: String },

    /// Unknown dataset, lob, grcode or grname
    #[error("`{value}` is not a valid {field} selection")]
    InvalidSelection { field: String, value: String },

    /// Configuration value out of range
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Named column not present in tabular input
    #[error("Column `{column}` not found in input")]
    MissingColumn { column: String },

    /// Cell could not be parsed
    #[error("Could not parse `{value}` in column `{column}`")]
    Parse { column: String, value: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ReservingError {
    pub(crate) fn shape(reason: impl Into<String>) -> Self {
        ReservingError::InvalidTriangleShape { reason: reason.into() }
    }

    pub(crate) fn insufficient(reason: impl Into<String>) -> Self {
        ReservingError::InsufficientData { reason: reason.into() }
    }

    pub(crate) fn selection(field: &str, value: impl ToString) -> Self {
        ReservingError::InvalidSelection {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_message_names_key() {
        let err = ReservingError::selection("grcode", 9999);
        assert_eq!(err.to_string(), "`9999` is not a valid grcode selection");
    }

    #[test]
    fn test_undefined_factor_message() {
        let err = ReservingError::UndefinedFactor {
            dev: 3,
            reason: "zero total weight".to_string(),
        };
        assert!(err.to_string().contains("dev 3"));
    }
}
