//! The core's error taxonomy (spec §7): `ConfigurationError`/`InputDataError`
//! abort before any Scenario runs, `DomainError` is logged and recovered,
//! `InternalInvariant` is a debug-only assertion path. `RuntimeLimit` is
//! deliberately not part of this enum — spec §7 says it "is not an error";
//! it is instead the `StopReason` enum in `model.rs`.

use crate::grid::Location;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("input data error: {0}")]
    InputData(String),

    #[error("domain error at {cell}: {reason}")]
    Domain { reason: String, cell: Location },

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_error_formats_cell() {
        let err = CoreError::Domain { reason: "ignition in non-fuel cell".into(), cell: Location::new(5, 6) };
        let msg = err.to_string();
        assert!(msg.contains("(5, 6)"));
    }
}
