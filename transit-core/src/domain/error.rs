//! Domain error types.
//!
//! These errors describe aggregates that cannot be built from the data an
//! adapter supplied. They are distinct from protocol and transport errors:
//! an adapter usually skips the offending record or reports the whole
//! operation as a `Failure`.

/// Construction failures of legs and trips.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// A stop lacks the side (arrival or departure) a leg needs
    #[error("missing required time data: {0}")]
    MissingTime(&'static str),

    /// Trip has no legs
    #[error("trip must have at least one leg")]
    EmptyTrip,

    /// Consecutive legs don't meet at the same location
    #[error("leg {index} does not start where the previous leg ends ({previous} / {next})")]
    DisconnectedLegs {
        index: usize,
        previous: String,
        next: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DomainError::MissingTime("departure");
        assert_eq!(err.to_string(), "missing required time data: departure");

        let err = DomainError::EmptyTrip;
        assert_eq!(err.to_string(), "trip must have at least one leg");

        let err = DomainError::DisconnectedLegs {
            index: 1,
            previous: "Aachen, Hbf".into(),
            next: "Köln Hbf".into(),
        };
        assert_eq!(
            err.to_string(),
            "leg 1 does not start where the previous leg ends (Aachen, Hbf / Köln Hbf)"
        );
    }
}
