//! Error handling for the control laws

/// Reports structurally invalid input to the control laws. Numerical trouble near
/// singularities is not an error: it is absorbed by the damped inverses.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlError {
    /// A vector or matrix does not match the joint count or the task dimension.
    DimensionMismatch {
        what: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },
    InvalidJointLimits { joint: usize, lower: f64, upper: f64 },
    NotFinite(&'static str),
    /// A configuration value is outside of its valid range.
    InvalidParameter { what: &'static str, value: f64 },
    Numerical(String),
}

impl std::fmt::Display for ControlError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            ControlError::DimensionMismatch { what, expected, found } =>
                write!(f, "Dimension mismatch for {}: expected {}x{}, found {}x{}",
                       what, expected.0, expected.1, found.0, found.1),
            ControlError::InvalidJointLimits { joint, lower, upper } =>
                write!(f, "Invalid limits for joint {}: lower {} is not below upper {}",
                       joint, lower, upper),
            ControlError::NotFinite(what) =>
                write!(f, "Non-finite values in {}", what),
            ControlError::InvalidParameter { what, value } =>
                write!(f, "Invalid {}: {}", what, value),
            ControlError::Numerical(ref msg) =>
                write!(f, "Numerical error: {}", msg),
        }
    }
}

impl std::error::Error for ControlError {}

/// Checks the shape of a matrix-like value, naming it in the error.
pub(crate) fn check_shape(
    what: &'static str,
    found: (usize, usize),
    expected: (usize, usize),
) -> Result<(), ControlError> {
    if found != expected {
        return Err(ControlError::DimensionMismatch { what, expected, found });
    }
    Ok(())
}
