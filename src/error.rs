//! Link model error types

use thiserror::Error;

/// Result type for link model operations
pub type LinkResult<T> = Result<T, LinkError>;

/// Errors raised while evaluating or rendering the link model
#[derive(Error, Debug)]
pub enum LinkError {
    /// A configuration invariant does not hold
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A quantity reached a value where the model is undefined (zero divisor, zero base)
    #[error("Invalid domain: {quantity} = {value:e}")]
    InvalidDomain { quantity: &'static str, value: f64 },

    /// A computation collapsed to zero or left the finite range
    #[error("Numerical overflow: {quantity} = {value:e}")]
    Overflow { quantity: &'static str, value: f64 },

    /// A grid cell failed; carries the cell coordinates for diagnostics
    #[error(
        "Cell ({wavelength_index}, {distance_index}) at {:.1} nm, {:.1} km failed: {source}",
        .wavelength * 1e9,
        .distance / 1e3
    )]
    Cell {
        wavelength_index: usize,
        distance_index: usize,
        wavelength: f64,
        distance: f64,
        #[source]
        source: Box<LinkError>,
    },

    /// Renderer input does not match its axes
    #[error("Grid shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Requested cell lies outside the configured sweep
    #[error("Cell ({wavelength_index}, {distance_index}) is outside the {shape:?} grid")]
    CellOutOfRange {
        wavelength_index: usize,
        distance_index: usize,
        shape: (usize, usize),
    },

    /// The plot window could not be opened
    #[error("Render failed: {0}")]
    Render(String),
}

impl LinkError {
    /// The innermost model fault, looking through cell wrappers
    pub fn root(&self) -> &LinkError {
        match self {
            LinkError::Cell { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this error comes from the domain of the physical model
    pub fn is_domain_fault(&self) -> bool {
        matches!(self.root(), LinkError::InvalidDomain { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_error_names_coordinates() {
        let err = LinkError::Cell {
            wavelength_index: 3,
            distance_index: 7,
            wavelength: 800e-9,
            distance: 2e3,
            source: Box::new(LinkError::InvalidDomain {
                quantity: "r0 base",
                value: 0.0,
            }),
        };
        let text = err.to_string();
        assert!(text.contains("(3, 7)"), "{text}");
        assert!(text.contains("800.0 nm"), "{text}");
        assert!(text.contains("2.0 km"), "{text}");
        assert!(text.contains("r0 base"), "{text}");
        assert!(err.is_domain_fault());
    }

    #[test]
    fn test_overflow_is_not_domain_fault() {
        let err = LinkError::Overflow {
            quantity: "received power",
            value: f64::INFINITY,
        };
        assert!(!err.is_domain_fault());
    }
}
