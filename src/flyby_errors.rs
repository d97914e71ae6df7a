use thiserror::Error;

/// Reason why the global fit could not produce a usable solution.
#[derive(Debug, Clone, PartialEq)]
pub enum FitFailure {
    /// The iteration budget was exhausted before any tolerance was met.
    MaxIterations(usize),
    /// No damping up to the configured maximum gave a finite step that lowers χ²,
    /// at the given iteration.
    DampingExhausted(usize),
    /// The objective, a residual or a parameter became NaN or infinite.
    NonFiniteState,
    /// `JᵀWJ` is not positive definite at the solution: no covariance exists.
    SingularCovariance,
    /// The solver converged outside the model's admissible domain.
    NonPhysicalSolution(Vec<f64>),
}

impl std::fmt::Display for FitFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitFailure::MaxIterations(n) => write!(f, "no convergence after {n} iterations"),
            FitFailure::DampingExhausted(n) => {
                write!(f, "damping limit exceeded at iteration {n}, no decreasing step found")
            }
            FitFailure::NonFiniteState => write!(f, "non-finite value encountered"),
            FitFailure::SingularCovariance => {
                write!(f, "normal matrix is singular, covariance unavailable")
            }
            FitFailure::NonPhysicalSolution(p) => {
                write!(f, "solution outside the admissible domain: {p:?}")
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum FlybyError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient data for {context}: at least {required} required, {found} found")]
    InsufficientData {
        context: &'static str,
        required: usize,
        found: usize,
    },

    #[error("Fit did not converge: {0}")]
    ConvergenceFailure(FitFailure),

    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("Error during the nom parsing of geomagnetic coefficients: {0}")]
    CoefficientParsing(String),

    #[error("Statistical distribution error: {0}")]
    Statistics(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

impl PartialEq for FlybyError {
    fn eq(&self, other: &Self) -> bool {
        use FlybyError::*;
        match (self, other) {
            (InvalidInput(a), InvalidInput(b)) => a == b,
            (
                InsufficientData {
                    context: c1,
                    required: r1,
                    found: f1,
                },
                InsufficientData {
                    context: c2,
                    required: r2,
                    found: f2,
                },
            ) => c1 == c2 && r1 == r2 && f1 == f2,
            (ConvergenceFailure(a), ConvergenceFailure(b)) => a == b,
            (NotFound { kind: k1, key: a }, NotFound { kind: k2, key: b }) => k1 == k2 && a == b,
            (CoefficientParsing(a), CoefficientParsing(b)) => a == b,
            (Statistics(a), Statistics(b)) => a == b,

            // wrapped errors are not comparable: same variant is enough
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,

            _ => false,
        }
    }
}

#[cfg(test)]
mod flyby_errors_test {
    use super::*;

    #[test]
    fn test_error_equality() {
        let a = FlybyError::NotFound {
            kind: "spacecraft",
            key: "NEAR".into(),
        };
        let b = FlybyError::NotFound {
            kind: "spacecraft",
            key: "NEAR".into(),
        };
        assert_eq!(a, b);
        assert_ne!(a, FlybyError::InvalidInput("NEAR".into()));
    }

    #[test]
    fn test_error_messages() {
        let err = FlybyError::InsufficientData {
            context: "trapezoidal integration",
            required: 2,
            found: 1,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient data for trapezoidal integration: at least 2 required, 1 found"
        );

        let err = FlybyError::ConvergenceFailure(FitFailure::MaxIterations(10));
        assert_eq!(
            err.to_string(),
            "Fit did not converge: no convergence after 10 iterations"
        );
    }
}
