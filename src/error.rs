use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Coarse category of a [`BridgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A component could not be built as requested.
    Construction,
    /// A connection referenced something that does not exist or had the wrong arity.
    Connection,
    /// Text or file content could not be understood.
    Format,
    /// Parallel sequences violate their invariants.
    Validation,
    /// A result is missing entries the analysis requires.
    IncompleteResult,
    /// Failure outside this crate (solver, file system).
    External,
}

#[derive(Error, Debug)]
pub enum BridgeError {
    // ============ Construction Errors ============
    #[error("Component '{component}' declares {branches} branches, expected 1..=20")]
    BranchCountOutOfRange { component: String, branches: usize },

    #[error("Component '{component}' is missing the {quantity} equation for branch {branch}")]
    MissingEquation {
        component: String,
        branch: usize,
        quantity: &'static str,
    },

    #[error("Duplicate component name '{name}'")]
    DuplicateComponent { name: String },

    #[error("Component '{component}' has no parameter '{param}'")]
    UnknownParameter { component: String, param: String },

    #[error("Invalid parameter '{param}' for component '{component}': {message}")]
    InvalidParameter {
        component: String,
        param: String,
        message: String,
    },

    // ============ Connection Errors ============
    #[error("Component '{name}' is not registered in the circuit")]
    UnknownComponent { name: String },

    #[error("Component '{component}' has no terminal '{terminal}' (terminals: {available})")]
    UnknownTerminal {
        component: String,
        terminal: String,
        available: String,
    },

    #[error("Component '{component}' expects {expected} terminals, but {actual} were given")]
    Arity {
        component: String,
        expected: usize,
        actual: usize,
    },

    // ============ Format Errors ============
    #[error("Invalid file '{path}': {reason}")]
    Format { path: String, reason: String },

    #[error("Unrecognized time-series format in '{path}'")]
    UnrecognizedFormat { path: String },

    #[error("Syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    // ============ Validation Errors ============
    #[error("At least 2 data points are required, got {count}")]
    TooFewPoints { count: usize },

    #[error("Independent variable is not strictly increasing at index {index} ({previous} -> {value})")]
    NonMonotonic {
        index: usize,
        previous: f64,
        value: f64,
    },

    #[error("Vector '{name}' has {actual} values, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    // ============ Incomplete Result Errors ============
    #[error("S-parameter matrix for {ports}-port analysis is missing entries {missing:?}")]
    IncompleteMatrix {
        ports: usize,
        missing: Vec<(usize, usize)>,
    },

    #[error("{analysis} result is missing '{field}'")]
    MissingField { analysis: String, field: String },

    // ============ External Errors ============
    #[error("Solver failed: {message}")]
    Solver { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a format error for a file or text source
    pub fn format(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a syntax error at a 1-based line number
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }

    pub fn missing_field(analysis: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            analysis: analysis.into(),
            field: field.into(),
        }
    }

    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BranchCountOutOfRange { .. }
            | Self::MissingEquation { .. }
            | Self::DuplicateComponent { .. }
            | Self::UnknownParameter { .. }
            | Self::InvalidParameter { .. } => ErrorKind::Construction,
            Self::UnknownComponent { .. } | Self::UnknownTerminal { .. } | Self::Arity { .. } => {
                ErrorKind::Connection
            }
            Self::Format { .. } | Self::UnrecognizedFormat { .. } | Self::Syntax { .. } => {
                ErrorKind::Format
            }
            Self::TooFewPoints { .. } | Self::NonMonotonic { .. } | Self::LengthMismatch { .. } => {
                ErrorKind::Validation
            }
            Self::IncompleteMatrix { .. } | Self::MissingField { .. } => ErrorKind::IncompleteResult,
            Self::Solver { .. } | Self::Io(_) => ErrorKind::External,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = BridgeError::Arity {
            component: "D1".to_string(),
            expected: 4,
            actual: 3,
        };
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert_eq!(
            err.to_string(),
            "Component 'D1' expects 4 terminals, but 3 were given"
        );

        let err = BridgeError::format("wave.csv", "only 1 data point");
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("wave.csv"));

        let err = BridgeError::IncompleteMatrix {
            ports: 2,
            missing: vec![(2, 1)],
        };
        assert_eq!(err.kind(), ErrorKind::IncompleteResult);
    }
}
