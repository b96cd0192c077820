use thiserror::Error;

/// Main error type for the Kiln engine
///
/// Every variant is raised synchronously while an expression graph is being
/// built. Flushing a plan never produces a `KilnError`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KilnError {
    /// Shape-related errors with detailed suggestions
    #[error("Shape error: {0}")]
    ShapeError(String),

    /// Operand categories that an operator cannot combine
    #[error("Category error: {operation} - {message}")]
    CategoryError {
        operation: String,
        message: String,
    },

    /// Device-related errors
    #[error("Device error: {0}")]
    DeviceError(String),

    /// Operation errors with context
    #[error("Operation error: {operation} - {message}")]
    OperationError {
        operation: String,
        message: String,
    },

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// IO errors
    #[error("IO error: {0}")]
    IoError(String),
}

impl KilnError {
    /// Create a shape error with helpful suggestions
    pub fn shape_error(expected: &str, got: &str, suggestion: Option<&str>) -> Self {
        let message = if let Some(sugg) = suggestion {
            format!("Expected {}, got {}. Suggestion: {}", expected, got, sugg)
        } else {
            format!("Expected {}, got {}", expected, got)
        };
        KilnError::ShapeError(message)
    }

    /// Create an operation error with context
    pub fn operation_error(operation: &str, message: &str) -> Self {
        KilnError::OperationError {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a category error for an illegal operand combination
    pub fn category_error(operation: &str, message: &str) -> Self {
        KilnError::CategoryError {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<std::io::Error> for KilnError {
    fn from(err: std::io::Error) -> Self {
        KilnError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for KilnError {
    fn from(err: serde_json::Error) -> Self {
        KilnError::SerializationError(err.to_string())
    }
}

/// Result type for Kiln operations
pub type KilnResult<T> = Result<T, KilnError>;

/// Error context for providing additional debugging information
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub operation: String,
    pub tensor_shapes: Vec<String>,
    pub suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            tensor_shapes: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_shape(mut self, shape: impl ToString) -> Self {
        self.tensor_shapes.push(shape.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.suggestions.push(suggestion.to_string());
        self
    }

    pub fn to_error_message(&self) -> String {
        let mut message = format!("Operation: {}", self.operation);

        if !self.tensor_shapes.is_empty() {
            message.push_str(&format!("\nTensor shapes: {}", self.tensor_shapes.join(", ")));
        }

        if !self.suggestions.is_empty() {
            message.push_str("\nSuggestions:");
            for suggestion in &self.suggestions {
                message.push_str(&format!("\n  - {}", suggestion));
            }
        }

        message
    }
}

/// Helper trait for adding context to errors
pub trait WithContext<T> {
    fn with_context<F>(self, f: F) -> KilnResult<T>
    where
        F: FnOnce() -> ErrorContext;
}

impl<T> WithContext<T> for KilnResult<T> {
    fn with_context<F>(self, f: F) -> KilnResult<T>
    where
        F: FnOnce() -> ErrorContext,
    {
        self.map_err(|e| {
            let context = f();
            match e {
                KilnError::ShapeError(msg) => {
                    let context = context.to_error_message();
                    KilnError::ShapeError(format!("{}\nContext: {}", msg, context))
                }
                KilnError::CategoryError { operation, message } => KilnError::CategoryError {
                    operation,
                    message: format!("{}\nContext: {}", message, context.to_error_message()),
                },
                KilnError::OperationError { operation, message } => KilnError::OperationError {
                    operation,
                    message: format!("{}\nContext: {}", message, context.to_error_message()),
                },
                _ => e,
            }
        })
    }
}

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ShapeMismatch,
    IllegalCategory,
    DeviceMismatch,
    InvalidOperation,
    ConfigInvalid,
    SerializationFailed,
}

impl KilnError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            KilnError::ShapeError(_) => ErrorCode::ShapeMismatch,
            KilnError::CategoryError { .. } => ErrorCode::IllegalCategory,
            KilnError::DeviceError(_) => ErrorCode::DeviceMismatch,
            KilnError::OperationError { .. } => ErrorCode::InvalidOperation,
            KilnError::InvalidInput(_) => ErrorCode::InvalidOperation,
            KilnError::ConfigurationError(_) => ErrorCode::ConfigInvalid,
            KilnError::SerializationError(_) => ErrorCode::SerializationFailed,
            KilnError::IoError(_) => ErrorCode::InvalidOperation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_error() {
        let error = KilnError::shape_error(
            "Matrix[3, 4]",
            "Matrix[3, 5]",
            Some("Collapse to a matching matrix"),
        );
        assert!(error.to_string().contains("Expected Matrix[3, 4], got Matrix[3, 5]"));
        assert!(error.to_string().contains("Collapse to a matching matrix"));
    }

    #[test]
    fn test_error_context() {
        let result: KilnResult<()> =
            Err(KilnError::ShapeError("operands' shape mismatch".to_string()));
        let err = result
            .with_context(|| {
                ErrorContext::new("tanh_grad")
                    .with_shape("Matrix[2, 3]")
                    .with_shape("Matrix[3, 2]")
                    .with_suggestion("Pass the output of tanh as the second operand")
            })
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("Operation: tanh_grad"));
        assert!(message.contains("Tensor shapes: Matrix[2, 3], Matrix[3, 2]"));
        assert!(message.contains("Pass the output of tanh"));
    }

    #[test]
    fn test_context_leaves_device_errors_alone() {
        let result: KilnResult<()> = Err(KilnError::DeviceError("cpu".to_string()));
        let err = result.with_context(|| ErrorContext::new("subtract")).unwrap_err();
        assert_eq!(err, KilnError::DeviceError("cpu".to_string()));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(KilnError::ShapeError("x".to_string()).code(), ErrorCode::ShapeMismatch);
        assert_eq!(KilnError::category_error("collapse", "x").code(), ErrorCode::IllegalCategory);
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert_eq!(KilnError::from(json_err).code(), ErrorCode::SerializationFailed);
    }
}
