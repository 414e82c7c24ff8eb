use thiserror::Error;

/// Recoverable failures raised while executing code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("Stack overflow.")]
    StackOverflow,

    #[error("Call depth exceeded {max} frames.")]
    FrameOverflow { max: usize },

    #[error("Expected {expected} arguments but got {got}.")]
    ArityMismatch { expected: usize, got: usize },

    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),

    #[error("Can only call functions, got {0}.")]
    NotCallable(&'static str),

    #[error("Operands must be two numbers or two strings.")]
    OperandMismatch,

    #[error("Unknown opcode {0}.")]
    InvalidOpcode(u8),

    #[error("{0}")]
    Native(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    pub line: usize,
    pub function: String,
}

impl std::fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[line {}] in {}", self.line, self.function)
    }
}

#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct InterpretError {
    pub error: RuntimeError,
    // innermost first
    pub trace: Vec<TraceFrame>,
}

impl InterpretError {
    pub fn report(&self) -> String {
        let mut report = self.error.to_string();
        for frame in &self.trace {
            report.push('\n');
            report.push_str(&frame.to_string());
        }
        report
    }
}
