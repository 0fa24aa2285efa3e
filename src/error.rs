//! Error handling (spec.md §7, made concrete).
//!
//! Mirrors the teacher's `ParseError` / `AssembleError` / `Error` three-
//! layer design: each layer is a closed enum, and the top-level `Error`
//! wires the others in with `From` impls so the library never panics on
//! caller-facing input.

use crate::sourcemap::InstrId;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiagnosticKind {
    Unbalanced,
    ConflictingWrite,
    WriteToInput,
    UndefinedRegister,
    Unreachable,
    MissingReturn,
    UnassignedOutput,
    MisalignedSubtraction,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticKind::Unbalanced => "unbalanced instruction",
            DiagnosticKind::ConflictingWrite => "conflicting write",
            DiagnosticKind::WriteToInput => "write to input register",
            DiagnosticKind::UndefinedRegister => "use of undefined register",
            DiagnosticKind::Unreachable => "unreachable instruction",
            DiagnosticKind::MissingReturn => "missing return",
            DiagnosticKind::UnassignedOutput => "unassigned output at return",
            DiagnosticKind::MisalignedSubtraction => "misaligned subtraction",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub instr: Option<InstrId>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, instr: Option<InstrId>, message: impl Into<String>) -> Diagnostic {
        Diagnostic {
            kind,
            instr,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.instr {
            Some(InstrId(i)) => write!(f, "instruction {}: {}: {}", i, self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for Diagnostic {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TraceError {
    ValueOutOfBounds { register: String, value: String },
    MissingRegisterColumn(String),
    ExtraRegisterColumn(String),
    InconsistentColumnHeight,
    MissingFunctionMapping(String),
}

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceError::ValueOutOfBounds { register, value } => {
                write!(f, "value {} out of bounds for register {}", value, register)
            }
            TraceError::MissingRegisterColumn(name) => write!(f, "missing register column {}", name),
            TraceError::ExtraRegisterColumn(name) => write!(f, "extra register column {}", name),
            TraceError::InconsistentColumnHeight => write!(f, "inconsistent column heights"),
            TraceError::MissingFunctionMapping(name) => write!(f, "missing trace mapping for function {}", name),
        }
    }
}

impl std::error::Error for TraceError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecError {
    InstanceMismatch { expected: String, computed: String },
    InputCountMismatch { expected: usize, computed: usize },
    RecursionBudgetExceeded,
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::InstanceMismatch { expected, computed } => {
                write!(f, "instance mismatch: expected {}, computed {}", expected, computed)
            }
            ExecError::InputCountMismatch { expected, computed } => {
                write!(f, "input count mismatch: expected {}, computed {}", expected, computed)
            }
            ExecError::RecursionBudgetExceeded => write!(f, "recursion budget exceeded"),
        }
    }
}

impl std::error::Error for ExecError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    ZeroWidth,
    RegisterWiderThanField {
        max_register_width: u32,
        max_field_width: u32,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroWidth => write!(f, "max_register_width must be at least 1"),
            ConfigError::RegisterWiderThanField {
                max_register_width,
                max_field_width,
            } => write!(
                f,
                "max_register_width ({}) exceeds max_field_width ({})",
                max_register_width, max_field_width
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Diagnostics(Vec<Diagnostic>),
    Trace(TraceError),
    Exec(ExecError),
    Config(ConfigError),
}

impl From<Vec<Diagnostic>> for Error {
    fn from(diags: Vec<Diagnostic>) -> Error {
        Error::Diagnostics(diags)
    }
}

impl From<TraceError> for Error {
    fn from(err: TraceError) -> Error {
        Error::Trace(err)
    }
}

impl From<ExecError> for Error {
    fn from(err: ExecError) -> Error {
        Error::Exec(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Error {
        Error::Config(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Diagnostics(diags) => {
                write!(f, "{} diagnostic(s):", diags.len())?;
                for d in diags {
                    write!(f, " [{}]", d)?;
                }
                Ok(())
            }
            Error::Trace(e) => write!(f, "{}", e),
            Error::Exec(e) => write!(f, "{}", e),
            Error::Config(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {}
