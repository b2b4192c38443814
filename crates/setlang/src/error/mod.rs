//! Error handling.
//!
//! Errors in the interpreter come in two severities.
//! Fatal errors (structural problems, arithmetic overflow, undefined
//! control sequences, a blown expansion budget) abort the run; they are
//! created with [`VM::fatal_error`](crate::vm::VM::fatal_error).
//! Recoverable errors (parse problems, lexical problems) are routed through
//! [`VM::error`](crate::vm::VM::error), which gives the state's
//! `recoverable_error_hook` the chance to log the error and continue.
//! Which choice that hook makes is interaction-mode policy and not decided
//! here; the error value carries the structured information (error kind,
//! offending token, source position) any policy needs.
//!
//! Concrete errors implement the [SetlangError] trait.
//! As an error propagates out of the expansion engine it picks up a stack
//! trace of the commands it passed through.

use crate::token;
use crate::token::trace;
use crate::vm;

pub mod display;

/// The kind of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// An error at a particular token; for example, a command expected a
    /// number but the next token is a letter.
    Token(token::Token),
    /// The input ended prematurely.
    EndOfInput,
    /// Some external condition does not hold; for example, a file does
    /// not exist.
    FailedPrecondition,
}

/// Implementations of this trait describe an error in source code.
pub trait SetlangError: std::fmt::Debug + 'static {
    fn kind(&self) -> Kind;

    fn title(&self) -> String;

    fn notes(&self) -> Vec<display::Note> {
        vec![]
    }

    fn source_annotation(&self) -> String {
        SetlangError::default_source_annotation(self)
    }

    fn default_source_annotation(&self) -> String {
        match SetlangError::kind(self) {
            Kind::Token(t) => match (t.char(), t.cat_code()) {
                (Some(c), Some(code)) => {
                    format!("character token with value {c} and category code {code}")
                }
                _ => "control sequence".to_string(),
            },
            Kind::EndOfInput => "input ended here".into(),
            Kind::FailedPrecondition => "error occurred while running this command".into(),
        }
    }
}

/// Implementations of this trait describe an error in which the input ended
/// prematurely.
///
/// They are converted into full [SetlangError] values when they are raised;
/// see [`TokenStream::next_or`](crate::vm::TokenStream::next_or).
pub trait EndOfInputError: std::fmt::Debug + 'static {
    /// What was being done when the input ended, e.g. "parsing a number".
    fn doing(&self) -> String;

    fn notes(&self) -> Vec<display::Note> {
        vec![]
    }
}

#[derive(Debug)]
pub(crate) struct EofError {
    doing: String,
    notes: Vec<display::Note>,
}

impl EofError {
    pub(crate) fn new<E: EndOfInputError>(err: E) -> Self {
        Self {
            doing: err.doing(),
            notes: err.notes(),
        }
    }
}

impl SetlangError for EofError {
    fn kind(&self) -> Kind {
        Kind::EndOfInput
    }
    fn title(&self) -> String {
        format!("unexpected end of input while {}", self.doing)
    }
    fn notes(&self) -> Vec<display::Note> {
        self.notes.clone()
    }
}

/// Context in which an error was propagated up the call stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationContext {
    Expansion,
    Execution,
    VariableIndex,
    VariableAssignment,
}

impl PropagationContext {
    fn describe(&self) -> &'static str {
        match self {
            PropagationContext::Expansion => "expanding this command",
            PropagationContext::Execution => "executing this command",
            PropagationContext::VariableIndex => "determining the index of this variable",
            PropagationContext::VariableAssignment => "assigning a value to this variable",
        }
    }
}

/// Element of an error's stack trace.
#[derive(Debug)]
pub struct StackTraceElement {
    pub context: PropagationContext,
    pub trace: trace::SourceCodeTrace,
}

/// A fully traced error.
#[derive(Debug)]
pub struct Error {
    pub error: Box<dyn SetlangError>,
    /// Source position of the offending token, or of the end of input.
    pub trace: Option<trace::SourceCodeTrace>,
    /// Command invocations the error propagated through, innermost first.
    pub stack_trace: Vec<StackTraceElement>,
}

impl Error {
    pub(crate) fn new_traced<S>(vm: &vm::VM<S>, error: Box<dyn SetlangError>) -> Box<Error> {
        let trace = match error.kind() {
            Kind::Token(token) => Some(vm.trace(token)),
            Kind::EndOfInput => Some(vm.trace_end_of_input()),
            Kind::FailedPrecondition => None,
        };
        Box::new(Error {
            error,
            trace,
            stack_trace: vec![],
        })
    }

    pub(crate) fn new_propagated<S>(
        vm: &vm::VM<S>,
        context: PropagationContext,
        token: token::Token,
        mut error: Box<Error>,
    ) -> Box<Error> {
        error.stack_trace.push(StackTraceElement {
            context,
            trace: vm.trace(token),
        });
        error
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        display::format_error(f, self)
    }
}

impl std::error::Error for Error {}

/// Error for a control sequence or active character with no definition.
#[derive(Debug)]
pub struct UndefinedCommandError {
    token: token::Token,
    name: String,
}

impl UndefinedCommandError {
    pub fn new<S>(vm: &vm::VM<S>, token: token::Token) -> UndefinedCommandError {
        let name = match token.value() {
            token::Value::CommandRef(command_ref) => command_ref.display(vm.cs_name_interner()),
            _ => token.char().unwrap_or('?').into(),
        };
        UndefinedCommandError { token, name }
    }
}

impl SetlangError for UndefinedCommandError {
    fn kind(&self) -> Kind {
        Kind::Token(self.token)
    }
    fn title(&self) -> String {
        format!("undefined control sequence {}", self.name)
    }
}

/// A simple error at a token, with a fixed message.
#[derive(Debug)]
pub struct SimpleTokenError {
    token: token::Token,
    title: String,
}

impl SimpleTokenError {
    pub fn new<T: Into<String>>(token: token::Token, title: T) -> SimpleTokenError {
        SimpleTokenError {
            token,
            title: title.into(),
        }
    }
}

impl SetlangError for SimpleTokenError {
    fn kind(&self) -> Kind {
        Kind::Token(self.token)
    }
    fn title(&self) -> String {
        self.title.clone()
    }
}

/// A simple error not attached to any token, with a fixed message.
#[derive(Debug)]
pub struct SimpleFailedPreconditionError {
    title: String,
    notes: Vec<display::Note>,
}

impl SimpleFailedPreconditionError {
    pub fn new<T: Into<String>>(title: T) -> SimpleFailedPreconditionError {
        SimpleFailedPreconditionError {
            title: title.into(),
            notes: vec![],
        }
    }

    pub fn with_note<T: Into<display::Note>>(mut self, note: T) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl SetlangError for SimpleFailedPreconditionError {
    fn kind(&self) -> Kind {
        Kind::FailedPrecondition
    }
    fn title(&self) -> String {
        self.title.clone()
    }
    fn notes(&self) -> Vec<display::Note> {
        self.notes.clone()
    }
}
