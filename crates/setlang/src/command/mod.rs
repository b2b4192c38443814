//! The commands API.
//!
//! A *command* is the behavior bound to a control sequence or active
//! character.
//! Commands split into primitives, which are implemented in Rust and
//! registered when the VM is created, and user defined macros, which are
//! created at runtime by primitives like `\def`.
//!
//! The central distinction between commands is expansion versus execution.
//! Expansion commands (`\the`, conditionals, macros) are resolved inside the
//! expansion engine and only ever add tokens to the input stream.
//! Execution commands (`\def`, `\advance`, the box builders) are dispatched
//! by the main interpreter loop and mutate the state or emit typesetting
//! material.

use crate::prelude as sl;
use crate::texmacro;
use crate::token;
use crate::variable;
use crate::vm;
use std::num;
use std::rc;
use std::sync;

pub(crate) mod map;

pub use map::ImportError;
pub use map::Map;

/// The Rust type of expansion primitive functions.
pub type ExpansionFn<S> =
    fn(token: token::Token, input: &mut vm::ExpansionInput<S>) -> sl::Result<()>;

/// The Rust type of execution primitive functions.
pub type ExecutionFn<S> =
    fn(token: token::Token, input: &mut vm::ExecutionInput<S>) -> sl::Result<()>;

/// A command.
pub enum Command<S> {
    /// An expansion primitive that is implemented in the engine.
    ///
    /// Examples: `\the`, `\ifnum`.
    Expansion(ExpansionFn<S>, Option<Tag>),

    /// A user defined macro.
    Macro(rc::Rc<texmacro::Macro>),

    /// A non-expansion primitive that performs operations on the state.
    ///
    /// Examples: `\def`, `\hbox`.
    Execution(ExecutionFn<S>, Option<Tag>),

    /// A command that references a variable, like a register.
    ///
    /// Examples: `\count`, `\catcode`.
    Variable(rc::Rc<variable::Command<S>>),

    /// A command that aliases a character token.
    ///
    /// Created using `\let\cmd=<character>`. Depending on context it
    /// behaves like a character (when typesetting) or like an unexpandable
    /// command (when parsing integers).
    CharacterTokenAlias(token::Value),

    /// A command that references a character, created using `\chardef`.
    ///
    /// In the main loop it results in the character being typeset; in
    /// number parsing contexts it is interpreted as an integer.
    Character(char),
}

impl<S> std::fmt::Display for Command<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Expansion(..) => write!(f, "an expansion command"),
            Command::Macro(..) => write!(f, "a user-defined macro"),
            Command::Execution(..) => write!(f, "an execution command"),
            Command::Variable(..) => write!(f, "a variable command"),
            Command::CharacterTokenAlias(..) => write!(f, "a character token alias"),
            Command::Character(..) => write!(f, "a character command"),
        }
    }
}

impl<S> Command<S> {
    /// Gets the tag associated to this command, or [None] if the command has
    /// no tag.
    pub fn tag(&self) -> Option<Tag> {
        match self {
            Command::Expansion(_, tag) => *tag,
            Command::Execution(_, tag) => *tag,
            Command::Macro(_)
            | Command::Variable(_)
            | Command::CharacterTokenAlias(_)
            | Command::Character(_) => None,
        }
    }
}

// We implement Clone manually as the derived implementation would require S
// to be Clone.
impl<S> Clone for Command<S> {
    fn clone(&self) -> Self {
        match self {
            Command::Expansion(f, t) => Command::Expansion::<S>(*f, *t),
            Command::Macro(m) => Command::Macro(m.clone()),
            Command::Execution(f, t) => Command::Execution(*f, *t),
            Command::Variable(v) => Command::Variable(v.clone()),
            Command::CharacterTokenAlias(v) => Command::CharacterTokenAlias(*v),
            Command::Character(c) => Command::Character(*c),
        }
    }
}

/// A built-in command: a command provided at VM initialization, together
/// with its documentation.
pub struct BuiltIn<S> {
    cmd: Command<S>,
    doc: Option<&'static str>,
}

impl<S> BuiltIn<S> {
    /// Create a new expansion built-in command.
    pub fn new_expansion(f: ExpansionFn<S>) -> BuiltIn<S> {
        Command::Expansion(f, None).into()
    }

    /// Create a new execution built-in command.
    pub fn new_execution(f: ExecutionFn<S>) -> BuiltIn<S> {
        Command::Execution(f, None).into()
    }

    /// Create a new variable built-in command.
    pub fn new_variable(cmd: variable::Command<S>) -> BuiltIn<S> {
        Command::Variable(rc::Rc::new(cmd)).into()
    }

    /// Set the tag for this built-in command.
    pub fn with_tag(mut self, tag: Tag) -> BuiltIn<S> {
        match &mut self.cmd {
            Command::Expansion(_, t) => *t = Some(tag),
            Command::Execution(_, t) => *t = Some(tag),
            _ => panic!("cannot add a tag to this type of command"),
        }
        self
    }

    /// Set the doc for this built-in command.
    pub fn with_doc(mut self, doc: &'static str) -> BuiltIn<S> {
        self.doc = Some(doc);
        self
    }

    pub fn cmd(&self) -> &Command<S> {
        &self.cmd
    }

    pub fn doc(&self) -> Option<&'static str> {
        self.doc
    }
}

impl<S> Clone for BuiltIn<S> {
    fn clone(&self) -> Self {
        Self {
            cmd: self.cmd.clone(),
            doc: self.doc,
        }
    }
}

impl<S> From<Command<S>> for BuiltIn<S> {
    fn from(cmd: Command<S>) -> Self {
        BuiltIn { cmd, doc: None }
    }
}

impl<S> From<variable::Command<S>> for BuiltIn<S> {
    fn from(cmd: variable::Command<S>) -> Self {
        Command::Variable(rc::Rc::new(cmd)).into()
    }
}

/// A tag is a piece of metadata that is optionally attached to a command.
///
/// Tags are the mechanism by which one command can recognize other commands
/// in the token stream.
/// The classic example is conditionals: when a conditional evaluates to
/// false, the input is scanned forward until an `\else` or `\fi` command
/// appears, and those commands are recognized by their tags.
///
/// The same tag can be used for multiple commands, but each command has at
/// most one tag.
///
/// Tags are non-zero 32 bit integers allocated from a global counter.
#[derive(PartialEq, Eq, Clone, Copy, Debug, PartialOrd, Ord, Hash)]
pub struct Tag(num::NonZeroU32);

static NEXT_TAG_VALUE: sync::Mutex<u32> = sync::Mutex::new(1);

impl Tag {
    /// Creates a new unique tag.
    // Creating a tag is a global operation and shouldn't happen without
    // explicit intention, hence no Default implementation.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Tag {
        let mut n = NEXT_TAG_VALUE.lock().unwrap();
        let tag = Tag(num::NonZeroU32::new(*n).unwrap());
        *n = n.checked_add(1).unwrap();
        tag
    }
}

/// A static tag enables creating a tag in a static variable.
///
/// ```
/// # use setlang::command::StaticTag;
/// static TAG: StaticTag = StaticTag::new();
///
/// let first_get = TAG.get();
/// let second_get = TAG.get();
/// assert_eq!(first_get, second_get);
/// ```
pub struct StaticTag(std::sync::OnceLock<Tag>);

impl Default for StaticTag {
    fn default() -> Self {
        StaticTag::new()
    }
}

impl StaticTag {
    pub const fn new() -> StaticTag {
        StaticTag(std::sync::OnceLock::new())
    }

    /// Get the actual [Tag] out of this [StaticTag].
    /// Repeated calls to this function return the same tag.
    pub fn get(&self) -> Tag {
        *self.0.get_or_init(Tag::new)
    }
}
