//! Tokens, category codes, and the machinery for producing them.

mod catcode;
pub mod lexer;
pub mod trace;
pub use catcode::CatCode;
use galley_stdext::collections::interner;
use std::{fmt::Display, num};

/// The name of a control sequence, interned.
///
/// The implementation of this type is opaque so that it can be performance
/// optimized without worrying about downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CsName(num::NonZeroU32);

impl interner::Key for CsName {
    fn try_from_usize(index: usize) -> Option<Self> {
        num::NonZeroU32::try_from_usize(index).map(CsName)
    }
    fn into_usize(self) -> usize {
        self.0.into_usize()
    }
}

/// The name of a namespace, interned.
///
/// Control sequence tokens are tagged with the namespace that was current
/// when they were scanned, and command lookup is namespace-qualified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NsName(num::NonZeroU32);

impl interner::Key for NsName {
    fn try_from_usize(index: usize) -> Option<Self> {
        num::NonZeroU32::try_from_usize(index).map(NsName)
    }
    fn into_usize(self) -> usize {
        self.0.into_usize()
    }
}

/// String interner for control sequence names.
pub type CsNameInterner = interner::Interner<CsName>;

/// String interner for namespace names.
pub type NsNameInterner = interner::Interner<NsName>;

/// The value of a token.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    BeginGroup(char),
    EndGroup(char),
    MathShift(char),
    AlignmentTab(char),
    Parameter(char),
    Superscript(char),
    Subscript(char),
    Space(char),
    Letter(char),
    Other(char),
    CommandRef(CommandRef),
}

/// The value of a token that references a command.
#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandRef {
    /// A named control sequence, together with the namespace that was
    /// current when the token was produced.
    ControlSequence(NsName, CsName),
    /// A character with the active category code.
    ActiveCharacter(char),
}

impl CommandRef {
    pub fn display(&self, cs_name_interner: &CsNameInterner) -> String {
        match self {
            CommandRef::ControlSequence(_, cs_name) => {
                format!("\\{}", cs_name_interner.resolve(*cs_name).unwrap_or("?"))
            }
            CommandRef::ActiveCharacter(c) => format!("{c}"),
        }
    }
}

impl Value {
    pub fn new(c: char, cat_code: CatCode) -> Value {
        match cat_code {
            CatCode::BeginGroup => Value::BeginGroup(c),
            CatCode::EndGroup => Value::EndGroup(c),
            CatCode::MathShift => Value::MathShift(c),
            CatCode::AlignmentTab => Value::AlignmentTab(c),
            CatCode::Parameter => Value::Parameter(c),
            CatCode::Superscript => Value::Superscript(c),
            CatCode::Subscript => Value::Subscript(c),
            CatCode::Space => Value::Space(c),
            CatCode::Letter => Value::Letter(c),
            CatCode::Other => Value::Other(c),
            CatCode::Active => Value::CommandRef(CommandRef::ActiveCharacter(c)),
            _ => panic!("cat code {cat_code} cannot appear in a token"),
        }
    }
}

/// A token: an immutable value produced by the scanner.
///
/// Equality is by value only; the trace key is ignored so that a token can
/// be compared against a token for the same content from a different source
/// position.
#[derive(Debug, Eq, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Token {
    value: Value,
    trace_key: trace::Key,
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

macro_rules! token_constructor {
    ($name: ident, $value: expr) => {
        pub fn $name(c: char, trace_key: trace::Key) -> Token {
            Token {
                value: $value(c),
                trace_key,
            }
        }
    };
}

impl Token {
    token_constructor!(new_begin_group, Value::BeginGroup);
    token_constructor!(new_end_group, Value::EndGroup);
    token_constructor!(new_math_shift, Value::MathShift);
    token_constructor!(new_alignment_tab, Value::AlignmentTab);
    token_constructor!(new_parameter, Value::Parameter);
    token_constructor!(new_superscript, Value::Superscript);
    token_constructor!(new_subscript, Value::Subscript);
    token_constructor!(new_space, Value::Space);
    token_constructor!(new_letter, Value::Letter);
    token_constructor!(new_other, Value::Other);

    pub fn new_active_character(c: char, trace_key: trace::Key) -> Token {
        Token {
            value: Value::CommandRef(CommandRef::ActiveCharacter(c)),
            trace_key,
        }
    }

    pub fn new_control_sequence(namespace: NsName, name: CsName, trace_key: trace::Key) -> Token {
        Token {
            value: Value::CommandRef(CommandRef::ControlSequence(namespace, name)),
            trace_key,
        }
    }

    pub fn new_from_value(value: Value, trace_key: trace::Key) -> Token {
        Token { value, trace_key }
    }

    #[inline]
    pub fn value(&self) -> Value {
        self.value
    }

    #[inline]
    pub fn trace_key(&self) -> trace::Key {
        self.trace_key
    }

    /// The character of the token, or [None] for control sequences.
    pub fn char(&self) -> Option<char> {
        match self.value {
            Value::BeginGroup(c)
            | Value::EndGroup(c)
            | Value::MathShift(c)
            | Value::AlignmentTab(c)
            | Value::Parameter(c)
            | Value::Superscript(c)
            | Value::Subscript(c)
            | Value::Space(c)
            | Value::Letter(c)
            | Value::Other(c) => Some(c),
            Value::CommandRef(command_ref) => match command_ref {
                CommandRef::ControlSequence(..) => None,
                CommandRef::ActiveCharacter(c) => Some(c),
            },
        }
    }

    /// The category code of the token, or [None] for control sequences.
    pub fn cat_code(&self) -> Option<CatCode> {
        match self.value {
            Value::BeginGroup(_) => Some(CatCode::BeginGroup),
            Value::EndGroup(_) => Some(CatCode::EndGroup),
            Value::MathShift(_) => Some(CatCode::MathShift),
            Value::AlignmentTab(_) => Some(CatCode::AlignmentTab),
            Value::Parameter(_) => Some(CatCode::Parameter),
            Value::Superscript(_) => Some(CatCode::Superscript),
            Value::Subscript(_) => Some(CatCode::Subscript),
            Value::Space(_) => Some(CatCode::Space),
            Value::Letter(_) => Some(CatCode::Letter),
            Value::Other(_) => Some(CatCode::Other),
            Value::CommandRef(command_ref) => match command_ref {
                CommandRef::ControlSequence(..) => None,
                CommandRef::ActiveCharacter(_) => Some(CatCode::Active),
            },
        }
    }
}

enum PendingWhitespace {
    NotStarted,
    None,
    Space,
    Newlines(usize),
}

impl PendingWhitespace {
    fn start(&mut self) {
        *self = PendingWhitespace::None;
    }

    fn add_space(&mut self) {
        *self = match self {
            PendingWhitespace::NotStarted => PendingWhitespace::NotStarted,
            PendingWhitespace::None | PendingWhitespace::Space => PendingWhitespace::Space,
            PendingWhitespace::Newlines(n) => PendingWhitespace::Newlines(*n),
        }
    }

    fn add_newline(&mut self) {
        *self = match self {
            PendingWhitespace::NotStarted => PendingWhitespace::NotStarted,
            PendingWhitespace::None | PendingWhitespace::Space => PendingWhitespace::Newlines(1),
            PendingWhitespace::Newlines(n) => PendingWhitespace::Newlines(*n + 1),
        }
    }
}

impl Display for PendingWhitespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PendingWhitespace::NotStarted | PendingWhitespace::None => Ok(()),
            PendingWhitespace::Space => write!(f, " "),
            PendingWhitespace::Newlines(n) => {
                for _ in 0..*n {
                    writeln!(f)?;
                }
                Ok(())
            }
        }
    }
}

/// Data structure for writing tokens back out as source text.
///
/// Leading and trailing whitespace is trimmed and runs of whitespace are
/// written only when followed by more content, so the output is the shortest
/// text that scans back to the same tokens.
pub struct Writer<I> {
    io_writer: I,
    pending_whitespace: PendingWhitespace,
}

impl<I: Default> Default for Writer<I> {
    fn default() -> Self {
        Self {
            io_writer: Default::default(),
            pending_whitespace: PendingWhitespace::NotStarted,
        }
    }
}

impl<I> Writer<I> {
    /// Create a new writer that writes output to the provided IO writer.
    pub fn new(io_writer: I) -> Self {
        Self {
            io_writer,
            pending_whitespace: PendingWhitespace::NotStarted,
        }
    }

    pub fn take_io_writer(self) -> I {
        self.io_writer
    }
}

impl<I: std::io::Write> Writer<I> {
    /// Write a token.
    pub fn write(&mut self, interner: &CsNameInterner, token: Token) -> Result<(), std::io::Error> {
        match &token.value {
            Value::CommandRef(CommandRef::ControlSequence(_, s)) => {
                write!(
                    self.io_writer,
                    "{}\\{}",
                    self.pending_whitespace,
                    interner.resolve(*s).unwrap_or("?"),
                )?;
                // A separating space must appear before any following
                // content, or the written text would scan differently.
                self.pending_whitespace = PendingWhitespace::Space;
            }
            Value::Space('\n') => self.pending_whitespace.add_newline(),
            Value::Space(_) => self.pending_whitespace.add_space(),
            _ => {
                write!(
                    self.io_writer,
                    "{}{}",
                    self.pending_whitespace,
                    token.char().unwrap()
                )?;
                self.pending_whitespace.start();
            }
        }
        self.io_writer.flush()
    }
}

/// Write a collection of tokens to a string.
pub fn write_tokens<'a, T>(tokens: T, interner: &CsNameInterner) -> String
where
    T: IntoIterator<Item = &'a Token>,
{
    let mut writer: Writer<Vec<u8>> = Default::default();
    for token in tokens.into_iter() {
        writer.write(interner, *token).unwrap();
    }
    let buffer = writer.take_io_writer();
    std::str::from_utf8(&buffer).unwrap().trim_end().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    enum PreInternedToken {
        ControlSequence(&'static str),
        Character(char, CatCode),
    }
    use PreInternedToken::*;

    fn write_tokens_test(input: Vec<PreInternedToken>, want: &str) {
        let mut tokens: Vec<Token> = vec![];
        let mut cs_interner = CsNameInterner::default();
        let mut ns_interner = NsNameInterner::default();
        let ns = ns_interner.get_or_intern("");
        for pre_interned in input {
            let token = match pre_interned {
                ControlSequence(name) => {
                    let cs_name = cs_interner.get_or_intern(name);
                    Token::new_control_sequence(ns, cs_name, trace::Key::dummy())
                }
                Character(c, code) => Token::new_from_value(Value::new(c, code), trace::Key::dummy()),
            };
            tokens.push(token);
        }
        let got = write_tokens(&tokens, &cs_interner);
        assert_eq!(got, want);
    }

    #[test]
    fn blank() {
        write_tokens_test(vec![], "");
    }

    #[test]
    fn trim_whitespace_from_start() {
        write_tokens_test(
            vec![
                Character('\n', CatCode::Space),
                Character(' ', CatCode::Space),
                Character('H', CatCode::Letter),
            ],
            "H",
        );
    }

    #[test]
    fn trim_whitespace_from_end() {
        write_tokens_test(
            vec![
                Character('H', CatCode::Letter),
                Character(' ', CatCode::Space),
                Character('\n', CatCode::Space),
            ],
            "H",
        );
    }

    #[test]
    fn collapse_spaces_in_middle() {
        write_tokens_test(
            vec![
                Character('H', CatCode::Letter),
                Character(' ', CatCode::Space),
                Character(' ', CatCode::Space),
                Character('W', CatCode::Letter),
            ],
            "H W",
        );
    }

    #[test]
    fn control_sequence() {
        write_tokens_test(vec![ControlSequence("HelloWorld")], "\\HelloWorld");
    }

    #[test]
    fn token_size() {
        // The namespace tag costs 4 bytes over a plain control sequence
        // reference; keep an eye on the total.
        assert_eq!(std::mem::size_of::<Value>(), 12);
        assert_eq!(std::mem::size_of::<Token>(), 16);
    }
}
