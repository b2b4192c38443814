//! Parsing of grammar elements from token streams.
//!
//! The module is built around the [Parsable] trait, implemented by Rust
//! types that correspond to elements of the macro language grammar: numbers,
//! dimensions, glue, keywords, assignment targets.
//! Tuples of parsable types are themselves parsable, so a grammar like
//! `<target><equals><integer>` can be parsed with a single invocation.
//!
//! Parsing reads from the expanding stream: any macros encountered while
//! looking for, say, the digits of a number are expanded first.

#[macro_use]
mod helpers;

mod dimen;
mod filelocation;
mod glue;
mod keyword;
mod number;
mod relation;
#[cfg(test)]
mod testing;
mod variable;

pub use filelocation::FileLocation;
pub use keyword::parse_keyword;
pub use keyword::OptionalBy;
pub use keyword::To;
pub use number::Uint;
pub use relation::Ordering;
pub use variable::OptionalEquals;
pub use variable::OptionalSpace;

use crate::error;
use crate::prelude as sl;
use crate::token;
use crate::traits::*;
use crate::vm;

/// Implementations of this trait are elements of the grammar that can be
/// parsed from a stream of tokens.
pub trait Parsable<S: SetlangState>: Sized {
    /// Parses a value from an input stream.
    ///
    /// This method just delegates to [Parsable::parse_impl].
    #[inline]
    fn parse<I>(input: &mut I) -> sl::Result<Self>
    where
        I: AsMut<vm::ExpansionInput<S>>,
    {
        Parsable::parse_impl(input.as_mut())
    }

    /// Parses a value from the expanding stream.
    fn parse_impl(input: &mut vm::ExpansionInput<S>) -> sl::Result<Self>;
}

/// A parse error: the input did not contain the expected grammar element.
#[derive(Debug)]
pub struct Error {
    pub expected: String,
    pub got: Option<token::Token>,
    pub got_override: String,
    pub annotation_override: String,
    pub guidance: String,
}

impl Error {
    pub fn new<T: Into<String>, R: Into<String>>(
        expected: T,
        got: Option<token::Token>,
        guidance: R,
    ) -> Self {
        Error {
            expected: expected.into(),
            got,
            got_override: "".into(),
            annotation_override: "".into(),
            guidance: guidance.into(),
        }
    }

    pub fn with_got_override<T: Into<String>>(mut self, got_override: T) -> Self {
        self.got_override = got_override.into();
        self
    }

    pub fn with_annotation_override<T: Into<String>>(mut self, annotation_override: T) -> Self {
        self.annotation_override = annotation_override.into();
        self
    }
}

impl error::SetlangError for Error {
    fn kind(&self) -> error::Kind {
        match self.got {
            None => error::Kind::EndOfInput,
            Some(token) => error::Kind::Token(token),
        }
    }

    fn title(&self) -> String {
        let got = if self.got_override.is_empty() {
            match self.got {
                None => "the input ended".to_string(),
                Some(token) => match token.value() {
                    token::Value::Letter(c) => format!("found the letter {c}"),
                    token::Value::Other(c) => format!("found a non-letter character {c}"),
                    _ => match (token.char(), token.cat_code()) {
                        (Some(c), Some(code)) => {
                            format!("found a token with value {c} and category code {code}")
                        }
                        _ => "found a control sequence".to_string(),
                    },
                },
            }
        } else {
            self.got_override.clone()
        };
        format!("expected {}, instead {}", self.expected, got)
    }

    fn notes(&self) -> Vec<error::display::Note> {
        if self.guidance.is_empty() {
            vec![]
        } else {
            vec![self.guidance.clone().into()]
        }
    }

    fn source_annotation(&self) -> String {
        if !self.annotation_override.is_empty() {
            return self.annotation_override.clone();
        }
        error::SetlangError::default_source_annotation(self)
    }
}

macro_rules! generate_tuple_impls {
    ( $first: ident ) => {};
    ( $first: ident, $( $name: ident ),+ ) => {
        generate_tuple_impls![ $( $name ),+];

        impl<S: SetlangState, $first: Parsable<S>, $( $name : Parsable<S> ),+> Parsable<S> for ($first, $( $name ),+) {
            fn parse_impl(input: &mut vm::ExpansionInput<S>) -> sl::Result<Self> {
                Ok(($first::parse(input)?, $( $name::parse(input)? ),+))
            }
        }
    };
}

generate_tuple_impls![T1, T2, T3, T4, T5];

/// Parses the target of a definition: a control sequence or active
/// character.
///
/// The target is read without expansion.
/// If the next token is not a valid target, a recoverable error is raised
/// and [None] is returned; the caller should skip the definition.
impl<S: SetlangState> Parsable<S> for Option<token::CommandRef> {
    fn parse_impl(input: &mut vm::ExpansionInput<S>) -> sl::Result<Self> {
        let unexpanded = input.unexpanded();
        loop {
            let found_non_space = get_optional_element![
                unexpanded,
                token::Value::Space(_) => false,
            ];
            if found_non_space.is_none() {
                break;
            }
        }
        Ok(get_required_element![
            unexpanded,
            "a control sequence or active character",
            "the target of a definition must be a control sequence or an active character",
            token::Value::CommandRef(command_ref) => command_ref,
        ])
    }
}

/// Parses balanced tokens from the stream, assuming the opening begin-group
/// token has already been consumed.
///
/// The closing end-group token is consumed but not added to the result.
pub fn finish_parsing_balanced_tokens<I: TokenStream>(
    stream: &mut I,
    result: &mut Vec<token::Token>,
) -> sl::Result<()>
where
    I::S: SetlangState,
{
    let mut depth = 0;
    loop {
        let token = stream.next_or(BalancedTokensEndOfInputError {})?;
        match token.value() {
            token::Value::BeginGroup(_) => {
                depth += 1;
            }
            token::Value::EndGroup(_) => {
                if depth == 0 {
                    return Ok(());
                }
                depth -= 1;
            }
            _ => (),
        }
        result.push(token);
    }
}

#[derive(Debug)]
struct BalancedTokensEndOfInputError;

impl error::EndOfInputError for BalancedTokensEndOfInputError {
    fn doing(&self) -> String {
        "parsing a balanced group of tokens".into()
    }
    fn notes(&self) -> Vec<error::display::Note> {
        vec!["the group started with a begin-group token and must be finished with a matching end-group token".into()]
    }
}
