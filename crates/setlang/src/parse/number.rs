//! Number parsing.
//!
//! A number is octal, decimal, hexadecimal, cast from a character token with
//! the backtick notation, or read from an internal value such as a register.

use crate::command;
use crate::error;
use crate::parse;
use crate::prelude as sl;
use crate::token;
use crate::token::CatCode;
use crate::token::Value;
use crate::traits::*;
use crate::variable;
use crate::vm;
use galley_core::{Glue, Scaled};

impl<S: SetlangState> Parsable<S> for i32 {
    fn parse_impl(input: &mut vm::ExpansionInput<S>) -> sl::Result<Self> {
        let (_, i): (token::Token, i32) = parse_number_internal(input)?;
        Ok(i)
    }
}

/// A parsed integer that must lie in the range `[0, N)`.
///
/// An out-of-range integer is a recoverable error; the parsed value is then 0.
#[derive(Debug, PartialEq, Eq, Default)]
pub struct Uint<const N: usize>(pub usize);

impl Uint<0> {
    pub const MAX: usize = i32::MAX as usize;
}

impl<S: SetlangState, const N: usize> Parsable<S> for Uint<N> {
    fn parse_impl(input: &mut vm::ExpansionInput<S>) -> sl::Result<Self> {
        let (first_token, i): (token::Token, i32) = parse_number_internal(input)?;
        if i < 0 || i as usize >= N {
            input.vm().error(OutOfBoundsError::<N> {
                first_token,
                got: i,
            })?;
            Ok(Uint(0))
        } else {
            Ok(Uint(i as usize))
        }
    }
}

#[derive(Debug)]
struct OutOfBoundsError<const N: usize> {
    first_token: token::Token,
    got: i32,
}

impl<const N: usize> error::SetlangError for OutOfBoundsError<N> {
    fn kind(&self) -> error::Kind {
        error::Kind::Token(self.first_token)
    }
    fn title(&self) -> String {
        format!(
            "expected an integer in the range [0, {}), got {}",
            N, self.got
        )
    }
}

impl<S: SetlangState> Parsable<S> for char {
    fn parse_impl(input: &mut vm::ExpansionInput<S>) -> sl::Result<Self> {
        let u1 = Uint::<{ char::MAX as usize }>::parse(input)?;
        let u2: u32 = u1.0.try_into().unwrap();
        Ok(char::from_u32(u2).unwrap())
    }
}

impl<S: SetlangState> Parsable<S> for CatCode {
    fn parse_impl(input: &mut vm::ExpansionInput<S>) -> sl::Result<Self> {
        let (token, i): (token::Token, i32) = parse_number_internal(input)?;
        if let Ok(val_u8) = u8::try_from(i) {
            if let Ok(cat_code) = CatCode::try_from(val_u8) {
                return Ok(cat_code);
            }
        }
        input.vm().error(
            parse::Error::new(
                "a category code number (an integer in the range [0, 15])",
                Some(token),
                "",
            )
            .with_got_override(format!["got the integer {i}"])
            .with_annotation_override("this is where the number started"),
        )?;
        Ok(CatCode::default())
    }
}

const GUIDANCE_BEGINNING: &str =
    "a number begins with zero or more signs followed by one of the following:
- A decimal digit (0-9), which begins a decimal number.
- The character ', which begins an octal number.
- The character \", which begins a hexadecimal number.
- The character `, followed by a character token, which is cast to its code.
- A command that references a value, like a register.
";

pub(crate) fn parse_number_internal<S: SetlangState>(
    stream: &mut vm::ExpansionInput<S>,
) -> sl::Result<(token::Token, i32)> {
    let sign = parse_optional_signs(stream)?;
    let first_token = stream.next_or(NumberEndOfInputError {})?;
    let result: i32 = match first_token.value() {
        Value::Other(c) if c.is_ascii_digit() => {
            stream.back(first_token);
            let (_, i, _) = parse_integer(stream)?;
            i
        }
        Value::Other('\'') | Value::Other('"') | Value::Other('`') => {
            stream.back(first_token);
            let (_, i, _) = parse_integer(stream)?;
            i
        }
        Value::CommandRef(command_ref) => {
            match parse_internal_number(stream, first_token, command_ref)? {
                InternalNumber::Integer(i) => i,
                // Reading a dimension where an integer is wanted yields the
                // value in scaled points.
                InternalNumber::Dimen(d) => d.0,
                InternalNumber::Glue(g) => g.width.0,
            }
        }
        _ => {
            stream.back(first_token);
            stream.vm().error(parse::Error::new(
                "the beginning of a number",
                Some(first_token),
                GUIDANCE_BEGINNING,
            ))?;
            0
        }
    };
    get_optional_element![stream, Value::Space(_) => (),];
    let result = match sign {
        None => result,
        // The only i32 that cannot be negated is i32::MIN, for which the
        // reference behavior is to wrap back to i32::MIN.
        Some(_) => result.wrapping_mul(-1),
    };
    Ok((first_token, result))
}

#[derive(Debug)]
struct NumberEndOfInputError;

impl error::EndOfInputError for NumberEndOfInputError {
    fn doing(&self) -> String {
        "parsing a number".into()
    }
    fn notes(&self) -> Vec<error::display::Note> {
        vec![GUIDANCE_BEGINNING.into()]
    }
}

/// Parses optional signs and spaces.
///
/// Multiple signs accumulate: each `-` flips the result, `+` leaves it.
/// If the combination is positive, [None] is returned; otherwise the token
/// corresponding to the last effective negative sign is returned.
pub(crate) fn parse_optional_signs<S: SetlangState>(
    stream: &mut vm::ExpansionInput<S>,
) -> sl::Result<Option<token::Token>> {
    let mut result = None;
    while let Some((sign, token)) = get_optional_element_with_token![
        stream,
        Value::Other('+') => true,
        Value::Other('-') => false,
        Value::Space(_) => true,
    ] {
        result = match (result, sign) {
            (None, false) => Some(token),
            (Some(_), false) => None,
            (result, true) => result,
        };
    }
    Ok(result)
}

/// An internal value read while scanning a number or dimension.
pub(crate) enum InternalNumber {
    Integer(i32),
    Dimen(Scaled),
    Glue(Glue),
}

/// Read the internal value a command token refers to.
///
/// Commands that do not carry a value (macros, execution primitives) are a
/// fatal error: the token has already been expanded, so no recovery can make
/// the input scan as a number.
pub(crate) fn parse_internal_number<S: SetlangState>(
    input: &mut vm::ExpansionInput<S>,
    first_token: token::Token,
    command_ref: token::CommandRef,
) -> sl::Result<InternalNumber> {
    let cmd = input.commands_map().get_command(&command_ref);
    match cmd {
        Some(command::Command::Variable(cmd)) => {
            let variable = cmd.clone().resolve(first_token, input)?;
            Ok(match variable.value(input.state()) {
                variable::ValueRef::Int(i) => InternalNumber::Integer(*i),
                variable::ValueRef::Dimen(d) => InternalNumber::Dimen(*d),
                variable::ValueRef::Glue(g) => InternalNumber::Glue(*g),
                variable::ValueRef::CatCode(c) => InternalNumber::Integer(*c as i32),
                variable::ValueRef::TokenList(_) => {
                    return Err(input.vm().fatal_error(
                        parse::Error::new(
                            "the beginning of a number",
                            Some(first_token),
                            GUIDANCE_BEGINNING,
                        )
                        .with_annotation_override("token list variable"),
                    ));
                }
            })
        }
        Some(command::Command::Character(c)) => {
            Ok(InternalNumber::Integer((*c as u32).try_into().unwrap()))
        }
        None
        | Some(
            command::Command::Execution(..)
            | command::Command::Expansion(..)
            | command::Command::Macro(..)
            | command::Command::CharacterTokenAlias(..),
        ) => {
            let err = parse::Error::new(
                "the beginning of a number",
                Some(first_token),
                GUIDANCE_BEGINNING,
            )
            .with_annotation_override(match cmd {
                None => "undefined control sequence".to_string(),
                Some(cmd) => format!["control sequence referencing {cmd}"],
            });
            input.back(first_token);
            Err(input.vm().fatal_error(err))
        }
    }
}

/// Parse an explicit integer constant.
///
/// Returns the first token of the constant, the value, and the radix the
/// constant was written in ([None] for the backtick character notation).
pub(crate) fn parse_integer<S: SetlangState>(
    stream: &mut vm::ExpansionInput<S>,
) -> sl::Result<(token::Token, i32, Option<i32>)> {
    let first_token = stream.next_or(NumberEndOfInputError {})?;
    Ok(match first_token.value() {
        Value::Other(c) if c.is_ascii_digit() => {
            let i = parse_constant::<S, 10>(stream, (c as i32) - ('0' as i32))?;
            (first_token, i, Some(10))
        }
        Value::Other('\'') => (first_token, parse_constant::<S, 8>(stream, 0)?, Some(8)),
        Value::Other('"') => (first_token, parse_constant::<S, 16>(stream, 0)?, Some(16)),
        Value::Other('`') => (first_token, parse_character(stream)?, None),
        _ => {
            stream.back(first_token);
            stream.vm().error(parse::Error::new(
                "the beginning of a number",
                Some(first_token),
                GUIDANCE_BEGINNING,
            ))?;
            (first_token, 0, Some(10))
        }
    })
}

// The backtick notation: the number is the code of the character token or
// single-character control sequence that follows.
fn parse_character<S: SetlangState>(input: &mut vm::ExpansionInput<S>) -> sl::Result<i32> {
    let c = {
        let token = input.next_or(CharacterEndOfInputError {})?;
        match token.value() {
            Value::CommandRef(token::CommandRef::ControlSequence(_, cs_name)) => {
                let name = input.vm().cs_name_interner().resolve(cs_name).unwrap();
                let mut iter = name.chars();
                match (iter.next(), iter.count()) {
                    (Some(c), 0) => c,
                    _ => {
                        input.vm().error(parse::Error::new(
                            "a character",
                            Some(token),
                            "a character is a character token or a single-character control sequence like \\a",
                        ))?;
                        '0'
                    }
                }
            }
            _ => token.char().unwrap(),
        }
    };
    Ok(c as i32)
}

#[derive(Debug)]
struct CharacterEndOfInputError;

impl error::EndOfInputError for CharacterEndOfInputError {
    fn doing(&self) -> String {
        "parsing a character".into()
    }
    fn notes(&self) -> Vec<error::display::Note> {
        vec![
            r"a character is a character token or a single-character control sequence like \a"
                .into(),
        ]
    }
}

fn parse_constant<S: SetlangState, const RADIX: i32>(
    stream: &mut vm::ExpansionInput<S>,
    mut result: i32,
) -> sl::Result<i32> {
    let mut started = RADIX == 10;
    let mut too_big = false;
    loop {
        let next = match stream.next()? {
            None => break,
            Some(next) => next,
        };
        let lsd_or = match next.value() {
            token::Value::Other(c) => {
                let d = (c as u32).wrapping_sub('0' as u32);
                if d < 10 && d < (RADIX as u32) {
                    Some(d as i32)
                } else if RADIX == 16 {
                    let d = (c as u32).wrapping_sub('A' as u32);
                    if d < 6 {
                        Some(d as i32 + 10)
                    } else {
                        None
                    }
                } else {
                    None
                }
            }
            token::Value::Letter(c) => {
                let d = (c as u32).wrapping_sub('A' as u32);
                if RADIX == 16 && d < 6 {
                    Some(d as i32 + 10)
                } else {
                    None
                }
            }
            _ => None,
        };
        let lsd = match lsd_or {
            None => {
                stream.back(next);
                break;
            }
            Some(lsd) => lsd,
        };
        started = true;
        result = match add_lsd::<RADIX>(result, lsd) {
            Some(n) => n,
            None => {
                if !too_big {
                    stream
                        .vm()
                        .error(add_lsd_error::<RADIX>(next, result, lsd))?;
                    too_big = true;
                }
                i32::MAX
            }
        }
    }
    if !started {
        let (expected, guidance) = match RADIX {
            8 => (
                "an octal digit",
                "an octal digit is a token with value 0-7 and category other",
            ),
            16 => (
                "a hexadecimal digit",
                "a hexadecimal digit is either:\n- A character token with value 0-9 and category other, or\n- A character token with value A-F and category letter or other",
            ),
            _ => unreachable!(),
        };
        let got = stream.peek()?.copied();
        stream
            .vm()
            .error(parse::Error::new(expected, got, guidance))?;
    }
    Ok(result)
}

fn add_lsd<const RADIX: i32>(n: i32, lsd: i32) -> Option<i32> {
    match n.checked_mul(RADIX) {
        None => None,
        Some(n) => n.checked_add(lsd),
    }
}

fn add_lsd_error<const RADIX: i32>(token: token::Token, n: i32, lsd: i32) -> parse::Error {
    let (got, range) = match RADIX {
        8 => (
            format!["got '{n:o}{lsd:o}"],
            format!["'{:o}, '{:o}", i32::MIN, i32::MAX],
        ),
        10 => (
            format!["got {n}{lsd}"],
            format!["{}, {}", i32::MIN, i32::MAX],
        ),
        16 => (
            format!["got 0x{n:X}{lsd:X}"],
            format!["0x{:X}, 0x{:X}", i32::MIN, i32::MAX],
        ),
        _ => panic!("radix must be 8, 10 or 16"),
    };
    parse::Error::new(format!["a number in the range [{range}]"], Some(token), "")
        .with_got_override(got)
        .with_annotation_override("this digit makes the number too big")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::testing::*;

    parse_success_tests![
        (octal_0, "'0", 0),
        (octal_7, "'7", 7),
        (octal_8, "'10", 8),
        (octal_129, "'201", 129),
        (octal_max, "'17777777777", 2147483647),
        (octal_min, "-'17777777777", -2147483647),
        (decimal_0, "0", 0),
        (decimal_9, "9", 9),
        (decimal_19, "19", 19),
        (decimal_1_with_0_padding, "00019", 19),
        (decimal_201, "201", 201),
        (decimal_max, "2147483647", 2147483647),
        (decimal_min, "-2147483647", -2147483647),
        (hexadecimal_0, "\"0", 0),
        (hexadecimal_10, "\"A", 10),
        (hexadecimal_15, "\"F", 15),
        (hexadecimal_16, "\"10", 16),
        (hexadecimal_26, "\"1A", 26),
        (hexadecimal_513, "\"201", 513),
        (hexadecimal_max, "\"7FFFFFFF", 2147483647),
        (hexadecimal_min, "-\"7FFFFFFF", -2147483647),
        (number_from_character, "`A", 65),
        (number_from_length_1_control_sequence, r"`\A", 65),
        (number_from_character_non_ascii, "`ö", 0x00F6),
        (signs_plus, r"+4", 4),
        (signs_minus, r"-4", -4),
        (signs_plus_minus, r"+-4", -4),
        (signs_minus_minus, r"--4", 4),
        (signs_minus_minus_spaces, r"  -  - 4", 4),
    ];

    #[derive(Default)]
    struct State;

    impl SetlangState for State {
        fn cat_code(&self, c: char) -> CatCode {
            if c == '9' {
                return CatCode::Letter;
            }
            CatCode::standard(c)
        }
    }

    parse_failure_tests![
        i32,
        State,
        (number_with_letter_catcode, "9"),
        (octal_too_big, "'177777777770"),
        (octal_empty, "'"),
        (decimal_too_big_1, "2147483648"),
        (decimal_too_big_2, "500000000000000"),
        (decimal_too_negative, "-2147483648"),
        (hexadecimal_too_big, "\"7FFFFFFF0"),
        (hexadecimal_empty, "\""),
        (character, "A"),
        (control_sequence_too_big, r"`\BC"),
    ];

    parse_failure_tests![
        Uint<16>,
        State,
        (number_too_big, "16"),
        (number_is_negative, "-1"),
    ];
}
