//! Glue parsing.
//!
//! Glue is a dimension optionally followed by `plus <dimen|fil>` and
//! `minus <dimen|fil>` components.

use galley_core::{Glue, Scaled};

use super::keyword::parse_keyword;
use crate::error;
use crate::prelude as sl;
use crate::token::Value;
use crate::traits::*;
use crate::vm;

impl<S: SetlangState> Parsable<S> for Glue {
    fn parse_impl(input: &mut vm::ExpansionInput<S>) -> sl::Result<Self> {
        let negative = super::number::parse_optional_signs(input)?.is_some();
        let first_token = input.next_or(GlueEndOfInputError {})?;
        let width = match first_token.value() {
            Value::CommandRef(command_ref) => {
                use super::number::InternalNumber;
                match super::number::parse_internal_number(input, first_token, command_ref)? {
                    InternalNumber::Integer(i) => Scaled(if negative { -i } else { i }),
                    InternalNumber::Dimen(d) => {
                        if negative {
                            -d
                        } else {
                            d
                        }
                    }
                    InternalNumber::Glue(g) => {
                        return Ok(if negative { g.wrapping_mul(-1) } else { g });
                    }
                }
            }
            _ => {
                input.back(first_token);
                let d = Scaled::parse(input)?;
                if negative {
                    -d
                } else {
                    d
                }
            }
        };

        let mut g = Glue {
            width,
            ..Default::default()
        };
        if parse_keyword(input, "plus")? {
            g.stretch = super::dimen::scan_dimen(input, Some(&mut g.stretch_order))?;
        }
        if parse_keyword(input, "minus")? {
            g.shrink = super::dimen::scan_dimen(input, Some(&mut g.shrink_order))?;
        }
        Ok(g)
    }
}

#[derive(Debug)]
struct GlueEndOfInputError;

impl error::EndOfInputError for GlueEndOfInputError {
    fn doing(&self) -> String {
        "parsing a glue value".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::testing::*;
    use galley_core::GlueOrder;

    #[derive(Default)]
    struct State;

    impl SetlangState for State {}

    parse_success_tests![
        (width_1, "0pt", Glue::default()),
        (
            width_2,
            "1pt",
            Glue {
                width: Scaled::ONE,
                ..Default::default()
            }
        ),
        (
            width_3,
            "-1pt",
            Glue {
                width: -Scaled::ONE,
                ..Default::default()
            }
        ),
        (
            stretch_1,
            "1pt plus 1pt",
            Glue {
                width: Scaled::ONE,
                stretch: Scaled::ONE,
                ..Default::default()
            }
        ),
        (
            stretch_fil,
            "1pt plus 1fil",
            Glue {
                width: Scaled::ONE,
                stretch: Scaled::ONE,
                stretch_order: GlueOrder::Fil,
                ..Default::default()
            }
        ),
        (
            stretch_fill,
            "1pt plus 1fill",
            Glue {
                width: Scaled::ONE,
                stretch: Scaled::ONE,
                stretch_order: GlueOrder::Fill,
                ..Default::default()
            }
        ),
        (
            stretch_filll,
            "1pt plus 1filll",
            Glue {
                width: Scaled::ONE,
                stretch: Scaled::ONE,
                stretch_order: GlueOrder::Filll,
                ..Default::default()
            }
        ),
        (
            shrink_1,
            "1pt plus 2pt minus 3pt",
            Glue {
                width: Scaled::ONE,
                stretch: Scaled::TWO,
                shrink: Scaled::ONE * 3,
                ..Default::default()
            }
        ),
    ];

    parse_failure_tests!(
        Glue,
        State,
        (stretch_overflow, "1pt plus 30000000fil"),
        (stretch_fillll, "1pt plus 2fillll"),
    );
}
