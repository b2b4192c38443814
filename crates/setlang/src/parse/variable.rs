use crate::prelude as sl;
use crate::token;
use crate::traits::*;
use crate::vm;

/// When parsed, this type consumes an optional equals sign (and surrounding
/// spaces) from the token stream.
pub struct OptionalEquals;

impl<S: SetlangState> Parsable<S> for OptionalEquals {
    fn parse_impl(input: &mut vm::ExpansionInput<S>) -> sl::Result<Self> {
        while let Some(found_equals) = get_optional_element![
            input,
            token::Value::Other('=') => true,
            token::Value::Space(_) => false,
        ] {
            if found_equals {
                break;
            }
        }
        while get_optional_element![
            input,
            token::Value::Space(_) => (),
        ]
        .is_some()
        {}
        Ok(OptionalEquals {})
    }
}

/// When parsed, this type consumes one optional space from the token stream.
pub struct OptionalSpace;

impl<S: SetlangState> Parsable<S> for OptionalSpace {
    fn parse_impl(input: &mut vm::ExpansionInput<S>) -> sl::Result<Self> {
        get_optional_element![
            input,
            token::Value::Space(_) => (),
        ];
        Ok(OptionalSpace {})
    }
}
