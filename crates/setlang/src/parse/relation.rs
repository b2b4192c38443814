//! Parsing of relations (`<`, `=` and `>`).
//!
//! A relation is a character token with the other category code and one of
//! the values `<`, `=` or `>`.

use crate::prelude as sl;
use crate::token;
use crate::traits::*;
use crate::vm;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering(pub std::cmp::Ordering);

impl Default for Ordering {
    fn default() -> Self {
        Ordering(std::cmp::Ordering::Equal)
    }
}

impl<S: SetlangState> Parsable<S> for Ordering {
    fn parse_impl(input: &mut vm::ExpansionInput<S>) -> sl::Result<Self> {
        super::OptionalSpace::parse(input)?;
        let ordering_or = get_required_element![
            input,
            "a relation",
            "a relation is a token with the other category code and one of the values <, =, >",
            token::Value::Other('<') => Ordering(std::cmp::Ordering::Less),
            token::Value::Other('=') => Ordering(std::cmp::Ordering::Equal),
            token::Value::Other('>') => Ordering(std::cmp::Ordering::Greater),
        ];
        Ok(ordering_or.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::testing::*;
    use crate::token::CatCode;

    parse_success_tests![
        (less_than, r"<a", Ordering(std::cmp::Ordering::Less)),
        (equals, r"=a", Ordering(std::cmp::Ordering::Equal)),
        (greater_than, r">a", Ordering(std::cmp::Ordering::Greater)),
    ];

    #[derive(Default)]
    struct State;

    impl SetlangState for State {
        fn cat_code(&self, c: char) -> CatCode {
            if c == '<' {
                return CatCode::Letter;
            }
            CatCode::standard(c)
        }
    }

    parse_failure_tests![
        Ordering,
        State,
        (empty_input, ""),
        (letter, "a"),
        (control_sequence, r"\A"),
        (incorrect_catcode, "<"),
    ];
}
