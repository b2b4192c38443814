use crate::prelude as sl;
use crate::token;
use crate::traits::*;
use crate::vm;

/// Consumes the provided keyword from the input stream if it is present.
///
/// Keyword matching is case-insensitive and the keyword's characters may
/// appear with either the letter or other category code.
/// Returns whether the keyword was consumed; on a partial match nothing is
/// consumed.
pub fn parse_keyword<S: SetlangState>(
    input: &mut vm::ExpansionInput<S>,
    keyword: &str,
) -> sl::Result<bool> {
    debug_assert!(keyword.is_ascii());
    let mut matched = Vec::with_capacity(keyword.len());
    for keyword_c in keyword.chars() {
        let token = match input.next()? {
            None => {
                return unwind(input, matched);
            }
            Some(token) => token,
        };
        let matches = match token.value() {
            token::Value::Letter(c) | token::Value::Other(c) => {
                c.eq_ignore_ascii_case(&keyword_c)
            }
            _ => false,
        };
        if !matches {
            input.back(token);
            return unwind(input, matched);
        }
        matched.push(token);
    }
    Ok(true)
}

fn unwind<S: SetlangState>(
    input: &mut vm::ExpansionInput<S>,
    matched: Vec<token::Token>,
) -> sl::Result<bool> {
    for token in matched.into_iter().rev() {
        input.back(token);
    }
    Ok(false)
}

/// When parsed, this type consumes an optional `by` keyword from the input
/// stream.
pub struct OptionalBy;

impl<S: SetlangState> Parsable<S> for OptionalBy {
    fn parse_impl(input: &mut vm::ExpansionInput<S>) -> sl::Result<Self> {
        super::OptionalSpace::parse(input)?;
        parse_keyword(input, "by")?;
        Ok(OptionalBy {})
    }
}

/// When parsed, this type consumes a required `to` keyword from the input
/// stream.
pub struct To;

impl<S: SetlangState> Parsable<S> for To {
    fn parse_impl(input: &mut vm::ExpansionInput<S>) -> sl::Result<Self> {
        super::OptionalSpace::parse(input)?;
        if !parse_keyword(input, "to")? {
            let got = input.peek()?.copied();
            input.vm().error(super::Error::new(
                "the `to` keyword",
                got,
                "the `to` keyword consists of a t or T token, then an o or O token",
            ))?;
        }
        Ok(To {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct State;
    impl SetlangState for State {}

    fn run(source: &str, keyword: &str) -> (bool, Option<char>) {
        let mut vm = vm::VM::<State>::new_with_built_in_commands(Default::default());
        vm.push_source("test.tex", source).unwrap();
        let input = vm::ExpansionInput::new(&mut vm);
        let matched = parse_keyword(input, keyword).unwrap();
        let next = input.next().unwrap().and_then(|t| t.char());
        (matched, next)
    }

    #[test]
    fn full_match() {
        assert_eq!(run("by 3", "by"), (true, Some(' ')));
    }

    #[test]
    fn case_insensitive_match() {
        assert_eq!(run("By3", "by"), (true, Some('3')));
    }

    #[test]
    fn partial_match_consumes_nothing() {
        assert_eq!(run("be", "by"), (false, Some('b')));
    }

    #[test]
    fn no_match() {
        assert_eq!(run("3", "by"), (false, Some('3')));
    }
}
