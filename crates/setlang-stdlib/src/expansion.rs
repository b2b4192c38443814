//! Commands that alter the expansion process (`\noexpand`,
//! `\expandafter`, `\relax`).

use setlang::prelude as sl;
use setlang::traits::*;
use setlang::*;

static NOEXPAND_TAG: command::StaticTag = command::StaticTag::new();

/// Get the `\noexpand` command.
pub fn get_noexpand<S>() -> command::BuiltIn<S> {
    command::BuiltIn::new_expansion(noexpand_fn).with_tag(NOEXPAND_TAG.get())
}

fn noexpand_fn<S>(_: token::Token, _: &mut vm::ExpansionInput<S>) -> sl::Result<()> {
    panic!(
        "the \\noexpand expansion function is never invoked directly; \
         the primitive operates through the expansion override hook, \
         which must be installed on the state's SetlangState implementation"
    )
}

/// The expansion override hook implementing `\noexpand`.
///
/// States that include the `\noexpand` primitive must install this function
/// as their `expansion_override_hook`.
#[inline]
pub fn noexpand_hook<S: SetlangState>(
    token: token::Token,
    input: &mut vm::ExpansionInput<S>,
    tag: Option<command::Tag>,
) -> sl::Result<Option<token::Token>> {
    // Fast path: this is not the \noexpand command.
    if tag != Some(NOEXPAND_TAG.get()) {
        return Ok(None);
    }
    noexpand_hook_finish(token, input)
}

fn noexpand_hook_finish<S: SetlangState>(
    token: token::Token,
    input: &mut vm::ExpansionInput<S>,
) -> sl::Result<Option<token::Token>> {
    match input.unexpanded().next()? {
        None => Err(input.vm().fatal_error(error::SimpleTokenError::new(
            token,
            r"unexpected end of input: \noexpand must be followed by one token",
        ))),
        Some(token) => Ok(Some(token)),
    }
}

/// Get the `\expandafter` command.
pub fn get_expandafter<S: SetlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_expansion(expandafter_fn)
}

// \expandafter reads one token, expands the token after it once, and puts
// the first token back in front of the result.
fn expandafter_fn<S: SetlangState>(
    expandafter_token: token::Token,
    input: &mut vm::ExpansionInput<S>,
) -> sl::Result<()> {
    let next = match input.unexpanded().next()? {
        None => {
            return Err(missing_token_error(input, expandafter_token, 0));
        }
        Some(next) => next,
    };
    if input.unexpanded().peek()?.is_none() {
        return Err(missing_token_error(input, expandafter_token, 1));
    }
    input.expand_once()?;
    input.expansions_mut().push(next);
    Ok(())
}

fn missing_token_error<S: SetlangState>(
    input: &vm::ExpansionInput<S>,
    expandafter_token: token::Token,
    num_found: usize,
) -> Box<error::Error> {
    input.vm().fatal_error(error::SimpleTokenError::new(
        expandafter_token,
        format!(
            "unexpected end of input: \\expandafter must be followed by 2 tokens, found {num_found}"
        ),
    ))
}

/// Get the `\relax` command.
pub fn get_relax<S>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(relax_fn)
}

// Public to the crate so that \csname can bind undefined names to \relax.
pub(crate) fn relax_fn<S>(
    _: token::Token,
    _: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def;
    use crate::prefix;
    use setlang_testing::*;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct State {
        prefix: prefix::Component,
        testing: TestingComponent,
    }

    impl SetlangState for State {
        fn expansion_override_hook(
            token: token::Token,
            input: &mut vm::ExpansionInput<Self>,
            tag: Option<command::Tag>,
        ) -> sl::Result<Option<token::Token>> {
            noexpand_hook(token, input, tag)
        }
        fn recoverable_error_hook(
            vm: &vm::VM<Self>,
            recoverable_error: Box<error::Error>,
        ) -> Result<(), Box<error::Error>> {
            TestingComponent::recoverable_error_hook(vm, recoverable_error)
        }
    }

    vm::implement_has_component![State {
        prefix: prefix::Component,
        testing: TestingComponent,
    }];

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("def", def::get_def()),
            ("noexpand", get_noexpand()),
            ("relax", get_relax()),
            ("integer", TestingComponent::get_integer()),
            ("xa", get_expandafter()),
        ])
    }

    test_suite![
        options(
            TestOption::BuiltInCommands(built_in_commands),
            TestOption::AllowUndefinedCommands(true),
        ),
        expansion_equality_tests(
            (noexpand_simple_case, r"\def\a{Hello}\noexpand\a", r"\a"),
            (
                noexpand_only_lasts_once,
                r"\def\A{\B}\def\B{Hello}\xa\noexpand\A",
                r"\B",
            ),
            (relax_does_nothing, r"a\relax b", "ab"),
            (
                expandafter_reorders_expansion,
                r"\def\a#1\b{Hello '#1'}\def\b{World}\xa\a\b\b",
                "Hello 'World'"
            ),
            (
                expandafter_with_noexpand,
                r"\def\a#1\b{Hello '#1'}\def\b{World}\xa\a\noexpand\b\b",
                "Hello ''World"
            ),
            (
                expandafter_chains,
                // \c is expanded first, then \b, then \a reads both
                // expansions as its delimited argument.
                r"\def\a#1\end{[#1]}\def\b{B}\def\c{C\end}\xa\xa\xa\a\xa\b\c",
                "[BC]"
            ),
        ),
        failure_tests(
            (noexpand_end_of_input, r"\noexpand"),
            (expandafter_missing_1st_token, r"\xa"),
            (expandafter_missing_2nd_token, r"\xa\relax"),
        ),
    ];
}
