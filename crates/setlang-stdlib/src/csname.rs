//! The `\csname` and `\endcsname` primitives.

use crate::expansion;
use setlang::prelude as sl;
use setlang::traits::*;
use setlang::*;
use galley_stdext::collections::scopedmap;

static ENDCSNAME_TAG: command::StaticTag = command::StaticTag::new();

pub fn endcsname_tag() -> command::Tag {
    ENDCSNAME_TAG.get()
}

/// Get the `\csname` command.
pub fn get_csname<S: SetlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_expansion(csname_fn)
}

/// Get the `\endcsname` command.
pub fn get_endcsname<S: SetlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(endcsname_fn).with_tag(endcsname_tag())
}

// \csname expands tokens until the matching \endcsname and interns the
// resulting characters as a control sequence name. If the name is unbound
// it is locally bound to \relax, so that the new control sequence can be
// safely passed to \ifx-style tests and to \def.
fn csname_fn<S: SetlangState>(
    csname_token: token::Token,
    input: &mut vm::ExpansionInput<S>,
) -> sl::Result<()> {
    let mut name = String::new();
    loop {
        let token = input.next_or(CsNameEndOfInputError {})?;
        match token.value() {
            token::Value::CommandRef(command_ref) => {
                let tag = input.commands_map().get_tag(&command_ref);
                if tag == Some(endcsname_tag()) {
                    break;
                }
                return Err(input.vm().fatal_error(error::SimpleTokenError::new(
                    token,
                    r"unexpected unexpandable command while reading a \csname name",
                )));
            }
            _ => name.push(token.char().expect("non-command tokens have a character")),
        }
    }
    let namespace = input.vm().current_namespace();
    let cs_name = input.cs_name_interner_mut().get_or_intern(&name);
    let command_ref = token::CommandRef::ControlSequence(namespace, cs_name);
    if input.commands_map().get_command(&command_ref).is_none() {
        input.commands_map_mut().insert(
            command_ref,
            command::Command::Execution(expansion::relax_fn, None),
            scopedmap::Scope::Local,
        );
    }
    let token = token::Token::new_control_sequence(namespace, cs_name, csname_token.trace_key());
    input.expansions_mut().push(token);
    Ok(())
}

// \endcsname reached during execution has no matching \csname.
fn endcsname_fn<S: SetlangState>(
    token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    Err(input.vm().fatal_error(error::SimpleTokenError::new(
        token,
        r"unexpected \endcsname command with no matching \csname",
    )))
}

#[derive(Debug)]
struct CsNameEndOfInputError;

impl error::EndOfInputError for CsNameEndOfInputError {
    fn doing(&self) -> String {
        r"reading the name of a \csname control sequence".into()
    }
    fn notes(&self) -> Vec<error::display::Note> {
        vec![r"every \csname must be terminated by an \endcsname".into()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def;
    use crate::prefix;
    use setlang_testing::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct State {
        prefix: prefix::Component,
        testing: TestingComponent,
    }

    impl SetlangState for State {
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
            ("csname", get_csname()),
            ("endcsname", get_endcsname()),
            ("def", def::get_def()),
            ("xa", crate::expansion::get_expandafter()),
        ])
    }

    test_suite![
        expansion_equality_tests(
            (
                csname_resolves_defined_macro,
                r"\def\hello{Hi}\csname hello\endcsname",
                "Hi"
            ),
            (
                csname_undefined_name_is_relax,
                r"\csname nothing\endcsname done",
                "done"
            ),
            (
                csname_expands_name_tokens,
                r"\def\hello{Hi}\def\name{hello}\csname \name\endcsname",
                "Hi"
            ),
            (
                csname_with_def,
                r"\xa\def\csname my cs\endcsname{Hi}\csname my cs\endcsname",
                "Hi"
            ),
        ),
        failure_tests(
            (csname_end_of_input, r"\csname abc"),
            (csname_with_unexpandable_command, r"\csname a\def\endcsname"),
            (endcsname_alone, r"\endcsname"),
        ),
    ];
}
