//! The `\chardef` primitive.

use setlang::prelude as sl;
use setlang::traits::*;
use setlang::*;

static CHARDEF_TAG: command::StaticTag = command::StaticTag::new();

pub fn chardef_tag() -> command::Tag {
    CHARDEF_TAG.get()
}

/// Get the `\chardef` command.
pub fn get_chardef<S: SetlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(chardef_primitive_fn).with_tag(chardef_tag())
}

fn chardef_primitive_fn<S: SetlangState>(
    _: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    let scope = SetlangState::variable_assignment_scope_hook(input.state_mut());
    let (cmd_ref_or, _, c) =
        <(Option<token::CommandRef>, parse::OptionalEquals, char)>::parse(input)?;
    if let Some(cmd_ref) = cmd_ref_or {
        input
            .commands_map_mut()
            .insert(cmd_ref, command::Command::Character(c), scope);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::the;
    use setlang_testing::*;
    use std::collections::HashMap;

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("chardef", get_chardef()),
            ("the", the::get_the()),
            ("i", TestingComponent::get_integer()),
        ])
    }

    test_suite![
        expansion_equality_tests(
            (basic_case, r"\chardef\Hello = `\+ \Hello", "+"),
            (
                basic_case_with_the,
                r"\chardef\Hello = 123 \the\Hello",
                "123"
            ),
            (
                parsable_as_number,
                r"\chardef\Hello = 13 \i=\Hello x\the\i",
                "x13"
            ),
            (
                parsable_as_number_negative,
                r"\chardef\Hello = 13 \i=-\Hello x\the\i",
                "x-13"
            ),
        ),
    ];
}
