//! The `\endlinechar` parameter.

use setlang::traits::*;
use setlang::*;

pub struct Component {
    end_line_char_raw: i32,
}

impl Default for Component {
    fn default() -> Self {
        Self {
            end_line_char_raw: '\r' as i32,
        }
    }
}

/// Get the `\endlinechar` command.
pub fn get_endlinechar<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    variable::Command::new_singleton(
        |state: &S, _: variable::Index| -> &i32 { &state.component().end_line_char_raw },
        |state: &mut S, _: variable::Index| -> &mut i32 {
            &mut state.component_mut().end_line_char_raw
        },
    )
    .into()
}

/// The current end of line character, or [None] if it is out of range.
///
/// States using this module install this function as their `end_line_char`
/// hook. Setting the parameter to a negative value (or any value above 127)
/// makes line endings vanish entirely.
#[inline]
pub fn end_line_char<S: HasComponent<Component>>(state: &S) -> Option<char> {
    let raw = state.component().end_line_char_raw;
    if (0..128).contains(&raw) {
        Some(char::from_u32(raw as u32).unwrap())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def;
    use setlang_testing::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct State {
        end_line_char: Component,
        testing: TestingComponent,
    }

    impl SetlangState for State {
        fn end_line_char(&self) -> Option<char> {
            end_line_char(self)
        }
        fn recoverable_error_hook(
            vm: &vm::VM<Self>,
            recoverable_error: Box<error::Error>,
        ) -> Result<(), Box<error::Error>> {
            TestingComponent::recoverable_error_hook(vm, recoverable_error)
        }
    }

    vm::implement_has_component![State {
        end_line_char: Component,
        testing: TestingComponent,
    }];

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("def", def::get_def()),
            ("endlinechar", get_endlinechar()),
        ])
    }

    test_suite![
        options(
            TestOption::BuiltInCommands(built_in_commands),
            TestOption::AllowUndefinedCommands(true),
        ),
        expansion_equality_tests(
            // With no end of line character, line endings vanish entirely:
            // no space tokens and no paragraph breaks.
            (
                end_line_char_disabled,
                "\\endlinechar=-1 Hello\nWorld\n\nMundo\n",
                "HelloWorldMundo"
            ),
            (
                end_line_char_default,
                "Hello\nWorld\n\nMundo",
                "Hello World\\par Mundo"
            ),
        ),
    ];
}
