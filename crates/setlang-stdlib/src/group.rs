//! The `\begingroup` and `\endgroup` primitives.
//!
//! These open and close groups exactly like the begin-group and end-group
//! characters, except that the two kinds of delimiters may not be mixed:
//! a group opened by `\begingroup` must be closed by `\endgroup`.

use setlang::prelude as sl;
use setlang::traits::*;
use setlang::vm::GroupKind;
use setlang::*;

/// Get the `\begingroup` command.
pub fn get_begingroup<S: SetlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(begingroup_fn)
}

fn begingroup_fn<S: SetlangState>(
    _: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    input.begin_group(GroupKind::Semantic);
    Ok(())
}

/// Get the `\endgroup` command.
pub fn get_endgroup<S: SetlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(endgroup_fn)
}

fn endgroup_fn<S: SetlangState>(
    token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    match input.current_group_kind() {
        Some(GroupKind::Semantic) => {
            input.end_group(token)?;
            Ok(())
        }
        Some(_) => Err(input.vm().fatal_error(error::SimpleTokenError::new(
            token,
            r"mismatched group delimiters: this group must be ended by an end-group character",
        ))),
        None => Err(input.vm().fatal_error(error::SimpleTokenError::new(
            token,
            r"too many closing groups: there is no group for this \endgroup to end",
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers;
    use crate::the;
    use setlang_testing::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct State {
        registers: registers::Component<i32, 16>,
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
        registers: registers::Component<i32, 16>,
        testing: TestingComponent,
    }];

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("begingroup", get_begingroup()),
            ("endgroup", get_endgroup()),
            ("count", registers::get_count()),
            ("the", the::get_the()),
        ])
    }

    test_suite![
        expansion_equality_tests(
            (
                assignment_undone_at_endgroup,
                r"\begingroup\count 0=1\endgroup \the\count 0",
                "0"
            ),
            (
                nested_semantic_groups,
                r"\count 0=5\begingroup\count 0=6\begingroup\count 0=7\endgroup \the\count 0\endgroup \the\count 0",
                "65"
            ),
        ),
        failure_tests(
            (endgroup_without_begingroup, r"\endgroup"),
            (mixed_delimiters_1, r"\begingroup}"),
            (mixed_delimiters_2, r"{\endgroup"),
        ),
    ];
}
