//! The `\let` assignment primitive.

use crate::prefix;
use setlang::prelude as sl;
use setlang::traits::*;
use setlang::*;

static LET_TAG: command::StaticTag = command::StaticTag::new();

pub fn let_tag() -> command::Tag {
    LET_TAG.get()
}

/// Get the `\let` command.
pub fn get_let<S: HasComponent<prefix::Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(let_primitive_fn).with_tag(let_tag())
}

fn let_primitive_fn<S: HasComponent<prefix::Component>>(
    let_token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    let scope = input.state_mut().component_mut().read_and_reset_global();
    let Some(alias) = Option::<token::CommandRef>::parse(input)? else {
        return input.vm().error(error::SimpleTokenError::new(
            let_token,
            r"missing control sequence after \let",
        ));
    };
    // The right hand side is read without expansion: aliasing a macro must
    // capture the macro itself, not its expansion.
    let target = scan_equals_unexpanded(input)?;
    match target.value() {
        token::Value::CommandRef(command_ref) => {
            if input
                .commands_map_mut()
                .alias_control_sequence(alias, &command_ref, scope)
                .is_err()
            {
                return input.vm().error(error::SimpleTokenError::new(
                    target,
                    format!(
                        "cannot alias the control sequence {} because it is undefined",
                        command_ref.display(input.vm().cs_name_interner())
                    ),
                ));
            }
            Ok(())
        }
        _ => {
            input.commands_map_mut().alias_token(alias, target, scope);
            Ok(())
        }
    }
}

// Scan `<optional spaces> [= <one optional space>]` and return the next
// token, all without expansion.
fn scan_equals_unexpanded<S: SetlangState>(
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<token::Token> {
    let stream = input.unexpanded();
    let token = loop {
        let token = stream.next_or(LetEndOfInputError {})?;
        match token.value() {
            token::Value::Space(_) => continue,
            _ => break token,
        }
    };
    if let token::Value::Other('=') = token.value() {
        let token = stream.next_or(LetEndOfInputError {})?;
        if let token::Value::Space(_) = token.value() {
            return stream.next_or(LetEndOfInputError {});
        }
        return Ok(token);
    }
    Ok(token)
}

#[derive(Debug)]
struct LetEndOfInputError;

impl error::EndOfInputError for LetEndOfInputError {
    fn doing(&self) -> String {
        r"reading the right hand side of a \let assignment".into()
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
        prefix: prefix::Component,
        testing: TestingComponent,
    }

    impl SetlangState for State {
        fn variable_assignment_scope_hook(
            state: &mut Self,
        ) -> galley_stdext::collections::scopedmap::Scope {
            prefix::variable_assignment_scope_hook(state)
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
            ("global", prefix::get_global()),
            ("let", get_let()),
        ])
    }

    test_suite![
        expansion_equality_tests(
            (let_macro, r"\def\A{abc}\let\B\A \B", "abc"),
            (let_macro_equals, r"\def\A{abc}\let\B=\A \B", "abc"),
            (let_macro_equals_space, r"\def\A{abc}\let\B= \A \B", "abc"),
            // The alias is a snapshot: redefining the source does not
            // change the alias.
            (
                let_is_a_snapshot,
                r"\def\A{abc}\let\B\A \def\A{xyz}\B\A",
                "abcxyz"
            ),
            (let_character, r"\let\A=x \A", "x"),
            (
                let_undone_by_group_close,
                r"\def\A{a}\def\B{b}{\let\B\A \B}\B",
                "ab"
            ),
            (
                global_let_survives_unwinding,
                r"\def\A{a}\def\B{b}{\global\let\B\A \B}\B",
                "aa"
            ),
        ),
        failure_tests(
            (let_end_of_input, r"\let"),
            (let_rhs_end_of_input, r"\let\A"),
            (let_invalid_target, r"\let a=b"),
            (let_undefined_rhs, r"\let\A=\undefinedCommand"),
        ),
    ];
}
