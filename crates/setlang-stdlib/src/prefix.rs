//! The `\global`, `\long` and `\outer` prefix commands.
//!
//! A prefix command sets a flag in the [Component] and then validates that
//! the next token is a command the prefix may be attached to. The flags
//! attach to that next command only: every command that honors a prefix
//! reads the flags through one of the `read_and_reset` methods, which clear
//! them, so a flag is consumed by exactly one command.
//!
//! Variable assignments pick up the global flag through
//! [variable_assignment_scope_hook], which states using this module must
//! install as their `variable_assignment_scope_hook`.

use crate::alias;
use crate::boxes;
use crate::chardef;
use crate::def;
use crate::namespaces;
use crate::registers;
use crate::variableops;
use setlang::prelude as sl;
use setlang::traits::*;
use setlang::*;
use galley_stdext::collections::scopedmap;
use std::collections::HashSet;

/// Component for the prefix commands.
pub struct Component {
    global: bool,
    long: bool,
    outer: bool,
    /// Tags of execution commands that `\global` may be attached to.
    prefixable_with_global: HashSet<command::Tag>,
}

impl Default for Component {
    fn default() -> Self {
        Component {
            global: false,
            long: false,
            outer: false,
            prefixable_with_global: [
                variableops::variable_op_tag(),
                alias::let_tag(),
                registers::registerdef_tag(),
                chardef::chardef_tag(),
                namespaces::namespace_tag(),
                boxes::setbox_tag(),
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl Component {
    /// Read the global flag and reset all flags.
    ///
    /// For commands that only honor `\global`, like `\let`.
    pub fn read_and_reset_global(&mut self) -> scopedmap::Scope {
        let scope = match self.global {
            true => scopedmap::Scope::Global,
            false => scopedmap::Scope::Local,
        };
        self.global = false;
        self.long = false;
        self.outer = false;
        scope
    }

    /// Read and reset all three flags.
    ///
    /// For the macro definition commands, which honor all of them.
    /// Returns (scope, long, outer).
    pub fn read_and_reset_all(&mut self) -> (scopedmap::Scope, bool, bool) {
        let long = self.long;
        let outer = self.outer;
        let scope = self.read_and_reset_global();
        (scope, long, outer)
    }
}

/// Scope hook that reads the global flag from the prefix component.
///
/// States using this module must use this function as their
/// `variable_assignment_scope_hook`.
pub fn variable_assignment_scope_hook<S: HasComponent<Component>>(
    state: &mut S,
) -> scopedmap::Scope {
    let component: &mut Component = state.component_mut();
    let scope = match component.global {
        true => scopedmap::Scope::Global,
        false => scopedmap::Scope::Local,
    };
    component.global = false;
    scope
}

static GLOBAL_TAG: command::StaticTag = command::StaticTag::new();
static LONG_TAG: command::StaticTag = command::StaticTag::new();
static OUTER_TAG: command::StaticTag = command::StaticTag::new();

/// Get the `\global` command.
pub fn get_global<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(global_primitive_fn).with_tag(GLOBAL_TAG.get())
}

/// Get the `\long` command.
pub fn get_long<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(long_primitive_fn).with_tag(LONG_TAG.get())
}

/// Get the `\outer` command.
pub fn get_outer<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(outer_primitive_fn).with_tag(OUTER_TAG.get())
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Global,
    Long,
    Outer,
}

impl Kind {
    fn name(&self) -> &'static str {
        match self {
            Kind::Global => r"\global",
            Kind::Long => r"\long",
            Kind::Outer => r"\outer",
        }
    }
}

fn global_primitive_fn<S: HasComponent<Component>>(
    token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    input.state_mut().component_mut().global = true;
    validate_prefix_target(token, Kind::Global, input)
}

fn long_primitive_fn<S: HasComponent<Component>>(
    token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    input.state_mut().component_mut().long = true;
    validate_prefix_target(token, Kind::Long, input)
}

fn outer_primitive_fn<S: HasComponent<Component>>(
    token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    input.state_mut().component_mut().outer = true;
    validate_prefix_target(token, Kind::Outer, input)
}

// Check that the next token in the stream may carry the prefix just set.
//
// The target token is left in the stream; the main loop dispatches it as
// usual and the target command reads the flags.
fn validate_prefix_target<S: HasComponent<Component>>(
    prefix_token: token::Token,
    kind: Kind,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    let next_or = input.unexpanded().peek()?.copied();
    let next = match next_or {
        None => {
            return Err(input.vm().fatal_error(error::SimpleTokenError::new(
                prefix_token,
                format!("unexpected end of input after the {} prefix", kind.name()),
            )));
        }
        Some(next) => next,
    };
    let command_ref = match next.value() {
        token::Value::CommandRef(command_ref) => command_ref,
        _ => {
            reset_flags(input);
            return input.vm().error(error::SimpleTokenError::new(
                next,
                format!("character tokens cannot be prefixed with {}", kind.name()),
            ));
        }
    };
    let allowed = match input.commands_map().get_command(&command_ref) {
        // The definition commands accept every prefix.
        Some(command::Command::Execution(_, Some(tag))) if *tag == def::def_tag() => true,
        // Prefix commands chain; the last one validates the real target.
        Some(command::Command::Execution(_, Some(tag)))
            if [GLOBAL_TAG.get(), LONG_TAG.get(), OUTER_TAG.get()].contains(tag) =>
        {
            true
        }
        Some(command::Command::Execution(_, Some(tag))) => {
            matches!(kind, Kind::Global)
                && input
                    .state()
                    .component()
                    .prefixable_with_global
                    .contains(tag)
        }
        // Variable assignments accept \global through the scope hook.
        Some(command::Command::Variable(_)) => matches!(kind, Kind::Global),
        _ => false,
    };
    if !allowed {
        reset_flags(input);
        return input.vm().error(error::SimpleTokenError::new(
            next,
            format!(
                "the command {} cannot be prefixed with {}",
                command_ref.display(input.vm().cs_name_interner()),
                kind.name()
            ),
        ));
    }
    Ok(())
}

fn reset_flags<S: HasComponent<Component>>(input: &mut vm::ExecutionInput<S>) {
    let component: &mut Component = input.state_mut().component_mut();
    component.global = false;
    component.long = false;
    component.outer = false;
}

/// Get an execution command that errors if the global flag is set.
///
/// This command exists for unit testing: it verifies that commands that can
/// be prefixed with `\global` consume the flag.
pub fn get_assert_global_is_false<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    fn assert_global_fn<S: HasComponent<Component>>(
        token: token::Token,
        input: &mut vm::ExecutionInput<S>,
    ) -> sl::Result<()> {
        match input.state_mut().component_mut().global {
            true => Err(input.vm().fatal_error(error::SimpleTokenError::new(
                token,
                "assertion failed: the global flag is still set",
            ))),
            false => Ok(()),
        }
    }
    command::BuiltIn::new_execution(assert_global_fn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def;
    use crate::the;
    use crate::variableops;
    use setlang_testing::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct State {
        prefix: Component,
        testing: TestingComponent,
    }

    impl SetlangState for State {
        fn variable_assignment_scope_hook(state: &mut Self) -> scopedmap::Scope {
            variable_assignment_scope_hook(state)
        }
        fn recoverable_error_hook(
            vm: &vm::VM<Self>,
            recoverable_error: Box<error::Error>,
        ) -> Result<(), Box<error::Error>> {
            TestingComponent::recoverable_error_hook(vm, recoverable_error)
        }
    }

    vm::implement_has_component![State {
        prefix: Component,
        testing: TestingComponent,
    }];

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("global", get_global()),
            ("long", get_long()),
            ("outer", get_outer()),
            ("assertGlobalIsFalse", get_assert_global_is_false()),
            ("def", def::get_def()),
            ("advance", variableops::get_advance()),
            ("i", TestingComponent::get_integer()),
            ("the", the::get_the()),
        ])
    }

    test_suite![
        expansion_equality_tests(
            (non_global, r"\i=5{\i=8}\the\i", "5"),
            (non_global_2, r"\i=5\i=6{\i=8}\the\i", "6"),
            (non_global_3, r"\i=5{\i=6{\i=8 \the\i}\the\i}\the\i", "865"),
            (global, r"\i=5{\global\i=8}\the\i", "8"),
            (global_squared, r"\i=5{\global\global\i=8}\the\i", "8"),
            (long, r"\long\def\A{Hello}\A", "Hello"),
            (outer, r"\outer\def\A{Hello}\A", "Hello"),
            (
                many_prefixes,
                r"\long\outer\global\long\global\outer\def\A{Hello}\A",
                "Hello"
            ),
            (def_consumes_global, r"\global\def\A{Hello}\assertGlobalIsFalse", ""),
            (
                advance_consumes_global,
                r"\i=5\global\advance\i 3 \assertGlobalIsFalse\the\i",
                "8"
            ),
        ),
        failure_tests(
            (global_end_of_input, r"\global"),
            (global_with_character, r"\global a"),
            (global_with_undefined_command, r"\global \undefinedCommand"),
            (long_prefix_on_variable, r"\long\i 0"),
            (outer_prefix_on_advance, r"\outer\advance\i 0"),
        ),
    ];
}
