//! The namespace primitives (`\namespace`, `\import`, `\export`).
//!
//! Every control sequence token carries the namespace that was current when
//! it was scanned, and command lookup is namespace-qualified with a
//! fallback to the default namespace. `\namespace` changes the current
//! namespace; `\import` and `\export` copy bindings between namespaces.
//! Copies are snapshots taken at copy time, not live aliases.

use setlang::prelude as sl;
use setlang::token::NsName;
use setlang::traits::*;
use setlang::*;

static NAMESPACE_TAG: command::StaticTag = command::StaticTag::new();

pub fn namespace_tag() -> command::Tag {
    NAMESPACE_TAG.get()
}

/// Get the `\namespace` command.
///
/// `\namespace{name}` makes `name` the current namespace. The assignment
/// is scoped: it is undone when the current group ends, unless prefixed
/// with `\global`.
pub fn get_namespace<S: SetlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(namespace_fn).with_tag(namespace_tag())
}

fn namespace_fn<S: SetlangState>(
    token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    let scope = SetlangState::variable_assignment_scope_hook(input.state_mut());
    let name = parse_namespace_name(token, input)?;
    let namespace = input.ns_name_interner_mut().get_or_intern(&name);
    input.set_current_namespace(namespace, scope);
    Ok(())
}

/// Get the `\import` command.
///
/// `\import{ns}\cmd` copies the binding of `\cmd` in the namespace `ns`
/// into the current namespace. Importing a name that is unbound in the
/// source namespace is an error.
pub fn get_import<S: SetlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(import_fn)
}

fn import_fn<S: SetlangState>(
    token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    let scope = SetlangState::variable_assignment_scope_hook(input.state_mut());
    let (from, name_token, name) = parse_namespace_and_target(token, input)?;
    let to = input.vm().current_namespace();
    copy_binding(input, name_token, from, to, name, scope)
}

/// Get the `\export` command.
///
/// `\export{ns}\cmd` copies the binding of `\cmd` in the current namespace
/// into the namespace `ns`.
pub fn get_export<S: SetlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(export_fn)
}

fn export_fn<S: SetlangState>(
    token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    let scope = SetlangState::variable_assignment_scope_hook(input.state_mut());
    let (to, name_token, name) = parse_namespace_and_target(token, input)?;
    let from = input.vm().current_namespace();
    copy_binding(input, name_token, from, to, name, scope)
}

fn copy_binding<S: SetlangState>(
    input: &mut vm::ExecutionInput<S>,
    name_token: token::Token,
    from: NsName,
    to: NsName,
    name: token::CsName,
    scope: galley_stdext::collections::scopedmap::Scope,
) -> sl::Result<()> {
    if input
        .commands_map_mut()
        .import(from, to, name, scope)
        .is_err()
    {
        return Err(input.vm().fatal_error(error::SimpleTokenError::new(
            name_token,
            "cannot copy the binding: the name is not bound in the source namespace",
        )));
    }
    Ok(())
}

// Parse the `{ns}\cmd` arguments shared by \import and \export.
fn parse_namespace_and_target<S: SetlangState>(
    token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<(NsName, token::Token, token::CsName)> {
    let name = parse_namespace_name(token, input)?;
    let namespace = input.ns_name_interner_mut().get_or_intern(&name);
    let target = input
        .unexpanded()
        .next_or(NamespaceTargetEndOfInputError {})?;
    match target.value() {
        token::Value::CommandRef(token::CommandRef::ControlSequence(_, cs_name)) => {
            Ok((namespace, target, cs_name))
        }
        _ => Err(input.vm().fatal_error(error::SimpleTokenError::new(
            target,
            "expected a control sequence naming the binding to copy",
        ))),
    }
}

// Parse a namespace name written as a balanced group of character tokens.
fn parse_namespace_name<S: SetlangState>(
    command_token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<String> {
    let first = input.next_or(NamespaceNameEndOfInputError {})?;
    match first.value() {
        token::Value::BeginGroup(_) => (),
        _ => {
            return Err(input.vm().fatal_error(error::SimpleTokenError::new(
                first,
                "expected a namespace name in a balanced group",
            )));
        }
    }
    _ = command_token;
    let mut tokens = Vec::new();
    parse::finish_parsing_balanced_tokens(input.unexpanded(), &mut tokens)?;
    let mut name = String::new();
    for token in tokens {
        match token.char() {
            Some(c) => name.push(c),
            None => {
                return Err(input.vm().fatal_error(error::SimpleTokenError::new(
                    token,
                    "unexpected control sequence in a namespace name",
                )));
            }
        }
    }
    Ok(name)
}

#[derive(Debug)]
struct NamespaceNameEndOfInputError;

impl error::EndOfInputError for NamespaceNameEndOfInputError {
    fn doing(&self) -> String {
        "reading a namespace name".into()
    }
}

#[derive(Debug)]
struct NamespaceTargetEndOfInputError;

impl error::EndOfInputError for NamespaceTargetEndOfInputError {
    fn doing(&self) -> String {
        "reading the control sequence to copy between namespaces".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def;
    use crate::prefix;
    use setlang_testing::*;
    use galley_stdext::collections::scopedmap;
    use std::collections::HashMap;

    #[derive(Default)]
    struct State {
        prefix: prefix::Component,
        testing: TestingComponent,
    }

    impl SetlangState for State {
        fn variable_assignment_scope_hook(state: &mut Self) -> scopedmap::Scope {
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
            ("namespace", get_namespace()),
            ("import", get_import()),
            ("export", get_export()),
            ("global", prefix::get_global()),
        ])
    }

    test_suite![
        expansion_equality_tests(
            // Built-in commands live in the default namespace and are found
            // from any namespace through the fallback.
            (
                builtins_visible_from_namespace,
                r"\namespace{mylib}\def\A{abc}\A",
                "abc"
            ),
            (
                namespaces_isolate_definitions,
                r"\def\A{default}\namespace{mylib}\def\A{mylib}\A\namespace{}\A",
                "mylibdefault"
            ),
            (
                namespace_assignment_is_scoped,
                r"\def\A{default}{\namespace{mylib}\def\A{mylib}\A}\A",
                "mylibdefault"
            ),
            (
                global_namespace_assignment,
                r"{\global\namespace{mylib}}\def\A{mylib}\A",
                "mylib"
            ),
            (
                import_copies_binding,
                r"\namespace{mylib}\def\A{from mylib}\namespace{}\import{mylib}\A\A",
                "from mylib"
            ),
            (
                import_is_a_snapshot,
                r"\namespace{mylib}\def\A{one}\namespace{}\import{mylib}\A\namespace{mylib}\def\A{two}\namespace{}\A",
                "one"
            ),
            (
                export_copies_binding,
                r"\def\B{exported}\export{other}\B\namespace{other}\B",
                "exported"
            ),
        ),
        failure_tests(
            (import_unbound_name, r"\import{nowhere}\neverDefined"),
            (namespace_missing_group, r"\namespace X"),
            (import_invalid_target, r"\import{ns}X"),
        ),
    ];
}
