//! Conditional primitives (`\iftrue`, `\ifnum`, `\ifcase`, `\else`, `\or`,
//! `\fi`).
//!
//! Conditionals are expansion commands: evaluating one consumes the
//! condition's arguments and, when the condition is false, skips unexpanded
//! tokens until the matching `\else` or `\fi`. The commands recognize each
//! other by their tags, so redefining `\fi` with `\def` hides the primitive
//! from this scanning, exactly like redefining any other command.

use setlang::prelude as sl;
use setlang::traits::*;
use setlang::*;

/// Component that keeps track of conditional branches as they expand.
///
/// The stack has one element per conditional that is currently expanding;
/// a nested conditional is further up the stack than the conditional it is
/// nested in. The stack is what lets `\else` and `\fi` detect that they
/// appear outside any conditional.
#[derive(Default)]
pub struct Component {
    branches: Vec<Branch>,
}

#[derive(Debug, Clone, Copy)]
enum BranchKind {
    // The true branch of an if conditional.
    True,
    // The false branch of an if conditional, or the default branch of a
    // switch statement.
    Else,
    // A regular case branch of a switch statement.
    Switch,
}

#[derive(Debug, Clone, Copy)]
struct Branch {
    token: token::Token,
    kind: BranchKind,
}

static IF_TAG: command::StaticTag = command::StaticTag::new();
static ELSE_TAG: command::StaticTag = command::StaticTag::new();
static OR_TAG: command::StaticTag = command::StaticTag::new();
static FI_TAG: command::StaticTag = command::StaticTag::new();

/// Tag shared by all of the if conditionals.
pub fn if_tag() -> command::Tag {
    IF_TAG.get()
}

pub fn else_tag() -> command::Tag {
    ELSE_TAG.get()
}

pub fn or_tag() -> command::Tag {
    OR_TAG.get()
}

pub fn fi_tag() -> command::Tag {
    FI_TAG.get()
}

/// Implementations of this trait are conditions that can be turned into an
/// if conditional command.
pub trait Condition<S: HasComponent<Component>>: Sized {
    /// Evaluate the condition, consuming its arguments from the stream.
    fn evaluate(input: &mut vm::ExpansionInput<S>) -> sl::Result<bool>;

    /// Build the conditional expansion command for this condition.
    fn build_if_command() -> command::BuiltIn<S> {
        command::BuiltIn::new_expansion(if_primitive_fn::<S, Self>).with_tag(if_tag())
    }
}

/// Get the `\iftrue` primitive.
pub fn get_iftrue<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    IfTrue::build_if_command()
}

struct IfTrue;

impl<S: HasComponent<Component>> Condition<S> for IfTrue {
    fn evaluate(_: &mut vm::ExpansionInput<S>) -> sl::Result<bool> {
        Ok(true)
    }
}

/// Get the `\iffalse` primitive.
pub fn get_iffalse<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    IfFalse::build_if_command()
}

struct IfFalse;

impl<S: HasComponent<Component>> Condition<S> for IfFalse {
    fn evaluate(_: &mut vm::ExpansionInput<S>) -> sl::Result<bool> {
        Ok(false)
    }
}

/// Get the `\ifnum` primitive.
pub fn get_ifnum<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    IfNum::build_if_command()
}

struct IfNum;

impl<S: HasComponent<Component>> Condition<S> for IfNum {
    fn evaluate(input: &mut vm::ExpansionInput<S>) -> sl::Result<bool> {
        let (a, ordering, b) = <(i32, parse::Ordering, i32)>::parse(input)?;
        Ok(a.cmp(&b) == ordering.0)
    }
}

/// Get the `\ifodd` primitive.
pub fn get_ifodd<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    IfOdd::build_if_command()
}

struct IfOdd;

impl<S: HasComponent<Component>> Condition<S> for IfOdd {
    fn evaluate(input: &mut vm::ExpansionInput<S>) -> sl::Result<bool> {
        let n = i32::parse(input)?;
        Ok(n % 2 != 0)
    }
}

// The true case: expansion continues with the true branch, and the branch
// stack remembers that the matching \else must skip to \fi.
fn true_case<S: HasComponent<Component>>(
    token: token::Token,
    input: &mut vm::ExpansionInput<S>,
) -> sl::Result<()> {
    input.state_mut().component_mut().branches.push(Branch {
        token,
        kind: BranchKind::True,
    });
    Ok(())
}

// The false case: skip unexpanded tokens until the matching \else or \fi.
fn false_case<S: HasComponent<Component>>(
    original_token: token::Token,
    input: &mut vm::ExpansionInput<S>,
) -> sl::Result<()> {
    let mut depth = 0;
    while let Some(token) = input.unexpanded().next()? {
        if let token::Value::CommandRef(command_ref) = token.value() {
            let tag = input.commands_map().get_tag(&command_ref);
            if tag == Some(else_tag()) && depth == 0 {
                input.state_mut().component_mut().branches.push(Branch {
                    token: original_token,
                    kind: BranchKind::Else,
                });
                return Ok(());
            }
            if tag == Some(if_tag()) {
                depth += 1;
            }
            if tag == Some(fi_tag()) {
                if depth == 0 {
                    return Ok(());
                }
                depth -= 1;
            }
        }
    }
    Err(input.vm().fatal_error(ConditionalEndOfInputError {
        token: original_token,
        skipping: "the true branch of a conditional that evaluated to false",
    }))
}

fn if_primitive_fn<S: HasComponent<Component>, C: Condition<S>>(
    token: token::Token,
    input: &mut vm::ExpansionInput<S>,
) -> sl::Result<()> {
    match C::evaluate(input)? {
        true => true_case(token, input),
        false => false_case(token, input),
    }
}

/// Get the `\ifcase` primitive.
pub fn get_ifcase<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_expansion(if_case_primitive_fn).with_tag(if_tag())
}

// \ifcase n skips n cases, where cases are delimited by \or commands.
fn if_case_primitive_fn<S: HasComponent<Component>>(
    ifcase_token: token::Token,
    input: &mut vm::ExpansionInput<S>,
) -> sl::Result<()> {
    let mut cases_to_skip = i32::parse(input)?;
    if cases_to_skip == 0 {
        input.state_mut().component_mut().branches.push(Branch {
            token: ifcase_token,
            kind: BranchKind::Switch,
        });
        return Ok(());
    }
    let mut depth = 0;
    while let Some(token) = input.unexpanded().next()? {
        if let token::Value::CommandRef(command_ref) = token.value() {
            let tag = input.commands_map().get_tag(&command_ref);
            if tag == Some(or_tag()) && depth == 0 {
                cases_to_skip -= 1;
                if cases_to_skip == 0 {
                    input.state_mut().component_mut().branches.push(Branch {
                        token: ifcase_token,
                        kind: BranchKind::Switch,
                    });
                    return Ok(());
                }
            }
            if tag == Some(else_tag()) && depth == 0 {
                input.state_mut().component_mut().branches.push(Branch {
                    token: ifcase_token,
                    kind: BranchKind::Else,
                });
                return Ok(());
            }
            if tag == Some(if_tag()) {
                depth += 1;
            }
            if tag == Some(fi_tag()) {
                if depth == 0 {
                    return Ok(());
                }
                depth -= 1;
            }
        }
    }
    Err(input.vm().fatal_error(ConditionalEndOfInputError {
        token: ifcase_token,
        skipping: "the leading cases of a switch statement",
    }))
}

/// Get the `\or` primitive.
pub fn get_or<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_expansion(or_primitive_fn).with_tag(or_tag())
}

// An \or that is reached during normal expansion ends the case that was
// being expanded: skip to the matching \fi.
fn or_primitive_fn<S: HasComponent<Component>>(
    or_token: token::Token,
    input: &mut vm::ExpansionInput<S>,
) -> sl::Result<()> {
    let branch = input.state_mut().component_mut().branches.pop();
    let is_valid = matches!(
        branch,
        Some(Branch {
            kind: BranchKind::Switch,
            ..
        })
    );
    if !is_valid {
        return Err(input.vm().fatal_error(error::SimpleTokenError::new(
            or_token,
            r"unexpected \or command: \or is only allowed inside an \ifcase case",
        )));
    }
    skip_to_fi(or_token, input, "the remaining cases of a switch statement")
}

/// Get the `\else` primitive.
pub fn get_else<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_expansion(else_primitive_fn).with_tag(else_tag())
}

// An \else reached during normal expansion ends a true branch or a switch
// case: skip to the matching \fi.
fn else_primitive_fn<S: HasComponent<Component>>(
    else_token: token::Token,
    input: &mut vm::ExpansionInput<S>,
) -> sl::Result<()> {
    let branch = input.state_mut().component_mut().branches.pop();
    let is_valid = matches!(
        branch,
        Some(Branch {
            kind: BranchKind::True | BranchKind::Switch,
            ..
        })
    );
    if !is_valid {
        return Err(input.vm().fatal_error(error::SimpleTokenError::new(
            else_token,
            r"unexpected \else command: there is no conditional branch to end",
        )));
    }
    skip_to_fi(else_token, input, "the false branch of a conditional")
}

fn skip_to_fi<S: HasComponent<Component>>(
    original_token: token::Token,
    input: &mut vm::ExpansionInput<S>,
    skipping: &'static str,
) -> sl::Result<()> {
    let mut depth = 0;
    while let Some(token) = input.unexpanded().next()? {
        if let token::Value::CommandRef(command_ref) = token.value() {
            let tag = input.commands_map().get_tag(&command_ref);
            if tag == Some(if_tag()) {
                depth += 1;
            }
            if tag == Some(fi_tag()) {
                if depth == 0 {
                    return Ok(());
                }
                depth -= 1;
            }
        }
    }
    Err(input.vm().fatal_error(ConditionalEndOfInputError {
        token: original_token,
        skipping,
    }))
}

/// Get the `\fi` primitive.
pub fn get_fi<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_expansion(fi_primitive_fn).with_tag(fi_tag())
}

fn fi_primitive_fn<S: HasComponent<Component>>(
    token: token::Token,
    input: &mut vm::ExpansionInput<S>,
) -> sl::Result<()> {
    let branch = input.state_mut().component_mut().branches.pop();
    // The branch may be a true branch (\iftrue...\fi), an else branch or a
    // switch case; all of them are ended by \fi.
    if branch.is_none() {
        return Err(input.vm().fatal_error(error::SimpleTokenError::new(
            token,
            r"unexpected \fi command: there is no conditional to end",
        )));
    }
    Ok(())
}

#[derive(Debug)]
struct ConditionalEndOfInputError {
    token: token::Token,
    skipping: &'static str,
}

impl error::SetlangError for ConditionalEndOfInputError {
    fn kind(&self) -> error::Kind {
        error::Kind::Token(self.token)
    }
    fn title(&self) -> String {
        format!(
            "unexpected end of input while skipping {}",
            self.skipping
        )
    }
    fn notes(&self) -> Vec<error::display::Note> {
        vec![r"every conditional must be ended by a \fi command".into()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers;
    use setlang_testing::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct State {
        conditional: Component,
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
        conditional: Component,
        registers: registers::Component<i32, 16>,
        testing: TestingComponent,
    }];

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("iftrue", get_iftrue()),
            ("iffalse", get_iffalse()),
            ("ifnum", get_ifnum()),
            ("ifodd", get_ifodd()),
            ("ifcase", get_ifcase()),
            ("else", get_else()),
            ("or", get_or()),
            ("fi", get_fi()),
            ("count", registers::get_count()),
        ])
    }

    test_suite![
        expansion_equality_tests(
            (iftrue_no_else, r"\iftrue a\fi", "a"),
            (iftrue_with_else, r"\iftrue a\else b\fi", "a"),
            (iffalse_no_else, r"\iffalse a\fi", ""),
            (iffalse_with_else, r"\iffalse a\else b\fi", "b"),
            (ifnum_less_than_true, r"\ifnum 3 < 4 a\else b\fi", "a"),
            (ifnum_less_than_false, r"\ifnum 4 < 3 a\else b\fi", "b"),
            (ifnum_equal_true, r"\ifnum 4 = 4 a\else b\fi", "a"),
            (ifnum_greater_than_true, r"\ifnum 5 > 4 a\else b\fi", "a"),
            (
                ifnum_reads_registers,
                r"\count 0 = 2 \ifnum \count 0 > 1 big\else small\fi",
                "big"
            ),
            (ifodd_odd, r"\ifodd 3 a\else b\fi", "a"),
            (ifodd_even, r"\ifodd 4 a\else b\fi", "b"),
            (ifodd_negative_odd, r"\ifodd -3 a\else b\fi", "a"),
            (
                nested_conditionals_in_skipped_branch,
                r"\iffalse \iftrue a\else b\fi \else c\fi",
                "c"
            ),
            (
                nested_conditionals_in_taken_branch,
                r"\iftrue \iffalse a\else b\fi \else c\fi",
                "b"
            ),
            (ifcase_zero, r"\ifcase 0 a\or b\or c\else d\fi", "a"),
            (ifcase_one, r"\ifcase 1 a\or b\or c\else d\fi", "b"),
            (ifcase_two, r"\ifcase 2 a\or b\or c\else d\fi", "c"),
            (ifcase_else, r"\ifcase 5 a\or b\or c\else d\fi", "d"),
            (ifcase_no_else_no_match, r"\ifcase 5 a\or b\fi x", "x"),
            (
                ifcase_reads_registers,
                r"\count 0 = 1 \ifcase \count 0 a\or b\fi",
                "b"
            ),
        ),
        failure_tests(
            (iffalse_end_of_input, r"\iffalse a"),
            (else_end_of_input, r"\iftrue a\else b"),
            (unmatched_else, r"\else"),
            (unmatched_fi, r"\fi"),
            (unmatched_or, r"\or"),
        ),
    ];
}
