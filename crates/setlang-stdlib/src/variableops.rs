//! Arithmetic operations on variables (`\advance`, `\multiply`, `\divide`).
//!
//! All three operations are checked: a result that leaves the legal range
//! of the variable's type, including division by zero, raises the
//! arithmetic overflow error and leaves the variable unchanged.

use setlang::prelude as sl;
use setlang::traits::*;
use setlang::variable::SupportedType;
use setlang::variable::TypedVariable;
use setlang::*;
use galley_stdext::collections::scopedmap;

/// Get the `\advance` command.
pub fn get_advance<S: SetlangState>() -> command::BuiltIn<S> {
    get_command::<S, AdvanceOp>()
}

/// Get the `\multiply` command.
pub fn get_multiply<S: SetlangState>() -> command::BuiltIn<S> {
    get_command::<S, MultiplyOp>()
}

/// Get the `\divide` command.
pub fn get_divide<S: SetlangState>() -> command::BuiltIn<S> {
    get_command::<S, DivideOp>()
}

fn get_command<S: SetlangState, O: Op>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(variable_op_fn::<S, O>).with_tag(variable_op_tag())
}

static VARIABLE_OP_TAG: command::StaticTag = command::StaticTag::new();

/// Tag shared by the arithmetic commands.
pub fn variable_op_tag() -> command::Tag {
    VARIABLE_OP_TAG.get()
}

/// Numeric types the arithmetic commands operate on.
trait Number: Sized + Default + SupportedType + Copy + std::fmt::Display {
    fn checked_add(lhs: Self, rhs: Self) -> Option<Self>;
    fn checked_mul(lhs: Self, rhs: i32) -> Option<Self>;
    fn checked_div(lhs: Self, rhs: i32) -> Option<Self>;
}

impl Number for i32 {
    fn checked_add(lhs: Self, rhs: Self) -> Option<Self> {
        lhs.checked_add(rhs)
    }
    fn checked_mul(lhs: Self, rhs: i32) -> Option<Self> {
        lhs.checked_mul(rhs)
    }
    fn checked_div(lhs: Self, rhs: i32) -> Option<Self> {
        lhs.checked_div(rhs)
    }
}

impl Number for galley_core::Scaled {
    fn checked_add(lhs: Self, rhs: Self) -> Option<Self> {
        lhs.checked_add(rhs).ok()
    }
    fn checked_mul(lhs: Self, rhs: i32) -> Option<Self> {
        lhs.checked_mul(rhs).ok()
    }
    fn checked_div(lhs: Self, rhs: i32) -> Option<Self> {
        lhs.checked_div(rhs).ok()
    }
}

impl Number for galley_core::Glue {
    fn checked_add(lhs: Self, rhs: Self) -> Option<Self> {
        lhs.checked_add(rhs)
    }
    fn checked_mul(lhs: Self, rhs: i32) -> Option<Self> {
        lhs.checked_mul(rhs)
    }
    fn checked_div(lhs: Self, rhs: i32) -> Option<Self> {
        lhs.checked_div(rhs)
    }
}

trait Op {
    /// Whether the right hand side has the same type as the variable, as in
    /// `\advance`; otherwise it is an integer, as in `\multiply`.
    const RHS_SAME: bool;
    fn apply<N: Number>(lhs: N, rhs_i: i32, rhs_n: N) -> Option<N>;
    fn describe() -> &'static str;

    fn apply_to_variable<S: SetlangState, N: Number + Parsable<S>>(
        token: token::Token,
        variable: TypedVariable<S, N>,
        input: &mut vm::ExecutionInput<S>,
        scope: scopedmap::Scope,
    ) -> sl::Result<()> {
        let lhs = *variable.get(input.state());
        let (rhs_i, rhs_n) = if Self::RHS_SAME {
            (0_i32, N::parse(input)?)
        } else {
            (i32::parse(input)?, Default::default())
        };
        let result = match Self::apply(lhs, rhs_i, rhs_n) {
            Some(result) => result,
            None => {
                // The variable is left unchanged.
                return input.vm().error(ArithmeticOverflowError {
                    token,
                    op: Self::describe(),
                    lhs: format!["{lhs}"],
                    rhs: if Self::RHS_SAME {
                        format!["{rhs_n}"]
                    } else {
                        format!["{rhs_i}"]
                    },
                });
            }
        };
        variable.set(input, scope, result);
        Ok(())
    }
}

struct AdvanceOp;

impl Op for AdvanceOp {
    const RHS_SAME: bool = true;
    fn apply<N: Number>(lhs: N, _: i32, rhs_n: N) -> Option<N> {
        N::checked_add(lhs, rhs_n)
    }
    fn describe() -> &'static str {
        "addition"
    }
}

struct MultiplyOp;

impl Op for MultiplyOp {
    const RHS_SAME: bool = false;
    fn apply<N: Number>(lhs: N, rhs_i: i32, _: N) -> Option<N> {
        N::checked_mul(lhs, rhs_i)
    }
    fn describe() -> &'static str {
        "multiplication"
    }
}

struct DivideOp;

impl Op for DivideOp {
    const RHS_SAME: bool = false;
    fn apply<N: Number>(lhs: N, rhs_i: i32, _: N) -> Option<N> {
        N::checked_div(lhs, rhs_i)
    }
    fn describe() -> &'static str {
        "division"
    }
}

/// The error raised when a register operation overflows or divides by zero.
#[derive(Debug)]
struct ArithmeticOverflowError {
    token: token::Token,
    op: &'static str,
    lhs: String,
    rhs: String,
}

impl error::SetlangError for ArithmeticOverflowError {
    fn kind(&self) -> error::Kind {
        error::Kind::Token(self.token)
    }
    fn title(&self) -> String {
        "arithmetic overflow".into()
    }
    fn notes(&self) -> Vec<error::display::Note> {
        vec![
            format!["the {} of {} and {} is out of range", self.op, self.lhs, self.rhs].into(),
            "the variable has been left unchanged".into(),
        ]
    }
}

fn variable_op_fn<S: SetlangState, O: Op>(
    op_token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    let scope = SetlangState::variable_assignment_scope_hook(input.state_mut());
    let token = input.next_or(ArithmeticVariableEndOfInput {})?;
    match token.value() {
        token::Value::CommandRef(command_ref) => {
            match input.commands_map().get_command(&command_ref) {
                None => input.vm().error(
                    parse::Error::new("a variable", Some(token), "")
                        .with_got_override("got an undefined control sequence")
                        .with_annotation_override("undefined control sequence"),
                ),
                Some(command::Command::Variable(cmd)) => {
                    let variable = cmd.clone().resolve(token, input.as_mut())?;
                    parse::OptionalBy::parse(input)?;
                    match variable {
                        variable::Variable::Int(variable) => {
                            O::apply_to_variable(op_token, variable, input, scope)
                        }
                        variable::Variable::Dimen(variable) => {
                            O::apply_to_variable(op_token, variable, input, scope)
                        }
                        variable::Variable::Glue(variable) => {
                            O::apply_to_variable(op_token, variable, input, scope)
                        }
                        variable::Variable::CatCode(_) | variable::Variable::TokenList(_) => {
                            input.vm().error(
                                parse::Error::new("an arithmetic variable", Some(token), "")
                                    .with_got_override("got a non-arithmetic variable"),
                            )
                        }
                    }
                }
                Some(cmd) => input.vm().error(
                    parse::Error::new("a variable", Some(token), "")
                        .with_got_override("got a non-variable command")
                        .with_annotation_override(format!["control sequence referencing {cmd}"]),
                ),
            }
        }
        _ => input.vm().error(
            parse::Error::new("a variable", Some(token), "")
                .with_got_override("got a character token"),
        ),
    }
}

#[derive(Debug)]
struct ArithmeticVariableEndOfInput;

impl error::EndOfInputError for ArithmeticVariableEndOfInput {
    fn doing(&self) -> String {
        "parsing an arithmetic variable".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes;
    use crate::prefix;
    use crate::registers;
    use crate::the;
    use setlang_testing::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct State {
        catcode: codes::Component,
        prefix: prefix::Component,
        registers: registers::Component<i32, 256>,
        registers_dimen: registers::Component<galley_core::Scaled, 256>,
        registers_skip: registers::Component<galley_core::Glue, 256>,
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
        catcode: codes::Component,
        prefix: prefix::Component,
        registers: registers::Component<i32, 256>,
        registers_dimen: registers::Component<galley_core::Scaled, 256>,
        registers_skip: registers::Component<galley_core::Glue, 256>,
        testing: TestingComponent,
    }];

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("advance", get_advance()),
            ("multiply", get_multiply()),
            ("divide", get_divide()),
            //
            ("catcode", codes::get_catcode()),
            ("count", registers::get_count()),
            ("dimen", registers::get_dimen()),
            ("skip", registers::get_skip()),
            ("global", prefix::get_global()),
            ("the", the::get_the()),
        ])
    }

    macro_rules! arithmetic_tests {
        ( $register: expr, $( ($name: ident, $op: expr, $lhs: expr, $rhs: expr, $expected: expr) ),* $(,)? ) => {
            test_suite![
                expansion_equality_tests(
                    $(
                        (
                            $name,
                            format![r"{} 1 {} {} {} 1 {} \the{} 1", $register, $lhs, $op, $register, $rhs, $register],
                            $expected
                        ),
                    )*
                ),
            ];
        };
    }

    arithmetic_tests![
        r"\count",
        (advance_base_case, r"\advance", "1", "2", "3"),
        (advance_base_case_with_by, r"\advance", "1", "by 2", "3"),
        (advance_negative_summand, r"\advance", "10", "-2", "8"),
        (multiply_base_case, r"\multiply", "5", "4", "20"),
        (multiply_base_case_with_by, r"\multiply", "5", "by 4", "20"),
        (multiply_pos_neg, r"\multiply", "-5", "4", "-20"),
        (multiply_neg_pos, r"\multiply", "5", "-4", "-20"),
        (multiply_neg_neg, r"\multiply", "-5", "-4", "20"),
        (divide_base_case, r"\divide", "9", "4", "2"),
        (divide_with_by, r"\divide", "9", "by 4", "2"),
        (divide_pos_neg, r"\divide", "-9", "4", "-2"),
        (divide_neg_pos, r"\divide", "9", "-4", "-2"),
        (divide_neg_neg, r"\divide", "-9", "-4", "2"),
        (divide_exact, r"\divide", "100", "10", "10"),
    ];

    arithmetic_tests![
        r"\dimen",
        (advance_dimen_1, r"\advance", "1pt", "2pt", "3.0pt"),
        (advance_dimen_2, r"\advance", "0.025pt", "0.5pt", "0.525pt"),
        (mul_dimen_1, r"\multiply", "10pt", "2", "20.0pt"),
        (div_dimen_1, r"\divide", "10pt", "2", "5.0pt"),
    ];

    arithmetic_tests![
        r"\skip",
        (
            advance_glue_1,
            r"\advance",
            "1pt plus 2pt minus 3pt",
            "60pt plus 50pt minus 40pt",
            "61.0pt plus 52.0pt minus 43.0pt"
        ),
        (
            advance_glue_infinite_order_wins,
            r"\advance",
            "1pt plus 2fill minus 3fil",
            "60pt plus 50pt minus 40filll",
            "61.0pt plus 2.0fill minus 40.0filll"
        ),
        (
            mul_glue_1,
            r"\multiply",
            "1pt plus 2pt minus 1.25pt",
            "2",
            "2.0pt plus 4.0pt minus 2.5pt"
        ),
        (
            div_glue_1,
            r"\divide",
            "10pt plus 20pt minus 3pt",
            "2",
            "5.0pt plus 10.0pt minus 1.5pt"
        ),
    ];

    test_suite![
        expansion_equality_tests(
            (
                advance_x_by_x,
                r"\count 1 200 \advance \count 1 by \count 1 a\the\count 1",
                r"a400"
            ),
            (
                global_advance,
                r"\count 1 5{\global\advance\count 1 8}\the\count 1",
                "13"
            ),
            (
                local_advance,
                r"\count 1 5{\advance\count 1 8}\the\count 1",
                "5"
            ),
        ),
        recoverable_failure_tests(
            (
                advance_incorrect_keyword,
                r"\count 1 1\advance\count 1 fy 2 \the \count 1",
                "fy 2 1",
            ),
            // The index and the by keyword are consumed before the variable
            // is found to be non-arithmetic.
            (
                advance_catcode_not_supported,
                r"\advance\catcode 100 by 2",
                " 2",
            ),
            (
                advance_overflow,
                r"\count 1 2147483647 \advance\count 1 by 1 \the\count 1",
                "2147483647",
            ),
            (
                multiply_overflow,
                r"\count 1 100000 \multiply\count 1 by 100000 \the \count 1",
                "100000"
            ),
            (
                divide_by_zero,
                r"\count 1 20 \divide\count 1 by 0 \the\count 1",
                "20"
            ),
        ),
    ];
}
