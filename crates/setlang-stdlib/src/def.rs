//! Primitives for creating user defined macros (`\def` and friends).

use crate::prefix;
use setlang::prelude as sl;
use setlang::texmacro;
use setlang::traits::*;
use setlang::*;
use galley_stdext::collections::scopedmap;

/// Get the `\def` command.
pub fn get_def<S: HasComponent<prefix::Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(def_primitive_fn).with_tag(def_tag())
}

/// Get the `\gdef` command.
pub fn get_gdef<S: HasComponent<prefix::Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(gdef_primitive_fn).with_tag(def_tag())
}

/// Get the `\edef` command.
pub fn get_edef<S: HasComponent<prefix::Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(edef_primitive_fn).with_tag(def_tag())
}

/// Get the `\xdef` command.
pub fn get_xdef<S: HasComponent<prefix::Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(xdef_primitive_fn).with_tag(def_tag())
}

static DEF_TAG: command::StaticTag = command::StaticTag::new();

/// Tag shared by the four definition commands.
///
/// The prefix commands use this tag to recognize definitions, which accept
/// all three prefixes.
pub fn def_tag() -> command::Tag {
    DEF_TAG.get()
}

fn def_primitive_fn<S: HasComponent<prefix::Component>>(
    def_token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    parse_and_set_macro(def_token, input, false, false)
}

fn gdef_primitive_fn<S: HasComponent<prefix::Component>>(
    def_token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    parse_and_set_macro(def_token, input, true, false)
}

fn edef_primitive_fn<S: HasComponent<prefix::Component>>(
    def_token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    parse_and_set_macro(def_token, input, false, true)
}

fn xdef_primitive_fn<S: HasComponent<prefix::Component>>(
    def_token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    parse_and_set_macro(def_token, input, true, true)
}

fn parse_and_set_macro<S: HasComponent<prefix::Component>>(
    def_token: token::Token,
    input: &mut vm::ExecutionInput<S>,
    set_globally_override: bool,
    expand_replacement: bool,
) -> sl::Result<()> {
    let (mut scope, long, outer) = input.state_mut().component_mut().read_and_reset_all();
    if set_globally_override {
        scope = scopedmap::Scope::Global;
    }
    let Some(name) = Option::<token::CommandRef>::parse(input)? else {
        return input.vm().error(error::SimpleTokenError::new(
            def_token,
            "missing control sequence in a macro definition",
        ));
    };
    let (prefix, parameters, replacement_end_token) =
        texmacro::parse_prefix_and_parameters(input.unexpanded())?;
    let replacements = if expand_replacement {
        texmacro::parse_replacement_text(
            input.expansion_input(),
            replacement_end_token,
            parameters.len(),
        )?
    } else {
        texmacro::parse_replacement_text(
            input.unexpanded(),
            replacement_end_token,
            parameters.len(),
        )?
    };
    let mut user_defined_macro = texmacro::Macro::new(prefix, parameters, replacements);
    if long {
        user_defined_macro = user_defined_macro.with_long();
    }
    if outer {
        user_defined_macro = user_defined_macro.with_outer();
    }
    input
        .commands_map_mut()
        .insert_macro(name, user_defined_macro, scope);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::the;
    use setlang_testing::*;
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
            ("def", get_def()),
            ("gdef", get_gdef()),
            ("edef", get_edef()),
            ("xdef", get_xdef()),
            ("global", prefix::get_global()),
            ("long", prefix::get_long()),
            ("outer", prefix::get_outer()),
            ("assertGlobalIsFalse", prefix::get_assert_global_is_false()),
            ("i", TestingComponent::get_integer()),
            ("the", the::get_the()),
        ])
    }

    test_suite![
        options(
            TestOption::BuiltInCommands(built_in_commands),
            TestOption::AllowUndefinedCommands(true),
        ),
        expansion_equality_tests(
            (def_parsed_successfully, r"\def\A{abc}", ""),
            (output_is_correct, r"\def\A{abc}\A", "abc"),
            (output_twice, r"\def\A{abc}\A\A", "abcabc"),
            (parse_one_parameter, r"\def\A#1{a-#1-b}", ""),
            (one_undelimited_parameter, r"\def\A#1{a-#1-b}\A1", "a-1-b"),
            (
                one_undelimited_parameter_multiple_times,
                r"\def\A#1{#1 #1 #1}\A1",
                "1 1 1"
            ),
            (
                one_undelimited_parameter_multiple_tokens,
                r"\def\A#1{a-#1-b}\A{123}",
                "a-123-b"
            ),
            (two_undelimited_parameters, r"\def\A#1#2{#2-#1}\A56", "6-5"),
            (
                two_undelimited_parameters_multiple_token_inputs,
                r"\def\A#1#2{#2-#1}\A{abc}{xyz}",
                "xyz-abc"
            ),
            (consume_prefix_correctly, r"\def\A fgh{567}\A fghi", "567i"),
            (
                one_undelimited_parameter_with_prefix,
                r"\def\A abc#1{y#1z}\A abcdefg",
                "ydzefg"
            ),
            (
                one_delimited_parameter,
                r"\def\A #1xxx{y#1z}\A abcxxx",
                "yabcz"
            ),
            (
                one_delimited_parameter_empty,
                r"\def\A #1xxx{y#1z}\A xxx",
                "yz"
            ),
            (
                one_delimited_parameter_with_scope,
                r"\def\A #1xxx{#1}\A abc{123xxx}xxx",
                "abc{123xxx}"
            ),
            (
                one_delimited_parameter_with_prefix,
                r"\def\A a#1c{x#1y}\A abcdef",
                "xbydef"
            ),
            (
                two_delimited_parameters_with_prefix,
                r"\def\A a#1c#2e{x#2y#1z}\A abcdef",
                "xdybzf"
            ),
            (
                one_delimited_parameter_grouped_value,
                r"\def\A #1c{x#1y}\A {Hello}c",
                "xHelloy"
            ),
            (
                parameter_brace_special_case,
                r"\def\A #{Mint says }\A{hello}",
                "Mint says {hello}"
            ),
            (
                grouping,
                r"\def\A{Hello}\A{\def\A{World}\A}\A",
                r"HelloWorldHello"
            ),
            (
                grouping_global,
                r"\def\A{Hello}\A{\global\def\A{World}\A}\A",
                r"HelloWorldWorld"
            ),
            (gdef, r"\def\A{Hello}\A{\gdef\A{World}\A}\A", r"HelloWorldWorld"),
            (
                gdef_global,
                r"\def\A{Hello}\A{\global\gdef\A{World}\A}\A",
                r"HelloWorldWorld"
            ),
            (
                def_takes_global,
                r"\global\def\A{Hello}\assertGlobalIsFalse",
                r""
            ),
            (
                edef_expands_at_definition_time,
                r"\def\B{x}\edef\A{\B}\def\B{y}\A",
                r"x"
            ),
            (
                def_does_not_expand_at_definition_time,
                r"\def\B{x}\def\A{\B}\def\B{y}\A",
                r"y"
            ),
            (
                xdef_is_global,
                r"\def\B{x}\def\A{o}{\xdef\A{\B}}\A",
                r"x"
            ),
            (
                edef_with_the,
                r"\i=5 \edef\A{\the\i}\i=6 \A",
                r"5"
            ),
            (
                texbook_exercise_20_1,
                r"\def\mustnt{I must not talk in class.}%
                  \def\five{\mustnt\mustnt\mustnt\mustnt\mustnt}%
                  \def\twenty{\five\five\five\five}%
                  \def\punishment{\twenty\twenty\twenty\twenty\twenty}%
                  \punishment",
                "I must not talk in class.".repeat(100)
            ),
            (
                texbook_exercise_20_2,
                r"\def\a{\b}%
                  \def\b{A\def\a{B\def\a{C\def\a{\b}}}}%
                  \def\puzzle{\a\a\a\a\a}%
                  \puzzle",
                "ABCAB"
            ),
            (
                texbook_exercise_20_3_part_1,
                "\\def\\row#1{(#1_1,\\ldots,#1_n)}\\row{\\bf x}",
                "(\\bf x_1,\\ldots,\\bf x_n)"
            ),
            (
                texbook_exercise_20_3_part_2,
                "\\def\\row#1{(#1_1,\\ldots,#1_n)}\\row{{\\bf x}}",
                "({\\bf x}_1,\\ldots,{\\bf x}_n)"
            ),
            (
                texbook_exercise_20_5,
                r"\def\a#1{\def\b##1{##1#1}}\a!\b{Hello}",
                "Hello!"
            ),
            (
                texbook_exercise_20_6,
                r"\def\b#1{And #1, World!}\def\a#{\b}\a{Hello}",
                "And Hello, World!"
            ),
        ),
    ];

    test_suite![
        options(TestOption::BuiltInCommands(built_in_commands)),
        failure_tests(
            (end_of_input_scanning_target, r"\def"),
            (end_of_input_scanning_argument_text, r"\def\A"),
            (end_of_input_scanning_replacement, r"\def\A{"),
            (end_of_input_scanning_nested_replacement, r"\def\A{{}"),
            (end_of_input_reading_parameter_number, r"\def\A#"),
            (end_of_input_scanning_argument, r"\def\A#1{} \A"),
            (
                end_of_input_reading_value_for_parameter,
                r"\def\A#1{} \A{this {is parameter 1 but it never ends}"
            ),
            (end_of_input_reading_prefix, r"\def\A abc{} \A ab"),
            (
                end_of_input_reading_delimiter,
                r"\def\A #1abc{} \A {first parameter}ab"
            ),
            (unexpected_token_argument, r"\def\A }"),
            (unexpected_token_parameter_number, r"\def\A #a}"),
            (unexpected_parameter_number_in_argument, r"\def\A #2{}"),
            (unexpected_parameter_token_in_replacement, r"\def\A #1{#a}"),
            (unexpected_parameter_number_in_replacement, r"\def\A {#2}"),
            (
                unexpected_parameter_number_in_replacement_2,
                r"\def\A #1{#2}"
            ),
            (unexpected_token_in_prefix, r"\def\A abc{d} \A abd"),
            (outer_macro_in_argument, r"\outer\def\O{}\def\A#1{#1}\A{\O}"),
            (par_in_non_long_argument, r"\def\A#1{#1}\def\par{}\A{\par}"),
        ),
    ];

    test_suite![
        options(
            TestOption::BuiltInCommands(built_in_commands),
            TestOption::AllowUndefinedCommands(true),
        ),
        expansion_equality_tests(
            (
                par_in_long_argument,
                r"\long\def\A#1{<#1>}\def\par{}\A{a\par b}",
                r"<a\par b>"
            ),
        ),
    ];
}
