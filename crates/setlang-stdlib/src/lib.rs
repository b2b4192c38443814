//! # The Setlang standard library
//!
//! This crate contains the primitives of the typesetting macro language:
//! macro definition, registers, arithmetic, conditionals, grouping, file
//! input, namespaces, and the box building primitives that bridge to the
//! Galley typesetting engine.
//!
//! Primitives are organized one concern per module, and each is generic
//! over the state type through the component pattern: a primitive requires
//! `HasComponent<TheirComponent>` of the state and nothing else. The
//! [StdLibState] type aggregates every component and so is compatible with
//! every primitive in the crate.

use galley_core::{Glue, Scaled};
use setlang::prelude as sl;
use setlang::token;
use setlang::traits::*;
use setlang::vm::implement_has_component;
use setlang::{command, error, vm};
use setlang_common::HasFileSystem;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub mod alias;
pub mod boxes;
pub mod chardef;
pub mod codes;
pub mod conditional;
pub mod csname;
pub mod def;
pub mod endlinechar;
pub mod expansion;
pub mod group;
pub mod input;
pub mod namespaces;
pub mod prefix;
pub mod registers;
pub mod the;
pub mod time;
pub mod variableops;

/// Trait alias for states that carry every component in the standard
/// library.
///
/// The trait is implemented automatically for any state with the right
/// components; [StdLibState] is the canonical implementation.
pub trait StdLibComponents:
    SetlangState
    + HasFileSystem
    + HasComponent<boxes::Component>
    + HasComponent<codes::Component>
    + HasComponent<conditional::Component>
    + HasComponent<endlinechar::Component>
    + HasComponent<prefix::Component>
    + HasComponent<registers::Component<i32, 256>>
    + HasComponent<registers::Component<Scaled, 256>>
    + HasComponent<registers::Component<Glue, 256>>
    + HasComponent<registers::Component<Vec<token::Token>, 256>>
    + HasComponent<time::Component>
{
}

impl<S> StdLibComponents for S where
    S: SetlangState
        + HasFileSystem
        + HasComponent<boxes::Component>
        + HasComponent<codes::Component>
        + HasComponent<conditional::Component>
        + HasComponent<endlinechar::Component>
        + HasComponent<prefix::Component>
        + HasComponent<registers::Component<i32, 256>>
        + HasComponent<registers::Component<Scaled, 256>>
        + HasComponent<registers::Component<Glue, 256>>
        + HasComponent<registers::Component<Vec<token::Token>, 256>>
        + HasComponent<time::Component>
{
}

/// All of the standard library's built-in commands.
pub fn all_initial_built_ins<S: StdLibComponents>(
) -> HashMap<&'static str, command::BuiltIn<S>> {
    HashMap::from([
        ("advance", variableops::get_advance()),
        //
        ("begingroup", group::get_begingroup()),
        ("box", boxes::get_box()),
        //
        ("catcode", codes::get_catcode()),
        ("char", boxes::get_char()),
        ("chardef", chardef::get_chardef()),
        ("count", registers::get_count()),
        ("countdef", registers::get_countdef()),
        ("csname", csname::get_csname()),
        //
        ("day", time::get_day()),
        ("def", def::get_def()),
        ("dimen", registers::get_dimen()),
        ("dimendef", registers::get_dimendef()),
        ("discretionary", boxes::get_discretionary()),
        ("divide", variableops::get_divide()),
        ("dp", boxes::get_dp()),
        //
        ("edef", def::get_edef()),
        ("else", conditional::get_else()),
        ("endcsname", csname::get_endcsname()),
        ("endgroup", group::get_endgroup()),
        ("endinput", input::get_endinput()),
        ("endlinechar", endlinechar::get_endlinechar()),
        ("expandafter", expansion::get_expandafter()),
        ("export", namespaces::get_export()),
        //
        ("fi", conditional::get_fi()),
        ("font", boxes::get_font()),
        //
        ("gdef", def::get_gdef()),
        ("global", prefix::get_global()),
        //
        ("hbox", boxes::get_hbox()),
        ("hskip", boxes::get_hskip()),
        ("ht", boxes::get_ht()),
        //
        ("ifcase", conditional::get_ifcase()),
        ("iffalse", conditional::get_iffalse()),
        ("ifnum", conditional::get_ifnum()),
        ("ifodd", conditional::get_ifodd()),
        ("iftrue", conditional::get_iftrue()),
        ("import", namespaces::get_import()),
        ("input", input::get_input()),
        //
        ("kern", boxes::get_kern()),
        //
        ("let", alias::get_let()),
        ("long", prefix::get_long()),
        //
        ("month", time::get_month()),
        ("multiply", variableops::get_multiply()),
        //
        ("namespace", namespaces::get_namespace()),
        ("noexpand", expansion::get_noexpand()),
        //
        ("or", conditional::get_or()),
        ("outer", prefix::get_outer()),
        //
        ("par", boxes::get_par()),
        ("patterns", boxes::get_patterns()),
        ("penalty", boxes::get_penalty()),
        //
        ("relax", expansion::get_relax()),
        //
        ("setbox", boxes::get_setbox()),
        ("shipout", boxes::get_shipout()),
        ("skip", registers::get_skip()),
        //
        ("the", the::get_the()),
        ("time", time::get_time()),
        ("toks", registers::get_toks()),
        ("toksdef", registers::get_toksdef()),
        //
        ("vbox", boxes::get_vbox()),
        ("vskip", boxes::get_vskip()),
        //
        ("wd", boxes::get_wd()),
        //
        ("xdef", def::get_xdef()),
        //
        ("year", time::get_year()),
    ])
}

/// A state type compatible with every primitive in the standard library.
pub struct StdLibState {
    pub boxes: boxes::Component,
    pub catcode: codes::Component,
    pub conditional: conditional::Component,
    pub end_line_char: endlinechar::Component,
    pub prefix: prefix::Component,
    pub registers_i32: registers::Component<i32, 256>,
    pub registers_dimen: registers::Component<Scaled, 256>,
    pub registers_skip: registers::Component<Glue, 256>,
    pub registers_token_list: registers::Component<Vec<token::Token>, 256>,
    pub time: time::Component,
    pub file_system: Rc<RefCell<dyn setlang_common::FileSystem>>,
}

impl Default for StdLibState {
    fn default() -> Self {
        Self {
            boxes: Default::default(),
            catcode: Default::default(),
            conditional: Default::default(),
            end_line_char: Default::default(),
            prefix: Default::default(),
            registers_i32: Default::default(),
            registers_dimen: Default::default(),
            registers_skip: Default::default(),
            registers_token_list: Default::default(),
            time: Default::default(),
            file_system: Rc::new(RefCell::new(setlang_common::RealFileSystem {})),
        }
    }
}

impl SetlangState for StdLibState {
    #[inline]
    fn cat_code(&self, c: char) -> token::CatCode {
        codes::cat_code(self, c)
    }

    #[inline]
    fn end_line_char(&self) -> Option<char> {
        endlinechar::end_line_char(self)
    }

    #[inline]
    fn em_width(&self) -> Scaled {
        boxes::em_width(self)
    }

    #[inline]
    fn ex_height(&self) -> Scaled {
        boxes::ex_height(self)
    }

    #[inline]
    fn expansion_override_hook(
        token: token::Token,
        input: &mut vm::ExpansionInput<Self>,
        tag: Option<command::Tag>,
    ) -> sl::Result<Option<token::Token>> {
        expansion::noexpand_hook(token, input, tag)
    }

    #[inline]
    fn variable_assignment_scope_hook(
        state: &mut Self,
    ) -> galley_stdext::collections::scopedmap::Scope {
        prefix::variable_assignment_scope_hook(state)
    }

    // Recoverable errors are routed through the interaction mode policy:
    // error stop mode aborts, the scroll modes log and continue, and batch
    // mode continues silently.
    fn recoverable_error_hook(
        vm: &vm::VM<Self>,
        recoverable_error: Box<error::Error>,
    ) -> Result<(), Box<error::Error>> {
        match vm.interaction_mode {
            vm::InteractionMode::ErrorStop => Err(recoverable_error),
            vm::InteractionMode::Scroll | vm::InteractionMode::NonStop => {
                log::error!("{recoverable_error}");
                Ok(())
            }
            vm::InteractionMode::Batch => Ok(()),
        }
    }
}

impl HasFileSystem for StdLibState {
    fn file_system(&self) -> Rc<RefCell<dyn setlang_common::FileSystem>> {
        self.file_system.clone()
    }
}

impl setlang_common::HasLogging for StdLibState {}

implement_has_component![StdLibState {
    boxes: boxes::Component,
    catcode: codes::Component,
    conditional: conditional::Component,
    end_line_char: endlinechar::Component,
    prefix: prefix::Component,
    registers_i32: registers::Component<i32, 256>,
    registers_dimen: registers::Component<Scaled, 256>,
    registers_skip: registers::Component<Glue, 256>,
    registers_token_list: registers::Component<Vec<token::Token>, 256>,
    time: time::Component,
}];

impl StdLibState {
    /// Create a new VM with the standard library's state and commands.
    pub fn new_vm() -> Box<vm::VM<StdLibState>> {
        vm::VM::<StdLibState>::new_with_built_in_commands(all_initial_built_ins())
    }
}

/// The VM handlers that build typesetting material.
///
/// Characters become char nodes and interword glue; box groups are
/// packaged when they end.
pub struct GalleyHandlers;

impl<S: StdLibComponents> vm::Handlers<S> for GalleyHandlers {
    fn character_handler(
        token: token::Token,
        input: &mut vm::ExecutionInput<S>,
    ) -> sl::Result<()> {
        boxes::character_handler(token, input)
    }

    fn group_end_handler(
        token: token::Token,
        input: &mut vm::ExecutionInput<S>,
        tag: command::Tag,
    ) -> sl::Result<()> {
        boxes::group_end_handler(token, input, tag)
    }
}

/// Run the VM until the input is exhausted, then finish the document.
///
/// Returns the number of pages shipped out.
pub fn run<S: StdLibComponents>(vm: &mut vm::VM<S>) -> sl::Result<usize> {
    vm.run::<GalleyHandlers>()?;
    let component: &mut boxes::Component = vm.state.component_mut();
    Ok(component.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use setlang_testing::*;

    // The full standard library state, plus the testing component so that
    // the test harness can collect output tokens.
    struct State {
        std: StdLibState,
        testing: TestingComponent,
    }

    impl Default for State {
        fn default() -> Self {
            Self {
                std: Default::default(),
                testing: Default::default(),
            }
        }
    }

    impl SetlangState for State {
        fn cat_code(&self, c: char) -> token::CatCode {
            codes::cat_code(self, c)
        }
        fn end_line_char(&self) -> Option<char> {
            endlinechar::end_line_char(self)
        }
        fn expansion_override_hook(
            token: token::Token,
            input: &mut vm::ExpansionInput<Self>,
            tag: Option<command::Tag>,
        ) -> sl::Result<Option<token::Token>> {
            expansion::noexpand_hook(token, input, tag)
        }
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

    impl HasFileSystem for State {}

    macro_rules! delegate_has_component {
        ($( $component: ty ),+ $(,)?) => {
            $(
                impl HasComponent<$component> for State {
                    fn component(&self) -> &$component {
                        HasComponent::<$component>::component(&self.std)
                    }
                    fn component_mut(&mut self) -> &mut $component {
                        HasComponent::<$component>::component_mut(&mut self.std)
                    }
                }
            )+
        };
    }

    delegate_has_component![
        boxes::Component,
        codes::Component,
        conditional::Component,
        endlinechar::Component,
        prefix::Component,
        registers::Component<i32, 256>,
        registers::Component<Scaled, 256>,
        registers::Component<Glue, 256>,
        registers::Component<Vec<token::Token>, 256>,
        time::Component,
    ];

    implement_has_component![State {
        testing: TestingComponent,
    }];

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        all_initial_built_ins()
    }

    test_suite![
        expansion_equality_tests(
            // \count0=5 \multiply\count0 by 3 \the\count0 yields 15.
            (
                count_multiply_the,
                r"\count0=5 \multiply\count0 by 3 \the\count0",
                "15"
            ),
            // Category code assignment plus a macro definition: the macro
            // body comes back out as the letter tokens A and B.
            (
                catcode_def_interplay,
                r"\catcode`\{=1 \catcode`\}=2 \def\x{AB}\x",
                "AB"
            ),
            // A local assignment is undone when the group ends.
            (
                begingroup_assignment_undone,
                r"\begingroup\count0=1\endgroup \the\count 0",
                "0"
            ),
            // A global assignment survives the unwinding of every group.
            (
                global_assignment_survives,
                r"{{\begingroup\global\count0=9\endgroup}}\the\count 0",
                "9"
            ),
            (
                overwrite_else,
                r"\def\else{}\ifodd 2 \else should be skipped \fi",
                r""
            ),
            (
                math_and_active_char,
                r"\catcode`\A=13 \catcode`\~=13 \countdef A5 \countdef ~6 ~=7 A=8 \advance~byA \the~",
                r"15",
            ),
            (
                texbook_exercise_20_7,
                r"\catcode`\[=1 \catcode`\]=2 \catcode`\!=6 \def\!!1#2![{!#]#!!2}\! x{[y]][z}",
                r"\catcode`\[=1 \catcode`\]=2 \catcode`\!=6 {#]![y][z}",
            ),
            (
                conditional_over_registers,
                r"\count 11 = 3 \ifnum\count 11 > 2 big\else small\fi",
                "big"
            ),
            (
                csname_with_registers,
                r"\countdef\myCount 0 \myCount=7 \the\csname myCount\endcsname",
                "7"
            ),
        ),
        failure_tests(
            (undefined_control_sequence, r"\elephant"),
            (too_many_closing_groups, r"}"),
            (divide_register_by_zero, r"\divide\count 0 by 0"),
            (macro_does_not_match_definition, r"\def\A abc{d} \A abd"),
        ),
    ];

    #[test]
    fn expansion_budget_converts_recursion_into_an_error() {
        let mut vm = vm::VM::<State>::new_with_built_in_commands(built_in_commands());
        vm.max_expansion_depth = 500;
        vm.push_source("loop.tex", r"\def\loop{\loop}\loop").unwrap();
        let result = vm.run::<vm::DefaultHandlers>();
        let err = result.expect_err("infinite recursion must surface as an error");
        assert!(
            err.to_string().contains("expansion loop too deep"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn scanner_is_lossless_modulo_catcodes() {
        // Scanning text and writing the tokens back out reproduces the
        // original character sequence.
        let inputs = ["hello world", "a{b}c %comment\nd", r"\foo bar \baz"];
        for input in inputs {
            let mut vm = vm::VM::<State>::new_with_built_in_commands(Default::default());
            vm.push_source("roundtrip.tex", input).unwrap();
            let executor = vm::ExecutionInput::new(&mut vm);
            let mut tokens = Vec::new();
            while let Some(token) = executor.unexpanded().next().unwrap() {
                tokens.push(token);
            }
            let got = token::write_tokens(&tokens, vm.cs_name_interner());
            // Comments are consumed by the scanner; spaces collapse.
            let want = match input {
                "a{b}c %comment\nd" => "a{b}c d",
                r"\foo bar \baz" => r"\foo bar \baz",
                _ => input,
            };
            assert_eq!(got, want);
        }
    }
}
