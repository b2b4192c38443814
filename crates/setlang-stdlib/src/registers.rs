//! Register variables (`\count`, `\dimen`, `\skip`, `\toks` and their
//! `def` forms).

use setlang::parse::OptionalEquals;
use setlang::prelude as sl;
use setlang::traits::*;
use setlang::variable::SupportedType;
use setlang::*;

/// See [Component].
pub struct DefaultMarker;

/// Component required to have registers of type `T`.
///
/// The `Marker` generic parameter exists so that a single state type can
/// contain multiple copies of this component and implement the
/// `HasComponent` pattern for each. This allows multiple register commands
/// of the same Rust type in the same VM.
pub struct Component<T, const N: usize, Marker = DefaultMarker>(
    Box<[T; N]>,
    std::marker::PhantomData<Marker>,
);

static REGISTERDEF_TAG: command::StaticTag = command::StaticTag::new();

/// Tag shared by `\countdef` and the other register binding commands.
pub fn registerdef_tag() -> command::Tag {
    REGISTERDEF_TAG.get()
}

impl<T: Default, const N: usize, Marker> Default for Component<T, N, Marker> {
    fn default() -> Self {
        let mut v = Vec::with_capacity(N);
        for _ in 0..N {
            v.push(T::default())
        }
        let boxed: Box<[T; N]> = match v.into_boxed_slice().try_into() {
            Ok(boxed) => boxed,
            Err(_) => unreachable!("the vector was created with exactly N elements"),
        };
        Self(boxed, Default::default())
    }
}

impl<T, const N: usize, Marker> Component<T, N, Marker> {
    /// Read the value of a register directly, bypassing the interpreter.
    pub fn read(&self, index: usize) -> &T {
        self.0.get(index).unwrap()
    }
}

/// Get the `\count` command.
pub fn get_count<S: HasComponent<Component<i32, N>>, const N: usize>() -> command::BuiltIn<S> {
    new_registers_command()
}

/// Get the `\dimen` command.
pub fn get_dimen<S: HasComponent<Component<galley_core::Scaled, N>>, const N: usize>(
) -> command::BuiltIn<S> {
    new_registers_command()
}

/// Get the `\skip` command.
pub fn get_skip<S: HasComponent<Component<galley_core::Glue, N>>, const N: usize>(
) -> command::BuiltIn<S> {
    new_registers_command()
}

/// Get the `\toks` command.
pub fn get_toks<S: HasComponent<Component<Vec<token::Token>, N>>, const N: usize>(
) -> command::BuiltIn<S> {
    new_registers_command()
}

/// Creates a new registers command that stores values in the component.
pub fn new_registers_command<
    T: SupportedType,
    Marker: 'static,
    S: HasComponent<Component<T, N, Marker>>,
    const N: usize,
>() -> command::BuiltIn<S> {
    variable::Command::new_array(ref_fn, mut_fn, variable::IndexResolver::Dynamic(index_fn)).into()
}

fn index_fn<T, Marker: 'static, S: HasComponent<Component<T, N, Marker>>, const N: usize>(
    _: token::Token,
    input: &mut vm::ExpansionInput<S>,
) -> sl::Result<variable::Index> {
    let index = parse::Uint::<N>::parse(input)?;
    Ok(index.0.into())
}

/// Get the `\countdef` command.
pub fn get_countdef<S: HasComponent<Component<i32, N>>, const N: usize>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(registerdef_fn).with_tag(registerdef_tag())
}

/// Get the `\dimendef` command.
pub fn get_dimendef<S: HasComponent<Component<galley_core::Scaled, N>>, const N: usize>(
) -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(registerdef_fn).with_tag(registerdef_tag())
}

/// Get the `\toksdef` command.
pub fn get_toksdef<S: HasComponent<Component<Vec<token::Token>, N>>, const N: usize>(
) -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(registerdef_fn).with_tag(registerdef_tag())
}

fn registerdef_fn<T: SupportedType, S: HasComponent<Component<T, N>>, const N: usize>(
    _: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    let scope = SetlangState::variable_assignment_scope_hook(input.state_mut());
    let (cmd_ref_or, _, index) =
        <(Option<token::CommandRef>, OptionalEquals, parse::Uint<N>)>::parse(input)?;
    if let Some(cmd_ref) = cmd_ref_or {
        input.commands_map_mut().insert_variable_command(
            cmd_ref,
            variable::Command::new_array(
                ref_fn,
                mut_fn,
                variable::IndexResolver::Static(index.0.into()),
            ),
            scope,
        );
    }
    Ok(())
}

fn ref_fn<T, Marker: 'static, S: HasComponent<Component<T, N, Marker>>, const N: usize>(
    state: &S,
    index: variable::Index,
) -> &T {
    state.component().0.get(index.0).unwrap()
}

fn mut_fn<T, Marker: 'static, S: HasComponent<Component<T, N, Marker>>, const N: usize>(
    state: &mut S,
    index: variable::Index,
) -> &mut T {
    state.component_mut().0.get_mut(index.0).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefix;
    use crate::the;
    use setlang_testing::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct State {
        registers_i32: Component<i32, 256>,
        registers_dimen: Component<galley_core::Scaled, 256>,
        registers_skip: Component<galley_core::Glue, 256>,
        registers_token_list: Component<Vec<token::Token>, 256>,
        prefix: prefix::Component,
        testing: TestingComponent,
    }

    impl SetlangState for State {
        fn recoverable_error_hook(
            vm: &vm::VM<Self>,
            recoverable_error: Box<error::Error>,
        ) -> Result<(), Box<error::Error>> {
            TestingComponent::recoverable_error_hook(vm, recoverable_error)
        }
        fn variable_assignment_scope_hook(
            state: &mut Self,
        ) -> galley_stdext::collections::scopedmap::Scope {
            prefix::variable_assignment_scope_hook(state)
        }
    }

    vm::implement_has_component![State {
        registers_i32: Component<i32, 256>,
        registers_dimen: Component<galley_core::Scaled, 256>,
        registers_skip: Component<galley_core::Glue, 256>,
        registers_token_list: Component<Vec<token::Token>, 256>,
        prefix: prefix::Component,
        testing: TestingComponent,
    }];

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("the", the::get_the()),
            ("count", get_count()),
            ("countdef", get_countdef()),
            ("dimen", get_dimen()),
            ("dimendef", get_dimendef()),
            ("skip", get_skip()),
            ("global", prefix::get_global()),
            ("toks", get_toks()),
            ("toksdef", get_toksdef()),
        ])
    }

    test_suite![
        expansion_equality_tests(
            (write_and_read_register, r"\count 23 4 \the\count 23", r"4"),
            (
                write_and_read_register_eq,
                r"\count 23 = 4 \the\count 23",
                r"4"
            ),
            (
                negative_negative,
                r"\count 1=5000 \count 0=-1 \the \count -\count 0",
                r"5000"
            ),
            (countdef_base_case, r"\countdef\A 23\A 4 \the\A", r"4"),
            (countdef_base_case_eq, r"\countdef\A = 23\A 4 \the\A", r"4"),
            (
                countdef_with_count,
                r"\countdef\A 23\A 4\count 1 0 \the\A",
                r"4"
            ),
            (
                countdef_local,
                r"\count 1=1 \count 2=2 \countdef\A 1{\countdef\A 2}\the\A",
                r"1"
            ),
            (
                countdef_global,
                r"\count 1=1 \count 2=2 \countdef\A 1{\global\countdef\A 2}\the\A",
                r"2"
            ),
            (
                countdef_with_same_count,
                r"\countdef\A 23\A 4\count 23 5 \the\A",
                r"5"
            ),
            (
                register_undone_by_group_close,
                r"\count 0=7{\count 0=1}\the\count 0",
                r"7"
            ),
            (
                global_register_survives_unwinding,
                r"\count 0=7{{{\global\count 0=1}}}\the\count 0",
                r"1"
            ),
            (dimen_base_case, r"\dimen 1 = 2.5pt \the\dimen 1", r"2.5pt"),
            (dimendef_base_case, r"\dimendef\A 1 \A=3pt \the\A", r"3.0pt"),
            (
                skip_base_case,
                r"\skip 1 = 2pt plus 1fil \the\skip 1",
                r"2.0pt plus 1.0fil"
            ),
            (
                toks_basic,
                r"\toks 1 = {Hola, Mundo}\the \toks 1",
                r"Hola, Mundo"
            ),
            (
                toksdef_basic,
                r"\toksdef\content 1 \toks 1 = {Hola, Mundo}\the \content",
                r"Hola, Mundo"
            ),
            (
                toks_copy,
                r"\toks 1 = {Hola, Mundo}\toks 2 = \toks 1 \the \toks 2",
                r"Hola, Mundo"
            ),
            (
                dimen_to_int,
                r"\dimen 1 = 40sp \count 1 = \dimen 1 \the \count 1",
                r"40",
            ),
            (
                int_to_dimen,
                r"\count 1 = 40 \dimen 1 = \count 1 pt \the \dimen 1",
                r"40.0pt",
            ),
            (
                int_to_dimen_negative,
                r"\count 1 = -40 \dimen 1 = \count 1 pt \the \dimen 1",
                r"-40.0pt",
            ),
            (
                int_coerced_to_sp,
                // <int><int> is interpreted as <int>*<int>sp.
                r"\count 3 = 40 \count 5 = 2 \dimen 7 = \count 3 \count 5 \the \dimen 7",
                r"0.00122pt",
            ),
            (
                dimen_as_unit,
                r"\dimen 1 = 10pt \dimen 2 = 5 \dimen 1 \the \dimen 2",
                r"50.0pt",
            ),
            (
                dimen_as_unit_fraction,
                r"\dimen 2 = 10pt \dimen 1 = - 1.5 \dimen 2 \the \dimen 1",
                r"-15.0pt",
            ),
        ),
        recoverable_failure_tests(
            (
                write_register_index_too_big,
                r"\count 260 = 4 \the\count 0",
                "4"
            ),
            (
                write_register_negative_index,
                r"\count -1 = 4 \the\count 0",
                "4"
            ),
            (
                countdef_register_index_too_big,
                r"\countdef\A 260 \A= 4 \the\count 0",
                "4"
            ),
            (countdef_missing_cs, r"\countdef 260 End", "End"),
            (
                dimen_as_unit_too_big,
                r"\dimen 1 = 10000pt \dimen 2 = 2 \dimen 1 \the \dimen 2",
                r"16383.99998pt",
            ),
            (
                int_to_dimen_too_big,
                r"\count 1 = 400 \dimen 1 = \count 1 in \the \dimen 1",
                r"16383.99998pt",
            ),
        ),
    ];
}
