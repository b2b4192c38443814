/*!
Setlang unit testing library.

This is a crate for writing unit tests for code that uses Setlang.
It is used extensively in the Setlang standard library, so the unit tests
there are good examples of what this crate can do.

## Basic setup

Each unit test built with this library works with a specific user-defined
state type. In addition to implementing the [`SetlangState`] trait, the
state must also:

1. Include the [`TestingComponent`] type as a component, i.e. implement
   `HasComponent<TestingComponent>`.

1. Route the `recoverable_error_hook` method on the [`SetlangState`] trait
   to [`TestingComponent::recoverable_error_hook`].

1. Implement [`Default`].

If the unit test doesn't require anything else from the state, the
[`State`] type defined in this library can simply be used.

## Test types

*Expansion equality tests* ([`run_expansion_equality_test`]) verify that two
snippets expand to the same output. The second snippet is usually a
constant, so these tests verify that a non-trivial expression evaluates to
a specific output. They do not verify that the interpreter state ends up
the same in both cases.

*Failure tests* ([`run_failure_test`]) verify that a snippet fails to run.

The preferred way to write a suite of unit tests is the [`test_suite`]
macro, which removes the boilerplate around the run functions.
*/

use setlang::traits::*;
use setlang::vm::implement_has_component;
use setlang::vm::VM;
use setlang::*;
use std::collections::HashMap;

/// Component that every unit testing state needs to have.
///
/// The component accumulates the character tokens that reach the main loop;
/// these are the "output" that expansion equality tests compare.
#[derive(Default)]
pub struct TestingComponent {
    allow_undefined_command: bool,
    recover_from_errors: bool,
    num_recovered_errors: std::cell::RefCell<usize>,
    tokens: Vec<token::Token>,
    integer: i32,
}

impl TestingComponent {
    fn take_tokens(&mut self) -> Vec<token::Token> {
        let mut result = Vec::new();
        std::mem::swap(&mut result, &mut self.tokens);
        result
    }

    /// Recoverable error hook for the testing component.
    ///
    /// States used in unit testing must be configured to use this hook.
    pub fn recoverable_error_hook<S: HasComponent<Self>>(
        vm: &VM<S>,
        recoverable_error: Box<error::Error>,
    ) -> Result<(), Box<error::Error>> {
        let component = vm.state.component();
        if component.recover_from_errors {
            let mut num_recovered_errors = component.num_recovered_errors.borrow_mut();
            *num_recovered_errors += 1;
            Ok(())
        } else {
            Err(recoverable_error)
        }
    }

    /// Returns an integer variable command backed by the testing component.
    ///
    /// Unit tests that need an integer variable can use this rather than
    /// building their own.
    pub fn get_integer<S: HasComponent<TestingComponent>>() -> command::BuiltIn<S> {
        variable::Command::new_singleton(
            |state: &S, _: variable::Index| -> &i32 { &state.component().integer },
            |state: &mut S, _: variable::Index| -> &mut i32 { &mut state.component_mut().integer },
        )
        .into()
    }
}

/// Simple state type for simple unit tests.
///
/// If the primitives under test don't require custom components in the
/// state, it is easier to use this type than to define a custom one.
#[derive(Default)]
pub struct State {
    testing: TestingComponent,
}

impl SetlangState for State {
    fn recoverable_error_hook(
        vm: &VM<Self>,
        recoverable_error: Box<error::Error>,
    ) -> Result<(), Box<error::Error>> {
        TestingComponent::recoverable_error_hook(vm, recoverable_error)
    }
}

implement_has_component![State {
    testing: TestingComponent,
}];

/// Option passed to a test runner.
pub enum TestOption<'a, S> {
    /// The built-in commands are the result of invoking the provided static
    /// function.
    ///
    /// Overrides previous `BuiltInCommands` or `BuiltInCommandsDyn` options.
    BuiltInCommands(fn() -> HashMap<&'static str, command::BuiltIn<S>>),

    /// The built-in commands are the result of invoking the provided
    /// closure.
    ///
    /// Overrides previous `BuiltInCommands` or `BuiltInCommandsDyn` options.
    BuiltInCommandsDyn(Box<dyn Fn() -> HashMap<&'static str, command::BuiltIn<S>> + 'a>),

    /// The provided static function is invoked after the VM is created and
    /// before execution starts.
    ///
    /// Overrides previous `CustomVMInitialization` or
    /// `CustomVMInitializationDyn` options.
    CustomVMInitialization(fn(&mut VM<S>)),

    /// The provided closure is invoked after the VM is created and before
    /// execution starts.
    ///
    /// Overrides previous `CustomVMInitialization` or
    /// `CustomVMInitializationDyn` options.
    #[allow(clippy::type_complexity)]
    CustomVMInitializationDyn(Box<dyn Fn(&mut VM<S>) + 'a>),

    /// Whether undefined commands raise an error.
    ///
    /// Overrides previous `AllowUndefinedCommands` options.
    AllowUndefinedCommands(bool),

    /// Whether to recover from errors.
    ///
    /// Overrides previous `RecoverFromErrors` options.
    RecoverFromErrors(bool),
}

/// Run an expansion equality test.
///
/// The test passes if the two provided input strings expand to the same
/// tokens.
pub fn run_expansion_equality_test<S>(
    lhs: &str,
    rhs: &str,
    expect_recoverable_errors: bool,
    options: &[TestOption<S>],
) where
    S: Default + HasComponent<TestingComponent>,
{
    let options = ResolvedOptions::new(options);

    let mut vm_1 = initialize_vm(&options);
    let (output_1, _) = execute_source_code(&mut vm_1, lhs, &options)
        .map_err(|err| {
            println!("{err}");
            err
        })
        .unwrap();

    let mut vm_2 = initialize_vm(&options);
    let (output_2, _) = execute_source_code(&mut vm_2, rhs, &options)
        .map_err(|err| {
            println!("{err}");
            err
        })
        .unwrap();
    compare_output(output_1, &vm_1, output_2, &vm_2);

    let num_recovered_errors = *vm_1.state.component().num_recovered_errors.borrow();
    match (expect_recoverable_errors, num_recovered_errors) {
        (true, 0) => {
            panic!("expected recoverable errors but didn't have any");
        }
        (true, _) | (false, 0) => (),
        (false, i) => {
            panic!("did not expect recoverable errors but had {i} recoverable errors");
        }
    }
}

fn compare_output<S>(
    mut output_1: Vec<token::Token>,
    vm_1: &vm::VM<S>,
    mut output_2: Vec<token::Token>,
    vm_2: &vm::VM<S>,
) {
    let trim_space = |v: &mut Vec<token::Token>| {
        let last = match v.last() {
            None => return,
            Some(last) => last,
        };
        if last.cat_code() == Some(token::CatCode::Space) {
            v.pop();
        }
    };
    trim_space(&mut output_1);
    trim_space(&mut output_2);

    use token::CommandRef::ControlSequence;
    use token::Value::CommandRef;
    let equal = match output_1.len() == output_2.len() {
        false => {
            println!(
                "output lengths do not match: {} != {}",
                output_1.len(),
                output_2.len()
            );
            false
        }
        true => {
            let mut equal = true;
            for (token_1, token_2) in output_1.iter().zip(output_2.iter()) {
                let token_equal = match (&token_1.value(), &token_2.value()) {
                    (
                        CommandRef(ControlSequence(_, cs_name_1)),
                        CommandRef(ControlSequence(_, cs_name_2)),
                    ) => {
                        let name_1 = vm_1.cs_name_interner().resolve(*cs_name_1).unwrap();
                        let name_2 = vm_2.cs_name_interner().resolve(*cs_name_2).unwrap();
                        name_1 == name_2
                    }
                    _ => token_1 == token_2,
                };
                if !token_equal {
                    equal = false;
                    break;
                }
            }
            equal
        }
    };

    if !equal {
        println!("Expansion output is different:");
        println!("------[lhs]------");
        println!(
            "'{}'",
            token::write_tokens(&output_1, vm_1.cs_name_interner())
        );
        println!("------[rhs]------");
        println!(
            "'{}'",
            token::write_tokens(&output_2, vm_2.cs_name_interner())
        );
        println!("-----------------");
        panic!("Expansion test failed");
    }
}

/// Run a failure test.
///
/// The test passes if execution of the provided input fails.
pub fn run_failure_test<S>(input: &str, options: &[TestOption<S>])
where
    S: Default + HasComponent<TestingComponent>,
{
    let options = ResolvedOptions::new(options);

    let mut vm = initialize_vm(&options);
    let result = execute_source_code(&mut vm, input, &options);
    if let Ok((output, _)) = result {
        println!("Expansion succeeded:");
        println!("{}", token::write_tokens(&output, vm.cs_name_interner()));
        panic!("Expansion failure test did not pass: expansion successful");
    }
}

struct ResolvedOptions<'a, S> {
    built_in_commands: &'a dyn Fn() -> HashMap<&'static str, command::BuiltIn<S>>,
    custom_vm_initialization: &'a dyn Fn(&mut VM<S>),
    allow_undefined_commands: bool,
    recover_from_errors: bool,
}

impl<'a, S> ResolvedOptions<'a, S> {
    pub fn new(options: &'a [TestOption<S>]) -> Self {
        let mut resolved = Self {
            built_in_commands: &HashMap::new,
            custom_vm_initialization: &|_| {},
            allow_undefined_commands: false,
            recover_from_errors: false,
        };
        for option in options {
            match option {
                TestOption::BuiltInCommands(f) => resolved.built_in_commands = f,
                TestOption::BuiltInCommandsDyn(f) => resolved.built_in_commands = f,
                TestOption::CustomVMInitialization(f) => resolved.custom_vm_initialization = f,
                TestOption::CustomVMInitializationDyn(f) => resolved.custom_vm_initialization = f,
                TestOption::AllowUndefinedCommands(b) => resolved.allow_undefined_commands = *b,
                TestOption::RecoverFromErrors(b) => resolved.recover_from_errors = *b,
            }
        }
        resolved
    }
}

fn initialize_vm<S: Default>(options: &ResolvedOptions<S>) -> Box<vm::VM<S>> {
    let mut vm = VM::<S>::new_with_built_in_commands((options.built_in_commands)());
    (options.custom_vm_initialization)(&mut vm);
    vm
}

/// Execute source code in a VM with the provided options.
fn execute_source_code<S>(
    vm: &mut vm::VM<S>,
    source: &str,
    options: &ResolvedOptions<S>,
) -> Result<(Vec<token::Token>, usize), Box<error::Error>>
where
    S: Default + HasComponent<TestingComponent>,
{
    vm.push_source("testing.tex", source).unwrap();
    {
        let component = vm.state.component_mut();
        component.allow_undefined_command = options.allow_undefined_commands;
        component.recover_from_errors = options.recover_from_errors;
        *component.num_recovered_errors.borrow_mut() = 0;
    }
    vm.run::<Handlers>()?;
    Ok({
        let component = vm.state.component_mut();
        let tokens = component.take_tokens();
        let num_recovered_errors = *component.num_recovered_errors.borrow();
        (tokens, num_recovered_errors)
    })
}

struct Handlers;

impl<S: HasComponent<TestingComponent>> vm::Handlers<S> for Handlers {
    fn character_handler(
        token: token::Token,
        input: &mut vm::ExecutionInput<S>,
    ) -> setlang::prelude::Result<()> {
        input.state_mut().component_mut().tokens.push(token);
        Ok(())
    }

    fn undefined_command_handler(
        token: token::Token,
        input: &mut vm::ExecutionInput<S>,
    ) -> setlang::prelude::Result<()> {
        if input.state().component().allow_undefined_command {
            input.state_mut().component_mut().tokens.push(token);
            Ok(())
        } else {
            Err(input
                .vm()
                .fatal_error(error::UndefinedCommandError::new(input.vm(), token)))
        }
    }

    fn unexpanded_expansion_command(
        token: token::Token,
        input: &mut vm::ExecutionInput<S>,
    ) -> setlang::prelude::Result<()> {
        input.state_mut().component_mut().tokens.push(token);
        Ok(())
    }
}

/// Macro to generate a suite of unit tests.
///
/// The general use of this macro looks like this:
/// ```
/// # use setlang_testing::*;
/// # use std::collections::HashMap;
/// # fn built_in_commands() -> HashMap<&'static str, setlang::command::BuiltIn<State>> {
/// #   HashMap::new()
/// # }
/// test_suite![
///     state(State),
///     options(TestOption::BuiltInCommands(built_in_commands)),
///     expansion_equality_tests((case_1, "", ""), (case_2, "", ""),),
///     failure_tests((case_3, r"\undefined"),),
/// ];
/// ```
///
/// The arguments to the macro are:
///
/// - `state(State)`: the Rust type to use as the VM state in the tests.
///   May be omitted, in which case it defaults to the type name `State` in
///   the current scope.
///
/// - `options(option_1, ..., option_n)`: a list of [TestOption] values to
///   pass to the test runner. May be omitted, in which case it defaults to
///   `options(TestOption::BuiltInCommands(built_in_commands))`, where
///   `built_in_commands` is a static function in the current scope.
///
/// - `expansion_equality_tests(cases...)`: each case is of the form
///   (case name, left hand side, right hand side) and is fed to
///   [run_expansion_equality_test].
///
/// - `failure_tests(cases...)`: each case is of the form (case name, input)
///   and is fed to [run_failure_test].
///
/// - `recoverable_failure_tests(cases...)`: each case is of the form
///   (case name, input, output). Two tests are generated: with error
///   recovery enabled the input must produce the output along with at least
///   one recoverable error, and with recovery disabled the input must fail.
#[macro_export]
macro_rules! test_suite {
    ( state($state: ty), options $options: tt, expansion_equality_tests ( $( ($name: ident, $lhs: expr, $rhs: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let lhs = $lhs;
                let rhs = $rhs;
                let options = vec! $options;
                setlang_testing::run_expansion_equality_test::<$state>(&lhs, &rhs, false, &options);
            }
        )*
    );
    ( state($state: ty), options $options: tt, expansion_equality_tests $test_body: tt $(,)? ) => (
        compile_error!("Invalid test cases for expansion_equality_tests: must be a list of tuples (name, lhs, rhs)");
    );
    ( state($state: ty), options $options: tt, failure_tests ( $( ($name: ident, $input: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let input = $input;
                let options = vec! $options;
                setlang_testing::run_failure_test::<$state>(&input, &options);
            }
        )*
    );
    ( state($state: ty), options $options: tt, recoverable_failure_tests ( $( ($name: ident, $lhs: expr, $rhs: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            mod $name {
                use super::*;
                #[test]
                fn error_recovery_enabled() {
                    let lhs = $lhs;
                    let rhs = $rhs;
                    let mut options = vec! $options;
                    options.push(TestOption::RecoverFromErrors(true));
                    setlang_testing::run_expansion_equality_test::<$state>(&lhs, &rhs, true, &options);
                }
                #[test]
                fn error_recovery_disabled() {
                    let input = $lhs;
                    let mut options = vec! $options;
                    options.push(TestOption::RecoverFromErrors(false));
                    setlang_testing::run_failure_test::<$state>(&input, &options);
                }
            }
        )*
    );
    ( state($state: ty), options $options: tt, $test_kind: ident $test_cases: tt $(,)? ) => (
        compile_error!("Invalid keyword: test_suite! only accepts the following keywords: `state`, `options`, `expansion_equality_tests`, `failure_tests`, `recoverable_failure_tests`");
    );
    ( state($state: ty), options $options: tt, $( $test_kind: ident $test_cases: tt ),+ $(,)? ) => (
        $(
            setlang_testing::test_suite![state($state), options $options, $test_kind $test_cases,];
        )+
    );
    ( options $options: tt, $( $test_kind: ident $test_cases: tt ),+ $(,)? ) => (
        setlang_testing::test_suite![state(State), options $options, $( $test_kind $test_cases, )+ ];
    );
    ( $( $test_kind: ident $test_cases: tt ),+ $(,)? ) => (
        setlang_testing::test_suite![options (setlang_testing::TestOption::BuiltInCommands(built_in_commands)), $( $test_kind $test_cases, )+ ];
    );
}
