//! Primitives for file input (`\input` and `\endinput`).

use setlang::parse::FileLocation;
use setlang::prelude as sl;
use setlang::traits::*;
use setlang::*;
use setlang_common::HasFileSystem;

/// Get the `\input` expansion primitive.
///
/// The primitive is an expansion command: the file's content replaces the
/// `\input` token in the stream, before execution continues.
pub fn get_input<S: SetlangState + HasFileSystem>() -> command::BuiltIn<S> {
    command::BuiltIn::new_expansion(input_fn)
}

fn input_fn<S: SetlangState + HasFileSystem>(
    input_token: token::Token,
    input: &mut vm::ExpansionInput<S>,
) -> sl::Result<()> {
    let file_location = FileLocation::parse(input)?;
    let (file_path, source_code) =
        setlang_common::read_file_to_string(input.vm(), file_location, "tex")?;
    input.push_source(input_token, file_path, source_code)?;
    Ok(())
}

/// Get the `\endinput` expansion primitive.
pub fn get_endinput<S: SetlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_expansion(endinput_fn)
}

fn endinput_fn<S: SetlangState>(
    _: token::Token,
    input: &mut vm::ExpansionInput<S>,
) -> sl::Result<()> {
    input.end_current_file();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def;
    use setlang_common::InMemoryFileSystem;
    use setlang_testing::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    #[derive(Default)]
    struct State {
        file_system: Rc<RefCell<InMemoryFileSystem>>,
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

    impl HasFileSystem for State {
        fn file_system(&self) -> Rc<RefCell<dyn setlang_common::FileSystem>> {
            self.file_system.clone()
        }
    }

    vm::implement_has_component![State {
        testing: TestingComponent,
    }];

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("def", def::get_def()),
            ("endinput", get_endinput()),
            ("input", get_input()),
        ])
    }

    fn custom_vm_initialization(vm: &mut vm::VM<State>) {
        let working_directory = vm.working_directory.clone().unwrap();
        let mut file_system = InMemoryFileSystem::new(&working_directory);
        file_system.add_string_file("file1.tex", "content1\n");
        file_system.add_string_file("file2.tex", "content2%\n");
        file_system.add_string_file("file3.tex", r"\input nested/file4");
        file_system.add_string_file("nested/file4.tex", "content4");
        file_system.add_string_file(
            "file5.tex",
            "Hello\\def\\Macro{Hola\\endinput Mundo}\\Macro World\n",
        );
        vm.state.file_system = Rc::new(RefCell::new(file_system));
    }

    test_suite!(
        options(
            TestOption::BuiltInCommands(built_in_commands),
            TestOption::CustomVMInitialization(custom_vm_initialization),
        ),
        expansion_equality_tests(
            (basic_case, r"\input file1 hello", "content1 hello"),
            (input_together, r"\input file2 hello", r"content2hello"),
            (basic_case_with_ext, r"\input file1.tex", r"content1"),
            (nested, r"\input file3", r"content4"),
            (end_input_simple, r"Hello\endinput World", "Hello"),
            (
                end_input_in_second_file,
                r"Before\input file5 After",
                "BeforeHelloHolaMundoAfter"
            ),
        ),
        failure_tests((file_does_not_exist, r"\input doesNotExist"),),
    );
}
