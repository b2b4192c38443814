//! The `\the` expansion primitive.
//!
//! `\the` converts an internal value into the token list that denotes it:
//! integers become digit tokens, dimensions and glue become their textual
//! display, and token list variables expand to their contents verbatim.

use setlang::prelude as sl;
use setlang::traits::*;
use setlang::*;

/// Get the `\the` expansion primitive.
pub fn get_the<S: SetlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_expansion(the_primitive_fn)
}

fn the_primitive_fn<S: SetlangState>(
    the_token: token::Token,
    input: &mut vm::ExpansionInput<S>,
) -> sl::Result<()> {
    let token = input.next_or(TheEndOfInputError {})?;
    let command_ref = match token.value() {
        token::Value::CommandRef(command_ref) => command_ref,
        _ => {
            input.back(token);
            return input.vm().error(parse::Error::new(
                "a command with an internal value",
                Some(token),
                GUIDANCE,
            ));
        }
    };
    match input.commands_map().get_command(&command_ref) {
        Some(command::Command::Variable(cmd)) => {
            let variable = cmd.clone().resolve(token, input)?;
            // The value reference borrows the state, so the textual form is
            // produced before tokens are pushed back into the input.
            enum TheValue {
                Text(String),
                Tokens(Vec<token::Token>),
            }
            let value = match variable.value(input.state()) {
                variable::ValueRef::Int(i) => TheValue::Text(i.to_string()),
                variable::ValueRef::Dimen(d) => TheValue::Text(format!("{d}pt")),
                variable::ValueRef::Glue(g) => TheValue::Text(g.to_string()),
                variable::ValueRef::CatCode(c) => TheValue::Text((*c as u8).to_string()),
                variable::ValueRef::TokenList(tokens) => TheValue::Tokens(tokens.clone()),
            };
            match value {
                TheValue::Text(text) => input.push_string_tokens(the_token, &text),
                TheValue::Tokens(tokens) => input.push_expansion(&tokens),
            }
            Ok(())
        }
        Some(command::Command::Character(c)) => {
            let text = (*c as u32).to_string();
            input.push_string_tokens(the_token, &text);
            Ok(())
        }
        cmd => input.vm().error(
            parse::Error::new("a command with an internal value", Some(token), GUIDANCE)
                .with_annotation_override(match cmd {
                    None => "undefined control sequence".to_string(),
                    Some(cmd) => format!["control sequence referencing {cmd}"],
                }),
        ),
    }
}

const GUIDANCE: &str =
    r"\the must be followed by a variable (like \count 1) or a character command (like one defined by \chardef)";

#[derive(Debug)]
struct TheEndOfInputError;

impl error::EndOfInputError for TheEndOfInputError {
    fn doing(&self) -> String {
        r"reading the argument of a \the command".into()
    }
    fn notes(&self) -> Vec<error::display::Note> {
        vec![GUIDANCE.into()]
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
        registers: registers::Component<i32, 16>,
        testing: TestingComponent,
    }];

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("the", get_the()),
            ("count", registers::get_count()),
            ("i", TestingComponent::get_integer()),
        ])
    }

    test_suite![
        expansion_equality_tests(
            (the_positive, r"\i=123 \the\i", "123"),
            (the_negative, r"\i=-456 \the\i", "-456"),
            (the_zero, r"\the\i", "0"),
            (the_count, r"\count 3 = 17 \the\count 3", "17"),
            // The output of \the is tokens, so it can itself be scanned as
            // a number.
            (the_roundtrip, r"\count 1 = 5 \count 2 = \the\count 1 \the\count 2", "5"),
        ),
        failure_tests(
            (the_end_of_input, r"\the"),
            (the_undefined, r"\the\undefined"),
            (the_character, r"\the a"),
        ),
    ];
}
