//! User defined macros.
//!
//! A macro is created at runtime by a definition primitive and consists of a
//! prefix (tokens that must literally follow the macro name), a list of
//! parameters (undelimited, or delimited by a token sequence) and a
//! replacement text.
//! Calling a macro matches the prefix, reads one argument per parameter, and
//! pushes the replacement text onto the input stream with the captured
//! argument token lists substituted verbatim.
//! No re-expansion happens at substitution time; substituted tokens are
//! expanded only when they are later pulled through the expansion loop.

use crate::error;
use crate::prelude as sl;
use crate::token;
use crate::token::Token;
use crate::token::Value;
use crate::traits::*;
use crate::vm;
use galley_stdext::algorithms::substringsearch::Matcher;

/// A user defined macro.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Macro {
    prefix: Vec<Token>,
    parameters: Vec<Parameter>,
    replacements: Vec<Replacement>,
    long: bool,
    outer: bool,
}

/// A token list or parameter in a replacement text.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Replacement {
    /// A list of tokens, stored in reverse order so that it can be copied
    /// directly onto the expansions stack.
    Tokens(Vec<Token>),

    /// A parameter.
    ///
    /// The index must be less than the number of parameters in the macro.
    Parameter(usize),
}

/// A macro parameter.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Parameter {
    /// The argument is a single token or balanced group.
    Undelimited,
    /// The argument is every token up to the delimiter sequence.
    Delimited(Matcher<Value>),
}

impl Macro {
    /// Create a new macro.
    pub fn new(
        prefix: Vec<Token>,
        parameters: Vec<Parameter>,
        replacements: Vec<Replacement>,
    ) -> Macro {
        Macro {
            prefix,
            parameters,
            replacements,
            long: false,
            outer: false,
        }
    }

    /// Mark this macro as `\long`: its arguments may contain `\par` tokens.
    pub fn with_long(mut self) -> Macro {
        self.long = true;
        self
    }

    /// Mark this macro as `\outer`: it may not appear in restricted scanning
    /// contexts such as macro arguments.
    pub fn with_outer(mut self) -> Macro {
        self.outer = true;
        self
    }

    pub fn is_outer(&self) -> bool {
        self.outer
    }

    pub fn replacements(&self) -> &[Replacement] {
        &self.replacements
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Call the macro: match the prefix, read the arguments and push the
    /// substituted replacement text onto the input stream.
    pub fn call<S: SetlangState>(
        &self,
        token: Token,
        input: &mut vm::ExpansionInput<S>,
    ) -> sl::Result<()> {
        remove_tokens_from_stream(&self.prefix, input.unexpanded())?;
        let restrictions = ArgumentRestrictions { long: self.long };
        let mut argument_indices: Vec<(usize, usize)> = Default::default();
        let mut argument_tokens = input.checkout_token_buffer();
        for (i, parameter) in self.parameters.iter().enumerate() {
            let start_index = argument_tokens.len();
            let trim_outer_braces =
                parameter.parse_argument(input, restrictions, i, &mut argument_tokens)?;
            let element = match trim_outer_braces {
                true => (start_index + 1, argument_tokens.len() - 1),
                false => (start_index, argument_tokens.len()),
            };
            argument_indices.push(element);
        }

        let mut arguments: Vec<&[Token]> = Default::default();
        for (i, j) in &argument_indices {
            arguments.push(argument_tokens.get(*i..*j).unwrap());
        }

        let result = input.expansions_mut();
        let num_tokens = Macro::perform_replacement(&self.replacements, &arguments, result);

        // Downgrade to a shared reference to keep the borrow checker happy.
        let result = input.expansions();
        S::post_macro_expansion_hook(
            token,
            input,
            self,
            &arguments,
            &result[result.len() - num_tokens..result.len()],
        );

        input.return_token_buffer(argument_tokens);
        Ok(())
    }

    fn perform_replacement(
        replacements: &[Replacement],
        arguments: &[&[Token]],
        result: &mut Vec<Token>,
    ) -> usize {
        let mut output_size = 0;
        for replacement in replacements.iter() {
            output_size += match replacement {
                Replacement::Tokens(tokens) => tokens.len(),
                Replacement::Parameter(i) => arguments.get(*i).unwrap().len(),
            };
        }
        result.reserve(output_size);
        for replacement in replacements.iter().rev() {
            match replacement {
                Replacement::Tokens(tokens) => {
                    result.extend(tokens);
                }
                Replacement::Parameter(i) => {
                    result.extend(arguments.get(*i).unwrap().iter().rev().copied());
                }
            }
        }
        output_size
    }
}

#[derive(Clone, Copy)]
struct ArgumentRestrictions {
    long: bool,
}

/// Check that a token read while scanning a macro argument is allowed there.
///
/// Two restrictions apply: `\par` may not appear in the argument of a
/// non-`\long` macro (the "runaway argument" error), and a command marked
/// `\outer` may never appear in an argument.
fn check_argument_token<S: SetlangState>(
    vm: &vm::VM<S>,
    restrictions: ArgumentRestrictions,
    token: Token,
) -> sl::Result<()> {
    let command_ref = match token.value() {
        Value::CommandRef(command_ref) => command_ref,
        _ => return Ok(()),
    };
    if let Some(crate::command::Command::Macro(m)) = vm.commands_map.get_command(&command_ref) {
        if m.is_outer() {
            return Err(vm.fatal_error(ForbiddenControlSequenceError {
                token,
                name: command_ref.display(vm.cs_name_interner()),
            }));
        }
    }
    if !restrictions.long {
        if let token::CommandRef::ControlSequence(_, cs_name) = command_ref {
            if vm.cs_name_interner().resolve(cs_name) == Some("par") {
                return Err(vm.fatal_error(RunawayArgumentError { token }));
            }
        }
    }
    Ok(())
}

impl Parameter {
    fn parse_argument<S: SetlangState>(
        &self,
        input: &mut vm::ExpansionInput<S>,
        restrictions: ArgumentRestrictions,
        index: usize,
        result: &mut Vec<Token>,
    ) -> sl::Result<bool> {
        match self {
            Parameter::Undelimited => {
                Parameter::parse_undelimited_argument(input, restrictions, index + 1, result)?;
                Ok(false)
            }
            Parameter::Delimited(matcher_factory) => Parameter::parse_delimited_argument(
                input.unexpanded(),
                restrictions,
                matcher_factory,
                index + 1,
                result,
            ),
        }
    }

    fn parse_delimited_argument<S: SetlangState>(
        stream: &mut vm::UnexpandedStream<S>,
        restrictions: ArgumentRestrictions,
        matcher_factory: &Matcher<Value>,
        param_num: usize,
        result: &mut Vec<Token>,
    ) -> sl::Result<bool> {
        let mut matcher = matcher_factory.start();
        let mut scope_depth = 0;

        // A macro whose parameter text ends with the special #{ tokens has a
        // begin-group character as the last delimiter element, so the
        // argument ends at scope depth 1 rather than 0.
        let closing_scope_depth = match matcher_factory.substring().last() {
            Some(token::Value::BeginGroup(_)) => 1,
            _ => 0,
        };
        let start_index = result.len();
        loop {
            let token = stream.next_or(DelimitedArgumentEndOfInputError { param_num })?;
            check_argument_token(stream.vm(), restrictions, token)?;
            match token.value() {
                token::Value::BeginGroup(_) => {
                    scope_depth += 1;
                }
                token::Value::EndGroup(_) => {
                    scope_depth -= 1;
                }
                _ => (),
            };
            let matches_delimiter = matcher.next(&token.value());
            result.push(token);
            if scope_depth == closing_scope_depth && matches_delimiter {
                // Remove the delimiter tokens from the argument.
                for _ in 0..matcher_factory.substring().len() {
                    result.pop();
                }
                return Ok(Parameter::should_trim_outer_braces_if_present(
                    &result[start_index..],
                ));
            }
        }
    }

    fn should_trim_outer_braces_if_present(list: &[Token]) -> bool {
        if list.len() <= 1 {
            return false;
        }
        matches!(list[0].value(), token::Value::BeginGroup(_))
            && matches!(list[list.len() - 1].value(), token::Value::EndGroup(_))
    }

    fn parse_undelimited_argument<S: SetlangState>(
        input: &mut vm::ExpansionInput<S>,
        restrictions: ArgumentRestrictions,
        param_num: usize,
        result: &mut Vec<Token>,
    ) -> sl::Result<()> {
        let stream = input.unexpanded();
        loop {
            let token = stream.next_or(UndelimitedArgumentEndOfInputError { param_num })?;
            check_argument_token(stream.vm(), restrictions, token)?;
            match token.value() {
                token::Value::Space(_) => continue,
                token::Value::BeginGroup(_) => break,
                _ => {
                    result.push(token);
                    return Ok(());
                }
            }
        }
        let mut depth = 0;
        loop {
            let token = stream.next_or(UndelimitedArgumentEndOfInputError { param_num })?;
            check_argument_token(stream.vm(), restrictions, token)?;
            match token.value() {
                token::Value::BeginGroup(_) => {
                    depth += 1;
                }
                token::Value::EndGroup(_) => {
                    if depth == 0 {
                        return Ok(());
                    }
                    depth -= 1;
                }
                _ => (),
            }
            result.push(token);
        }
    }
}

#[derive(Debug)]
struct DelimitedArgumentEndOfInputError {
    param_num: usize,
}

impl error::EndOfInputError for DelimitedArgumentEndOfInputError {
    fn doing(&self) -> String {
        "parsing a delimited argument for a macro".into()
    }
    fn notes(&self) -> Vec<error::display::Note> {
        vec![format!("this is argument number {} for this macro", self.param_num).into()]
    }
}

#[derive(Debug)]
struct UndelimitedArgumentEndOfInputError {
    param_num: usize,
}

impl error::EndOfInputError for UndelimitedArgumentEndOfInputError {
    fn doing(&self) -> String {
        "parsing an undelimited argument for a macro".into()
    }
    fn notes(&self) -> Vec<error::display::Note> {
        vec![format!("this is argument number {} for this macro", self.param_num).into()]
    }
}

#[derive(Debug)]
struct ForbiddenControlSequenceError {
    token: Token,
    name: String,
}

impl error::SetlangError for ForbiddenControlSequenceError {
    fn kind(&self) -> error::Kind {
        error::Kind::Token(self.token)
    }
    fn title(&self) -> String {
        format!(
            "forbidden control sequence {} found while scanning a macro argument",
            self.name
        )
    }
    fn notes(&self) -> Vec<error::display::Note> {
        vec!["commands marked \\outer may not appear in macro arguments".into()]
    }
}

#[derive(Debug)]
struct RunawayArgumentError {
    token: Token,
}

impl error::SetlangError for RunawayArgumentError {
    fn kind(&self) -> error::Kind {
        error::Kind::Token(self.token)
    }
    fn title(&self) -> String {
        "runaway argument: a \\par token appeared in the argument of a macro".into()
    }
    fn notes(&self) -> Vec<error::display::Note> {
        vec![r"only macros defined with the \long prefix accept \par in their arguments".into()]
    }
}

/// Removes the provided tokens from the front of the stream.
///
/// A mismatch is the fatal "use of macro doesn't match its definition" error.
pub fn remove_tokens_from_stream<S: SetlangState>(
    tokens: &[Token],
    stream: &mut vm::UnexpandedStream<S>,
) -> sl::Result<()> {
    for prefix_token in tokens.iter() {
        let stream_token = stream.next_or(PrefixEndOfInputError {})?;
        if stream_token.value() != prefix_token.value() {
            return Err(stream.vm().fatal_error(error::SimpleTokenError::new(
                stream_token,
                "use of macro doesn't match its definition",
            )));
        }
    }
    Ok(())
}

#[derive(Debug)]
struct PrefixEndOfInputError;

impl error::EndOfInputError for PrefixEndOfInputError {
    fn doing(&self) -> String {
        "matching the prefix of a user-defined macro".into()
    }
}

/// Parse the parameter text of a macro definition, after the name.
///
/// Returns the prefix tokens, the raw parameters, and the token (if any)
/// that the special `#{` notation requires to be appended to the
/// replacement text.
pub fn parse_prefix_and_parameters<I: TokenStream>(
    stream: &mut I,
) -> sl::Result<(Vec<Token>, Vec<Parameter>, Option<Token>)>
where
    I::S: SetlangState,
{
    let mut prefix = Vec::new();
    let mut parameters: Vec<Vec<Token>> = Vec::new();
    let mut replacement_end_token = None;

    loop {
        let token = stream.next_or(ParameterTextEndOfInputError {})?;
        match token.value() {
            Value::BeginGroup(_) => break,
            Value::EndGroup(_) => {
                return Err(stream.vm().fatal_error(error::SimpleTokenError::new(
                    token,
                    "unexpected end-group token while reading the parameter text of a macro",
                )));
            }
            Value::Parameter(_) => {
                let parameter_token = stream.next_or(ParameterTextEndOfInputError {})?;
                match parameter_token.value() {
                    Value::BeginGroup(_) => {
                        // The special #{ notation: the parameter text ends,
                        // and the begin-group token is both the last
                        // delimiter element and an extra token appended to
                        // the replacement text.
                        replacement_end_token = Some(parameter_token);
                        match parameters.last_mut() {
                            None => prefix.push(parameter_token),
                            Some(delimiter) => delimiter.push(parameter_token),
                        }
                        break;
                    }
                    Value::CommandRef(_) => {
                        return Err(stream.vm().fatal_error(error::SimpleTokenError::new(
                            parameter_token,
                            "unexpected control sequence after a parameter token",
                        )));
                    }
                    _ => {
                        let c = parameter_token.char().unwrap();
                        let parameter_index = match char_to_parameter_index(c) {
                            None => {
                                return Err(stream.vm().fatal_error(
                                    error::SimpleTokenError::new(
                                        parameter_token,
                                        "unexpected character after a parameter token",
                                    ),
                                ));
                            }
                            Some(n) => n,
                        };
                        if parameter_index != parameters.len() {
                            return Err(stream.vm().fatal_error(error::SimpleTokenError::new(
                                parameter_token,
                                format!(
                                    "unexpected parameter number {}: expected #{}",
                                    parameter_index + 1,
                                    parameters.len() + 1
                                ),
                            )));
                        }
                        parameters.push(Vec::new());
                    }
                }
            }
            _ => match parameters.last_mut() {
                None => prefix.push(token),
                Some(delimiter) => delimiter.push(token),
            },
        }
    }
    let parameters = parameters
        .into_iter()
        .map(|delimiter| match Matcher::new(
            delimiter.into_iter().map(|t| t.value()).collect(),
        ) {
            None => Parameter::Undelimited,
            Some(matcher) => Parameter::Delimited(matcher),
        })
        .collect();
    Ok((prefix, parameters, replacement_end_token))
}

/// Parse the replacement text of a macro definition.
///
/// The token lists inside the result are reversed, ready to be pushed onto
/// the expansions stack.
///
/// The stream determines the definition flavor: reading from the
/// unexpanded stream gives plain `\def` semantics, while reading from the
/// expanding stream gives the expand-at-definition-time semantics of
/// `\edef`.
pub fn parse_replacement_text<I: TokenStream>(
    stream: &mut I,
    opt_final_token: Option<Token>,
    num_parameters: usize,
) -> sl::Result<Vec<Replacement>>
where
    I::S: SetlangState,
{
    let mut result: Vec<Replacement> = Vec::new();
    let mut scope_depth = 0;
    let push = |result: &mut Vec<Replacement>, token| match result.last_mut() {
        Some(Replacement::Tokens(tokens)) => {
            tokens.push(token);
        }
        _ => {
            result.push(Replacement::Tokens(vec![token]));
        }
    };

    loop {
        let token = stream.next_or(ReplacementTextEndOfInputError {})?;
        match token.value() {
            Value::BeginGroup(_) => {
                scope_depth += 1;
            }
            Value::EndGroup(_) => {
                if scope_depth == 0 {
                    if let Some(final_token) = opt_final_token {
                        push(&mut result, final_token);
                    }
                    for replacement in result.iter_mut() {
                        if let Replacement::Tokens(tokens) = replacement {
                            tokens.reverse();
                        }
                    }
                    return Ok(result);
                }
                scope_depth -= 1;
            }
            Value::Parameter(_) => {
                let parameter_token = stream.next_or(ReplacementTextEndOfInputError {})?;
                let c = match parameter_token.value() {
                    Value::CommandRef(_) => {
                        return Err(stream.vm().fatal_error(error::SimpleTokenError::new(
                            parameter_token,
                            "unexpected control sequence while reading a parameter number",
                        )));
                    }
                    // A doubled parameter token stands for a literal one.
                    Value::Parameter(_) => {
                        push(&mut result, parameter_token);
                        continue;
                    }
                    _ => parameter_token.char().unwrap(),
                };
                let parameter_index = match char_to_parameter_index(c) {
                    None => {
                        return Err(stream.vm().fatal_error(error::SimpleTokenError::new(
                            parameter_token,
                            "unexpected character while reading a parameter number",
                        )));
                    }
                    Some(n) => n,
                };
                if parameter_index >= num_parameters {
                    return Err(stream.vm().fatal_error(error::SimpleTokenError::new(
                        parameter_token,
                        format!(
                            "parameter number {} is out of range: this macro has {} parameter(s)",
                            parameter_index + 1,
                            num_parameters
                        ),
                    )));
                }
                result.push(Replacement::Parameter(parameter_index));
                continue;
            }
            _ => {}
        }

        push(&mut result, token);
    }
}

fn char_to_parameter_index(c: char) -> Option<usize> {
    match c {
        '1'..='9' => Some(c as usize - '1' as usize),
        _ => None,
    }
}

#[derive(Debug)]
struct ParameterTextEndOfInputError;

impl error::EndOfInputError for ParameterTextEndOfInputError {
    fn doing(&self) -> String {
        "reading the parameter text of a macro definition".into()
    }
    fn notes(&self) -> Vec<error::display::Note> {
        vec!["the parameter text of a macro must end with a begin-group token".into()]
    }
}

#[derive(Debug)]
struct ReplacementTextEndOfInputError;

impl error::EndOfInputError for ReplacementTextEndOfInputError {
    fn doing(&self) -> String {
        "reading the replacement text of a macro definition".into()
    }
    fn notes(&self) -> Vec<error::display::Note> {
        vec!["the replacement text of a macro must be a balanced group of tokens".into()]
    }
}
