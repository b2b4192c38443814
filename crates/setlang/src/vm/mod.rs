//! The Setlang virtual machine (VM).
//!
//! The VM owns all of the mutable state of an interpreter run: the commands
//! map, the input source stack, the interners, the tracer, the group stack,
//! and the user-provided state type `S`.
//! This module also contains the main interpreter loop ([VM::run]) and the
//! input streams that wrap the VM.

use crate::command;
use crate::command::BuiltIn;
use crate::command::Command;
use crate::error;
use crate::prelude as sl;
use crate::texmacro;
use crate::token;
use crate::token::lexer;
use crate::token::trace;
use crate::token::CsNameInterner;
use crate::token::NsName;
use crate::token::NsNameInterner;
use crate::token::Token;
use crate::token::Value;
use crate::variable;
use galley_stdext::collections::scopedmap;
use std::collections::HashMap;
use std::path::PathBuf;

mod streams;
pub use streams::*;

/// The maximum number of nested input sources.
const MAX_INPUT_LEVELS: usize = 100;

/// The kind of a group on the group stack.
///
/// The kind determines which construct is allowed to close the group, and
/// whether anything extra happens when it closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// A group opened by a begin-group character and closed by an
    /// end-group character.
    Regular,
    /// A group opened by `\begingroup` and closed by `\endgroup`; the two
    /// kinds of group delimiters may not be mixed.
    Semantic,
    /// A group opened by a primitive (for example a box builder).
    /// It is closed by an end-group character, at which point the
    /// [group_end_handler](Handlers::group_end_handler) runs with the tag.
    Custom(command::Tag),
}

/// Implementations of this trait determine how the VM handles tokens that
/// are not commands, plus the end of custom groups.
///
/// The main loop of the VM reads the next expanded token and performs some
/// action based on it. Most cases are fixed by the language semantics:
/// execution commands run, variable commands trigger an assignment, group
/// characters open and close groups. The remaining cases are business logic
/// of the specific engine being built, and are specified by implementing
/// the handlers here.
pub trait Handlers<S: SetlangState> {
    /// Handler to invoke for character tokens.
    ///
    /// This handler is not invoked for begin group, end group, or active
    /// character tokens; those are handled by the VM itself.
    fn character_handler(
        token: token::Token,
        input: &mut ExecutionInput<S>,
    ) -> sl::Result<()> {
        _ = (token, input);
        Ok(())
    }

    /// Handler to invoke for a control sequence or active character for
    /// which no command is defined.
    fn undefined_command_handler(
        token: token::Token,
        input: &mut ExecutionInput<S>,
    ) -> sl::Result<()> {
        Err(input
            .vm()
            .fatal_error(error::UndefinedCommandError::new(input.vm(), token)))
    }

    /// Handler to invoke for expansion commands that were not expanded,
    /// e.g. the `\the` in `\noexpand\the`.
    fn unexpanded_expansion_command(
        token: token::Token,
        input: &mut ExecutionInput<S>,
    ) -> sl::Result<()> {
        _ = (token, input);
        Ok(())
    }

    /// Handler that runs right after a [GroupKind::Custom] group ends.
    fn group_end_handler(
        token: token::Token,
        input: &mut ExecutionInput<S>,
        tag: command::Tag,
    ) -> sl::Result<()> {
        _ = (token, input, tag);
        Ok(())
    }
}

/// Handlers that do nothing beyond the defaults.
pub struct DefaultHandlers;

impl<S: SetlangState> Handlers<S> for DefaultHandlers {}

/// Implementations of this trait may be used as the state in a VM.
///
/// The trait has no required methods; for any type it can be implemented
/// trivially, and each method then customizes one aspect of the VM's
/// behavior. All methods are dispatched statically.
pub trait SetlangState: Sized {
    /// Get the category code for the provided character.
    ///
    /// The default implementation returns the standard assignment.
    fn cat_code(&self, c: char) -> token::CatCode {
        token::CatCode::standard(c)
    }

    /// Get the current end of line character, or [None] if line endings
    /// are being ignored.
    fn end_line_char(&self) -> Option<char> {
        Some('\r')
    }

    /// Hook invoked after a user defined macro is expanded.
    ///
    /// This hook supports macro tracing.
    fn post_macro_expansion_hook(
        token: Token,
        input: &ExpansionInput<Self>,
        tex_macro: &texmacro::Macro,
        arguments: &[&[Token]],
        reversed_expansion: &[Token],
    ) {
        _ = (token, input, tex_macro, arguments, reversed_expansion);
    }

    /// Hook that potentially overrides the expansion of a command.
    ///
    /// The hook is invoked before an expandable token is expanded; if it
    /// returns a token, that token is the whole expansion and is not
    /// itself expanded. This supports the `\noexpand` primitive.
    fn expansion_override_hook(
        token: token::Token,
        input: &mut ExpansionInput<Self>,
        tag: Option<command::Tag>,
    ) -> sl::Result<Option<Token>> {
        _ = (token, input, tag);
        Ok(None)
    }

    /// The width of an em in the current font.
    ///
    /// Used by the dimension parser for the `em` unit.
    fn em_width(&self) -> galley_core::Scaled {
        galley_core::Scaled::ZERO
    }

    /// The height of an ex in the current font.
    ///
    /// Used by the dimension parser for the `ex` unit.
    fn ex_height(&self) -> galley_core::Scaled {
        galley_core::Scaled::ZERO
    }

    /// Hook that determines the scope of the next assignment.
    ///
    /// This hook supports the `\global` prefix command.
    fn variable_assignment_scope_hook(state: &mut Self) -> scopedmap::Scope {
        _ = state;
        scopedmap::Scope::Local
    }

    /// Hook invoked when a recoverable error is raised.
    ///
    /// Returning `Ok(())` swallows the error and continues the run;
    /// returning the error aborts.
    /// The default implementation aborts; interaction-mode policies that
    /// log and continue are layered on top of this hook.
    fn recoverable_error_hook(
        vm: &VM<Self>,
        recoverable_error: Box<error::Error>,
    ) -> Result<(), Box<error::Error>> {
        _ = vm;
        Err(recoverable_error)
    }
}

impl SetlangState for () {}

// The lexer reads its configuration straight off the state.
impl<T: SetlangState> lexer::Config for T {
    #[inline]
    fn cat_code(&self, c: char) -> token::CatCode {
        SetlangState::cat_code(self, c)
    }
    #[inline]
    fn end_line_char(&self) -> Option<char> {
        SetlangState::end_line_char(self)
    }
}

/// The interaction mode, which selects the error handling policy.
///
/// The core never prompts an operator; the only difference between the
/// modes is whether recoverable errors abort the run or are logged and
/// skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    /// Abort on the first error.
    #[default]
    ErrorStop,
    /// Log recoverable errors and continue.
    Scroll,
    /// Log recoverable errors and continue.
    NonStop,
    /// Continue silently past recoverable errors.
    Batch,
}

/// The Setlang virtual machine.
pub struct VM<S> {
    /// The user-provided state.
    pub state: S,

    /// The commands map.
    pub commands_map: command::Map<S>,

    /// The working directory, used as the root for relative file paths.
    ///
    /// This is [None] if the working directory could not be determined.
    pub working_directory: Option<std::path::PathBuf>,

    /// The maximum number of consecutive expansions performed while
    /// resolving a single token request.
    ///
    /// Exceeding the budget is a fatal error; this is what turns infinite
    /// macro recursion into a reported error rather than a hang or a
    /// native stack overflow.
    pub max_expansion_depth: usize,

    /// The interaction mode.
    pub interaction_mode: InteractionMode,

    internal: Internal<S>,
}

impl<S: Default> VM<S> {
    /// Create a new VM with the provided built-in commands.
    ///
    /// The built-ins are registered in the default namespace.
    pub fn new_with_built_in_commands(
        built_in_commands: HashMap<&str, BuiltIn<S>>,
    ) -> Box<VM<S>> {
        let mut internal = Internal::new();
        let built_in_commands = built_in_commands
            .into_iter()
            .map(|(key, value)| (internal.cs_name_interner.get_or_intern(key), value))
            .collect();
        let default_namespace = internal.default_namespace;
        Box::new(VM {
            state: Default::default(),
            commands_map: command::Map::new(default_namespace, built_in_commands),
            working_directory: match std::env::current_dir() {
                Ok(path_buf) => Some(path_buf),
                Err(err) => {
                    log::warn!("failed to determine the working directory: {err}");
                    None
                }
            },
            max_expansion_depth: 10_000,
            interaction_mode: Default::default(),
            internal,
        })
    }
}

impl<S: SetlangState> VM<S> {
    /// Run the VM until the input is exhausted.
    ///
    /// It is assumed that the VM has been preloaded with source code using
    /// [VM::push_source].
    pub fn run<H: Handlers<S>>(&mut self) -> sl::Result<()> {
        let input = ExecutionInput::new(self);
        loop {
            let token = match input.next()? {
                None => break,
                Some(token) => token,
            };
            match token.value() {
                Value::CommandRef(command_ref) => {
                    match input.commands_map().get_command(&command_ref) {
                        Some(Command::Execution(cmd, _)) => {
                            if log::log_enabled!(log::Level::Trace) {
                                log::trace!(
                                    "executing {}",
                                    command_ref.display(input.vm().cs_name_interner())
                                );
                            }
                            let cmd = *cmd;
                            if let Err(err) = cmd(token, input) {
                                return Err(error::Error::new_propagated(
                                    input.vm(),
                                    error::PropagationContext::Execution,
                                    token,
                                    err,
                                ));
                            }
                        }
                        Some(Command::Variable(cmd)) => {
                            let cmd = cmd.clone();
                            let scope = S::variable_assignment_scope_hook(input.state_mut());
                            cmd.set_value_using_input(token, input, scope)?;
                        }
                        Some(Command::CharacterTokenAlias(token_value)) => {
                            H::character_handler(
                                Token::new_from_value(*token_value, token.trace_key()),
                                input,
                            )?;
                        }
                        Some(Command::Expansion(..)) | Some(Command::Macro(..)) => {
                            H::unexpanded_expansion_command(token, input)?;
                        }
                        Some(Command::Character(c)) => {
                            H::character_handler(
                                token::Token::new_other(*c, token.trace_key()),
                                input,
                            )?;
                        }
                        None => H::undefined_command_handler(token, input)?,
                    }
                }
                Value::BeginGroup(_) => {
                    input.begin_group(GroupKind::Regular);
                }
                Value::EndGroup(_) => match input.current_group_kind() {
                    None | Some(GroupKind::Regular) => {
                        input.end_group(token)?;
                    }
                    Some(GroupKind::Semantic) => {
                        return Err(input.vm().fatal_error(GroupMismatchError {
                            token,
                            expected: "the group must be ended by an \\endgroup command",
                        }));
                    }
                    Some(GroupKind::Custom(tag)) => {
                        input.end_group(token)?;
                        H::group_end_handler(token, input, tag)?;
                    }
                },
                Value::MathShift(_)
                | Value::AlignmentTab(_)
                | Value::Parameter(_)
                | Value::Superscript(_)
                | Value::Subscript(_)
                | Value::Space(_)
                | Value::Letter(_)
                | Value::Other(_) => H::character_handler(token, input)?,
            };
        }
        Ok(())
    }

    /// Add new source code to the VM.
    ///
    /// Source code is organized as a stack; pushed source code is executed
    /// first.
    pub fn push_source<T1: Into<PathBuf>, T2: Into<String>>(
        &mut self,
        file_name: T1,
        source_code: T2,
    ) -> sl::Result<()> {
        self.internal
            .push_source(None, file_name.into(), source_code.into())
            .map_err(|err| error::Error::new_traced(self, Box::new(err)))
    }

    /// Raise a recoverable error.
    ///
    /// The error is routed through the state's
    /// [recoverable_error_hook](SetlangState::recoverable_error_hook),
    /// which decides whether the run continues.
    pub fn error<E: error::SetlangError>(&self, err: E) -> sl::Result<()> {
        let traced = error::Error::new_traced(self, Box::new(err));
        S::recoverable_error_hook(self, traced)
    }

    /// Build a fatal error.
    pub fn fatal_error<E: error::SetlangError>(&self, err: E) -> Box<error::Error> {
        error::Error::new_traced(self, Box::new(err))
    }

    pub(crate) fn eof_error<E: error::EndOfInputError>(&self, err: E) -> Box<error::Error> {
        error::Error::new_traced(self, Box::new(error::EofError::new(err)))
    }
}

impl<S> VM<S> {
    /// Clear all source code from the VM.
    pub fn clear_sources(&mut self) {
        self.internal.clear_sources()
    }

    /// Return a reference to the control sequence name string interner.
    #[inline]
    pub fn cs_name_interner(&self) -> &CsNameInterner {
        &self.internal.cs_name_interner
    }

    /// Return a mutable reference to the control sequence name interner.
    #[inline]
    pub fn cs_name_interner_mut(&mut self) -> &mut CsNameInterner {
        &mut self.internal.cs_name_interner
    }

    /// Return a reference to the namespace name string interner.
    #[inline]
    pub fn ns_name_interner(&self) -> &NsNameInterner {
        &self.internal.ns_name_interner
    }

    /// Return a mutable reference to the namespace name interner.
    #[inline]
    pub fn ns_name_interner_mut(&mut self) -> &mut NsNameInterner {
        &mut self.internal.ns_name_interner
    }

    /// The namespace new control sequence tokens are created in.
    #[inline]
    pub fn current_namespace(&self) -> NsName {
        self.internal.current_namespace
    }

    /// The number of groups that are currently open.
    pub fn open_groups(&self) -> usize {
        self.internal.group_kinds.len()
    }

    pub fn trace(&self, token: Token) -> trace::SourceCodeTrace {
        self.internal
            .tracer
            .trace(token, &self.internal.cs_name_interner)
    }

    pub fn trace_end_of_input(&self) -> trace::SourceCodeTrace {
        self.internal.tracer.trace_end_of_input()
    }

    fn begin_group(&mut self, kind: GroupKind) {
        log::trace!("beginning {kind:?} group at depth {}", self.open_groups());
        self.commands_map.begin_group();
        self.internal.save_stack.push(Default::default());
        self.internal.group_kinds.push(kind);
    }
}

impl<S: SetlangState> VM<S> {
    fn end_group(&mut self, token: token::Token) -> sl::Result<GroupKind> {
        let kind = match self.internal.group_kinds.pop() {
            None => {
                return Err(self.fatal_error(TooManyClosingGroupsError { token }));
            }
            Some(kind) => kind,
        };
        log::trace!("ending {kind:?} group at depth {}", self.open_groups());
        self.commands_map
            .end_group()
            .expect("commands map groups and the group stack are in sync");
        let element = self
            .internal
            .save_stack
            .pop()
            .expect("save stack and the group stack are in sync");
        if let Some(prior) = element.prior_namespace {
            self.internal.current_namespace = prior;
        }
        element.restore(&mut self.state);
        Ok(kind)
    }

    fn set_current_namespace(&mut self, namespace: NsName, scope: scopedmap::Scope) {
        match scope {
            scopedmap::Scope::Local => {
                let prior = self.internal.current_namespace;
                if let Some(element) = self.internal.save_stack.last_mut() {
                    element.prior_namespace.get_or_insert(prior);
                }
            }
            scopedmap::Scope::Global => {
                for element in &mut self.internal.save_stack {
                    element.prior_namespace = None;
                }
            }
        }
        self.internal.current_namespace = namespace;
    }
}

#[derive(Debug)]
struct TooManyClosingGroupsError {
    token: token::Token,
}

impl error::SetlangError for TooManyClosingGroupsError {
    fn kind(&self) -> error::Kind {
        error::Kind::Token(self.token)
    }
    fn title(&self) -> String {
        "too many closing groups: there is no group to end".into()
    }
}

#[derive(Debug)]
struct GroupMismatchError {
    token: token::Token,
    expected: &'static str,
}

impl error::SetlangError for GroupMismatchError {
    fn kind(&self) -> error::Kind {
        error::Kind::Token(self.token)
    }
    fn title(&self) -> String {
        "mismatched group delimiters".into()
    }
    fn notes(&self) -> Vec<error::display::Note> {
        vec![self.expected.into()]
    }
}

#[derive(Debug)]
struct TooManyInputLevelsError;

impl error::SetlangError for TooManyInputLevelsError {
    fn kind(&self) -> error::Kind {
        error::Kind::FailedPrecondition
    }
    fn title(&self) -> String {
        format!("too many levels of input (the maximum is {MAX_INPUT_LEVELS})")
    }
}

/// Parts of the VM that are private.
struct Internal<S> {
    // The sources form a stack. The top element is stored directly for
    // performance.
    current_source: Source,
    sources: Vec<Source>,

    cs_name_interner: CsNameInterner,
    ns_name_interner: NsNameInterner,
    default_namespace: NsName,
    current_namespace: NsName,

    tracer: trace::Tracer,

    token_buffers: std::collections::BinaryHeap<TokenBuffer>,

    save_stack: Vec<variable::SaveStackElement<S>>,
    group_kinds: Vec<GroupKind>,
}

impl<S> Internal<S> {
    fn new() -> Self {
        let mut ns_name_interner: NsNameInterner = Default::default();
        let default_namespace = ns_name_interner.get_or_intern("");
        Internal {
            current_source: Default::default(),
            sources: Default::default(),
            cs_name_interner: Default::default(),
            ns_name_interner,
            default_namespace,
            current_namespace: default_namespace,
            tracer: Default::default(),
            token_buffers: Default::default(),
            save_stack: Default::default(),
            group_kinds: Default::default(),
        }
    }

    fn push_source(
        &mut self,
        token: Option<Token>,
        file_name: PathBuf,
        source_code: String,
    ) -> Result<(), TooManyInputLevelsError> {
        if self.sources.len() + 1 >= MAX_INPUT_LEVELS {
            return Err(TooManyInputLevelsError {});
        }
        log::debug!("opening source {}", file_name.display());
        let trace_key_range = self.tracer.register_source_code(
            token,
            trace::Origin::File(file_name),
            &source_code,
        );
        let mut new_source = Source::new(source_code, trace_key_range);
        std::mem::swap(&mut new_source, &mut self.current_source);
        self.sources.push(new_source);
        Ok(())
    }

    fn end_current_file(&mut self) {
        self.current_source.root.end()
    }

    fn clear_sources(&mut self) {
        self.current_source = Default::default();
        self.sources.clear();
    }

    #[inline]
    fn push_expansion(&mut self, expansion: &[Token]) {
        self.current_source
            .expansions
            .extend(expansion.iter().rev());
    }

    #[inline]
    fn expansions(&self) -> &Vec<Token> {
        &self.current_source.expansions
    }

    #[inline]
    fn expansions_mut(&mut self) -> &mut Vec<Token> {
        &mut self.current_source.expansions
    }

    fn pop_source(&mut self) -> bool {
        match self.sources.pop() {
            None => false,
            Some(source) => {
                log::debug!("closing source");
                self.current_source = source;
                true
            }
        }
    }
}

struct Source {
    expansions: Vec<Token>,
    root: lexer::Lexer,
}

impl Source {
    fn new(source_code: String, trace_key_range: trace::KeyRange) -> Source {
        Source {
            expansions: Vec::with_capacity(32),
            root: lexer::Lexer::new(source_code, trace_key_range),
        }
    }
}

impl Default for Source {
    fn default() -> Self {
        Source::new("".into(), trace::KeyRange::empty())
    }
}

// Token buffers are stored in a binary heap keyed on capacity so that
// checking out a buffer returns the one with the most capacity.
#[derive(Default)]
struct TokenBuffer(Vec<Token>);

impl PartialEq for TokenBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.0.capacity() == other.0.capacity()
    }
}

impl Eq for TokenBuffer {}

impl PartialOrd for TokenBuffer {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TokenBuffer {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.capacity().cmp(&other.0.capacity())
    }
}

/// Helper trait for implementing the component pattern.
///
/// Stateful commands isolate their state in a *component*, a concrete Rust
/// type, and require `HasComponent<TheirComponent>` of the VM state.
/// Any state type that contains the component can implement the trait, most
/// easily with the [implement_has_component] macro, and thereby reuse the
/// commands.
/// This is the crate's main device for avoiding global mutable state while
/// still letting independently-written commands share one state value.
pub trait HasComponent<C>: SetlangState {
    /// Return an immutable reference to the component.
    fn component(&self) -> &C;

    /// Return a mutable reference to the component.
    fn component_mut(&mut self) -> &mut C;
}

/// Implements the [HasComponent] trait for a state struct whose components
/// are direct fields.
///
/// ```
/// # mod mylibrary {
/// #   #[derive(Default)]
/// #   pub struct Component;
/// # }
/// # use setlang::vm::implement_has_component;
/// # use setlang::traits::*;
/// #[derive(Default)]
/// struct MyState {
///     component: mylibrary::Component,
/// }
///
/// impl SetlangState for MyState {}
///
/// implement_has_component![MyState {
///     component: mylibrary::Component,
/// }];
/// ```
#[macro_export]
macro_rules! implement_has_component {
    ( $type: path { $( $field: ident : $component: ty ),+ $(,)? } ) => {
        $(
            impl ::setlang::vm::HasComponent<$component> for $type {
                #[inline]
                fn component(&self) -> &$component {
                    &self.$field
                }
                #[inline]
                fn component_mut(&mut self) -> &mut $component {
                    &mut self.$field
                }
            }
        )+
    };
}

pub use implement_has_component;
