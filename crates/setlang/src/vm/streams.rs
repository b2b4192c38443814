use super::GroupKind;
use super::SetlangState;
use crate::command;
use crate::error;
use crate::prelude as sl;
use crate::token;
use crate::token::trace;
use crate::token::Token;
use crate::variable;
use crate::vm;
use galley_stdext::collections::scopedmap;
use std::path::PathBuf;

/// A stream of tokens generated on demand.
///
/// The front of the stream may be retrieved with [TokenStream::next], peeked
/// at with [TokenStream::peek], or given back with [TokenStream::back].
/// In practice all streams are [ExecutionInput], [ExpansionInput] or
/// [UnexpandedStream]; this trait exists so that generic functions can
/// accept any of them.
///
/// # Note on lazy loading
///
/// A stream cannot, in general, be materialized up front, because reading a
/// token can change how the rest of the input tokenizes and expands.
/// Tokens therefore only come into existence when the stream is advanced.
pub trait TokenStream {
    /// The type of the custom state in the VM.
    type S;

    /// Gets the next token in the stream, or `Ok(None)` at end of input.
    fn next(&mut self) -> sl::Result<Option<Token>>;

    /// Peeks at the next token in the stream without removing it.
    ///
    /// Peeking requires a mutable reference because determining the next
    /// token may require mutation: reading more characters from a source,
    /// or performing an (irreversible) expansion.
    fn peek(&mut self) -> sl::Result<Option<&Token>>;

    /// Returns a token to the front of the stream.
    ///
    /// The token will be the next token observed.
    /// Any finite number of tokens may be pushed back this way, and
    /// scanning must observe all of them, newest first, before consuming
    /// further raw input.
    fn back(&mut self, token: Token);

    /// Consumes the next token without returning it.
    ///
    /// Typically used after a peek, when the token itself is not needed.
    fn consume(&mut self) -> sl::Result<()> {
        self.next().map(|_| ())
    }

    /// Gets the next token, raising an end-of-input error if the stream is
    /// exhausted.
    fn next_or<E: error::EndOfInputError>(&mut self, eof_error: E) -> sl::Result<Token>
    where
        Self::S: SetlangState,
    {
        match self.next()? {
            Some(token) => Ok(token),
            None => Err(self.vm().eof_error(eof_error)),
        }
    }

    /// Returns a reference to the VM.
    fn vm(&self) -> &vm::VM<Self::S>;

    /// Returns a reference to the commands map.
    #[inline]
    fn commands_map(&self) -> &command::Map<Self::S> {
        &self.vm().commands_map
    }

    /// Returns a reference to the custom state.
    #[inline]
    fn state(&self) -> &Self::S {
        &self.vm().state
    }

    fn trace(&self, token: Token) -> trace::SourceCodeTrace {
        self.vm().trace(token)
    }

    fn trace_end_of_input(&self) -> trace::SourceCodeTrace {
        self.vm().trace_end_of_input()
    }
}

/// Stream that returns input tokens without performing expansion.
///
/// Used when reading tokens that must not be expanded, e.g. the replacement
/// text of a `\def`.
#[repr(transparent)]
pub struct UnexpandedStream<S>(vm::VM<S>);

impl<S: SetlangState> TokenStream for UnexpandedStream<S> {
    type S = S;

    #[inline]
    fn next(&mut self) -> sl::Result<Option<Token>> {
        stream::next_unexpanded(&mut self.0)
    }

    #[inline]
    fn peek(&mut self) -> sl::Result<Option<&Token>> {
        stream::peek_unexpanded(&mut self.0)
    }

    #[inline]
    fn back(&mut self, token: Token) {
        self.0.internal.expansions_mut().push(token);
    }

    #[inline]
    fn vm(&self) -> &vm::VM<S> {
        &self.0
    }
}

/// Input type for expansion primitives.
///
/// This type provides:
///
/// - Access to the input stream, with expansion ([TokenStream] methods) or
///   without ([ExpansionInput::unexpanded]).
///
/// - Access to the VM: read-only, except for the state and the commands
///   map.
///
/// - The ability to push source code or token expansions to the front of
///   the input stream.
///
/// - Reusable token buffers.
#[repr(transparent)]
pub struct ExpansionInput<S>(vm::VM<S>);

impl<S: SetlangState> TokenStream for ExpansionInput<S> {
    type S = S;

    #[inline]
    fn next(&mut self) -> sl::Result<Option<Token>> {
        stream::next_expanded(&mut self.0)
    }

    #[inline]
    fn peek(&mut self) -> sl::Result<Option<&Token>> {
        stream::peek_expanded(&mut self.0)
    }

    #[inline]
    fn back(&mut self, token: Token) {
        self.0.internal.expansions_mut().push(token);
    }

    #[inline]
    fn vm(&self) -> &vm::VM<S> {
        &self.0
    }
}

impl<S> AsMut<ExpansionInput<S>> for ExpansionInput<S> {
    fn as_mut(&mut self) -> &mut ExpansionInput<S> {
        self
    }
}

impl<S> AsMut<ExpansionInput<S>> for ExecutionInput<S> {
    fn as_mut(&mut self) -> &mut ExpansionInput<S> {
        self.expansion_input()
    }
}

impl<S> ExpansionInput<S> {
    /// Creates a mutable reference to this type from the [VM](vm::VM) type.
    #[inline]
    pub fn new(vm: &mut vm::VM<S>) -> &mut ExpansionInput<S> {
        // SAFETY: ExpansionInput is a repr(transparent) wrapper over VM, so
        // the cast is sound.
        unsafe { &mut *(vm as *mut vm::VM<S> as *mut ExpansionInput<S>) }
    }

    /// Returns the underlying unexpanded stream.
    #[inline]
    pub fn unexpanded(&mut self) -> &mut UnexpandedStream<S> {
        // SAFETY: UnexpandedStream is a repr(transparent) wrapper over VM.
        unsafe { &mut *(&mut self.0 as *mut vm::VM<S> as *mut UnexpandedStream<S>) }
    }

    /// Push tokens to the front of the input stream.
    ///
    /// The first token in the provided slice will be the next token read.
    #[inline]
    pub fn push_expansion(&mut self, expansion: &[Token]) {
        self.0.internal.push_expansion(expansion)
    }

    /// Returns a reference to the expanded tokens stack for the current
    /// input source.
    ///
    /// The tokens are a stack: the next token to be read is the last token
    /// in the vector.
    #[inline]
    pub fn expansions(&self) -> &Vec<Token> {
        self.0.internal.expansions()
    }

    /// Returns a mutable reference to the expanded tokens stack for the
    /// current input source.
    ///
    /// Pushing tokens through this reference avoids the allocation that
    /// [ExpansionInput::push_expansion] may perform.
    #[inline]
    pub fn expansions_mut(&mut self) -> &mut Vec<Token> {
        self.0.internal.expansions_mut()
    }

    /// Returns a mutable reference to the control sequence name interner.
    ///
    /// Used by expansion primitives that synthesize new control sequences.
    #[inline]
    pub fn cs_name_interner_mut(&mut self) -> &mut crate::token::CsNameInterner {
        self.0.cs_name_interner_mut()
    }

    /// Returns a mutable reference to the commands map.
    ///
    /// Most expansion primitives only read the map; this exists for the
    /// ones, like `\csname`, that bind names as part of expanding.
    #[inline]
    pub fn commands_map_mut(&mut self) -> &mut command::Map<S> {
        &mut self.0.commands_map
    }

    /// Returns a mutable reference to the state.
    ///
    /// Most expansion primitives don't mutate the state; this exists for
    /// the ones, like the conditionals, that keep bookkeeping in a
    /// component.
    #[inline]
    pub fn state_mut(&mut self) -> &mut S {
        &mut self.0.state
    }

    /// Returns a vector that can be used as a token buffer, potentially
    /// without allocating memory.
    ///
    /// The returned vector is empty but will generally have non-zero
    /// capacity from previous uses.
    /// Return it with [ExpansionInput::return_token_buffer] when finished.
    pub fn checkout_token_buffer(&mut self) -> Vec<Token> {
        self.0
            .internal
            .token_buffers
            .pop()
            .unwrap_or_default()
            .0
    }

    /// Return a token buffer, allowing it to be reused.
    pub fn return_token_buffer(&mut self, mut token_buffer: Vec<Token>) {
        token_buffer.clear();
        self.0
            .internal
            .token_buffers
            .push(super::TokenBuffer(token_buffer))
    }
}

impl<S: SetlangState> ExpansionInput<S> {
    /// Expand the next token in the input exactly once.
    ///
    /// If, after the expansion, the next token is expandable it will not be
    /// expanded further.
    /// Returns whether an expansion was performed.
    pub fn expand_once(&mut self) -> sl::Result<bool> {
        stream::expand_once(&mut self.0)
    }

    /// Push source code to the front of the input stream.
    ///
    /// Used by the file input primitive.
    pub fn push_source(
        &mut self,
        token: Token,
        file_name: PathBuf,
        source_code: String,
    ) -> sl::Result<()> {
        match self
            .0
            .internal
            .push_source(Some(token), file_name, source_code)
        {
            Ok(()) => Ok(()),
            Err(err) => Err(error::Error::new_traced(&self.0, Box::new(err))),
        }
    }

    /// Stop reading the current file.
    ///
    /// Used by the primitive that ends file input early.
    pub fn end_current_file(&mut self) {
        self.0.internal.end_current_file()
    }

    /// Push string content to the front of the input stream as tokens.
    ///
    /// Alphabetic characters become letter tokens, spaces become space
    /// tokens, and all other characters become other tokens.
    pub fn push_string_tokens(&mut self, token: Token, s: &str) {
        let trace_key = token.trace_key();
        for c in s.chars().rev() {
            let token = match c {
                ' ' => token::Token::new_space(' ', trace_key),
                c if c.is_alphabetic() => token::Token::new_letter(c, trace_key),
                _ => token::Token::new_other(c, trace_key),
            };
            self.expansions_mut().push(token);
        }
    }
}

/// Input type for execution primitives.
///
/// In addition to everything [ExpansionInput] provides, this type gives
/// mutable access to the state, the commands map, and the group stack.
#[repr(transparent)]
pub struct ExecutionInput<S>(vm::VM<S>);

impl<S: SetlangState> TokenStream for ExecutionInput<S> {
    type S = S;

    #[inline]
    fn next(&mut self) -> sl::Result<Option<Token>> {
        stream::next_expanded(&mut self.0)
    }

    #[inline]
    fn peek(&mut self) -> sl::Result<Option<&Token>> {
        stream::peek_expanded(&mut self.0)
    }

    #[inline]
    fn back(&mut self, token: Token) {
        self.0.internal.expansions_mut().push(token);
    }

    #[inline]
    fn vm(&self) -> &vm::VM<S> {
        &self.0
    }
}

impl<S> ExecutionInput<S> {
    /// Creates a mutable reference to this type from the [VM](vm::VM) type.
    #[inline]
    pub fn new(vm: &mut vm::VM<S>) -> &mut ExecutionInput<S> {
        // SAFETY: ExecutionInput is a repr(transparent) wrapper over VM.
        unsafe { &mut *(vm as *mut vm::VM<S> as *mut ExecutionInput<S>) }
    }

    /// Returns the underlying unexpanded stream.
    #[inline]
    pub fn unexpanded(&mut self) -> &mut UnexpandedStream<S> {
        // SAFETY: UnexpandedStream is a repr(transparent) wrapper over VM.
        unsafe { &mut *(&mut self.0 as *mut vm::VM<S> as *mut UnexpandedStream<S>) }
    }

    /// Views this input as an expansion input.
    #[inline]
    pub fn expansion_input(&mut self) -> &mut ExpansionInput<S> {
        ExpansionInput::new(&mut self.0)
    }

    /// Returns a mutable reference to the commands map.
    #[inline]
    pub fn commands_map_mut(&mut self) -> &mut command::Map<S> {
        &mut self.0.commands_map
    }

    /// Returns a mutable reference to the namespace name interner.
    #[inline]
    pub fn ns_name_interner_mut(&mut self) -> &mut crate::token::NsNameInterner {
        self.0.ns_name_interner_mut()
    }

    /// Returns a mutable reference to the state.
    #[inline]
    pub fn state_mut(&mut self) -> &mut S {
        &mut self.0.state
    }

    #[inline]
    pub(crate) fn groups(&mut self) -> &mut [variable::SaveStackElement<S>] {
        &mut self.0.internal.save_stack
    }

    pub(crate) fn current_group_mut(&mut self) -> Option<&mut variable::SaveStackElement<S>> {
        self.0.internal.save_stack.last_mut()
    }

    /// The kind of the innermost open group, or [None] if no group is open.
    pub fn current_group_kind(&self) -> Option<GroupKind> {
        self.0.internal.group_kinds.last().copied()
    }
}

impl<S: SetlangState> ExecutionInput<S> {
    /// Open a new group of the provided kind.
    pub fn begin_group(&mut self, kind: GroupKind) {
        self.0.begin_group(kind)
    }

    /// Close the innermost group, undoing its local mutations.
    ///
    /// Closing a group that was never opened is a fatal error.
    pub fn end_group(&mut self, token: Token) -> sl::Result<GroupKind> {
        self.0.end_group(token)
    }

    /// Set the namespace that subsequently scanned control sequence tokens
    /// are created in.
    pub fn set_current_namespace(&mut self, namespace: token::NsName, scope: scopedmap::Scope) {
        self.0.set_current_namespace(namespace, scope)
    }
}

mod stream {
    use super::*;

    #[derive(Debug)]
    pub(super) struct InvalidCharacterError {
        c: char,
        trace_key: trace::Key,
    }

    impl error::SetlangError for InvalidCharacterError {
        fn kind(&self) -> error::Kind {
            error::Kind::Token(Token::new_other(self.c, self.trace_key))
        }
        fn title(&self) -> String {
            format!(
                "input contains a character {:?} with the invalid category code",
                self.c
            )
        }
        fn notes(&self) -> Vec<error::display::Note> {
            vec!["the character has been ignored".into()]
        }
    }

    pub fn next_unexpanded<S: SetlangState>(vm: &mut vm::VM<S>) -> sl::Result<Option<Token>> {
        loop {
            if let Some(token) = vm.internal.current_source.expansions.pop() {
                return Ok(Some(token));
            }
            let namespace = vm.internal.current_namespace;
            match vm.internal.current_source.root.next(
                &vm.state,
                &mut vm.internal.cs_name_interner,
                namespace,
            ) {
                Ok(Some(token)) => return Ok(Some(token)),
                Ok(None) => {
                    if !vm.internal.pop_source() {
                        return Ok(None);
                    }
                }
                Err(crate::token::lexer::Error::InvalidCharacter(c, trace_key)) => {
                    // Lexical errors are recoverable: report and skip.
                    vm.error(InvalidCharacterError { c, trace_key })?;
                }
            }
        }
    }

    pub fn peek_unexpanded<S: SetlangState>(vm: &mut vm::VM<S>) -> sl::Result<Option<&Token>> {
        match next_unexpanded(vm)? {
            None => Ok(None),
            Some(token) => {
                vm.internal.expansions_mut().push(token);
                Ok(vm.internal.expansions().last())
            }
        }
    }

    #[derive(Debug)]
    struct ExpansionLoopError {
        token: Token,
        limit: usize,
    }

    impl error::SetlangError for ExpansionLoopError {
        fn kind(&self) -> error::Kind {
            error::Kind::Token(self.token)
        }
        fn title(&self) -> String {
            format!(
                "expansion loop too deep: more than {} expansions were performed while resolving one token",
                self.limit
            )
        }
        fn notes(&self) -> Vec<error::display::Note> {
            vec![
                "this is usually caused by a macro that expands to itself".into(),
                "the budget can be changed with the VM's max_expansion_depth setting".into(),
            ]
        }
    }

    /// Get the next token, fully expanding macros and expansion commands.
    ///
    /// This runs as an iterative loop, not recursion, and the number of
    /// expansions performed to serve a single request is bounded by the
    /// VM's expansion budget. Infinite macro recursion thus surfaces as a
    /// defined error instead of a native stack overflow.
    pub fn next_expanded<S: SetlangState>(vm: &mut vm::VM<S>) -> sl::Result<Option<Token>> {
        let mut depth: usize = 0;
        loop {
            let token = match next_unexpanded(vm)? {
                None => return Ok(None),
                Some(token) => token,
            };
            let command_ref = match token.value() {
                token::Value::CommandRef(command_ref) => command_ref,
                _ => return Ok(Some(token)),
            };
            match vm.commands_map.get_command(&command_ref) {
                Some(command::Command::Expansion(cmd, tag)) => {
                    let cmd = *cmd;
                    let tag = *tag;
                    depth += 1;
                    if depth > vm.max_expansion_depth {
                        return Err(vm.fatal_error(ExpansionLoopError {
                            token,
                            limit: vm.max_expansion_depth,
                        }));
                    }
                    match S::expansion_override_hook(token, ExpansionInput::new(vm), tag) {
                        Ok(None) => (),
                        Ok(Some(override_expansion)) => {
                            return Ok(Some(override_expansion));
                        }
                        Err(err) => return Err(convert_command_error(vm, token, err)),
                    };
                    if let Err(err) = cmd(token, ExpansionInput::new(vm)) {
                        return Err(convert_command_error(vm, token, err));
                    }
                }
                Some(command::Command::Macro(tex_macro)) => {
                    let tex_macro = tex_macro.clone();
                    depth += 1;
                    if depth > vm.max_expansion_depth {
                        return Err(vm.fatal_error(ExpansionLoopError {
                            token,
                            limit: vm.max_expansion_depth,
                        }));
                    }
                    if let Err(err) = tex_macro.call(token, ExpansionInput::new(vm)) {
                        return Err(convert_command_error(vm, token, err));
                    }
                }
                _ => return Ok(Some(token)),
            }
        }
    }

    pub fn peek_expanded<S: SetlangState>(vm: &mut vm::VM<S>) -> sl::Result<Option<&Token>> {
        match next_expanded(vm)? {
            None => Ok(None),
            Some(token) => {
                vm.internal.expansions_mut().push(token);
                Ok(vm.internal.expansions().last())
            }
        }
    }

    pub fn expand_once<S: SetlangState>(vm: &mut vm::VM<S>) -> sl::Result<bool> {
        let token = match next_unexpanded(vm)? {
            None => return Ok(false),
            Some(token) => token,
        };
        let command_ref = match token.value() {
            token::Value::CommandRef(command_ref) => command_ref,
            _ => {
                vm.internal.expansions_mut().push(token);
                return Ok(false);
            }
        };
        match vm.commands_map.get_command(&command_ref) {
            Some(command::Command::Expansion(cmd, tag)) => {
                let cmd = *cmd;
                let tag = *tag;
                match S::expansion_override_hook(token, ExpansionInput::new(vm), tag) {
                    Ok(None) => (),
                    Ok(Some(override_expansion)) => {
                        vm.internal.expansions_mut().push(override_expansion);
                        return Ok(true);
                    }
                    Err(err) => return Err(convert_command_error(vm, token, err)),
                };
                if let Err(err) = cmd(token, ExpansionInput::new(vm)) {
                    return Err(convert_command_error(vm, token, err));
                }
                Ok(true)
            }
            Some(command::Command::Macro(tex_macro)) => {
                let tex_macro = tex_macro.clone();
                if let Err(err) = tex_macro.call(token, ExpansionInput::new(vm)) {
                    return Err(convert_command_error(vm, token, err));
                }
                Ok(true)
            }
            _ => {
                vm.internal.expansions_mut().push(token);
                Ok(false)
            }
        }
    }

    fn convert_command_error<S>(
        vm: &mut vm::VM<S>,
        token: Token,
        err: Box<error::Error>,
    ) -> Box<error::Error> {
        error::Error::new_propagated(vm, error::PropagationContext::Expansion, token, err)
    }
}
