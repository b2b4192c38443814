//! The variables API.
//!
//! A variable is a typed, mutable, *scoped* piece of interpreter state: a
//! count register, a category code, a token list.
//! Variables are reached through [variable commands](Command), which are
//! bound to control sequences like `\count` in the commands map.
//!
//! A command consists of a pair of getters — one returning an immutable
//! reference into the state, one a mutable reference — and an
//! [IndexResolver] that determines which element of an array the command
//! refers to (`\count 5` reads the index 5 from the token stream;
//! a command created by `\countdef\x 5` has the index baked in).
//! *Resolving* a command yields a [Variable], which packages the getters
//! with the resolved index.
//!
//! Assignments through this API participate in grouping: the overwritten
//! value is recorded in the VM's save stack and restored when the current
//! group ends, unless the assignment is global.

use crate::error;
use crate::parse::OptionalEquals;
use crate::prelude as sl;
use crate::token;
use crate::token::CatCode;
use crate::traits::*;
use crate::vm;
use galley_core::{Glue, Scaled};
use galley_stdext::collections::scopedmap;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Function signature for a variable's immutable getter.
pub type RefFn<S, T> = fn(state: &S, index: Index) -> &T;

/// Function signature for a variable's mutable getter.
pub type MutRefFn<S, T> = fn(state: &mut S, index: Index) -> &mut T;

/// Index of a variable within an array.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Index(pub usize);

impl From<usize> for Index {
    fn from(value: usize) -> Self {
        Index(value)
    }
}

/// Specification for how the index of an array variable is determined.
pub enum IndexResolver<S> {
    /// A static index, baked into the command.
    ///
    /// Used by commands like the one `\countdef\x 5` creates: `\x` always
    /// refers to count register 5.
    Static(Index),
    /// A dynamic index, determined by reading the input token stream.
    ///
    /// Used by commands like `\count`: in `\count 5` the index is parsed
    /// from the stream.
    Dynamic(fn(token::Token, &mut vm::ExpansionInput<S>) -> sl::Result<Index>),
}

impl<S> IndexResolver<S> {
    fn resolve(
        &self,
        token: token::Token,
        input: &mut vm::ExpansionInput<S>,
    ) -> sl::Result<Index> {
        match self {
            IndexResolver::Static(index) => Ok(*index),
            IndexResolver::Dynamic(f) => f(token, input),
        }
    }
}

/// A variable command.
pub struct Command<S> {
    getters: Getters<S>,
    index_resolver: Option<IndexResolver<S>>,
}

impl<S> Command<S> {
    /// Create a new command for a singleton (non-array) variable.
    pub fn new_singleton<T: SupportedType>(
        ref_fn: RefFn<S, T>,
        ref_mut_fn: MutRefFn<S, T>,
    ) -> Command<S> {
        SupportedType::new_command(ref_fn, ref_mut_fn, None)
    }

    /// Create a new command for an array variable.
    pub fn new_array<T: SupportedType>(
        ref_fn: RefFn<S, T>,
        ref_mut_fn: MutRefFn<S, T>,
        index_resolver: IndexResolver<S>,
    ) -> Command<S> {
        SupportedType::new_command(ref_fn, ref_mut_fn, Some(index_resolver))
    }

    pub(crate) fn new(getters: Getters<S>, index_resolver: Option<IndexResolver<S>>) -> Self {
        Self {
            getters,
            index_resolver,
        }
    }

    /// Create a copy of this command that refers to a fixed element of the
    /// array.
    pub fn new_array_element(&self, index: Index) -> Command<S> {
        Command {
            getters: self.getters.clone(),
            index_resolver: Some(IndexResolver::Static(index)),
        }
    }
}

impl<S: SetlangState> Command<S> {
    /// Resolve the command to obtain a [Variable].
    pub fn resolve(
        &self,
        token: token::Token,
        input: &mut vm::ExpansionInput<S>,
    ) -> sl::Result<Variable<S>> {
        let index = match &self.index_resolver {
            None => Index(0),
            Some(index_resolver) => match index_resolver.resolve(token, input) {
                Ok(index) => index,
                Err(err) => {
                    return Err(error::Error::new_propagated(
                        input.vm(),
                        error::PropagationContext::VariableIndex,
                        token,
                        err,
                    ))
                }
            },
        };
        Ok(match self.getters {
            Getters::Int(a, b) => Variable::Int(TypedVariable(a, b, index)),
            Getters::Dimen(a, b) => Variable::Dimen(TypedVariable(a, b, index)),
            Getters::Glue(a, b) => Variable::Glue(TypedVariable(a, b, index)),
            Getters::CatCode(a, b) => Variable::CatCode(TypedVariable(a, b, index)),
            Getters::TokenList(a, b) => Variable::TokenList(TypedVariable(a, b, index)),
        })
    }

    /// Resolve the command and set the variable's value using the following
    /// tokens in the input stream, as in `\count 0 = 3`.
    pub(crate) fn set_value_using_input(
        &self,
        token: token::Token,
        input: &mut vm::ExecutionInput<S>,
        scope: scopedmap::Scope,
    ) -> sl::Result<()> {
        match self
            .resolve(token, input.expansion_input())?
            .set_value_using_input(input, scope)
        {
            Ok(()) => Ok(()),
            Err(err) => Err(error::Error::new_propagated(
                input.vm(),
                error::PropagationContext::VariableAssignment,
                token,
                err,
            )),
        }
    }
}

/// Immutable reference to the value of a variable.
pub enum ValueRef<'a> {
    Int(&'a i32),
    Dimen(&'a Scaled),
    Glue(&'a Glue),
    CatCode(&'a CatCode),
    TokenList(&'a Vec<token::Token>),
}

/// A variable of any supported type.
pub enum Variable<S> {
    Int(TypedVariable<S, i32>),
    Dimen(TypedVariable<S, Scaled>),
    Glue(TypedVariable<S, Glue>),
    CatCode(TypedVariable<S, CatCode>),
    TokenList(TypedVariable<S, Vec<token::Token>>),
}

impl<S: SetlangState> Variable<S> {
    /// Return a reference to the value of the variable.
    pub fn value<'a>(&self, state: &'a S) -> ValueRef<'a> {
        match self {
            Variable::Int(variable) => ValueRef::Int(variable.get(state)),
            Variable::Dimen(variable) => ValueRef::Dimen(variable.get(state)),
            Variable::Glue(variable) => ValueRef::Glue(variable.get(state)),
            Variable::CatCode(variable) => ValueRef::CatCode(variable.get(state)),
            Variable::TokenList(variable) => ValueRef::TokenList(variable.get(state)),
        }
    }

    fn set_value_using_input(
        &self,
        input: &mut vm::ExecutionInput<S>,
        scope: scopedmap::Scope,
    ) -> sl::Result<()> {
        OptionalEquals::parse(input)?;
        match self {
            Variable::Int(variable) => {
                let value = i32::parse(input)?;
                variable.set(input, scope, value);
            }
            Variable::Dimen(variable) => {
                let value = Scaled::parse(input)?;
                variable.set(input, scope, value);
            }
            Variable::Glue(variable) => {
                let value = Glue::parse(input)?;
                variable.set(input, scope, value);
            }
            Variable::CatCode(variable) => {
                let value = CatCode::parse(input)?;
                variable.set(input, scope, value);
            }
            Variable::TokenList(variable) => {
                let value = parse_token_list_value(input)?;
                variable.set(input, scope, value);
            }
        };
        Ok(())
    }
}

/// Parse the right hand side of a token list assignment: either a balanced
/// group of tokens, or a reference to another token list variable.
fn parse_token_list_value<S: SetlangState>(
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<Vec<token::Token>> {
    let first = input.next_or(TokenListEndOfInputError {})?;
    match first.value() {
        token::Value::BeginGroup(_) => {
            let mut result = Vec::new();
            crate::parse::finish_parsing_balanced_tokens(input.unexpanded(), &mut result)?;
            Ok(result)
        }
        token::Value::CommandRef(command_ref) => {
            let variable_command = match input.commands_map().get_command(&command_ref) {
                Some(crate::command::Command::Variable(command)) => command.clone(),
                _ => {
                    input.vm().error(error::SimpleTokenError::new(
                        first,
                        "expected a balanced group or a token list variable",
                    ))?;
                    return Ok(Vec::new());
                }
            };
            let variable = variable_command.resolve(first, input.expansion_input())?;
            match variable.value(input.state()) {
                ValueRef::TokenList(tokens) => Ok(tokens.clone()),
                _ => {
                    input.vm().error(error::SimpleTokenError::new(
                        first,
                        "expected a variable of token list type",
                    ))?;
                    Ok(Vec::new())
                }
            }
        }
        _ => {
            input.back(first);
            input.vm().error(error::SimpleTokenError::new(
                first,
                "expected a balanced group or a token list variable",
            ))?;
            Ok(Vec::new())
        }
    }
}

#[derive(Debug)]
struct TokenListEndOfInputError;

impl error::EndOfInputError for TokenListEndOfInputError {
    fn doing(&self) -> String {
        "parsing a token list value".into()
    }
}

pub(crate) enum Getters<S> {
    Int(RefFn<S, i32>, MutRefFn<S, i32>),
    Dimen(RefFn<S, Scaled>, MutRefFn<S, Scaled>),
    Glue(RefFn<S, Glue>, MutRefFn<S, Glue>),
    CatCode(RefFn<S, CatCode>, MutRefFn<S, CatCode>),
    TokenList(RefFn<S, Vec<token::Token>>, MutRefFn<S, Vec<token::Token>>),
}

impl<S> Clone for Getters<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Int(a, b) => Self::Int(*a, *b),
            Self::Dimen(a, b) => Self::Dimen(*a, *b),
            Self::Glue(a, b) => Self::Glue(*a, *b),
            Self::CatCode(a, b) => Self::CatCode(*a, *b),
            Self::TokenList(a, b) => Self::TokenList(*a, *b),
        }
    }
}

/// A variable of a specific Rust type `T`.
pub struct TypedVariable<S, T>(RefFn<S, T>, MutRefFn<S, T>, Index);

impl<S, T> Copy for TypedVariable<S, T> {}

impl<S, T> Clone for TypedVariable<S, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, T> TypedVariable<S, T> {
    /// Returns an immutable reference to the variable's value.
    pub fn get<'a>(&self, state: &'a S) -> &'a T {
        (self.0)(state, self.2)
    }

    fn key(&self) -> (usize, usize, Index) {
        (self.0 as usize, self.1 as usize, self.2)
    }
}

impl<S, T> TypedVariable<S, T>
where
    S: SetlangState,
    T: SupportedType,
{
    /// Sets the value of the variable.
    ///
    /// The full execution input must be provided, not just the state,
    /// because of grouping semantics: the overwritten value is saved in the
    /// VM's save stack so that it can be restored when the current group
    /// ends.
    pub fn set(
        &self,
        input: &mut vm::ExecutionInput<S>,
        scope: scopedmap::Scope,
        value: T,
    ) {
        let r: &mut T = (self.1)(input.state_mut(), self.2);
        let overwritten_value = std::mem::replace(r, value);
        if !input.groups().is_empty() {
            SupportedType::update_save_stack(input, self, scope, overwritten_value);
        }
    }
}

impl<S, T> PartialEq for TypedVariable<S, T> {
    fn eq(&self, rhs: &TypedVariable<S, T>) -> bool {
        self.key() == rhs.key()
    }
}

impl<S, T> Eq for TypedVariable<S, T> {}

impl<S, T> Hash for TypedVariable<S, T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// Trait satisfied by all Rust types that can be used as variables.
///
/// The trait exists to make the variables API ergonomic: it provides the
/// uniform constructors on [Command] and routes save stack updates to the
/// per-type map. It cannot be implemented for new types.
pub trait SupportedType: Sized {
    fn new_command<S>(
        ref_fn: RefFn<S, Self>,
        ref_mut_fn: MutRefFn<S, Self>,
        index_resolver: Option<IndexResolver<S>>,
    ) -> Command<S>;

    fn update_save_stack<S>(
        input: &mut vm::ExecutionInput<S>,
        variable: &TypedVariable<S, Self>,
        scope: scopedmap::Scope,
        overwritten_value: Self,
    );
}

fn update_save_stack<S, T, F>(
    input: &mut vm::ExecutionInput<S>,
    variable: &TypedVariable<S, T>,
    scope: scopedmap::Scope,
    overwritten_value: T,
    map_getter: F,
) where
    F: Fn(&mut SaveStackElement<S>) -> &mut SaveStackMap<S, T>,
{
    match scope {
        scopedmap::Scope::Global => {
            for group in input.groups() {
                map_getter(group).remove(variable)
            }
        }
        scopedmap::Scope::Local => {
            if let Some(group) = input.current_group_mut() {
                map_getter(group).save(*variable, overwritten_value);
            }
        }
    }
}

macro_rules! implement_supported_type {
    ($( ($type: ty, $variant: ident, $field: ident), )+) => {
        $(
        impl SupportedType for $type {
            fn new_command<S>(
                ref_fn: RefFn<S, Self>,
                ref_mut_fn: MutRefFn<S, Self>,
                index_resolver: Option<IndexResolver<S>>,
            ) -> Command<S> {
                Command {
                    getters: Getters::$variant(ref_fn, ref_mut_fn),
                    index_resolver,
                }
            }
            fn update_save_stack<S>(
                input: &mut vm::ExecutionInput<S>,
                variable: &TypedVariable<S, Self>,
                scope: scopedmap::Scope,
                overwritten_value: Self,
            ) {
                update_save_stack(input, variable, scope, overwritten_value, |element| {
                    &mut element.$field
                })
            }
        }
        )+
    };
}

implement_supported_type![
    (i32, Int, int),
    (Scaled, Dimen, dimen),
    (Glue, Glue, glue),
    (CatCode, CatCode, catcode),
    (Vec<token::Token>, TokenList, token_list),
];

/// Internal VM data structure used to implement grouping semantics for
/// variables: the per-group record of values to restore.
pub(crate) struct SaveStackElement<S> {
    int: SaveStackMap<S, i32>,
    dimen: SaveStackMap<S, Scaled>,
    glue: SaveStackMap<S, Glue>,
    catcode: SaveStackMap<S, CatCode>,
    token_list: SaveStackMap<S, Vec<token::Token>>,
    /// The namespace that was current when this group was opened, if the
    /// namespace was changed locally inside the group.
    pub(crate) prior_namespace: Option<token::NsName>,
}

impl<S> Default for SaveStackElement<S> {
    fn default() -> Self {
        Self {
            int: Default::default(),
            dimen: Default::default(),
            glue: Default::default(),
            catcode: Default::default(),
            token_list: Default::default(),
            prior_namespace: None,
        }
    }
}

impl<S> SaveStackElement<S> {
    pub(crate) fn restore(self, state: &mut S) {
        self.int.restore(state);
        self.dimen.restore(state);
        self.glue.restore(state);
        self.catcode.restore(state);
        self.token_list.restore(state);
    }
}

pub(crate) struct SaveStackMap<S, T>(HashMap<TypedVariable<S, T>, T>);

impl<S, T> Default for SaveStackMap<S, T> {
    fn default() -> Self {
        Self(HashMap::new())
    }
}

impl<S, T> SaveStackMap<S, T> {
    fn save(&mut self, variable: TypedVariable<S, T>, value: T) {
        self.0.entry(variable).or_insert(value);
    }

    fn remove(&mut self, variable: &TypedVariable<S, T>) {
        self.0.remove(variable);
    }

    fn restore(self, state: &mut S) {
        for (variable, restored_value) in self.0 {
            *(variable.1)(state, variable.2) = restored_value;
        }
    }
}
