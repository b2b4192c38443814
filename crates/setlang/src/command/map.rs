//! The commands map.

use super::*;
use crate::token::{CsName, NsName};
use galley_stdext::collections::scopedmap;
use galley_stdext::collections::scopedmap::ScopedHashMap;
use std::collections::HashMap;
use std::fmt;

/// Map from namespace-qualified names to commands.
///
/// Every binding lives under a (namespace, name) pair.
/// Lookup first consults the namespace recorded on the token; if nothing is
/// bound there, it falls back to the default namespace, where all built-in
/// commands are registered.
/// Bindings can be copied between namespaces with [import](Map::import) and
/// [export](Map::export); the copy is a snapshot taken at call time, not a
/// live alias.
///
/// The map is scoped: bindings made inside a group are reverted when the
/// group ends, unless they were made globally.
pub struct Map<S> {
    commands: ScopedHashMap<(NsName, CsName), Command<S>>,
    active_chars: ScopedHashMap<char, Command<S>>,
    default_namespace: NsName,
}

impl<S> Map<S> {
    pub(crate) fn new(
        default_namespace: NsName,
        built_in_commands: HashMap<CsName, BuiltIn<S>>,
    ) -> Map<S> {
        Self {
            commands: built_in_commands
                .into_iter()
                .map(|(name, built_in)| ((default_namespace, name), built_in.cmd))
                .collect(),
            active_chars: Default::default(),
            default_namespace,
        }
    }

    /// The namespace that lookup falls back to.
    pub fn default_namespace(&self) -> NsName {
        self.default_namespace
    }

    /// Get the command a token refers to.
    #[inline]
    pub fn get_command(&self, command_ref: &token::CommandRef) -> Option<&Command<S>> {
        match command_ref {
            token::CommandRef::ControlSequence(namespace, name) => {
                match self.commands.get(&(*namespace, *name)) {
                    Some(command) => Some(command),
                    None => {
                        if *namespace == self.default_namespace {
                            None
                        } else {
                            self.commands.get(&(self.default_namespace, *name))
                        }
                    }
                }
            }
            token::CommandRef::ActiveCharacter(c) => self.active_chars.get(c),
        }
    }

    /// Get the tag of the command a token refers to.
    pub fn get_tag(&self, command_ref: &token::CommandRef) -> Option<Tag> {
        self.get_command(command_ref).and_then(Command::tag)
    }

    /// Insert a command under the token's namespace-qualified name.
    pub fn insert(
        &mut self,
        command_ref: token::CommandRef,
        command: Command<S>,
        scope: scopedmap::Scope,
    ) {
        match command_ref {
            token::CommandRef::ControlSequence(namespace, name) => {
                self.commands.insert((namespace, name), command, scope);
            }
            token::CommandRef::ActiveCharacter(c) => {
                self.active_chars.insert(c, command, scope);
            }
        }
    }

    /// Insert a user defined macro.
    pub fn insert_macro(
        &mut self,
        command_ref: token::CommandRef,
        tex_macro: texmacro::Macro,
        scope: scopedmap::Scope,
    ) {
        self.insert(command_ref, Command::Macro(rc::Rc::new(tex_macro)), scope);
    }

    /// Insert a variable command.
    pub fn insert_variable_command(
        &mut self,
        command_ref: token::CommandRef,
        variable_command: variable::Command<S>,
        scope: scopedmap::Scope,
    ) {
        self.insert(
            command_ref,
            Command::Variable(rc::Rc::new(variable_command)),
            scope,
        );
    }

    /// Bind `alias` to the command currently bound to `command`.
    ///
    /// Subsequent redefinition of `command` does not affect the alias.
    pub fn alias_control_sequence(
        &mut self,
        alias: token::CommandRef,
        command: &token::CommandRef,
        scope: scopedmap::Scope,
    ) -> Result<(), InvalidAlias> {
        let command = match self.get_command(command) {
            None => return Err(InvalidAlias {}),
            Some(command) => command,
        };
        self.insert(alias, command.clone(), scope);
        Ok(())
    }

    /// Bind `alias` to a character token.
    pub fn alias_token(
        &mut self,
        alias: token::CommandRef,
        token: token::Token,
        scope: scopedmap::Scope,
    ) {
        self.insert(alias, Command::CharacterTokenAlias(token.value()), scope);
    }

    /// Copy the binding for `name` from the `from` namespace into the `to`
    /// namespace.
    ///
    /// The copy is a snapshot: later changes in either namespace do not
    /// affect the other.
    /// Copying an unbound name is an error.
    pub fn import(
        &mut self,
        from: NsName,
        to: NsName,
        name: CsName,
        scope: scopedmap::Scope,
    ) -> Result<(), ImportError> {
        let command = match self.commands.get(&(from, name)) {
            None => return Err(ImportError {}),
            Some(command) => command.clone(),
        };
        self.commands.insert((to, name), command, scope);
        Ok(())
    }

    pub(crate) fn begin_group(&mut self) {
        self.commands.begin_scope();
        self.active_chars.begin_scope();
    }

    pub(crate) fn end_group(&mut self) -> Result<(), scopedmap::NoScopeToEndError> {
        self.commands.end_scope()?;
        self.active_chars.end_scope()?;
        Ok(())
    }
}

/// Error returned when aliasing an undefined control sequence.
#[derive(Debug)]
pub struct InvalidAlias;

impl fmt::Display for InvalidAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid alias: the control sequence to alias is undefined"
        )
    }
}

impl std::error::Error for InvalidAlias {}

/// Error returned when importing a name with no binding in the source
/// namespace.
#[derive(Debug)]
pub struct ImportError;

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "the name to import is not bound in the source namespace")
    }
}

impl std::error::Error for ImportError {}
