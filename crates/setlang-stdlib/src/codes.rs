//! The `\catcode` primitive and the category code table.

use setlang::prelude as sl;
use setlang::token::CatCode;
use setlang::traits::*;
use setlang::*;
use std::collections::HashMap;

/// Component holding the category code table.
///
/// The first 128 characters are stored in an array; everything else goes in
/// a hash map and defaults to the other category.
pub struct Component {
    low: [CatCode; 128],
    high: HashMap<usize, CatCode>,
    default: CatCode,
}

impl Component {
    #[inline]
    pub fn get(&self, u: usize) -> &CatCode {
        match self.low.get(u) {
            None => self.high.get(&u).unwrap_or(&self.default),
            Some(cat_code) => cat_code,
        }
    }

    #[inline]
    pub fn get_mut(&mut self, u: usize) -> &mut CatCode {
        match self.low.get_mut(u) {
            None => self.high.entry(u).or_insert(self.default),
            Some(cat_code) => cat_code,
        }
    }
}

impl Default for Component {
    fn default() -> Self {
        Self {
            low: CatCode::STANDARD_DEFAULTS,
            high: Default::default(),
            default: Default::default(),
        }
    }
}

/// Return the currently defined category code of a character.
///
/// States using this module install this function as their `cat_code` hook.
#[inline]
pub fn cat_code<S: HasComponent<Component>>(state: &S, c: char) -> CatCode {
    *state.component().get(c as usize)
}

/// Get the `\catcode` command.
pub fn get_catcode<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    variable::Command::new_array(
        |state: &S, index: variable::Index| -> &CatCode { state.component().get(index.0) },
        |state: &mut S, index: variable::Index| -> &mut CatCode {
            state.component_mut().get_mut(index.0)
        },
        variable::IndexResolver::Dynamic(
            |_: token::Token, input: &mut vm::ExpansionInput<S>| -> sl::Result<variable::Index> {
                let c = char::parse(input)?;
                Ok((c as usize).into())
            },
        ),
    )
    .into()
}
