//! The typesetting primitives that bridge the interpreter to the Galley
//! node model.
//!
//! The [Component] owns the mode stack, the font catalog, the box
//! registers and the document writer. Box construction primitives open a
//! list builder *and* a context group together: `\hbox{` pushes a
//! horizontal builder and a [GroupKind::Custom] group, and when the
//! matching `}` closes the group the engine's group end handler packages
//! the builder into a box. This keeps the mode stack and the group stack
//! synchronized one-to-one for box-scoped constructs.

use galley::font;
use galley::font::FontCatalog;
use galley::font::FontMetrics;
use galley::hyphen;
use galley::list;
use galley::node;
use galley::writer::DocumentWriter;
use galley_core::{Glue, Scaled};
use setlang::prelude as sl;
use setlang::traits::*;
use setlang::vm::GroupKind;
use setlang::*;

/// Component holding all typesetting state.
pub struct Component {
    modes: list::ModeStack,
    fonts: font::VecFontCatalog,
    current_font: i32,
    box_registers: Vec<Option<BoxRegister>>,
    pending_box: Option<PendingBoxTarget>,
    // One element per open box group: the pending target that was in
    // effect when the group opened. Boxes completed inside the group must
    // not see the outer target.
    pending_box_saves: Vec<Option<PendingBoxTarget>>,
    patterns: Option<hyphen::PatternTable>,
    writer: Option<Box<dyn DocumentWriter>>,
    pages_shipped: usize,
    // Whether a math shift character has opened inline math material that
    // has not been closed yet.
    in_math: bool,
    // Box dimension queries return references; these two fields back the
    // queries that hit a void register.
    zero_dimen: Scaled,
    scratch_dimen: Scaled,
}

/// A box stored in a box register.
pub enum BoxRegister {
    HList(node::HList),
    VList(node::VList),
}

// Where the next completed box should go.
enum PendingBoxTarget {
    // Set by \setbox: the box is stored in a register.
    Register(usize),
    // Set by \shipout: the box becomes a page and goes to the document
    // writer.
    ShipOut,
}

const NUM_BOX_REGISTERS: usize = 256;

impl Default for Component {
    fn default() -> Self {
        Self {
            modes: list::ModeStack::new(),
            fonts: Default::default(),
            current_font: 0,
            box_registers: (0..NUM_BOX_REGISTERS).map(|_| None).collect(),
            pending_box: None,
            pending_box_saves: Vec::new(),
            patterns: None,
            writer: None,
            pages_shipped: 0,
            in_math: false,
            zero_dimen: Scaled::ZERO,
            scratch_dimen: Scaled::ZERO,
        }
    }
}

impl Component {
    /// Register a font and return the id to select it with the `\font`
    /// parameter.
    pub fn register_font(&mut self, font: font::FontTable) -> i32 {
        self.fonts.register(font) as i32
    }

    /// Make the provided font the current font.
    ///
    /// Equivalent to the `\font=n` assignment, but available to drivers
    /// before the run starts.
    pub fn select_font(&mut self, font: i32) {
        self.current_font = font;
    }

    /// Install the document writer that receives shipped out pages.
    pub fn set_document_writer(&mut self, writer: Box<dyn DocumentWriter>) {
        self.writer = Some(writer);
    }

    /// Install a hyphenation pattern table.
    pub fn set_patterns(&mut self, patterns: hyphen::PatternTable) {
        self.patterns = Some(patterns);
    }

    /// The number of pages shipped out so far.
    pub fn pages_shipped(&self) -> usize {
        self.pages_shipped
    }

    /// The mode stack; exposed for tests and drivers.
    pub fn modes(&mut self) -> &mut list::ModeStack {
        &mut self.modes
    }

    /// The box stored in the provided register, if any.
    pub fn box_register(&self, index: usize) -> Option<&BoxRegister> {
        self.box_registers.get(index).and_then(|r| r.as_ref())
    }

    /// Finish the run: close any open paragraph, ship out the main
    /// vertical list as a final page if it is non-empty, and close the
    /// writer.
    pub fn finish(&mut self) -> usize {
        self.close_paragraph();
        let page = self.modes.take_page();
        if !page.is_empty() {
            let page = list::vpack(page, list::BoxTarget::Natural, &self.fonts);
            self.ship_page(page);
        }
        if let Some(writer) = &mut self.writer {
            writer.close();
        }
        self.pages_shipped
    }

    fn metrics(&self) -> &dyn FontMetrics {
        self.fonts.metrics(self.current_font as font::FontId)
    }

    fn ship_page(&mut self, page: node::VList) {
        self.pages_shipped += 1;
        match &mut self.writer {
            Some(writer) => {
                writer.ship_out(page);
            }
            None => log::warn!("no document writer installed; dropping a shipped out page"),
        }
    }

    // Close the open paragraph, hyphenating its material first if a
    // pattern table is installed.
    fn close_paragraph(&mut self) {
        if self.modes.in_paragraph() {
            if let Some(patterns) = &self.patterns {
                if let Some(list::ListBuilder::Horizontal(builder)) = self.modes.current_builder()
                {
                    let list = std::mem::take(&mut builder.list);
                    builder.list = hyphen::insert_discretionaries(list, patterns);
                }
            }
        }
        self.modes.end_paragraph(&self.fonts);
    }
}

/// The em width of the current font, for the `em` unit.
///
/// States using this module install this function as their `em_width` hook.
pub fn em_width<S: HasComponent<Component>>(state: &S) -> Scaled {
    state.component().metrics().quad()
}

/// The ex height of the current font, for the `ex` unit.
pub fn ex_height<S: HasComponent<Component>>(state: &S) -> Scaled {
    state.component().metrics().x_height()
}

static HBOX_TAG: command::StaticTag = command::StaticTag::new();
static VBOX_TAG: command::StaticTag = command::StaticTag::new();
static SETBOX_TAG: command::StaticTag = command::StaticTag::new();

pub fn hbox_tag() -> command::Tag {
    HBOX_TAG.get()
}

pub fn vbox_tag() -> command::Tag {
    VBOX_TAG.get()
}

pub fn setbox_tag() -> command::Tag {
    SETBOX_TAG.get()
}

/// Character handler that builds typesetting material.
///
/// Engines using this module route the VM's character handler here: a
/// character becomes a char node in the current font (starting a paragraph
/// if the engine is in vertical mode), and a space becomes the current
/// font's interword glue.
pub fn character_handler<S: HasComponent<Component>>(
    token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    let c = token.char().expect("the VM only routes character tokens here");
    let component = input.state_mut().component_mut();
    if let token::Value::Space(_) = token.value() {
        // Spaces in vertical mode are discarded.
        if component.modes.mode() == list::Mode::Horizontal {
            let space = component.metrics().space();
            component.modes.append_horizontal(
                node::Glue {
                    kind: node::GlueKind::Normal,
                    value: space,
                }
                .into(),
            );
        }
        return Ok(());
    }
    if let token::Value::MathShift(_) = token.value() {
        // Math shift characters delimit inline math material with marker
        // nodes; the material between them is typeset as regular text.
        component.modes.begin_paragraph_if_vertical();
        let marker = match component.in_math {
            false => node::Math::Before,
            true => node::Math::After,
        };
        component.in_math = !component.in_math;
        component.modes.append_horizontal(marker.into());
        return Ok(());
    }
    component.modes.begin_paragraph_if_vertical();
    component.modes.append_horizontal(
        node::Char {
            char: c,
            font: component.current_font as font::FontId,
        }
        .into(),
    );
    Ok(())
}

/// Group end handler for the box construction groups.
///
/// Engines using this module route the VM's group end handler here.
pub fn group_end_handler<S: HasComponent<Component>>(
    token: token::Token,
    input: &mut vm::ExecutionInput<S>,
    tag: command::Tag,
) -> sl::Result<()> {
    if tag != hbox_tag() && tag != vbox_tag() {
        return Ok(());
    }
    let component = input.state_mut().component_mut();
    let finished = component
        .modes
        .close(&component.fonts)
        .expect("a box group is always opened together with a list builder");
    component.pending_box = component.pending_box_saves.pop().unwrap_or(None);
    dispatch_finished_box(token, input, finished)
}

// Deliver a completed box to its destination: a register, the document
// writer, or the surrounding list.
fn dispatch_finished_box<S: HasComponent<Component>>(
    token: token::Token,
    input: &mut vm::ExecutionInput<S>,
    finished: list::FinishedList,
) -> sl::Result<()> {
    let component = input.state_mut().component_mut();
    match component.pending_box.take() {
        Some(PendingBoxTarget::Register(index)) => {
            component.box_registers[index] = Some(match finished {
                list::FinishedList::Horizontal(hlist) => BoxRegister::HList(hlist),
                list::FinishedList::Vertical(vlist) => BoxRegister::VList(vlist),
            });
            Ok(())
        }
        Some(PendingBoxTarget::ShipOut) => {
            let page = match finished {
                list::FinishedList::Vertical(vlist) => vlist,
                // A horizontal page is wrapped in a vertical list.
                list::FinishedList::Horizontal(hlist) => list::vpack(
                    vec![hlist.into()],
                    list::BoxTarget::Natural,
                    &component.fonts,
                ),
            };
            component.ship_page(page);
            Ok(())
        }
        None => {
            _ = token;
            match finished {
                list::FinishedList::Horizontal(hlist) => match component.modes.mode() {
                    list::Mode::Horizontal => component.modes.append_horizontal(hlist.into()),
                    list::Mode::Vertical => component.modes.append_vertical(hlist.into()),
                },
                list::FinishedList::Vertical(vlist) => match component.modes.mode() {
                    list::Mode::Horizontal => component.modes.append_horizontal(vlist.into()),
                    list::Mode::Vertical => component.modes.append_vertical(vlist.into()),
                },
            }
            Ok(())
        }
    }
}

/// Get the `\hbox` command.
pub fn get_hbox<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(hbox_fn).with_tag(hbox_tag())
}

fn hbox_fn<S: HasComponent<Component>>(
    _: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    let target = parse_box_target(input)?;
    scan_box_begin_group(input)?;
    let component = input.state_mut().component_mut();
    let saved_pending = component.pending_box.take();
    component.pending_box_saves.push(saved_pending);
    component
        .modes
        .push(list::ListBuilder::Horizontal(list::HorizontalBuilder {
            target,
            ..Default::default()
        }));
    input.begin_group(GroupKind::Custom(hbox_tag()));
    Ok(())
}

/// Get the `\vbox` command.
pub fn get_vbox<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(vbox_fn).with_tag(vbox_tag())
}

fn vbox_fn<S: HasComponent<Component>>(
    _: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    let target = parse_box_target(input)?;
    scan_box_begin_group(input)?;
    let component = input.state_mut().component_mut();
    let saved_pending = component.pending_box.take();
    component.pending_box_saves.push(saved_pending);
    component
        .modes
        .push(list::ListBuilder::Vertical(list::VerticalBuilder {
            target,
            ..Default::default()
        }));
    input.begin_group(GroupKind::Custom(vbox_tag()));
    Ok(())
}

// Parse the optional `to <dimen>` or `spread <dimen>` box specification.
fn parse_box_target<S: SetlangState>(
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<list::BoxTarget> {
    if parse::parse_keyword(input.expansion_input(), "to")? {
        let dimension = Scaled::parse(input)?;
        return Ok(list::BoxTarget::To(dimension));
    }
    if parse::parse_keyword(input.expansion_input(), "spread")? {
        let amount = Scaled::parse(input)?;
        return Ok(list::BoxTarget::Spread(amount));
    }
    Ok(list::BoxTarget::Natural)
}

fn scan_box_begin_group<S: SetlangState>(
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    loop {
        let token = input.next_or(BoxEndOfInputError {})?;
        match token.value() {
            token::Value::Space(_) => continue,
            token::Value::BeginGroup(_) => return Ok(()),
            _ => {
                return Err(input.vm().fatal_error(error::SimpleTokenError::new(
                    token,
                    "expected a begin-group token to start the box material",
                )));
            }
        }
    }
}

#[derive(Debug)]
struct BoxEndOfInputError;

impl error::EndOfInputError for BoxEndOfInputError {
    fn doing(&self) -> String {
        "reading the material of a box".into()
    }
}

/// Get the `\setbox` command.
pub fn get_setbox<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(setbox_fn).with_tag(setbox_tag())
}

fn setbox_fn<S: HasComponent<Component>>(
    _: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    // Consume any \global prefix. Box registers are not scoped, so the
    // prefix has no further effect; see the design notes.
    _ = SetlangState::variable_assignment_scope_hook(input.state_mut());
    let (index, _) = <(parse::Uint<NUM_BOX_REGISTERS>, parse::OptionalEquals)>::parse(input)?;
    input.state_mut().component_mut().pending_box = Some(PendingBoxTarget::Register(index.0));
    Ok(())
}

/// Get the `\box` command.
///
/// `\box n` empties register n and contributes the box to the place the
/// engine is currently building: the surrounding list, the target of a
/// pending `\setbox`, or the document writer after `\shipout`.
pub fn get_box<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(box_fn)
}

fn box_fn<S: HasComponent<Component>>(
    token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    let index = parse::Uint::<NUM_BOX_REGISTERS>::parse(input)?;
    let register = input.state_mut().component_mut().box_registers[index.0].take();
    match register {
        // A void register contributes nothing.
        None => {
            input.state_mut().component_mut().pending_box = None;
            Ok(())
        }
        Some(BoxRegister::HList(hlist)) => {
            dispatch_finished_box(token, input, list::FinishedList::Horizontal(hlist))
        }
        Some(BoxRegister::VList(vlist)) => {
            dispatch_finished_box(token, input, list::FinishedList::Vertical(vlist))
        }
    }
}

/// Get the `\shipout` command.
pub fn get_shipout<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(shipout_fn)
}

fn shipout_fn<S: HasComponent<Component>>(
    _: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    input.state_mut().component_mut().pending_box = Some(PendingBoxTarget::ShipOut);
    Ok(())
}

/// Get the `\char` command.
pub fn get_char<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(char_fn)
}

fn char_fn<S: HasComponent<Component>>(
    _: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    let c = char::parse(input)?;
    let component = input.state_mut().component_mut();
    component.modes.begin_paragraph_if_vertical();
    component.modes.append_horizontal(
        node::Char {
            char: c,
            font: component.current_font as font::FontId,
        }
        .into(),
    );
    Ok(())
}

/// Get the `\kern` command.
pub fn get_kern<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(kern_fn)
}

fn kern_fn<S: HasComponent<Component>>(
    _: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    let width = Scaled::parse(input)?;
    let component = input.state_mut().component_mut();
    component.modes.append(
        || {
            node::Kern {
                kind: node::KernKind::Explicit,
                width,
            }
            .into()
        },
        || {
            node::Kern {
                kind: node::KernKind::Explicit,
                width,
            }
            .into()
        },
    );
    Ok(())
}

/// Get the `\hskip` command.
pub fn get_hskip<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(hskip_fn)
}

fn hskip_fn<S: HasComponent<Component>>(
    _: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    let value = Glue::parse(input)?;
    let component = input.state_mut().component_mut();
    component.modes.begin_paragraph_if_vertical();
    component.modes.append_horizontal(
        node::Glue {
            kind: node::GlueKind::Normal,
            value,
        }
        .into(),
    );
    Ok(())
}

/// Get the `\vskip` command.
pub fn get_vskip<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(vskip_fn)
}

fn vskip_fn<S: HasComponent<Component>>(
    _: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    let value = Glue::parse(input)?;
    let component = input.state_mut().component_mut();
    // \vskip is a vertical command: it first ends any open paragraph.
    component.modes.end_paragraph(&component.fonts);
    component.modes.append_vertical(
        node::Glue {
            kind: node::GlueKind::Normal,
            value,
        }
        .into(),
    );
    Ok(())
}

/// Get the `\penalty` command.
pub fn get_penalty<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(penalty_fn)
}

fn penalty_fn<S: HasComponent<Component>>(
    _: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    let value = i32::parse(input)?;
    let component = input.state_mut().component_mut();
    component.modes.append(
        || node::Penalty { value }.into(),
        || node::Penalty { value }.into(),
    );
    Ok(())
}

/// Get the `\discretionary` command.
pub fn get_discretionary<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(discretionary_fn)
}

// \discretionary{pre}{post}{replace-count}. The pre-break and post-break
// material is restricted to character tokens.
fn discretionary_fn<S: HasComponent<Component>>(
    _: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    let pre_break = scan_char_group(input)?;
    let post_break = scan_char_group(input)?;
    let replace_count = parse::Uint::<1024>::parse(input)?;
    let component = input.state_mut().component_mut();
    let font = component.current_font as font::FontId;
    let to_nodes = |chars: Vec<char>| -> Vec<node::Horizontal> {
        chars
            .into_iter()
            .map(|c| node::Char { char: c, font }.into())
            .collect()
    };
    component.modes.begin_paragraph_if_vertical();
    component.modes.append_horizontal(
        node::Discretionary {
            pre_break: to_nodes(pre_break),
            post_break: to_nodes(post_break),
            replace_count: replace_count.0 as u32,
        }
        .into(),
    );
    Ok(())
}

fn scan_char_group<S: SetlangState>(
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<Vec<char>> {
    let first = input.next_or(BoxEndOfInputError {})?;
    match first.value() {
        token::Value::BeginGroup(_) => (),
        _ => {
            return Err(input.vm().fatal_error(error::SimpleTokenError::new(
                first,
                "expected a balanced group of character tokens",
            )));
        }
    }
    let mut tokens = Vec::new();
    parse::finish_parsing_balanced_tokens(input.unexpanded(), &mut tokens)?;
    let mut chars = Vec::new();
    for token in tokens {
        match token.char() {
            Some(c) => chars.push(c),
            None => {
                return Err(input.vm().fatal_error(error::SimpleTokenError::new(
                    token,
                    "only character tokens may appear in discretionary material",
                )));
            }
        }
    }
    Ok(chars)
}

/// Get the `\par` command.
pub fn get_par<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(par_fn)
}

fn par_fn<S: HasComponent<Component>>(
    _: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    input.state_mut().component_mut().close_paragraph();
    Ok(())
}

/// Get the `\patterns` command.
///
/// `\patterns{...}` installs the hyphenation patterns that `\par` applies
/// to paragraph material. The pattern data itself is external; this
/// primitive just parses it.
pub fn get_patterns<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(patterns_fn)
}

fn patterns_fn<S: HasComponent<Component>>(
    _: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> sl::Result<()> {
    let chars = scan_char_group(input)?;
    let text: String = chars.into_iter().collect();
    input
        .state_mut()
        .component_mut()
        .set_patterns(hyphen::PatternTable::parse(&text));
    Ok(())
}

/// Get the `\font` parameter, which selects the current font by id.
///
/// Fonts are registered with [Component::register_font]; font loading
/// itself is outside the interpreter core.
pub fn get_font<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    variable::Command::new_singleton(
        |state: &S, _: variable::Index| -> &i32 { &state.component().current_font },
        |state: &mut S, _: variable::Index| -> &mut i32 {
            &mut state.component_mut().current_font
        },
    )
    .into()
}

macro_rules! box_dimension_commands {
    ($( ($get: ident, $name: expr, $field: ident), )+) => {
        $(
            /// Get the box dimension query command named in the function
            /// name.
            pub fn $get<S: HasComponent<Component>>() -> command::BuiltIn<S> {
                variable::Command::new_array(
                    |state: &S, index: variable::Index| -> &Scaled {
                        let component = state.component();
                        match component.box_register(index.0) {
                            Some(BoxRegister::HList(b)) => &b.$field,
                            Some(BoxRegister::VList(b)) => &b.$field,
                            None => &component.zero_dimen,
                        }
                    },
                    |state: &mut S, index: variable::Index| -> &mut Scaled {
                        let component = state.component_mut();
                        match component.box_registers.get_mut(index.0).and_then(|r| r.as_mut()) {
                            Some(BoxRegister::HList(b)) => &mut b.$field,
                            Some(BoxRegister::VList(b)) => &mut b.$field,
                            // Writes to a void register go nowhere.
                            None => &mut component.scratch_dimen,
                        }
                    },
                    variable::IndexResolver::Dynamic(
                        |_: token::Token,
                         input: &mut vm::ExpansionInput<S>|
                         -> sl::Result<variable::Index> {
                            let index = parse::Uint::<NUM_BOX_REGISTERS>::parse(input)?;
                            Ok(index.0.into())
                        },
                    ),
                )
                .into()
            }
        )+
    };
}

box_dimension_commands![
    (get_wd, "wd", width),
    (get_ht, "ht", height),
    (get_dp, "dp", depth),
];
