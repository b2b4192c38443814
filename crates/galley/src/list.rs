//! List builders and the mode stack.
//!
//! Typesetting material accumulates into the builder at the top of a
//! [ModeStack]. Box construction primitives push a new builder when a box
//! opens and close it when the box ends; closing packages the accumulated
//! nodes into a box via [hpack] or [vpack].
//!
//! The mode stack mirrors the interpreter's group stack one-to-one for
//! box-scoped constructs: whoever pushes a builder is responsible for also
//! opening a group, and for closing both together.

use crate::font;
use crate::node;
use galley_core::GlueOrder;
use galley_core::Scaled;

/// The mode a builder accumulates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Horizontal,
    Vertical,
}

/// How the width (for hboxes) or height (for vboxes) of a box is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoxTarget {
    /// The natural dimension of the contents.
    #[default]
    Natural,
    /// A fixed dimension; glue is stretched or shrunk to match.
    To(Scaled),
    /// The natural dimension plus the provided amount.
    Spread(Scaled),
}

impl BoxTarget {
    fn resolve(&self, natural: Scaled) -> Scaled {
        match self {
            BoxTarget::Natural => natural,
            BoxTarget::To(dimension) => *dimension,
            BoxTarget::Spread(amount) => natural + *amount,
        }
    }
}

/// A builder that accumulates nodes of one mode.
pub enum ListBuilder {
    Horizontal(HorizontalBuilder),
    Vertical(VerticalBuilder),
}

impl ListBuilder {
    pub fn mode(&self) -> Mode {
        match self {
            ListBuilder::Horizontal(_) => Mode::Horizontal,
            ListBuilder::Vertical(_) => Mode::Vertical,
        }
    }
}

/// Builder for a horizontal list.
#[derive(Default)]
pub struct HorizontalBuilder {
    pub list: Vec<node::Horizontal>,
    pub target: BoxTarget,
    /// Whether this builder was opened implicitly to start a paragraph, as
    /// opposed to explicitly by a box primitive.
    pub is_paragraph: bool,
}

/// Builder for a vertical list.
#[derive(Default)]
pub struct VerticalBuilder {
    pub list: Vec<node::Vertical>,
    pub target: BoxTarget,
}

/// A finished list, returned when a builder is closed.
pub enum FinishedList {
    Horizontal(node::HList),
    Vertical(node::VList),
}

/// The stack of open list builders.
///
/// The bottom of the stack is the main vertical list, which exists for the
/// whole run and receives completed paragraphs and pages.
pub struct ModeStack {
    bottom: VerticalBuilder,
    stack: Vec<ListBuilder>,
}

impl Default for ModeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeStack {
    pub fn new() -> ModeStack {
        ModeStack {
            bottom: VerticalBuilder::default(),
            stack: Vec::new(),
        }
    }

    /// The mode of the innermost open builder.
    pub fn mode(&self) -> Mode {
        match self.stack.last() {
            None => Mode::Vertical,
            Some(builder) => builder.mode(),
        }
    }

    /// The number of builders pushed above the main vertical list.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Open a new builder.
    pub fn push(&mut self, builder: ListBuilder) {
        log::trace!("opening a {:?} mode list at depth {}", builder.mode(), self.depth());
        self.stack.push(builder);
    }

    /// Close the innermost builder and package its list into a box.
    ///
    /// Returns [None] if only the main vertical list is open; the main list
    /// is never closed this way.
    pub fn close(&mut self, fonts: &dyn font::FontCatalog) -> Option<FinishedList> {
        let builder = self.stack.pop()?;
        log::trace!("closing a {:?} mode list at depth {}", builder.mode(), self.depth());
        Some(match builder {
            ListBuilder::Horizontal(builder) => {
                FinishedList::Horizontal(hpack(builder.list, builder.target, fonts))
            }
            ListBuilder::Vertical(builder) => {
                FinishedList::Vertical(vpack(builder.list, builder.target, fonts))
            }
        })
    }

    /// Append a node to the innermost horizontal builder.
    ///
    /// Panics if the current mode is not horizontal; callers switch modes
    /// first via [ModeStack::begin_paragraph_if_vertical].
    pub fn append_horizontal(&mut self, node: node::Horizontal) {
        match self.stack.last_mut() {
            Some(ListBuilder::Horizontal(builder)) => builder.list.push(node),
            _ => panic!("append_horizontal called in vertical mode"),
        }
    }

    /// Append a node to the innermost vertical builder.
    pub fn append_vertical(&mut self, node: node::Vertical) {
        match self.stack.last_mut() {
            Some(ListBuilder::Vertical(builder)) => builder.list.push(node),
            Some(ListBuilder::Horizontal(_)) => {
                panic!("append_vertical called in horizontal mode")
            }
            None => self.bottom.list.push(node),
        }
    }

    /// Append a node to the current builder, whatever its mode.
    ///
    /// The node value is chosen by the matching callback.
    pub fn append(
        &mut self,
        horizontal: impl FnOnce() -> node::Horizontal,
        vertical: impl FnOnce() -> node::Vertical,
    ) {
        match self.mode() {
            Mode::Horizontal => self.append_horizontal(horizontal()),
            Mode::Vertical => self.append_vertical(vertical()),
        }
    }

    /// If the current mode is vertical, start a paragraph: push an implicit
    /// horizontal builder.
    ///
    /// Returns true if a paragraph was started. This is the mode-specific
    /// restriction for character material: a character in vertical mode
    /// first switches the engine into horizontal mode.
    pub fn begin_paragraph_if_vertical(&mut self) -> bool {
        if self.mode() == Mode::Horizontal {
            return false;
        }
        self.push(ListBuilder::Horizontal(HorizontalBuilder {
            is_paragraph: true,
            ..Default::default()
        }));
        true
    }

    /// A mutable reference to the innermost open builder, or [None] if only
    /// the main vertical list is open.
    pub fn current_builder(&mut self) -> Option<&mut ListBuilder> {
        self.stack.last_mut()
    }

    /// Whether the innermost builder is an implicit paragraph.
    pub fn in_paragraph(&self) -> bool {
        matches!(
            self.stack.last(),
            Some(ListBuilder::Horizontal(HorizontalBuilder {
                is_paragraph: true,
                ..
            }))
        )
    }

    /// Close the current paragraph, if one is open, and append the packaged
    /// line to the enclosing vertical list.
    pub fn end_paragraph(&mut self, fonts: &dyn font::FontCatalog) {
        if !self.in_paragraph() {
            return;
        }
        match self.close(fonts) {
            Some(FinishedList::Horizontal(hlist)) => {
                self.append_vertical(hlist.into());
            }
            _ => unreachable!("in_paragraph checked that a horizontal builder is open"),
        }
    }

    /// Take the contents of the main vertical list.
    pub fn take_page(&mut self) -> Vec<node::Vertical> {
        std::mem::take(&mut self.bottom.list)
    }
}

/// Package a horizontal list into an hbox.
///
/// The box's width is the target dimension; the glue sign, order and ratio
/// are set so that the contained glue fills the difference between the
/// natural width and the target.
pub fn hpack(
    list: Vec<node::Horizontal>,
    target: BoxTarget,
    fonts: &dyn font::FontCatalog,
) -> node::HList {
    let natural = node::natural_dimensions_horizontal(&list, fonts);
    let width = target.resolve(natural.width);

    let mut stretch = [Scaled::ZERO; 4];
    let mut shrink = [Scaled::ZERO; 4];
    for n in &list {
        if let node::Horizontal::Glue(g) = n {
            stretch[g.value.stretch_order as usize] =
                stretch[g.value.stretch_order as usize] + g.value.stretch;
            shrink[g.value.shrink_order as usize] =
                shrink[g.value.shrink_order as usize] + g.value.shrink;
        }
    }
    let (glue_sign, glue_order, glue_ratio) = set_glue(width - natural.width, stretch, shrink);

    node::HList {
        width,
        height: natural.height,
        depth: natural.depth,
        shift_amount: Scaled::ZERO,
        list,
        glue_ratio,
        glue_sign,
        glue_order,
    }
}

/// Package a vertical list into a vbox.
pub fn vpack(
    list: Vec<node::Vertical>,
    target: BoxTarget,
    fonts: &dyn font::FontCatalog,
) -> node::VList {
    let natural = node::natural_dimensions_vertical(&list, fonts);
    let height = target.resolve(natural.height);

    let mut stretch = [Scaled::ZERO; 4];
    let mut shrink = [Scaled::ZERO; 4];
    for n in &list {
        if let node::Vertical::Glue(g) = n {
            stretch[g.value.stretch_order as usize] =
                stretch[g.value.stretch_order as usize] + g.value.stretch;
            shrink[g.value.shrink_order as usize] =
                shrink[g.value.shrink_order as usize] + g.value.shrink;
        }
    }
    let (glue_sign, glue_order, glue_ratio) = set_glue(height - natural.height, stretch, shrink);

    node::VList {
        width: natural.width,
        height,
        depth: natural.depth,
        shift_amount: Scaled::ZERO,
        list,
        glue_ratio,
        glue_sign,
        glue_order,
    }
}

// Determine how the glue in a box must be set to absorb the provided excess.
fn set_glue(
    excess: Scaled,
    stretch: [Scaled; 4],
    shrink: [Scaled; 4],
) -> (node::GlueSign, GlueOrder, node::GlueRatio) {
    let orders = [
        GlueOrder::Filll,
        GlueOrder::Fill,
        GlueOrder::Fil,
        GlueOrder::Normal,
    ];
    if excess > Scaled::ZERO {
        for order in orders {
            let total = stretch[order as usize];
            if total != Scaled::ZERO {
                return (
                    node::GlueSign::Stretching,
                    order,
                    node::GlueRatio(excess.0 as f32 / total.0 as f32),
                );
            }
        }
    } else if excess < Scaled::ZERO {
        for order in orders {
            let total = shrink[order as usize];
            if total != Scaled::ZERO {
                // Finite glue cannot shrink past its shrinkability.
                let ratio = (-excess).0 as f32 / total.0 as f32;
                let ratio = if order == GlueOrder::Normal {
                    ratio.min(1.0)
                } else {
                    ratio
                };
                return (node::GlueSign::Shrinking, order, node::GlueRatio(ratio));
            }
        }
    }
    (
        node::GlueSign::Normal,
        GlueOrder::Normal,
        node::GlueRatio(0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontTable;
    use crate::font::SingleFontCatalog;
    use galley_core::Glue;

    fn fonts() -> SingleFontCatalog {
        let mut table = FontTable::new(Scaled::ONE * 10);
        table.add_monospaced_alphabet(Scaled::ONE * 5, Scaled::ONE * 7, Scaled::TWO);
        SingleFontCatalog::new(table)
    }

    fn char_node(c: char) -> node::Horizontal {
        node::Char { char: c, font: 0 }.into()
    }

    #[test]
    fn hpack_natural() {
        let hlist = hpack(
            vec![char_node('a'), char_node('b'), char_node('c')],
            BoxTarget::Natural,
            &fonts(),
        );
        assert_eq!(hlist.width, Scaled::ONE * 15);
        assert_eq!(hlist.height, Scaled::ONE * 7);
        assert_eq!(hlist.depth, Scaled::TWO);
        assert_eq!(hlist.glue_sign, node::GlueSign::Normal);
    }

    #[test]
    fn hpack_to_with_stretch() {
        let glue: node::Horizontal = node::Glue {
            kind: node::GlueKind::Normal,
            value: Glue {
                width: Scaled::ONE,
                stretch: Scaled::TWO,
                ..Default::default()
            },
        }
        .into();
        let hlist = hpack(
            vec![char_node('a'), glue],
            BoxTarget::To(Scaled::ONE * 7),
            &fonts(),
        );
        // Natural width 6, target 7, so the glue stretches by half its
        // stretchability.
        assert_eq!(hlist.width, Scaled::ONE * 7);
        assert_eq!(hlist.glue_sign, node::GlueSign::Stretching);
        assert_eq!(hlist.glue_order, GlueOrder::Normal);
        assert!((hlist.glue_ratio.0 - 0.5).abs() < 1e-6);
    }

    #[test]
    fn hpack_spread() {
        let hlist = hpack(
            vec![char_node('a')],
            BoxTarget::Spread(Scaled::ONE * 3),
            &fonts(),
        );
        assert_eq!(hlist.width, Scaled::ONE * 8);
    }

    #[test]
    fn infinite_stretch_wins() {
        let finite: node::Horizontal = node::Glue {
            kind: node::GlueKind::Normal,
            value: Glue {
                stretch: Scaled::ONE,
                ..Default::default()
            },
        }
        .into();
        let infinite: node::Horizontal = node::Glue {
            kind: node::GlueKind::Normal,
            value: Glue {
                stretch: Scaled::ONE,
                stretch_order: GlueOrder::Fil,
                ..Default::default()
            },
        }
        .into();
        let hlist = hpack(
            vec![finite, infinite],
            BoxTarget::To(Scaled::ONE * 10),
            &fonts(),
        );
        assert_eq!(hlist.glue_sign, node::GlueSign::Stretching);
        assert_eq!(hlist.glue_order, GlueOrder::Fil);
    }

    #[test]
    fn mode_stack_paragraph() {
        let fonts = fonts();
        let mut modes = ModeStack::new();
        assert_eq!(modes.mode(), Mode::Vertical);
        assert!(modes.begin_paragraph_if_vertical());
        assert_eq!(modes.mode(), Mode::Horizontal);
        assert!(!modes.begin_paragraph_if_vertical());
        modes.append_horizontal(char_node('a'));
        modes.end_paragraph(&fonts);
        assert_eq!(modes.mode(), Mode::Vertical);
        let page = modes.take_page();
        assert_eq!(page.len(), 1);
        match &page[0] {
            node::Vertical::HList(hlist) => {
                assert_eq!(hlist.width, Scaled::ONE * 5);
            }
            _ => panic!("expected the paragraph to be packaged into an hlist"),
        }
    }

    #[test]
    fn explicit_boxes_nest() {
        let fonts = fonts();
        let mut modes = ModeStack::new();
        modes.push(ListBuilder::Horizontal(HorizontalBuilder::default()));
        modes.append_horizontal(char_node('a'));
        modes.push(ListBuilder::Vertical(VerticalBuilder::default()));
        let inner = modes.close(&fonts).unwrap();
        match inner {
            FinishedList::Vertical(vlist) => modes.append_horizontal(vlist.into()),
            FinishedList::Horizontal(_) => panic!("expected a vertical list"),
        }
        let outer = modes.close(&fonts).unwrap();
        match outer {
            FinishedList::Horizontal(hlist) => assert_eq!(hlist.list.len(), 2),
            FinishedList::Vertical(_) => panic!("expected a horizontal list"),
        }
        assert!(modes.close(&fonts).is_none());
    }
}
