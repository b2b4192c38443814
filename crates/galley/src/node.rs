//! Data structures for boxes and their friends.
//!
//! Lists come in two flavors: [Horizontal] nodes accumulate into horizontal
//! lists (the material of a line of text) and [Vertical] nodes into vertical
//! lists (the material of a page). The two node types are closed sum types;
//! consumers traverse lists with ordinary pattern matching, which keeps the
//! match exhaustive when a variant is added.
//!
//! Geometry fields are mutated explicitly by the algorithms that construct
//! boxes; nothing is re-derived automatically when a list changes.

use crate::font;
use galley_core::GlueOrder;
use galley_core::Scaled;

/// Horizontal node.
pub enum Horizontal {
    Char(Char),
    HList(HList),
    VList(VList),
    Rule(Rule),
    Mark(Mark),
    Insertion(Insertion),
    Adjust(Adjust),
    Ligature(Ligature),
    Discretionary(Discretionary),
    Whatsit(Box<dyn Whatsit>),
    Math(Math),
    Glue(Glue),
    Kern(Kern),
    Penalty(Penalty),
}

/// Vertical node.
pub enum Vertical {
    HList(HList),
    VList(VList),
    Rule(Rule),
    Mark(Mark),
    Insertion(Insertion),
    Whatsit(Box<dyn Whatsit>),
    Math(Math),
    Glue(Glue),
    Kern(Kern),
    Penalty(Penalty),
}

/// A character in a specific font.
///
/// This node can only appear in horizontal mode.
pub struct Char {
    pub char: char,
    pub font: font::FontId,
}

/// A box made from a horizontal list.
pub struct HList {
    pub width: Scaled,
    pub height: Scaled,
    pub depth: Scaled,
    /// How much this box should be lowered (if it appears in a horizontal
    /// list), or how much it should be moved to the right (if it appears in
    /// a vertical list).
    pub shift_amount: Scaled,
    pub list: Vec<Horizontal>,
    pub glue_ratio: GlueRatio,
    pub glue_sign: GlueSign,
    pub glue_order: GlueOrder,
}

/// Ratio by which glue should shrink or stretch.
///
/// This is one of the very few places where a floating point number is used;
/// the exact value never affects which boxes are produced, only how their
/// contents are distributed, so cross-platform reproducibility is preserved.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GlueRatio(pub f32);

/// Whether the glue in a box is stretching, shrinking, or left alone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GlueSign {
    #[default]
    Normal,
    Stretching,
    Shrinking,
}

impl HList {
    /// Returns an empty hlist node with all dimensions zero.
    pub fn new_null_box() -> Self {
        Self {
            height: Scaled::ZERO,
            width: Scaled::ZERO,
            depth: Scaled::ZERO,
            shift_amount: Scaled::ZERO,
            list: vec![],
            glue_ratio: GlueRatio(0.0),
            glue_sign: GlueSign::Normal,
            glue_order: GlueOrder::Normal,
        }
    }
}

impl Default for HList {
    fn default() -> Self {
        Self::new_null_box()
    }
}

/// A box made from a vertical list.
///
/// This is the same as [HList], except the list inside holds [Vertical]
/// nodes instead of [Horizontal] nodes.
pub struct VList {
    pub width: Scaled,
    pub height: Scaled,
    pub depth: Scaled,
    pub shift_amount: Scaled,
    pub list: Vec<Vertical>,
    pub glue_ratio: GlueRatio,
    pub glue_sign: GlueSign,
    pub glue_order: GlueOrder,
}

impl VList {
    pub fn new_null_box() -> Self {
        Self {
            height: Scaled::ZERO,
            width: Scaled::ZERO,
            depth: Scaled::ZERO,
            shift_amount: Scaled::ZERO,
            list: vec![],
            glue_ratio: GlueRatio(0.0),
            glue_sign: GlueSign::Normal,
            glue_order: GlueOrder::Normal,
        }
    }
}

impl Default for VList {
    fn default() -> Self {
        Self::new_null_box()
    }
}

/// A rule stands for a solid black rectangle.
///
/// If any of the dimensions is the [running](Rule::RUNNING) value, the
/// actual value runs up to the boundary of the innermost enclosing box.
/// The width is never running in an hlist; the height and depth are never
/// running in a vlist.
pub struct Rule {
    pub width: Scaled,
    pub height: Scaled,
    pub depth: Scaled,
}

impl Rule {
    /// The marker dimension meaning "run to the boundary of the enclosing
    /// box".
    pub const RUNNING: Scaled = Scaled(-(1 << 30));

    /// Creates a new rule with all dimensions running.
    pub fn new() -> Self {
        Self {
            height: Self::RUNNING,
            width: Self::RUNNING,
            depth: Self::RUNNING,
        }
    }
}

impl Default for Rule {
    fn default() -> Self {
        Self::new()
    }
}

/// Vertical material to be inserted onto a later page.
pub struct Insertion {
    pub box_number: u8,
    /// The natural height plus depth of the vertical list being inserted.
    pub height: Scaled,
    /// Used in case this insertion is split.
    pub split_max_depth: Scaled,
    pub split_top_skip: galley_core::Glue,
    /// Penalty to be used if this insertion floats to a subsequent page
    /// after a split insertion of the same class.
    pub float_penalty: i32,
    pub vlist: Vec<Vertical>,
}

/// Contents of a mark, recorded as plain text.
pub struct Mark {
    pub text: String,
}

/// Material that will be moved out into the surrounding vertical list.
pub struct Adjust {
    pub list: Vec<Vertical>,
}

/// A ligature.
pub struct Ligature {
    pub included_left_boundary: bool,
    pub included_right_boundary: bool,
    pub char: char,
    pub font: font::FontId,
    /// The original characters that were replaced by the ligature. Used if
    /// the ligature must be broken apart for hyphenation.
    pub original_chars: String,
}

/// A discretionary break.
///
/// The pre-break and post-break lists must only contain nodes of type char,
/// kern, box, rule or ligature.
pub struct Discretionary {
    /// Material to insert before the break, if the break occurs here.
    pub pre_break: Vec<Horizontal>,
    /// Material to insert after the break, if the break occurs here.
    pub post_break: Vec<Horizontal>,
    /// Number of subsequent nodes to skip if the break occurs here.
    pub replace_count: u32,
}

impl Discretionary {
    pub fn new() -> Self {
        Self {
            pre_break: vec![],
            post_break: vec![],
            replace_count: 0,
        }
    }
}

impl Default for Discretionary {
    fn default() -> Self {
        Self::new()
    }
}

/// A whatsit node carries extension material the core does not interpret.
///
/// Document writers that understand a particular whatsit downcast or match
/// on its description; everything else passes whatsits through untouched.
pub trait Whatsit {
    /// One-line description of the whatsit, used by the text writer.
    fn description(&self) -> String;
}

/// A marker placed before or after math mode material.
pub enum Math {
    Before,
    After,
}

/// A piece of glue.
pub struct Glue {
    pub kind: GlueKind,
    pub value: galley_core::Glue,
}

/// The kind of a glue node.
///
/// The three leader kinds repeat box or rule material across the space the
/// glue occupies.
pub enum GlueKind {
    Normal,
    ConditionalMath,
    Math,
    AlignedLeaders(Box<Horizontal>),
    CenteredLeaders(Box<Horizontal>),
    ExpandedLeaders(Box<Horizontal>),
}

/// A kern.
pub struct Kern {
    pub kind: KernKind,
    pub width: Scaled,
}

/// The kind of a kern node.
pub enum KernKind {
    /// Inserted from font information or math mode calculations.
    Normal,
    /// Inserted using an explicit kern primitive.
    Explicit,
    /// Inserted from non-math accents.
    Accent,
    /// Inserted from math spacing specifications.
    Math,
}

/// A penalty.
pub struct Penalty {
    pub value: i32,
}

impl Penalty {
    /// Any penalty at least this large is infinite: no break is allowed.
    pub const INFINITE: i32 = 10000;

    /// Any penalty at most this small forces a break.
    pub const EJECT: i32 = -10000;
}

impl Horizontal {
    /// Whether a glue node that comes after this node may be broken at.
    pub fn precedes_break(&self) -> bool {
        use Horizontal::*;
        matches!(
            self,
            Char(_)
                | HList(_)
                | VList(_)
                | Rule(_)
                | Mark(_)
                | Insertion(_)
                | Adjust(_)
                | Ligature(_)
                | Discretionary(_)
                | Whatsit(_)
        )
    }

    /// Whether this node survives at the start of a line after a break.
    pub fn non_discardable(&self) -> bool {
        self.precedes_break()
    }
}

impl Vertical {
    /// Whether a glue node that comes after this node may be broken at.
    pub fn precedes_break(&self) -> bool {
        use Vertical::*;
        matches!(
            self,
            HList(_) | VList(_) | Rule(_) | Mark(_) | Insertion(_) | Whatsit(_)
        )
    }
}

macro_rules! node_from_impls {
    ( $node: ident, $( ($struct: ident, $variant: ident), )+ ) => {
        $(
            impl From<$struct> for $node {
                fn from(value: $struct) -> $node {
                    $node::$variant(value)
                }
            }
        )+
    };
}

node_from_impls![
    Horizontal,
    (Char, Char),
    (HList, HList),
    (VList, VList),
    (Rule, Rule),
    (Mark, Mark),
    (Insertion, Insertion),
    (Adjust, Adjust),
    (Ligature, Ligature),
    (Discretionary, Discretionary),
    (Math, Math),
    (Glue, Glue),
    (Kern, Kern),
    (Penalty, Penalty),
];

node_from_impls![
    Vertical,
    (HList, HList),
    (VList, VList),
    (Rule, Rule),
    (Mark, Mark),
    (Insertion, Insertion),
    (Math, Math),
    (Glue, Glue),
    (Kern, Kern),
    (Penalty, Penalty),
];

/// The natural width, height and depth of a list.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: Scaled,
    pub height: Scaled,
    pub depth: Scaled,
}

/// Measure the natural dimensions of a horizontal list.
///
/// The width is the sum of the widths of the nodes; the height and depth
/// are the maxima over the nodes, with box shifts applied.
/// Character and ligature dimensions come from the font catalog.
///
/// Nothing is cached: callers decide when to measure and where to record
/// the result.
pub fn natural_dimensions_horizontal(
    list: &[Horizontal],
    fonts: &dyn font::FontCatalog,
) -> Dimensions {
    let mut d = Dimensions::default();
    for node in list {
        match node {
            Horizontal::Char(c) => {
                let metrics = fonts.metrics(c.font);
                d.width = d.width + metrics.glyph_width(c.char);
                d.height = d.height.max(metrics.glyph_height(c.char));
                d.depth = d.depth.max(metrics.glyph_depth(c.char));
            }
            Horizontal::Ligature(l) => {
                let metrics = fonts.metrics(l.font);
                d.width = d.width + metrics.glyph_width(l.char);
                d.height = d.height.max(metrics.glyph_height(l.char));
                d.depth = d.depth.max(metrics.glyph_depth(l.char));
            }
            Horizontal::HList(b) => {
                d.width = d.width + b.width;
                d.height = d.height.max(b.height - b.shift_amount);
                d.depth = d.depth.max(b.depth + b.shift_amount);
            }
            Horizontal::VList(b) => {
                d.width = d.width + b.width;
                d.height = d.height.max(b.height - b.shift_amount);
                d.depth = d.depth.max(b.depth + b.shift_amount);
            }
            Horizontal::Rule(r) => {
                if r.width != Rule::RUNNING {
                    d.width = d.width + r.width;
                }
                if r.height != Rule::RUNNING {
                    d.height = d.height.max(r.height);
                }
                if r.depth != Rule::RUNNING {
                    d.depth = d.depth.max(r.depth);
                }
            }
            Horizontal::Glue(g) => {
                d.width = d.width + g.value.width;
            }
            Horizontal::Kern(k) => {
                d.width = d.width + k.width;
            }
            Horizontal::Discretionary(_)
            | Horizontal::Mark(_)
            | Horizontal::Insertion(_)
            | Horizontal::Adjust(_)
            | Horizontal::Whatsit(_)
            | Horizontal::Math(_)
            | Horizontal::Penalty(_) => (),
        }
    }
    d
}

/// Measure the natural dimensions of a vertical list.
///
/// The height is the sum of the heights and depths of the nodes except
/// that the depth of the last box or rule becomes the depth of the list;
/// the width is the maximum over the nodes, with box shifts applied.
pub fn natural_dimensions_vertical(
    list: &[Vertical],
    fonts: &dyn font::FontCatalog,
) -> Dimensions {
    _ = fonts;
    let mut d = Dimensions::default();
    for node in list {
        // The accumulated depth of earlier nodes moves into the height once
        // another node follows.
        d.height = d.height + d.depth;
        d.depth = Scaled::ZERO;
        match node {
            Vertical::HList(b) => {
                d.width = d.width.max(b.width + b.shift_amount);
                d.height = d.height + b.height;
                d.depth = b.depth;
            }
            Vertical::VList(b) => {
                d.width = d.width.max(b.width + b.shift_amount);
                d.height = d.height + b.height;
                d.depth = b.depth;
            }
            Vertical::Rule(r) => {
                if r.width != Rule::RUNNING {
                    d.width = d.width.max(r.width);
                }
                if r.height != Rule::RUNNING {
                    d.height = d.height + r.height;
                }
                d.depth = if r.depth != Rule::RUNNING {
                    r.depth
                } else {
                    Scaled::ZERO
                };
            }
            Vertical::Glue(g) => {
                d.height = d.height + g.value.width;
            }
            Vertical::Kern(k) => {
                d.height = d.height + k.width;
            }
            Vertical::Mark(_)
            | Vertical::Insertion(_)
            | Vertical::Whatsit(_)
            | Vertical::Math(_)
            | Vertical::Penalty(_) => (),
        }
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontTable;

    fn test_fonts() -> crate::font::SingleFontCatalog {
        let mut table = FontTable::new(Scaled::ONE * 10);
        table.add_glyph('a', Scaled::ONE * 5, Scaled::ONE * 4, Scaled::ZERO);
        table.add_glyph('b', Scaled::ONE * 6, Scaled::ONE * 7, Scaled::ONE);
        crate::font::SingleFontCatalog::new(table)
    }

    #[test]
    fn horizontal_dimensions() {
        let fonts = test_fonts();
        let list: Vec<Horizontal> = vec![
            Char { char: 'a', font: 0 }.into(),
            Char { char: 'b', font: 0 }.into(),
            Kern {
                kind: KernKind::Explicit,
                width: Scaled::ONE,
            }
            .into(),
            Glue {
                kind: GlueKind::Normal,
                value: galley_core::Glue::from_width(Scaled::TWO),
            }
            .into(),
        ];
        let d = natural_dimensions_horizontal(&list, &fonts);
        assert_eq!(d.width, Scaled::ONE * 14);
        assert_eq!(d.height, Scaled::ONE * 7);
        assert_eq!(d.depth, Scaled::ONE);
    }

    #[test]
    fn penalties_and_marks_have_no_size() {
        let fonts = test_fonts();
        let list: Vec<Horizontal> = vec![
            Penalty { value: 100 }.into(),
            Mark {
                text: "here".into(),
            }
            .into(),
        ];
        let d = natural_dimensions_horizontal(&list, &fonts);
        assert_eq!(d, Dimensions::default());
    }

    #[test]
    fn vertical_dimensions() {
        let fonts = test_fonts();
        let list: Vec<Vertical> = vec![
            HList {
                width: Scaled::ONE * 50,
                height: Scaled::ONE * 10,
                depth: Scaled::ONE * 2,
                ..Default::default()
            }
            .into(),
            Glue {
                kind: GlueKind::Normal,
                value: galley_core::Glue::from_width(Scaled::ONE * 3),
            }
            .into(),
            HList {
                width: Scaled::ONE * 40,
                height: Scaled::ONE * 8,
                depth: Scaled::ONE,
                ..Default::default()
            }
            .into(),
        ];
        let d = natural_dimensions_vertical(&list, &fonts);
        assert_eq!(d.width, Scaled::ONE * 50);
        // 10 + 2 + 3 + 8; the final box's depth stays depth.
        assert_eq!(d.height, Scaled::ONE * 23);
        assert_eq!(d.depth, Scaled::ONE);
    }
}
