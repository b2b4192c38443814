//! Font metrics interfaces.
//!
//! Galley never parses font files; metrics arrive through the traits here.
//! The [FontTable] implementation is backed by an in-memory table and is
//! what unit tests and the plain-text toolchain use.

use galley_core::Glue;
use galley_core::Scaled;
use std::collections::HashMap;

/// Identifier of a font within a [FontCatalog].
pub type FontId = u32;

/// Metrics of a single font.
pub trait FontMetrics {
    /// The width of the glyph for the provided character.
    fn glyph_width(&self, c: char) -> Scaled;

    /// The height of the glyph for the provided character.
    fn glyph_height(&self, c: char) -> Scaled;

    /// The depth of the glyph for the provided character.
    fn glyph_depth(&self, c: char) -> Scaled;

    /// The width of an em, also called the quad.
    fn quad(&self) -> Scaled;

    /// The height of an ex.
    fn x_height(&self) -> Scaled {
        self.quad() / 2
    }

    /// The interword glue.
    fn space(&self) -> Glue {
        let third = self.quad() / 3;
        Glue {
            width: third,
            stretch: third / 2,
            shrink: third / 3,
            ..Default::default()
        }
    }
}

/// A collection of fonts indexed by [FontId].
pub trait FontCatalog {
    fn metrics(&self, font: FontId) -> &dyn FontMetrics;
}

/// In-memory font metrics, used in tests and wherever real font data is not
/// available.
pub struct FontTable {
    glyphs: HashMap<char, GlyphDimensions>,
    quad: Scaled,
}

#[derive(Clone, Copy, Default)]
struct GlyphDimensions {
    width: Scaled,
    height: Scaled,
    depth: Scaled,
}

impl FontTable {
    pub fn new(quad: Scaled) -> FontTable {
        FontTable {
            glyphs: Default::default(),
            quad,
        }
    }

    /// Add a glyph with the provided dimensions.
    pub fn add_glyph(&mut self, c: char, width: Scaled, height: Scaled, depth: Scaled) {
        self.glyphs.insert(
            c,
            GlyphDimensions {
                width,
                height,
                depth,
            },
        );
    }

    /// Add the characters a-z, A-Z and 0-9 with uniform dimensions.
    ///
    /// Handy for building a monospaced test font in one call.
    pub fn add_monospaced_alphabet(&mut self, width: Scaled, height: Scaled, depth: Scaled) {
        for c in ('a'..='z').chain('A'..='Z').chain('0'..='9') {
            self.add_glyph(c, width, height, depth);
        }
    }

    fn dimensions(&self, c: char) -> GlyphDimensions {
        self.glyphs.get(&c).copied().unwrap_or_default()
    }
}

impl FontMetrics for FontTable {
    fn glyph_width(&self, c: char) -> Scaled {
        self.dimensions(c).width
    }
    fn glyph_height(&self, c: char) -> Scaled {
        self.dimensions(c).height
    }
    fn glyph_depth(&self, c: char) -> Scaled {
        self.dimensions(c).depth
    }
    fn quad(&self) -> Scaled {
        self.quad
    }
}

/// The null font: every metric is zero.
///
/// This is the font in effect before any font is selected.
pub struct NullFont;

impl FontMetrics for NullFont {
    fn glyph_width(&self, _: char) -> Scaled {
        Scaled::ZERO
    }
    fn glyph_height(&self, _: char) -> Scaled {
        Scaled::ZERO
    }
    fn glyph_depth(&self, _: char) -> Scaled {
        Scaled::ZERO
    }
    fn quad(&self) -> Scaled {
        Scaled::ZERO
    }
    fn space(&self) -> Glue {
        Glue::default()
    }
}

/// A catalog holding a single font under id 0.
///
/// Any other id resolves to the same font; tests that only ever use one
/// font don't need anything richer.
pub struct SingleFontCatalog {
    font: FontTable,
}

impl SingleFontCatalog {
    pub fn new(font: FontTable) -> Self {
        Self { font }
    }
}

impl FontCatalog for SingleFontCatalog {
    fn metrics(&self, _: FontId) -> &dyn FontMetrics {
        &self.font
    }
}

/// A catalog backed by a vector of font tables.
///
/// Ids index into the vector; id 0 is always the null font.
#[derive(Default)]
pub struct VecFontCatalog {
    fonts: Vec<FontTable>,
}

impl VecFontCatalog {
    /// Register a font and return its id.
    pub fn register(&mut self, font: FontTable) -> FontId {
        self.fonts.push(font);
        self.fonts.len() as FontId
    }
}

impl FontCatalog for VecFontCatalog {
    fn metrics(&self, font: FontId) -> &dyn FontMetrics {
        match font.checked_sub(1) {
            None => &NullFont,
            Some(index) => match self.fonts.get(index as usize) {
                None => &NullFont,
                Some(table) => table,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn font_table_metrics() {
        let mut table = FontTable::new(Scaled::ONE * 10);
        table.add_glyph('a', Scaled::ONE * 5, Scaled::ONE * 4, Scaled::ONE);
        assert_eq!(table.glyph_width('a'), Scaled::ONE * 5);
        assert_eq!(table.glyph_height('a'), Scaled::ONE * 4);
        assert_eq!(table.glyph_depth('a'), Scaled::ONE);
        // Unknown glyphs have zero dimensions.
        assert_eq!(table.glyph_width('z'), Scaled::ZERO);
        assert_eq!(table.quad(), Scaled::ONE * 10);
        assert_eq!(table.space().width, (Scaled::ONE * 10) / 3);
    }

    #[test]
    fn vec_catalog() {
        let mut catalog = VecFontCatalog::default();
        let mut table = FontTable::new(Scaled::ONE);
        table.add_glyph('x', Scaled::ONE, Scaled::ONE, Scaled::ZERO);
        let id = catalog.register(table);
        assert_eq!(id, 1);
        assert_eq!(catalog.metrics(id).glyph_width('x'), Scaled::ONE);
        // Id 0 and out-of-range ids resolve to the null font.
        assert_eq!(catalog.metrics(0).glyph_width('x'), Scaled::ZERO);
        assert_eq!(catalog.metrics(99).glyph_width('x'), Scaled::ZERO);
    }
}
