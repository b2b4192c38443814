//! The document writer interface and the plain-text writer.
//!
//! A document writer is the collaborator that receives finished pages.
//! Concrete writers for real output formats live outside this crate; the
//! [TextWriter] here dumps the node tree as text in the classic box-display
//! format, and is used by the command line driver and in tests.

use crate::node;
use std::io::Write;

/// Implementations of this trait receive completed pages.
pub trait DocumentWriter {
    /// Set a named string parameter.
    ///
    /// Unknown parameter names are ignored.
    fn set_parameter(&mut self, name: &str, value: &str) {
        _ = (name, value);
    }

    /// Ship out a completed page.
    ///
    /// Returns the total number of pages shipped out so far.
    fn ship_out(&mut self, page: node::VList) -> usize;

    /// Finish the run.
    ///
    /// Returns the total number of pages shipped out.
    fn close(&mut self) -> usize;
}

/// A document writer that dumps each page's node tree as indented text.
///
/// Each nesting level adds one period to the line prefix, so a character at
/// depth two is printed as `..\font1 a`. The format follows the classic
/// box-display output, which makes the dumps easy to compare against
/// reference material.
pub struct TextWriter<W> {
    out: W,
    pages: usize,
    /// Value of the `lineLength` parameter; lines longer than this are
    /// truncated with a trailing `etc.`.
    line_length: usize,
}

impl<W: Write> TextWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            pages: 0,
            line_length: 250,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, depth: usize, content: &str) -> std::io::Result<()> {
        let prefix: String = ".".repeat(depth);
        let mut line = format!("{prefix}{content}");
        if line.len() > self.line_length {
            line.truncate(self.line_length);
            line.push_str(" etc.");
        }
        writeln!(self.out, "{line}")
    }

    fn write_horizontal_list(
        &mut self,
        depth: usize,
        list: &[node::Horizontal],
    ) -> std::io::Result<()> {
        for n in list {
            self.write_horizontal(depth, n)?;
        }
        Ok(())
    }

    fn write_horizontal(&mut self, depth: usize, n: &node::Horizontal) -> std::io::Result<()> {
        use node::Horizontal::*;
        match n {
            Char(c) => self.write_line(depth, &format!("\\font{} {}", c.font, c.char)),
            Ligature(l) => self.write_line(
                depth,
                &format!("\\font{} {} (ligature {})", l.font, l.char, l.original_chars),
            ),
            HList(b) => {
                self.write_line(
                    depth,
                    &format!("\\hbox({}+{})x{}", b.height, b.depth, b.width),
                )?;
                self.write_horizontal_list(depth + 1, &b.list)
            }
            VList(b) => {
                self.write_line(
                    depth,
                    &format!("\\vbox({}+{})x{}", b.height, b.depth, b.width),
                )?;
                self.write_vertical_list(depth + 1, &b.list)
            }
            Rule(r) => self.write_rule(depth, r),
            Mark(m) => self.write_line(depth, &format!("\\mark{{{}}}", m.text)),
            Insertion(i) => {
                self.write_line(depth, &format!("\\insert{}", i.box_number))?;
                self.write_vertical_list(depth + 1, &i.vlist)
            }
            Adjust(a) => {
                self.write_line(depth, "\\vadjust")?;
                self.write_vertical_list(depth + 1, &a.list)
            }
            Discretionary(d) => {
                self.write_line(
                    depth,
                    &format!("\\discretionary replacing {}", d.replace_count),
                )?;
                self.write_horizontal_list(depth + 1, &d.pre_break)?;
                if !d.post_break.is_empty() {
                    self.write_line(depth, "|")?;
                    self.write_horizontal_list(depth + 1, &d.post_break)?;
                }
                Ok(())
            }
            Whatsit(w) => self.write_line(depth, &format!("\\whatsit {}", w.description())),
            Math(node::Math::Before) => self.write_line(depth, "\\mathon"),
            Math(node::Math::After) => self.write_line(depth, "\\mathoff"),
            Glue(g) => self.write_glue(depth, g),
            Kern(k) => self.write_line(depth, &format!("\\kern {}", k.width)),
            Penalty(p) => self.write_line(depth, &format!("\\penalty {}", p.value)),
        }
    }

    fn write_vertical_list(
        &mut self,
        depth: usize,
        list: &[node::Vertical],
    ) -> std::io::Result<()> {
        for n in list {
            self.write_vertical(depth, n)?;
        }
        Ok(())
    }

    fn write_vertical(&mut self, depth: usize, n: &node::Vertical) -> std::io::Result<()> {
        use node::Vertical::*;
        match n {
            HList(b) => {
                self.write_line(
                    depth,
                    &format!("\\hbox({}+{})x{}", b.height, b.depth, b.width),
                )?;
                self.write_horizontal_list(depth + 1, &b.list)
            }
            VList(b) => {
                self.write_line(
                    depth,
                    &format!("\\vbox({}+{})x{}", b.height, b.depth, b.width),
                )?;
                self.write_vertical_list(depth + 1, &b.list)
            }
            Rule(r) => self.write_rule(depth, r),
            Mark(m) => self.write_line(depth, &format!("\\mark{{{}}}", m.text)),
            Insertion(i) => {
                self.write_line(depth, &format!("\\insert{}", i.box_number))?;
                self.write_vertical_list(depth + 1, &i.vlist)
            }
            Whatsit(w) => self.write_line(depth, &format!("\\whatsit {}", w.description())),
            Math(node::Math::Before) => self.write_line(depth, "\\mathon"),
            Math(node::Math::After) => self.write_line(depth, "\\mathoff"),
            Glue(g) => self.write_glue(depth, g),
            Kern(k) => self.write_line(depth, &format!("\\kern {}", k.width)),
            Penalty(p) => self.write_line(depth, &format!("\\penalty {}", p.value)),
        }
    }

    fn write_rule(&mut self, depth: usize, r: &node::Rule) -> std::io::Result<()> {
        let display = |d: galley_core::Scaled| {
            if d == node::Rule::RUNNING {
                "*".to_string()
            } else {
                d.to_string()
            }
        };
        self.write_line(
            depth,
            &format!(
                "\\rule({}+{})x{}",
                display(r.height),
                display(r.depth),
                display(r.width)
            ),
        )
    }

    fn write_glue(&mut self, depth: usize, g: &node::Glue) -> std::io::Result<()> {
        let mut content = format!("\\glue {}", g.value);
        match &g.kind {
            node::GlueKind::Normal => (),
            node::GlueKind::ConditionalMath => content.push_str(" (conditional math)"),
            node::GlueKind::Math => content.push_str(" (math)"),
            node::GlueKind::AlignedLeaders(_) => content.push_str(" (aligned leaders)"),
            node::GlueKind::CenteredLeaders(_) => content.push_str(" (centered leaders)"),
            node::GlueKind::ExpandedLeaders(_) => content.push_str(" (expanded leaders)"),
        }
        self.write_line(depth, &content)?;
        match &g.kind {
            node::GlueKind::AlignedLeaders(leader)
            | node::GlueKind::CenteredLeaders(leader)
            | node::GlueKind::ExpandedLeaders(leader) => self.write_horizontal(depth + 1, leader),
            _ => Ok(()),
        }
    }
}

impl<W: Write> DocumentWriter for TextWriter<W> {
    fn set_parameter(&mut self, name: &str, value: &str) {
        // Unknown parameter names are ignored.
        if name == "lineLength" {
            if let Ok(line_length) = value.parse() {
                self.line_length = line_length;
            }
        }
    }

    fn ship_out(&mut self, page: node::VList) -> usize {
        self.pages += 1;
        let result: std::io::Result<()> = (|| {
            writeln!(self.out, "%% page {}", self.pages)?;
            self.write_line(
                0,
                &format!("\\vbox({}+{})x{}", page.height, page.depth, page.width),
            )?;
            self.write_vertical_list(1, &page.list)?;
            self.out.flush()
        })();
        if let Err(err) = result {
            log::error!("failed to write page {}: {err}", self.pages);
        }
        self.pages
    }

    fn close(&mut self) -> usize {
        if let Err(err) = self.out.flush() {
            log::error!("failed to flush the output: {err}");
        }
        self.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use galley_core::Glue;
    use galley_core::Scaled;

    fn ship_one_page(page: node::VList) -> String {
        let mut writer = TextWriter::new(Vec::new());
        assert_eq!(writer.ship_out(page), 1);
        assert_eq!(writer.close(), 1);
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn dump_simple_page() {
        let hlist = node::HList {
            width: Scaled::ONE * 15,
            height: Scaled::ONE * 7,
            depth: Scaled::ZERO,
            list: vec![
                node::Char { char: 'h', font: 1 }.into(),
                node::Char { char: 'i', font: 1 }.into(),
                node::Glue {
                    kind: node::GlueKind::Normal,
                    value: Glue {
                        width: Scaled::ONE * 3,
                        stretch: Scaled::ONE,
                        shrink: Scaled::TWO,
                        ..Default::default()
                    },
                }
                .into(),
                node::Kern {
                    kind: node::KernKind::Explicit,
                    width: -Scaled::ONE,
                }
                .into(),
            ],
            ..Default::default()
        };
        let page = node::VList {
            width: Scaled::ONE * 15,
            height: Scaled::ONE * 7,
            depth: Scaled::ZERO,
            list: vec![hlist.into(), node::Penalty { value: -10000 }.into()],
            ..Default::default()
        };
        let got = ship_one_page(page);
        let want = "%% page 1
\\vbox(7.0+0.0)x15.0
.\\hbox(7.0+0.0)x15.0
..\\font1 h
..\\font1 i
..\\glue 3.0pt plus 1.0pt minus 2.0pt
..\\kern -1.0
.\\penalty -10000
";
        assert_eq!(got, want);
    }

    #[test]
    fn nested_lists_are_flattened_recursively() {
        let inner = node::HList {
            list: vec![node::Char { char: 'x', font: 0 }.into()],
            ..Default::default()
        };
        let middle = node::VList {
            list: vec![inner.into()],
            ..Default::default()
        };
        let outer = node::VList {
            list: vec![middle.into()],
            ..Default::default()
        };
        let got = ship_one_page(outer);
        assert!(got.contains("...\\font0 x"), "got: {got}");
    }

    #[test]
    fn unknown_parameters_are_ignored() {
        let mut writer = TextWriter::new(Vec::new());
        writer.set_parameter("noSuchParameter", "whatever");
        writer.set_parameter("lineLength", "40");
        assert_eq!(writer.line_length, 40);
    }
}
