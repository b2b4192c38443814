//! Rendering of errors as text.

use super::Error;
use crate::token::trace;

/// A note attached to an error, displayed under the main message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Note(pub String);

impl From<String> for Note {
    fn from(s: String) -> Self {
        Note(s)
    }
}

impl From<&str> for Note {
    fn from(s: &str) -> Self {
        Note(s.into())
    }
}

impl std::fmt::Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(super) fn format_error(f: &mut std::fmt::Formatter<'_>, error: &Error) -> std::fmt::Result {
    writeln!(f, "Error: {}", error.error.title())?;
    if let Some(trace) = &error.trace {
        format_trace(f, trace, &error.error.source_annotation())?;
    }
    for note in error.error.notes() {
        for line in note.0.lines() {
            writeln!(f, "note: {line}")?;
        }
    }
    for element in error.stack_trace.iter().rev() {
        writeln!(f, "while {}:", element.context.describe())?;
        format_trace(f, &element.trace, "")?;
    }
    Ok(())
}

fn format_trace(
    f: &mut std::fmt::Formatter<'_>,
    trace: &trace::SourceCodeTrace,
    annotation: &str,
) -> std::fmt::Result {
    let margin_width = number_width(trace.line_number);
    writeln!(
        f,
        "{}>>> {}:{}:{}",
        " ".repeat(margin_width),
        trace.origin,
        trace.line_number,
        trace.index + 1,
    )?;
    writeln!(f, "{} | {}", trace.line_number, trace.line_content)?;
    write!(
        f,
        "{} | {}{}",
        " ".repeat(margin_width),
        " ".repeat(trace.index),
        "^".repeat(trace.value.chars().count().max(1)),
    )?;
    if annotation.is_empty() {
        writeln!(f)
    } else {
        writeln!(f, " {annotation}")
    }
}

fn number_width(number: usize) -> usize {
    number.checked_ilog10().unwrap_or(0) as usize + 1
}
