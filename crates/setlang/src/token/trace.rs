//! Tracing system for determining the origin of a token.
//!
//! Error messages need to know where a token came from: the file, the line,
//! and the position within the line.
//! Storing that information on every token would make the token type large
//! and slow down the interpreter's inner loops, so instead each token holds a
//! 32-bit [Key] and this module's [Tracer] maps keys back to source
//! positions.
//!
//! When source code is added to the input, the tracer allocates a contiguous
//! [KeyRange] with one key per character of the source.
//! The lexer hands out keys in order as it consumes characters.
//! To trace a token, the tracer looks up which registered source the key
//! belongs to; the offset from the range's first key is the character offset
//! into that source.

use crate::token::{CommandRef, CsNameInterner, Token, Value};
use std::collections::BTreeMap;
use std::ops::Bound::Included;
use std::path::PathBuf;

/// Key attached to tokens to enable tracing them.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Key(u32);

impl Key {
    /// A key that is not associated with any source position.
    pub fn dummy() -> Key {
        Key(u32::MAX)
    }
}

/// Range of keys not yet assigned to tokens.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyRange {
    next: u32,
    limit: u32,
}

impl KeyRange {
    /// Get the next key.
    ///
    /// Panics if all of the keys in this range have been used.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Key {
        if self.next >= self.limit {
            panic!("requested more trace keys than are in the range");
        }
        let n = self.next;
        self.next += 1;
        Key(n)
    }

    /// Peek at the next key without consuming it.
    pub fn peek(&self) -> Key {
        if self.next >= self.limit {
            panic!("requested more trace keys than are in the range");
        }
        Key(self.next)
    }

    pub fn empty() -> KeyRange {
        KeyRange { next: 0, limit: 0 }
    }

    pub fn for_testing() -> KeyRange {
        KeyRange {
            next: 0,
            limit: u32::MAX,
        }
    }
}

/// Enum describing the possible origins of source code.
#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Origin {
    File(PathBuf),
    Terminal,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::File(path) => write!(f, "{}", path.display()),
            Origin::Terminal => write!(f, "<terminal>"),
        }
    }
}

/// A token trace: the full source position of one token.
#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceCodeTrace {
    /// Origin of the source code this token came from.
    pub origin: Origin,
    /// Content of the line this token came from.
    pub line_content: String,
    /// Number of the line within the file, starting at 1.
    pub line_number: usize,
    /// Index within the line at which the token starts.
    pub index: usize,
    /// Value of the token, as source text.
    pub value: String,
    /// The traced token, or [None] for an end-of-input trace.
    pub token: Option<Token>,
}

impl SourceCodeTrace {
    /// A trace for tokens that have no recorded source position, e.g. tokens
    /// synthesized by primitives.
    pub fn unknown() -> SourceCodeTrace {
        SourceCodeTrace {
            origin: Origin::Terminal,
            line_content: Default::default(),
            line_number: 0,
            index: 0,
            value: Default::default(),
            token: None,
        }
    }
}

/// Data structure that records the information needed to trace tokens.
#[derive(Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tracer {
    checkpoints: BTreeMap<u32, Checkpoint>,
    next_key: u32,
    // The last source that was added from outside; i.e., not via \input.
    // Used to trace end-of-input errors.
    last_external_input: Option<u32>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct Checkpoint {
    origin: Origin,
    content: String,
}

impl Tracer {
    /// Register source code with the tracer.
    ///
    /// The returned [KeyRange] must be used to assign keys, in order, to the
    /// tokens lexed from this source code.
    pub fn register_source_code(
        &mut self,
        token: Option<Token>,
        origin: Origin,
        source_code: &str,
    ) -> KeyRange {
        let len = match u32::try_from(source_code.len()) {
            Err(_) => panic!(
                "source code too big ({} bytes); max is 2^32 bytes",
                source_code.len()
            ),
            // Empty sources still get one key so end-of-input errors in them
            // can be traced.
            Ok(0) => 1_u32,
            Ok(limit) => limit + 1,
        };
        let range = KeyRange {
            next: self.next_key,
            limit: self.next_key + len,
        };
        self.checkpoints.insert(
            range.next,
            Checkpoint {
                origin,
                content: source_code.to_string(),
            },
        );
        if token.is_none() {
            self.last_external_input = Some(range.next);
        }
        self.next_key = range.limit;
        range
    }

    /// Return a trace for the provided token.
    pub fn trace(&self, token: Token, cs_name_interner: &CsNameInterner) -> SourceCodeTrace {
        let value = match token.value() {
            Value::CommandRef(CommandRef::ControlSequence(_, cs_name)) => {
                format!("\\{}", cs_name_interner.resolve(cs_name).unwrap_or("?"))
            }
            _ => token.char().unwrap().to_string(),
        };

        let checkpoint_or = self
            .checkpoints
            .range((Included(&0), Included(&token.trace_key().0)))
            .next_back();
        let (&first_key, checkpoint) = match checkpoint_or {
            None => {
                let mut trace = SourceCodeTrace::unknown();
                trace.value = value;
                trace.token = Some(token);
                return trace;
            }
            Some(found) => found,
        };

        let char_offset = (token.trace_key().0 - first_key) as usize;
        if char_offset > checkpoint.content.chars().count() {
            // A dummy or synthesized key that landed past the end of the
            // last registered source.
            let mut trace = SourceCodeTrace::unknown();
            trace.value = value;
            trace.token = Some(token);
            return trace;
        }
        let mut line_number = 1;
        let mut byte_line_start = 0;
        let mut char_line_start = 0;
        for (char_index, (byte_index, c)) in checkpoint.content.char_indices().enumerate() {
            if char_index == char_offset {
                break;
            }
            if c == '\n' {
                byte_line_start = byte_index + 1;
                char_line_start = char_index + 1;
                line_number += 1;
            }
        }
        let position = char_offset - char_line_start;
        let tail = &checkpoint.content[byte_line_start..];
        let line_content = match tail.split_once('\n') {
            None => tail.to_string(),
            Some((line, _)) => line.to_string(),
        };
        SourceCodeTrace {
            origin: checkpoint.origin.clone(),
            line_content,
            line_number,
            index: position,
            value,
            token: Some(token),
        }
    }

    /// Return a trace for the end of the input.
    pub fn trace_end_of_input(&self) -> SourceCodeTrace {
        let checkpoint = match self
            .last_external_input
            .and_then(|key| self.checkpoints.get(&key))
        {
            None => return SourceCodeTrace::unknown(),
            Some(checkpoint) => checkpoint,
        };
        // (line index, byte index of the line's first character)
        let mut last_line: (usize, usize) = (0, 0);
        let mut last_non_empty_line: (usize, usize) = (0, 0);
        for (i, c) in checkpoint.content.char_indices() {
            if !c.is_whitespace() {
                last_non_empty_line = last_line;
            } else if c == '\n' {
                last_line.0 += 1;
                last_line.1 = i + 1;
            }
        }
        let line = checkpoint.content[last_non_empty_line.1..].trim_end();
        SourceCodeTrace {
            origin: checkpoint.origin.clone(),
            line_content: line.to_string(),
            line_number: last_non_empty_line.0 + 1,
            index: line.len(),
            value: " ".to_string(),
            token: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_traced_to_lines() {
        let origin = Origin::File("input.tex".into());
        let source_code = "ab\ncd";
        let mut tracer: Tracer = Default::default();
        let interner: CsNameInterner = Default::default();
        let mut range = tracer.register_source_code(None, origin.clone(), source_code);

        let tokens = [
            Token::new_letter('a', range.next()),
            Token::new_letter('b', range.next()),
            Token::new_space('\n', range.next()),
            Token::new_letter('c', range.next()),
            Token::new_letter('d', range.next()),
        ];

        let trace = tracer.trace(tokens[1], &interner);
        assert_eq!(trace.line_number, 1);
        assert_eq!(trace.index, 1);
        assert_eq!(trace.line_content, "ab");
        assert_eq!(trace.value, "b");

        let trace = tracer.trace(tokens[3], &interner);
        assert_eq!(trace.line_number, 2);
        assert_eq!(trace.index, 0);
        assert_eq!(trace.line_content, "cd");
        assert_eq!(trace.origin, origin);
    }

    #[test]
    fn multiple_sources() {
        let mut tracer: Tracer = Default::default();
        let interner: CsNameInterner = Default::default();

        let first = Origin::File("a.tex".into());
        let mut range = tracer.register_source_code(None, first.clone(), "a");
        let a = Token::new_letter('a', range.next());

        let second = Origin::File("b.tex".into());
        let mut range = tracer.register_source_code(None, second.clone(), "b");
        let b = Token::new_letter('b', range.next());

        assert_eq!(tracer.trace(a, &interner).origin, first);
        assert_eq!(tracer.trace(b, &interner).origin, second);
    }

    #[test]
    fn end_of_input() {
        let mut tracer: Tracer = Default::default();
        tracer.register_source_code(None, Origin::File("input.tex".into()), "line one\nline two\n");
        let trace = tracer.trace_end_of_input();
        assert_eq!(trace.line_number, 2);
        assert_eq!(trace.line_content, "line two");
        assert_eq!(trace.token, None);
    }

    #[test]
    fn dummy_key() {
        let tracer: Tracer = Default::default();
        let interner: CsNameInterner = Default::default();
        let token = Token::new_letter('x', Key::dummy());
        let trace = tracer.trace(token, &interner);
        assert_eq!(trace.value, "x");
        assert_eq!(trace.line_number, 0);
    }
}
