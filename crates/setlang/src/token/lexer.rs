//! The lexer, which turns streams of characters into tokens.
//!
//! Lexing is "just in time": the next token is only produced when it is
//! requested. It is incorrect to tokenize a whole input up front, because
//! category codes are mutable at runtime and a command can change how the
//! very next character must be classified. Consider this snippet, with the
//! standard category codes in place:
//! ```tex
//! \makeAWhitespace AB
//! ```
//! Tokenized eagerly, the input is a control sequence followed by the letters
//! A and B. But the control sequence changes the category code of A to
//! space, and spaces after a control word are trimmed, so the correct result
//! is the control sequence followed by the single letter B.

use crate::token;
use crate::token::catcode::CatCode;
use crate::token::trace;
use crate::token::CsNameInterner;
use crate::token::NsName;
use crate::token::Token;

/// Errors the lexer can report.
///
/// These are lexical errors and are recoverable: the caller may skip the
/// offending character and keep scanning.
#[derive(Debug)]
pub enum Error {
    /// A character with the invalid category code appeared in the input.
    InvalidCharacter(char, trace::Key),
}

/// Configuration the lexer reads while scanning.
pub trait Config {
    /// The current category code of the provided character.
    fn cat_code(&self, c: char) -> CatCode;

    /// The current end-of-line behavior.
    ///
    /// If this returns [None], end-of-line characters are ignored entirely:
    /// no space tokens and no paragraph breaks are produced from them.
    fn end_line_char(&self) -> Option<char> {
        Some('\r')
    }
}

/// The lexer.
///
/// One lexer owns one piece of source code; nested inputs are handled by the
/// VM keeping a stack of lexers.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Lexer {
    raw_lexer: RawLexer,
    skip_whitespace: bool,
    ended: bool,
    // Control sequence names are read into a shared buffer to avoid
    // allocating for each one.
    #[cfg_attr(feature = "serde", serde(skip))]
    buffer: String,
}

impl Lexer {
    pub fn new(source_code: String, trace_key_range: trace::KeyRange) -> Lexer {
        Lexer {
            raw_lexer: RawLexer::new(source_code, trace_key_range),
            skip_whitespace: false,
            ended: false,
            buffer: Default::default(),
        }
    }

    /// Mark the lexer as ended: no further tokens will be returned.
    ///
    /// Used by the primitive that stops reading the current file.
    pub fn end(&mut self) {
        self.ended = true;
    }

    pub(crate) fn next<F: Config>(
        &mut self,
        config: &F,
        cs_name_interner: &mut CsNameInterner,
        namespace: NsName,
    ) -> Result<Option<Token>, Error> {
        if self.ended {
            return Ok(None);
        }
        while let Some(raw_token) = self.raw_lexer.next(config) {
            let c = raw_token.char;
            let value = match raw_token.code {
                CatCode::Escape => {
                    let (cs_name, is_control_word) =
                        self.read_control_sequence(config, cs_name_interner);
                    self.skip_whitespace = is_control_word;
                    return Ok(Some(Token::new_control_sequence(
                        namespace,
                        cs_name,
                        raw_token.trace_key,
                    )));
                }
                CatCode::EndOfLine | CatCode::Space => {
                    if raw_token.code == CatCode::EndOfLine && config.end_line_char().is_none() {
                        continue;
                    }
                    let mut num_new_lines = self.consume_whitespace(config);
                    if raw_token.code == CatCode::EndOfLine {
                        num_new_lines += 1;
                    }
                    match (num_new_lines < 2, self.skip_whitespace) {
                        (true, true) => continue,
                        (true, false) => {
                            self.skip_whitespace = true;
                            return Ok(Some(Token::new_space(c, raw_token.trace_key)));
                        }
                        (false, _) => {
                            self.skip_whitespace = false;
                            return Ok(Some(Token::new_control_sequence(
                                namespace,
                                cs_name_interner.get_or_intern("par"),
                                raw_token.trace_key,
                            )));
                        }
                    }
                }
                CatCode::BeginGroup => Token::new_begin_group(c, raw_token.trace_key),
                CatCode::EndGroup => Token::new_end_group(c, raw_token.trace_key),
                CatCode::MathShift => Token::new_math_shift(c, raw_token.trace_key),
                CatCode::AlignmentTab => Token::new_alignment_tab(c, raw_token.trace_key),
                CatCode::Parameter => Token::new_parameter(c, raw_token.trace_key),
                CatCode::Superscript => {
                    if self.raw_lexer.maybe_apply_superscript_notation(c, true) {
                        continue;
                    }
                    Token::new_superscript(c, raw_token.trace_key)
                }
                CatCode::Subscript => Token::new_subscript(c, raw_token.trace_key),
                CatCode::Letter => Token::new_letter(c, raw_token.trace_key),
                CatCode::Other => Token::new_other(c, raw_token.trace_key),
                CatCode::Active => Token::new_active_character(c, raw_token.trace_key),
                CatCode::Comment => {
                    while let Some(next_raw_token) = self.raw_lexer.peek(config) {
                        if next_raw_token.code == CatCode::EndOfLine {
                            break;
                        }
                        self.raw_lexer.advance();
                    }
                    self.skip_whitespace = true;
                    continue;
                }
                CatCode::Ignored => continue,
                CatCode::Invalid => return Err(Error::InvalidCharacter(c, raw_token.trace_key)),
            };
            self.skip_whitespace = false;
            return Ok(Some(value));
        }
        Ok(None)
    }

    fn consume_whitespace<F: Config>(&mut self, config: &F) -> usize {
        let mut num_new_lines: usize = 0;
        while let Some(RawToken { code, .. }) = self.raw_lexer.peek(config) {
            num_new_lines += match code {
                CatCode::EndOfLine => 1,
                CatCode::Space => 0,
                _ => break,
            };
            self.raw_lexer.advance();
        }
        num_new_lines
    }

    /// Read a control sequence name, after the escape character has been
    /// consumed.
    ///
    /// Returns the interned name and whether the name is a control word
    /// (made of letters), which determines whether following whitespace is
    /// skipped.
    fn read_control_sequence<F: Config>(
        &mut self,
        config: &F,
        cs_name_interner: &mut CsNameInterner,
    ) -> (token::CsName, bool) {
        self.buffer.clear();
        let first_raw_token = match self.raw_lexer.next(config) {
            // An escape character at the very end of the input. The name is
            // empty; this is not an error.
            None => return (cs_name_interner.get_or_intern(""), true),
            Some(first_raw_token) => first_raw_token,
        };
        let is_control_word = match first_raw_token.code {
            CatCode::Letter => {
                self.buffer.push(first_raw_token.char);
                while let Some(raw_token) = self.raw_lexer.peek(config) {
                    match raw_token.code {
                        CatCode::Letter => {
                            self.raw_lexer.advance();
                            self.buffer.push(raw_token.char);
                        }
                        CatCode::Superscript => {
                            if self
                                .raw_lexer
                                .maybe_apply_superscript_notation(raw_token.char, false)
                            {
                                continue;
                            }
                            break;
                        }
                        _ => break,
                    }
                }
                true
            }
            CatCode::Superscript => {
                if self
                    .raw_lexer
                    .maybe_apply_superscript_notation(first_raw_token.char, true)
                {
                    return self.read_control_sequence(config, cs_name_interner);
                }
                self.buffer.push(first_raw_token.char);
                false
            }
            _ => {
                self.buffer.push(first_raw_token.char);
                false
            }
        };
        (cs_name_interner.get_or_intern(&self.buffer), is_control_word)
    }
}

struct RawToken {
    code: CatCode,
    char: char,
    trace_key: trace::Key,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct RawLexer {
    source_code: String,
    pos: usize,
    trace_key_range: trace::KeyRange,
}

impl RawLexer {
    fn new(source_code: String, trace_key_range: trace::KeyRange) -> RawLexer {
        RawLexer {
            source_code,
            pos: 0,
            trace_key_range,
        }
    }

    fn next<F: Config>(&mut self, config: &F) -> Option<RawToken> {
        match self.source_code[self.pos..].chars().next() {
            Some(c) => {
                self.pos += c.len_utf8();
                let code = config.cat_code(c);
                Some(RawToken {
                    char: c,
                    code,
                    trace_key: self.trace_key_range.next(),
                })
            }
            None => None,
        }
    }

    fn peek<F: Config>(&mut self, config: &F) -> Option<RawToken> {
        match self.source_code[self.pos..].chars().next() {
            Some(c) => {
                let code = config.cat_code(c);
                Some(RawToken {
                    char: c,
                    code,
                    trace_key: self.trace_key_range.peek(),
                })
            }
            None => None,
        }
    }

    /// Apply superscript escape notation if it is present at the current
    /// position.
    ///
    /// `char_1` is a character with the superscript category code; it has
    /// been consumed from the input already if `char_1_consumed` is true.
    /// The notation applies when `char_1` is followed by an identical
    /// character and at least one more character. If the following two
    /// characters are both lowercase hexadecimal digits, all four characters
    /// denote the character with that hexadecimal value. Otherwise, for a
    /// following ASCII character `c`, the three characters denote `c`
    /// offset by 0x40.
    ///
    /// The replacement character is written over the consumed characters in
    /// the source buffer so that scanning resumes with it; this makes
    /// chained escapes work without any extra lookahead state.
    ///
    /// Returns false, and consumes nothing, if the notation does not apply;
    /// the caller then treats `char_1` as an ordinary superscript character.
    fn maybe_apply_superscript_notation(&mut self, char_1: char, char_1_consumed: bool) -> bool {
        let char_2_start = if char_1_consumed {
            self.pos
        } else {
            self.pos + char_1.len_utf8()
        };
        let char_2 = match self.source_code[char_2_start..].chars().next() {
            None => return false,
            Some(next_char) => next_char,
        };
        if char_2 != char_1 {
            return false;
        }
        let char_3_start = char_2_start + char_2.len_utf8();
        let char_3 = match self.source_code[char_3_start..].chars().next() {
            // If the input is over the notation is left alone, and the
            // superscript characters come through as themselves.
            None => return false,
            Some(c) => c,
        };
        if !char_1_consumed {
            self.advance();
        }
        // Consume char_2.
        self.advance();

        // First try the two-digit lowercase hexadecimal form.
        let char_4_or = self.source_code[char_3_start + char_3.len_utf8()..].chars().next();
        if let (Some(d_1), Some(Some(d_2))) = (
            lowercase_hex_digit(char_3),
            char_4_or.map(lowercase_hex_digit),
        ) {
            let value = d_1 * 16 + d_2;
            if value < 0x80 {
                // Consume char_3 and overwrite the single byte of char_4.
                self.advance();
                // SAFETY: char_4 is a lowercase hex digit and so a single
                // byte, and the replacement value is ASCII, so the
                // replacement preserves the UTF-8 structure of the string.
                unsafe {
                    self.source_code.as_bytes_mut()[self.pos] = value;
                }
            } else {
                // The replacement character is 2 bytes in UTF-8, exactly the
                // width of the two consumed hex digits, so it is written
                // over both of them.
                let replacement = char::from_u32(value as u32).unwrap();
                let mut encoded = [0_u8; 2];
                replacement.encode_utf8(&mut encoded);
                // SAFETY: chars 3 and 4 are hex digits occupying one byte
                // each, and the replacement occupies exactly two bytes, so
                // the UTF-8 structure of the string is preserved.
                unsafe {
                    self.source_code.as_bytes_mut()[self.pos] = encoded[0];
                    self.source_code.as_bytes_mut()[self.pos + 1] = encoded[1];
                }
            }
            return true;
        }

        // Fall back to the offset-by-0x40 form.
        if !char_3.is_ascii() {
            return true;
        }
        let u = char_3 as u32 as u8;
        let m = match u {
            0x00..=0x3F => u + 0x40,
            0x40..=0x7F => u - 0x40,
            _ => return true, // unreachable because char_3 is ASCII
        };
        // SAFETY: char_3 is single-byte ASCII and the replacement is
        // single-byte ASCII, so the replacement preserves the UTF-8
        // structure of the string.
        unsafe {
            self.source_code.as_bytes_mut()[self.pos] = m;
        }
        true
    }

    fn advance(&mut self) {
        if let Some(c) = self.source_code[self.pos..].chars().next() {
            self.pos += c.len_utf8();
        }
        self.trace_key_range.next();
    }
}

fn lowercase_hex_digit(c: char) -> Option<u8> {
    match c {
        '0'..='9' => Some(c as u8 - b'0'),
        'a'..='f' => Some(c as u8 - b'a' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::catcode::CatCode::*;
    use crate::token::NsNameInterner;
    use crate::token::Value;
    use std::collections::HashMap;

    enum TokenValue {
        Character(char, CatCode),
        ControlSequence(&'static str),
    }
    use TokenValue::Character;
    use TokenValue::ControlSequence;

    struct CatCodeMap(HashMap<char, CatCode>);

    // The lexer reads its configuration off the state, so the test config
    // is a minimal state type.
    impl crate::vm::SetlangState for CatCodeMap {
        fn cat_code(&self, c: char) -> CatCode {
            self.0.get(&c).copied().unwrap_or_default()
        }
    }

    fn lexer_test(input: &str, expected_tokens: Vec<TokenValue>) {
        let mut lexer = Lexer::new(input.into(), trace::KeyRange::for_testing());
        let mut map: HashMap<char, CatCode> = (0..128)
            .map(|i| {
                let c = char::from_u32(i).unwrap();
                (c, CatCode::standard(c))
            })
            .collect();
        map.insert('X', EndOfLine);
        map.insert('Y', Space);
        map.insert('Z', Ignored);
        let map = CatCodeMap(map);
        let mut cs_name_interner: CsNameInterner = Default::default();
        let mut ns_name_interner: NsNameInterner = Default::default();
        let ns = ns_name_interner.get_or_intern("");
        let mut actual = Vec::new();
        while let Some(t) = lexer.next(&map, &mut cs_name_interner, ns).unwrap() {
            actual.push(t.value());
        }
        let expected: Vec<Value> = expected_tokens
            .into_iter()
            .map(|t| match t {
                ControlSequence(name) => Value::CommandRef(token::CommandRef::ControlSequence(
                    ns,
                    cs_name_interner.get_or_intern(name),
                )),
                Character(c, cat_code) => Value::new(c, cat_code),
            })
            .collect();
        assert_eq!(expected, actual);
    }

    macro_rules! lexer_tests {
        ($( ( $name: ident, $input: expr, $ ( $expected_token : expr, ) * ), )+) => {
            $(
            #[test]
            fn $name() {
                let input = $input;
                let expected_tokens = vec!( $( $expected_token ),* );
                lexer_test(&input, expected_tokens);
            }
            )+
        };
    }

    lexer_tests![
        (
            control_sequence_with_group,
            r"\a{b}",
            ControlSequence("a"),
            Character('{', BeginGroup),
            Character('b', Letter),
            Character('}', EndGroup),
        ),
        (
            whitespace_trimmed_after_control_word,
            r"\a b",
            ControlSequence("a"),
            Character('b', Letter),
        ),
        (
            multiple_spaces_trimmed_after_control_word,
            "\\a  b",
            ControlSequence("a"),
            Character('b', Letter),
        ),
        (
            newline_trimmed_after_control_word,
            "\\a\n b",
            ControlSequence("a"),
            Character('b', Letter),
        ),
        (
            multi_character_control_sequence,
            "\\ABC",
            ControlSequence("ABC"),
        ),
        (
            single_non_letter_character_control_sequence,
            "\\{{",
            ControlSequence("{"),
            Character('{', BeginGroup),
        ),
        (
            whitespace_not_trimmed_after_control_symbol,
            "\\{ a",
            ControlSequence("{"),
            Character(' ', Space),
            Character('a', Letter),
        ),
        (
            comment_to_end_of_line,
            "A%a comment here\nC",
            Character('A', Letter),
            Character('C', Letter),
        ),
        (
            two_comments,
            "A%a comment here\n%A second comment\nC",
            Character('A', Letter),
            Character('C', Letter),
        ),
        (
            comment_at_end_of_input,
            "A%a comment here",
            Character('A', Letter),
        ),
        (
            comment_then_space,
            "A%\n B",
            Character('A', Letter),
            Character('B', Letter),
        ),
        (
            comment_then_blank_line,
            "A%\n\n B",
            Character('A', Letter),
            ControlSequence("par"),
            Character('B', Letter),
        ),
        (
            control_word_comment,
            "\\A %\nB",
            ControlSequence("A"),
            Character('B', Letter),
        ),
        (
            control_word_then_digit,
            "\\A1",
            ControlSequence("A"),
            Character('1', Other),
        ),
        (
            double_space_creates_one_space,
            "A  B",
            Character('A', Letter),
            Character(' ', Space),
            Character('B', Letter),
        ),
        (
            single_newline_creates_one_space,
            "A\nB",
            Character('A', Letter),
            Character('\n', Space),
            Character('B', Letter),
        ),
        (
            space_and_newline_creates_space,
            "A \nB",
            Character('A', Letter),
            Character(' ', Space),
            Character('B', Letter),
        ),
        (
            double_newline_creates_par,
            "A\n\nB",
            Character('A', Letter),
            ControlSequence("par"),
            Character('B', Letter),
        ),
        (
            newline_space_newline_creates_par,
            "A\n \nB",
            Character('A', Letter),
            ControlSequence("par"),
            Character('B', Letter),
        ),
        (
            non_standard_whitespace_character,
            "AYB",
            Character('A', Letter),
            Character('Y', Space),
            Character('B', Letter),
        ),
        (
            non_standard_newline_character,
            "AXB",
            Character('A', Letter),
            Character('X', Space),
            Character('B', Letter),
        ),
        (single_ignored_character, "Z",),
        (escape_at_end_of_input, r"\", ControlSequence(""),),
        (superscript_ctrl_form_1, "^^k", Character('+', Other),),
        (superscript_ctrl_form_2, "^^+", Character('k', Letter),),
        (superscript_ctrl_form_3, "^^\n", Character('J', Letter),),
        (superscript_hex_form_ascii, "^^41", Character('A', Letter),),
        (
            superscript_hex_form_newline,
            "^^0aB",
            Character('\n', Space),
            Character('B', Letter),
        ),
        (superscript_hex_form_high, "^^e9", Character('é', Other),),
        (
            superscript_hex_needs_two_digits,
            // Only one hex digit follows, so the ctrl form applies to 'a'
            // (0x61 - 0x40 = 0x21 = '!').
            "^^aZ",
            Character('!', Other),
        ),
        (
            superscript_end_of_input_1,
            "^^",
            Character('^', Superscript),
            Character('^', Superscript),
        ),
        (
            superscript_end_of_input_2,
            "\\^^",
            ControlSequence("^"),
            Character('^', Superscript),
        ),
        (superscript_in_cs_1, "\\^^6d", ControlSequence("m"),),
        (superscript_in_cs_2, "\\^^6da", ControlSequence("ma"),),
        (superscript_ctrl_in_cs, "\\^^-", ControlSequence("m"),),
        (superscript_ctrl_in_cs_continue, "\\a^^-", ControlSequence("am"),),
        (
            superscript_not_doubled,
            "\\^a",
            ControlSequence("^"),
            Character('a', Letter),
        ),
    ];

    #[test]
    fn invalid_character() {
        let mut lexer = Lexer::new("\x7F".into(), trace::KeyRange::for_testing());
        let map = CatCodeMap(HashMap::from([('\x7F', CatCode::Invalid)]));
        let mut cs_name_interner: CsNameInterner = Default::default();
        let mut ns_name_interner: NsNameInterner = Default::default();
        let ns = ns_name_interner.get_or_intern("");
        assert!(matches!(
            lexer.next(&map, &mut cs_name_interner, ns),
            Err(Error::InvalidCharacter('\x7F', _))
        ));
    }

    struct NoEndLineConfig(HashMap<char, CatCode>);

    impl crate::vm::SetlangState for NoEndLineConfig {
        fn cat_code(&self, c: char) -> CatCode {
            self.0.get(&c).copied().unwrap_or_default()
        }
        fn end_line_char(&self) -> Option<char> {
            None
        }
    }

    #[test]
    fn end_of_line_disabled() {
        let map: HashMap<char, CatCode> = (0..128)
            .map(|i| {
                let c = char::from_u32(i).unwrap();
                (c, CatCode::standard(c))
            })
            .collect();
        let config = NoEndLineConfig(map);
        let mut lexer = Lexer::new("A\n\nB".into(), trace::KeyRange::for_testing());
        let mut cs_name_interner: CsNameInterner = Default::default();
        let mut ns_name_interner: NsNameInterner = Default::default();
        let ns = ns_name_interner.get_or_intern("");
        let mut actual = Vec::new();
        while let Some(t) = lexer.next(&config, &mut cs_name_interner, ns).unwrap() {
            actual.push(t.value());
        }
        assert_eq!(
            actual,
            vec![Value::Letter('A'), Value::Letter('B')],
        );
    }
}
