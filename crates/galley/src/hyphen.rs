//! Hyphenation.
//!
//! The pattern table implements Liang's algorithm: patterns are short
//! letter sequences with inter-letter priorities, a `.` marks a word
//! boundary, and a word's break points are found by superimposing every
//! matching pattern and keeping positions where the maximum priority is
//! odd.
//!
//! The pattern *data* is external: it arrives as text through the resource
//! finder and is parsed here. [insert_discretionaries] walks a horizontal
//! list and materializes the break points as discretionary nodes.

use crate::node;
use std::collections::HashMap;

/// A hyphenation pattern table.
pub struct PatternTable {
    // Key: the letters of a pattern, with boundary dots kept.
    // Value: one priority per inter-letter position, including the
    // positions before the first and after the last letter.
    patterns: HashMap<String, Vec<u8>>,
    /// Minimum number of letters before the first break point.
    pub left_hyphen_min: usize,
    /// Minimum number of letters after the last break point.
    pub right_hyphen_min: usize,
}

impl Default for PatternTable {
    fn default() -> Self {
        Self {
            patterns: Default::default(),
            left_hyphen_min: 2,
            right_hyphen_min: 3,
        }
    }
}

impl PatternTable {
    /// Parse a whitespace-separated list of patterns, e.g. `.hy2p a1b 2n1d`.
    ///
    /// Lines starting with `%` are comments.
    pub fn parse(text: &str) -> PatternTable {
        let mut table = PatternTable::default();
        for line in text.lines() {
            let line = match line.split_once('%') {
                None => line,
                Some((before_comment, _)) => before_comment,
            };
            for pattern in line.split_whitespace() {
                table.insert_pattern(pattern);
            }
        }
        table
    }

    /// Insert a single pattern like `a1b` or `.hy2p`.
    pub fn insert_pattern(&mut self, pattern: &str) {
        let mut letters = String::new();
        let mut priorities: Vec<u8> = vec![0];
        for c in pattern.chars() {
            match c.to_digit(10) {
                Some(d) => {
                    *priorities.last_mut().unwrap() = d as u8;
                }
                None => {
                    letters.push(c);
                    priorities.push(0);
                }
            }
        }
        if letters.is_empty() {
            return;
        }
        self.patterns.insert(letters, priorities);
    }

    /// The number of patterns in the table.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Compute the positions within `word` at which a hyphen may be
    /// inserted.
    ///
    /// A returned position `i` means a break is allowed between the i-th
    /// and (i+1)-th letters, 1-based from the start of the word.
    /// Matching is performed on the lowercased word.
    pub fn hyphenation_points(&self, word: &str) -> Vec<usize> {
        let letters: Vec<char> = word.chars().flat_map(|c| c.to_lowercase()).collect();
        if letters.len() < self.left_hyphen_min + self.right_hyphen_min {
            return vec![];
        }
        // The dotted word ".word." that boundary patterns match against.
        let mut dotted: Vec<char> = Vec::with_capacity(letters.len() + 2);
        dotted.push('.');
        dotted.extend(&letters);
        dotted.push('.');

        // One priority per inter-letter position of the dotted word.
        let mut priorities = vec![0_u8; dotted.len() + 1];
        for start in 0..dotted.len() {
            for end in start + 1..=dotted.len() {
                let candidate: String = dotted[start..end].iter().collect();
                if let Some(pattern_priorities) = self.patterns.get(&candidate) {
                    for (offset, priority) in pattern_priorities.iter().enumerate() {
                        let position = start + offset;
                        if priorities[position] < *priority {
                            priorities[position] = *priority;
                        }
                    }
                }
            }
        }

        let mut points = vec![];
        for i in 1..letters.len() {
            // Position i of the undotted word is position i+1 of the dotted
            // word's priority array.
            if priorities[i + 1] % 2 == 1
                && i >= self.left_hyphen_min
                && letters.len() - i >= self.right_hyphen_min
            {
                points.push(i);
            }
        }
        points
    }
}

/// Walk a horizontal list and insert a discretionary break at each
/// hyphenation point of each word.
///
/// A word is a maximal run of alphabetic character nodes in a single font.
/// The discretionary's pre-break material is the hyphen character in the
/// word's font.
pub fn insert_discretionaries(list: Vec<node::Horizontal>, table: &PatternTable) -> Vec<node::Horizontal> {
    let mut result = Vec::with_capacity(list.len());
    let mut word: Vec<node::Char> = Vec::new();
    for n in list {
        match n {
            node::Horizontal::Char(c) if c.char.is_alphabetic() => {
                if word.last().is_some_and(|prev| prev.font != c.font) {
                    flush_word(&mut result, &mut word, table);
                }
                word.push(c);
            }
            _ => {
                flush_word(&mut result, &mut word, table);
                result.push(n);
            }
        }
    }
    flush_word(&mut result, &mut word, table);
    result
}

fn flush_word(
    result: &mut Vec<node::Horizontal>,
    word: &mut Vec<node::Char>,
    table: &PatternTable,
) {
    if word.is_empty() {
        return;
    }
    let text: String = word.iter().map(|c| c.char).collect();
    let font = word[0].font;
    let points = table.hyphenation_points(&text);
    let mut points = points.iter().peekable();
    for (i, c) in word.drain(..).enumerate() {
        result.push(node::Char {
            char: c.char,
            font: c.font,
        }
        .into());
        if points.peek() == Some(&&(i + 1)) {
            points.next();
            result.push(
                node::Discretionary {
                    pre_break: vec![node::Char { char: '-', font }.into()],
                    post_break: vec![],
                    replace_count: 0,
                }
                .into(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A small slice of the English pattern set, enough to hyphenate
    // "hyphenation" as hy-phen-ation like the full set does.
    const PATTERNS: &str = "
        .hy3ph he2n hena4 hen5at 1na n2at 1tio 2io o2n
        % a comment line
        ";

    #[test]
    fn parse_patterns() {
        let table = PatternTable::parse(PATTERNS);
        assert_eq!(table.len(), 9);
    }

    #[test]
    fn hyphenation_points_for_hyphenation() {
        let table = PatternTable::parse(PATTERNS);
        assert_eq!(table.hyphenation_points("hyphenation"), vec![2, 6]);
    }

    #[test]
    fn short_words_are_not_hyphenated() {
        let table = PatternTable::parse(".a1b.");
        assert_eq!(table.hyphenation_points("ab"), vec![]);
    }

    #[test]
    fn case_is_ignored() {
        let table = PatternTable::parse(PATTERNS);
        assert_eq!(table.hyphenation_points("Hyphenation"), vec![2, 6]);
    }

    #[test]
    fn discretionaries_inserted() {
        let table = PatternTable::parse(PATTERNS);
        let list: Vec<node::Horizontal> = "hyphenation"
            .chars()
            .map(|c| node::Char { char: c, font: 0 }.into())
            .collect();
        let got = insert_discretionaries(list, &table);
        // 11 chars + 2 discretionaries.
        assert_eq!(got.len(), 13);
        let discretionary_positions: Vec<usize> = got
            .iter()
            .enumerate()
            .filter_map(|(i, n)| match n {
                node::Horizontal::Discretionary(_) => Some(i),
                _ => None,
            })
            .collect();
        assert_eq!(discretionary_positions, vec![2, 7]);
        match &got[2] {
            node::Horizontal::Discretionary(d) => {
                assert_eq!(d.pre_break.len(), 1);
                match &d.pre_break[0] {
                    node::Horizontal::Char(c) => assert_eq!(c.char, '-'),
                    _ => panic!("expected the pre-break to be a hyphen character"),
                }
            }
            _ => panic!("expected a discretionary node"),
        }
    }

    #[test]
    fn non_letters_split_words() {
        let table = PatternTable::parse(PATTERNS);
        let mut list: Vec<node::Horizontal> = vec![];
        for c in "hyphenation".chars() {
            list.push(node::Char { char: c, font: 0 }.into());
        }
        list.push(
            node::Glue {
                kind: node::GlueKind::Normal,
                value: galley_core::Glue::default(),
            }
            .into(),
        );
        for c in "on".chars() {
            list.push(node::Char { char: c, font: 0 }.into());
        }
        let got = insert_discretionaries(list, &table);
        assert_eq!(got.len(), 16);
    }
}
