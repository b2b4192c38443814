//! Knuth–Morris–Pratt substring search
//!
//! This module finds occurrences of a fixed substring in a string whose
//! elements arrive one at a time.
//! By "string" and "substring" we just mean sequences of elements of the same
//! type; in the interpreter the elements are token values and the substring is
//! the delimiter of a macro parameter.
//!
//! A [Matcher] is built once per substring and precomputes the KMP prefix
//! function.
//! Each search over a string is a [Search] value obtained from
//! [Matcher::start]; elements are fed to [Search::next], which reports whether
//! the last `m` elements seen equal the substring of length `m`.
//!
//! ```
//! # use galley_stdext::algorithms::substringsearch::Matcher;
//! let matcher = Matcher::new(vec![2, 3, 2]).unwrap();
//! let mut search = matcher.start();
//! assert_eq!(search.next(&1), false);
//! assert_eq!(search.next(&2), false);
//! assert_eq!(search.next(&3), false);
//! assert_eq!(search.next(&2), true);
//! assert_eq!(search.next(&3), false);
//! assert_eq!(search.next(&2), true);
//! ```

/// Data structure used to match a specific substring in many strings.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Matcher<T: PartialEq> {
    substring: Vec<T>,
    prefix_fn: Vec<usize>,
}

impl<T: PartialEq> Matcher<T> {
    /// Create a new matcher for the provided substring.
    ///
    /// Returns [None] if the substring is empty.
    pub fn new(substring: Vec<T>) -> Option<Matcher<T>> {
        if substring.is_empty() {
            return None;
        }
        let mut prefix_fn = Vec::with_capacity(substring.len());
        prefix_fn.push(0);
        let mut k = 0;
        for i in 1..substring.len() {
            while k > 0 && substring[k] != substring[i] {
                k = prefix_fn[k - 1];
            }
            if substring[k] == substring[i] {
                k += 1;
            }
            prefix_fn.push(k);
        }
        Some(Matcher {
            substring,
            prefix_fn,
        })
    }

    /// Start a new search.
    pub fn start(&self) -> Search<T> {
        Search {
            matcher: self,
            matched: 0,
        }
    }

    /// Get the substring being searched for.
    //
    // A mutable reference is not provided: the prefix function relies on the
    // substring remaining constant.
    pub fn substring(&self) -> &[T] {
        &self.substring
    }
}

/// An in-progress search for a substring within one string.
pub struct Search<'a, T: PartialEq> {
    matcher: &'a Matcher<T>,
    matched: usize,
}

impl<'a, T: PartialEq> Search<'a, T> {
    /// Provide the next element of the string.
    ///
    /// Returns true if the last `m` elements seen equal the substring, where
    /// `m` is the substring's length.
    pub fn next(&mut self, tail: &T) -> bool {
        while self.matched > 0 && &self.matcher.substring[self.matched] != tail {
            self.matched = self.matcher.prefix_fn[self.matched - 1];
        }
        if &self.matcher.substring[self.matched] == tail {
            self.matched += 1;
        }
        if self.matched == self.matcher.substring.len() {
            self.matched = self.matcher.prefix_fn[self.matched - 1];
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn match_indices(substring: Vec<char>, s: &str) -> Vec<usize> {
        let matcher = Matcher::new(substring).unwrap();
        let mut search = matcher.start();
        s.chars()
            .enumerate()
            .filter_map(|(i, c)| if search.next(&c) { Some(i) } else { None })
            .collect()
    }

    #[test]
    fn single_element() {
        assert_eq!(match_indices(vec!['a'], "banana"), vec![1, 3, 5]);
    }

    #[test]
    fn overlapping_matches() {
        assert_eq!(match_indices(vec!['a', 'n', 'a'], "banana"), vec![3, 5]);
    }

    #[test]
    fn no_match() {
        assert_eq!(match_indices(vec!['x', 'y'], "banana"), Vec::<usize>::new());
    }

    #[test]
    fn empty_substring_rejected() {
        assert!(Matcher::<char>::new(vec![]).is_none());
    }
}
