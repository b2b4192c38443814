//! File location parsing.
//!
//! A file location is a sequence of non-space character tokens, with an
//! optional extension after a period and an optional area before a `>` or
//! `:` delimiter.

use std::path;

use crate::prelude as sl;
use crate::token;
use crate::traits::*;
use crate::vm;

/// A file reference parsed from the token stream.
#[derive(PartialEq, Eq, Debug)]
pub struct FileLocation {
    pub path: String,
    pub extension: Option<String>,
    pub area: Option<String>,
}

impl<S: SetlangState> Parsable<S> for FileLocation {
    fn parse_impl(input: &mut vm::ExpansionInput<S>) -> sl::Result<Self> {
        let mut raw_string = String::new();
        let mut area_delimiter = None;
        let mut ext_delimiter = None;
        loop {
            let t = match input.peek()? {
                None => break,
                Some(t) => t,
            };
            if let token::Value::Space(_) = t.value() {
                input.consume()?;
                break;
            }
            let c = match t.char() {
                None => break,
                Some(c) => c,
            };
            input.consume()?;
            match c {
                '>' | ':' => {
                    area_delimiter = Some(raw_string.len() + 1);
                    ext_delimiter = None;
                }
                '.' => {
                    ext_delimiter = Some(raw_string.len());
                }
                _ => (),
            }
            raw_string.push(c);
        }

        Ok(FileLocation {
            path: raw_string
                [area_delimiter.unwrap_or(0)..ext_delimiter.unwrap_or(raw_string.len())]
                .into(),
            extension: ext_delimiter.map(|j| raw_string[j + 1..].into()),
            area: area_delimiter.map(|i| raw_string[..i].into()),
        })
    }
}

impl FileLocation {
    /// Resolve the location to a full path.
    ///
    /// Relative paths are resolved against the working directory.
    pub fn determine_full_path(
        &self,
        working_directory: Option<&path::Path>,
        default_extension: &str,
    ) -> path::PathBuf {
        let mut path: path::PathBuf = match working_directory {
            None => Default::default(),
            Some(working_directory) => working_directory.into(),
        };
        path.push(std::ffi::OsString::from(&self.path));
        path.set_extension(std::ffi::OsString::from(
            self.extension.as_deref().unwrap_or(default_extension),
        ));
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::testing::*;

    parse_success_tests![
        (
            path_only,
            "path/to/file",
            FileLocation {
                path: "path/to/file".to_string(),
                extension: None,
                area: None,
            },
        ),
        (
            path_only_control_sequence,
            r"path/to/file\relax more",
            FileLocation {
                path: "path/to/file".to_string(),
                extension: None,
                area: None,
            },
        ),
        (
            path_only_trailing_word,
            "path/to/file something",
            FileLocation {
                path: "path/to/file".to_string(),
                extension: None,
                area: None,
            },
        ),
        (
            extension_only,
            ".tex",
            FileLocation {
                path: "".to_string(),
                extension: Some("tex".to_string()),
                area: None,
            },
        ),
        (
            path_and_extension,
            "path/to/file.tex",
            FileLocation {
                path: "path/to/file".to_string(),
                extension: Some("tex".to_string()),
                area: None,
            },
        ),
        (
            path_and_area,
            "area:path/to/file",
            FileLocation {
                path: "path/to/file".to_string(),
                extension: None,
                area: Some("area:".to_string()),
            },
        ),
    ];
}
