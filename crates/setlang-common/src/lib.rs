//! Common abstractions used when assembling Setlang engines.
//!
//! The interpreter core treats the outside world as a set of collaborators:
//! a file system, a resource finder that locates input files and fonts, and
//! logging sinks. This crate defines those collaborator traits, their real
//! implementations, and in-memory implementations for unit tests.

use setlang::prelude as sl;
use setlang::traits::*;
use std::collections::HashMap;
use std::{cell::RefCell, rc::Rc};

/// Implementations of this trait can provide access to the file system.
///
/// This trait is intended to be implemented by the state and used as a trait
/// bound in primitives like `\input` that require a file system.
///
/// The file system is returned in a dynamic pointer to avoid complicating
/// the trait with a generic parameter. File operations are rare in documents
/// so the overhead of a vtable lookup is negligible.
pub trait HasFileSystem {
    fn file_system(&self) -> Rc<RefCell<dyn FileSystem>> {
        Rc::new(RefCell::new(RealFileSystem {}))
    }
}

/// File system operations the interpreter may need to perform.
///
/// These are extracted to a trait so that they can be mocked out in unit
/// tests and in execution contexts with no real file system.
pub trait FileSystem {
    /// Read the entire contents of a file into a string.
    fn read_to_string(&self, path: &std::path::Path) -> std::io::Result<String>;

    /// Read the entire contents of a file into a bytes buffer.
    fn read_to_bytes(&self, path: &std::path::Path) -> std::io::Result<Vec<u8>>;

    /// Write a slice of bytes to a file.
    fn write_bytes(&self, path: &std::path::Path, contents: &[u8]) -> std::io::Result<()>;
}

/// Implementation of the file system trait that uses the real file system.
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &std::path::Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }
    fn read_to_bytes(&self, path: &std::path::Path) -> std::io::Result<Vec<u8>> {
        std::fs::read(path)
    }
    fn write_bytes(&self, path: &std::path::Path, contents: &[u8]) -> std::io::Result<()> {
        std::fs::write(path, contents)
    }
}

/// Read a file identified by a parsed file location into a string.
///
/// A missing file is a fatal error: the file was explicitly named in the
/// input, so there is nothing sensible to continue with.
pub fn read_file_to_string<S: HasFileSystem + SetlangState>(
    vm: &setlang::vm::VM<S>,
    file_location: setlang::parse::FileLocation,
    default_extension: &str,
) -> sl::Result<(std::path::PathBuf, String)> {
    let file_path = file_location.determine_full_path(
        vm.working_directory
            .as_ref()
            .map(std::path::PathBuf::as_ref),
        default_extension,
    );
    match vm
        .state
        .file_system()
        .borrow_mut()
        .read_to_string(&file_path)
    {
        Ok(source_code) => Ok((file_path, source_code)),
        Err(err) => Err(vm.fatal_error(IoError {
            title: format!("could not read from `{}`", file_path.display()),
            underlying_error: err,
        })),
    }
}

#[derive(Debug)]
pub struct IoError {
    pub title: String,
    pub underlying_error: std::io::Error,
}

impl setlang::error::SetlangError for IoError {
    fn kind(&self) -> setlang::error::Kind {
        setlang::error::Kind::FailedPrecondition
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn notes(&self) -> Vec<setlang::error::display::Note> {
        vec![format!("underlying filesystem error: {}", self.underlying_error).into()]
    }
}

/// In-memory file system for use in unit tests.
///
/// "Files" are added before the test runs; reads then resolve against the
/// in-memory map only.
#[derive(Default)]
pub struct InMemoryFileSystem {
    working_directory: std::path::PathBuf,
    string_files: HashMap<std::path::PathBuf, String>,
    bytes_files: HashMap<std::path::PathBuf, Vec<u8>>,
}

impl InMemoryFileSystem {
    /// Create a new in-memory file system.
    ///
    /// Typically the working directory is taken from the VM.
    pub fn new(working_directory: &std::path::Path) -> Self {
        Self {
            working_directory: working_directory.into(),
            string_files: Default::default(),
            bytes_files: Default::default(),
        }
    }

    /// Add a string file. The path is relative to the working directory.
    pub fn add_string_file(&mut self, relative_path: &str, content: &str) {
        let mut path = self.working_directory.clone();
        path.push(relative_path);
        self.string_files.insert(path, content.to_string());
    }

    /// Add a bytes file. The path is relative to the working directory.
    pub fn add_bytes_file(&mut self, relative_path: &str, content: &[u8]) {
        let mut path = self.working_directory.clone();
        path.push(relative_path);
        self.bytes_files.insert(path, content.into());
    }
}

impl FileSystem for InMemoryFileSystem {
    fn read_to_string(&self, path: &std::path::Path) -> std::io::Result<String> {
        match self.string_files.get(path) {
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "not found",
            )),
            Some(content) => Ok(content.clone()),
        }
    }
    fn read_to_bytes(&self, path: &std::path::Path) -> std::io::Result<Vec<u8>> {
        match self.bytes_files.get(path) {
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "not found",
            )),
            Some(content) => Ok(content.clone()),
        }
    }
    fn write_bytes(&self, _: &std::path::Path, _: &[u8]) -> std::io::Result<()> {
        unimplemented!()
    }
}

/// The kind of a resource a [ResourceFinder] can locate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Source code, e.g. for `\input`.
    Source,
    /// Font metrics.
    Font,
    /// Hyphenation pattern data.
    HyphenationPatterns,
}

impl ResourceKind {
    /// The default file extensions tried for this kind of resource,
    /// in order.
    pub fn default_extensions(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Source => &["tex"],
            ResourceKind::Font => &["glf"],
            ResourceKind::HyphenationPatterns => &["pat"],
        }
    }
}

/// Implementations of this trait locate external resources by name.
///
/// The finder is a collaborator of the interpreter core: the core asks for a
/// resource by name and kind and receives its bytes, or nothing.
pub trait ResourceFinder {
    /// Find the named resource and return its contents.
    fn find(&self, name: &str, kind: ResourceKind) -> Option<Vec<u8>>;
}

/// A resource finder that searches a list of directories.
///
/// A name that resolves directly (absolute, or relative to the working
/// directory) is used as is. Otherwise each search directory is tried in
/// order, first with the name verbatim and then with each of the kind's
/// default extensions appended.
pub struct PathResourceFinder {
    file_system: Rc<RefCell<dyn FileSystem>>,
    search_directories: Vec<std::path::PathBuf>,
}

impl PathResourceFinder {
    pub fn new(
        file_system: Rc<RefCell<dyn FileSystem>>,
        search_directories: Vec<std::path::PathBuf>,
    ) -> Self {
        Self {
            file_system,
            search_directories,
        }
    }

    fn try_read(&self, path: &std::path::Path) -> Option<Vec<u8>> {
        self.file_system.borrow_mut().read_to_bytes(path).ok()
    }
}

impl ResourceFinder for PathResourceFinder {
    fn find(&self, name: &str, kind: ResourceKind) -> Option<Vec<u8>> {
        let direct = std::path::Path::new(name);
        if let Some(bytes) = self.try_read(direct) {
            return Some(bytes);
        }
        for directory in &self.search_directories {
            let base = directory.join(name);
            if let Some(bytes) = self.try_read(&base) {
                log::debug!("resolved resource {name} to {}", base.display());
                return Some(bytes);
            }
            for extension in kind.default_extensions() {
                let with_extension = base.with_extension(extension);
                if let Some(bytes) = self.try_read(&with_extension) {
                    log::debug!(
                        "resolved resource {name} to {}",
                        with_extension.display()
                    );
                    return Some(bytes);
                }
            }
        }
        log::debug!("resource {name} not found");
        None
    }
}

/// Implementations of this trait can provide access to an output terminal
/// and a log file.
pub trait HasLogging {
    /// Return the output terminal.
    ///
    /// The default implementation returns standard out.
    fn terminal_out(&self) -> Rc<RefCell<dyn std::io::Write>> {
        Rc::new(RefCell::new(std::io::stdout()))
    }

    /// Return the log file.
    ///
    /// The default implementation returns a sink that writes nothing.
    fn log_file(&self) -> Rc<RefCell<dyn std::io::Write>> {
        Rc::new(RefCell::new(std::io::sink()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finder_with_files(files: &[(&str, &str)]) -> PathResourceFinder {
        let mut file_system = InMemoryFileSystem::new(std::path::Path::new("/work"));
        for (path, content) in files {
            file_system.add_bytes_file(path, content.as_bytes());
        }
        PathResourceFinder::new(
            Rc::new(RefCell::new(file_system)),
            vec!["/work".into(), "/work/extra".into()],
        )
    }

    #[test]
    fn find_with_extension_appended() {
        let finder = finder_with_files(&[("doc.tex", "hello")]);
        assert_eq!(
            finder.find("doc", ResourceKind::Source),
            Some(b"hello".to_vec())
        );
    }

    #[test]
    fn find_in_later_directory() {
        let finder = finder_with_files(&[("extra/patterns.pat", "pat1")]);
        assert_eq!(
            finder.find("patterns", ResourceKind::HyphenationPatterns),
            Some(b"pat1".to_vec())
        );
    }

    #[test]
    fn not_found() {
        let finder = finder_with_files(&[("doc.tex", "hello")]);
        assert_eq!(finder.find("other", ResourceKind::Font), None);
    }

    #[test]
    fn direct_path_wins() {
        let finder = finder_with_files(&[("/work/doc.tex", "direct")]);
        assert_eq!(
            finder.find("/work/doc.tex", ResourceKind::Source),
            Some(b"direct".to_vec())
        );
    }
}
