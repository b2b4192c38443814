use clap::Parser;
use colored::Colorize;
use galley::font;
use galley::hyphen;
use galley::writer::TextWriter;
use galley_core::Scaled;
use setlang::vm;
use setlang_common::{PathResourceFinder, ResourceFinder, ResourceKind};
use setlang_stdlib::StdLibState;
use std::path::PathBuf;

/// Galley: a typesetting macro language interpreter.
///
/// Galley reads a source file, expands its macros, assembles the typeset
/// material into pages, and writes the pages out.
#[derive(Parser)]
#[clap(version)]
struct Cli {
    #[clap(subcommand)]
    sub_command: SubCommand,
}

#[derive(Parser)]
enum SubCommand {
    Run(Run),
}

/// Run a source file and write the resulting pages as text
#[derive(Parser)]
struct Run {
    /// Path to the source file to run
    file_path: PathBuf,

    /// Directories to search for resources like hyphenation patterns
    #[arg(long)]
    search_path: Vec<PathBuf>,

    /// Name of a hyphenation pattern file to load
    #[arg(long)]
    patterns: Option<String>,

    /// The interaction mode, which decides what happens on recoverable
    /// errors: errorstop aborts, scroll and nonstop log and continue, and
    /// batch continues silently
    #[arg(long, default_value = "errorstop")]
    interaction_mode: InteractionModeArg,

    /// The maximum number of expansions performed while resolving a single
    /// token, which bounds runaway macro recursion
    #[arg(long)]
    max_expansion_depth: Option<usize>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum InteractionModeArg {
    Errorstop,
    Scroll,
    Nonstop,
    Batch,
}

impl From<InteractionModeArg> for vm::InteractionMode {
    fn from(value: InteractionModeArg) -> Self {
        match value {
            InteractionModeArg::Errorstop => vm::InteractionMode::ErrorStop,
            InteractionModeArg::Scroll => vm::InteractionMode::Scroll,
            InteractionModeArg::Nonstop => vm::InteractionMode::NonStop,
            InteractionModeArg::Batch => vm::InteractionMode::Batch,
        }
    }
}

fn main() {
    env_logger::init();
    let args: Cli = Cli::parse();
    match args.sub_command {
        SubCommand::Run(run_args) => {
            if let Err(err) = run(run_args) {
                eprintln!("{}", err.red());
                std::process::exit(1);
            }
        }
    }
}

fn run(args: Run) -> Result<(), String> {
    let mut path = args.file_path;
    if path.extension().is_none() {
        path.set_extension("tex");
    }
    let source_code =
        std::fs::read_to_string(&path).map_err(|err| format!("failed to open {path:?}: {err}"))?;

    let mut vm = StdLibState::new_vm();
    vm.interaction_mode = args.interaction_mode.into();
    if let Some(max_expansion_depth) = args.max_expansion_depth {
        vm.max_expansion_depth = max_expansion_depth;
    }

    // Font loading is outside the interpreter core, so the driver installs
    // a built-in typewriter-style metrics table as font 1 and selects it.
    let font = vm.state.boxes.register_font(default_font());
    vm.state.boxes.select_font(font);
    vm.state
        .boxes
        .set_document_writer(Box::new(TextWriter::new(std::io::stdout())));

    if let Some(patterns_name) = &args.patterns {
        let finder = PathResourceFinder::new(vm.state.file_system.clone(), args.search_path);
        match finder.find(patterns_name, ResourceKind::HyphenationPatterns) {
            Some(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                vm.state
                    .boxes
                    .set_patterns(hyphen::PatternTable::parse(&text));
            }
            None => {
                return Err(format!("hyphenation patterns `{patterns_name}` not found"));
            }
        }
    }

    vm.push_source(path.clone(), source_code)
        .map_err(|err| err.to_string())?;
    let pages = setlang_stdlib::run(&mut vm).map_err(|err| err.to_string())?;
    log::info!("finished {}: {pages} page(s) written", path.display());
    Ok(())
}

// A monospaced font: every alphanumeric glyph is half an em wide, and the
// em is 10 points.
fn default_font() -> font::FontTable {
    let quad = Scaled::ONE * 10;
    let mut table = font::FontTable::new(quad);
    table.add_monospaced_alphabet(quad / 2, (quad * 7) / 10, quad / 5);
    for c in ".,;:!?()[]'\"-+=/<>*@#$%&_|~^".chars() {
        table.add_glyph(c, quad / 2, (quad * 7) / 10, quad / 5);
    }
    table
}
