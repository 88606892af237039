use anyhow::Result;
use callmap::commands::{
    build_command, callees_command, callers_command, export_command, init_project_command,
    project_info_command, roots_command, show_command,
};
use callmap::init_tracing;
use callmap_core::analysis::{ExtractionMode, FallbackPolicy};
use clap::{Parser, Subcommand, ValueEnum};

/// Call graph extractor for Rust source trees.
///
/// This CLI is a thin wrapper around `callmap-core`. All substantive logic
/// lives in the library.
#[derive(Parser, Debug)]
#[command(name = "callmap", version, about = "Extract and query a call graph", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ModeArg {
    /// Match call targets against declared names.
    Lexical,
    /// Ask an analysis server over LSP.
    Precision,
}

impl From<ModeArg> for ExtractionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Lexical => ExtractionMode::Lexical,
            ModeArg::Precision => ExtractionMode::Precision,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FallbackArg {
    Lexical,
    Abort,
}

impl From<FallbackArg> for FallbackPolicy {
    fn from(policy: FallbackArg) -> Self {
        match policy {
            FallbackArg::Lexical => FallbackPolicy::Lexical,
            FallbackArg::Abort => FallbackPolicy::Abort,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a project: writes `.callmap/project.json` and creates the database.
    Init {
        /// Project root directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Optional project name. If omitted, the name is derived from the root directory.
        #[arg(long)]
        name: Option<String>,

        /// Default extraction mode stored in the config.
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },

    /// Index the sources under the root, extract edges, and replace the stored graph.
    Build {
        #[arg(long, default_value = ".")]
        root: String,

        /// Override the configured extraction mode.
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Override what happens when the analysis server is unavailable.
        #[arg(long, value_enum)]
        fallback: Option<FallbackArg>,

        /// Analysis server executable for precision mode.
        #[arg(long)]
        resolver: Option<String>,

        /// Emit the build report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show one function (signature, callees, callers, definition), or the whole graph as JSON.
    Show {
        #[arg(long, default_value = ".")]
        root: String,

        name: Option<String>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List the functions that call NAME.
    Callers {
        #[arg(long, default_value = ".")]
        root: String,

        name: String,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List the functions NAME calls.
    Callees {
        #[arg(long, default_value = ".")]
        root: String,

        name: String,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List entry points: functions no other function calls.
    Roots {
        #[arg(long, default_value = ".")]
        root: String,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Write the stored graph as JSON (default: graphs/callgraph.json).
    Export {
        #[arg(long, default_value = ".")]
        root: String,

        /// Output file path.
        #[arg(long)]
        out: Option<String>,
    },

    /// Show project configuration and a summary of the stored graph.
    Info {
        #[arg(long, default_value = ".")]
        root: String,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Init { root, name, mode } => {
            init_project_command(&root, name, mode.map(Into::into))?;
        }
        Command::Build { root, mode, fallback, resolver, json } => {
            build_command(&root, mode.map(Into::into), fallback.map(Into::into), resolver, json)?;
        }
        Command::Show { root, name, json } => show_command(&root, name.as_deref(), json)?,
        Command::Callers { root, name, json } => callers_command(&root, &name, json)?,
        Command::Callees { root, name, json } => callees_command(&root, &name, json)?,
        Command::Roots { root, json } => {
            roots_command(&root, json)?;
        }
        Command::Export { root, out } => {
            export_command(&root, out.as_deref())?;
        }
        Command::Info { root, json } => project_info_command(&root, json)?,
    }

    Ok(())
}
