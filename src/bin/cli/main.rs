//! CLI tool for arcfold archive operations.

mod commands;
mod exit_codes;
mod output;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use std::path::PathBuf;

use exit_codes::ExitCode;

/// Browse and edit ZIP and TAR archives as folders
#[derive(Parser)]
#[command(name = "arcfold")]
#[command(author, version, about = "Browse and edit ZIP and TAR archives as folders", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value = "human", global = true)]
    format: OutputFormat,

    /// Suppress informational output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty archive (.zip or .tar)
    Create {
        /// Archive file to create
        archive: PathBuf,
    },

    /// List a folder of the archive (alias: l)
    #[command(alias = "l")]
    List {
        /// Archive file to list
        archive: PathBuf,

        /// Virtual folder to list
        #[arg(long, default_value = "")]
        folder: String,

        /// Group deeper members into one row per subfolder
        #[arg(long)]
        nested: bool,
    },

    /// Add files to a folder of the archive (alias: a)
    #[command(alias = "a")]
    Add {
        /// Archive file to modify
        archive: PathBuf,

        /// Files to add
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Virtual folder to add into
        #[arg(long, default_value = "")]
        folder: String,

        /// Store new ZIP members without compression
        #[arg(long)]
        store: bool,
    },

    /// Add a directory tree to a folder of the archive
    AddDir {
        /// Archive file to modify
        archive: PathBuf,

        /// Directory to add recursively
        dir: PathBuf,

        /// Virtual folder to add into
        #[arg(long, default_value = "")]
        folder: String,

        /// Store new ZIP members without compression
        #[arg(long)]
        store: bool,
    },

    /// Create an empty folder in the archive
    Mkdir {
        /// Archive file to modify
        archive: PathBuf,

        /// Name of the new folder
        name: String,

        /// Virtual folder to create it in
        #[arg(long, default_value = "")]
        folder: String,
    },

    /// Delete members from the archive (alias: d)
    #[command(alias = "d")]
    Delete {
        /// Archive file to modify
        archive: PathBuf,

        /// Names of the members to delete, relative to --folder
        #[arg(required = true)]
        paths: Vec<String>,

        /// Virtual folder the names are relative to
        #[arg(long, default_value = "")]
        folder: String,

        /// Do not ask for confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Extract members from the archive (alias: x)
    #[command(alias = "x")]
    Extract {
        /// Archive file to extract
        archive: PathBuf,

        /// Names to extract, relative to --folder (all members if omitted)
        names: Vec<String>,

        /// Output directory
        #[arg(short = 'o', long, default_value = ".")]
        output: PathBuf,

        /// Virtual folder the names are relative to
        #[arg(long, default_value = "")]
        folder: String,

        /// What to do when a file already exists
        #[arg(long, value_enum, default_value = "always")]
        overwrite: OverwriteMode,
    },

    /// Search member paths, ignoring case (alias: s)
    #[command(alias = "s")]
    Search {
        /// Archive file to search
        archive: PathBuf,

        /// Text to look for
        text: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OverwriteMode {
    Always,
    Never,
    Error,
}

impl From<OverwriteMode> for arcfold::OverwritePolicy {
    fn from(mode: OverwriteMode) -> Self {
        match mode {
            OverwriteMode::Always => arcfold::OverwritePolicy::Overwrite,
            OverwriteMode::Never => arcfold::OverwritePolicy::Skip,
            OverwriteMode::Error => arcfold::OverwritePolicy::Error,
        }
    }
}

fn main() -> std::process::ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let ctx = commands::Context {
        format: cli.format,
        quiet: cli.quiet,
    };

    let exit_code = match cli.command {
        Commands::Create { archive } => commands::create(&ctx, &archive),

        Commands::List {
            archive,
            folder,
            nested,
        } => commands::list(&ctx, &archive, &folder, nested),

        Commands::Add {
            archive,
            files,
            folder,
            store,
        } => commands::add(&ctx, &archive, &folder, &files, store),

        Commands::AddDir {
            archive,
            dir,
            folder,
            store,
        } => commands::add_dir(&ctx, &archive, &folder, &dir, store),

        Commands::Mkdir {
            archive,
            name,
            folder,
        } => commands::mkdir(&ctx, &archive, &folder, &name),

        Commands::Delete {
            archive,
            paths,
            folder,
            yes,
        } => commands::delete(&ctx, &archive, &folder, &paths, yes),

        Commands::Extract {
            archive,
            names,
            output,
            folder,
            overwrite,
        } => commands::extract(
            &ctx,
            &commands::ExtractConfig {
                archive_path: &archive,
                output_dir: &output,
                folder: &folder,
                names: &names,
                overwrite,
            },
        ),

        Commands::Search { archive, text } => commands::search(&ctx, &archive, &text),

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut std::io::stdout());
            ExitCode::Success
        }
    };

    exit_code.into()
}
