//! Command implementations for the CLI tool.

use std::path::{Path, PathBuf};

use arcfold::{
    ArchiveSession, Compression, Container, EngineOptions, ListingMode, OverwritePolicy,
};

use crate::exit_codes::ExitCode;
use crate::output::create_formatter;
use crate::{OutputFormat, OverwriteMode};

/// Settings shared by every command.
pub struct Context {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl Context {
    /// Prints a command result unless quiet mode suppresses human output.
    fn emit(&self, text: &str) {
        if self.quiet && self.format == OutputFormat::Human {
            return;
        }
        print!("{}", text);
        if self.format == OutputFormat::Json {
            println!();
        }
    }
}

/// Configuration for the extract command.
pub struct ExtractConfig<'a> {
    pub archive_path: &'a Path,
    pub output_dir: &'a Path,
    pub folder: &'a str,
    pub names: &'a [String],
    pub overwrite: OverwriteMode,
}

/// Create command implementation
pub fn create(ctx: &Context, archive_path: &Path) -> ExitCode {
    if archive_path.exists() {
        eprintln!("Error: {} already exists", archive_path.display());
        return ExitCode::FatalError;
    }

    let container = match Container::create(archive_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error creating archive: {}", e);
            return ExitCode::from(&e);
        }
    };

    if !ctx.quiet {
        eprintln!(
            "Created empty {} archive {}",
            container.format(),
            container.path().display()
        );
    }
    ExitCode::Success
}

/// List command implementation
pub fn list(ctx: &Context, archive_path: &Path, folder: &str, nested: bool) -> ExitCode {
    let formatter = create_formatter(ctx.format);

    let mode = if nested {
        ListingMode::Nested
    } else {
        ListingMode::Flat
    };
    let options = EngineOptions::new().listing_mode(mode);

    let session = match open_session(archive_path, folder, options) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let rows = match session.list() {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(&e);
        }
    };

    let current = session.current_folder().unwrap_or_default();
    print!("{}", formatter.format_list(current, &rows));

    ExitCode::Success
}

/// Add command implementation
pub fn add(
    ctx: &Context,
    archive_path: &Path,
    folder: &str,
    files: &[PathBuf],
    store: bool,
) -> ExitCode {
    let formatter = create_formatter(ctx.format);

    let session = match open_session(archive_path, folder, write_options(store)) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let report = match session.add_files(files) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(&e);
        }
    };

    ctx.emit(&formatter.format_add_result(&report));

    if report.is_ok() {
        ExitCode::Success
    } else {
        ExitCode::Warning
    }
}

/// Add-dir command implementation
pub fn add_dir(
    ctx: &Context,
    archive_path: &Path,
    folder: &str,
    dir: &Path,
    store: bool,
) -> ExitCode {
    let formatter = create_formatter(ctx.format);

    let session = match open_session(archive_path, folder, write_options(store)) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let report = match session.add_folder(dir) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(&e);
        }
    };

    ctx.emit(&formatter.format_add_result(&report));

    if report.is_ok() {
        ExitCode::Success
    } else {
        ExitCode::Warning
    }
}

/// Mkdir command implementation
pub fn mkdir(ctx: &Context, archive_path: &Path, folder: &str, name: &str) -> ExitCode {
    let formatter = create_formatter(ctx.format);

    let session = match open_session(archive_path, folder, EngineOptions::default()) {
        Ok(s) => s,
        Err(code) => return code,
    };

    match session.create_folder(name) {
        Ok(outcome) => {
            ctx.emit(&formatter.format_marker_result(&outcome));
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(&e)
        }
    }
}

/// Delete command implementation
pub fn delete(
    ctx: &Context,
    archive_path: &Path,
    folder: &str,
    paths: &[String],
    yes: bool,
) -> ExitCode {
    let formatter = create_formatter(ctx.format);

    let session = match open_session(archive_path, folder, EngineOptions::default()) {
        Ok(s) => s,
        Err(code) => return code,
    };

    if !yes && !confirm_delete(paths.len()) {
        eprintln!("Aborted");
        return ExitCode::UserAbort;
    }

    let report = match session.delete_selected(paths) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(&e);
        }
    };

    ctx.emit(&formatter.format_delete_result(&report));

    ExitCode::Success
}

/// Extract command implementation
pub fn extract(ctx: &Context, config: &ExtractConfig<'_>) -> ExitCode {
    let formatter = create_formatter(ctx.format);

    let options = EngineOptions::new().overwrite(OverwritePolicy::from(config.overwrite));
    let session = match open_session(config.archive_path, config.folder, options) {
        Ok(s) => s,
        Err(code) => return code,
    };

    if let Err(e) = std::fs::create_dir_all(config.output_dir) {
        eprintln!("Error creating output directory: {}", e);
        return ExitCode::IoError;
    }

    let result = if config.names.is_empty() && config.folder.is_empty() {
        session.extract_all(config.output_dir)
    } else if config.names.is_empty() {
        // Everything below the folder: select every row it lists.
        session.list().and_then(|rows| {
            let names: Vec<String> = rows.into_iter().map(|r| r.display_name).collect();
            session.extract_selected(&names, config.output_dir)
        })
    } else {
        session.extract_selected(config.names, config.output_dir)
    };

    let report = match result {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(&e);
        }
    };

    ctx.emit(&formatter.format_extract_result(&report));

    if report.entries_skipped > 0 {
        ExitCode::Warning
    } else {
        ExitCode::Success
    }
}

/// Search command implementation
pub fn search(ctx: &Context, archive_path: &Path, text: &str) -> ExitCode {
    let formatter = create_formatter(ctx.format);

    let session = match open_session(archive_path, "", EngineOptions::default()) {
        Ok(s) => s,
        Err(code) => return code,
    };

    match session.search(text) {
        Ok(hits) => {
            print!("{}", formatter.format_search(text, &hits));
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(&e)
        }
    }
}

/// Opens an archive and moves into `folder`.
fn open_session(
    path: &Path,
    folder: &str,
    options: EngineOptions,
) -> Result<ArchiveSession, ExitCode> {
    let mut session = ArchiveSession::new(options);
    session.open(path).map_err(|e| {
        eprintln!("Error opening archive: {}", e);
        ExitCode::from(&e)
    })?;

    let folder = folder.trim_matches('/');
    if !folder.is_empty() {
        session.navigate_into(&format!("{}/", folder)).map_err(|e| {
            eprintln!("Error: {}", e);
            ExitCode::from(&e)
        })?;
    }

    Ok(session)
}

fn write_options(store: bool) -> EngineOptions {
    let compression = if store {
        Compression::Stored
    } else {
        Compression::Deflated
    };
    EngineOptions::new().compression(compression)
}

/// Asks before deleting. Anything but an explicit yes declines.
fn confirm_delete(count: usize) -> bool {
    use dialoguer::{Confirm, theme::ColorfulTheme};

    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
            "Are you sure you want to delete {} file{}?",
            count,
            if count == 1 { "" } else { "s" }
        ))
        .default(false)
        .interact()
        .unwrap_or(false)
}
