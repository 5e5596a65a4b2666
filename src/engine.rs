//! Archive mutation engine.
//!
//! The engine performs every operation on a [`Container`]: adding files and
//! folders, creating folder markers, deleting members, extracting, listing
//! and searching. It holds no open handles between calls.
//!
//! # Deletion
//!
//! Neither format can remove a member in place. Deletion rebuilds the
//! container into a sibling file named `<archive>.tmp`, copying every kept
//! member verbatim in its original order, then renames the rebuilt file
//! over the original. The original is untouched until the rename, and the
//! rename replaces it atomically, so a crash at any point leaves either the
//! old or the new archive in place. Deletion needs free space for a second
//! copy of the archive.
//!
//! # Example
//!
//! ```rust,no_run
//! use arcfold::{Container, Engine, EngineOptions};
//!
//! let engine = Engine::new(EngineOptions::default());
//! let container = Container::create("backup.zip")?;
//! let report = engine.add_files(&container, "", &["notes.txt"])?;
//! println!("{report}");
//! let _ = engine.delete_entries(&container, &["notes.txt"])?;
//! # Ok::<(), arcfold::Error>(())
//! ```

use crate::container::{self, ContainerAdapter, ContainerFormat, ContainerWriter, MemberMeta};
use crate::member::Member;
use crate::member_path::MemberPath;
use crate::options::{EngineOptions, OverwritePolicy};
use crate::projector::{self, FolderRow, ListingMode};
use crate::safety::validate_extract_path;
use crate::timestamp::Timestamp;
use crate::{Error, Result};
use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File, Metadata};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Suffix of the sibling file a deletion rebuilds into.
const TEMP_SUFFIX: &str = ".tmp";

/// An archive file together with the adapter for its format.
#[derive(Debug, Clone)]
pub struct Container {
    path: PathBuf,
    adapter: &'static dyn ContainerAdapter,
}

impl Container {
    /// Creates an empty container, replacing any existing file.
    ///
    /// The format is chosen from the extension.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = ContainerFormat::from_path(path).ok_or_else(|| Error::NotAnArchive {
            path: path.display().to_string(),
            reason: "unsupported file extension (expected .zip or .tar)".into(),
        })?;
        let adapter = container::adapter_for(format);
        adapter.create_empty(path)?;
        log::info!("Created empty {} archive '{}'", format, path.display());
        Ok(Self {
            path: path.to_path_buf(),
            adapter,
        })
    }

    /// Opens an existing container and checks that it parses.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = container::detect(path)?;
        let adapter = container::adapter_for(format);
        let count = adapter.open_read(path)?.list_members()?.len();
        log::debug!("Opened {} archive '{}' ({} members)", format, path.display(), count);
        Ok(Self {
            path: path.to_path_buf(),
            adapter,
        })
    }

    /// Returns the archive file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the container format.
    pub fn format(&self) -> ContainerFormat {
        self.adapter.format()
    }

    /// Returns the format adapter.
    pub fn adapter(&self) -> &'static dyn ContainerAdapter {
        self.adapter
    }

    /// Lists every member in container order.
    pub fn list_members(&self) -> Result<Vec<Member>> {
        self.adapter.open_read(&self.path)?.list_members()
    }

    /// Reads the payload of the first member stored under `path`.
    pub fn read_payload(&self, path: &str) -> Result<Vec<u8>> {
        self.adapter.open_read(&self.path)?.read_payload(path)
    }
}

/// Outcome of adding files.
#[must_use = "add reports carry per-file failures that should be checked"]
#[derive(Debug, Clone, Default)]
pub struct AddReport {
    /// Archive paths of the members written.
    pub added: Vec<String>,
    /// Total payload bytes written.
    pub bytes_added: u64,
    /// Sources that could not be added (source path and error message).
    pub failures: Vec<(PathBuf, String)>,
}

impl AddReport {
    /// Returns true if every source was added.
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for AddReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Added {} file(s), {} bytes",
            self.added.len(),
            self.bytes_added
        )?;
        if !self.failures.is_empty() {
            write!(f, "; {} failed", self.failures.len())?;
        }
        Ok(())
    }
}

/// Outcome of creating a folder marker.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerOutcome {
    /// A new marker member was written.
    Created(String),
    /// A member with the marker's path already existed; nothing was written.
    AlreadyPresent(String),
}

impl MarkerOutcome {
    /// Returns the marker path.
    pub fn path(&self) -> &str {
        match self {
            Self::Created(p) | Self::AlreadyPresent(p) => p,
        }
    }
}

impl fmt::Display for MarkerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created(p) => write!(f, "Folder '{p}' created"),
            Self::AlreadyPresent(p) => write!(f, "Folder '{p}' already exists"),
        }
    }
}

/// Outcome of deleting members.
#[must_use = "delete reports should be checked to verify the operation completed as expected"]
#[derive(Debug, Clone, Default)]
pub struct DeleteReport {
    /// Paths that were requested and removed.
    pub deleted: Vec<String>,
    /// Members removed, counting every duplicate of a requested path.
    pub entries_removed: usize,
    /// Members copied into the rebuilt archive.
    pub entries_kept: usize,
    /// Archive size before deletion.
    pub size_before: u64,
    /// Archive size after deletion.
    pub size_after: u64,
}

impl fmt::Display for DeleteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Deleted {} member(s), {} kept ({} -> {} bytes)",
            self.entries_removed, self.entries_kept, self.size_before, self.size_after
        )
    }
}

/// Outcome of an extraction.
#[must_use = "extraction reports should be checked for skipped files"]
#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    /// Directory the members were written under.
    pub destination: PathBuf,
    /// Files written.
    pub files_written: usize,
    /// Directories created for folder markers.
    pub folders_created: usize,
    /// Files left alone because they already existed.
    pub entries_skipped: usize,
    /// Total payload bytes written.
    pub bytes_written: u64,
}

impl fmt::Display for ExtractReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Extracted {} file(s) and {} folder(s) to '{}'",
            self.files_written,
            self.folders_created,
            self.destination.display()
        )?;
        if self.entries_skipped > 0 {
            write!(f, "; {} skipped", self.entries_skipped)?;
        }
        Ok(())
    }
}

/// Performs operations on containers with a fixed set of options.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    options: EngineOptions,
}

impl Engine {
    /// Creates an engine.
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    /// Returns the engine options.
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Adds each source file as `folder + file name`.
    ///
    /// Each file is attempted independently: a failure is recorded in the
    /// report and the remaining files are still added. Members already
    /// written are kept.
    ///
    /// # Errors
    ///
    /// [`Error::NothingSelected`] for an empty `sources` list; otherwise only
    /// failures to open or finish the container itself.
    pub fn add_files<P: AsRef<Path>>(
        &self,
        container: &Container,
        folder: &str,
        sources: &[P],
    ) -> Result<AddReport> {
        if sources.is_empty() {
            return Err(Error::NothingSelected);
        }

        let mut writer = container
            .adapter
            .open_append(&container.path, self.options.compression)?;
        let mut report = AddReport::default();

        for source in sources {
            let source = source.as_ref();
            let result = file_name_of(source)
                .and_then(|name| MemberPath::in_folder(folder, name))
                .and_then(|arcname| {
                    let bytes = self.add_one(&mut *writer, &arcname, source)?;
                    Ok((arcname, bytes))
                });
            self.record(&mut report, source, result);
        }

        writer.finish()?;
        log::info!("{} to '{}'", report, container.path.display());
        Ok(report)
    }

    /// Adds every regular file below `source_dir`, keeping its path relative
    /// to `source_dir` under `folder`.
    ///
    /// Directories are walked in file-name order. Empty directories are not
    /// represented in the archive. Per-file failures are recorded as in
    /// [`add_files`](Self::add_files).
    pub fn add_folder_recursive(
        &self,
        container: &Container,
        folder: &str,
        source_dir: impl AsRef<Path>,
    ) -> Result<AddReport> {
        let source_dir = source_dir.as_ref();
        if !fs::metadata(source_dir)?.is_dir() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("'{}' is not a directory", source_dir.display()),
            )));
        }

        let mut writer = container
            .adapter
            .open_append(&container.path, self.options.compression)?;
        let mut report = AddReport::default();

        let walker = WalkDir::new(source_dir).min_depth(1).sort_by_file_name();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(source_dir).to_path_buf();
                    log::warn!("Failed to walk '{}': {}", path.display(), e);
                    report.failures.push((path, e.to_string()));
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let result = path
                .strip_prefix(source_dir)
                .map_err(|e| Error::InvalidArchivePath(e.to_string()))
                .and_then(|rel| MemberPath::from_relative_fs_path(folder, rel))
                .and_then(|arcname| {
                    let bytes = self.add_one(&mut *writer, &arcname, path)?;
                    Ok((arcname, bytes))
                });
            self.record(&mut report, path, result);
        }

        writer.finish()?;
        log::info!(
            "{} from '{}' to '{}'",
            report,
            source_dir.display(),
            container.path.display()
        );
        Ok(report)
    }

    fn add_one(
        &self,
        writer: &mut dyn ContainerWriter,
        arcname: &MemberPath,
        source: &Path,
    ) -> Result<u64> {
        let mut file = File::open(source)?;
        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{}' is not a regular file", source.display()),
            )));
        }
        let meta = MemberMeta {
            size: metadata.len(),
            modified_at: Some(self.source_mtime(&metadata)),
        };
        writer.write_member(arcname, &mut file, &meta)?;
        log::debug!("Added '{}' as '{}'", source.display(), arcname);
        Ok(meta.size)
    }

    fn record(&self, report: &mut AddReport, source: &Path, result: Result<(MemberPath, u64)>) {
        match result {
            Ok((arcname, bytes)) => {
                report.added.push(arcname.into_string());
                report.bytes_added += bytes;
            }
            Err(e) => {
                log::warn!("Failed to add '{}': {}", source.display(), e);
                report.failures.push((source.to_path_buf(), e.to_string()));
            }
        }
    }

    fn source_mtime(&self, metadata: &Metadata) -> Timestamp {
        if self.options.preserve_mtime {
            if let Ok(modified) = metadata.modified() {
                return Timestamp::from_system_time(modified);
            }
        }
        Timestamp::now()
    }

    /// Writes the folder marker `folder + name + "/"`.
    ///
    /// Idempotent: if a member with the marker path already exists, nothing
    /// is written and [`MarkerOutcome::AlreadyPresent`] is returned.
    pub fn create_folder_marker(
        &self,
        container: &Container,
        folder: &str,
        name: &str,
    ) -> Result<MarkerOutcome> {
        let marker = MemberPath::folder(folder, name)?;
        if container
            .list_members()?
            .iter()
            .any(|m| m.path == marker.as_str())
        {
            log::debug!("Folder marker '{}' already present", marker);
            return Ok(MarkerOutcome::AlreadyPresent(marker.into_string()));
        }

        let mut writer = container
            .adapter
            .open_append(&container.path, self.options.compression)?;
        writer.write_empty_marker(&marker)?;
        writer.finish()?;
        log::info!("Created folder marker '{}'", marker);
        Ok(MarkerOutcome::Created(marker.into_string()))
    }

    /// Removes every member whose stored path equals one of `paths`.
    ///
    /// # Errors
    ///
    /// - [`Error::NothingSelected`] for an empty list
    /// - [`Error::MemberNotFound`] if any path is absent; nothing is written
    /// - any rebuild or replace failure; the original archive is untouched
    ///   and the partial temporary file is removed
    pub fn delete_entries<S: AsRef<str>>(
        &self,
        container: &Container,
        paths: &[S],
    ) -> Result<DeleteReport> {
        if paths.is_empty() {
            return Err(Error::NothingSelected);
        }

        let members = container.list_members()?;
        let stored: HashSet<&str> = members.iter().map(|m| m.path.as_str()).collect();
        let mut requested: Vec<&str> = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            if !stored.contains(path) {
                return Err(Error::MemberNotFound {
                    path: path.to_string(),
                });
            }
            if !requested.contains(&path) {
                requested.push(path);
            }
        }

        let size_before = fs::metadata(&container.path)?.len();
        let temp = temp_path(&container.path);
        let doomed: HashSet<&str> = requested.iter().copied().collect();
        let mut keep = |m: &Member| !doomed.contains(m.path.as_str());

        let stats = match container
            .adapter
            .rebuild(&container.path, &temp, &mut keep)
            .and_then(|stats| self.replace(&temp, &container.path).map(|()| stats))
        {
            Ok(stats) => stats,
            Err(e) => {
                discard_temp(&temp);
                return Err(e);
            }
        };

        let report = DeleteReport {
            deleted: requested.iter().map(|p| p.to_string()).collect(),
            entries_removed: stats.dropped,
            entries_kept: stats.kept,
            size_before,
            size_after: fs::metadata(&container.path)?.len(),
        };
        log::info!("{} in '{}'", report, container.path.display());
        Ok(report)
    }

    fn replace(&self, temp: &Path, original: &Path) -> Result<()> {
        if self.options.sync_before_replace {
            File::open(temp)?.sync_all()?;
        }
        fs::rename(temp, original)?;
        Ok(())
    }

    /// Extracts every member under `destination`, recreating member paths as
    /// nested directories.
    pub fn extract_all(
        &self,
        container: &Container,
        destination: impl AsRef<Path>,
    ) -> Result<ExtractReport> {
        let destination = destination.as_ref();
        let mut reader = container.adapter.open_read(&container.path)?;
        let members = reader.list_members()?;
        let selected: Vec<&Member> = members.iter().collect();
        self.extract_members(&mut *reader, &selected, destination)
    }

    /// Extracts the rows `names` of `folder` under `destination`.
    ///
    /// Each name selects the member `folder + name`. Under
    /// [`ListingMode::Nested`] a name ending in `/` also selects every member
    /// below it, so synthesized folder rows extract their contents; under
    /// [`ListingMode::Flat`] it selects only the marker itself. Members keep
    /// their full archive path under `destination`.
    ///
    /// # Errors
    ///
    /// [`Error::NothingSelected`] for an empty selection and
    /// [`Error::MemberNotFound`] if a name matches nothing. Both are reported
    /// before anything is written.
    pub fn extract_selected<S: AsRef<str>>(
        &self,
        container: &Container,
        folder: &str,
        names: &[S],
        destination: impl AsRef<Path>,
    ) -> Result<ExtractReport> {
        if names.is_empty() {
            return Err(Error::NothingSelected);
        }

        let mut reader = container.adapter.open_read(&container.path)?;
        let members = reader.list_members()?;
        let wanted: Vec<String> = names
            .iter()
            .map(|n| format!("{folder}{}", n.as_ref()))
            .collect();

        let subtree = self.options.listing_mode == ListingMode::Nested;
        let selects = |member: &Member, want: &str| {
            member.path == want
                || (subtree && want.ends_with('/') && member.path.starts_with(want))
        };
        if let Some(missing) = wanted
            .iter()
            .find(|w| !members.iter().any(|m| selects(m, w)))
        {
            return Err(Error::MemberNotFound {
                path: missing.clone(),
            });
        }

        let selected: Vec<&Member> = members
            .iter()
            .filter(|m| wanted.iter().any(|w| selects(m, w)))
            .collect();
        self.extract_members(&mut *reader, &selected, destination.as_ref())
    }

    fn extract_members(
        &self,
        reader: &mut dyn container::ContainerReader,
        members: &[&Member],
        destination: &Path,
    ) -> Result<ExtractReport> {
        fs::create_dir_all(destination)?;

        // Validate every target before writing anything.
        let targets = members
            .iter()
            .map(|m| validate_extract_path(&m.path, destination))
            .collect::<Result<Vec<_>>>()?;

        let mut report = ExtractReport {
            destination: destination.to_path_buf(),
            ..Default::default()
        };

        for (member, target) in members.iter().zip(targets) {
            if member.is_folder_marker() {
                fs::create_dir_all(&target)?;
                report.folders_created += 1;
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }

            if target.exists() {
                match self.options.overwrite {
                    OverwritePolicy::Error => {
                        return Err(Error::DestinationExists {
                            path: target.display().to_string(),
                        });
                    }
                    OverwritePolicy::Skip => {
                        log::debug!("Skipping existing '{}'", target.display());
                        report.entries_skipped += 1;
                        continue;
                    }
                    OverwritePolicy::Overwrite => {}
                }
            }

            let mut out = BufWriter::new(File::create(&target)?);
            let written = reader.copy_payload(member, &mut out)?;
            out.flush()?;
            drop(out);

            if self.options.preserve_mtime {
                if let Some(ts) = member.modified_at {
                    apply_mtime(&target, ts);
                }
            }

            log::debug!("Extracted '{}' ({} bytes)", member.path, written);
            report.files_written += 1;
            report.bytes_written += written;
        }

        log::info!("{}", report);
        Ok(report)
    }

    /// Lists the rows visible in `folder` using the configured listing mode.
    pub fn list(&self, container: &Container, folder: &str) -> Result<Vec<FolderRow>> {
        let members = container.list_members()?;
        Ok(projector::list(&members, folder, self.options.listing_mode))
    }

    /// Returns every member whose path contains `needle`, ignoring case.
    ///
    /// An empty result means nothing matched; I/O failures are errors.
    pub fn search(&self, container: &Container, needle: &str) -> Result<Vec<Member>> {
        let members = container.list_members()?;
        Ok(projector::search(&members, needle))
    }
}

fn file_name_of(source: &Path) -> Result<&str> {
    source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            Error::InvalidArchivePath(format!(
                "'{}' has no usable file name",
                source.display()
            ))
        })
}

/// Returns the sibling path a deletion rebuilds into.
pub fn temp_path(original: &Path) -> PathBuf {
    let mut name = original.as_os_str().to_os_string();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

fn discard_temp(temp: &Path) {
    match fs::remove_file(temp) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!(
            "Failed to remove temporary file '{}': {}",
            temp.display(),
            e
        ),
    }
}

fn apply_mtime(path: &Path, ts: Timestamp) {
    let mtime = filetime::FileTime::from_unix_time(ts.as_unix_secs(), 0);
    if let Err(e) = filetime::set_file_mtime(path, mtime) {
        log::warn!(
            "Failed to set modification time on '{}': {}",
            path.display(),
            e
        );
    }
}
