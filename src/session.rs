//! Archive session: the open archive plus the current virtual folder.
//!
//! A session starts with no archive. [`create`](ArchiveSession::create) or
//! [`open`](ArchiveSession::open) moves it to the opened state; opening
//! another archive replaces the current one. There is no explicit close.
//! Every other operation fails with [`Error::NoArchiveOpen`] until an
//! archive is open.
//!
//! ```rust,no_run
//! use arcfold::{ArchiveSession, EngineOptions};
//!
//! let mut session = ArchiveSession::new(EngineOptions::default());
//! session.create("photos.zip")?;
//! let _ = session.create_folder("2024")?;
//! session.navigate_into("2024/")?;
//! let report = session.add_files(&["beach.jpg"])?;
//! assert!(report.is_ok());
//! for row in session.list()? {
//!     println!("{}", row.display_name);
//! }
//! # Ok::<(), arcfold::Error>(())
//! ```

use crate::container::ContainerFormat;
use crate::engine::{AddReport, Container, DeleteReport, Engine, ExtractReport, MarkerOutcome};
use crate::member::Member;
use crate::options::EngineOptions;
use crate::projector::{self, FolderRow};
use crate::{Error, Result};
use std::path::Path;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Default)]
pub enum SessionState {
    /// No archive has been created or opened yet.
    #[default]
    NoArchive,
    /// An archive is open.
    Opened {
        /// The open archive.
        container: Container,
        /// Current virtual folder: `""` or a prefix ending in `/`.
        current_folder: String,
    },
}

/// Holds the open archive and dispatches requests to the [`Engine`].
#[derive(Debug, Clone, Default)]
pub struct ArchiveSession {
    engine: Engine,
    state: SessionState,
}

impl ArchiveSession {
    /// Creates a session with no archive open.
    pub fn new(options: EngineOptions) -> Self {
        Self {
            engine: Engine::new(options),
            state: SessionState::NoArchive,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Returns true once an archive has been created or opened.
    pub fn is_open(&self) -> bool {
        matches!(self.state, SessionState::Opened { .. })
    }

    /// Returns the engine used by this session.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Creates an empty archive and makes it current, at the root folder.
    pub fn create(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let container = Container::create(path)?;
        self.state = SessionState::Opened {
            container,
            current_folder: String::new(),
        };
        Ok(())
    }

    /// Opens an existing archive and makes it current, at the root folder.
    ///
    /// On failure the previous state is kept.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let container = Container::open(path)?;
        self.state = SessionState::Opened {
            container,
            current_folder: String::new(),
        };
        Ok(())
    }

    fn opened(&self) -> Result<(&Container, &str)> {
        match &self.state {
            SessionState::Opened {
                container,
                current_folder,
            } => Ok((container, current_folder.as_str())),
            SessionState::NoArchive => Err(Error::NoArchiveOpen),
        }
    }

    /// Returns the open container.
    pub fn container(&self) -> Result<&Container> {
        self.opened().map(|(c, _)| c)
    }

    /// Returns the path of the open archive.
    pub fn archive_path(&self) -> Result<&Path> {
        self.opened().map(|(c, _)| c.path())
    }

    /// Returns the format of the open archive.
    pub fn format(&self) -> Result<ContainerFormat> {
        self.opened().map(|(c, _)| c.format())
    }

    /// Returns the current virtual folder.
    pub fn current_folder(&self) -> Result<&str> {
        self.opened().map(|(_, f)| f)
    }

    /// Moves into the folder row `display_name` of the current folder.
    pub fn navigate_into(&mut self, display_name: &str) -> Result<()> {
        match &mut self.state {
            SessionState::Opened { current_folder, .. } => {
                *current_folder = projector::navigate_into(current_folder, display_name)?;
                Ok(())
            }
            SessionState::NoArchive => Err(Error::NoArchiveOpen),
        }
    }

    /// Moves to the parent of the current folder. The root stays the root.
    pub fn navigate_up(&mut self) -> Result<()> {
        match &mut self.state {
            SessionState::Opened { current_folder, .. } => {
                *current_folder = projector::parent_folder(current_folder);
                Ok(())
            }
            SessionState::NoArchive => Err(Error::NoArchiveOpen),
        }
    }

    /// Moves back to the root folder.
    pub fn navigate_root(&mut self) -> Result<()> {
        match &mut self.state {
            SessionState::Opened { current_folder, .. } => {
                current_folder.clear();
                Ok(())
            }
            SessionState::NoArchive => Err(Error::NoArchiveOpen),
        }
    }

    /// Lists the rows of the current folder.
    pub fn list(&self) -> Result<Vec<FolderRow>> {
        let (container, folder) = self.opened()?;
        self.engine.list(container, folder)
    }

    /// Adds files into the current folder.
    pub fn add_files<P: AsRef<Path>>(&self, sources: &[P]) -> Result<AddReport> {
        let (container, folder) = self.opened()?;
        self.engine.add_files(container, folder, sources)
    }

    /// Adds a directory tree into the current folder.
    pub fn add_folder(&self, source_dir: impl AsRef<Path>) -> Result<AddReport> {
        let (container, folder) = self.opened()?;
        self.engine.add_folder_recursive(container, folder, source_dir)
    }

    /// Creates a folder marker named `name` in the current folder.
    pub fn create_folder(&self, name: &str) -> Result<MarkerOutcome> {
        let (container, folder) = self.opened()?;
        self.engine.create_folder_marker(container, folder, name)
    }

    /// Deletes rows of the current folder by display name.
    pub fn delete_selected<S: AsRef<str>>(&self, display_names: &[S]) -> Result<DeleteReport> {
        let (container, folder) = self.opened()?;
        let paths: Vec<String> = display_names
            .iter()
            .map(|n| format!("{folder}{}", n.as_ref()))
            .collect();
        self.engine.delete_entries(container, &paths)
    }

    /// Deletes members by full stored path.
    pub fn delete_entries<S: AsRef<str>>(&self, paths: &[S]) -> Result<DeleteReport> {
        let (container, _) = self.opened()?;
        self.engine.delete_entries(container, paths)
    }

    /// Extracts every member under `destination`.
    pub fn extract_all(&self, destination: impl AsRef<Path>) -> Result<ExtractReport> {
        let (container, _) = self.opened()?;
        self.engine.extract_all(container, destination)
    }

    /// Extracts rows of the current folder by display name.
    pub fn extract_selected<S: AsRef<str>>(
        &self,
        display_names: &[S],
        destination: impl AsRef<Path>,
    ) -> Result<ExtractReport> {
        let (container, folder) = self.opened()?;
        self.engine
            .extract_selected(container, folder, display_names, destination)
    }

    /// Searches the whole archive for members whose path contains `needle`,
    /// ignoring case.
    pub fn search(&self, needle: &str) -> Result<Vec<Member>> {
        let (container, _) = self.opened()?;
        self.engine.search(container, needle)
    }
}
