//! # arcfold
//!
//! Folder-style browsing and safe mutation of ZIP and TAR archives.
//!
//! Neither format has real folders, and neither can delete a member in
//! place. This crate presents an archive's flat member list as a tree of
//! virtual folders and performs add, folder creation, delete, extract and
//! search operations while leaving every other member byte-for-byte intact.
//! Deletions rebuild the archive into a temporary sibling and atomically
//! replace the original, so a failure never leaves a damaged archive.
//!
//! ## Quick Start
//!
//! ### Browsing and Editing with a Session
//!
//! ```rust,no_run
//! use arcfold::{ArchiveSession, EngineOptions, Result};
//!
//! fn main() -> Result<()> {
//!     let mut session = ArchiveSession::new(EngineOptions::default());
//!     session.open("project.tar")?;
//!
//!     for row in session.list()? {
//!         println!("{:>10}  {}", row.size(), row.display_name);
//!     }
//!
//!     session.navigate_into("docs/")?;
//!     let report = session.add_files(&["README.md", "CHANGES.md"])?;
//!     println!("{report}");
//!
//!     let report = session.delete_selected(&["old.txt"])?;
//!     println!("{report}");
//!     Ok(())
//! }
//! ```
//!
//! ### Using the Engine Directly
//!
//! ```rust,no_run
//! use arcfold::{Compression, Container, Engine, EngineOptions, Result};
//!
//! fn main() -> Result<()> {
//!     let engine = Engine::new(EngineOptions::new().compression(Compression::Stored));
//!     let container = Container::create("bundle.zip")?;
//!     let _ = engine.add_folder_recursive(&container, "", "assets")?;
//!     let _ = engine.create_folder_marker(&container, "", "empty")?;
//!
//!     for member in engine.search(&container, ".png")? {
//!         println!("{}", member.path);
//!     }
//!
//!     let _ = engine.extract_all(&container, "out")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Folder Listings
//!
//! Listing a folder returns one [`FolderRow`] per member below the folder
//! prefix. [`ListingMode::Flat`] (the default) shows each member's full
//! remaining path, so a deeper member appears as `sub/file.txt`;
//! [`ListingMode::Nested`] groups deeper members into one navigable `sub/`
//! row.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `deflate` | Yes | Deflate compression for new ZIP members |
//! | `cli` | No | The `arcfold` command-line tool |

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod container;
pub mod engine;
pub mod error;
pub mod member;
pub mod member_path;
pub mod options;
pub mod projector;
pub mod safety;
pub mod session;
pub mod timestamp;

pub use container::{
    ContainerAdapter, ContainerFormat, ContainerReader, ContainerWriter, MemberMeta,
    RebuildStats, TarAdapter, ZipAdapter, adapter_for,
};
pub use engine::{AddReport, Container, DeleteReport, Engine, ExtractReport, MarkerOutcome};
pub use error::{Error, Result};
pub use member::{Member, PayloadRef};
pub use member_path::MemberPath;
pub use options::{Compression, EngineOptions, OverwritePolicy};
pub use projector::{FolderRow, ListingMode};
pub use safety::validate_extract_path;
pub use session::{ArchiveSession, SessionState};
pub use timestamp::{DosFields, TimePrecision, Timestamp};
