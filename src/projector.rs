//! Virtual folder view over flat member paths.
//!
//! Neither container format has real directories. A *virtual folder* is a
//! path prefix: `""` for the root, otherwise a string ending in `/`. The
//! functions here derive listings from a member slice and never touch the
//! container.

use crate::member::Member;
use crate::{Error, Result};
use std::collections::HashMap;

/// How a folder listing groups members below the current folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingMode {
    /// One row per member whose path starts with the folder prefix. The row
    /// shows the whole remainder, so a deeper member appears as `c/d.txt`.
    #[default]
    Flat,
    /// Rows are grouped by the first segment of the remainder. A deeper
    /// member yields a single navigable `c/` row.
    Nested,
}

/// One row of a folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRow {
    /// Name relative to the listed folder.
    pub display_name: String,
    /// The member behind the row; `None` for folder rows synthesized in
    /// [`ListingMode::Nested`].
    pub member: Option<Member>,
}

impl FolderRow {
    /// Returns true if the row can be navigated into.
    pub fn is_folder(&self) -> bool {
        self.display_name.ends_with('/')
    }

    /// Returns the payload size, or 0 for synthesized rows.
    pub fn size(&self) -> u64 {
        self.member.as_ref().map_or(0, |m| m.size)
    }
}

/// Lists the rows visible in `folder`.
///
/// The folder's own marker is never listed. Row order follows container
/// order.
///
/// # Example
///
/// ```rust
/// use arcfold::{projector, ListingMode, Member, PayloadRef};
///
/// let members: Vec<Member> = ["a/", "a/b.txt", "a/c/d.txt"]
///     .iter()
///     .enumerate()
///     .map(|(i, p)| Member::new(*p, 0, None, PayloadRef::Indexed { index: i }))
///     .collect();
///
/// let flat: Vec<_> = projector::list(&members, "a/", ListingMode::Flat)
///     .into_iter()
///     .map(|row| row.display_name)
///     .collect();
/// assert_eq!(flat, ["b.txt", "c/d.txt"]);
///
/// let nested: Vec<_> = projector::list(&members, "a/", ListingMode::Nested)
///     .into_iter()
///     .map(|row| row.display_name)
///     .collect();
/// assert_eq!(nested, ["b.txt", "c/"]);
/// ```
pub fn list(members: &[Member], folder: &str, mode: ListingMode) -> Vec<FolderRow> {
    match mode {
        ListingMode::Flat => members
            .iter()
            .filter_map(|m| {
                let rest = m.path.strip_prefix(folder)?;
                (!rest.is_empty()).then(|| FolderRow {
                    display_name: rest.to_string(),
                    member: Some(m.clone()),
                })
            })
            .collect(),
        ListingMode::Nested => list_nested(members, folder),
    }
}

fn list_nested(members: &[Member], folder: &str) -> Vec<FolderRow> {
    let mut rows: Vec<FolderRow> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for m in members {
        let Some(rest) = m.path.strip_prefix(folder) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        let (name, is_literal) = match rest.find('/') {
            Some(idx) => (&rest[..=idx], idx + 1 == rest.len()),
            None => (rest, true),
        };

        match seen.get(name) {
            Some(&i) => {
                if is_literal && rows[i].member.is_none() {
                    rows[i].member = Some(m.clone());
                }
            }
            None => {
                seen.insert(name.to_string(), rows.len());
                rows.push(FolderRow {
                    display_name: name.to_string(),
                    member: is_literal.then(|| m.clone()),
                });
            }
        }
    }
    rows
}

/// Returns the folder reached by opening `display_name` in `current`.
///
/// Only names ending in `/` are navigable. The target is not checked for
/// existence.
pub fn navigate_into(current: &str, display_name: &str) -> Result<String> {
    if !display_name.ends_with('/') {
        return Err(Error::InvalidArchivePath(format!(
            "'{display_name}' is not a folder"
        )));
    }
    Ok(format!("{current}{display_name}"))
}

/// Returns the folder one level above `current`; the root is its own
/// parent.
pub fn parent_folder(current: &str) -> String {
    let body = current.strip_suffix('/').unwrap_or(current);
    match body.rfind('/') {
        Some(idx) => body[..=idx].to_string(),
        None => String::new(),
    }
}

/// Returns every member whose full path contains `needle`, ignoring case.
///
/// The whole container is searched regardless of the current folder. An
/// empty result means nothing matched.
pub fn search(members: &[Member], needle: &str) -> Vec<Member> {
    let needle = needle.to_lowercase();
    members
        .iter()
        .filter(|m| m.path.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}
