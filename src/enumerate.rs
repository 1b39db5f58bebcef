//! Directory enumeration.
//!
//! Two walks produce the same entries. The simple walk lists one directory per remote
//! call. The fast walk runs a single `find <dir> -print -ls` and parses its output.
//! Hidden entries are skipped by both, and hidden directories are never descended.

use std::vec;

use crate::{
    entry::FileSystemEntry,
    error::Result,
    listing::BulkListing,
    options::EnumerationStrategy,
    path::{self, SEPARATOR},
    session::{self, TransferSession},
};

/// Walk chosen for one enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Simple,
    Fast,
}

/// Flat requests always take the simple walk: a single listing is already optimal.
#[must_use]
pub fn select_strategy(configured: EnumerationStrategy, recursive: bool) -> Strategy {
    match (configured, recursive) {
        (_, false) | (EnumerationStrategy::Simple, true) => Strategy::Simple,
        (EnumerationStrategy::Auto | EnumerationStrategy::Fast, true) => Strategy::Fast,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFilter {
    All,
    FilesOnly,
    DirectoriesOnly,
}

impl EntryFilter {
    fn accepts(self, entry: &FileSystemEntry) -> bool {
        match self {
            Self::All => true,
            Self::FilesOnly => !entry.is_directory(),
            Self::DirectoriesOnly => entry.is_directory(),
        }
    }
}

pub(crate) fn find_command(directory: &str) -> String {
    format!("find {} -print -ls", path::quote(directory))
}

/// Forward-only cursor over the entries of a remote directory.
///
/// Remote calls are issued as the cursor advances. The cursor cannot be restarted;
/// enumerate again to observe the directory anew.
///
/// The simple walk yields siblings sorted by name, each directory before its contents.
/// The fast walk yields entries in the order `find` prints them, which is the order of
/// the remote directory listings and is not sorted. Both walks yield the same set.
pub struct Entries<'s, S: TransferSession> {
    walk: Walk<'s, S>,
    filter: EntryFilter,
    finished: bool,
}

enum Walk<'s, S: TransferSession> {
    Simple(SimpleWalk<'s, S>),
    Fast(FastWalk<'s, S>),
}

impl<'s, S: TransferSession> Entries<'s, S> {
    pub(crate) fn new(
        session: &'s S,
        directory: &str,
        recursive: bool,
        strategy: EnumerationStrategy,
        filter: EntryFilter,
    ) -> Self {
        let walk = match select_strategy(strategy, recursive) {
            Strategy::Simple => Walk::Simple(SimpleWalk {
                session,
                recursive,
                descend: Some(directory.to_owned()),
                levels: Vec::new(),
            }),
            Strategy::Fast => Walk::Fast(FastWalk {
                session,
                root: directory.to_owned(),
                root_prefix: path::ensure_directory_indicated(directory),
                listing: None,
                header_skipped: false,
            }),
        };

        Self {
            walk,
            filter,
            finished: false,
        }
    }

    #[must_use]
    pub fn strategy(&self) -> Strategy {
        match self.walk {
            Walk::Simple(_) => Strategy::Simple,
            Walk::Fast(_) => Strategy::Fast,
        }
    }

    /// Returns the next entry, or `None` once the walk is exhausted.
    ///
    /// An error ends the walk.
    pub async fn next_entry(&mut self) -> Result<Option<FileSystemEntry>> {
        while !self.finished {
            let next = match &mut self.walk {
                Walk::Simple(walk) => walk.next_entry().await,
                Walk::Fast(walk) => walk.next_entry().await,
            };

            match next {
                Ok(Some(entry)) if self.filter.accepts(&entry) => return Ok(Some(entry)),
                Ok(Some(_)) => continue,
                Ok(None) => self.finished = true,
                Err(error) => {
                    self.finished = true;
                    return Err(error);
                }
            }
        }

        Ok(None)
    }

    /// Drains the cursor.
    pub async fn collect(mut self) -> Result<Vec<FileSystemEntry>> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next_entry().await? {
            entries.push(entry);
        }
        Ok(entries)
    }
}

/// [`Entries`] reduced to their paths.
pub struct Paths<'s, S: TransferSession>(Entries<'s, S>);

impl<'s, S: TransferSession> Paths<'s, S> {
    pub(crate) fn new(entries: Entries<'s, S>) -> Self {
        Self(entries)
    }

    pub async fn next_path(&mut self) -> Result<Option<String>> {
        Ok(self.0.next_entry().await?.map(FileSystemEntry::into_path))
    }

    pub async fn collect(mut self) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        while let Some(path) = self.next_path().await? {
            paths.push(path);
        }
        Ok(paths)
    }
}

/// Pre-order walk over an explicit stack of sorted directory levels.
struct SimpleWalk<'s, S: TransferSession> {
    session: &'s S,
    recursive: bool,
    /// Directory whose listing is due before the next entry.
    descend: Option<String>,
    levels: Vec<vec::IntoIter<FileSystemEntry>>,
}

impl<'s, S: TransferSession> SimpleWalk<'s, S> {
    async fn next_entry(&mut self) -> Result<Option<FileSystemEntry>> {
        if let Some(directory) = self.descend.take() {
            let level = list_level(self.session, &directory).await?;
            self.levels.push(level.into_iter());
        }

        while let Some(level) = self.levels.last_mut() {
            match level.next() {
                Some(entry) => {
                    if self.recursive && entry.is_directory() {
                        self.descend = Some(entry.path().to_owned());
                    }
                    return Ok(Some(entry));
                }
                None => {
                    let _ = self.levels.pop();
                }
            }
        }

        Ok(None)
    }
}

async fn list_level<S: TransferSession>(
    session: &S,
    directory: &str,
) -> Result<Vec<FileSystemEntry>> {
    debug!("read_dir {}", directory);

    let base = path::ensure_directory_indicated(directory);
    let mut items: Vec<_> = session
        .read_dir(directory)
        .await?
        .into_iter()
        .filter(|item| !path::is_hidden(&item.name))
        .collect();
    items.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(items
        .into_iter()
        .map(|item| {
            FileSystemEntry::new(
                &path::join(&base, &item.name),
                item.metadata.entry_type(),
                item.metadata.modified,
            )
        })
        .collect())
}

/// Single `find` round trip, parsed lazily from the buffered output.
struct FastWalk<'s, S: TransferSession> {
    session: &'s S,
    root: String,
    root_prefix: String,
    listing: Option<BulkListing>,
    header_skipped: bool,
}

impl<'s, S: TransferSession> FastWalk<'s, S> {
    async fn next_entry(&mut self) -> Result<Option<FileSystemEntry>> {
        if self.listing.is_none() {
            let output = session::execute_scoped(self.session, &find_command(&self.root)).await?;
            debug!("find {} returned {} bytes", self.root, output.stdout.len());
            self.listing = Some(BulkListing::new(output.stdout));
        }

        let Some(listing) = self.listing.as_mut() else {
            return Ok(None);
        };

        for result in listing {
            let entry = result?;

            // The first entry restates the root itself.
            if !self.header_skipped {
                self.header_skipped = true;
                continue;
            }

            if below_hidden(&self.root_prefix, entry.path()) {
                continue;
            }

            return Ok(Some(entry));
        }

        Ok(None)
    }
}

fn below_hidden(root_prefix: &str, entry_path: &str) -> bool {
    entry_path
        .strip_prefix(root_prefix)
        .is_some_and(|relative| relative.split(SEPARATOR).any(path::is_hidden))
}
