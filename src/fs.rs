//! Path-based filesystem over one remote host.
//!
//! [`RemoteFileSystem`] answers simple queries and atomic operations with its
//! [`TransferSession`], and runs bulk copies and moves as single shell commands on a
//! [`CommandSession`](crate::session::CommandSession) opened for the duration of the command.

use chrono::{DateTime, Utc};
use tokio::io::{self, AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::{
    entry::FileSystemEntryType,
    enumerate::{Entries, EntryFilter, Paths},
    error::{Error, Result},
    options::RemoteFsOptions,
    path,
    session::{self, Permissions, TransferSession},
};

/// High-level remote filesystem owning its transfer session.
///
/// Directory paths are accepted with or without a trailing separator and are returned
/// directory-indicated. File paths never carry one.
///
/// The session is not shared across tasks by this type; callers that clone access to the
/// underlying connection serialize it themselves.
pub struct RemoteFileSystem<S: TransferSession> {
    session: S,
    options: RemoteFsOptions,
}

impl<S: TransferSession> RemoteFileSystem<S> {
    pub fn new(session: S) -> Self {
        Self::with_options(session, RemoteFsOptions::default())
    }

    pub fn with_options(session: S, options: RemoteFsOptions) -> Self {
        Self { session, options }
    }

    pub fn options(&self) -> &RemoteFsOptions {
        &self.options
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Checks a file or folder exists at the specified path
    pub async fn exists(&self, path: &str) -> Result<bool> {
        self.session.try_exists(path).await
    }

    /// Checks that the path exists and is a file.
    ///
    /// Requires two remote calls: existence, then type.
    pub async fn exists_file(&self, path: &str) -> Result<bool> {
        if !self.exists(path).await? {
            return Ok(false);
        }

        self.is_file(path).await
    }

    /// Checks that the path exists and is a directory.
    ///
    /// Requires two remote calls: existence, then type.
    pub async fn exists_directory(&self, path: &str) -> Result<bool> {
        if !self.exists(path).await? {
            return Ok(false);
        }

        self.is_directory(path).await
    }

    /// Fails with [`Error::NotFound`] when the path does not exist.
    pub async fn is_file(&self, path: &str) -> Result<bool> {
        Ok(!self.session.metadata(path).await?.is_dir)
    }

    /// Fails with [`Error::NotFound`] when the path does not exist.
    pub async fn is_directory(&self, path: &str) -> Result<bool> {
        Ok(self.session.metadata(path).await?.is_dir)
    }

    pub async fn entry_type(&self, path: &str) -> Result<FileSystemEntryType> {
        Ok(self.session.metadata(path).await?.entry_type())
    }

    /// Creates the directory and any missing ancestors.
    ///
    /// Creating an existing directory is a no-op. An ancestor that exists as a file
    /// fails with [`Error::TypeMismatch`].
    pub async fn create_directory(&self, path: &str) -> Result<()> {
        let mut missing = Vec::new();
        let mut current = path::ensure_file_indicated(path);

        loop {
            if self.session.try_exists(&current).await? {
                if !self.session.metadata(&current).await?.is_dir {
                    return Err(Error::type_mismatch(
                        path::ensure_directory_indicated(&current),
                        FileSystemEntryType::Directory,
                    ));
                }
                break;
            }

            let parent = path::parent(&current).map(path::ensure_file_indicated);
            missing.push(current);
            match parent {
                Some(parent) => current = parent,
                None => break,
            }
        }

        for directory in missing.iter().rev() {
            debug!("mkdir {}", directory);
            self.session.create_dir(directory).await?;
        }

        Ok(())
    }

    /// Deletes the directory, with its contents when `recursive`.
    ///
    /// A missing directory is a no-op. A file at the path fails with [`Error::TypeMismatch`].
    pub async fn delete_directory(&self, path: &str, recursive: bool) -> Result<()> {
        if !self.exists(path).await? {
            return Ok(());
        }

        if !self.is_directory(path).await? {
            return Err(Error::type_mismatch(path, FileSystemEntryType::Directory));
        }

        if recursive {
            self.remove_tree(path).await
        } else {
            debug!("rmdir {}", path);
            self.session.remove_dir(path).await
        }
    }

    /// Removes every entry below `root`, hidden ones included, files before their directories.
    async fn remove_tree(&self, root: &str) -> Result<()> {
        let mut pending = vec![path::ensure_file_indicated(root)];
        let mut directories = Vec::new();

        while let Some(directory) = pending.pop() {
            for item in self.session.read_dir(&directory).await? {
                let child = path::join(&directory, &item.name);
                if item.metadata.is_dir {
                    pending.push(child);
                } else {
                    debug!("rm {}", child);
                    self.session.remove_file(&child).await?;
                }
            }
            directories.push(directory);
        }

        for directory in directories.iter().rev() {
            debug!("rmdir {}", directory);
            self.session.remove_dir(directory).await?;
        }

        Ok(())
    }

    /// Creates the file, truncating an existing one, and returns it open for writing.
    pub async fn create_file(&self, path: &str, overwrite: bool) -> Result<S::File> {
        self.check_overwrite(path, overwrite).await?;
        self.session.create(path).await
    }

    /// Opens the file for writing without truncating it, creating it if missing.
    pub async fn open_file(&self, path: &str) -> Result<S::File> {
        self.session.open_write(path).await
    }

    /// Opens the file in read-only mode.
    pub async fn read_file(&self, path: &str) -> Result<S::File> {
        self.session.open_read(path).await
    }

    /// Deletes the file. A missing file is a no-op.
    /// A directory at the path fails with [`Error::TypeMismatch`].
    pub async fn delete_file(&self, path: &str) -> Result<()> {
        if !self.exists(path).await? {
            return Ok(());
        }

        if self.is_directory(path).await? {
            return Err(Error::type_mismatch(path, FileSystemEntryType::File));
        }

        debug!("rm {}", path);
        self.session.remove_file(path).await
    }

    pub async fn directory_last_modified_utc(&self, path: &str) -> Result<DateTime<Utc>> {
        self.last_modified_utc(path).await
    }

    pub async fn file_last_modified_utc(&self, path: &str) -> Result<DateTime<Utc>> {
        self.last_modified_utc(path).await
    }

    async fn last_modified_utc(&self, path: &str) -> Result<DateTime<Utc>> {
        self.session
            .metadata(path)
            .await?
            .modified
            .ok_or_else(|| Error::Transfer(format!("no modification time reported for {path}")))
    }

    pub async fn change_permissions(&self, path: &str, permissions: Permissions) -> Result<()> {
        debug!("chmod {:o} {}", permissions.mode(), path);
        self.session.set_permissions(path, permissions).await
    }

    /// Streams `source` into a new remote file. Returns the number of bytes copied.
    pub async fn copy_from_stream<R>(
        &self,
        source: &mut R,
        destination: &str,
        overwrite: bool,
    ) -> Result<u64>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        self.check_overwrite(destination, overwrite).await?;

        let mut file = self.session.create(destination).await?;
        let copied = io::copy(source, &mut file).await?;
        file.shutdown().await?;

        debug!("uploaded {} bytes to {}", copied, destination);
        Ok(copied)
    }

    /// Streams a remote file into `destination`. Returns the number of bytes copied.
    pub async fn copy_to_stream<W>(&self, source: &str, destination: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let mut file = self.session.open_read(source).await?;
        let copied = io::copy(&mut file, destination).await?;
        file.shutdown().await?;

        debug!("downloaded {} bytes from {}", copied, source);
        Ok(copied)
    }

    /// Copies the file on the remote host with `cp`, without moving bytes through this process.
    pub async fn copy_file(&self, source: &str, destination: &str, overwrite: bool) -> Result<()> {
        if !self.exists_file(source).await? {
            return Err(Error::SourceNotFound {
                path: source.to_owned(),
            });
        }
        self.check_overwrite(destination, overwrite).await?;

        self.run(&format!("cp {} {}", path::quote(source), path::quote(destination)))
            .await
    }

    /// Copies the directory tree on the remote host with `cp -r`.
    pub async fn copy_directory(&self, source: &str, destination: &str) -> Result<()> {
        if !self.exists_directory(source).await? {
            return Err(Error::SourceNotFound {
                path: source.to_owned(),
            });
        }

        self.run(&format!(
            "cp -r {} {}",
            path::quote(source),
            path::quote(destination)
        ))
        .await
    }

    pub async fn move_file(&self, source: &str, destination: &str, overwrite: bool) -> Result<()> {
        if !self.exists_file(source).await? {
            return Err(Error::SourceNotFound {
                path: source.to_owned(),
            });
        }
        self.check_overwrite(destination, overwrite).await?;

        self.run(&format!("mv {} {}", path::quote(source), path::quote(destination)))
            .await
    }

    pub async fn move_directory(&self, source: &str, destination: &str) -> Result<()> {
        if !self.exists_directory(source).await? {
            return Err(Error::SourceNotFound {
                path: source.to_owned(),
            });
        }

        self.run(&format!("mv {} {}", path::quote(source), path::quote(destination)))
            .await
    }

    /// Directory-indicated paths of the immediate subdirectories.
    pub fn enumerate_directories(&self, path: &str) -> Paths<'_, S> {
        Paths::new(self.entries(path, false, EntryFilter::DirectoriesOnly))
    }

    /// Paths of the files directly inside the directory.
    pub fn enumerate_files(&self, path: &str) -> Paths<'_, S> {
        Paths::new(self.entries(path, false, EntryFilter::FilesOnly))
    }

    pub fn enumerate_entry_paths(&self, path: &str, recursive: bool) -> Paths<'_, S> {
        Paths::new(self.entries(path, recursive, EntryFilter::All))
    }

    /// Lazily enumerates the directory, excluding hidden entries.
    ///
    /// Flat requests cost one directory listing. Recursive requests cost a single `find`
    /// command unless [`EnumerationStrategy::Simple`](crate::EnumerationStrategy::Simple)
    /// is configured, in which case every directory of the tree is listed separately.
    pub fn enumerate_entries(&self, path: &str, recursive: bool) -> Entries<'_, S> {
        self.entries(path, recursive, EntryFilter::All)
    }

    fn entries(&self, path: &str, recursive: bool, filter: EntryFilter) -> Entries<'_, S> {
        Entries::new(&self.session, path, recursive, self.options.strategy, filter)
    }

    async fn check_overwrite(&self, path: &str, overwrite: bool) -> Result<()> {
        if !overwrite && self.exists_file(path).await? {
            return Err(Error::OverwriteDenied {
                path: path.to_owned(),
            });
        }
        Ok(())
    }

    async fn run(&self, command: &str) -> Result<()> {
        session::execute_scoped(&self.session, command)
            .await
            .map(|_| ())
    }
}
