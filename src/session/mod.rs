//! Remote channels the filesystem is built on.
//!
//! A [`TransferSession`] is the structured file-transfer channel (stat, list, open, delete).
//! A [`CommandSession`] runs shell commands on the same host for the operations the
//! transfer protocol lacks. Transfer sessions derive command sessions on demand.

#[cfg(feature = "russh")]
pub mod russh;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    entry::FileSystemEntryType,
    error::{Error, Result},
};

/// Unix permission bits of a remote entry
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permissions(u32);

bitflags! {
    impl Permissions: u32 {
        const SETUID = 0o4000;
        const SETGID = 0o2000;
        const STICKY = 0o1000;
        const OWNER_READ = 0o400;
        const OWNER_WRITE = 0o200;
        const OWNER_EXEC = 0o100;
        const GROUP_READ = 0o040;
        const GROUP_WRITE = 0o020;
        const GROUP_EXEC = 0o010;
        const OTHER_READ = 0o004;
        const OTHER_WRITE = 0o002;
        const OTHER_EXEC = 0o001;
    }
}

impl Permissions {
    /// Keeps the permission bits of a full `st_mode`, dropping the file type.
    #[must_use]
    pub fn from_mode(mode: u32) -> Self {
        Self::from_bits_truncate(mode)
    }

    #[must_use]
    pub fn mode(self) -> u32 {
        self.bits()
    }
}

/// Attributes returned by a stat of a remote path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub is_dir: bool,
    pub size: Option<u64>,
    pub permissions: Option<Permissions>,
    pub modified: Option<DateTime<Utc>>,
}

impl Metadata {
    #[must_use]
    pub fn entry_type(&self) -> FileSystemEntryType {
        FileSystemEntryType::from_is_directory(self.is_dir)
    }
}

/// One item of a single-level directory listing. `.` and `..` are never reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub metadata: Metadata,
}

/// Result of a remote shell command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_status: u32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }

    /// Everything the command printed, stdout first.
    #[must_use]
    pub fn output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Structured file-transfer channel to one remote host.
///
/// Implementations report a missing path as `Ok(false)` from [`TransferSession::try_exists`]
/// and as [`Error::NotFound`](crate::Error::NotFound) from the other methods.
#[async_trait]
pub trait TransferSession: Send + Sync {
    /// Remote file handle, readable and writable.
    type File: AsyncRead + AsyncWrite + Unpin + Send;
    /// Command channel derived from this session.
    type Command: CommandSession;

    /// Connection test.
    fn is_connected(&self) -> bool;

    async fn try_exists(&self, path: &str) -> Result<bool>;

    async fn metadata(&self, path: &str) -> Result<Metadata>;

    /// Lists one level of the directory.
    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>>;

    async fn create_dir(&self, path: &str) -> Result<()>;

    /// Removes an empty directory.
    async fn remove_dir(&self, path: &str) -> Result<()>;

    async fn remove_file(&self, path: &str) -> Result<()>;

    async fn open_read(&self, path: &str) -> Result<Self::File>;

    /// Opens for writing, creating the file if missing, without truncating it.
    async fn open_write(&self, path: &str) -> Result<Self::File>;

    /// Opens for writing, creating the file if missing and truncating it otherwise.
    async fn create(&self, path: &str) -> Result<Self::File>;

    async fn set_permissions(&self, path: &str, permissions: Permissions) -> Result<()>;

    /// Opens a new command channel on the same host. The caller owns and closes it.
    async fn open_command_session(&self) -> Result<Self::Command>;
}

/// Remote shell command channel.
#[async_trait]
pub trait CommandSession: Send + Sized {
    async fn execute(&mut self, command: &str) -> Result<CommandOutput>;

    async fn close(self) -> Result<()>;
}

/// Runs one command on a command session opened for it alone.
///
/// The session is closed on every exit path. A non-zero exit status becomes
/// [`Error::RemoteCommandFailed`] carrying the command text and its captured output.
pub async fn execute_scoped<S: TransferSession>(session: &S, command: &str) -> Result<CommandOutput> {
    debug!("exec: {}", command);

    let mut channel = session.open_command_session().await?;
    let result = channel.execute(command).await;
    if let Err(error) = channel.close().await {
        warn!("failed to close command session after `{}`: {}", command, error);
    }

    let output = result?;
    if !output.success() {
        debug!("`{}` exited with {}", command, output.exit_status);
        return Err(Error::RemoteCommandFailed {
            command: command.to_owned(),
            exit_status: output.exit_status,
            output: output.output(),
        });
    }

    Ok(output)
}
