//! Sessions over a [`russh`] client connection.
//!
//! The transfer session runs the `sftp` subsystem through [`russh_sftp`]. Command sessions
//! are fresh `exec` channels on the same connection.

use chrono::{DateTime, Utc};
use russh::{
    client::{self, Msg},
    Channel, ChannelMsg,
};
use russh_sftp::{
    client::{error::Error as SftpError, fs::File, SftpSession},
    protocol::{FileAttributes, OpenFlags, StatusCode},
};
use std::sync::Arc;

use super::{CommandOutput, CommandSession, Metadata, Permissions, RemoteEntry, TransferSession};
use crate::{
    error::{Error, Result},
    options::RemoteFsOptions,
};

fn sftp_error(error: SftpError, path: &str) -> Error {
    match error {
        SftpError::Status(status) if status.status_code == StatusCode::NoSuchFile => {
            Error::NotFound {
                path: path.to_owned(),
            }
        }
        error => Error::Transfer(format!("{path}: {error}")),
    }
}

fn metadata(attrs: &FileAttributes) -> Metadata {
    Metadata {
        is_dir: attrs.is_dir(),
        size: attrs.size,
        permissions: attrs.permissions.map(Permissions::from_mode),
        modified: attrs
            .mtime
            .and_then(|mtime| DateTime::<Utc>::from_timestamp(i64::from(mtime), 0)),
    }
}

/// SFTP transfer session plus the connection it was opened on
pub struct SftpTransferSession<H: client::Handler> {
    handle: Arc<client::Handle<H>>,
    sftp: SftpSession,
}

impl<H: client::Handler> SftpTransferSession<H> {
    /// Opens a session channel on an authenticated connection and starts SFTP on it.
    pub async fn connect(handle: Arc<client::Handle<H>>) -> Result<Self> {
        Self::connect_with(handle, &RemoteFsOptions::default()).await
    }

    pub async fn connect_with(
        handle: Arc<client::Handle<H>>,
        options: &RemoteFsOptions,
    ) -> Result<Self> {
        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| Error::Transfer(format!("Failed to open session channel: {e}")))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| Error::Transfer(format!("Failed to request SFTP subsystem: {e}")))?;

        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| Error::Transfer(format!("Failed to start SFTP session: {e}")))?;
        if let Some(secs) = options.timeout_secs {
            sftp.set_timeout(secs);
        }

        debug!("sftp session opened");
        Ok(Self { handle, sftp })
    }

    pub fn sftp(&self) -> &SftpSession {
        &self.sftp
    }

    /// Closes the SFTP channel. The connection itself stays open.
    pub async fn close(&self) -> Result<()> {
        self.sftp
            .close()
            .await
            .map_err(|e| Error::Transfer(format!("Failed to close SFTP session: {e}")))
    }
}

#[async_trait]
impl<H: client::Handler> TransferSession for SftpTransferSession<H> {
    type File = File;
    type Command = ExecCommandSession;

    fn is_connected(&self) -> bool {
        !self.handle.is_closed()
    }

    async fn try_exists(&self, path: &str) -> Result<bool> {
        self.sftp
            .try_exists(path)
            .await
            .map_err(|e| sftp_error(e, path))
    }

    async fn metadata(&self, path: &str) -> Result<Metadata> {
        let attrs = self
            .sftp
            .metadata(path)
            .await
            .map_err(|e| sftp_error(e, path))?;
        Ok(metadata(&attrs))
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let entries = self
            .sftp
            .read_dir(path)
            .await
            .map_err(|e| sftp_error(e, path))?;

        Ok(entries
            .map(|entry| RemoteEntry {
                name: entry.file_name(),
                metadata: metadata(&entry.metadata()),
            })
            .collect())
    }

    async fn create_dir(&self, path: &str) -> Result<()> {
        self.sftp
            .create_dir(path)
            .await
            .map_err(|e| sftp_error(e, path))
    }

    async fn remove_dir(&self, path: &str) -> Result<()> {
        self.sftp
            .remove_dir(path)
            .await
            .map_err(|e| sftp_error(e, path))
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        self.sftp
            .remove_file(path)
            .await
            .map_err(|e| sftp_error(e, path))
    }

    async fn open_read(&self, path: &str) -> Result<File> {
        self.sftp.open(path).await.map_err(|e| sftp_error(e, path))
    }

    async fn open_write(&self, path: &str) -> Result<File> {
        self.sftp
            .open_with_flags(path, OpenFlags::WRITE | OpenFlags::CREATE)
            .await
            .map_err(|e| sftp_error(e, path))
    }

    async fn create(&self, path: &str) -> Result<File> {
        self.sftp.create(path).await.map_err(|e| sftp_error(e, path))
    }

    async fn set_permissions(&self, path: &str, permissions: Permissions) -> Result<()> {
        let attrs = FileAttributes {
            size: None,
            uid: None,
            user: None,
            gid: None,
            group: None,
            permissions: Some(permissions.mode()),
            atime: None,
            mtime: None,
        };

        self.sftp
            .set_metadata(path, attrs)
            .await
            .map_err(|e| sftp_error(e, path))
    }

    async fn open_command_session(&self) -> Result<ExecCommandSession> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::Command(format!("Failed to open exec channel: {e}")))?;

        Ok(ExecCommandSession { channel })
    }
}

/// One `exec` channel, used for a single command
pub struct ExecCommandSession {
    channel: Channel<Msg>,
}

#[async_trait]
impl CommandSession for ExecCommandSession {
    async fn execute(&mut self, command: &str) -> Result<CommandOutput> {
        self.channel
            .exec(true, command)
            .await
            .map_err(|e| Error::Command(format!("Failed to exec `{command}`: {e}")))?;

        let mut collected = Collected::default();
        while let Some(msg) = self.channel.wait().await {
            if !collected.push(msg) {
                break;
            }
        }

        collected.finish(command)
    }

    async fn close(self) -> Result<()> {
        self.channel
            .close()
            .await
            .map_err(|e| Error::Command(format!("Failed to close exec channel: {e}")))
    }
}

/// Output of an `exec` channel, folded from its messages.
#[derive(Debug, Default)]
struct Collected {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_status: Option<u32>,
    eof: bool,
}

impl Collected {
    /// Returns `false` once nothing more is expected. Some servers deliver the exit
    /// status after EOF, so EOF alone does not end the command.
    fn push(&mut self, msg: ChannelMsg) -> bool {
        match msg {
            ChannelMsg::Data { data } => self.stdout.extend_from_slice(&data),
            ChannelMsg::ExtendedData { data, ext: 1 } => self.stderr.extend_from_slice(&data),
            ChannelMsg::ExitStatus { exit_status } => self.exit_status = Some(exit_status),
            ChannelMsg::Eof => self.eof = true,
            ChannelMsg::Close => return false,
            _ => {}
        }

        !(self.eof && self.exit_status.is_some())
    }

    fn finish(self, command: &str) -> Result<CommandOutput> {
        let exit_status = self
            .exit_status
            .ok_or_else(|| Error::Command(format!("`{command}` ended without an exit status")))?;

        Ok(CommandOutput {
            exit_status,
            stdout: String::from_utf8_lossy(&self.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
        })
    }
}
