//! Remote directory trees behind a path-based filesystem interface.
//!
//! [`RemoteFileSystem`] exposes one host reached over SSH: existence checks, streams,
//! timestamps and permissions go through the SFTP [`TransferSession`], while copies,
//! moves and recursive listings run as single shell commands on a [`CommandSession`].

#[macro_use]
extern crate log;
#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate async_trait;

mod entry;
pub mod enumerate;
mod error;
mod fs;
/// Parser of bulk `find` listings
pub mod listing;
mod options;
pub mod path;
/// Transfer and command channels
pub mod session;

pub use entry::{FileSystemEntry, FileSystemEntryType};
pub use enumerate::{Entries, Paths, Strategy};
pub use error::{Error, Result};
pub use fs::RemoteFileSystem;
pub use options::{EnumerationStrategy, RemoteFsOptions};
pub use session::{CommandOutput, CommandSession, Metadata, Permissions, RemoteEntry, TransferSession};
