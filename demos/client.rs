#[macro_use]
extern crate log;

use russh::{client, keys::PublicKey};
use russh_remote_fs::{
    session::russh::SftpTransferSession, EnumerationStrategy, RemoteFileSystem, RemoteFsOptions,
};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

struct Client;

impl client::Handler for Client {
    type Error = anyhow::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        info!("check_server_key: {}", server_public_key.fingerprint(Default::default()));
        Ok(true)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = client::Config::default();
    let mut handle = client::connect(Arc::new(config), ("localhost", 22), Client).await?;
    if !handle.authenticate_password("root", "pass").await?.success() {
        anyhow::bail!("authentication failed");
    }

    let options = RemoteFsOptions::default()
        .with_strategy(EnumerationStrategy::Auto)
        .with_timeout(10);
    let session = SftpTransferSession::connect_with(Arc::new(handle), &options).await?;
    let fs = RemoteFileSystem::with_options(session, options);

    let dir = "/tmp/remote-fs-demo/";
    fs.create_directory(&format!("{dir}nested/deeper/")).await?;

    let mut file = fs.create_file(&format!("{dir}hello.txt"), true).await?;
    file.write_all(b"hello from russh-remote-fs\n").await?;
    file.shutdown().await?;

    fs.copy_file(&format!("{dir}hello.txt"), &format!("{dir}nested/hello.txt"), true)
        .await?;
    fs.move_file(
        &format!("{dir}nested/hello.txt"),
        &format!("{dir}nested/deeper/moved.txt"),
        true,
    )
    .await?;

    info!("modified: {}", fs.file_last_modified_utc(&format!("{dir}hello.txt")).await?);

    let mut entries = fs.enumerate_entries(dir, true);
    while let Some(entry) = entries.next_entry().await? {
        info!("{} {}", entry.entry_type(), entry.path());
    }

    fs.delete_directory(dir, true).await?;
    fs.session().close().await?;

    Ok(())
}
