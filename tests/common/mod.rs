//! In-memory remote host: a transfer session and a command session that interprets
//! the `cp`, `cp -r`, `mv` and `find ... -print -ls` forms the filesystem issues.

#![allow(dead_code)]

use chrono::{DateTime, Datelike, TimeZone, Utc};
use russh_remote_fs::{
    path, CommandOutput, CommandSession, Error, Metadata, Permissions, RemoteEntry, Result,
    TransferSession,
};
use std::{
    collections::{BTreeMap, HashSet},
    io,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard},
    task::{Context, Poll},
};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Modification time of every node, as rendered in the `find` detail lines.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(Utc::now().year(), 10, 14, 23, 18, 0)
        .unwrap()
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone)]
struct Node {
    is_dir: bool,
    data: Vec<u8>,
    mode: u32,
}

impl Node {
    fn directory() -> Self {
        Self {
            is_dir: true,
            data: Vec::new(),
            mode: 0o755,
        }
    }

    fn file(data: &[u8]) -> Self {
        Self {
            is_dir: false,
            data: data.to_vec(),
            mode: 0o644,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    locked: HashSet<String>,
    read_dir_calls: usize,
    commands: Vec<String>,
    sessions_opened: usize,
    sessions_closed: usize,
}

fn key(path: &str) -> String {
    path::ensure_file_indicated(path)
}

fn in_subtree(candidate: &str, root: &str) -> bool {
    candidate == root || candidate.starts_with(&path::ensure_directory_indicated(root))
}

impl State {
    fn children(&self, directory: &str) -> Vec<String> {
        let prefix = path::ensure_directory_indicated(&key(directory));
        self.nodes
            .keys()
            .filter(|k| k.as_str() != "/" && path::parent(k) == Some(prefix.as_str()))
            .cloned()
            .collect()
    }

    fn is_dir(&self, path: &str) -> bool {
        self.nodes.get(&key(path)).is_some_and(|n| n.is_dir)
    }

    fn parent_is_dir(&self, path: &str) -> bool {
        match path::parent(&key(path)) {
            Some(parent) => self.is_dir(parent),
            None => true,
        }
    }

    /// Where `cp`/`mv` put `source` for `destination`: inside it when it is a directory.
    fn target(&self, source: &str, destination: &str) -> String {
        if self.is_dir(destination) {
            path::join(&key(destination), path::file_name(source))
        } else {
            key(destination)
        }
    }

    fn copy_tree(&mut self, source: &str, target: &str) {
        let source = key(source);
        let copies: Vec<(String, Node)> = self
            .nodes
            .iter()
            .filter(|(k, _)| in_subtree(k, &source))
            .map(|(k, node)| (format!("{target}{}", &k[source.len()..]), node.clone()))
            .collect();
        self.nodes.extend(copies);
    }

    fn remove_tree(&mut self, root: &str) {
        let root = key(root);
        self.nodes.retain(|k, _| !in_subtree(k, &root));
    }

    fn is_locked(&self, path: &str) -> bool {
        self.locked.contains(&key(path))
    }

    fn find(&self, root: &str, printed: &str, out: &mut String) {
        let node = &self.nodes[&key(root)];
        let perm = if node.is_dir { "drwxr-xr-x" } else { "-rw-r--r--" };
        out.push_str(printed);
        out.push('\n');
        out.push_str(&format!(
            "{:>7} {:>4} {} {:>3} user user {:>8} Oct 14 23:18 {}\n",
            266_158,
            node.data.len().div_ceil(4096) * 4,
            perm,
            if node.is_dir { 2 } else { 1 },
            if node.is_dir { 224 } else { node.data.len() },
            printed
        ));

        if node.is_dir {
            for child in self.children(root) {
                let printed = path::join(printed, path::file_name(&child));
                self.find(&child, &printed, out);
            }
        }
    }

    fn execute(&mut self, command: &str) -> CommandOutput {
        let words = split_words(command);
        let words: Vec<&str> = words.iter().map(String::as_str).collect();

        match words[..] {
            ["cp", source, destination] => {
                if !self.nodes.get(&key(source)).is_some_and(|n| !n.is_dir) {
                    return failed(format!("cp: cannot stat '{source}': No such file or directory"));
                }
                if self.is_locked(destination) {
                    return failed(format!(
                        "cp: cannot create regular file '{destination}': Device or resource busy"
                    ));
                }
                let target = self.target(source, destination);
                let node = self.nodes[&key(source)].clone();
                let _ = self.nodes.insert(target, node);
                succeeded("")
            }
            ["cp", "-r", source, destination] => {
                if !self.is_dir(source) {
                    return failed(format!("cp: cannot stat '{source}': No such file or directory"));
                }
                let target = self.target(source, destination);
                self.copy_tree(source, &target);
                succeeded("")
            }
            ["mv", source, destination] => {
                if !self.nodes.contains_key(&key(source)) {
                    return failed(format!("mv: cannot stat '{source}': No such file or directory"));
                }
                if self.is_locked(source) {
                    return failed(format!(
                        "mv: cannot move '{source}' to '{destination}': Device or resource busy"
                    ));
                }
                let target = self.target(source, destination);
                self.copy_tree(source, &target);
                self.remove_tree(source);
                succeeded("")
            }
            ["find", root, "-print", "-ls"] => {
                if !self.nodes.contains_key(&key(root)) {
                    return failed(format!("find: '{root}': No such file or directory"));
                }
                let mut out = String::new();
                self.find(root, root, &mut out);
                succeeded(&out)
            }
            _ => CommandOutput {
                exit_status: 127,
                stdout: String::new(),
                stderr: format!("sh: command not found: {command}"),
            },
        }
    }
}

fn succeeded(stdout: &str) -> CommandOutput {
    CommandOutput {
        exit_status: 0,
        stdout: stdout.to_owned(),
        stderr: String::new(),
    }
}

fn failed(stderr: String) -> CommandOutput {
    CommandOutput {
        exit_status: 1,
        stdout: String::new(),
        stderr,
    }
}

/// Splits on spaces, keeping double-quoted words whole and honouring backslash escapes.
fn split_words(command: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_word = false;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
                in_word = true;
            }
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            ' ' if !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }

    words
}

/// Shared handle to the in-memory host. Clones observe the same tree.
#[derive(Debug, Clone)]
pub struct MemoryHost {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        let mut state = State::default();
        let _ = state.nodes.insert("/".to_owned(), Node::directory());
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn ensure_parents(state: &mut State, path: &str) {
        let mut current = path::parent(&key(path)).map(key);
        while let Some(directory) = current {
            current = path::parent(&directory).map(key);
            let _ = state.nodes.entry(directory).or_insert_with(Node::directory);
        }
    }

    /// Adds a directory and its missing ancestors.
    pub fn with_dir(self, path: &str) -> Self {
        {
            let mut state = self.state();
            Self::ensure_parents(&mut state, path);
            let _ = state.nodes.insert(key(path), Node::directory());
        }
        self
    }

    /// Adds a file and its missing ancestors.
    pub fn with_file(self, path: &str, contents: &str) -> Self {
        {
            let mut state = self.state();
            Self::ensure_parents(&mut state, path);
            let _ = state.nodes.insert(key(path), Node::file(contents.as_bytes()));
        }
        self
    }

    /// Commands touching this path fail as if the file were busy.
    pub fn lock(self, path: &str) -> Self {
        let _ = self.state().locked.insert(key(path));
        self
    }

    pub fn contains(&self, path: &str) -> bool {
        self.state().nodes.contains_key(&key(path))
    }

    pub fn contents(&self, path: &str) -> Option<String> {
        self.state()
            .nodes
            .get(&key(path))
            .map(|n| String::from_utf8_lossy(&n.data).into_owned())
    }

    pub fn mode(&self, path: &str) -> Option<u32> {
        self.state().nodes.get(&key(path)).map(|n| n.mode)
    }

    pub fn read_dir_calls(&self) -> usize {
        self.state().read_dir_calls
    }

    pub fn commands(&self) -> Vec<String> {
        self.state().commands.clone()
    }

    pub fn sessions_opened(&self) -> usize {
        self.state().sessions_opened
    }

    pub fn sessions_closed(&self) -> usize {
        self.state().sessions_closed
    }
}

fn not_found(path: &str) -> Error {
    Error::NotFound {
        path: path.to_owned(),
    }
}

#[async_trait::async_trait]
impl TransferSession for MemoryHost {
    type File = MemoryFile;
    type Command = MemoryCommand;

    fn is_connected(&self) -> bool {
        true
    }

    async fn try_exists(&self, path: &str) -> Result<bool> {
        Ok(self.state().nodes.contains_key(&key(path)))
    }

    async fn metadata(&self, path: &str) -> Result<Metadata> {
        let state = self.state();
        let node = state.nodes.get(&key(path)).ok_or_else(|| not_found(path))?;
        Ok(Metadata {
            is_dir: node.is_dir,
            size: Some(node.data.len() as u64),
            permissions: Some(Permissions::from_mode(node.mode)),
            modified: Some(fixed_time()),
        })
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let mut state = self.state();
        state.read_dir_calls += 1;
        if !state.is_dir(path) {
            return Err(not_found(path));
        }

        let entries = state
            .children(path)
            .into_iter()
            .rev()
            .map(|child| {
                let node = &state.nodes[&child];
                RemoteEntry {
                    name: path::file_name(&child).to_owned(),
                    metadata: Metadata {
                        is_dir: node.is_dir,
                        size: Some(node.data.len() as u64),
                        permissions: Some(Permissions::from_mode(node.mode)),
                        modified: Some(fixed_time()),
                    },
                }
            })
            .collect();
        Ok(entries)
    }

    async fn create_dir(&self, path: &str) -> Result<()> {
        let mut state = self.state();
        if state.nodes.contains_key(&key(path)) {
            return Err(Error::Transfer(format!("{path}: already exists")));
        }
        if !state.parent_is_dir(path) {
            return Err(not_found(path));
        }
        let _ = state.nodes.insert(key(path), Node::directory());
        Ok(())
    }

    async fn remove_dir(&self, path: &str) -> Result<()> {
        let mut state = self.state();
        if !state.is_dir(path) {
            return Err(not_found(path));
        }
        if !state.children(path).is_empty() {
            return Err(Error::Transfer(format!("{path}: directory not empty")));
        }
        let _ = state.nodes.remove(&key(path));
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        let mut state = self.state();
        match state.nodes.get(&key(path)) {
            Some(node) if !node.is_dir => {
                let _ = state.nodes.remove(&key(path));
                Ok(())
            }
            _ => Err(not_found(path)),
        }
    }

    async fn open_read(&self, path: &str) -> Result<MemoryFile> {
        let state = self.state();
        match state.nodes.get(&key(path)) {
            Some(node) if !node.is_dir => Ok(MemoryFile::new(self.state.clone(), path)),
            _ => Err(not_found(path)),
        }
    }

    async fn open_write(&self, path: &str) -> Result<MemoryFile> {
        let mut state = self.state();
        if !state.nodes.contains_key(&key(path)) {
            if !state.parent_is_dir(path) {
                return Err(not_found(path));
            }
            let _ = state.nodes.insert(key(path), Node::file(b""));
        }
        Ok(MemoryFile::new(self.state.clone(), path))
    }

    async fn create(&self, path: &str) -> Result<MemoryFile> {
        let mut state = self.state();
        if state.is_dir(path) {
            return Err(Error::Transfer(format!("{path}: is a directory")));
        }
        if !state.parent_is_dir(path) {
            return Err(not_found(path));
        }
        let _ = state.nodes.insert(key(path), Node::file(b""));
        Ok(MemoryFile::new(self.state.clone(), path))
    }

    async fn set_permissions(&self, path: &str, permissions: Permissions) -> Result<()> {
        let mut state = self.state();
        let node = state.nodes.get_mut(&key(path)).ok_or_else(|| not_found(path))?;
        node.mode = permissions.mode();
        Ok(())
    }

    async fn open_command_session(&self) -> Result<MemoryCommand> {
        self.state().sessions_opened += 1;
        Ok(MemoryCommand {
            state: self.state.clone(),
        })
    }
}

pub struct MemoryCommand {
    state: Arc<Mutex<State>>,
}

#[async_trait::async_trait]
impl CommandSession for MemoryCommand {
    async fn execute(&mut self, command: &str) -> Result<CommandOutput> {
        let mut state = self.state.lock().unwrap();
        state.commands.push(command.to_owned());
        Ok(state.execute(command))
    }

    async fn close(self) -> Result<()> {
        self.state.lock().unwrap().sessions_closed += 1;
        Ok(())
    }
}

/// Handle to one in-memory file; reads and writes go straight to the shared tree.
pub struct MemoryFile {
    state: Arc<Mutex<State>>,
    path: String,
    pos: usize,
}

impl MemoryFile {
    fn new(state: Arc<Mutex<State>>, path: &str) -> Self {
        Self {
            state,
            path: key(path),
            pos: 0,
        }
    }
}

impl AsyncRead for MemoryFile {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let state = this.state.lock().unwrap();
        let Some(node) = state.nodes.get(&this.path) else {
            return Poll::Ready(Err(io::ErrorKind::NotFound.into()));
        };

        let start = this.pos.min(node.data.len());
        let len = buf.remaining().min(node.data.len() - start);
        buf.put_slice(&node.data[start..start + len]);
        drop(state);

        this.pos += len;
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MemoryFile {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let mut state = this.state.lock().unwrap();
        let Some(node) = state.nodes.get_mut(&this.path) else {
            return Poll::Ready(Err(io::ErrorKind::NotFound.into()));
        };

        let end = this.pos + buf.len();
        if node.data.len() < end {
            node.data.resize(end, 0);
        }
        node.data[this.pos..end].copy_from_slice(buf);
        drop(state);

        this.pos = end;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
