//! The cached shadow tree.
//!
//! A lazily populated mirror of the backend's namespace. Nodes are
//! materialised on demand: the root from `linfo("/")`, directory children
//! from one `read_dir` per directory per cache lifetime, file bytes from
//! `read_file` on first read. Mutations only ever touch node state; nothing
//! reaches the backend until the commit walk flushes the whole tree.

use std::sync::Arc;

use crate::backend::StorageBackend;
use crate::error::{Error, Result};
use crate::path;
use crate::types::{FileMeta, FileType};

use super::node::{CachedNode, NodeId, NodeState};

/// Maximum symlink hops before resolution reports a chain error.
const MAX_SYMLINK_HOPS: usize = 64;

/// Root-anchored arena of cached nodes.
pub(crate) struct FileCache {
    backend: Arc<dyn StorageBackend>,
    nodes: Vec<CachedNode>,
    root: Option<NodeId>,
}

impl FileCache {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        FileCache {
            backend,
            nodes: Vec::new(),
            root: None,
        }
    }

    /// True once a root has been materialised (and not yet dismantled).
    pub fn has_root(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &CachedNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut CachedNode {
        &mut self.nodes[id]
    }

    fn insert(&mut self, node: CachedNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Materialise the root from the backend on first access.
    pub async fn ensure_root(&mut self) -> Result<NodeId> {
        if let Some(root) = self.root {
            return Ok(root);
        }
        let entry = self.backend.linfo("/").await?;
        let node = match entry {
            Some(entry) => CachedNode {
                filename: String::new(),
                file_path: "/".to_string(),
                parent: None,
                old_type: Some(FileType::Directory),
                state: NodeState::Directory(None),
                meta: entry.meta,
                meta_dirty: false,
            },
            // Empty backend: the root itself is pending creation.
            None => CachedNode {
                filename: String::new(),
                file_path: "/".to_string(),
                parent: None,
                old_type: None,
                state: NodeState::DirectoryNew(Vec::new()),
                meta: FileMeta::now(),
                meta_dirty: true,
            },
        };
        let id = self.insert(node);
        self.root = Some(id);
        Ok(id)
    }

    /// Children of a directory node, fetching from the backend on first use.
    pub async fn retrieve_children(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        match &self.node(id).state {
            NodeState::Directory(Some(children)) => return Ok(children.clone()),
            NodeState::DirectoryNew(children) => return Ok(children.clone()),
            NodeState::Directory(None) => {}
            NodeState::Nonexistent => return Err(Error::not_found(&self.node(id).file_path)),
            _ => return Err(Error::not_directory(&self.node(id).file_path)),
        }

        let dir_path = self.node(id).file_path.clone();
        let backend = Arc::clone(&self.backend);
        let entries = backend.read_dir(&dir_path).await?;

        let mut children = Vec::with_capacity(entries.len());
        for entry in entries {
            let state = match entry.file_type {
                FileType::Directory => NodeState::Directory(None),
                FileType::File => NodeState::File(None),
                FileType::Symlink => {
                    NodeState::Symlink(entry.destination.unwrap_or_default())
                }
            };
            let child = self.insert(CachedNode {
                file_path: path::join(&[&dir_path, &entry.filename]),
                filename: entry.filename,
                parent: Some(id),
                old_type: Some(entry.file_type),
                state,
                meta: entry.meta,
                meta_dirty: false,
            });
            children.push(child);
        }
        self.node_mut(id).state = NodeState::Directory(Some(children.clone()));
        Ok(children)
    }

    /// Children that currently exist (placeholders filtered out).
    pub async fn existing_children(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        let children = self.retrieve_children(id).await?;
        Ok(children
            .into_iter()
            .filter(|&child| self.node(child).state.exists())
            .collect())
    }

    /// The named child of a directory node.
    ///
    /// A missing name manufactures a nonexistent placeholder (mtime 0) so a
    /// later create can record that the entry is new.
    pub async fn retrieve_child(&mut self, id: NodeId, name: &str) -> Result<NodeId> {
        let children = self.retrieve_children(id).await?;
        for child in children {
            if self.node(child).filename == name {
                return Ok(child);
            }
        }

        let file_path = path::join(&[&self.node(id).file_path, name]);
        let child = self.insert(CachedNode {
            filename: name.to_string(),
            file_path,
            parent: Some(id),
            old_type: None,
            state: NodeState::Nonexistent,
            meta: FileMeta { mtime: 0 },
            meta_dirty: false,
        });
        match &mut self.node_mut(id).state {
            NodeState::Directory(Some(children)) | NodeState::DirectoryNew(children) => {
                children.push(child)
            }
            // retrieve_children above left the directory loaded
            _ => unreachable!("parent directory children must be loaded"),
        }
        Ok(child)
    }

    /// Walk an absolute path to its node.
    ///
    /// Interior components must be existing directories (ENOENT / ENOTDIR
    /// against the path reached so far); the final component is looked up
    /// without existence or type checks. Symlinks are not followed.
    pub async fn walk(&mut self, abs_path: &str) -> Result<NodeId> {
        debug_assert!(path::is_absolute(abs_path), "walk requires an absolute path");
        let parts = path::split(abs_path);
        let components = &parts[1..];

        let mut current = self.ensure_root().await?;
        for (idx, component) in components.iter().enumerate() {
            let child = self.retrieve_child(current, component).await?;
            if idx + 1 < components.len() {
                let node = self.node(child);
                if !node.state.exists() {
                    return Err(Error::not_found(&node.file_path));
                }
                if !node.state.is_dir() {
                    return Err(Error::not_directory(&node.file_path));
                }
            }
            current = child;
        }
        Ok(current)
    }

    /// Follow symlinks from a walked node to its final target.
    ///
    /// A relative destination resolves against the symlink's parent
    /// directory. More than [`MAX_SYMLINK_HOPS`] hops reports the chain
    /// error against the originally walked path.
    pub async fn resolve_symlink(&mut self, id: NodeId) -> Result<NodeId> {
        let origin = self.node(id).file_path.clone();
        let mut current = id;
        let mut hops = 0;
        loop {
            let destination = match &self.node(current).state {
                NodeState::Symlink(dest) | NodeState::SymlinkDirty(dest) => dest.clone(),
                _ => return Ok(current),
            };
            hops += 1;
            if hops > MAX_SYMLINK_HOPS {
                return Err(Error::SymlinkChain { path: origin });
            }
            let parent_dir = path::dirname(&self.node(current).file_path);
            let target = path::resolve(&[&parent_dir, &destination]);
            current = self.walk(&target).await?;
        }
    }

    /// Turn a nonexistent node into a pending directory.
    pub fn mk_dir(&mut self, id: NodeId) -> Result<()> {
        if self.node(id).state.exists() {
            return Err(Error::already_exists(&self.node(id).file_path));
        }
        self.node_mut(id).state = NodeState::DirectoryNew(Vec::new());
        self.touch(id);
        self.touch_parent(id);
        Ok(())
    }

    /// Turn a nonexistent node into a pending symlink.
    pub fn mk_lnk(&mut self, id: NodeId, destination: &str) -> Result<()> {
        if self.node(id).state.exists() {
            return Err(Error::already_exists(&self.node(id).file_path));
        }
        self.node_mut(id).state = NodeState::SymlinkDirty(destination.to_string());
        self.touch(id);
        self.touch_parent(id);
        Ok(())
    }

    /// Write file bytes into a node, creating or overwriting.
    ///
    /// Returns `true` when the node did not exist before. The parent's mtime
    /// moves only on creation, matching POSIX.
    pub fn write_file(&mut self, id: NodeId, data: Vec<u8>) -> Result<bool> {
        let created = match &self.node(id).state {
            NodeState::Nonexistent => true,
            NodeState::File(_) | NodeState::FileDirty(_) => false,
            NodeState::Directory(_) | NodeState::DirectoryNew(_) => {
                return Err(Error::is_directory(&self.node(id).file_path))
            }
            NodeState::Symlink(_) | NodeState::SymlinkDirty(_) => {
                return Err(Error::not_file(&self.node(id).file_path))
            }
        };
        self.node_mut(id).state = NodeState::FileDirty(data);
        self.touch(id);
        if created {
            self.touch_parent(id);
        }
        Ok(created)
    }

    /// Mark an existing node as removed, dropping its payload.
    pub fn delete(&mut self, id: NodeId) -> Result<()> {
        if !self.node(id).state.exists() {
            return Err(Error::not_found(&self.node(id).file_path));
        }
        self.node_mut(id).state = NodeState::Nonexistent;
        self.touch_parent(id);
        Ok(())
    }

    /// File bytes of a node, fetching from the backend on cache miss.
    pub async fn read_file(&mut self, id: NodeId) -> Result<Vec<u8>> {
        match &self.node(id).state {
            NodeState::FileDirty(data) | NodeState::File(Some(data)) => return Ok(data.clone()),
            NodeState::File(None) => {}
            NodeState::Nonexistent => return Err(Error::not_found(&self.node(id).file_path)),
            NodeState::Directory(_) | NodeState::DirectoryNew(_) => {
                return Err(Error::is_directory(&self.node(id).file_path))
            }
            NodeState::Symlink(_) | NodeState::SymlinkDirty(_) => {
                return Err(Error::not_file(&self.node(id).file_path))
            }
        }
        let file_path = self.node(id).file_path.clone();
        let backend = Arc::clone(&self.backend);
        let data = backend.read_file(&file_path).await?;
        self.node_mut(id).state = NodeState::File(Some(data.clone()));
        Ok(data)
    }

    fn touch(&mut self, id: NodeId) {
        let node = self.node_mut(id);
        node.meta = FileMeta::now();
        node.meta_dirty = true;
    }

    fn touch_parent(&mut self, id: NodeId) {
        if let Some(parent) = self.node(id).parent {
            self.touch(parent);
        }
    }

    /// Drop the whole tree so every node is reclaimed.
    ///
    /// Parent links are cleared before the arena is released; the next
    /// operation re-materialises the root from the backend.
    pub fn dismantle(&mut self) {
        for node in &mut self.nodes {
            node.parent = None;
        }
        self.nodes.clear();
        self.root = None;
    }
}
