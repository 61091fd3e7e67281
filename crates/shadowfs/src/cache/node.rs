//! Shadow-tree nodes.
//!
//! Nodes live in a flat arena owned by the [`FileCache`](super::FileCache)
//! and refer to each other by index, so the parent/child links form no
//! ownership cycle. The pending state of a node is a tagged variant that
//! carries its own payload: the payload kind can never disagree with the
//! node type.

use crate::types::{FileEntry, FileMeta, FileType};

/// Index of a node in the cache arena.
pub(crate) type NodeId = usize;

/// Pending state of a cached node, with its payload.
#[derive(Debug)]
pub(crate) enum NodeState {
    /// Backend directory. `None` children means "not yet loaded"; an empty
    /// list means "loaded, empty".
    Directory(Option<Vec<NodeId>>),
    /// Directory created in the cache, pending flush. Children always
    /// loaded.
    DirectoryNew(Vec<NodeId>),
    /// Backend file. `None` bytes means "not yet fetched".
    File(Option<Vec<u8>>),
    /// File written in the cache, pending flush.
    FileDirty(Vec<u8>),
    /// Backend symlink, destination as stored.
    Symlink(String),
    /// Symlink created in the cache, pending flush.
    SymlinkDirty(String),
    /// No entry at this path.
    Nonexistent,
}

impl NodeState {
    pub fn exists(&self) -> bool {
        !matches!(self, NodeState::Nonexistent)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, NodeState::Directory(_) | NodeState::DirectoryNew(_))
    }

    pub fn is_file(&self) -> bool {
        matches!(self, NodeState::File(_) | NodeState::FileDirty(_))
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self, NodeState::Symlink(_) | NodeState::SymlinkDirty(_))
    }

    /// The stored file type this state presents, `None` for nonexistent.
    pub fn file_type(&self) -> Option<FileType> {
        match self {
            NodeState::Directory(_) | NodeState::DirectoryNew(_) => Some(FileType::Directory),
            NodeState::File(_) | NodeState::FileDirty(_) => Some(FileType::File),
            NodeState::Symlink(_) | NodeState::SymlinkDirty(_) => Some(FileType::Symlink),
            NodeState::Nonexistent => None,
        }
    }

    /// Loaded children, for either directory variant.
    pub fn children(&self) -> Option<&[NodeId]> {
        match self {
            NodeState::Directory(Some(children)) | NodeState::DirectoryNew(children) => {
                Some(children)
            }
            _ => None,
        }
    }
}

/// One node of the shadow tree.
///
/// `old_type` records what the backend held at this path when the node was
/// materialised (`None` for "nothing"); `state` is what the cache holds now.
/// The commit walk diffs the two.
#[derive(Debug)]
pub(crate) struct CachedNode {
    /// Final path component; empty for the root.
    pub filename: String,
    /// Absolute path.
    pub file_path: String,
    /// Arena index of the parent; `None` for the root.
    pub parent: Option<NodeId>,
    /// Backend-side type at materialisation time. Immutable.
    pub old_type: Option<FileType>,
    /// Cache-side state, mutated by operations.
    pub state: NodeState,
    /// Entry metadata.
    pub meta: FileMeta,
    /// Set when `meta` diverged from the backend and must be flushed.
    pub meta_dirty: bool,
}

impl CachedNode {
    /// An lstat-style listing record for this node, `None` when it does not
    /// exist. Meta is copied out.
    pub fn entry(&self) -> Option<FileEntry> {
        let file_type = self.state.file_type()?;
        let destination = match &self.state {
            NodeState::Symlink(dest) | NodeState::SymlinkDirty(dest) => Some(dest.clone()),
            _ => None,
        };
        Some(FileEntry {
            filename: self.filename.clone(),
            file_path: self.file_path.clone(),
            file_type,
            destination,
            meta: self.meta,
        })
    }
}
