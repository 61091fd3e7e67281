//! The commit walk.
//!
//! Diffs the shadow tree against the backend state it was materialised from
//! and assembles one ordered [`BulkChanges`]. The walk is breadth-first and
//! children are enqueued after their parent, so `folders_to_create` comes
//! out top-down without extra sorting. Deleted nodes dropped their children
//! on deletion, so no descendant of a deleted path is ever visited.

use std::collections::VecDeque;

use crate::backend::{BulkChanges, FileWrite, FolderCreate, MetaUpdate, SymlinkCreate};
use crate::cache::node::NodeState;
use crate::cache::FileCache;
use crate::types::FileType;

/// Assemble the bulk payload for the current tree.
///
/// Returns an empty payload when no root was ever materialised.
pub(crate) fn build_changes(cache: &FileCache) -> BulkChanges {
    let mut changes = BulkChanges::default();
    let Some(root) = cache.root() else {
        return changes;
    };

    let mut queue = VecDeque::from([root]);
    while let Some(id) = queue.pop_front() {
        let node = cache.node(id);
        let file_path = node.file_path.clone();
        match &node.state {
            NodeState::Nonexistent => {
                if node.old_type.is_some() {
                    changes.to_delete.push(file_path);
                }
            }
            NodeState::DirectoryNew(children) => {
                if node.old_type.is_some() {
                    changes.to_delete.push(file_path.clone());
                }
                changes.folders_to_create.push(FolderCreate {
                    path: file_path,
                    meta: node.meta,
                });
                queue.extend(children.iter().copied());
            }
            NodeState::Directory(children) => {
                if node.meta_dirty {
                    changes.meta_updates.push(MetaUpdate {
                        path: file_path,
                        meta: node.meta,
                    });
                }
                if let Some(children) = children {
                    queue.extend(children.iter().copied());
                }
            }
            NodeState::FileDirty(data) => {
                if !matches!(node.old_type, None | Some(FileType::File)) {
                    changes.to_delete.push(file_path.clone());
                }
                changes.files_to_write.push(FileWrite {
                    path: file_path,
                    data: data.clone(),
                    meta: node.meta,
                });
            }
            NodeState::File(_) => {
                if node.meta_dirty {
                    changes.meta_updates.push(MetaUpdate {
                        path: file_path,
                        meta: node.meta,
                    });
                }
            }
            NodeState::SymlinkDirty(destination) => {
                if node.old_type.is_some() {
                    changes.to_delete.push(file_path.clone());
                }
                changes.symlinks_to_create.push(SymlinkCreate {
                    path: file_path,
                    destination: destination.clone(),
                    meta: node.meta,
                });
            }
            NodeState::Symlink(_) => {
                if node.meta_dirty {
                    changes.meta_updates.push(MetaUpdate {
                        path: file_path,
                        meta: node.meta,
                    });
                }
            }
        }
    }
    changes
}
