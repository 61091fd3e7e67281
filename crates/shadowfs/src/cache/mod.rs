//! The cached shadow tree and its commit walk.

mod commit;
mod node;
mod tree;

pub(crate) use commit::build_changes;
pub(crate) use node::NodeState;
pub(crate) use tree::FileCache;
