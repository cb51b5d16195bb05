//! Cluster Directory Module
//!
//! Keeps the orchestrator's view of the cluster: which workers are registered and which
//! workers hold a replica of every key.
//!
//! ## Core Concepts
//! - **Worker records**: Each registered worker has an id, an address and a cached
//!   `key_count` that always equals the number of directory entries listing it.
//! - **Directory entries**: Each key maps to an ordered replica list. The first id is the
//!   primary read target, the remaining ids are read fallbacks.
//! - **Single writer**: `ClusterDirectory` is a plain data structure; the orchestrator wraps
//!   it in one lock so every mutation goes through its methods.

pub mod directory;
pub mod types;
