//! Sharded, Replicated Key-Value Cluster Library
//!
//! This library crate defines the modules shared by the two process roles of the cluster.
//! The binary (`main.rs`) starts either an orchestrator or a worker on top of them.
//!
//! ## Architecture Modules
//! - **`membership`**: The cluster directory. Tracks registered workers, their load
//!   (`key_count`), and the ordered list of replicas holding every key.
//! - **`placement`**: Key placement. The load-based placement policy used for writes and the
//!   rebalancer that migrates replicas when workers join or leave.
//! - **`orchestrator`**: The coordinating service. Owns the directory behind a single
//!   reader/writer lock and routes client get/put/delete requests to workers.
//! - **`storage`**: The worker side. In-memory store, its HTTP surface, the client used by
//!   the orchestrator to reach workers, and the worker agent lifecycle.

pub mod config;
pub mod error;
pub mod membership;
pub mod orchestrator;
pub mod placement;
pub mod storage;
