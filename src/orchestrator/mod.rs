//! Orchestrator Module
//!
//! The single coordinating process of the cluster.
//!
//! ## Architecture Overview
//! 1. **State**: `ClusterService` owns the `ClusterDirectory` behind one reader/writer lock.
//!    Reads share the lock; every mutation, rebalances included, holds it exclusively.
//! 2. **Membership**: Registration runs the join rebalance, deregistration runs the leave
//!    rebalance before the worker record is dropped.
//! 3. **Routing**: Client get/put/delete are fanned out to the workers listed in (or
//!    selected for) the directory and folded into one answer.
//!
//! ## Submodules
//! - **`service`**: The state owner and membership operations.
//! - **`router`**: Client get/put/delete.
//! - **`handlers`**: The HTTP surface.
//! - **`protocol`**: Endpoints and DTOs of the HTTP surface.

pub mod handlers;
pub mod protocol;
pub mod router;
pub mod service;
