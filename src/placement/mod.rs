//! Key Placement Module
//!
//! Decides which workers hold which keys.
//!
//! ## Submodules
//! - **`policy`**: Greedy load-based target selection for writes. Every write re-reads the
//!   global load, so placement follows skew without any hashing scheme.
//! - **`rebalancer`**: Replica migration on membership changes. A join moves a share of
//!   existing replicas onto the new worker; a leave re-replicates the departing worker's
//!   keys onto survivors.

pub mod policy;
pub mod rebalancer;
