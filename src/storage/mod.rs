//! Worker Storage Module
//!
//! Everything that runs on, or talks to, a storage worker.
//!
//! ## Core Concepts
//! - **Store**: `WorkerStore` is a plain in-memory map; a worker only knows its own keys.
//! - **Surface**: Workers expose get/put/delete over HTTP with query parameters.
//! - **Access**: The orchestrator reaches workers through the `WorkerClient` trait, whose
//!   HTTP implementation bounds every call with a timeout.
//! - **Lifecycle**: `WorkerAgent` serves the store and registers/deregisters the worker.

pub mod agent;
pub mod client;
pub mod handlers;
pub mod memory;
pub mod protocol;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests;
