//! critic: asynchronous pull request review service.
//!
//! A submission is validated, checked against the fingerprint cache, and
//! queued as a background job. Workers run the review agent, a sequential
//! pipeline of fetch and inference phases, persisting progress snapshots
//! so callers can poll status while it runs.

pub mod agent;
pub mod cache;
pub mod config;
pub mod errors;
pub mod gateways;
pub mod review;
pub mod server;
pub mod task;
