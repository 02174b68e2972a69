#![forbid(unsafe_code)]
#![warn(clippy::all)]

//! Lease-based leader election for replicated services.
//!
//! Several equivalent process replicas coordinate through a shared key-value
//! store with per-key TTL expiry; exactly one of them should run singleton
//! work (periodic jobs, cleanups) at a time. Each replica runs an [`Elector`]
//! that, after a jittered startup delay, periodically tries to acquire or
//! renew a lease record in the store. Whoever holds a live lease is the
//! leader; everyone else gates their singleton work behind
//! [`Elector::is_leader`].
//!
//! There is no peer-to-peer messaging and no quorum protocol. Mutual
//! exclusion is only as strong as the atomicity of the store's individual
//! key operations, so consumers must tolerate brief leaderless windows
//! during failover and a rare short window where two instances both believe
//! they lead.

pub mod config;
pub mod elector;
pub mod error;
pub mod store;

pub use config::ElectorConfig;
pub use elector::Elector;
pub use error::{Error, Result};
pub use store::{InMemoryLeaseStore, LeaseStore};
