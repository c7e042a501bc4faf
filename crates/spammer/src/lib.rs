//! Block-paced IBC transfer load generator.
//!
//! Fills every block of one or more Cosmos chains with ICS-20 transfer
//! transactions, one send loop per (source, destination) pair.
//!
//! # Modules
//!
//! - [`config`]: TOML configuration and client settings
//! - [`client`]: chain endpoint clients (Tendermint RPC and REST gateway)
//! - [`accounts`]: per-signer sequence bookkeeping
//! - [`tracker`]: block height pacing and drift correction
//! - [`workloads`]: transfer message building and signing
//! - [`broadcaster`]: filling one block's worth of transactions
//! - [`runner`]: the per-chain send loop
//! - [`orchestrator`]: fan-out over chain pairs

pub mod accounts;
pub mod broadcaster;
pub mod client;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod runner;
pub mod tracker;
pub mod workloads;

#[cfg(test)]
mod testing;

pub use error::SpammerError;
