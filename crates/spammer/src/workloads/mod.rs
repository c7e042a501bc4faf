//! Transaction workloads.

mod transfer;

pub use transfer::TransferWorkload;
