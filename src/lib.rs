//! Read-only client for the ipsw.me firmware metadata service.
//!
//! Resolves a device by name or identifier, then one of its firmwares by
//! version or build id, and hands the firmware archive to an external
//! parser over HTTP range reads.

pub mod archive;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod model;
pub mod resolve;
pub mod transport;

pub use client::Api;
pub use error::{FwError, Result};
pub use model::{BoardVariant, Device, Firmware, FirmwareChecksums};
pub use resolve::{FirmwareSelector, Resolution};
pub use transport::{HttpTransport, Transport};
