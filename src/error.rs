//! # Error Types
//!
//! Error handling for the reliable Query/Reply/SIA-Query transport.
//!
//! ## Error Categories
//! - **Malformed input**: truncated headers, inconsistent TLV lengths, bad checksums
//! - **Unknown destination**: a received record names a prefix absent from the topology table
//! - **Resource exhaustion**: packet buffer allocation failures
//! - **Protocol-state mismatch**: enqueueing for a neighbor that is not `UP`
//! - **Configuration**: invalid or unreadable configuration
//!
//! Decode and lookup failures are normally handled where they happen (logged, then
//! skipped). Allocation and queue-discipline failures are returned to the caller.
//! None of them should terminate the routing process.
//!
//! ## Example Usage
//! ```rust
//! use eigrp_rtp::error::{Result, RtpError};
//! use tracing::{error, info};
//!
//! fn check_mtu(mtu: u32) -> Result<u32> {
//!     if mtu < 68 {
//!         return Err(RtpError::ConfigError(format!("MTU {mtu} below IPv4 minimum")));
//!     }
//!     Ok(mtu)
//! }
//!
//! fn main() {
//!     match check_mtu(1500) {
//!         Ok(mtu) => info!(mtu, "MTU accepted"),
//!         Err(e) => error!(error = %e, "MTU rejected"),
//!     }
//! }
//! ```

use ipnetwork::Ipv4Network;
use std::io;
use std::net::Ipv4Addr;
use thiserror::Error;

/// Diagnostic message constants shared by log statements.
pub mod constants {
    /// Receive path diagnostics
    pub const ERR_UNKNOWN_DESTINATION: &str = "Received prefix which we do not know about";
    pub const ERR_MALFORMED_PACKET: &str = "Neighbor sent malformed packet, flushing remaining TLVs";
    pub const ERR_UNEXPECTED_OPCODE: &str = "Opcode is not handled by the query/reply transport";

    /// Send path diagnostics
    pub const ERR_NEIGHBOR_NOT_UP: &str = "Neighbor is not up, dropping packet";
    pub const ERR_TRANSMIT_FAILED: &str = "Transport failed to transmit packet";
    pub const ERR_RETRANSMIT_LIMIT: &str = "Retransmission limit reached";

    /// Filtering
    pub const MSG_FILTER_MAX_METRIC: &str = "Route filtered, setting metric to max";
}

/// Primary error type for all transport operations
#[derive(Error, Debug)]
pub enum RtpError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Truncated packet header: {0} bytes")]
    TruncatedHeader(usize),

    #[error("Unsupported EIGRP version: {0}")]
    UnsupportedVersion(u8),

    #[error("Unknown opcode: {0}")]
    UnknownOpcode(u8),

    #[error("Unexpected opcode for this receive path: {0}")]
    UnexpectedOpcode(u8),

    #[error("Autonomous system mismatch: expected {expected}, received {received}")]
    AsMismatch { expected: u16, received: u16 },

    #[error("Checksum mismatch: expected {expected:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { expected: u16, computed: u16 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailure(&'static str),

    #[error("Malformed TLV at offset {offset}: {reason}")]
    MalformedTlv { offset: usize, reason: &'static str },

    #[error("Unknown destination: {0}")]
    UnknownDestination(Ipv4Network),

    #[error("Packet buffer allocation failed ({requested} bytes)")]
    BufferAllocation { requested: usize },

    #[error("Neighbor {0} is not up")]
    NeighborNotUp(Ipv4Addr),

    #[error("Unknown neighbor: {0}")]
    UnknownNeighbor(Ipv4Addr),

    #[error("Unknown interface index: {0}")]
    UnknownInterface(u32),

    #[error("Retransmission limit reached for {neighbor} after {attempts} attempts")]
    RetransmitLimit { neighbor: Ipv4Addr, attempts: u32 },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Logging setup error: {0}")]
    LoggingError(String),
}

/// Type alias for Results using RtpError
pub type Result<T> = std::result::Result<T, RtpError>;
