//! # eigrp-rtp
//!
//! Reliable transport core for the Query, Reply and SIA-Query packets of an
//! EIGRP routing daemon.
//!
//! The crate builds MTU-bounded packets for diffusing computations, fans them
//! out to every up neighbor through per-neighbor retransmission queues, and
//! decodes received packets into events for the DUAL finite-state machine.
//! Sockets, Hello/Ack processing, the Update sender, route filters and DUAL
//! itself are supplied by the daemon through [`ProtocolHooks`].
//!
//! ## Modules
//! - [`core`]: header, TLVs, checksum and digest, packet builder
//! - [`protocol`]: process context, topology table, send and receive paths
//! - [`config`]: TOML configuration with validation
//! - [`utils`]: logging setup and packet counters
//!
//! ## Example
//! ```no_run
//! use eigrp_rtp::{config::RtpConfig, Process};
//!
//! # fn main() -> eigrp_rtp::Result<()> {
//! let config = RtpConfig::from_file("eigrp.toml")?;
//! eigrp_rtp::utils::logging::init(&config.logging)?;
//! let mut process = Process::from_config(&config)?;
//! # let _ = &mut process;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod utils;

pub use crate::core::header::{Opcode, PacketHeader};
pub use crate::core::packet::{AuthKey, Envelope};
pub use crate::core::tlv::{Metric, RouteRecord, MAX_METRIC};
pub use error::{Result, RtpError};
pub use protocol::{
    FilterDirection, FsmEvent, Neighbor, NeighborId, NeighborState, Process, ProtocolHooks,
    Transport,
};
