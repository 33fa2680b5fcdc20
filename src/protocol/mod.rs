//! # Query/Reply Transport
//!
//! Routing process state and the reliable send and receive paths for
//! Query, Reply and SIA-Query packets.
//!
//! ## Components
//! - **Process**: context owning interfaces, topology table and sequence counter
//! - **Topology**: prefix and route descriptors with pending-work flags
//! - **Neighbor / Retransmission queue**: per-neighbor reliable delivery
//! - **Sender**: MTU-bounded Query flood, Reply and SIA-Query
//! - **Receiver / Dispatcher**: decode loop and raw packet routing
//! - **FSM bridge**: one DUAL event per decoded route record
//! - **Hooks**: collaborator traits supplied by the daemon
//!
//! ## Model
//! Single-threaded and event driven. Nothing here blocks; timers and socket
//! readiness are owned by the caller, which invokes the entry points on
//! [`Process`](process::Process).

pub mod dispatcher;
pub mod fsm;
pub mod hooks;
pub mod interface;
pub mod neighbor;
pub mod process;
pub mod receiver;
pub mod retrans;
pub mod sender;
pub mod topology;


pub use fsm::{DataType, FsmEvent};
pub use hooks::{FilterDirection, ProtocolHooks, Transport};
pub use interface::Interface;
pub use neighbor::{Neighbor, NeighborId, NeighborState};
pub use process::Process;
pub use receiver::ReceiveSummary;
pub use sender::FloodReport;
pub use topology::{PrefixDescriptor, RequiredAction, RouteDescriptor, TopologyTable};
