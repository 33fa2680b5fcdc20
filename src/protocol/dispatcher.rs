use crate::core::header::{Opcode, PacketHeader};
use crate::core::packet::verify;
use crate::error::{constants, Result, RtpError};
use crate::protocol::hooks::ProtocolHooks;
use crate::protocol::process::Process;
use crate::protocol::receiver::ReceiveSummary;
use bytes::Bytes;
use std::net::Ipv4Addr;
use tracing::{trace, warn};

/// Receive path a packet is routed to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Route {
    Query,
    Reply,
    SiaQuery,
}

/// Opcodes this core handles. Hello, Update and the rest belong to other subsystems.
#[inline]
fn route_for(opcode: Opcode) -> Option<Route> {
    match opcode {
        Opcode::Query => Some(Route::Query),
        Opcode::Reply => Some(Route::Reply),
        Opcode::SiaQuery => Some(Route::SiaQuery),
        _ => None,
    }
}

impl Process {
    /// Entry point for a raw packet received on `ifindex` from `source`.
    ///
    /// Checks the header, AS number, checksum and (when the interface is
    /// keyed) the digest, consumes the piggybacked acknowledgement, then hands
    /// the TLV region to the matching receive handler.
    pub fn receive_packet<H: ProtocolHooks + ?Sized>(
        &mut self,
        ifindex: u32,
        source: Ipv4Addr,
        packet: Bytes,
        hooks: &mut H,
    ) -> Result<ReceiveSummary> {
        let pos = self.interface_position(ifindex)?;

        let mut body = packet.clone();
        let header = PacketHeader::decode(&mut body)?;
        if header.asn != self.asn() {
            return Err(RtpError::AsMismatch {
                expected: self.asn(),
                received: header.asn,
            });
        }
        let Some(route) = route_for(header.opcode) else {
            trace!(opcode = %header.opcode, source = %source, "{}", constants::ERR_UNEXPECTED_OPCODE);
            return Err(RtpError::UnexpectedOpcode(header.opcode as u8));
        };

        let iface = &mut self.interfaces[pos];
        if let Err(e) = verify(&packet, iface.auth()) {
            warn!(
                interface = iface.name(),
                source = %source,
                opcode = %header.opcode,
                error = %e,
                "Dropping packet that failed verification"
            );
            iface.counters().decode_error();
            return Err(e);
        }

        let neighbor = iface.neighbor_get_or_insert(source);
        if header.ack != 0 {
            neighbor.handle_ack(header.ack, hooks);
        }
        let id = neighbor.id();

        match route {
            Route::Query => self.handle_query(id, &header, body, hooks),
            Route::Reply => self.handle_reply(ifindex, source, &header, body, hooks),
            Route::SiaQuery => self.handle_sia_query(id, &header, body, hooks),
        }
    }
}
