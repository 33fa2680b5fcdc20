//! # Wire Layer
//!
//! Packet header, TLV encoding, integrity checks and packet construction.
//!
//! ## Components
//! - **Header**: fixed 20-byte header and opcodes
//! - **TLV**: route and authentication records, forward-only TLV reader
//! - **Integrity**: Internet checksum and keyed MD5 digest
//! - **Codec**: per-neighbor route TLV encoder/decoder selection
//! - **Packet**: MTU-bounded builder and the queued envelope
//!
//! ## Wire Format
//! ```text
//! [Header(20)] [Auth TLV(40), optional] [Route TLV]...
//! ```

pub mod codec;
pub mod header;
pub mod integrity;
pub mod packet;
pub mod tlv;
