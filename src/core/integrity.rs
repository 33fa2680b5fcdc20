//! Packet checksum and keyed MD5 digest.

use crate::core::tlv::MD5_DIGEST_LEN;
use md5::{Digest, Md5};

/// Length the authentication key is padded or truncated to
pub const MD5_KEY_LEN: usize = 16;

/// Standard one's-complement 16-bit Internet checksum (RFC 1071)
pub fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for pair in &mut chunks {
        sum += u16::from_be_bytes([pair[0], pair[1]]) as u32;
    }
    if let [last] = chunks.remainder() {
        sum += (*last as u32) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// Keyed MD5 over `key(16, zero padded) || region`
pub fn md5_digest(key: &[u8], region: &[u8]) -> [u8; MD5_DIGEST_LEN] {
    let mut padded = [0u8; MD5_KEY_LEN];
    let n = key.len().min(MD5_KEY_LEN);
    padded[..n].copy_from_slice(&key[..n]);

    let mut hasher = Md5::new();
    hasher.update(padded);
    hasher.update(region);

    let mut digest = [0u8; MD5_DIGEST_LEN];
    digest.copy_from_slice(&hasher.finalize());
    digest
}
