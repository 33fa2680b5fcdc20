#![no_main]

use bytes::Bytes;
use eigrp_rtp::core::codec::CodecKind;
use eigrp_rtp::core::tlv::TlvReader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Decode loop must terminate and never read past the region
    let codec = CodecKind::Ipv4Internal.codec();
    let mut reader = TlvReader::new(Bytes::copy_from_slice(data));
    while let Some(result) = codec.decode_route(&mut reader) {
        assert!(reader.position() <= data.len());
        if result.is_err() {
            assert!(reader.is_exhausted());
        }
    }
});
