//! Packet encoding and decoding for the SDN-WISE wire protocol.
//!
//! Every packet carries ten header field bytes followed by a variable
//! payload. All multi-byte fields are big-endian (network byte order):
//!
//! ```text
//! netId(1) | len(1) | dst(2) | src(2) | typ(1) | ttl(1) | nxh(2) | payload(len-11) | slack(1)
//! ```
//!
//! The payload starts right after `nxh`, at offset ten. `len` nonetheless
//! counts an 11-byte header: deployed encoders size their buffer as
//! `11 + payload` and leave the eleventh byte as zero-valued slack at the
//! very end. Encode reproduces that trailing byte; decode ignores it. The
//! payload occupies `len - 11` bytes and tops out at 244.

use crate::error::PacketError;
use crate::{HEADER_SIZE, MAX_PAYLOAD};

/// Offset of the first payload byte, right after the `nxh` field.
const PAYLOAD_OFFSET: usize = HEADER_SIZE - 1;

/// Packet types as defined by the controller side of the protocol.
///
/// Sensor firmware historically shipped a divergent FLOW_RULE layout with
/// extra fixed fields at header offsets 7-9. This enumeration is canonical
/// for the controller; reconciling the two ends is an open interoperability
/// question tracked outside the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Sensor data to be forwarded or processed at the controller
    Data = 0,
    /// Node configuration report (type, battery)
    Config = 1,
    /// Flow rule installation acknowledgment
    FlowRule = 2,
    /// Neighbor list report
    Topology = 3,
    /// Node statistics report
    Stats = 4,
}

impl TryFrom<u8> for PacketType {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Data),
            1 => Ok(Self::Config),
            2 => Ok(Self::FlowRule),
            3 => Ok(Self::Topology),
            4 => Ok(Self::Stats),
            _ => Err(PacketError::UnknownType(value)),
        }
    }
}

/// A decoded SDN-WISE packet.
///
/// The wire `len` field is not stored; it is recomputed from the payload
/// on every encode, so a mutated payload can never ship a stale length.
/// The raw `typ` byte is kept as-is so liveness and stats bookkeeping
/// still happen for packets of a type this controller does not know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WisePacket {
    /// Network identifier
    pub net_id: u8,
    /// Destination node address
    pub dst: u16,
    /// Source node address
    pub src: u16,
    /// Raw packet type byte
    pub typ: u8,
    /// Time-to-live hop counter
    pub ttl: u8,
    /// Next hop address
    pub nxh: u16,
    /// Payload bytes
    pub payload: Vec<u8>,
}

impl WisePacket {
    /// Decode a packet from raw bytes.
    ///
    /// Fails if the buffer cannot hold the fixed header. If the buffer is
    /// shorter than the declared `len`, the payload is truncated to what
    /// is available; bytes beyond `len` are ignored.
    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() < HEADER_SIZE {
            return Err(PacketError::TooShort {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }

        let declared = (data[1] as usize).saturating_sub(HEADER_SIZE);
        let available = data.len() - PAYLOAD_OFFSET;
        let payload_len = declared.min(available);

        Ok(Self {
            net_id: data[0],
            dst: u16::from_be_bytes([data[2], data[3]]),
            src: u16::from_be_bytes([data[4], data[5]]),
            typ: data[6],
            ttl: data[7],
            nxh: u16::from_be_bytes([data[8], data[9]]),
            payload: data[PAYLOAD_OFFSET..PAYLOAD_OFFSET + payload_len].to_vec(),
        })
    }

    /// Encode the packet into a wire buffer, recomputing `len`.
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        if self.payload.len() > MAX_PAYLOAD {
            return Err(PacketError::PayloadTooLarge(self.payload.len()));
        }

        let total = HEADER_SIZE + self.payload.len();
        let mut buf = Vec::with_capacity(total);
        buf.push(self.net_id);
        buf.push(total as u8);
        buf.extend_from_slice(&self.dst.to_be_bytes());
        buf.extend_from_slice(&self.src.to_be_bytes());
        buf.push(self.typ);
        buf.push(self.ttl);
        buf.extend_from_slice(&self.nxh.to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf.push(0); // Trailing slack byte counted by len
        Ok(buf)
    }

    /// The packet type, if this controller recognizes the `typ` byte.
    pub fn packet_type(&self) -> Result<PacketType, PacketError> {
        PacketType::try_from(self.typ)
    }
}

impl std::fmt::Display for WisePacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "WisePacket{{net={}, dst=0x{:04X}, src=0x{:04X}, typ={}, ttl={}, nxh=0x{:04X}, payload={}B}}",
            self.net_id,
            self.dst,
            self.src,
            self.typ,
            self.ttl,
            self.nxh,
            self.payload.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WisePacket {
        WisePacket {
            net_id: 1,
            dst: 0x0001,
            src: 0x0002,
            typ: PacketType::Data as u8,
            ttl: 64,
            nxh: 0x0003,
            payload: b"temp=21.5".to_vec(),
        }
    }

    #[test]
    fn test_packet_roundtrip() {
        let packet = sample();
        let bytes = packet.encode().unwrap();
        assert_eq!(bytes[1] as usize, HEADER_SIZE + packet.payload.len());
        assert_eq!(WisePacket::decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_decode_too_short() {
        for n in 0..HEADER_SIZE {
            let buf = vec![0u8; n];
            assert!(matches!(
                WisePacket::decode(&buf),
                Err(PacketError::TooShort { .. })
            ));
        }
    }

    #[test]
    fn test_decode_header_only() {
        // Slack byte at the end is not payload, whatever its value.
        let buf = [5, 11, 0, 1, 0, 2, 0, 64, 0, 3, 0xFF];
        let packet = WisePacket::decode(&buf[..11]).unwrap();
        assert_eq!(packet.net_id, 5);
        assert!(packet.payload.is_empty());
    }

    #[test]
    fn test_decode_truncated_payload() {
        // Declares 4 payload bytes but only 2 arrived.
        let mut bytes = sample().encode().unwrap();
        bytes[1] = (HEADER_SIZE + 4) as u8;
        bytes.truncate(PAYLOAD_OFFSET + 2);
        let packet = WisePacket::decode(&bytes).unwrap();
        assert_eq!(packet.payload, b"te");
    }

    #[test]
    fn test_wire_layout_matches_deployed_encoders() {
        // Byte-for-byte buffer as sensor nodes serialize it: ten header
        // field bytes, payload at offset ten, one trailing slack byte
        // counted by len. A neighbor report from node 0x0002 with two
        // neighbors must keep its count byte as payload[0].
        let bytes = [
            1, 16, 0x00, 0x00, 0x00, 0x02, 3, 10, 0x00, 0x00, 2, 0x00, 0x05, 0x00, 0x06, 0,
        ];
        let packet = WisePacket::decode(&bytes).unwrap();
        assert_eq!(packet.src, 0x0002);
        assert_eq!(packet.packet_type().unwrap(), PacketType::Topology);
        assert_eq!(packet.payload, [2, 0x00, 0x05, 0x00, 0x06]);

        // Re-encoding reproduces the exact wire bytes.
        assert_eq!(packet.encode().unwrap(), bytes);
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut bytes = sample().encode().unwrap();
        bytes.extend_from_slice(&[0xAA, 0xBB]);
        let packet = WisePacket::decode(&bytes).unwrap();
        assert_eq!(packet.payload, b"temp=21.5");
    }

    #[test]
    fn test_decode_len_below_header() {
        // A nonsense len smaller than the header yields an empty payload.
        let mut bytes = sample().encode().unwrap();
        bytes[1] = 3;
        let packet = WisePacket::decode(&bytes).unwrap();
        assert!(packet.payload.is_empty());
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let mut packet = sample();
        packet.payload = vec![0u8; MAX_PAYLOAD + 1];
        assert_eq!(
            packet.encode(),
            Err(PacketError::PayloadTooLarge(MAX_PAYLOAD + 1))
        );
    }

    #[test]
    fn test_encode_max_payload() {
        let mut packet = sample();
        packet.payload = vec![0x42; MAX_PAYLOAD];
        let bytes = packet.encode().unwrap();
        assert_eq!(bytes[1], u8::MAX);
        assert_eq!(WisePacket::decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_packet_type_mapping() {
        assert_eq!(PacketType::try_from(0).unwrap(), PacketType::Data);
        assert_eq!(PacketType::try_from(4).unwrap(), PacketType::Stats);
        assert_eq!(
            PacketType::try_from(9),
            Err(PacketError::UnknownType(9))
        );
    }
}
