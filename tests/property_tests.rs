//! Property-based tests for the SDN-WISE packet codec.
//!
//! Uses proptest to verify codec invariants across the input space.

use proptest::prelude::*;
use sdnwise_core::{Controller, HEADER_SIZE, MAX_PAYLOAD, PacketVerdict, WisePacket};

proptest! {
    /// Round trip: any packet whose payload fits the length byte decodes
    /// back to itself.
    #[test]
    fn packet_roundtrip(
        net_id in any::<u8>(),
        dst in any::<u16>(),
        src in any::<u16>(),
        typ in any::<u8>(),
        ttl in any::<u8>(),
        nxh in any::<u16>(),
        payload in proptest::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD),
    ) {
        let packet = WisePacket { net_id, dst, src, typ, ttl, nxh, payload };
        let encoded = packet.encode().unwrap();

        prop_assert_eq!(encoded.len(), HEADER_SIZE + packet.payload.len());
        prop_assert_eq!(encoded[1] as usize, encoded.len());
        prop_assert_eq!(WisePacket::decode(&encoded).unwrap(), packet);
    }

    /// Any buffer shorter than the header is rejected, never mis-parsed.
    #[test]
    fn short_buffers_rejected(data in proptest::collection::vec(any::<u8>(), 0..HEADER_SIZE)) {
        prop_assert!(WisePacket::decode(&data).is_err());
    }

    /// Decode never panics on arbitrary bytes, whatever the length byte
    /// claims, and the payload never exceeds what the buffer holds.
    #[test]
    fn decode_never_panics(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        if let Ok(packet) = WisePacket::decode(&data) {
            // Payload begins at offset ten, right after the nxh field.
            prop_assert!(packet.payload.len() <= data.len() - (HEADER_SIZE - 1));
            prop_assert!(packet.payload.len() <= MAX_PAYLOAD);
        } else {
            prop_assert!(data.len() < HEADER_SIZE);
        }
    }

    /// The controller survives arbitrary datagrams: any input produces a
    /// verdict, and malformed ones leave no trace in the registry.
    #[test]
    fn controller_handles_arbitrary_datagrams(data in proptest::collection::vec(any::<u8>(), 0..64)) {
        let controller = Controller::with_defaults();
        let verdict = controller.handle_raw(&data, 1_000);

        if data.len() < HEADER_SIZE {
            prop_assert_eq!(verdict, PacketVerdict::Dropped);
            prop_assert!(controller.topology().nodes.is_empty());
        } else {
            // Header decoded: the source node was accounted, whatever
            // the rest of the packet looked like.
            prop_assert_eq!(controller.topology().nodes.len(), 1);
        }
    }
}
