//! Fixed-size onion packet codec: wrap (sender) and unwrap (per hop).
//!
//! Every packet on the wire is exactly [`PACKET_SIZE`] bytes at every hop.
//! Each layer's plaintext shrinks by exactly [`OVERHEAD_PER_HOP`] bytes
//! going inward (one fewer layer's `routing_info` plus that layer's own
//! nonce+tag), so the nested ciphertexts telescope to fit the fixed budget
//! exactly — only the *outermost* layer fills the full 1016-byte encrypted
//! region; every layer peeled afterward reveals a smaller "real" region,
//! and the forwarding hop pads it back out to 1016 bytes with fresh random
//! filler before retransmitting. The filler is never authenticated and
//! never trusted by the next hop — it is regenerated at every hop and
//! discarded once that hop's own real-region length (computed from
//! `hop_count`/`layer_index`, which are themselves AD-bound) is known.

use anemochory_core::{
    AnemochoryError, NodeId, Result, SessionId, ENCRYPTED_PAYLOAD_SIZE, HEADER_SIZE, MAX_HOPS,
    MIN_HOPS, NONCE_SIZE, PACKET_SIZE, ROUTING_INFO_SIZE, TAG_SIZE,
};

use crate::aead::{open, seal, Nonce};
use crate::key::SessionKey;
use crate::padding::{pad, unpad};

/// Bytes each additional wrapped layer consumes from the fixed budget:
/// one `routing_info` block plus one AEAD nonce and tag.
const OVERHEAD_PER_HOP: usize = ROUTING_INFO_SIZE + NONCE_SIZE + TAG_SIZE;

/// Unencrypted 8-byte packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub hop_count: u8,
    pub layer_index: u8,
    pub flags: u8,
    pub timestamp: u32,
}

const FLAG_FINAL_PAYLOAD: u8 = 0b0000_0001;

impl Header {
    fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0] = self.version;
        out[1] = self.hop_count;
        out[2] = self.layer_index;
        out[3] = self.flags;
        out[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != HEADER_SIZE {
            return Err(AnemochoryError::FormatViolation);
        }
        Ok(Self {
            version: bytes[0],
            hop_count: bytes[1],
            layer_index: bytes[2],
            flags: bytes[3],
            timestamp: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
    }

    /// The 6-byte associated data bound to this layer's AEAD tag.
    fn associated_data(&self) -> [u8; 6] {
        let mut ad = [0u8; 6];
        ad[0] = self.layer_index;
        ad[1] = self.hop_count;
        ad[2..6].copy_from_slice(&self.timestamp.to_be_bytes());
        ad
    }

    fn is_final_payload(&self) -> bool {
        self.flags & FLAG_FINAL_PAYLOAD != 0
    }
}

/// Per-layer routing metadata, 56 bytes on the wire. The trailing 12 bytes
/// are reserved and always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingInfo {
    pub next_hop_addr: [u8; 16],
    pub next_hop_port: u16,
    pub sequence_number: u64,
    pub session_id: SessionId,
    pub padding_length: u16,
}

impl RoutingInfo {
    fn encode(&self) -> [u8; ROUTING_INFO_SIZE] {
        let mut out = [0u8; ROUTING_INFO_SIZE];
        out[0..16].copy_from_slice(&self.next_hop_addr);
        out[16..18].copy_from_slice(&self.next_hop_port.to_be_bytes());
        out[18..26].copy_from_slice(&self.sequence_number.to_be_bytes());
        out[26..42].copy_from_slice(self.session_id.as_bytes());
        out[42..44].copy_from_slice(&self.padding_length.to_be_bytes());
        // out[44..56] stays reserved/zero.
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ROUTING_INFO_SIZE {
            return Err(AnemochoryError::FormatViolation);
        }
        let mut next_hop_addr = [0u8; 16];
        next_hop_addr.copy_from_slice(&bytes[0..16]);
        let mut session_id_bytes = [0u8; 16];
        session_id_bytes.copy_from_slice(&bytes[26..42]);
        Ok(Self {
            next_hop_addr,
            next_hop_port: u16::from_be_bytes([bytes[16], bytes[17]]),
            sequence_number: u64::from_be_bytes(bytes[18..26].try_into().unwrap()),
            session_id: SessionId::from_bytes(session_id_bytes),
            padding_length: u16::from_be_bytes([bytes[42], bytes[43]]),
        })
    }
}

/// One hop's key and address, supplied in sender-to-destination order.
pub struct HopSpec<'a> {
    pub node_id: NodeId,
    pub key: &'a SessionKey,
    pub addr: [u8; 16],
    pub port: u16,
    pub session_id: SessionId,
}

/// The real (non-filler) region length of the 1016-byte encrypted-payload
/// field at the given depth, where `depth = hop_count - layer_index` is
/// the number of layers already peeled (0 at the outermost/untouched
/// packet).
fn real_region_len(depth: usize) -> usize {
    ENCRYPTED_PAYLOAD_SIZE - OVERHEAD_PER_HOP * depth
}

/// Builds an N-hop onion packet carrying `payload`, addressed through
/// `hops` in sender-to-exit order.
///
/// `sequence_number` is threaded unchanged into every layer's
/// `routing_info` — it identifies this packet within the session, not this
/// layer within the packet.
pub fn wrap_packet(
    payload: &[u8],
    hops: &[HopSpec<'_>],
    timestamp: u32,
    sequence_number: u64,
    mut nonce_is_fresh: impl FnMut(&Nonce) -> bool,
) -> Result<[u8; PACKET_SIZE]> {
    let n = hops.len();
    if n < MIN_HOPS as usize || n > MAX_HOPS as usize {
        return Err(AnemochoryError::FormatViolation);
    }

    let capacity = anemochory_core::payload_capacity(n as u8);
    if payload.len() > capacity {
        return Err(AnemochoryError::FormatViolation);
    }

    // Build from innermost (i = 1, the exit) outward to i = N (the entry).
    // `carry` holds the full nested ciphertext built so far; it becomes
    // the `inner` content of the next-outward layer's plaintext.
    let mut carry: Vec<u8> = {
        let inner = pad(payload, capacity)?;
        let routing_info = RoutingInfo {
            next_hop_addr: [0u8; 16],
            next_hop_port: 0,
            sequence_number,
            session_id: hops[n - 1].session_id,
            padding_length: (capacity - payload.len()) as u16,
        };
        let mut plaintext = Vec::with_capacity(ROUTING_INFO_SIZE + inner.len());
        plaintext.extend_from_slice(&routing_info.encode());
        plaintext.extend_from_slice(&inner);

        let header = Header {
            version: anemochory_core::PROTOCOL_VERSION,
            hop_count: n as u8,
            layer_index: 1,
            flags: FLAG_FINAL_PAYLOAD,
            timestamp,
        };
        let ad = header.associated_data();
        let (nonce, ct) = seal(hops[n - 1].key, &plaintext, &ad, &mut nonce_is_fresh)?;
        let mut encrypted_payload = Vec::with_capacity(NONCE_SIZE + ct.len());
        encrypted_payload.extend_from_slice(&nonce);
        encrypted_payload.extend_from_slice(&ct);
        encrypted_payload
    };

    for i in 2..=n {
        let hop_idx = n - i; // index into `hops` for layer i
        let next_hop_idx = hop_idx + 1; // the hop this layer forwards to
        let routing_info = RoutingInfo {
            next_hop_addr: hops[next_hop_idx].addr,
            next_hop_port: hops[next_hop_idx].port,
            sequence_number,
            session_id: hops[hop_idx].session_id,
            padding_length: 0,
        };
        let mut plaintext = Vec::with_capacity(ROUTING_INFO_SIZE + carry.len());
        plaintext.extend_from_slice(&routing_info.encode());
        plaintext.extend_from_slice(&carry);

        let header = Header {
            version: anemochory_core::PROTOCOL_VERSION,
            hop_count: n as u8,
            layer_index: i as u8,
            flags: 0,
            timestamp,
        };
        let ad = header.associated_data();
        let (nonce, ct) = seal(hops[hop_idx].key, &plaintext, &ad, &mut nonce_is_fresh)?;
        let mut encrypted_payload = Vec::with_capacity(NONCE_SIZE + ct.len());
        encrypted_payload.extend_from_slice(&nonce);
        encrypted_payload.extend_from_slice(&ct);
        carry = encrypted_payload;
    }

    if carry.len() != ENCRYPTED_PAYLOAD_SIZE {
        // The telescoping construction guarantees this; a mismatch means a
        // constant drifted out of sync with the wire-format invariants.
        panic!("outermost onion layer did not fill the fixed packet size");
    }

    let header = Header {
        version: anemochory_core::PROTOCOL_VERSION,
        hop_count: n as u8,
        layer_index: n as u8,
        flags: 0,
        timestamp,
    };
    let mut packet = [0u8; PACKET_SIZE];
    packet[0..HEADER_SIZE].copy_from_slice(&header.encode());
    packet[HEADER_SIZE..].copy_from_slice(&carry);
    Ok(packet)
}

/// The result of peeling one layer off a packet.
pub enum UnwrapOutcome {
    /// This hop is not the exit; forward the reconstructed packet.
    Forward {
        packet: [u8; PACKET_SIZE],
        next_hop_addr: [u8; 16],
        next_hop_port: u16,
    },
    /// This hop is the exit; the payload is ready for delivery.
    Deliver { payload: Vec<u8> },
}

/// A borrowed view over an on-wire packet, exposing the parsed header
/// without copying the encrypted region.
pub struct PacketView<'a> {
    pub header: Header,
    encrypted_payload: &'a [u8],
}

impl<'a> PacketView<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() != PACKET_SIZE {
            return Err(AnemochoryError::FormatViolation);
        }
        let header = Header::decode(&bytes[0..HEADER_SIZE])?;
        if header.version != anemochory_core::PROTOCOL_VERSION {
            return Err(AnemochoryError::FormatViolation);
        }
        if header.hop_count < MIN_HOPS || header.hop_count > MAX_HOPS {
            return Err(AnemochoryError::FormatViolation);
        }
        if header.layer_index == 0 || header.layer_index > header.hop_count {
            return Err(AnemochoryError::FormatViolation);
        }
        Ok(Self {
            header,
            encrypted_payload: &bytes[HEADER_SIZE..],
        })
    }

    /// The AEAD nonce this hop will use to open its layer. Unlike the
    /// ciphertext it guards, the nonce is plaintext on the wire, so callers
    /// can check it against a replay cache before spending a decryption on
    /// a packet that's already known-replayed.
    pub fn nonce(&self) -> Result<Nonce> {
        let depth = (self.header.hop_count - self.header.layer_index) as usize;
        let real_len = real_region_len(depth);
        if real_len < NONCE_SIZE + TAG_SIZE || real_len > self.encrypted_payload.len() {
            return Err(AnemochoryError::FormatViolation);
        }
        self.encrypted_payload[..NONCE_SIZE]
            .try_into()
            .map_err(|_| AnemochoryError::FormatViolation)
    }
}

/// Peels one layer off `packet` using `key`, the layer key bound to this
/// hop's session. Sequence and nonce checks are the caller's
/// responsibility (`anemochory-session`); this function performs only the
/// cryptographic unwrap and structural validation described in spec.md
/// §4.2 steps 1, 3–5, 8–9 (freshness and replay are steps 2, 6–7).
pub fn unwrap_packet(packet: &[u8], key: &SessionKey) -> Result<(RoutingInfo, UnwrapOutcome)> {
    let view = PacketView::parse(packet)?;
    let header = view.header;
    let depth = (header.hop_count - header.layer_index) as usize;
    let real_len = real_region_len(depth);
    if real_len < NONCE_SIZE + TAG_SIZE || real_len > view.encrypted_payload.len() {
        return Err(AnemochoryError::FormatViolation);
    }

    let real_region = &view.encrypted_payload[..real_len];
    let nonce: Nonce = real_region[..NONCE_SIZE]
        .try_into()
        .map_err(|_| AnemochoryError::FormatViolation)?;
    let ciphertext_and_tag = &real_region[NONCE_SIZE..];

    let ad = header.associated_data();
    let plaintext = open(key, &nonce, ciphertext_and_tag, &ad)?;

    if plaintext.len() < ROUTING_INFO_SIZE {
        return Err(AnemochoryError::FormatViolation);
    }
    let routing_info = RoutingInfo::decode(&plaintext[..ROUTING_INFO_SIZE])?;
    let remainder = &plaintext[ROUTING_INFO_SIZE..];

    if header.is_final_payload() {
        if header.layer_index != 1 {
            return Err(AnemochoryError::FormatViolation);
        }
        let payload = unpad(remainder)?;
        return Ok((routing_info, UnwrapOutcome::Deliver { payload }));
    }

    if header.layer_index == 1 {
        return Err(AnemochoryError::FormatViolation);
    }

    let forwarded_header = Header {
        version: header.version,
        hop_count: header.hop_count,
        layer_index: header.layer_index - 1,
        flags: header.flags,
        timestamp: header.timestamp,
    };

    let filler_len = ENCRYPTED_PAYLOAD_SIZE - remainder.len();
    let mut encrypted_payload = vec![0u8; ENCRYPTED_PAYLOAD_SIZE];
    encrypted_payload[..remainder.len()].copy_from_slice(remainder);
    if filler_len > 0 {
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut encrypted_payload[remainder.len()..]);
    }

    let mut packet_out = [0u8; PACKET_SIZE];
    packet_out[0..HEADER_SIZE].copy_from_slice(&forwarded_header.encode());
    packet_out[HEADER_SIZE..].copy_from_slice(&encrypted_payload);

    if packet_out.len() != PACKET_SIZE {
        return Err(AnemochoryError::FormatViolation);
    }

    Ok((
        routing_info,
        UnwrapOutcome::Forward {
            packet: packet_out,
            next_hop_addr: routing_info.next_hop_addr,
            next_hop_port: routing_info.next_hop_port,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anemochory_core::SessionId;

    fn hop(seed: u8, addr_byte: u8, port: u16) -> (SessionKey, [u8; 16], u16) {
        (SessionKey::from_bytes([seed; 32]), [addr_byte; 16], port)
    }

    fn build_hops<'a>(keys: &'a [SessionKey], addrs: &[([u8; 16], u16)]) -> Vec<HopSpec<'a>> {
        keys.iter()
            .zip(addrs.iter())
            .enumerate()
            .map(|(i, (key, (addr, port)))| HopSpec {
                node_id: anemochory_core::NodeId::from_bytes([i as u8; 32]),
                key,
                addr: *addr,
                port: *port,
                session_id: SessionId::from_bytes([0xAA; 16]),
            })
            .collect()
    }

    #[test]
    fn three_hop_round_trip_delivers_payload() {
        let (k1, a1, p1) = hop(1, 1, 1001);
        let (k2, a2, p2) = hop(2, 2, 1002);
        let (k3, a3, p3) = hop(3, 3, 1003);
        let keys = vec![k1, k2, k3];
        let hops = build_hops(&keys, &[(a1, p1), (a2, p2), (a3, p3)]);

        let payload = b"hello";
        let packet = wrap_packet(payload, &hops, 1_000_000, 42, |_| true).unwrap();
        assert_eq!(packet.len(), PACKET_SIZE);

        let view = PacketView::parse(&packet).unwrap();
        assert_eq!(view.header.layer_index, 3);
        assert_eq!(view.header.hop_count, 3);

        // Hop 0 (entry) peels layer 3.
        let (_, outcome) = unwrap_packet(&packet, hops[0].key).unwrap();
        let packet = match outcome {
            UnwrapOutcome::Forward { packet, .. } => packet,
            UnwrapOutcome::Deliver { .. } => panic!("expected forward at entry"),
        };
        assert_eq!(PacketView::parse(&packet).unwrap().header.layer_index, 2);

        // Hop 1 (middle relay) peels layer 2.
        let (_, outcome) = unwrap_packet(&packet, hops[1].key).unwrap();
        let packet = match outcome {
            UnwrapOutcome::Forward { packet, .. } => packet,
            UnwrapOutcome::Deliver { .. } => panic!("expected forward at middle hop"),
        };
        assert_eq!(PacketView::parse(&packet).unwrap().header.layer_index, 1);

        // Hop 2 (exit) peels layer 1 and delivers.
        let (_, outcome) = unwrap_packet(&packet, hops[2].key).unwrap();
        match outcome {
            UnwrapOutcome::Deliver { payload: delivered } => assert_eq!(delivered, payload),
            UnwrapOutcome::Forward { .. } => panic!("expected delivery at exit"),
        }
    }

    #[test]
    fn every_intermediate_packet_is_exactly_packet_size() {
        let (k1, a1, p1) = hop(1, 1, 1001);
        let (k2, a2, p2) = hop(2, 2, 1002);
        let (k3, a3, p3) = hop(3, 3, 1003);
        let (k4, a4, p4) = hop(4, 4, 1004);
        let keys = vec![k1, k2, k3, k4];
        let hops = build_hops(&keys, &[(a1, p1), (a2, p2), (a3, p3), (a4, p4)]);

        let mut packet = wrap_packet(b"x", &hops, 1, 7, |_| true).unwrap();
        for hop in &hops {
            assert_eq!(packet.len(), PACKET_SIZE);
            let (_, outcome) = unwrap_packet(&packet, hop.key).unwrap();
            match outcome {
                UnwrapOutcome::Forward { packet: next, .. } => packet = next,
                UnwrapOutcome::Deliver { .. } => break,
            }
        }
    }

    #[test]
    fn tampering_encrypted_region_causes_auth_failure() {
        let (k1, a1, p1) = hop(1, 1, 1001);
        let (k2, a2, p2) = hop(2, 2, 1002);
        let (k3, a3, p3) = hop(3, 3, 1003);
        let keys = vec![k1, k2, k3];
        let hops = build_hops(&keys, &[(a1, p1), (a2, p2), (a3, p3)]);

        let mut packet = wrap_packet(b"hello", &hops, 1, 1, |_| true).unwrap();
        packet[50] ^= 0xff; // inside the encrypted region

        let err = unwrap_packet(&packet, hops[0].key).unwrap_err();
        assert_eq!(err, AnemochoryError::AuthFailure);
    }

    #[test]
    fn tampering_layer_index_breaks_associated_data_binding() {
        let (k1, a1, p1) = hop(1, 1, 1001);
        let (k2, a2, p2) = hop(2, 2, 1002);
        let (k3, a3, p3) = hop(3, 3, 1003);
        let keys = vec![k1, k2, k3];
        let hops = build_hops(&keys, &[(a1, p1), (a2, p2), (a3, p3)]);

        let mut packet = wrap_packet(b"hello", &hops, 1, 1, |_| true).unwrap();
        packet[2] -= 1; // decrement on-wire layer_index

        let err = unwrap_packet(&packet, hops[0].key).unwrap_err();
        assert_eq!(err, AnemochoryError::AuthFailure);
    }

    #[test]
    fn oversized_payload_is_rejected_at_wrap() {
        let (k1, a1, p1) = hop(1, 1, 1001);
        let (k2, a2, p2) = hop(2, 2, 1002);
        let (k3, a3, p3) = hop(3, 3, 1003);
        let keys = vec![k1, k2, k3];
        let hops = build_hops(&keys, &[(a1, p1), (a2, p2), (a3, p3)]);

        let capacity = anemochory_core::payload_capacity(3);
        let too_big = vec![0u8; capacity + 1];
        let err = wrap_packet(&too_big, &hops, 1, 1, |_| true).unwrap_err();
        assert_eq!(err, AnemochoryError::FormatViolation);
    }

    #[test]
    fn packet_view_nonce_matches_the_nonce_unwrap_actually_uses() {
        let (k1, a1, p1) = hop(1, 1, 1001);
        let (k2, a2, p2) = hop(2, 2, 1002);
        let (k3, a3, p3) = hop(3, 3, 1003);
        let keys = vec![k1, k2, k3];
        let hops = build_hops(&keys, &[(a1, p1), (a2, p2), (a3, p3)]);

        let packet = wrap_packet(b"hello", &hops, 1, 1, |_| true).unwrap();
        let view = PacketView::parse(&packet).unwrap();
        let nonce = view.nonce().unwrap();

        let depth = (view.header.hop_count - view.header.layer_index) as usize;
        let real_len = real_region_len(depth);
        let expected = &packet[HEADER_SIZE..HEADER_SIZE + NONCE_SIZE];
        assert_eq!(&nonce[..], expected);
        assert!(real_len <= ENCRYPTED_PAYLOAD_SIZE);
    }

    #[test]
    fn wrong_key_at_a_hop_fails_without_exposing_routing() {
        let (k1, a1, p1) = hop(1, 1, 1001);
        let (k2, a2, p2) = hop(2, 2, 1002);
        let (k3, a3, p3) = hop(3, 3, 1003);
        let keys = vec![k1, k2, k3];
        let hops = build_hops(&keys, &[(a1, p1), (a2, p2), (a3, p3)]);

        let packet = wrap_packet(b"hello", &hops, 1, 1, |_| true).unwrap();
        let wrong_key = SessionKey::from_bytes([0xEE; 32]);
        let err = unwrap_packet(&packet, &wrong_key).unwrap_err();
        assert_eq!(err, AnemochoryError::AuthFailure);
    }
}
