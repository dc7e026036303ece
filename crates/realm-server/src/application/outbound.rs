//! Outbound packet pipeline: serializes queued packets into wire frames.

use realm_core::{encode_frame, PacketRegistry, PacketWriter, ProtocolError, ServerPacket};
use tracing::error;

use crate::application::session::Session;

/// Serializes one packet as a complete frame: `[length][wire id][payload]`.
///
/// # Errors
///
/// Returns [`ProtocolError::UnregisteredPacket`] if the registry has no wire id
/// for the packet, and [`ProtocolError::OversizedFrame`] if it does not fit in
/// a frame.
pub fn encode_packet(registry: &PacketRegistry, packet: &ServerPacket) -> Result<Vec<u8>, ProtocolError> {
    let wire = registry
        .wire_of(packet.id())
        .ok_or_else(|| ProtocolError::UnregisteredPacket(format!("{:?}", packet.id())))?;
    let mut w = PacketWriter::with_capacity(64);
    wire.write(&mut w);
    packet.encode_payload(&mut w);
    encode_frame(w.as_slice())
}

/// Pops everything queued on `session` and returns the encoded frames in
/// enqueue order.  Packets that cannot be encoded are logged and skipped.
pub fn drain(session: &Session, registry: &PacketRegistry) -> Vec<Vec<u8>> {
    session
        .take_pending()
        .into_iter()
        .filter_map(|packet| match encode_packet(registry, &packet) {
            Ok(frame) => Some(frame),
            Err(e) => {
                error!(session = %session.id(), packet = ?packet.id(), "dropping outbound packet: {e}");
                None
            }
        })
        .collect()
}
