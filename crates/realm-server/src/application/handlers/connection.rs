//! `NetPing`: the client reports its measured round trip.  Nothing is sent back.

use realm_core::protocol::client_packets::NetPing;
use tracing::debug;

use crate::application::session::Session;

pub(super) fn execute_ping(session: &Session, ping: NetPing) {
    session.record_ping(ping.ping_ms);
    debug!(
        session = %session.id(),
        request_id = ping.request_id,
        ping_ms = ping.ping_ms,
        "net ping"
    );
}
