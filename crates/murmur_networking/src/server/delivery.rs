//! Outbound delivery loop, one per connection.

use murmur_core::Mailbox;
use murmur_shared::{encode_message, ServerMessage};

use super::ConnectionId;
use crate::transport::FrameWriter;

/// What one delivery loop did before it stopped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Frames written.
    pub delivered: u64,
    /// Messages skipped because they failed to encode.
    pub encode_failures: u64,
    /// True if the loop stopped on a write error.
    pub write_failed: bool,
}

/// Writes mailbox messages to `writer` until the mailbox is closed and
/// drained, or a write fails.
///
/// A failed write closes the mailbox, so the world's later sends to this
/// player are discarded. The writer is closed either way.
pub fn run_delivery<W: FrameWriter>(
    connection: ConnectionId,
    mailbox: &Mailbox<ServerMessage>,
    mut writer: W,
) -> DeliveryStats {
    let mut stats = DeliveryStats::default();

    while let Some(message) = mailbox.recv() {
        let frame = match encode_message(&message) {
            Ok(frame) => frame,
            Err(e) => {
                stats.encode_failures += 1;
                tracing::warn!(%connection, error = %e, "dropping unencodable message");
                continue;
            }
        };
        if let Err(e) = writer.write_frame(frame) {
            tracing::debug!(%connection, error = %e, "write failed, closing mailbox");
            stats.write_failed = true;
            mailbox.close();
            break;
        }
        stats.delivered += 1;
    }

    writer.close();
    tracing::debug!(
        %connection,
        delivered = stats.delivered,
        dropped = mailbox.dropped(),
        "delivery stopped"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory_pair;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_millis(500);

    #[test]
    fn test_delivers_in_order_then_stops_on_close() {
        let (_reader, writer, client) = memory_pair();
        let mailbox = Mailbox::new(8);
        mailbox.send(ServerMessage::environment("one"));
        mailbox.send(ServerMessage::social("two"));
        mailbox.close();

        let stats = run_delivery(ConnectionId(1), &mailbox, writer);
        assert_eq!(stats.delivered, 2);
        assert!(!stats.write_failed);
        assert_eq!(client.recv_message(WAIT), Some(ServerMessage::environment("one")));
        assert_eq!(client.recv_message(WAIT), Some(ServerMessage::social("two")));
        assert_eq!(client.recv_message(WAIT), None);
    }

    #[test]
    fn test_write_failure_closes_mailbox() {
        let (_reader, writer, client) = memory_pair();
        client.break_writes();
        let mailbox = Mailbox::new(8);
        mailbox.send(ServerMessage::environment("lost"));

        let stats = run_delivery(ConnectionId(2), &mailbox, writer);
        assert!(stats.write_failed);
        assert_eq!(stats.delivered, 0);
        assert!(mailbox.is_closed());
        assert_eq!(
            mailbox.send(ServerMessage::environment("after")),
            murmur_core::SendOutcome::Closed
        );
    }
}
