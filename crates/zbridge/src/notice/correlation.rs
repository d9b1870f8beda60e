//! Outstanding sends awaiting a delivery report.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::transport::{CorrelationId, Notice};

use super::NOTICE_TARGET;

/// Sends accepted by the transport whose delivery report has not arrived.
///
/// Maps a correlation id to the client tag of the send that produced it.
/// Each entry is consumed by at most one delivery report.
#[derive(Debug, Default)]
pub struct PendingRequests {
    entries: HashMap<CorrelationId, String>,
}

impl PendingRequests {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an accepted send.
    pub fn insert(&mut self, tag: impl Into<String>, id: CorrelationId) {
        let tag = tag.into();
        debug!(target: NOTICE_TARGET, %id, %tag, "awaiting delivery report");
        if let Some(replaced) = self.entries.insert(id, tag) {
            warn!(
                target: NOTICE_TARGET,
                %id,
                %replaced,
                "transport reused a live correlation id; earlier send will get no result"
            );
        }
    }

    /// Removes and returns the tag of the send `notice` reports on.
    ///
    /// Only delivery reports are considered. The table is untouched when
    /// nothing matches.
    pub fn take_match(&mut self, notice: &Notice) -> Option<String> {
        if !notice.kind.is_delivery_report() {
            return None;
        }
        self.entries.remove(&notice.id)
    }

    /// Whether a send with `id` is still awaiting its report.
    #[must_use]
    pub fn contains(&self, id: CorrelationId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of outstanding sends.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no send is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddr};

    use rstest::{fixture, rstest};

    use super::*;
    use crate::transport::NoticeKind;

    fn notice(kind: NoticeKind, raw_id: u128) -> Notice {
        Notice {
            kind,
            id: CorrelationId::from_raw(raw_id),
            sender: String::from("server"),
            class: String::from("MESSAGE"),
            instance: String::from("PERSONAL"),
            recipient: String::from("bob@LOCAL"),
            opcode: String::new(),
            origin: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            time: 0,
            payload: b"SENT\0".to_vec(),
        }
    }

    #[fixture]
    fn table() -> PendingRequests {
        let mut table = PendingRequests::new();
        table.insert("t1", CorrelationId::from_raw(1));
        table.insert("t2", CorrelationId::from_raw(2));
        table
    }

    #[rstest]
    fn matching_report_is_consumed_once(mut table: PendingRequests) {
        let report = notice(NoticeKind::ServerAck, 1);
        assert_eq!(table.take_match(&report).as_deref(), Some("t1"));
        assert_eq!(table.take_match(&report), None);
        assert_eq!(table.len(), 1);
    }

    #[rstest]
    fn unknown_id_leaves_table_untouched(mut table: PendingRequests) {
        assert_eq!(table.take_match(&notice(NoticeKind::ServerAck, 9)), None);
        assert_eq!(table.len(), 2);
    }

    #[rstest]
    #[case(NoticeKind::Acked)]
    #[case(NoticeKind::Unacked)]
    fn ordinary_messages_never_match(mut table: PendingRequests, #[case] kind: NoticeKind) {
        assert_eq!(table.take_match(&notice(kind, 1)), None);
        assert!(table.contains(CorrelationId::from_raw(1)));
    }

    #[rstest]
    fn reused_id_keeps_single_entry(mut table: PendingRequests) {
        table.insert("t3", CorrelationId::from_raw(1));
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.take_match(&notice(NoticeKind::ServerNak, 1)).as_deref(),
            Some("t3")
        );
    }
}
