//! # Transport Events
//!
//! Every event that crosses the boundary between the peer transport and the
//! rest of the node.

use serde::{Deserialize, Serialize};
use shared_types::{Block, BlockPropose, BlockVotes, ChainMessage, SignatureShare, Transaction};

/// All events that can be published to the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TransportEvent {
    // =========================================================================
    // INBOUND (published by the transport after a peer pushed something)
    // =========================================================================
    /// A peer pushed a block with its vote set.
    ReceiveBlock { block: Block, votes: BlockVotes },

    /// A peer pushed a vote set.
    ReceiveVotes(BlockVotes),

    /// A peer announced a block proposal.
    ReceivePropose(BlockPropose),

    // =========================================================================
    // BIDIRECTIONAL (inbound with `broadcast = true` gets re-gossiped)
    // =========================================================================
    /// A transaction entered the mempool.
    UnconfirmedTransaction {
        transaction: Transaction,
        broadcast: bool,
    },

    /// A bridge message was processed by (or originates from) a side chain.
    Message {
        message: ChainMessage,
        broadcast: bool,
    },

    /// A multisignature share was accepted.
    Signature {
        signature: SignatureShare,
        broadcast: bool,
    },

    // =========================================================================
    // OUTBOUND (produced locally, gossiped when `broadcast = true`)
    // =========================================================================
    /// This node produced or accepted a new block.
    NewBlock {
        block: Block,
        votes: BlockVotes,
        broadcast: bool,
    },

    /// This node's delegate proposes a block for the current slot.
    NewPropose {
        propose: BlockPropose,
        broadcast: bool,
    },

    /// A dependent chain became ready.
    ChainReady { chain: String, broadcast: bool },
}

impl TransportEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::ReceiveBlock { .. } | Self::NewBlock { .. } => EventTopic::Blocks,
            Self::ReceiveVotes(_) => EventTopic::Votes,
            Self::ReceivePropose(_) | Self::NewPropose { .. } => EventTopic::Proposals,
            Self::UnconfirmedTransaction { .. } => EventTopic::Transactions,
            Self::Signature { .. } => EventTopic::Signatures,
            Self::Message { .. } | Self::ChainReady { .. } => EventTopic::Relay,
        }
    }

    /// True when the event asks the transport to gossip it to peers.
    #[must_use]
    pub fn wants_broadcast(&self) -> bool {
        match self {
            Self::ReceiveBlock { .. } | Self::ReceiveVotes(_) | Self::ReceivePropose(_) => false,
            Self::UnconfirmedTransaction { broadcast, .. }
            | Self::Message { broadcast, .. }
            | Self::Signature { broadcast, .. }
            | Self::NewBlock { broadcast, .. }
            | Self::NewPropose { broadcast, .. }
            | Self::ChainReady { broadcast, .. } => *broadcast,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    Blocks,
    Votes,
    Proposals,
    Transactions,
    Signatures,
    /// Bridge messages and chain readiness.
    Relay,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Only deliver events flagged for re-broadcast.
    pub broadcast_only: bool,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            broadcast_only: false,
        }
    }

    /// Create a filter for the events the transport must gossip.
    #[must_use]
    pub fn outbound() -> Self {
        Self {
            topics: Vec::new(),
            broadcast_only: true,
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &TransportEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        topic_match && (!self.broadcast_only || event.wants_broadcast())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn votes() -> BlockVotes {
        BlockVotes {
            height: 1,
            id: "b1".into(),
            signatures: Vec::new(),
        }
    }

    #[test]
    fn test_event_topic_mapping() {
        let event = TransportEvent::ReceiveVotes(votes());
        assert_eq!(event.topic(), EventTopic::Votes);

        let event = TransportEvent::ChainReady {
            chain: "side".into(),
            broadcast: true,
        };
        assert_eq!(event.topic(), EventTopic::Relay);
    }

    #[test]
    fn test_filter_by_topic() {
        let filter = EventFilter::topics(vec![EventTopic::Blocks]);
        let block_event = TransportEvent::NewBlock {
            block: Block::default(),
            votes: votes(),
            broadcast: false,
        };
        assert!(filter.matches(&block_event));
        assert!(!filter.matches(&TransportEvent::ReceiveVotes(votes())));
    }

    #[test]
    fn test_inbound_events_never_broadcast() {
        let filter = EventFilter::outbound();
        let inbound = TransportEvent::ReceiveBlock {
            block: Block::default(),
            votes: votes(),
        };
        assert!(!inbound.wants_broadcast());
        assert!(!filter.matches(&inbound));
    }

    #[test]
    fn test_outbound_filter_respects_flag() {
        let filter = EventFilter::outbound();
        let quiet = TransportEvent::UnconfirmedTransaction {
            transaction: Transaction::default(),
            broadcast: false,
        };
        let loud = TransportEvent::UnconfirmedTransaction {
            transaction: Transaction::default(),
            broadcast: true,
        };
        assert!(!filter.matches(&quiet));
        assert!(filter.matches(&loud));
    }
}
