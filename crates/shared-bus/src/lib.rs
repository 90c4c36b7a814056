//! # Shared Bus - Event Bus between Transport and Business Logic
//!
//! The peer transport never calls consensus, the bridge or block production
//! directly. Inbound gossip is published as events; outbound gossip arrives
//! as events carrying a `broadcast` flag.
//!
//! ```text
//! ┌──────────────┐  Receive*/Message   ┌──────────────┐
//! │   Transport  │ ──────────────────▶ │  Event Bus   │ ──▶ consensus, bridge
//! │              │ ◀────────────────── │              │ ◀── block production
//! └──────────────┘  NewBlock/NewPropose└──────────────┘
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{EventFilter, EventTopic, TransportEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before it starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
