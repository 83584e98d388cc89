//! `wayfinder-middleware` – Fan-out
//!
//! Carries perception results from the single session that produces them to
//! any number of consumers (speech output, haptics, loggers, a companion
//! app) without the producer knowing who listens.
//!
//! # Modules
//!
//! - [`bus`] – [`PerceptionBus`][bus::PerceptionBus]: topic-based
//!   publish/subscribe over Tokio broadcast channels, plus
//!   [`BusSink`][bus::BusSink] which plugs the bus in as an
//!   [`AnnouncementSink`][wayfinder_hal::AnnouncementSink].

pub mod bus;

pub use bus::{BusSink, EventPayload, PerceptionBus, PerceptionEvent, Topic, TopicReceiver};
