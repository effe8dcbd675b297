//! raumchat-backend – Externe Schnittstelle der Timeline-Engine
//!
//! Dieses Crate definiert das `ChatBackend`-Trait (History-Seiten,
//! Realtime-Abonnement mit Presence, Persistieren von Nachrichten) und
//! stellt mit `MemoryBackend` eine vollstaendige In-Memory-Implementierung
//! fuer Tests und den Terminal-Client bereit.

pub mod memory;
pub mod repository;

pub use memory::{MemoryBackend, MemorySession, Operation, MAX_TEXTLAENGE};
pub use repository::{ChannelSignal, ChatBackend, Subscription, SubscriptionId};
