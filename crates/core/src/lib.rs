//! raumchat-core – Gemeinsame Typen, Nachrichtenmodell und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die vom Backend,
//! der Timeline-Engine und dem Client gemeinsam genutzt werden.

pub mod error;
pub mod event;
pub mod message;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{FehlerKategorie, RaumchatError, Result};
pub use event::{ChangeRecord, RealtimeEvent};
pub use message::{AuthorProfile, Message, MessagePatch, GELOESCHT_PLATZHALTER};
pub use types::{MessageId, RoomId, SessionKey, UserId};
