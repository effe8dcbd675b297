//! raumchat-chat – Abgleich der Nachrichten-Timeline eines Raums
//!
//! Dieses Crate implementiert:
//! - MessageStore: History und Live-Puffer mit idempotenten Updates
//! - PaginationController: rueckwaerts blaetternde History mit Lade-Trigger
//! - RealtimeListener: Abonnement, Change-Feed und Presence
//! - Outbox: optimistisch angezeigte eigene Nachrichten
//! - merge: sichtbare Timeline ohne doppelte IDs
//! - ScrollTracker: Position am Ende und ungelesene Nachrichten
//! - RoomView: eine geoeffnete Raumansicht, die alles verbindet
//!
//! # Beispiel
//!
//! ```no_run
//! use std::sync::Arc;
//! use raumchat_backend::MemoryBackend;
//! use raumchat_chat::{AktuellerBenutzer, RoomView, TimelineEinstellungen};
//!
//! #[tokio::main]
//! async fn main() -> raumchat_core::Result<()> {
//!     let backend = MemoryBackend::neu();
//!     let anna = backend.benutzer_anlegen("anna", None);
//!     let raum = backend.raum_anlegen("Lobby", &[anna]);
//!
//!     let sitzung = backend.sitzung(anna);
//!     let benutzer = AktuellerBenutzer { id: anna, profil: sitzung.profil()? };
//!     let mut view = RoomView::oeffnen(
//!         Arc::new(sitzung),
//!         raum,
//!         benutzer,
//!         TimelineEinstellungen::default(),
//!     )
//!     .await?;
//!
//!     view.senden("Hallo Welt!").await?;
//!     view.schliessen().await;
//!     Ok(())
//! }
//! ```

pub mod merge;
pub mod outbox;
pub mod pagination;
pub mod realtime;
pub mod room;
pub mod scroll;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use merge::merge;
pub use outbox::{Outbox, Sendeauftrag};
pub use pagination::{LadeTrigger, PaginationController, PaginationStatus, SeitenAnfrage};
pub use realtime::{AbbruchHandle, RealtimeListener};
pub use room::RoomView;
pub use scroll::ScrollTracker;
pub use store::MessageStore;
pub use types::{
    AktuellerBenutzer, OutboxEntry, OutboxStatus, ScrollBefehl, SeitenErgebnis,
    TimelineEinstellungen, TimelineEintrag,
};
