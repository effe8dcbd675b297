//! Backend-Schnittstelle der Timeline-Engine
//!
//! Das `ChatBackend`-Trait beschreibt alles, was die Engine von aussen
//! braucht: History-Seiten, das Realtime-Abonnement mit Presence und das
//! Persistieren von Nachrichten. Alle Operationen liefern Fehler als Werte.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use raumchat_core::{Message, MessageId, Result, RoomId, SessionKey};
use tokio::sync::mpsc;

/// Groesse der Signal-Queue pro Abonnement
///
/// Laeuft die Queue voll, trennt der Server das Abonnement.
pub const SIGNAL_QUEUE_GROESSE: usize = 256;

/// Signale, die ueber ein Realtime-Abonnement eintreffen
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSignal {
    /// Rohe Change-Feed-Nutzlast (wird erst in der Engine validiert)
    Aenderung(serde_json::Value),
    /// Vollstaendige Menge der aktuell anwesenden Sitzungen
    PresenceSync(BTreeSet<SessionKey>),
}

/// Eindeutige Kennung eines Abonnements innerhalb eines Backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub:{}", self.0)
    }
}

/// Ein offenes Realtime-Abonnement fuer einen Raum
///
/// Gehoert exklusiv dem Listener, der es aufgebaut hat.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub room_id: RoomId,
    pub session_key: SessionKey,
    signale: mpsc::Receiver<ChannelSignal>,
    getrennt: bool,
}

impl Subscription {
    pub fn neu(
        id: SubscriptionId,
        room_id: RoomId,
        session_key: SessionKey,
        signale: mpsc::Receiver<ChannelSignal>,
    ) -> Self {
        Self {
            id,
            room_id,
            session_key,
            signale,
            getrennt: false,
        }
    }

    /// Wartet auf das naechste Signal. `None` wenn der Kanal geschlossen wurde.
    pub async fn naechstes_signal(&mut self) -> Option<ChannelSignal> {
        let signal = self.signale.recv().await;
        if signal.is_none() {
            self.getrennt = true;
        }
        signal
    }

    /// Holt ein bereits eingetroffenes Signal ohne zu warten
    pub fn signal_abholen(&mut self) -> Option<ChannelSignal> {
        match self.signale.try_recv() {
            Ok(signal) => Some(signal),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                self.getrennt = true;
                None
            }
        }
    }

    /// Der Server hat den Kanal geschlossen und alle Signale sind abgeholt
    pub fn ist_getrennt(&self) -> bool {
        self.getrennt
    }
}

/// Externe Schnittstelle fuer Raum-Nachrichten
#[allow(async_fn_in_trait)]
pub trait ChatBackend: Send + Sync {
    /// Auth-Handshake, der vor dem Oeffnen des Realtime-Kanals abgewartet wird
    async fn realtime_autorisieren(&self) -> Result<()>;

    /// Nachrichten strikt aelter als `older_than`, neueste zuerst.
    /// `None` liefert die neuesten Nachrichten des Raums.
    async fn fetch_page(
        &self,
        room_id: RoomId,
        older_than: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Message>>;

    /// Oeffnet ein Realtime-Abonnement fuer den Raum
    async fn subscribe(&self, room_id: RoomId, session_key: &SessionKey) -> Result<Subscription>;

    /// Meldet die Sitzung des Abonnements als anwesend
    async fn announce_presence(&self, subscription: &Subscription) -> Result<()>;

    /// Zieht die Anwesenheit der Sitzung zurueck
    async fn withdraw_presence(&self, subscription: &Subscription) -> Result<()>;

    /// Schliesst das Abonnement. Mehrfacher Aufruf ist unschaedlich.
    async fn unsubscribe(&self, subscription: &Subscription);

    /// Persistiert eine neue Nachricht unter der vom Client vergebenen ID
    async fn persist_message(&self, id: MessageId, room_id: RoomId, text: &str) -> Result<Message>;

    /// Aendert den Text einer eigenen, nicht geloeschten Nachricht
    async fn persist_edit(&self, id: MessageId, new_text: &str) -> Result<Message>;

    /// Loescht eine eigene Nachricht weich (setzt `deleted_at`)
    async fn persist_delete(&self, id: MessageId) -> Result<Message>;
}
