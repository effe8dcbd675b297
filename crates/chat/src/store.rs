//! Message Store – kanonische Timeline eines geoeffneten Raums
//!
//! Haelt zwei serverseitige Sammlungen:
//! - `history`: paginierte, persistierte Nachrichten (aelteste zuerst)
//! - `live`: seit Abo-Beginn ueber den Realtime-Kanal beobachtete Nachrichten
//!
//! Geaendert wird der Store nur vom Pagination Controller (Seiten voranstellen)
//! und vom Realtime Listener (anhaengen, patchen).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use raumchat_core::{Message, MessageId, MessagePatch};

#[derive(Debug, Default)]
pub struct MessageStore {
    history: Vec<Message>,
    live: Vec<Message>,
    ids: HashSet<MessageId>,
}

impl MessageStore {
    /// Erstellt den Store aus der Start-History (vom Backend neueste zuerst)
    pub fn neu(start_neueste_zuerst: Vec<Message>) -> Self {
        let mut store = Self::default();
        store.seite_voranstellen(start_neueste_zuerst);
        store
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn live(&self) -> &[Message] {
        &self.live
    }

    pub fn ist_leer(&self) -> bool {
        self.history.is_empty() && self.live.is_empty()
    }

    pub fn enthaelt(&self, id: MessageId) -> bool {
        self.ids.contains(&id)
    }

    /// Sucht eine Nachricht in beiden Sammlungen
    pub fn nachricht(&self, id: MessageId) -> Option<&Message> {
        if !self.enthaelt(id) {
            return None;
        }
        self.history
            .iter()
            .chain(self.live.iter())
            .find(|m| m.id == id)
    }

    /// Zeitstempel der aeltesten gehaltenen persistierten Nachricht (Cursor)
    pub fn aeltester_zeitstempel(&self) -> Option<DateTime<Utc>> {
        self.history
            .first()
            .or_else(|| self.live.first())
            .map(|m| m.created_at)
    }

    /// Stellt eine Seite (neueste zuerst) der History voran
    ///
    /// Gibt die Anzahl tatsaechlich uebernommener Nachrichten zurueck.
    pub fn seite_voranstellen(&mut self, seite_neueste_zuerst: Vec<Message>) -> usize {
        let mut seite: Vec<Message> = seite_neueste_zuerst
            .into_iter()
            .rev()
            .filter(|m| !self.ids.contains(&m.id))
            .collect();
        let anzahl = seite.len();

        self.ids.extend(seite.iter().map(|m| m.id));
        seite.append(&mut self.history);
        self.history = seite;
        anzahl
    }

    /// Haengt eine Realtime-Nachricht an den Live-Puffer an
    ///
    /// Eine bereits bekannte ID (erneute Zustellung) wird ignoriert.
    pub fn live_anhaengen(&mut self, nachricht: Message) -> bool {
        if !self.ids.insert(nachricht.id) {
            tracing::debug!(message_id = %nachricht.id, "Nachricht bereits bekannt, ignoriert");
            return false;
        }
        self.live.push(nachricht);
        true
    }

    /// Patcht die Nachricht mit `id`, wo immer sie liegt
    ///
    /// Kein Fehler wenn die ID (noch) nicht geladen ist. Gibt `true` zurueck
    /// wenn sich der Zustand geaendert hat.
    pub fn apply_update(&mut self, id: MessageId, patch: &MessagePatch) -> bool {
        if !self.enthaelt(id) {
            return false;
        }
        self.history
            .iter_mut()
            .chain(self.live.iter_mut())
            .filter(|m| m.id == id)
            .fold(false, |geaendert, m| patch.apply(m) || geaendert)
    }
}
