//! Outbox – optimistische Anzeige eigener Nachrichten
//!
//! Ein Eintrag entsteht beim Senden mit einer clientseitig erzeugten ID und
//! dem Status `Ausstehend`. Die Serverantwort setzt ihn auf `Erfolgreich`
//! (kanonische Felder werden uebernommen) oder `Fehler`. Fehlgeschlagene
//! Eintraege bleiben sichtbar und werden nicht automatisch wiederholt.

use chrono::Utc;
use raumchat_core::{message::text_normalisieren, Message, MessageId, MessagePatch, Result};

use crate::types::{AktuellerBenutzer, OutboxEntry, OutboxStatus};

/// Auftrag an das Backend, der aus `Outbox::vorbereiten` entsteht
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sendeauftrag {
    pub id: MessageId,
    pub text: String,
}

#[derive(Debug)]
pub struct Outbox {
    eintraege: Vec<OutboxEntry>,
    max_textlaenge: usize,
}

impl Outbox {
    pub fn neu(max_textlaenge: usize) -> Self {
        Self {
            eintraege: Vec::new(),
            max_textlaenge,
        }
    }

    /// Alle Eintraege in Sendereihenfolge
    pub fn eintraege(&self) -> &[OutboxEntry] {
        &self.eintraege
    }

    pub fn eintrag(&self, id: MessageId) -> Option<&OutboxEntry> {
        self.eintraege.iter().find(|e| e.nachricht.id == id)
    }

    /// Anzahl noch unbeantworteter Sendevorgaenge
    pub fn ausstehend(&self) -> usize {
        self.eintraege
            .iter()
            .filter(|e| e.status == OutboxStatus::Ausstehend)
            .count()
    }

    /// Legt einen ausstehenden Eintrag an
    ///
    /// Ungueltiger Text wird abgelehnt, bevor ein Eintrag entsteht.
    pub fn vorbereiten(&mut self, text: &str, benutzer: &AktuellerBenutzer) -> Result<Sendeauftrag> {
        let text = text_normalisieren(text, self.max_textlaenge)?;
        let id = MessageId::new();

        self.eintraege.push(OutboxEntry {
            nachricht: Message {
                id,
                text: text.clone(),
                created_at: Utc::now(),
                author_id: benutzer.id,
                author: benutzer.profil.clone(),
                deleted_at: None,
                edited_at: None,
            },
            status: OutboxStatus::Ausstehend,
            fehler: None,
        });

        tracing::debug!(message_id = %id, "Nachricht in Outbox");
        Ok(Sendeauftrag { id, text })
    }

    /// Uebernimmt die Serverfassung einer gesendeten Nachricht
    pub fn bestaetigen(&mut self, kanonisch: Message) -> bool {
        let Some(eintrag) = self.ausstehender_eintrag(kanonisch.id) else {
            return false;
        };
        eintrag.nachricht = kanonisch;
        eintrag.status = OutboxStatus::Erfolgreich;
        true
    }

    /// Markiert einen ausstehenden Eintrag als fehlgeschlagen
    pub fn fehlgeschlagen(&mut self, id: MessageId, grund: impl Into<String>) -> bool {
        let Some(eintrag) = self.ausstehender_eintrag(id) else {
            return false;
        };
        let grund = grund.into();
        tracing::warn!(message_id = %id, fehler = %grund, "Senden fehlgeschlagen");
        eintrag.status = OutboxStatus::Fehler;
        eintrag.fehler = Some(grund);
        true
    }

    /// Wendet ein Realtime-Update auf einen Outbox-Eintrag an
    pub fn patch_anwenden(&mut self, id: MessageId, patch: &MessagePatch) -> bool {
        self.eintraege
            .iter_mut()
            .find(|e| e.nachricht.id == id)
            .is_some_and(|e| patch.apply(&mut e.nachricht))
    }

    /// Entfernt einen fehlgeschlagenen Eintrag und gibt ihn zurueck
    pub fn verwerfen(&mut self, id: MessageId) -> Option<OutboxEntry> {
        let pos = self
            .eintraege
            .iter()
            .position(|e| e.nachricht.id == id && e.status == OutboxStatus::Fehler)?;
        Some(self.eintraege.remove(pos))
    }

    fn ausstehender_eintrag(&mut self, id: MessageId) -> Option<&mut OutboxEntry> {
        let eintrag = self.eintraege.iter_mut().find(|e| e.nachricht.id == id);
        match eintrag {
            Some(e) if e.status == OutboxStatus::Ausstehend => Some(e),
            Some(e) => {
                tracing::debug!(message_id = %id, status = ?e.status, "Antwort fuer abgeschlossenen Eintrag ignoriert");
                None
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raumchat_core::{AuthorProfile, RaumchatError, UserId};

    fn benutzer() -> AktuellerBenutzer {
        AktuellerBenutzer {
            id: UserId::new(),
            profil: AuthorProfile {
                name: "frieda".into(),
                image_url: None,
            },
        }
    }

    #[test]
    fn vorbereiten_legt_ausstehenden_eintrag_an() {
        let mut outbox = Outbox::neu(4096);
        let auftrag = outbox.vorbereiten("  hi  ", &benutzer()).unwrap();
        assert_eq!(auftrag.text, "hi");
        let e = outbox.eintrag(auftrag.id).unwrap();
        assert_eq!(e.status, OutboxStatus::Ausstehend);
        assert_eq!(e.nachricht.text, "hi");
        assert_eq!(outbox.ausstehend(), 1);
    }

    #[test]
    fn leerer_text_erzeugt_keinen_eintrag() {
        let mut outbox = Outbox::neu(4096);
        let err = outbox.vorbereiten("   ", &benutzer()).unwrap_err();
        assert!(matches!(err, RaumchatError::UngueltigeEingabe(_)));
        assert!(outbox.eintraege().is_empty());
    }

    #[test]
    fn zu_langer_text_wird_abgelehnt() {
        let mut outbox = Outbox::neu(5);
        assert!(outbox.vorbereiten("sechs!", &benutzer()).is_err());
        assert!(outbox.eintraege().is_empty());
    }

    #[test]
    fn bestaetigen_uebernimmt_serverfassung() {
        let mut outbox = Outbox::neu(4096);
        let auftrag = outbox.vorbereiten("hi", &benutzer()).unwrap();
        let mut kanonisch = outbox.eintrag(auftrag.id).unwrap().nachricht.clone();
        kanonisch.created_at = chrono::DateTime::<Utc>::UNIX_EPOCH;

        assert!(outbox.bestaetigen(kanonisch.clone()));
        let e = outbox.eintrag(auftrag.id).unwrap();
        assert_eq!(e.status, OutboxStatus::Erfolgreich);
        assert_eq!(e.nachricht.created_at, kanonisch.created_at);

        // Zweite Antwort aendert nichts mehr
        assert!(!outbox.fehlgeschlagen(auftrag.id, "zu spaet"));
        assert_eq!(outbox.eintrag(auftrag.id).unwrap().status, OutboxStatus::Erfolgreich);
    }

    #[test]
    fn fehlschlag_bleibt_sichtbar() {
        let mut outbox = Outbox::neu(4096);
        let auftrag = outbox.vorbereiten("hi", &benutzer()).unwrap();
        assert!(outbox.fehlgeschlagen(auftrag.id, "Netzwerkfehler"));

        let e = outbox.eintrag(auftrag.id).unwrap();
        assert_eq!(e.status, OutboxStatus::Fehler);
        assert_eq!(e.fehler.as_deref(), Some("Netzwerkfehler"));
        assert_eq!(outbox.ausstehend(), 0);
    }

    #[test]
    fn nur_fehlgeschlagene_eintraege_verwerfbar() {
        let mut outbox = Outbox::neu(4096);
        let a = outbox.vorbereiten("a", &benutzer()).unwrap();
        let b = outbox.vorbereiten("b", &benutzer()).unwrap();
        outbox.fehlgeschlagen(b.id, "weg");

        assert!(outbox.verwerfen(a.id).is_none());
        assert_eq!(outbox.verwerfen(b.id).map(|e| e.nachricht.text), Some("b".into()));
        assert_eq!(outbox.eintraege().len(), 1);
    }

    #[test]
    fn patch_wirkt_auf_outbox_eintrag() {
        let mut outbox = Outbox::neu(4096);
        let auftrag = outbox.vorbereiten("alt", &benutzer()).unwrap();
        let patch = MessagePatch {
            text: "neu".into(),
            deleted_at: None,
            edited_at: Some(Utc::now()),
        };
        assert!(outbox.patch_anwenden(auftrag.id, &patch));
        assert!(!outbox.patch_anwenden(auftrag.id, &patch));
        assert_eq!(outbox.eintrag(auftrag.id).unwrap().nachricht.text, "neu");
    }
}
