//! Pagination Controller – laedt aeltere History rueckwaerts per Zeitstempel-Cursor
//!
//! ## State Machine
//! ```text
//! Bereit --start--> Laedt --Seite voll-----> Bereit
//!   ^                 |  --Seite < Limit---> Fertig
//!   |                 +--Fehler----------> Fehler
//!   +------ (nur manuell) start -----------------+
//! ```
//!
//! Laden ist zweigeteilt (`start` / `abschliessen`), damit die Antwort zu
//! einem beliebigen spaeteren Zeitpunkt eintreffen darf. Jede Anfrage traegt
//! Raum und Generation; `abbrechen` macht laufende Anfragen ungueltig.

use chrono::{DateTime, Utc};
use raumchat_core::{Message, MessageId, Result, RoomId};

use crate::store::MessageStore;
use crate::types::SeitenErgebnis;

/// Zustand der History-Pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStatus {
    Bereit,
    Laedt,
    Fertig,
    Fehler,
}

/// Eine ausstehende Seitenanfrage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeitenAnfrage {
    pub room_id: RoomId,
    /// Nur Nachrichten strikt aelter als dieser Zeitstempel
    pub older_than: DateTime<Utc>,
    pub limit: usize,
    generation: u64,
}

// ---------------------------------------------------------------------------
// LadeTrigger
// ---------------------------------------------------------------------------

/// Sichtbarkeits-Beobachter auf dem aeltesten gerenderten Eintrag
///
/// Feuert genau einmal pro Beobachtung und meldet sich danach selbst ab.
#[derive(Debug, Default)]
pub struct LadeTrigger {
    beobachtet: Option<MessageId>,
}

impl LadeTrigger {
    pub fn beobachten(&mut self, id: MessageId) {
        self.beobachtet = Some(id);
    }

    pub fn abmelden(&mut self) {
        self.beobachtet = None;
    }

    pub fn beobachtet(&self) -> Option<MessageId> {
        self.beobachtet
    }

    /// Meldet, dass `id` sichtbar wurde. `true` genau dann, wenn der Trigger feuert.
    pub fn sichtbar(&mut self, id: MessageId) -> bool {
        if self.beobachtet == Some(id) {
            self.beobachtet = None;
            true
        } else {
            false
        }
    }
}

// ---------------------------------------------------------------------------
// PaginationController
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct PaginationController {
    room_id: RoomId,
    status: PaginationStatus,
    limit: usize,
    generation: u64,
    letzter_fehler: Option<String>,
    trigger: LadeTrigger,
}

impl PaginationController {
    /// Erstellt den Controller. Ist die Start-History leer, gibt es nichts zu laden.
    pub fn neu(room_id: RoomId, limit: usize, history_leer: bool) -> Self {
        Self {
            room_id,
            status: if history_leer {
                PaginationStatus::Fertig
            } else {
                PaginationStatus::Bereit
            },
            limit,
            generation: 0,
            letzter_fehler: None,
            trigger: LadeTrigger::default(),
        }
    }

    pub fn status(&self) -> PaginationStatus {
        self.status
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Fehlermeldung des letzten gescheiterten Ladeversuchs
    pub fn letzter_fehler(&self) -> Option<&str> {
        self.letzter_fehler.as_deref()
    }

    /// Beginnt das Laden der naechsten Seite
    ///
    /// `None` wenn bereits geladen wird oder keine History mehr existiert.
    pub fn start(&mut self, store: &MessageStore) -> Option<SeitenAnfrage> {
        match self.status {
            PaginationStatus::Laedt | PaginationStatus::Fertig => return None,
            PaginationStatus::Bereit | PaginationStatus::Fehler => {}
        }

        let Some(older_than) = store.aeltester_zeitstempel() else {
            self.status = PaginationStatus::Fertig;
            return None;
        };

        self.status = PaginationStatus::Laedt;
        self.letzter_fehler = None;
        self.trigger.abmelden();
        tracing::debug!(room_id = %self.room_id, %older_than, "Lade aeltere Nachrichten");

        Some(SeitenAnfrage {
            room_id: self.room_id,
            older_than,
            limit: self.limit,
            generation: self.generation,
        })
    }

    /// Uebernimmt das Ergebnis einer Anfrage
    ///
    /// Ergebnisse fuer einen anderen Raum oder eine abgebrochene Generation
    /// veraendern keinen Zustand.
    pub fn abschliessen(
        &mut self,
        anfrage: SeitenAnfrage,
        ergebnis: Result<Vec<Message>>,
        store: &mut MessageStore,
    ) -> Result<SeitenErgebnis> {
        if anfrage.room_id != self.room_id
            || anfrage.generation != self.generation
            || self.status != PaginationStatus::Laedt
        {
            tracing::warn!(
                room_id = %anfrage.room_id,
                "Veraltetes Seitenergebnis verworfen"
            );
            return Ok(SeitenErgebnis::Verworfen);
        }

        match ergebnis {
            Ok(seite) => {
                let anzahl = seite.len();
                store.seite_voranstellen(seite);
                let fertig = anzahl < self.limit;
                self.status = if fertig {
                    PaginationStatus::Fertig
                } else {
                    PaginationStatus::Bereit
                };
                tracing::debug!(room_id = %self.room_id, anzahl, fertig, "Seite geladen");
                Ok(SeitenErgebnis::Geladen { anzahl, fertig })
            }
            Err(e) => {
                tracing::warn!(room_id = %self.room_id, fehler = %e, "Seite laden fehlgeschlagen");
                self.status = PaginationStatus::Fehler;
                self.letzter_fehler = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Macht alle laufenden Anfragen ungueltig (Raum geschlossen oder gewechselt)
    pub fn abbrechen(&mut self) {
        self.generation += 1;
        if self.status == PaginationStatus::Laedt {
            self.status = PaginationStatus::Bereit;
        }
        self.trigger.abmelden();
    }

    /// Setzt den Trigger auf den aeltesten sichtbaren Eintrag
    ///
    /// Beobachtet wird nur im Zustand `Bereit`; nach einem Fehler ist
    /// ausschliesslich ein manueller Neuversuch moeglich.
    pub fn trigger_setzen(&mut self, aeltester: Option<MessageId>) {
        match (self.status, aeltester) {
            (PaginationStatus::Bereit, Some(id)) => {
                if self.trigger.beobachtet() != Some(id) {
                    self.trigger.beobachten(id);
                }
            }
            _ => self.trigger.abmelden(),
        }
    }

    pub fn trigger(&self) -> &LadeTrigger {
        &self.trigger
    }

    /// Sichtbarkeitsmeldung weiterreichen; `true` wenn geladen werden soll
    pub fn trigger_ausloesen(&mut self, id: MessageId) -> bool {
        self.trigger.sichtbar(id)
    }
}
