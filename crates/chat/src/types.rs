//! Oeffentliche Typen fuer die Nachrichten-Timeline

use raumchat_core::{AuthorProfile, Message, MessageId, UserId};
use serde::{Deserialize, Serialize};

/// Einstellungen der Timeline einer Raumansicht
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineEinstellungen {
    /// Maximale Groesse einer History-Seite
    pub seiten_limit: usize,
    /// Anzahl der beim Oeffnen geladenen Nachrichten
    pub start_limit: usize,
    /// Abstand zum Ende (px), bis zu dem die Ansicht als "unten" gilt
    pub scroll_schwelle_px: f64,
    /// Maximale Nachrichtenlaenge in Bytes
    pub max_textlaenge: usize,
}

impl Default for TimelineEinstellungen {
    fn default() -> Self {
        Self {
            seiten_limit: 25,
            start_limit: 100,
            scroll_schwelle_px: 50.0,
            max_textlaenge: 4096,
        }
    }
}

/// Der angemeldete Benutzer einer Raumansicht
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AktuellerBenutzer {
    pub id: UserId,
    pub profil: AuthorProfile,
}

/// Zustand eines lokal gesendeten Eintrags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboxStatus {
    /// Gesendet, noch keine Antwort vom Server
    #[serde(rename = "pending")]
    Ausstehend,
    /// Vom Server bestaetigt
    #[serde(rename = "success")]
    Erfolgreich,
    /// Senden fehlgeschlagen, wird nicht automatisch wiederholt
    #[serde(rename = "error")]
    Fehler,
}

/// Eine optimistisch angezeigte, eigene Nachricht
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEntry {
    pub nachricht: Message,
    pub status: OutboxStatus,
    /// Fehlermeldung fuer die Anzeige bei `OutboxStatus::Fehler`
    pub fehler: Option<String>,
}

/// Ein Eintrag der zusammengefuehrten, sichtbaren Timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineEintrag<'a> {
    /// Vom Server stammende Nachricht (History oder Live-Puffer)
    Gespeichert(&'a Message),
    /// Lokaler Outbox-Eintrag ohne serverseitiges Gegenstueck
    Lokal(&'a OutboxEntry),
}

impl<'a> TimelineEintrag<'a> {
    pub fn nachricht(&self) -> &'a Message {
        match self {
            Self::Gespeichert(m) => m,
            Self::Lokal(e) => &e.nachricht,
        }
    }

    pub fn id(&self) -> MessageId {
        self.nachricht().id
    }

    /// Outbox-Status, `None` fuer Nachrichten vom Server
    pub fn status(&self) -> Option<OutboxStatus> {
        match self {
            Self::Gespeichert(_) => None,
            Self::Lokal(e) => Some(e.status),
        }
    }
}

/// Ausgang eines Nachlade-Versuchs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeitenErgebnis {
    /// Seite uebernommen; `fertig` wenn keine aeltere History mehr existiert
    Geladen { anzahl: usize, fertig: bool },
    /// Kein Laden ausgeloest (laedt bereits, fertig oder kein Trigger)
    Uebersprungen,
    /// Ergebnis kam fuer eine nicht mehr aktuelle Ansicht und wurde verworfen
    Verworfen,
}

/// Scroll-Anweisung an die Darstellung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBefehl {
    /// Weich zum neuesten Eintrag scrollen
    SanftNachUnten,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_einstellungen() {
        let e = TimelineEinstellungen::default();
        assert_eq!(e.seiten_limit, 25);
        assert_eq!(e.start_limit, 100);
    }

    #[test]
    fn einstellungen_teilweise_aus_toml() {
        let e: TimelineEinstellungen = toml::from_str("seiten_limit = 10").unwrap();
        assert_eq!(e.seiten_limit, 10);
        assert_eq!(e.start_limit, 100);
    }

    #[test]
    fn outbox_status_serde_namen() {
        assert_eq!(
            serde_json::to_string(&OutboxStatus::Ausstehend).unwrap(),
            "\"pending\""
        );
        assert_eq!(
            serde_json::to_string(&OutboxStatus::Fehler).unwrap(),
            "\"error\""
        );
    }
}
