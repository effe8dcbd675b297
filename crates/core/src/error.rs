//! Fehlertypen fuer Raumchat
//!
//! Zentraler Fehler-Enum fuer alle Komponenten der Nachrichten-Timeline.
//! Fehler werden immer als Werte zurueckgegeben; kein Fehler wird
//! automatisch wiederholt.

use thiserror::Error;

/// Globaler Result-Alias fuer Raumchat
pub type Result<T> = std::result::Result<T, RaumchatError>;

/// Grobe Einordnung eines Fehlers fuer die Anzeige
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FehlerKategorie {
    /// Lokal abgelehnt, erreicht nie das Netzwerk
    Validierung,
    /// Ziel existiert nicht (mehr)
    NichtGefunden,
    /// Fremde Nachricht oder fehlende Mitgliedschaft
    Berechtigung,
    /// Voruebergehender Netzwerkfehler, manuell wiederholbar
    Netzwerk,
    /// Alles andere
    Intern,
}

/// Alle moeglichen Fehler im Raumchat-System
#[derive(Debug, Error)]
pub enum RaumchatError {
    // --- Validierung ---
    #[error("Ungueltige Eingabe: {0}")]
    UngueltigeEingabe(String),

    // --- Ressourcen ---
    #[error("Nicht gefunden: {0}")]
    NichtGefunden(String),

    // --- Autorisierung ---
    #[error("Keine Berechtigung: {0}")]
    KeineBerechtigung(String),

    // --- Netzwerk ---
    #[error("Netzwerkfehler: {0}")]
    Netzwerk(String),

    // --- Realtime ---
    #[error("Ungueltiges Ereignis: {0}")]
    UngueltigesEreignis(String),

    #[error("Vorgang abgebrochen: {0}")]
    Abgebrochen(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl RaumchatError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    pub fn netzwerk(msg: impl Into<String>) -> Self {
        Self::Netzwerk(msg.into())
    }

    pub fn nicht_gefunden(msg: impl Into<String>) -> Self {
        Self::NichtGefunden(msg.into())
    }

    /// Gibt true zurueck wenn der Benutzer den Vorgang erneut anstossen kann
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(self, Self::Netzwerk(_))
    }

    /// Ordnet den Fehler einer Kategorie zu
    pub fn kategorie(&self) -> FehlerKategorie {
        match self {
            Self::UngueltigeEingabe(_) => FehlerKategorie::Validierung,
            Self::NichtGefunden(_) => FehlerKategorie::NichtGefunden,
            Self::KeineBerechtigung(_) => FehlerKategorie::Berechtigung,
            Self::Netzwerk(_) => FehlerKategorie::Netzwerk,
            _ => FehlerKategorie::Intern,
        }
    }
}

impl From<serde_json::Error> for RaumchatError {
    fn from(e: serde_json::Error) -> Self {
        Self::UngueltigesEreignis(e.to_string())
    }
}
