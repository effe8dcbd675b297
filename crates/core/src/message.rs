//! Nachrichten-Modell
//!
//! Eine `Message` hat eine unveraenderliche Identitaet (`id`, `created_at`,
//! Autor) und veraenderlichen Inhalt (`text`, `deleted_at`, `edited_at`).
//! Aenderungen am Inhalt laufen ausschliesslich ueber `MessagePatch`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RaumchatError, Result};
use crate::types::{MessageId, UserId};

/// Platzhaltertext fuer weich geloeschte Nachrichten
pub const GELOESCHT_PLATZHALTER: &str = "Diese Nachricht wurde geloescht";

/// Anzeigedaten des Verfassers (denormalisiert mitgeliefert)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorProfile {
    pub name: String,
    pub image_url: Option<String>,
}

/// Eine Chat-Nachricht in einem Raum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author_id: UserId,
    pub author: AuthorProfile,
    pub deleted_at: Option<DateTime<Utc>>,
    pub edited_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn ist_geloescht(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Loeschen verdraengt die "(bearbeitet)"-Anzeige
    pub fn zeigt_bearbeitet(&self) -> bool {
        self.edited_at.is_some() && !self.ist_geloescht()
    }

    /// Der anzuzeigende Text – bei geloeschten Nachrichten der Platzhalter
    pub fn display_text(&self) -> &str {
        if self.ist_geloescht() {
            GELOESCHT_PLATZHALTER
        } else {
            &self.text
        }
    }

    /// Der veraenderliche Teil dieser Nachricht als Patch
    pub fn als_patch(&self) -> MessagePatch {
        MessagePatch {
            text: self.text.clone(),
            deleted_at: self.deleted_at,
            edited_at: self.edited_at,
        }
    }
}

/// Veraenderliche Teilmenge einer Nachricht
///
/// Enthaelt absolute Werte statt Differenzen; zweimaliges Anwenden
/// ergibt denselben Zustand wie einmaliges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePatch {
    pub text: String,
    pub deleted_at: Option<DateTime<Utc>>,
    pub edited_at: Option<DateTime<Utc>>,
}

impl MessagePatch {
    /// Wendet den Patch an. Gibt `true` zurueck wenn sich etwas geaendert hat.
    pub fn apply(&self, nachricht: &mut Message) -> bool {
        let vorher = (
            nachricht.text.as_str(),
            nachricht.deleted_at,
            nachricht.edited_at,
        );
        if vorher == (self.text.as_str(), self.deleted_at, self.edited_at) {
            return false;
        }

        nachricht.text.clone_from(&self.text);
        nachricht.deleted_at = self.deleted_at;
        nachricht.edited_at = self.edited_at;
        true
    }
}

/// Prueft und normalisiert einen Nachrichtentext
///
/// Umgebende Leerzeichen werden entfernt; leerer Text und Text ueber
/// `max_laenge` Bytes sind ungueltig.
pub fn text_normalisieren(text: &str, max_laenge: usize) -> Result<String> {
    let getrimmt = text.trim();
    if getrimmt.is_empty() {
        return Err(RaumchatError::UngueltigeEingabe(
            "Nachrichteninhalt darf nicht leer sein".into(),
        ));
    }
    if getrimmt.len() > max_laenge {
        return Err(RaumchatError::UngueltigeEingabe(format!(
            "Nachricht zu lang: {} Zeichen (Maximum: {max_laenge})",
            getrimmt.len()
        )));
    }
    Ok(getrimmt.to_string())
}
