//! Change-Feed-Ereignisse
//!
//! Der Realtime-Kanal liefert Datensatz-Aenderungen als JSON. An dieser
//! Grenze wird die Nutzlast in einen getaggten `ChangeRecord` geparst und
//! zu einem `RealtimeEvent` validiert, bevor sie den Kern erreicht.
//!
//! ## Wire-Format
//! ```text
//! { "kind": "insert", "id": "...", "text": "...", "created_at": "...",
//!   "author_id": "...", "author_name": "...", "author_image_url": null,
//!   "deleted_at": null, "edited_at": null }
//! { "kind": "update", "id": "...", "text": "...", "deleted_at": ..., "edited_at": ... }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RaumchatError, Result};
use crate::message::{AuthorProfile, Message, MessagePatch};
use crate::types::{MessageId, UserId};

/// Roh-Datensatz aus dem Change-Feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeRecord {
    Insert(InsertRecord),
    Update(UpdateRecord),
}

/// Neuer Datensatz, vom Trigger um Autor-Felder angereichert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertRecord {
    pub id: MessageId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author_id: UserId,
    pub author_name: String,
    #[serde(default)]
    pub author_image_url: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
}

/// Geaenderter Datensatz (nur die veraenderlichen Felder werden ausgewertet)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub id: MessageId,
    pub text: String,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
}

impl ChangeRecord {
    /// Insert-Datensatz fuer eine persistierte Nachricht
    pub fn insert(nachricht: &Message) -> Self {
        Self::Insert(InsertRecord {
            id: nachricht.id,
            text: nachricht.text.clone(),
            created_at: nachricht.created_at,
            author_id: nachricht.author_id,
            author_name: nachricht.author.name.clone(),
            author_image_url: nachricht.author.image_url.clone(),
            deleted_at: nachricht.deleted_at,
            edited_at: nachricht.edited_at,
        })
    }

    /// Update-Datensatz fuer eine geaenderte Nachricht
    pub fn update(nachricht: &Message) -> Self {
        Self::Update(UpdateRecord {
            id: nachricht.id,
            text: nachricht.text.clone(),
            deleted_at: nachricht.deleted_at,
            edited_at: nachricht.edited_at,
        })
    }

    pub fn als_json(&self) -> serde_json::Value {
        // Serialisierung eines reinen Datenenums kann nicht fehlschlagen
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Validiertes Ereignis, das der Kern verarbeitet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeEvent {
    /// Eine neue Nachricht wurde persistiert
    Insert(Message),
    /// Der veraenderliche Teil einer Nachricht hat sich geaendert
    Update { id: MessageId, patch: MessagePatch },
}

impl RealtimeEvent {
    /// Parst und validiert eine Change-Feed-Nutzlast
    pub fn aus_payload(payload: &serde_json::Value) -> Result<Self> {
        let record: ChangeRecord = serde_json::from_value(payload.clone())?;
        Self::aus_record(record)
    }

    pub fn aus_record(record: ChangeRecord) -> Result<Self> {
        match record {
            ChangeRecord::Insert(r) => {
                if r.text.trim().is_empty() {
                    return Err(RaumchatError::UngueltigesEreignis(format!(
                        "Insert {} ohne Text",
                        r.id
                    )));
                }
                if r.author_name.trim().is_empty() {
                    return Err(RaumchatError::UngueltigesEreignis(format!(
                        "Insert {} ohne Autorname",
                        r.id
                    )));
                }
                Ok(Self::Insert(Message {
                    id: r.id,
                    text: r.text,
                    created_at: r.created_at,
                    author_id: r.author_id,
                    author: AuthorProfile {
                        name: r.author_name,
                        image_url: r.author_image_url,
                    },
                    deleted_at: r.deleted_at,
                    edited_at: r.edited_at,
                }))
            }
            ChangeRecord::Update(r) => Ok(Self::Update {
                id: r.id,
                patch: MessagePatch {
                    text: r.text,
                    deleted_at: r.deleted_at,
                    edited_at: r.edited_at,
                },
            }),
        }
    }

    /// Die betroffene Nachrichten-ID
    pub fn message_id(&self) -> MessageId {
        match self {
            Self::Insert(m) => m.id,
            Self::Update { id, .. } => *id,
        }
    }
}
