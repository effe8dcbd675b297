//! Gemeinsame Identifikationstypen fuer Raumchat
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// UUID-Newtype mit Anzeige-Praefix, z.B. `room:<uuid>`
macro_rules! uuid_id {
    ($(#[$attr:meta])* $name:ident, $praefix:literal) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($praefix, ":{}"), self.0)
            }
        }
    };
}

uuid_id!(UserId, "user");
uuid_id!(RoomId, "room");
uuid_id!(
    /// Wird vom Client vor dem Senden erzeugt, damit die optimistische Kopie
    /// im Outbox und der spaeter bestaetigte Datensatz dieselbe Identitaet tragen.
    MessageId,
    "msg"
);

/// Presence-Schluessel einer einzelnen Sitzung
///
/// Eindeutig pro geoeffneter Raumansicht, damit zwei Tabs desselben
/// Benutzers als zwei Verbindungen gezaehlt werden.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// Erzeugt einen neuen Schluessel fuer den angegebenen Benutzer
    pub fn neu(user_id: UserId) -> Self {
        Self(format!("{}:{}", user_id.0, Uuid::new_v4()))
    }

    /// Uebernimmt einen bereits bekannten Schluessel (z.B. aus einem Presence-Sync)
    pub fn aus_string(wert: impl Into<String>) -> Self {
        Self(wert.into())
    }

    pub fn als_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
