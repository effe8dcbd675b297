//! Eingabezeilen des Terminal-Clients

use raumchat_core::{RaumchatError, Result};

/// Ein Befehl aus einer Eingabezeile
#[derive(Debug, Clone, PartialEq)]
pub enum Befehl {
    /// Aeltere Nachrichten laden (`/mehr`)
    MehrLaden,
    /// Eigene Nachricht Nummer `nr` bearbeiten (`/edit <n> <text>`)
    Bearbeiten { nr: usize, text: String },
    /// Eigene Nachricht Nummer `nr` loeschen (`/del <n>`)
    Loeschen { nr: usize },
    /// Fehlgeschlagene Nachricht Nummer `nr` erneut senden (`/retry <n>`)
    ErneutSenden { nr: usize },
    /// Scroll-Abstand zum Ende setzen (`/scroll <px>`)
    Scrollen(f64),
    /// Zum neuesten Eintrag springen (`/unten`)
    NachUnten,
    /// Timeline neu ausgeben (`/liste`)
    Liste,
    /// Raum verlassen (`/quit`)
    Beenden,
    /// Alles andere wird gesendet
    Senden(String),
}

impl Befehl {
    /// Zerlegt eine Eingabezeile. `None` fuer leere Zeilen.
    pub fn parsen(zeile: &str) -> Result<Option<Self>> {
        let zeile = zeile.trim();
        if zeile.is_empty() {
            return Ok(None);
        }
        if !zeile.starts_with('/') {
            return Ok(Some(Self::Senden(zeile.to_string())));
        }

        let (name, rest) = zeile.split_once(' ').unwrap_or((zeile, ""));
        let rest = rest.trim();
        let befehl = match name {
            "/mehr" => Self::MehrLaden,
            "/unten" => Self::NachUnten,
            "/liste" => Self::Liste,
            "/quit" | "/exit" => Self::Beenden,
            "/del" => Self::Loeschen {
                nr: nummer(rest)?,
            },
            "/retry" => Self::ErneutSenden {
                nr: nummer(rest)?,
            },
            "/edit" => {
                let (nr, text) = rest.split_once(' ').unwrap_or((rest, ""));
                Self::Bearbeiten {
                    nr: nummer(nr)?,
                    text: text.trim().to_string(),
                }
            }
            "/scroll" => Self::Scrollen(rest.parse().map_err(|_| {
                RaumchatError::UngueltigeEingabe(format!("Kein Pixelwert: '{rest}'"))
            })?),
            andere => {
                return Err(RaumchatError::UngueltigeEingabe(format!(
                    "Unbekannter Befehl: {andere}"
                )))
            }
        };
        Ok(Some(befehl))
    }
}

fn nummer(text: &str) -> Result<usize> {
    match text.parse::<usize>() {
        Ok(nr) if nr > 0 => Ok(nr),
        _ => Err(RaumchatError::UngueltigeEingabe(format!(
            "Keine Nachrichtennummer: '{text}'"
        ))),
    }
}
