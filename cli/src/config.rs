//! Client-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! Standardwerte, sodass der Client ohne Konfigurationsdatei startet.

use raumchat_chat::TimelineEinstellungen;
use serde::{Deserialize, Serialize};

/// Vollstaendige Client-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Benutzer und Raum der Sitzung
    pub sitzung: SitzungEinstellungen,
    /// Pagination, Scroll-Schwelle und Textlaenge
    pub timeline: TimelineEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitzungEinstellungen {
    /// Anzeigename des lokalen Benutzers
    pub benutzername: String,
    /// Avatar-URL (optional)
    pub bild_url: Option<String>,
    /// Name des Raums, der beim Start geoeffnet wird
    pub raumname: String,
    /// Weitere Mitglieder, die im In-Memory-Backend angelegt werden
    pub mitglieder: Vec<String>,
    /// Anzahl vorab angelegter Nachrichten, damit es etwas zu blaettern gibt
    pub beispiel_nachrichten: usize,
}

impl Default for SitzungEinstellungen {
    fn default() -> Self {
        Self {
            benutzername: "gast".into(),
            bild_url: None,
            raumname: "Lobby".into(),
            mitglieder: vec!["emma".into()],
            beispiel_nachrichten: 60,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
    /// Log-Datei-Pfad (leer = stderr)
    pub datei: Option<String>,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "text".into(),
            datei: None,
        }
    }
}

impl ClientConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                config.pruefen()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Prueft Werte, die toml allein nicht ablehnt
    pub fn pruefen(&self) -> anyhow::Result<()> {
        if self.sitzung.benutzername.trim().is_empty() {
            anyhow::bail!("sitzung.benutzername darf nicht leer sein");
        }
        if self.timeline.seiten_limit == 0 || self.timeline.start_limit == 0 {
            anyhow::bail!("timeline.seiten_limit und timeline.start_limit muessen > 0 sein");
        }
        if !raumchat_observability::log_level_gueltig(&self.logging.level) {
            anyhow::bail!("Unbekanntes Log-Level: '{}'", self.logging.level);
        }
        if !raumchat_observability::log_format_gueltig(&self.logging.format) {
            anyhow::bail!("Unbekanntes Log-Format: '{}'", self.logging.format);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.sitzung.raumname, "Lobby");
        assert_eq!(cfg.timeline.seiten_limit, 25);
        assert_eq!(cfg.timeline.scroll_schwelle_px, 50.0);
        assert!(cfg.pruefen().is_ok());
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [sitzung]
            benutzername = "anna"
            mitglieder = []

            [timeline]
            seiten_limit = 10
        "#;
        let cfg: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.sitzung.benutzername, "anna");
        assert!(cfg.sitzung.mitglieder.is_empty());
        assert_eq!(cfg.timeline.seiten_limit, 10);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.timeline.start_limit, 100);
        assert_eq!(cfg.logging.format, "text");
    }

    #[test]
    fn fehlende_datei_ergibt_standardwerte() {
        let dir = tempfile::tempdir().unwrap();
        let pfad = dir.path().join("gibt-es-nicht.toml");
        let cfg = ClientConfig::laden(pfad.to_str().unwrap()).unwrap();
        assert_eq!(cfg.sitzung.benutzername, "gast");
    }

    #[test]
    fn datei_wird_gelesen() {
        let mut datei = tempfile::NamedTempFile::new().unwrap();
        writeln!(datei, "[sitzung]\nraumname = \"Hinterzimmer\"").unwrap();
        let cfg = ClientConfig::laden(datei.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.sitzung.raumname, "Hinterzimmer");
    }

    #[test]
    fn ungueltige_werte_abgelehnt() {
        let mut datei = tempfile::NamedTempFile::new().unwrap();
        writeln!(datei, "[logging]\nlevel = \"laut\"").unwrap();
        assert!(ClientConfig::laden(datei.path().to_str().unwrap()).is_err());

        let mut datei = tempfile::NamedTempFile::new().unwrap();
        writeln!(datei, "[timeline]\nseiten_limit = 0").unwrap();
        assert!(ClientConfig::laden(datei.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn kaputtes_toml_ist_fehler() {
        let mut datei = tempfile::NamedTempFile::new().unwrap();
        writeln!(datei, "[sitzung").unwrap();
        assert!(ClientConfig::laden(datei.path().to_str().unwrap()).is_err());
    }
}
