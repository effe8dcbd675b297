//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `RC_LOG_LEVEL`: Log-Level oder Filter-Direktive (z.B. `raumchat_chat=debug`), Standard: info
//! - `RC_LOG_FORMAT`: Format (text/json), Standard: text
//!
//! Der Terminal-Client schreibt seine Ausgabe nach stdout, deshalb gehen
//! Logs nach stderr oder in eine Datei.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::{fmt, EnvFilter};

pub const LEVEL_VARIABLE: &str = "RC_LOG_LEVEL";
pub const FORMAT_VARIABLE: &str = "RC_LOG_FORMAT";

/// Ausgabeformat der Logzeilen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Unbekannte Werte fallen auf `Text` zurueck
    pub fn aus_str(format: &str) -> Self {
        match format {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Initialisiert das Logging-System.
///
/// `RC_LOG_LEVEL` und `RC_LOG_FORMAT` haben Vorrang vor den uebergebenen
/// Werten. Mit `datei` wird an die Datei angehaengt statt nach stderr
/// geschrieben. Ein zweiter Aufruf im selben Prozess ist ein Fehler.
pub fn logging_initialisieren(level: &str, format: &str, datei: Option<&Path>) -> anyhow::Result<()> {
    let filter = filter_erstellen(level);
    let format = LogFormat::aus_str(&log_format_aus_env().unwrap_or_else(|| format.to_string()));

    let ergebnis = match (format, datei) {
        (LogFormat::Json, Some(pfad)) => fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_writer(Mutex::new(datei_oeffnen(pfad)?))
            .try_init(),
        (LogFormat::Json, None) => fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .try_init(),
        (LogFormat::Text, Some(pfad)) => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_ansi(false)
            .with_writer(Mutex::new(datei_oeffnen(pfad)?))
            .try_init(),
        (LogFormat::Text, None) => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    ergebnis.map_err(|e| anyhow::anyhow!("Logging bereits initialisiert: {e}"))
}

/// Filter aus `RC_LOG_LEVEL`, sonst aus `level`, zuletzt `info`
fn filter_erstellen(level: &str) -> EnvFilter {
    log_level_aus_env()
        .and_then(|direktive| EnvFilter::try_new(direktive).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn datei_oeffnen(pfad: &Path) -> anyhow::Result<std::fs::File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(pfad)
        .with_context(|| format!("Log-Datei '{}' nicht beschreibbar", pfad.display()))
}

/// Log-Level aus der Umgebung, falls gesetzt
pub fn log_level_aus_env() -> Option<String> {
    std::env::var(LEVEL_VARIABLE).ok()
}

/// Log-Format aus der Umgebung, falls gesetzt
pub fn log_format_aus_env() -> Option<String> {
    std::env::var(FORMAT_VARIABLE).ok()
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}
