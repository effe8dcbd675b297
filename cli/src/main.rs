//! Raumchat Terminal-Client – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet die Sitzung.

use std::path::Path;

use anyhow::Result;
use raumchat_cli::{sitzung, ClientConfig};
use raumchat_observability::logging_initialisieren;

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("RAUMCHAT_CONFIG").unwrap_or_else(|_| "raumchat.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = ClientConfig::laden(&config_pfad)?;

    logging_initialisieren(
        &config.logging.level,
        &config.logging.format,
        config.logging.datei.as_deref().map(Path::new),
    )?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        benutzer = %config.sitzung.benutzername,
        "Raumchat Client wird gestartet"
    );

    sitzung::ausfuehren(config).await
}
