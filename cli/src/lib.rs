//! raumchat-cli – Terminal-Client fuer Raumchat
//!
//! Oeffnet einen Raum ueber dem In-Memory-Backend und bietet eine
//! zeilenbasierte Oberflaeche fuer Senden, Bearbeiten, Loeschen,
//! Nachladen und Scrollen.

pub mod befehl;
pub mod config;
pub mod sitzung;

pub use befehl::Befehl;
pub use config::ClientConfig;
