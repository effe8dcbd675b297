//! Tests fuer die RoomView ueber dem In-Memory-Backend

mod pagination_tests;
mod realtime_tests;

use std::sync::Arc;

use chrono::{Duration, Utc};
use raumchat_backend::{MemoryBackend, MemorySession};
use raumchat_core::{RoomId, UserId};

use crate::{AktuellerBenutzer, RoomView, TimelineEinstellungen};

/// Ein Raum "Lobby" mit den Mitgliedern anna und bernd
struct Umgebung {
    backend: MemoryBackend,
    raum: RoomId,
    anna: UserId,
    bernd: UserId,
}

fn umgebung() -> Umgebung {
    let backend = MemoryBackend::neu();
    let anna = backend.benutzer_anlegen("anna", Some("https://bilder.example/anna.png"));
    let bernd = backend.benutzer_anlegen("bernd", None);
    let raum = backend.raum_anlegen("Lobby", &[anna, bernd]);
    Umgebung {
        backend,
        raum,
        anna,
        bernd,
    }
}

impl Umgebung {
    /// Legt `anzahl` Nachrichten von anna im Minutenabstand in der Vergangenheit an
    fn history_anlegen(&self, raum: RoomId, anzahl: i64) {
        let basis = Utc::now() - Duration::days(1);
        for i in 0..anzahl {
            self.backend
                .nachricht_importieren(raum, self.anna, &format!("n{i}"), basis + Duration::minutes(i))
                .expect("Import fehlgeschlagen");
        }
    }
}

fn benutzer(sitzung: &MemorySession) -> AktuellerBenutzer {
    AktuellerBenutzer {
        id: sitzung.user_id(),
        profil: sitzung.profil().expect("Profil fehlt"),
    }
}

async fn view_oeffnen_mit(
    sitzung: MemorySession,
    raum: RoomId,
    einstellungen: TimelineEinstellungen,
) -> (RoomView<MemorySession>, Arc<MemorySession>) {
    let benutzer = benutzer(&sitzung);
    let sitzung = Arc::new(sitzung);
    let view = RoomView::oeffnen(sitzung.clone(), raum, benutzer, einstellungen)
        .await
        .expect("Raum oeffnen fehlgeschlagen");
    (view, sitzung)
}

async fn view_oeffnen(u: &Umgebung, user: UserId) -> (RoomView<MemorySession>, Arc<MemorySession>) {
    view_oeffnen_mit(u.backend.sitzung(user), u.raum, TimelineEinstellungen::default()).await
}
