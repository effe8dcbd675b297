//! Aufbau, Abbruch und Abbau des Realtime-Kanals

use std::sync::Arc;
use std::time::Duration;

use raumchat_backend::ChatBackend;
use raumchat_core::{RaumchatError, SessionKey};

use super::{benutzer, umgebung, view_oeffnen};
use crate::{OutboxStatus, RealtimeListener, RoomView, TimelineEinstellungen};

async fn verzoegerte_view(
    u: &super::Umgebung,
) -> RoomView<raumchat_backend::MemorySession> {
    let sitzung = u
        .backend
        .sitzung(u.anna)
        .mit_verzoegerung(Duration::from_millis(10));
    RoomView::laden(
        Arc::new(sitzung.clone()),
        u.raum,
        benutzer(&sitzung),
        TimelineEinstellungen::default(),
    )
    .await
    .expect("Laden fehlgeschlagen")
}

#[tokio::test(start_paused = true)]
async fn test_abbruch_waehrend_autorisierung() {
    let u = umgebung();
    let mut view = verzoegerte_view(&u).await;
    let handle = view.abbruch_handle();

    let (verbunden, ()) = tokio::join!(view.realtime_verbinden(), async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        handle.abbrechen();
    });

    assert!(!verbunden);
    assert!(view.realtime_fehler().is_some());
    assert_eq!(u.backend.abo_anzahl(u.raum), 0);
    assert!(u.backend.presence(u.raum).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_abbruch_waehrend_abonnieren() {
    let u = umgebung();
    let mut view = verzoegerte_view(&u).await;
    let handle = view.abbruch_handle();

    // Autorisierung endet nach 10ms, Abonnieren nach 20ms
    let (verbunden, ()) = tokio::join!(view.realtime_verbinden(), async {
        tokio::time::sleep(Duration::from_millis(15)).await;
        handle.abbrechen();
    });

    assert!(!verbunden);
    assert!(!view.ist_verbunden());
    assert_eq!(u.backend.abo_anzahl(u.raum), 0);
    assert!(u.backend.presence(u.raum).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_abgebrochener_listener_baut_nicht_mehr_auf() {
    let u = umgebung();
    let sitzung = u.backend.sitzung(u.anna);
    let mut listener = RealtimeListener::neu(u.raum, SessionKey::neu(u.anna));
    listener.abbruch_handle().abbrechen();

    let err = listener.aufbauen(&sitzung).await.unwrap_err();
    assert!(matches!(err, RaumchatError::Abgebrochen(_)));
    assert_eq!(u.backend.abo_anzahl(u.raum), 0);
}

#[tokio::test(start_paused = true)]
async fn test_schliessen_waehrend_aufbau_laesst_keine_presence_zurueck() {
    let u = umgebung();
    let mut view = verzoegerte_view(&u).await;
    let handle = view.abbruch_handle();

    let (verbunden, ()) = tokio::join!(view.realtime_verbinden(), async {
        tokio::time::sleep(Duration::from_millis(12)).await;
        handle.abbrechen();
    });
    view.schliessen().await;

    assert!(!verbunden);
    assert_eq!(u.backend.abo_anzahl(u.raum), 0);
    assert!(u.backend.presence(u.raum).is_empty());
}

#[tokio::test]
async fn test_schliessen_zieht_presence_vor_abmeldung_zurueck() {
    let u = umgebung();
    let (mut anna, _) = view_oeffnen(&u, u.anna).await;
    let (mut bernd, _) = view_oeffnen(&u, u.bernd).await;
    assert_eq!(u.backend.presence(u.raum).len(), 2);

    bernd.schliessen().await;
    // Keine verwaiste Presence bis zum Timeout
    assert_eq!(u.backend.presence(u.raum).len(), 1);
    assert_eq!(u.backend.abo_anzahl(u.raum), 1);

    anna.signale_abarbeiten();
    assert_eq!(anna.online_anzahl(), Some(1));
}

#[tokio::test]
async fn test_abmelden_ohne_presence_rueckzug_hinterlaesst_eintrag() {
    let u = umgebung();
    let sitzung = u.backend.sitzung(u.bernd);
    let key = SessionKey::neu(u.bernd);

    let abo = sitzung.subscribe(u.raum, &key).await.unwrap();
    sitzung.announce_presence(&abo).await.unwrap();
    sitzung.unsubscribe(&abo).await;

    assert!(u.backend.presence(u.raum).contains(&key));
    u.backend.presence_timeout_ablaufen(u.raum);
    assert!(u.backend.presence(u.raum).is_empty());
}

#[tokio::test]
async fn test_schliessen_ist_idempotent() {
    let u = umgebung();
    let (mut view, _) = view_oeffnen(&u, u.anna).await;
    assert!(view.ist_verbunden());

    view.schliessen().await;
    view.schliessen().await;
    assert!(!view.ist_verbunden());
    assert_eq!(view.online_anzahl(), None);
    assert_eq!(u.backend.abo_anzahl(u.raum), 0);
    assert!(u.backend.presence(u.raum).is_empty());
}

#[tokio::test]
async fn test_drop_bricht_aufbau_ab() {
    let u = umgebung();
    let sitzung = u.backend.sitzung(u.anna);
    let view = RoomView::laden(
        Arc::new(sitzung.clone()),
        u.raum,
        benutzer(&sitzung),
        TimelineEinstellungen::default(),
    )
    .await
    .unwrap();
    let handle = view.abbruch_handle();
    drop(view);
    assert!(handle.ist_abgebrochen());
}

#[tokio::test]
async fn test_update_erreicht_auch_outbox_eintrag() {
    let u = umgebung();
    let (mut erste, _) = view_oeffnen(&u, u.anna).await;
    let (mut zweite, _) = view_oeffnen(&u, u.anna).await;

    let id = erste.senden("vorher").await.unwrap();
    zweite.signale_abarbeiten();
    assert!(zweite.bearbeiten(id, "nachher").await.unwrap());

    erste.signale_abarbeiten();
    let eintrag = erste.outbox().eintrag(id).unwrap();
    assert_eq!(eintrag.status, OutboxStatus::Erfolgreich);
    assert_eq!(eintrag.nachricht.text, "nachher");
    assert_eq!(erste.store().nachricht(id).unwrap().text, "nachher");

    let timeline = erste.sichtbare_nachrichten();
    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline[0].nachricht().text, "nachher");
}

#[tokio::test]
async fn test_signale_werden_in_reihenfolge_geliefert() {
    let u = umgebung();
    let (mut anna, _) = view_oeffnen(&u, u.anna).await;
    let (mut bernd, _) = view_oeffnen(&u, u.bernd).await;
    anna.signale_abarbeiten();

    for text in ["eins", "zwei", "drei"] {
        bernd.senden(text).await.unwrap();
    }

    // Einzeln ueber naechstes_signal abholen
    for _ in 0..3 {
        let signal = anna.naechstes_signal().await.expect("Signal erwartet");
        anna.signal_verarbeiten(signal);
    }
    let texte: Vec<&str> = anna.store().live().iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texte, ["eins", "zwei", "drei"]);

    let zeiten: Vec<_> = anna.store().live().iter().map(|m| m.created_at).collect();
    assert!(zeiten.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_verworfene_ansicht_verwaist_bis_zum_timeout() {
    let u = umgebung();
    let (anna, _) = view_oeffnen(&u, u.anna).await;
    let (mut bernd, _) = view_oeffnen(&u, u.bernd).await;
    bernd.signale_abarbeiten();
    assert_eq!(bernd.online_anzahl(), Some(2));

    // Ohne Schliessen bleibt die Sitzung bis zum Timeout anwesend
    drop(anna);
    assert_eq!(u.backend.presence(u.raum).len(), 2);

    u.backend.presence_timeout_ablaufen(u.raum);
    assert_eq!(u.backend.abo_anzahl(u.raum), 1);
    bernd.signale_abarbeiten();
    assert_eq!(bernd.online_anzahl(), Some(1));
}

#[tokio::test]
async fn test_volle_queue_trennt_kanal_mit_fehler() {
    let u = umgebung();
    let (mut anna, _) = view_oeffnen(&u, u.anna).await;
    let (mut bernd, _) = view_oeffnen(&u, u.bernd).await;

    // anna holt nichts ab, bernd schon
    for i in 0..300 {
        bernd.senden(&format!("n{i}")).await.unwrap();
        bernd.signale_abarbeiten();
    }
    assert!(bernd.ist_verbunden());
    assert_eq!(u.backend.abo_anzahl(u.raum), 1);

    assert!(anna.realtime_fehler().is_none());
    anna.signale_abarbeiten();
    assert!(anna.store().live().len() < 300);
    assert!(!anna.ist_verbunden());
    assert_eq!(anna.online_anzahl(), None);
    assert!(anna.realtime_fehler().is_some());
    assert!(anna.naechstes_signal().await.is_none());

    anna.schliessen().await;
    assert!(anna.ist_geschlossen());
}
