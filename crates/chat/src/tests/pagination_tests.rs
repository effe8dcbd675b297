//! Nachladen aelterer History ueber die RoomView

use raumchat_backend::{ChatBackend, Operation};

use super::{umgebung, view_oeffnen, view_oeffnen_mit};
use crate::{PaginationStatus, SeitenErgebnis, TimelineEinstellungen};

fn kleine_startseite() -> TimelineEinstellungen {
    TimelineEinstellungen {
        start_limit: 10,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_blaettern_bis_zum_anfang() {
    let u = umgebung();
    u.history_anlegen(u.raum, 60);
    let (mut view, _) = view_oeffnen_mit(u.backend.sitzung(u.anna), u.raum, kleine_startseite()).await;
    assert_eq!(view.pagination_status(), PaginationStatus::Bereit);
    assert_eq!(view.sichtbare_nachrichten().len(), 10);

    let erg = view.mehr_laden().await.unwrap();
    assert_eq!(erg, SeitenErgebnis::Geladen { anzahl: 25, fertig: false });
    let erg = view.mehr_laden().await.unwrap();
    assert_eq!(erg, SeitenErgebnis::Geladen { anzahl: 25, fertig: false });
    let erg = view.mehr_laden().await.unwrap();
    assert_eq!(erg, SeitenErgebnis::Geladen { anzahl: 0, fertig: true });
    assert_eq!(view.pagination_status(), PaginationStatus::Fertig);

    // Weitere Aufrufe sind wirkungslos
    assert_eq!(view.mehr_laden().await.unwrap(), SeitenErgebnis::Uebersprungen);

    let timeline = view.sichtbare_nachrichten();
    assert_eq!(timeline.len(), 60);
    assert_eq!(timeline[0].nachricht().text, "n0");
    assert_eq!(timeline[59].nachricht().text, "n59");
    assert!(timeline
        .windows(2)
        .all(|w| w[0].nachricht().created_at <= w[1].nachricht().created_at));
}

#[tokio::test]
async fn test_kurze_seite_beendet_pagination() {
    let u = umgebung();
    u.history_anlegen(u.raum, 14);
    let (mut view, _) = view_oeffnen_mit(u.backend.sitzung(u.anna), u.raum, kleine_startseite()).await;

    let erg = view.mehr_laden().await.unwrap();
    assert_eq!(erg, SeitenErgebnis::Geladen { anzahl: 4, fertig: true });
    assert_eq!(view.sichtbare_nachrichten().len(), 14);
}

#[tokio::test]
async fn test_trigger_feuert_einmal_pro_sichtbarkeit() {
    let u = umgebung();
    u.history_anlegen(u.raum, 60);
    let (mut view, _) = view_oeffnen_mit(u.backend.sitzung(u.anna), u.raum, kleine_startseite()).await;

    let aeltester = view.sichtbare_nachrichten()[0].id();
    let anderer = view.sichtbare_nachrichten()[5].id();
    assert_eq!(view.beobachteter_eintrag(), Some(aeltester));

    assert_eq!(view.sichtbar_geworden(anderer).await.unwrap(), SeitenErgebnis::Uebersprungen);
    assert!(matches!(
        view.sichtbar_geworden(aeltester).await.unwrap(),
        SeitenErgebnis::Geladen { anzahl: 25, .. }
    ));
    // Derselbe Eintrag loest nicht erneut aus
    assert_eq!(view.sichtbar_geworden(aeltester).await.unwrap(), SeitenErgebnis::Uebersprungen);

    // Der Trigger wandert zum neuen aeltesten Eintrag
    let neuer_aeltester = view.sichtbare_nachrichten()[0].id();
    assert_ne!(neuer_aeltester, aeltester);
    assert_eq!(view.beobachteter_eintrag(), Some(neuer_aeltester));
}

#[tokio::test]
async fn test_kein_trigger_waehrend_laden() {
    let u = umgebung();
    u.history_anlegen(u.raum, 60);
    let (mut view, sitzung) = view_oeffnen_mit(u.backend.sitzung(u.anna), u.raum, kleine_startseite()).await;

    let aeltester = view.sichtbare_nachrichten()[0].id();
    let anfrage = view.pagination_starten().expect("Anfrage erwartet");
    assert_eq!(view.pagination_status(), PaginationStatus::Laedt);
    assert_eq!(view.beobachteter_eintrag(), None);
    assert!(view.pagination_starten().is_none());
    assert_eq!(view.sichtbar_geworden(aeltester).await.unwrap(), SeitenErgebnis::Uebersprungen);

    let seite = sitzung
        .fetch_page(anfrage.room_id, Some(anfrage.older_than), anfrage.limit)
        .await;
    assert!(matches!(
        view.seite_uebernehmen(anfrage, seite).unwrap(),
        SeitenErgebnis::Geladen { anzahl: 25, .. }
    ));
}

#[tokio::test]
async fn test_fehler_und_manueller_neuversuch() {
    let u = umgebung();
    u.history_anlegen(u.raum, 60);
    let (mut view, _) = view_oeffnen_mit(u.backend.sitzung(u.anna), u.raum, kleine_startseite()).await;
    let aeltester = view.sichtbare_nachrichten()[0].id();

    u.backend.fehler_einspeisen(Operation::SeiteLaden, 1);
    let err = view.mehr_laden().await.unwrap_err();
    assert!(err.ist_wiederholbar());
    assert_eq!(view.pagination_status(), PaginationStatus::Fehler);
    assert!(view.pagination_fehler().is_some());
    assert_eq!(view.sichtbare_nachrichten().len(), 10);

    // Kein automatisches Nachladen ueber den Trigger
    assert_eq!(view.beobachteter_eintrag(), None);
    assert_eq!(view.sichtbar_geworden(aeltester).await.unwrap(), SeitenErgebnis::Uebersprungen);

    let erg = view.mehr_laden().await.unwrap();
    assert_eq!(erg, SeitenErgebnis::Geladen { anzahl: 25, fertig: false });
    assert_eq!(view.pagination_status(), PaginationStatus::Bereit);
    assert!(view.pagination_fehler().is_none());
}

#[tokio::test]
async fn test_spaete_seite_nach_schliessen_wird_verworfen() {
    let u = umgebung();
    u.history_anlegen(u.raum, 60);
    let (mut view, sitzung) = view_oeffnen_mit(u.backend.sitzung(u.anna), u.raum, kleine_startseite()).await;

    let anfrage = view.pagination_starten().expect("Anfrage erwartet");
    let seite = sitzung
        .fetch_page(anfrage.room_id, Some(anfrage.older_than), anfrage.limit)
        .await;
    view.schliessen().await;

    assert_eq!(view.seite_uebernehmen(anfrage, seite).unwrap(), SeitenErgebnis::Verworfen);
    assert_eq!(view.store().history().len(), 10);
    assert!(view.pagination_starten().is_none());
}

#[tokio::test]
async fn test_seite_aus_vorherigem_raum_wird_verworfen() {
    let u = umgebung();
    let zweiter_raum = u.backend.raum_anlegen("Hinterzimmer", &[u.anna]);
    u.history_anlegen(u.raum, 60);
    u.history_anlegen(zweiter_raum, 60);

    let (mut alt, sitzung) = view_oeffnen_mit(u.backend.sitzung(u.anna), u.raum, kleine_startseite()).await;
    let anfrage = alt.pagination_starten().expect("Anfrage erwartet");
    alt.schliessen().await;

    // Raumwechsel: neue Ansicht, die alte Antwort trifft erst jetzt ein
    let (mut neu, _) =
        view_oeffnen_mit(u.backend.sitzung(u.anna), zweiter_raum, kleine_startseite()).await;
    let seite = sitzung
        .fetch_page(anfrage.room_id, Some(anfrage.older_than), anfrage.limit)
        .await;
    neu.pagination_starten().expect("Anfrage erwartet");

    assert_eq!(neu.seite_uebernehmen(anfrage, seite).unwrap(), SeitenErgebnis::Verworfen);
    assert_eq!(neu.store().history().len(), 10);
    assert_eq!(neu.pagination_status(), PaginationStatus::Laedt);
}

#[tokio::test]
async fn test_leerer_raum_startet_fertig() {
    let u = umgebung();
    let (mut view, _) = view_oeffnen(&u, u.anna).await;
    assert_eq!(view.pagination_status(), PaginationStatus::Fertig);
    assert_eq!(view.beobachteter_eintrag(), None);
    assert_eq!(view.mehr_laden().await.unwrap(), SeitenErgebnis::Uebersprungen);
}
