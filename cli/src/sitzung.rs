//! Interaktive Raumsitzung im Terminal
//!
//! Befuellt ein In-Memory-Backend, oeffnet den konfigurierten Raum und
//! verarbeitet Eingabezeilen und Realtime-Signale nebenlaeufig.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Local, Utc};
use raumchat_backend::{ChatBackend, MemoryBackend};
use raumchat_chat::{AktuellerBenutzer, OutboxStatus, RoomView, SeitenErgebnis, TimelineEintrag};
use raumchat_core::{MessageId, RaumchatError, RoomId, UserId};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use crate::befehl::Befehl;
use crate::config::{ClientConfig, SitzungEinstellungen};

/// Vorbereitetes Backend mit Raum und lokalem Benutzer
pub struct Umgebung {
    pub backend: MemoryBackend,
    pub raum: RoomId,
    pub benutzer: UserId,
}

/// Legt Benutzer, Raum und Beispiel-History an
pub fn umgebung_anlegen(einstellungen: &SitzungEinstellungen) -> anyhow::Result<Umgebung> {
    let backend = MemoryBackend::neu();
    let benutzer = backend.benutzer_anlegen(
        &einstellungen.benutzername,
        einstellungen.bild_url.as_deref(),
    );
    let mut mitglieder = vec![benutzer];
    mitglieder.extend(
        einstellungen
            .mitglieder
            .iter()
            .map(|name| backend.benutzer_anlegen(name, None)),
    );
    let raum = backend.raum_anlegen(&einstellungen.raumname, &mitglieder);

    let anzahl = einstellungen.beispiel_nachrichten;
    let basis = Utc::now() - Duration::minutes(anzahl as i64 + 1);
    for i in 0..anzahl {
        let autor = mitglieder[i % mitglieder.len()];
        backend
            .nachricht_importieren(
                raum,
                autor,
                &format!("Beispielnachricht {}", i + 1),
                basis + Duration::minutes(i as i64),
            )
            .context("Beispiel-History anlegen")?;
    }

    tracing::info!(
        raum = %einstellungen.raumname,
        mitglieder = mitglieder.len(),
        nachrichten = anzahl,
        "In-Memory-Backend befuellt"
    );
    Ok(Umgebung {
        backend,
        raum,
        benutzer,
    })
}

// ---------------------------------------------------------------------------
// Darstellung
// ---------------------------------------------------------------------------

fn zeile_darstellen<W: Write>(out: &mut W, nr: usize, eintrag: &TimelineEintrag<'_>) -> std::io::Result<()> {
    let m = eintrag.nachricht();
    let zeit = m.created_at.with_timezone(&Local).format("%H:%M");
    let bearbeitet = if m.zeigt_bearbeitet() { " (bearbeitet)" } else { "" };
    let status = match eintrag.status() {
        Some(OutboxStatus::Ausstehend) => " [sendet...]",
        Some(OutboxStatus::Fehler) => " [fehlgeschlagen, /retry]",
        Some(OutboxStatus::Erfolgreich) | None => "",
    };
    writeln!(
        out,
        "{nr:>4} {zeit} {}: {}{bearbeitet}{status}",
        m.author.name,
        m.display_text()
    )
}

/// Gibt die Eintraege ab Position `ab` (0-basiert) aus
pub fn eintraege_darstellen<B: ChatBackend, W: Write>(
    view: &RoomView<B>,
    ab: usize,
    out: &mut W,
) -> std::io::Result<()> {
    for (i, eintrag) in view.sichtbare_nachrichten().iter().enumerate().skip(ab) {
        zeile_darstellen(out, i + 1, eintrag)?;
    }
    Ok(())
}

/// Status unter der Timeline: Online-Anzahl, Hinweise, Fehler
pub fn status_darstellen<B: ChatBackend, W: Write>(view: &RoomView<B>, out: &mut W) -> std::io::Result<()> {
    match (view.online_text(), view.realtime_fehler()) {
        (Some(online), _) => write!(out, "-- {online}")?,
        (None, Some(fehler)) => write!(out, "-- keine Live-Updates ({fehler})")?,
        (None, None) => write!(out, "-- offline")?,
    }
    if let Some(hinweis) = view.indikator_text() {
        write!(out, " | {hinweis} (/unten)")?;
    }
    if let Some(fehler) = view.pagination_fehler() {
        write!(out, " | Nachladen fehlgeschlagen: {fehler} (/mehr)")?;
    }
    writeln!(out)
}

fn nachricht_nr<B: ChatBackend>(view: &RoomView<B>, nr: usize) -> Result<MessageId, RaumchatError> {
    view.sichtbare_nachrichten()
        .get(nr.wrapping_sub(1))
        .map(|e| e.id())
        .ok_or_else(|| RaumchatError::nicht_gefunden(format!("Nachricht Nummer {nr}")))
}

// ---------------------------------------------------------------------------
// Befehle
// ---------------------------------------------------------------------------

/// Fuehrt einen Befehl aus. `false` wenn die Sitzung enden soll.
///
/// Fehler der Timeline werden dem Benutzer angezeigt, nur Ausgabefehler
/// brechen die Sitzung ab.
pub async fn befehl_ausfuehren<B: ChatBackend, W: Write>(
    view: &mut RoomView<B>,
    befehl: Befehl,
    out: &mut W,
) -> anyhow::Result<bool> {
    let vorher = view.sichtbare_nachrichten().len();
    let ergebnis: Result<(), RaumchatError> = match befehl {
        Befehl::Beenden => return Ok(false),
        Befehl::Senden(text) => view.senden(&text).await.map(|_| ()),
        Befehl::ErneutSenden { nr } => match nachricht_nr(view, nr) {
            Ok(id) => view.erneut_senden(id).await.map(|_| ()),
            Err(e) => Err(e),
        },
        Befehl::Bearbeiten { nr, text } => match nachricht_nr(view, nr) {
            Ok(id) => view.bearbeiten(id, &text).await.map(|geaendert| {
                if !geaendert {
                    tracing::debug!(message_id = %id, "Text unveraendert");
                }
            }),
            Err(e) => Err(e),
        },
        Befehl::Loeschen { nr } => match nachricht_nr(view, nr) {
            Ok(id) => view.loeschen(id).await.map(|_| ()),
            Err(e) => Err(e),
        },
        Befehl::MehrLaden => match view.mehr_laden().await {
            Ok(SeitenErgebnis::Geladen { anzahl, fertig }) => {
                eintraege_darstellen(view, 0, out)?;
                writeln!(out, "-- {anzahl} aeltere Nachrichten geladen")?;
                if fertig {
                    writeln!(out, "-- Anfang des Raums erreicht")?;
                }
                Ok(())
            }
            Ok(_) => {
                writeln!(out, "-- nichts nachzuladen")?;
                Ok(())
            }
            Err(e) => Err(e),
        },
        Befehl::Scrollen(px) => {
            view.gescrollt(px);
            Ok(())
        }
        Befehl::NachUnten => {
            view.zum_neuesten_springen();
            eintraege_darstellen(view, 0, out)?;
            Ok(())
        }
        Befehl::Liste => {
            eintraege_darstellen(view, 0, out)?;
            Ok(())
        }
    };

    if let Err(e) = ergebnis {
        writeln!(out, "! {e}")?;
    }
    // Neu hinzugekommene Eintraege (eigene Nachrichten) sofort zeigen
    let nachher = view.sichtbare_nachrichten().len();
    if nachher > vorher {
        eintraege_darstellen(view, vorher, out)?;
    }
    status_darstellen(view, out)?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Hauptschleife
// ---------------------------------------------------------------------------

/// Startet die interaktive Sitzung und laeuft bis `/quit` oder Eingabeende
pub async fn ausfuehren(config: ClientConfig) -> anyhow::Result<()> {
    let umgebung = umgebung_anlegen(&config.sitzung)?;
    let sitzung = umgebung.backend.sitzung(umgebung.benutzer);
    let benutzer = AktuellerBenutzer {
        id: umgebung.benutzer,
        profil: sitzung.profil()?,
    };

    let mut view = RoomView::oeffnen(
        Arc::new(sitzung),
        umgebung.raum,
        benutzer,
        config.timeline.clone(),
    )
    .await?;
    view.signale_abarbeiten();

    let mut out = std::io::stdout();
    writeln!(out, "== {} ==", config.sitzung.raumname)?;
    eintraege_darstellen(&view, 0, &mut out)?;
    status_darstellen(&view, &mut out)?;
    out.flush()?;

    let zeilen = BufReader::new(tokio::io::stdin()).lines();
    sitzung_fuehren(&mut view, zeilen, &mut out).await
}

/// Verarbeitet Eingabezeilen und Signale und schliesst danach die Ansicht
///
/// Die Ansicht wird auch nach einem Ein- oder Ausgabefehler geschlossen.
pub async fn sitzung_fuehren<B, R, W>(
    view: &mut RoomView<B>,
    zeilen: Lines<R>,
    out: &mut W,
) -> anyhow::Result<()>
where
    B: ChatBackend,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let ergebnis = schleife(view, zeilen, out).await;
    view.schliessen().await;
    ergebnis
}

async fn schleife<B, R, W>(
    view: &mut RoomView<B>,
    mut zeilen: Lines<R>,
    out: &mut W,
) -> anyhow::Result<()>
where
    B: ChatBackend,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut kanal_offen = view.ist_verbunden();

    loop {
        tokio::select! {
            zeile = zeilen.next_line() => {
                let Some(zeile) = zeile? else {
                    break;
                };
                match Befehl::parsen(&zeile) {
                    Ok(Some(befehl)) => {
                        if !befehl_ausfuehren(view, befehl, out).await? {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => writeln!(out, "! {e}")?,
                }
            }
            signal = view.naechstes_signal(), if kanal_offen => {
                let Some(signal) = signal else {
                    kanal_offen = false;
                    status_darstellen(view, out)?;
                    out.flush()?;
                    continue;
                };
                let vorher = view.sichtbare_nachrichten().len();
                view.signal_verarbeiten(signal);
                view.signale_abarbeiten();
                let nachher = view.sichtbare_nachrichten().len();
                if nachher > vorher && view.scroll().am_ende() {
                    eintraege_darstellen(view, vorher, out)?;
                }
                status_darstellen(view, out)?;
            }
        }
        out.flush()?;
    }
    Ok(())
}
