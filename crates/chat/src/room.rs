//! RoomView – verbindet Store, Pagination, Realtime, Outbox und Scroll-Tracker
//!
//! Eine `RoomView` entspricht einer geoeffneten Raumansicht. Alle Mutationen
//! laufen ueber `&mut self` und damit nacheinander; nebenlaeufig sind nur die
//! Netzwerkaufrufe, deren Ergebnisse ueber die zweigeteilten Schritte
//! (`senden_vorbereiten`/`senden_abschliessen`, `pagination_starten`/
//! `seite_uebernehmen`) in beliebiger Reihenfolge eintreffen duerfen.

use std::sync::Arc;

use raumchat_backend::{ChannelSignal, ChatBackend};
use raumchat_core::{
    message::text_normalisieren, Message, MessageId, RaumchatError, RealtimeEvent, Result, RoomId,
    SessionKey,
};

use crate::merge::merge;
use crate::outbox::{Outbox, Sendeauftrag};
use crate::pagination::{PaginationController, PaginationStatus, SeitenAnfrage};
use crate::realtime::{AbbruchHandle, RealtimeListener};
use crate::scroll::ScrollTracker;
use crate::store::MessageStore;
use crate::types::{
    AktuellerBenutzer, OutboxStatus, ScrollBefehl, SeitenErgebnis, TimelineEinstellungen,
    TimelineEintrag,
};

pub struct RoomView<B: ChatBackend> {
    backend: Arc<B>,
    room_id: RoomId,
    benutzer: AktuellerBenutzer,
    einstellungen: TimelineEinstellungen,
    store: MessageStore,
    pagination: PaginationController,
    outbox: Outbox,
    listener: RealtimeListener,
    realtime_fehler: Option<String>,
    scroll: ScrollTracker,
    geschlossen: bool,
}

impl<B: ChatBackend> RoomView<B> {
    // -----------------------------------------------------------------------
    // Lebenszyklus
    // -----------------------------------------------------------------------

    /// Oeffnet den Raum: Start-History laden, dann Realtime aufbauen
    ///
    /// Scheitert nur, wenn die Start-History nicht geladen werden kann.
    /// Ein fehlgeschlagener Realtime-Aufbau wird in `realtime_fehler` vermerkt.
    pub async fn oeffnen(
        backend: Arc<B>,
        room_id: RoomId,
        benutzer: AktuellerBenutzer,
        einstellungen: TimelineEinstellungen,
    ) -> Result<Self> {
        let mut view = Self::laden(backend, room_id, benutzer, einstellungen).await?;
        view.realtime_verbinden().await;
        Ok(view)
    }

    /// Laedt die Start-History, ohne den Realtime-Kanal zu oeffnen
    pub async fn laden(
        backend: Arc<B>,
        room_id: RoomId,
        benutzer: AktuellerBenutzer,
        einstellungen: TimelineEinstellungen,
    ) -> Result<Self> {
        let start = backend
            .fetch_page(room_id, None, einstellungen.start_limit)
            .await?;

        let store = MessageStore::neu(start);
        let pagination =
            PaginationController::neu(room_id, einstellungen.seiten_limit, store.ist_leer());
        let listener = RealtimeListener::neu(room_id, SessionKey::neu(benutzer.id));
        let scroll = ScrollTracker::neu(einstellungen.scroll_schwelle_px, store.live().len());

        tracing::info!(
            room_id = %room_id,
            user_id = %benutzer.id,
            nachrichten = store.history().len(),
            "Raum geoeffnet"
        );

        let mut view = Self {
            backend,
            room_id,
            benutzer,
            outbox: Outbox::neu(einstellungen.max_textlaenge),
            einstellungen,
            store,
            pagination,
            listener,
            realtime_fehler: None,
            scroll,
            geschlossen: false,
        };
        view.trigger_aktualisieren();
        Ok(view)
    }

    /// Baut den Realtime-Kanal auf. Gibt zurueck, ob die Verbindung steht.
    pub async fn realtime_verbinden(&mut self) -> bool {
        match self.listener.aufbauen(self.backend.as_ref()).await {
            Ok(()) => {
                self.realtime_fehler = None;
                true
            }
            Err(e) => {
                tracing::warn!(room_id = %self.room_id, fehler = %e, "Ohne Live-Updates weiter");
                self.realtime_fehler = Some(e.to_string());
                false
            }
        }
    }

    /// Schliesst die Ansicht
    ///
    /// Bricht einen laufenden Realtime-Aufbau ab, zieht die Presence zurueck,
    /// meldet das Abonnement ab und verwirft ausstehende Seitenergebnisse.
    pub async fn schliessen(&mut self) {
        if self.geschlossen {
            return;
        }
        self.geschlossen = true;
        self.pagination.abbrechen();
        self.listener.schliessen(self.backend.as_ref()).await;
        tracing::info!(room_id = %self.room_id, "Raum geschlossen");
    }

    pub fn abbruch_handle(&self) -> AbbruchHandle {
        self.listener.abbruch_handle()
    }

    fn offen_pruefen(&self) -> Result<()> {
        if self.geschlossen {
            return Err(RaumchatError::Abgebrochen(format!(
                "Raum {} ist geschlossen",
                self.room_id
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Zustand
    // -----------------------------------------------------------------------

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn benutzer(&self) -> &AktuellerBenutzer {
        &self.benutzer
    }

    pub fn einstellungen(&self) -> &TimelineEinstellungen {
        &self.einstellungen
    }

    pub fn ist_geschlossen(&self) -> bool {
        self.geschlossen
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn scroll(&self) -> &ScrollTracker {
        &self.scroll
    }

    /// Die zusammengefuehrte, sichtbare Timeline
    pub fn sichtbare_nachrichten(&self) -> Vec<TimelineEintrag<'_>> {
        merge(
            self.store.history(),
            self.store.live(),
            self.outbox.eintraege(),
        )
    }

    pub fn ist_verbunden(&self) -> bool {
        self.listener.ist_verbunden()
    }

    pub fn realtime_fehler(&self) -> Option<&str> {
        self.realtime_fehler.as_deref()
    }

    pub fn online_anzahl(&self) -> Option<usize> {
        self.listener.online_anzahl()
    }

    pub fn online_text(&self) -> Option<String> {
        self.online_anzahl().map(|n| match n {
            1 => "1 Benutzer online".to_string(),
            n => format!("{n} Benutzer online"),
        })
    }

    /// Nur eigene, nicht geloeschte Nachrichten koennen bearbeitet werden
    pub fn darf_bearbeiten(&self, nachricht: &Message) -> bool {
        nachricht.author_id == self.benutzer.id && !nachricht.ist_geloescht()
    }

    // -----------------------------------------------------------------------
    // Realtime
    // -----------------------------------------------------------------------

    /// Wartet auf das naechste Signal des Realtime-Kanals
    ///
    /// `None` ohne Kanal. Eine Trennung durch den Server wird in
    /// `realtime_fehler` vermerkt.
    pub async fn naechstes_signal(&mut self) -> Option<ChannelSignal> {
        let signal = self.listener.naechstes_signal().await;
        if signal.is_none() {
            self.trennung_vermerken();
        }
        signal
    }

    fn trennung_vermerken(&mut self) {
        if self.listener.ist_getrennt() && self.realtime_fehler.is_none() {
            tracing::warn!(room_id = %self.room_id, "Ohne Live-Updates weiter");
            self.realtime_fehler = Some("Realtime-Verbindung getrennt".to_string());
        }
    }

    /// Uebernimmt ein Signal in den Zustand der Ansicht
    pub fn signal_verarbeiten(&mut self, signal: ChannelSignal) {
        let Some(ereignis) = self.listener.verarbeiten(signal) else {
            return;
        };
        match ereignis {
            RealtimeEvent::Insert(nachricht) => {
                if self.store.live_anhaengen(nachricht) {
                    self.scroll.live_laenge_beobachten(self.store.live().len());
                    self.trigger_aktualisieren();
                }
            }
            RealtimeEvent::Update { id, patch } => {
                self.store.apply_update(id, &patch);
                self.outbox.patch_anwenden(id, &patch);
            }
        }
    }

    /// Verarbeitet alle bereits eingetroffenen Signale
    pub fn signale_abarbeiten(&mut self) -> usize {
        let mut anzahl = 0;
        while let Some(signal) = self.listener.signal_abholen() {
            self.signal_verarbeiten(signal);
            anzahl += 1;
        }
        self.trennung_vermerken();
        anzahl
    }

    // -----------------------------------------------------------------------
    // Senden, Bearbeiten, Loeschen
    // -----------------------------------------------------------------------

    /// Legt den Outbox-Eintrag an, ohne das Netzwerk zu beruehren
    pub fn senden_vorbereiten(&mut self, text: &str) -> Result<Sendeauftrag> {
        self.offen_pruefen()?;
        let auftrag = self.outbox.vorbereiten(text, &self.benutzer)?;
        self.trigger_aktualisieren();
        Ok(auftrag)
    }

    /// Uebernimmt die Serverantwort auf einen Sendeauftrag
    pub fn senden_abschliessen(&mut self, id: MessageId, ergebnis: Result<Message>) -> Result<()> {
        match ergebnis {
            Ok(kanonisch) => {
                self.outbox.bestaetigen(kanonisch);
                Ok(())
            }
            Err(e) => {
                self.outbox.fehlgeschlagen(id, e.to_string());
                Err(e)
            }
        }
    }

    /// Sendet eine Nachricht optimistisch
    pub async fn senden(&mut self, text: &str) -> Result<MessageId> {
        let auftrag = self.senden_vorbereiten(text)?;
        let ergebnis = self
            .backend
            .persist_message(auftrag.id, self.room_id, &auftrag.text)
            .await;
        self.senden_abschliessen(auftrag.id, ergebnis)?;
        Ok(auftrag.id)
    }

    /// Sendet den Text eines fehlgeschlagenen Eintrags unter neuer ID erneut
    pub async fn erneut_senden(&mut self, id: MessageId) -> Result<MessageId> {
        self.offen_pruefen()?;
        let eintrag = self
            .outbox
            .verwerfen(id)
            .ok_or_else(|| RaumchatError::nicht_gefunden(format!("Fehlgeschlagene Nachricht {id}")))?;
        self.senden(&eintrag.nachricht.text).await
    }

    /// Sucht eine bearbeitbare Nachricht in Store und bestaetigter Outbox
    fn eigene_nachricht(&self, id: MessageId) -> Result<&Message> {
        let nachricht = self
            .store
            .nachricht(id)
            .or_else(|| {
                self.outbox
                    .eintrag(id)
                    .filter(|e| e.status == OutboxStatus::Erfolgreich)
                    .map(|e| &e.nachricht)
            })
            .ok_or_else(|| RaumchatError::nicht_gefunden(format!("Nachricht {id}")))?;

        if nachricht.author_id != self.benutzer.id {
            return Err(RaumchatError::KeineBerechtigung(
                "Nur eigene Nachrichten koennen geaendert werden".into(),
            ));
        }
        Ok(nachricht)
    }

    fn serverfassung_uebernehmen(&mut self, nachricht: &Message) {
        let patch = nachricht.als_patch();
        self.store.apply_update(nachricht.id, &patch);
        self.outbox.patch_anwenden(nachricht.id, &patch);
    }

    /// Bearbeitet eine eigene Nachricht
    ///
    /// Gibt `false` zurueck, wenn sich der Text nicht aendert (kein Netzwerkaufruf).
    pub async fn bearbeiten(&mut self, id: MessageId, text: &str) -> Result<bool> {
        self.offen_pruefen()?;
        let text = text_normalisieren(text, self.einstellungen.max_textlaenge)?;
        let nachricht = self.eigene_nachricht(id)?;
        if nachricht.ist_geloescht() {
            return Err(RaumchatError::UngueltigeEingabe(
                "Geloeschte Nachricht kann nicht bearbeitet werden".into(),
            ));
        }
        if nachricht.text == text {
            return Ok(false);
        }

        let aktualisiert = self.backend.persist_edit(id, &text).await?;
        self.serverfassung_uebernehmen(&aktualisiert);
        tracing::debug!(message_id = %id, "Nachricht bearbeitet");
        Ok(true)
    }

    /// Loescht eine eigene Nachricht. `false` wenn sie bereits geloescht war.
    pub async fn loeschen(&mut self, id: MessageId) -> Result<bool> {
        self.offen_pruefen()?;
        if self.eigene_nachricht(id)?.ist_geloescht() {
            return Ok(false);
        }

        let geloescht = self.backend.persist_delete(id).await?;
        self.serverfassung_uebernehmen(&geloescht);
        tracing::debug!(message_id = %id, "Nachricht geloescht");
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Pagination
    // -----------------------------------------------------------------------

    pub fn pagination_status(&self) -> PaginationStatus {
        self.pagination.status()
    }

    pub fn pagination_fehler(&self) -> Option<&str> {
        self.pagination.letzter_fehler()
    }

    /// Der aktuell beobachtete aelteste Eintrag
    pub fn beobachteter_eintrag(&self) -> Option<MessageId> {
        self.pagination.trigger().beobachtet()
    }

    /// Beginnt das Laden einer aelteren Seite
    pub fn pagination_starten(&mut self) -> Option<SeitenAnfrage> {
        if self.geschlossen {
            return None;
        }
        self.pagination.start(&self.store)
    }

    /// Uebernimmt das Ergebnis einer Seitenanfrage
    pub fn seite_uebernehmen(
        &mut self,
        anfrage: SeitenAnfrage,
        ergebnis: Result<Vec<Message>>,
    ) -> Result<SeitenErgebnis> {
        let ergebnis = self
            .pagination
            .abschliessen(anfrage, ergebnis, &mut self.store);
        self.trigger_aktualisieren();
        ergebnis
    }

    /// Laedt die naechste aeltere Seite (auch manueller Neuversuch nach Fehler)
    pub async fn mehr_laden(&mut self) -> Result<SeitenErgebnis> {
        let Some(anfrage) = self.pagination_starten() else {
            return Ok(SeitenErgebnis::Uebersprungen);
        };
        let ergebnis = self
            .backend
            .fetch_page(anfrage.room_id, Some(anfrage.older_than), anfrage.limit)
            .await;
        self.seite_uebernehmen(anfrage, ergebnis)
    }

    /// Meldet, dass ein Eintrag in den sichtbaren Bereich gescrollt wurde
    pub async fn sichtbar_geworden(&mut self, id: MessageId) -> Result<SeitenErgebnis> {
        if !self.pagination.trigger_ausloesen(id) {
            return Ok(SeitenErgebnis::Uebersprungen);
        }
        self.mehr_laden().await
    }

    fn trigger_aktualisieren(&mut self) {
        let aeltester = self.sichtbare_nachrichten().first().map(|e| e.id());
        self.pagination.trigger_setzen(aeltester);
    }

    // -----------------------------------------------------------------------
    // Scroll
    // -----------------------------------------------------------------------

    /// Neue Scroll-Position (Abstand zum unteren Rand in px)
    pub fn gescrollt(&mut self, abstand_px: f64) -> bool {
        self.scroll.scrollen(abstand_px)
    }

    pub fn zum_neuesten_springen(&mut self) -> ScrollBefehl {
        self.scroll.zum_neuesten_springen()
    }

    pub fn ungelesen(&self) -> usize {
        self.scroll.ungelesen()
    }

    pub fn indikator_text(&self) -> Option<String> {
        self.scroll.indikator_text()
    }
}
