//! Realtime Listener – genau ein Abonnement pro (Raum, Sitzung)
//!
//! ## Lebenszyklus
//! 1. `aufbauen`: Auth-Handshake abwarten, Kanal abonnieren, Presence melden.
//!    Jeder Schritt kann ueber das `AbbruchHandle` abgebrochen werden; ein
//!    Abbruch unterdrueckt alle weiteren Seiteneffekte des Aufbaus.
//! 2. Signale abholen und mit `verarbeiten` in Ereignisse uebersetzen.
//! 3. `schliessen`: Presence zurueckziehen, erst danach abmelden.
//!
//! Trennt der Server den Kanal, verwirft der Listener das Abonnement nach
//! dem letzten gepufferten Signal und meldet sich als getrennt.

use std::collections::BTreeSet;

use raumchat_backend::{ChannelSignal, ChatBackend, Subscription};
use raumchat_core::{RaumchatError, RealtimeEvent, Result, RoomId, SessionKey};
use tokio_util::sync::CancellationToken;

/// Bricht den Aufbau eines Listeners von aussen ab
#[derive(Debug, Clone)]
pub struct AbbruchHandle {
    token: CancellationToken,
}

impl AbbruchHandle {
    pub fn abbrechen(&self) {
        self.token.cancel();
    }

    pub fn ist_abgebrochen(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug)]
pub struct RealtimeListener {
    room_id: RoomId,
    session_key: SessionKey,
    abbruch: CancellationToken,
    abo: Option<Subscription>,
    presence: BTreeSet<SessionKey>,
    getrennt: bool,
}

impl RealtimeListener {
    pub fn neu(room_id: RoomId, session_key: SessionKey) -> Self {
        Self {
            room_id,
            session_key,
            abbruch: CancellationToken::new(),
            abo: None,
            presence: BTreeSet::new(),
            getrennt: false,
        }
    }

    pub fn session_key(&self) -> &SessionKey {
        &self.session_key
    }

    pub fn abbruch_handle(&self) -> AbbruchHandle {
        AbbruchHandle {
            token: self.abbruch.clone(),
        }
    }

    pub fn ist_verbunden(&self) -> bool {
        self.abo.is_some()
    }

    /// Der Server hat den Kanal seit dem letzten Aufbau geschlossen
    pub fn ist_getrennt(&self) -> bool {
        self.getrennt
    }

    fn abgebrochen(&self) -> RaumchatError {
        RaumchatError::Abgebrochen(format!("Realtime-Aufbau fuer {}", self.room_id))
    }

    /// Baut das Abonnement auf und meldet die Presence an
    pub async fn aufbauen<B: ChatBackend>(&mut self, backend: &B) -> Result<()> {
        if self.abo.is_some() {
            return Ok(());
        }

        let token = self.abbruch.clone();
        tokio::select! {
            biased;
            () = token.cancelled() => return Err(self.abgebrochen()),
            ergebnis = backend.realtime_autorisieren() => ergebnis?,
        }

        let abo = tokio::select! {
            biased;
            () = token.cancelled() => return Err(self.abgebrochen()),
            ergebnis = backend.subscribe(self.room_id, &self.session_key) => ergebnis?,
        };

        // Ansicht wurde geschlossen, waehrend der Kanal aufgebaut wurde
        if token.is_cancelled() {
            backend.unsubscribe(&abo).await;
            tracing::debug!(room_id = %self.room_id, "Abonnement nach Abbruch verworfen");
            return Err(self.abgebrochen());
        }

        if let Err(e) = backend.announce_presence(&abo).await {
            backend.unsubscribe(&abo).await;
            return Err(e);
        }

        tracing::info!(
            room_id = %self.room_id,
            subscription = %abo.id,
            session = %self.session_key,
            "Realtime-Abonnement aufgebaut"
        );
        self.abo = Some(abo);
        self.getrennt = false;
        Ok(())
    }

    /// Zieht die Presence zurueck und schliesst das Abonnement
    ///
    /// Mehrfacher Aufruf ist unschaedlich.
    pub async fn schliessen<B: ChatBackend>(&mut self, backend: &B) {
        self.abbruch.cancel();
        let Some(abo) = self.abo.take() else {
            return;
        };

        if let Err(e) = backend.withdraw_presence(&abo).await {
            tracing::warn!(subscription = %abo.id, fehler = %e, "Presence-Abmeldung fehlgeschlagen");
        }
        backend.unsubscribe(&abo).await;
        self.presence.clear();
        tracing::info!(room_id = %self.room_id, subscription = %abo.id, "Realtime-Abonnement geschlossen");
    }

    /// Wartet auf das naechste Signal
    ///
    /// `None` ohne Abonnement oder wenn der Kanal geschlossen wurde.
    pub async fn naechstes_signal(&mut self) -> Option<ChannelSignal> {
        let signal = match self.abo.as_mut() {
            Some(abo) => abo.naechstes_signal().await,
            None => None,
        };
        if signal.is_none() {
            self.trennung_pruefen();
        }
        signal
    }

    /// Holt ein bereits eingetroffenes Signal ohne zu warten
    pub fn signal_abholen(&mut self) -> Option<ChannelSignal> {
        let signal = self.abo.as_mut()?.signal_abholen();
        if signal.is_none() {
            self.trennung_pruefen();
        }
        signal
    }

    /// Verwirft ein vom Server geschlossenes Abonnement
    fn trennung_pruefen(&mut self) {
        if !self.abo.as_ref().is_some_and(Subscription::ist_getrennt) {
            return;
        }
        if let Some(abo) = self.abo.take() {
            tracing::warn!(
                room_id = %self.room_id,
                subscription = %abo.id,
                "Realtime-Kanal vom Server getrennt"
            );
        }
        self.presence.clear();
        self.getrennt = true;
    }

    /// Verarbeitet ein Signal
    ///
    /// Presence-Signale werden intern verbucht. Ungueltige Nutzlasten werden
    /// protokolliert und verworfen.
    pub fn verarbeiten(&mut self, signal: ChannelSignal) -> Option<RealtimeEvent> {
        match signal {
            ChannelSignal::PresenceSync(menge) => {
                tracing::debug!(room_id = %self.room_id, anzahl = menge.len(), "Presence-Sync");
                self.presence = menge;
                None
            }
            ChannelSignal::Aenderung(payload) => match RealtimeEvent::aus_payload(&payload) {
                Ok(ereignis) => {
                    tracing::debug!(message_id = %ereignis.message_id(), "Realtime-Ereignis");
                    Some(ereignis)
                }
                Err(e) => {
                    tracing::warn!(room_id = %self.room_id, fehler = %e, "Ungueltiges Realtime-Ereignis verworfen");
                    None
                }
            },
        }
    }

    /// Anzahl anwesender Sitzungen, `None` ohne Abonnement
    ///
    /// Die eigene Sitzung zaehlt immer mit.
    pub fn online_anzahl(&self) -> Option<usize> {
        self.abo.as_ref()?;
        Some(self.presence.len().max(1))
    }
}

impl Drop for RealtimeListener {
    fn drop(&mut self) {
        self.abbruch.cancel();
        if let Some(abo) = &self.abo {
            tracing::warn!(subscription = %abo.id, "Listener ohne Schliessen verworfen");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raumchat_core::UserId;
    use serde_json::json;

    fn listener() -> RealtimeListener {
        RealtimeListener::neu(RoomId::new(), SessionKey::neu(UserId::new()))
    }

    #[test]
    fn ohne_abo_keine_online_anzahl() {
        let l = listener();
        assert!(!l.ist_verbunden());
        assert_eq!(l.online_anzahl(), None);
    }

    #[test]
    fn ungueltige_nutzlast_wird_verworfen() {
        let mut l = listener();
        assert!(l
            .verarbeiten(ChannelSignal::Aenderung(json!({ "kind": "unbekannt" })))
            .is_none());
    }

    #[test]
    fn presence_sync_ersetzt_menge() {
        let mut l = listener();
        let a = SessionKey::aus_string("a:1");
        let b = SessionKey::aus_string("b:1");
        l.verarbeiten(ChannelSignal::PresenceSync([a.clone(), b].into()));
        assert_eq!(l.presence.len(), 2);
        l.verarbeiten(ChannelSignal::PresenceSync([a].into()));
        assert_eq!(l.presence.len(), 1);
    }

    #[test]
    fn abbruch_handle_teilt_token() {
        let l = listener();
        let handle = l.abbruch_handle();
        assert!(!handle.ist_abgebrochen());
        drop(l);
        assert!(handle.ist_abgebrochen());
    }
}
