//! In-Memory-Implementierung des ChatBackend
//!
//! Haelt Benutzer, Raeume, Nachrichten und Realtime-Abonnements im Speicher.
//! Jede erfolgreiche Schreiboperation wird wie ein Datenbank-Trigger als
//! Change-Feed-Datensatz an alle Abonnements des Raums verteilt.
//!
//! `MemoryBackend` ist der geteilte Serverzustand, `MemorySession` die Sicht
//! eines angemeldeten Benutzers darauf (entspricht einer Client-Verbindung).

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use raumchat_core::{
    message::text_normalisieren, AuthorProfile, ChangeRecord, Message, MessageId, RaumchatError,
    Result, RoomId, SessionKey, UserId,
};
use tokio::sync::mpsc;

use crate::repository::{
    ChannelSignal, ChatBackend, Subscription, SubscriptionId, SIGNAL_QUEUE_GROESSE,
};

/// Maximale Nachrichtenlaenge, die der Server akzeptiert
pub const MAX_TEXTLAENGE: usize = 4096;

/// Netzwerkoperationen, fuer die Fehler eingespeist werden koennen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Autorisierung,
    SeiteLaden,
    Abonnieren,
    Senden,
    Bearbeiten,
    Loeschen,
}

// ---------------------------------------------------------------------------
// Interner Zustand
// ---------------------------------------------------------------------------

struct Raum {
    name: String,
    mitglieder: HashSet<UserId>,
    /// Presence von Sitzungen, die ohne Abmeldung geschlossen wurden.
    /// Bleibt sichtbar bis `presence_timeout_ablaufen`.
    verwaiste_presence: BTreeSet<SessionKey>,
}

struct GespeicherteNachricht {
    room_id: RoomId,
    nachricht: Message,
}

struct Abo {
    room_id: RoomId,
    session_key: SessionKey,
    tx: mpsc::Sender<ChannelSignal>,
    anwesend: bool,
}

/// Ergebnis einer Zustellung an ein Abonnement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Zustellung {
    Zugestellt,
    /// Abonnent kommt nicht hinterher
    Voll,
    /// Empfaenger existiert nicht mehr
    Geschlossen,
}

impl Abo {
    /// Sendet ein Signal nicht-blockierend an den Abonnenten
    fn senden(&self, signal: ChannelSignal) -> Zustellung {
        match self.tx.try_send(signal) {
            Ok(()) => Zustellung::Zugestellt,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(session = %self.session_key, "Signal-Queue voll, Abonnement wird getrennt");
                Zustellung::Voll
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(session = %self.session_key, "Signal-Queue geschlossen");
                Zustellung::Geschlossen
            }
        }
    }
}

#[derive(Default)]
struct Zustand {
    benutzer: HashMap<UserId, AuthorProfile>,
    raeume: HashMap<RoomId, Raum>,
    nachrichten: HashMap<MessageId, GespeicherteNachricht>,
    abos: HashMap<SubscriptionId, Abo>,
    naechste_abo_id: u64,
    fehler: HashMap<Operation, u32>,
    letzter_zeitstempel: Option<DateTime<Utc>>,
}

impl Zustand {
    /// Streng monoton steigender Server-Zeitstempel
    fn zeitstempel(&mut self) -> DateTime<Utc> {
        let jetzt = Utc::now();
        let ts = match self.letzter_zeitstempel {
            Some(letzter) if jetzt <= letzter => letzter + chrono::Duration::microseconds(1),
            _ => jetzt,
        };
        self.letzter_zeitstempel = Some(ts);
        ts
    }

    fn fehler_pruefen(&mut self, op: Operation) -> Result<()> {
        if let Some(anzahl) = self.fehler.get_mut(&op) {
            if *anzahl > 0 {
                *anzahl -= 1;
                tracing::debug!(operation = ?op, "Eingespeister Netzwerkfehler");
                return Err(RaumchatError::netzwerk(format!(
                    "{op:?} fehlgeschlagen"
                )));
            }
        }
        Ok(())
    }

    fn autor(&self, user_id: UserId) -> Result<AuthorProfile> {
        self.benutzer
            .get(&user_id)
            .cloned()
            .ok_or_else(|| RaumchatError::KeineBerechtigung("Benutzer nicht angemeldet".into()))
    }

    fn mitgliedschaft_pruefen(&self, room_id: RoomId, user_id: UserId) -> Result<()> {
        let raum = self
            .raeume
            .get(&room_id)
            .ok_or_else(|| RaumchatError::nicht_gefunden(room_id.to_string()))?;
        if !raum.mitglieder.contains(&user_id) {
            return Err(RaumchatError::KeineBerechtigung(
                "Benutzer ist kein Mitglied des Raums".into(),
            ));
        }
        Ok(())
    }

    /// Laedt eine Nachricht zum Aendern und prueft die Urheberschaft
    fn eigene_nachricht(&self, id: MessageId, user_id: UserId, aktion: &str) -> Result<&Message> {
        let gespeichert = self
            .nachrichten
            .get(&id)
            .ok_or_else(|| RaumchatError::nicht_gefunden(format!("Nachricht {id}")))?;
        if gespeichert.nachricht.author_id != user_id {
            return Err(RaumchatError::KeineBerechtigung(format!(
                "Nur der Verfasser kann die Nachricht {aktion}"
            )));
        }
        Ok(&gespeichert.nachricht)
    }

    /// Verteilt ein Signal an alle Abonnements des Raums
    ///
    /// Nicht erreichbare Abonnements werden getrennt. Ihre Presence bleibt
    /// wie bei einem Abbruch ohne Abmeldung bis zum Timeout stehen.
    fn an_raum_senden(&mut self, room_id: RoomId, signal: ChannelSignal) {
        let getrennt: Vec<SubscriptionId> = self
            .abos
            .iter()
            .filter(|(_, abo)| abo.room_id == room_id)
            .filter(|(_, abo)| abo.senden(signal.clone()) != Zustellung::Zugestellt)
            .map(|(id, _)| *id)
            .collect();
        for id in getrennt {
            self.abo_trennen(id);
        }
    }

    /// Entfernt ein Abonnement serverseitig. Der Sender wird verworfen,
    /// der Empfaenger sieht nach den gepufferten Signalen das Kanalende.
    fn abo_trennen(&mut self, id: SubscriptionId) {
        let Some(abo) = self.abos.remove(&id) else {
            return;
        };
        if abo.anwesend {
            if let Some(raum) = self.raeume.get_mut(&abo.room_id) {
                raum.verwaiste_presence.insert(abo.session_key.clone());
            }
        }
        tracing::debug!(subscription = %id, session = %abo.session_key, "Abonnement serverseitig getrennt");
    }

    /// Trennt Abonnements, deren Empfaenger verworfen wurde
    fn geschlossene_abos_aufraeumen(&mut self, room_id: RoomId) {
        let geschlossen: Vec<SubscriptionId> = self
            .abos
            .iter()
            .filter(|(_, abo)| abo.room_id == room_id && abo.tx.is_closed())
            .map(|(id, _)| *id)
            .collect();
        for id in geschlossen {
            self.abo_trennen(id);
        }
    }

    fn presence_menge(&self, room_id: RoomId) -> BTreeSet<SessionKey> {
        let mut menge: BTreeSet<SessionKey> = self
            .abos
            .values()
            .filter(|a| a.room_id == room_id && a.anwesend)
            .map(|a| a.session_key.clone())
            .collect();
        if let Some(raum) = self.raeume.get(&room_id) {
            menge.extend(raum.verwaiste_presence.iter().cloned());
        }
        menge
    }

    fn presence_synchronisieren(&mut self, room_id: RoomId) {
        let menge = self.presence_menge(room_id);
        self.an_raum_senden(room_id, ChannelSignal::PresenceSync(menge));
    }

    fn speichern(&mut self, room_id: RoomId, nachricht: Message) {
        self.an_raum_senden(
            room_id,
            ChannelSignal::Aenderung(ChangeRecord::insert(&nachricht).als_json()),
        );
        self.nachrichten
            .insert(nachricht.id, GespeicherteNachricht { room_id, nachricht });
    }

    fn aenderung_verteilen(&mut self, id: MessageId) {
        let Some(g) = self.nachrichten.get(&id) else {
            return;
        };
        let room_id = g.room_id;
        let signal = ChannelSignal::Aenderung(ChangeRecord::update(&g.nachricht).als_json());
        self.an_raum_senden(room_id, signal);
    }
}

// ---------------------------------------------------------------------------
// MemoryBackend
// ---------------------------------------------------------------------------

/// Geteilter In-Memory-Serverzustand
///
/// Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Zustand>>,
}

impl MemoryBackend {
    /// Erstellt ein leeres Backend
    pub fn neu() -> Self {
        Self::default()
    }

    /// Legt einen Benutzer mit Anzeigenamen an
    pub fn benutzer_anlegen(&self, name: &str, image_url: Option<&str>) -> UserId {
        let id = UserId::new();
        self.inner.lock().benutzer.insert(
            id,
            AuthorProfile {
                name: name.to_string(),
                image_url: image_url.map(str::to_string),
            },
        );
        tracing::debug!(user_id = %id, name, "Benutzer angelegt");
        id
    }

    /// Legt einen Raum mit den angegebenen Mitgliedern an
    pub fn raum_anlegen(&self, name: &str, mitglieder: &[UserId]) -> RoomId {
        let id = RoomId::new();
        self.inner.lock().raeume.insert(
            id,
            Raum {
                name: name.to_string(),
                mitglieder: mitglieder.iter().copied().collect(),
                verwaiste_presence: BTreeSet::new(),
            },
        );
        tracing::debug!(room_id = %id, name, "Raum angelegt");
        id
    }

    pub fn raum_name(&self, room_id: RoomId) -> Option<String> {
        self.inner.lock().raeume.get(&room_id).map(|r| r.name.clone())
    }

    /// Fuegt einen Benutzer einem bestehenden Raum hinzu
    pub fn mitglied_hinzufuegen(&self, room_id: RoomId, user_id: UserId) -> Result<()> {
        let mut zustand = self.inner.lock();
        let raum = zustand
            .raeume
            .get_mut(&room_id)
            .ok_or_else(|| RaumchatError::nicht_gefunden(room_id.to_string()))?;
        raum.mitglieder.insert(user_id);
        Ok(())
    }

    /// Schreibt eine Nachricht mit vorgegebenem Zeitstempel (z.B. zum Befuellen der History)
    pub fn nachricht_importieren(
        &self,
        room_id: RoomId,
        author_id: UserId,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Message> {
        let mut zustand = self.inner.lock();
        zustand.mitgliedschaft_pruefen(room_id, author_id)?;
        let nachricht = Message {
            id: MessageId::new(),
            text: text_normalisieren(text, MAX_TEXTLAENGE)?,
            created_at,
            author_id,
            author: zustand.autor(author_id)?,
            deleted_at: None,
            edited_at: None,
        };
        if zustand.letzter_zeitstempel.map_or(true, |l| l < created_at) {
            zustand.letzter_zeitstempel = Some(created_at);
        }
        zustand.speichern(room_id, nachricht.clone());
        Ok(nachricht)
    }

    /// Liefert die gespeicherte Fassung einer Nachricht
    pub fn nachricht(&self, id: MessageId) -> Option<Message> {
        self.inner
            .lock()
            .nachrichten
            .get(&id)
            .map(|g| g.nachricht.clone())
    }

    /// Laesst die naechsten `anzahl` Aufrufe von `op` mit einem Netzwerkfehler scheitern
    pub fn fehler_einspeisen(&self, op: Operation, anzahl: u32) {
        *self.inner.lock().fehler.entry(op).or_default() += anzahl;
    }

    /// Aktuell anwesende Sitzungen eines Raums (inkl. verwaister Eintraege)
    pub fn presence(&self, room_id: RoomId) -> BTreeSet<SessionKey> {
        self.inner.lock().presence_menge(room_id)
    }

    /// Anzahl offener Abonnements eines Raums
    pub fn abo_anzahl(&self, room_id: RoomId) -> usize {
        self.inner
            .lock()
            .abos
            .values()
            .filter(|a| a.room_id == room_id)
            .count()
    }

    /// Entfernt verwaiste Presence-Eintraege (simuliert den Server-Timeout)
    ///
    /// Abonnements, deren Empfaenger ohne Abmeldung verworfen wurde, zaehlen
    /// ebenfalls als verwaist.
    pub fn presence_timeout_ablaufen(&self, room_id: RoomId) {
        let mut zustand = self.inner.lock();
        zustand.geschlossene_abos_aufraeumen(room_id);
        if let Some(raum) = zustand.raeume.get_mut(&room_id) {
            raum.verwaiste_presence.clear();
        }
        zustand.presence_synchronisieren(room_id);
    }

    /// Oeffnet eine Sitzung fuer einen angelegten Benutzer
    pub fn sitzung(&self, user_id: UserId) -> MemorySession {
        MemorySession {
            backend: self.clone(),
            user_id,
            verzoegerung: None,
        }
    }
}

// ---------------------------------------------------------------------------
// MemorySession
// ---------------------------------------------------------------------------

/// Sicht eines angemeldeten Benutzers auf das In-Memory-Backend
#[derive(Clone)]
pub struct MemorySession {
    backend: MemoryBackend,
    user_id: UserId,
    verzoegerung: Option<Duration>,
}

impl MemorySession {
    /// Simuliert Netzwerklatenz vor jeder Operation
    pub fn mit_verzoegerung(mut self, verzoegerung: Duration) -> Self {
        self.verzoegerung = Some(verzoegerung);
        self
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Anzeigedaten des angemeldeten Benutzers
    pub fn profil(&self) -> Result<AuthorProfile> {
        self.backend.inner.lock().autor(self.user_id)
    }

    pub fn backend(&self) -> &MemoryBackend {
        &self.backend
    }

    async fn netz(&self) {
        if let Some(d) = self.verzoegerung {
            tokio::time::sleep(d).await;
        }
    }
}

impl ChatBackend for MemorySession {
    async fn realtime_autorisieren(&self) -> Result<()> {
        self.netz().await;
        let mut zustand = self.backend.inner.lock();
        zustand.fehler_pruefen(Operation::Autorisierung)?;
        zustand.autor(self.user_id).map(|_| ())
    }

    async fn fetch_page(
        &self,
        room_id: RoomId,
        older_than: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Message>> {
        self.netz().await;
        let mut zustand = self.backend.inner.lock();
        zustand.fehler_pruefen(Operation::SeiteLaden)?;
        zustand.mitgliedschaft_pruefen(room_id, self.user_id)?;

        let mut seite: Vec<Message> = zustand
            .nachrichten
            .values()
            .filter(|g| g.room_id == room_id)
            .filter(|g| older_than.map_or(true, |grenze| g.nachricht.created_at < grenze))
            .map(|g| g.nachricht.clone())
            .collect();

        // Neueste zuerst
        seite.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        seite.truncate(limit);
        Ok(seite)
    }

    async fn subscribe(&self, room_id: RoomId, session_key: &SessionKey) -> Result<Subscription> {
        self.netz().await;
        let mut zustand = self.backend.inner.lock();
        zustand.fehler_pruefen(Operation::Abonnieren)?;
        zustand.mitgliedschaft_pruefen(room_id, self.user_id)?;

        let (tx, rx) = mpsc::channel(SIGNAL_QUEUE_GROESSE);
        zustand.naechste_abo_id += 1;
        let id = SubscriptionId(zustand.naechste_abo_id);
        zustand.abos.insert(
            id,
            Abo {
                room_id,
                session_key: session_key.clone(),
                tx,
                anwesend: false,
            },
        );

        tracing::debug!(subscription = %id, room_id = %room_id, "Abonnement geoeffnet");
        Ok(Subscription::neu(id, room_id, session_key.clone(), rx))
    }

    async fn announce_presence(&self, subscription: &Subscription) -> Result<()> {
        let mut zustand = self.backend.inner.lock();
        let abo = zustand
            .abos
            .get_mut(&subscription.id)
            .ok_or_else(|| RaumchatError::nicht_gefunden(subscription.id.to_string()))?;
        abo.anwesend = true;
        zustand.presence_synchronisieren(subscription.room_id);
        Ok(())
    }

    async fn withdraw_presence(&self, subscription: &Subscription) -> Result<()> {
        let mut zustand = self.backend.inner.lock();
        if let Some(abo) = zustand.abos.get_mut(&subscription.id) {
            abo.anwesend = false;
            zustand.presence_synchronisieren(subscription.room_id);
        }
        Ok(())
    }

    async fn unsubscribe(&self, subscription: &Subscription) {
        let mut zustand = self.backend.inner.lock();
        let Some(abo) = zustand.abos.remove(&subscription.id) else {
            return;
        };

        if abo.anwesend {
            // Ohne vorherige Abmeldung bleibt die Presence bis zum Timeout stehen
            tracing::warn!(session = %abo.session_key, "Abonnement ohne Presence-Abmeldung geschlossen");
            if let Some(raum) = zustand.raeume.get_mut(&abo.room_id) {
                raum.verwaiste_presence.insert(abo.session_key.clone());
            }
            zustand.presence_synchronisieren(abo.room_id);
        }
        tracing::debug!(subscription = %subscription.id, "Abonnement geschlossen");
    }

    async fn persist_message(&self, id: MessageId, room_id: RoomId, text: &str) -> Result<Message> {
        self.netz().await;
        let mut zustand = self.backend.inner.lock();
        zustand.fehler_pruefen(Operation::Senden)?;

        let author = zustand.autor(self.user_id)?;
        let text = text_normalisieren(text, MAX_TEXTLAENGE)?;
        zustand.mitgliedschaft_pruefen(room_id, self.user_id)?;
        if zustand.nachrichten.contains_key(&id) {
            return Err(RaumchatError::UngueltigeEingabe(format!(
                "Nachricht {id} existiert bereits"
            )));
        }

        let nachricht = Message {
            id,
            text,
            created_at: zustand.zeitstempel(),
            author_id: self.user_id,
            author,
            deleted_at: None,
            edited_at: None,
        };
        zustand.speichern(room_id, nachricht.clone());
        tracing::debug!(message_id = %id, room_id = %room_id, "Nachricht gespeichert");
        Ok(nachricht)
    }

    async fn persist_edit(&self, id: MessageId, new_text: &str) -> Result<Message> {
        self.netz().await;
        let mut zustand = self.backend.inner.lock();
        zustand.fehler_pruefen(Operation::Bearbeiten)?;

        let text = text_normalisieren(new_text, MAX_TEXTLAENGE)?;
        if zustand.eigene_nachricht(id, self.user_id, "bearbeiten")?.ist_geloescht() {
            return Err(RaumchatError::UngueltigeEingabe(
                "Geloeschte Nachricht kann nicht bearbeitet werden".into(),
            ));
        }

        let ts = zustand.zeitstempel();
        let gespeichert = zustand
            .nachrichten
            .get_mut(&id)
            .ok_or_else(|| RaumchatError::nicht_gefunden(format!("Nachricht {id}")))?;
        gespeichert.nachricht.text = text;
        gespeichert.nachricht.edited_at = Some(ts);
        let nachricht = gespeichert.nachricht.clone();

        zustand.aenderung_verteilen(id);
        tracing::debug!(message_id = %id, "Nachricht bearbeitet");
        Ok(nachricht)
    }

    async fn persist_delete(&self, id: MessageId) -> Result<Message> {
        self.netz().await;
        let mut zustand = self.backend.inner.lock();
        zustand.fehler_pruefen(Operation::Loeschen)?;

        let vorhanden = zustand.eigene_nachricht(id, self.user_id, "loeschen")?;
        if vorhanden.ist_geloescht() {
            // Erster Loeschzeitpunkt bleibt bestehen
            return Ok(vorhanden.clone());
        }

        let ts = zustand.zeitstempel();
        let gespeichert = zustand
            .nachrichten
            .get_mut(&id)
            .ok_or_else(|| RaumchatError::nicht_gefunden(format!("Nachricht {id}")))?;
        gespeichert.nachricht.deleted_at = Some(ts);
        let nachricht = gespeichert.nachricht.clone();

        zustand.aenderung_verteilen(id);
        tracing::debug!(message_id = %id, "Nachricht geloescht");
        Ok(nachricht)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeitstempel_streng_monoton() {
        let mut zustand = Zustand::default();
        let a = zustand.zeitstempel();
        let b = zustand.zeitstempel();
        let c = zustand.zeitstempel();
        assert!(a < b && b < c);
    }

    #[test]
    fn eingespeister_fehler_wirkt_genau_einmal() {
        let mut zustand = Zustand::default();
        zustand.fehler.insert(Operation::Senden, 1);
        assert!(zustand.fehler_pruefen(Operation::Senden).is_err());
        assert!(zustand.fehler_pruefen(Operation::Senden).is_ok());
        assert!(zustand.fehler_pruefen(Operation::Loeschen).is_ok());
    }

    #[test]
    fn clone_teilt_inneren_zustand() {
        let a = MemoryBackend::neu();
        let b = a.clone();
        let uid = a.benutzer_anlegen("geteilt", None);
        let raum = b.raum_anlegen("Lobby", &[uid]);
        assert_eq!(a.raum_name(raum).as_deref(), Some("Lobby"));
    }
}
