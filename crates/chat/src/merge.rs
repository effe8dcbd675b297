//! Zusammenfuehren von History, Live-Puffer und Outbox zur sichtbaren Timeline

use std::collections::HashSet;

use raumchat_core::{Message, MessageId};

use crate::types::{OutboxEntry, TimelineEintrag};

/// Erzeugt die sichtbare Timeline
///
/// Reihenfolge: History (aelteste zuerst), dann Live-Puffer, dann Outbox in
/// Sendereihenfolge. Jede ID erscheint hoechstens einmal; die Serverfassung
/// hat Vorrang vor dem Outbox-Eintrag.
pub fn merge<'a>(
    history: &'a [Message],
    live: &'a [Message],
    outbox: &'a [OutboxEntry],
) -> Vec<TimelineEintrag<'a>> {
    let mut gesehen: HashSet<MessageId> =
        HashSet::with_capacity(history.len() + live.len() + outbox.len());
    let mut timeline = Vec::with_capacity(history.len() + live.len() + outbox.len());

    for m in history.iter().chain(live.iter()) {
        if gesehen.insert(m.id) {
            timeline.push(TimelineEintrag::Gespeichert(m));
        }
    }
    for e in outbox {
        if gesehen.insert(e.nachricht.id) {
            timeline.push(TimelineEintrag::Lokal(e));
        }
    }
    timeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OutboxStatus;
    use chrono::{DateTime, Duration, Utc};
    use raumchat_core::{AuthorProfile, UserId};

    fn nachricht(text: &str, minuten: i64) -> Message {
        Message {
            id: MessageId::new(),
            text: text.into(),
            created_at: DateTime::<Utc>::UNIX_EPOCH + Duration::minutes(minuten),
            author_id: UserId::new(),
            author: AuthorProfile {
                name: "gustav".into(),
                image_url: None,
            },
            deleted_at: None,
            edited_at: None,
        }
    }

    fn eintrag(m: &Message, status: OutboxStatus) -> OutboxEntry {
        OutboxEntry {
            nachricht: m.clone(),
            status,
            fehler: None,
        }
    }

    fn texte(timeline: &[TimelineEintrag<'_>]) -> Vec<String> {
        timeline.iter().map(|e| e.nachricht().text.clone()).collect()
    }

    #[test]
    fn reihenfolge_history_live_outbox() {
        let history = vec![nachricht("h1", 1), nachricht("h2", 2)];
        let live = vec![nachricht("l1", 3)];
        let lokal = nachricht("o1", 4);
        let outbox = vec![eintrag(&lokal, OutboxStatus::Ausstehend)];

        let t = merge(&history, &live, &outbox);
        assert_eq!(texte(&t), ["h1", "h2", "l1", "o1"]);
        assert_eq!(t[3].status(), Some(OutboxStatus::Ausstehend));
    }

    #[test]
    fn echo_vor_serverantwort_erscheint_einmal() {
        let m = nachricht("hi", 1);
        let live = vec![m.clone()];
        let outbox = vec![eintrag(&m, OutboxStatus::Ausstehend)];

        let t = merge(&[], &live, &outbox);
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].status(), None);
    }

    #[test]
    fn serverantwort_vor_echo_erscheint_einmal() {
        let m = nachricht("hi", 1);
        let outbox = vec![eintrag(&m, OutboxStatus::Erfolgreich)];

        // Vor dem Echo: nur der Outbox-Eintrag
        let t = merge(&[], &[], &outbox);
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].status(), Some(OutboxStatus::Erfolgreich));

        // Nach dem Echo: nur die Serverfassung
        let live = vec![m.clone()];
        let t = merge(&[], &live, &outbox);
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].id(), m.id);
        assert_eq!(t[0].status(), None);
    }

    #[test]
    fn outbox_eintrag_in_history_wird_unterdrueckt() {
        let m = nachricht("alt", 1);
        let history = vec![m.clone()];
        let outbox = vec![eintrag(&m, OutboxStatus::Erfolgreich)];
        assert_eq!(merge(&history, &[], &outbox).len(), 1);
    }

    #[test]
    fn fehlgeschlagener_eintrag_bleibt_sichtbar() {
        let m = nachricht("kaputt", 1);
        let outbox = vec![eintrag(&m, OutboxStatus::Fehler)];
        let t = merge(&[], &[], &outbox);
        assert_eq!(t[0].status(), Some(OutboxStatus::Fehler));
    }
}
