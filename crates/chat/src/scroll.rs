//! Scroll-Position und Zaehler fuer ungelesene Nachrichten

use crate::types::ScrollBefehl;

/// Verfolgt, ob die Ansicht am Ende steht, und zaehlt verpasste Live-Nachrichten
#[derive(Debug, Clone)]
pub struct ScrollTracker {
    schwelle_px: f64,
    am_ende: bool,
    ungelesen: usize,
    letzte_live_laenge: usize,
}

impl ScrollTracker {
    /// `live_laenge` ist die Laenge des Live-Puffers beim Start
    pub fn neu(schwelle_px: f64, live_laenge: usize) -> Self {
        Self {
            schwelle_px,
            am_ende: true,
            ungelesen: 0,
            letzte_live_laenge: live_laenge,
        }
    }

    /// Neue Scroll-Position als Abstand zum unteren Rand
    ///
    /// Gibt zurueck, ob die Ansicht nun als "am Ende" gilt.
    pub fn scrollen(&mut self, abstand_px: f64) -> bool {
        self.am_ende = abstand_px.max(0.0) <= self.schwelle_px;
        if self.am_ende {
            self.ungelesen = 0;
        }
        self.am_ende
    }

    /// Beobachtet die aktuelle Laenge des Live-Puffers
    pub fn live_laenge_beobachten(&mut self, laenge: usize) {
        let neu = laenge.saturating_sub(self.letzte_live_laenge);
        self.letzte_live_laenge = laenge;
        if neu > 0 && !self.am_ende {
            self.ungelesen += neu;
        }
    }

    /// Springt zur neuesten Nachricht und setzt den Zaehler zurueck
    pub fn zum_neuesten_springen(&mut self) -> ScrollBefehl {
        self.am_ende = true;
        self.ungelesen = 0;
        ScrollBefehl::SanftNachUnten
    }

    pub fn am_ende(&self) -> bool {
        self.am_ende
    }

    pub fn ungelesen(&self) -> usize {
        self.ungelesen
    }

    pub fn indikator_sichtbar(&self) -> bool {
        !self.am_ende && self.ungelesen > 0
    }

    /// Text des "neue Nachrichten"-Hinweises, `None` wenn ausgeblendet
    pub fn indikator_text(&self) -> Option<String> {
        if !self.indikator_sichtbar() {
            return None;
        }
        Some(match self.ungelesen {
            1 => "1 neue Nachricht".to_string(),
            n => format!("{n} neue Nachrichten"),
        })
    }
}
