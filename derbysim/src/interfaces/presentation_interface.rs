use flume::Sender;
use serde::Deserialize;
use std::cell::Cell;
use thiserror::Error;
use tracing::debug;

/// Maximum number of race timer display updates per second of simulated time.
pub const MAX_DISPLAY_UPDATE_FREQUENCY: f64 = 20.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// DisplayUpdate carries text for the display collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayUpdate {
    /// Elapsed race time formatted as `minutes:seconds:milliseconds`
    RaceTimer(String),
    /// Countdown integer or "GO!"
    Countdown(String),
    CountdownCleared,
    /// Remaining seconds until the automatic restart
    RestartCountdown(u32),
    Scoreboard(String),
    Winner(String),
    RestartPrompt(String),
}

/// TimelineEvent marks the phase boundaries and progress of the finish sequence. Progress values
/// are normalized to [0.0, 1.0].
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEvent {
    FadeStarted,
    FadeProgress { progress: f64, alpha: f64 },
    PopupRevealed { winner: String, color: RgbColor },
    PopupProgress { progress: f64, scale: f64 },
    PromptRevealed(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioCue {
    WallImpact { pitch: f64 },
    HorseImpact { pitch: f64 },
    CountdownBeep,
    RaceStart,
    MusicStart,
    MusicStop,
    Victory,
    Popup,
}

/// PresentationEvent is everything the simulation core hands to its presentation collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationEvent {
    Display(DisplayUpdate),
    Timeline(TimelineEvent),
    Audio(AudioCue),
    BarrierRemoved,
    WorldReloaded { race_no: u32 },
}

/// InputEvent is delivered by the input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    RestartRequest { full_reset: bool },
    Interaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayTarget {
    TimerText,
    CountdownText,
    ScoreboardText,
    FadeOverlay,
    WinPopup,
}

/// * `timer_text` - Race timer display is bound
/// * `countdown_text` - Countdown display is bound
/// * `scoreboard_text` - Scoreboard display is bound
/// * `fade_overlay` - Fade overlay of the finish sequence is bound
/// * `win_popup` - Winner popup (and its prompt) is bound
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct DisplayBindings {
    #[serde(default = "bound")]
    pub timer_text: bool,
    #[serde(default = "bound")]
    pub countdown_text: bool,
    #[serde(default = "bound")]
    pub scoreboard_text: bool,
    #[serde(default = "bound")]
    pub fade_overlay: bool,
    #[serde(default = "bound")]
    pub win_popup: bool,
}

fn bound() -> bool {
    true
}

impl Default for DisplayBindings {
    fn default() -> Self {
        DisplayBindings {
            timer_text: true,
            countdown_text: true,
            scoreboard_text: true,
            fade_overlay: true,
            win_popup: true,
        }
    }
}

impl DisplayBindings {
    pub fn is_bound(&self, target: DisplayTarget) -> bool {
        match target {
            DisplayTarget::TimerText => self.timer_text,
            DisplayTarget::CountdownText => self.countdown_text,
            DisplayTarget::ScoreboardText => self.scoreboard_text,
            DisplayTarget::FadeOverlay => self.fade_overlay,
            DisplayTarget::WinPopup => self.win_popup,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PresentationError {
    #[error("display {0:?} is not bound")]
    Unbound(DisplayTarget),
}

/// Presenter is the fire-and-forget outlet of the simulation. Sending never blocks and never
/// fails the caller: without a channel events are dropped, and a disconnected receiver is noted
/// once in the log.
#[derive(Debug)]
pub struct Presenter {
    tx: Option<Sender<PresentationEvent>>,
    bindings: DisplayBindings,
    disconnected: Cell<bool>,
}

impl Presenter {
    pub fn new(tx: Option<Sender<PresentationEvent>>, bindings: DisplayBindings) -> Presenter {
        Presenter {
            tx,
            bindings,
            disconnected: Cell::new(false),
        }
    }

    /// headless returns a presenter that drops every event.
    pub fn headless() -> Presenter {
        Presenter::new(None, DisplayBindings::default())
    }

    pub fn bindings(&self) -> &DisplayBindings {
        &self.bindings
    }

    /// require returns an error if the given display is not bound.
    pub fn require(&self, target: DisplayTarget) -> Result<(), PresentationError> {
        if self.bindings.is_bound(target) {
            Ok(())
        } else {
            Err(PresentationError::Unbound(target))
        }
    }

    pub fn send(&self, event: PresentationEvent) {
        let tx = match &self.tx {
            Some(tx) => tx,
            None => return,
        };

        if tx.send(event).is_err() && !self.disconnected.replace(true) {
            debug!("presentation receiver disconnected, dropping further events");
        }
    }

    /// display sends a display update if the target display is bound, otherwise it is dropped.
    pub fn display(&self, target: DisplayTarget, update: DisplayUpdate) {
        if self.bindings.is_bound(target) {
            self.send(PresentationEvent::Display(update))
        }
    }

    pub fn timeline(&self, event: TimelineEvent) {
        self.send(PresentationEvent::Timeline(event))
    }

    pub fn audio(&self, cue: AudioCue) {
        self.send(PresentationEvent::Audio(cue))
    }
}
