use crate::interfaces::presentation_interface::{
    AudioCue, DisplayTarget, Presenter, RgbColor, TimelineEvent,
};
use helpers::general::{ease_out_back, lerp};
use serde::Deserialize;
use tracing::error;

/// * `fade_duration` - (s) Duration of the fade to the overlay alpha
/// * `fade_alpha` - Final alpha of the fade overlay
/// * `popup_delay` - (s) Pause between the end of the fade and the popup reveal
/// * `popup_animation_duration` - (s) Duration of the popup scale animation
/// * `prompt_delay` - (s) Pause between the end of the popup animation and the restart prompt
#[derive(Debug, Deserialize, Clone)]
pub struct FinishSequencePars {
    #[serde(default = "default_fade_duration")]
    pub fade_duration: f64,
    #[serde(default = "default_fade_alpha")]
    pub fade_alpha: f64,
    #[serde(default = "default_popup_delay")]
    pub popup_delay: f64,
    #[serde(default = "default_popup_animation_duration")]
    pub popup_animation_duration: f64,
    #[serde(default = "default_prompt_delay")]
    pub prompt_delay: f64,
}

fn default_fade_duration() -> f64 {
    1.0
}

fn default_fade_alpha() -> f64 {
    0.85
}

fn default_popup_delay() -> f64 {
    0.3
}

fn default_popup_animation_duration() -> f64 {
    0.75
}

fn default_prompt_delay() -> f64 {
    1.0
}

impl Default for FinishSequencePars {
    fn default() -> Self {
        FinishSequencePars {
            fade_duration: default_fade_duration(),
            fade_alpha: default_fade_alpha(),
            popup_delay: default_popup_delay(),
            popup_animation_duration: default_popup_animation_duration(),
            prompt_delay: default_prompt_delay(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Fade { t: f64 },
    PopupDelay { t: f64 },
    PopupAnimate { t: f64 },
    PromptDelay { t: f64 },
    Done,
}

/// FinishSequence is the timeline shown after a race has been won: fade, popup reveal, popup
/// animation and restart prompt. It is advanced by the scheduler and can be cut short at any
/// time, which jumps straight to the final visual state.
#[derive(Debug)]
pub struct FinishSequence {
    pars: FinishSequencePars,
    phase: Phase,
    winner: String,
    color: RgbColor,
    fade_done: bool,
    popup_revealed: bool,
    popup_enabled: bool,
}

impl FinishSequence {
    pub fn start(
        pars: &FinishSequencePars,
        winner: &str,
        color: RgbColor,
        presenter: &Presenter,
    ) -> FinishSequence {
        let popup_enabled = match presenter.require(DisplayTarget::WinPopup) {
            Ok(()) => true,
            Err(err) => {
                error!(%err, "skipping winner popup");
                false
            }
        };

        let mut sequence = FinishSequence {
            pars: pars.to_owned(),
            phase: Phase::Fade { t: 0.0 },
            winner: winner.to_owned(),
            color,
            fade_done: false,
            popup_revealed: false,
            popup_enabled,
        };

        match presenter.require(DisplayTarget::FadeOverlay) {
            Ok(()) => {
                presenter.timeline(TimelineEvent::FadeStarted);
                presenter.timeline(TimelineEvent::FadeProgress {
                    progress: 0.0,
                    alpha: 0.0,
                });
            }
            Err(err) => {
                error!(%err, "skipping fade");
                sequence.fade_done = true;
                sequence.phase = sequence.after_fade(0.0);
            }
        }

        sequence
    }

    fn after_fade(&self, t: f64) -> Phase {
        if self.popup_enabled {
            Phase::PopupDelay { t }
        } else {
            Phase::Done
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.phase, Phase::Done)
    }

    /// update advances the timeline by `dt`. Time left over at a phase boundary is carried into
    /// the next phase.
    pub fn update(&mut self, dt: f64, presenter: &Presenter) {
        let mut phase = match self.phase {
            Phase::Fade { t } => Phase::Fade { t: t + dt },
            Phase::PopupDelay { t } => Phase::PopupDelay { t: t + dt },
            Phase::PopupAnimate { t } => Phase::PopupAnimate { t: t + dt },
            Phase::PromptDelay { t } => Phase::PromptDelay { t: t + dt },
            Phase::Done => return,
        };

        self.phase = loop {
            phase = match phase {
                Phase::Fade { t } if t >= self.pars.fade_duration => {
                    self.finish_fade(presenter);
                    self.after_fade(t - self.pars.fade_duration)
                }
                Phase::PopupDelay { t } if t >= self.pars.popup_delay => {
                    self.reveal_popup(presenter);
                    Phase::PopupAnimate {
                        t: t - self.pars.popup_delay,
                    }
                }
                Phase::PopupAnimate { t } if t >= self.pars.popup_animation_duration => {
                    Self::finish_popup(presenter);
                    Phase::PromptDelay {
                        t: t - self.pars.popup_animation_duration,
                    }
                }
                Phase::PromptDelay { t } if t >= self.pars.prompt_delay => {
                    self.reveal_prompt(presenter);
                    Phase::Done
                }
                _ => break phase,
            };
        };

        match self.phase {
            Phase::Fade { t } if t > 0.0 => {
                let progress = t / self.pars.fade_duration;
                presenter.timeline(TimelineEvent::FadeProgress {
                    progress,
                    alpha: lerp(0.0, self.pars.fade_alpha, progress),
                });
            }
            Phase::PopupAnimate { t } if t > 0.0 => {
                let progress = t / self.pars.popup_animation_duration;
                presenter.timeline(TimelineEvent::PopupProgress {
                    progress,
                    scale: ease_out_back(progress),
                });
            }
            _ => {}
        }
    }

    /// cancel forces the terminal visual state of every phase that has not completed yet.
    pub fn cancel(&mut self, presenter: &Presenter) {
        if self.is_done() {
            return;
        }

        if !self.fade_done {
            self.finish_fade(presenter);
        }
        if self.popup_enabled {
            if !self.popup_revealed {
                self.reveal_popup(presenter);
            }
            Self::finish_popup(presenter);
            self.reveal_prompt(presenter);
        }

        self.phase = Phase::Done;
    }

    fn finish_fade(&mut self, presenter: &Presenter) {
        self.fade_done = true;
        presenter.timeline(TimelineEvent::FadeProgress {
            progress: 1.0,
            alpha: self.pars.fade_alpha,
        });
    }

    fn reveal_popup(&mut self, presenter: &Presenter) {
        self.popup_revealed = true;
        presenter.timeline(TimelineEvent::PopupRevealed {
            winner: self.winner.to_owned(),
            color: self.color,
        });
        presenter.audio(AudioCue::Popup);
        presenter.timeline(TimelineEvent::PopupProgress {
            progress: 0.0,
            scale: 0.0,
        });
    }

    fn finish_popup(presenter: &Presenter) {
        presenter.timeline(TimelineEvent::PopupProgress {
            progress: 1.0,
            scale: 1.0,
        });
    }

    fn reveal_prompt(&self, presenter: &Presenter) {
        presenter.timeline(TimelineEvent::PromptRevealed(format!(
            "{} Wins!\nPress R to Restart",
            self.winner
        )));
    }
}
