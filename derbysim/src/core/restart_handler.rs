/// RestartDecision is the outcome of a restart request or an idle timer update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Nothing happens
    None,
    /// First request, waiting for confirmation
    Armed { full_reset: bool },
    /// Restart is committed
    Commit { full_reset: bool },
}

/// RestartHandler implements the two-step restart confirmation and the automatic restart after a
/// period without user interaction. It is only active while the race is finished.
#[derive(Debug)]
pub struct RestartHandler {
    // parameters
    auto_restart_delay: f64,
    confirm_window: f64,

    // state
    active: bool,
    t_idle: f64,
    t_armed: Option<f64>,
}

impl RestartHandler {
    pub fn new(auto_restart_delay: f64, confirm_window: f64) -> RestartHandler {
        RestartHandler {
            auto_restart_delay,
            confirm_window,
            active: false,
            t_idle: 0.0,
            t_armed: None,
        }
    }

    /// activate starts the idle timer from zero, e.g. when the race has just finished.
    pub fn activate(&mut self) {
        self.active = true;
        self.t_idle = 0.0;
        self.t_armed = None;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.t_armed = None;
    }

    pub fn is_armed(&self) -> bool {
        self.t_armed.is_some()
    }

    pub fn confirm_window(&self) -> f64 {
        self.confirm_window
    }

    /// register_interaction resets the idle time reference.
    pub fn register_interaction(&mut self) {
        self.t_idle = 0.0;
    }

    /// time_to_auto_restart returns the remaining idle time until the automatic restart.
    pub fn time_to_auto_restart(&self) -> f64 {
        (self.auto_restart_delay - self.t_idle).max(0.0)
    }

    /// request handles a restart request. The first request arms the confirmation window, a
    /// second one inside the window commits the restart. A request after the window has elapsed
    /// arms it again.
    pub fn request(&mut self, full_reset: bool) -> RestartDecision {
        if !self.active {
            return RestartDecision::None;
        }

        self.t_idle = 0.0;

        match self.t_armed {
            Some(t_armed) if t_armed <= self.confirm_window => {
                self.t_armed = None;
                RestartDecision::Commit { full_reset }
            }
            _ => {
                self.t_armed = Some(0.0);
                RestartDecision::Armed { full_reset }
            }
        }
    }

    /// update advances the idle timer and the confirmation window. Commits a restart once the
    /// idle time exceeds the auto restart delay.
    pub fn update(&mut self, dt: f64) -> RestartDecision {
        if !self.active {
            return RestartDecision::None;
        }

        self.t_idle += dt;

        if let Some(t_armed) = self.t_armed {
            let t_armed = t_armed + dt;
            self.t_armed = if t_armed > self.confirm_window {
                None
            } else {
                Some(t_armed)
            };
        }

        if self.t_idle > self.auto_restart_delay {
            self.t_armed = None;
            RestartDecision::Commit { full_reset: false }
        } else {
            RestartDecision::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_handler() -> RestartHandler {
        let mut handler = RestartHandler::new(10.0, 2.0);
        handler.activate();
        handler
    }

    #[test]
    fn inactive_handler_ignores_everything() {
        let mut handler = RestartHandler::new(10.0, 2.0);

        assert_eq!(handler.request(false), RestartDecision::None);
        assert_eq!(handler.update(100.0), RestartDecision::None);
    }

    #[test]
    fn second_request_inside_window_commits() {
        let mut handler = active_handler();

        assert_eq!(
            handler.request(false),
            RestartDecision::Armed { full_reset: false }
        );
        assert_eq!(handler.update(1.0), RestartDecision::None);
        assert_eq!(
            handler.request(true),
            RestartDecision::Commit { full_reset: true }
        );
        assert!(!handler.is_armed());
    }

    #[test]
    fn request_after_window_arms_again() {
        let mut handler = active_handler();

        handler.request(false);
        handler.update(2.5);
        assert!(!handler.is_armed());

        assert_eq!(
            handler.request(false),
            RestartDecision::Armed { full_reset: false }
        );
    }

    #[test]
    fn request_resets_idle_timer() {
        let mut handler = active_handler();

        handler.update(9.0);
        handler.request(false);
        assert_eq!(handler.time_to_auto_restart(), 10.0);

        // window expires, no second request, idle timeout restarts anyway
        let mut decision = RestartDecision::None;
        for _ in 0..11 {
            decision = handler.update(1.0);
            if decision != RestartDecision::None {
                break;
            }
        }
        assert_eq!(decision, RestartDecision::Commit { full_reset: false });
    }

    #[test]
    fn interaction_postpones_auto_restart() {
        let mut handler = active_handler();

        assert_eq!(handler.update(8.0), RestartDecision::None);
        handler.register_interaction();
        assert_eq!(handler.update(8.0), RestartDecision::None);
        assert_eq!(
            handler.update(2.5),
            RestartDecision::Commit { full_reset: false }
        );
    }
}
