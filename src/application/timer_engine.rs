use crate::domain::models::{TimerPhase, TimerSettings};

/// One phase transition, reported from the tick that fired it so the caller
/// can surface a completion alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    pub from: TimerPhase,
    pub to: TimerPhase,
    pub completed_focus_cycles: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub phase: TimerPhase,
    pub seconds_remaining: u32,
    pub running: bool,
    pub completed_focus_cycles: u32,
    pub settings: TimerSettings,
}

/// Pomodoro cycle engine. Pure and synchronous: the host drives `tick` at
/// 1 Hz and serializes every mutation through one lock.
#[derive(Debug)]
pub struct FocusTimer {
    settings: TimerSettings,
    phase: TimerPhase,
    seconds_remaining: u32,
    running: bool,
    completed_focus_cycles: u32,
}

impl FocusTimer {
    pub fn new(settings: TimerSettings) -> Self {
        let settings = settings.coerce();
        Self {
            settings,
            phase: TimerPhase::Focus,
            seconds_remaining: settings.phase_seconds(TimerPhase::Focus),
            running: false,
            completed_focus_cycles: 0,
        }
    }

    pub fn toggle(&mut self) {
        self.running = !self.running;
    }

    pub fn reset(&mut self) {
        self.running = false;
        self.phase = TimerPhase::Focus;
        self.seconds_remaining = self.settings.phase_seconds(TimerPhase::Focus);
        self.completed_focus_cycles = 0;
    }

    /// One 1 Hz step. No-op while stopped. The tick that reaches zero also
    /// performs the transition, so observers never see a resting zero.
    pub fn tick(&mut self) -> Option<PhaseChange> {
        if !self.running {
            return None;
        }
        if self.seconds_remaining > 0 {
            self.seconds_remaining -= 1;
        }
        if self.seconds_remaining > 0 {
            return None;
        }
        Some(self.advance_phase())
    }

    /// Replaces the engine's settings. A running countdown is left untouched;
    /// the new durations take effect at the next phase entry. A stopped timer
    /// reloads the focus duration immediately.
    pub fn apply_settings(&mut self, settings: TimerSettings) {
        self.settings = settings.coerce();
        if !self.running {
            self.seconds_remaining = self.settings.phase_seconds(TimerPhase::Focus);
        }
    }

    pub fn settings(&self) -> TimerSettings {
        self.settings
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            phase: self.phase,
            seconds_remaining: self.seconds_remaining,
            running: self.running,
            completed_focus_cycles: self.completed_focus_cycles,
            settings: self.settings,
        }
    }

    fn advance_phase(&mut self) -> PhaseChange {
        let from = self.phase;
        let to = match from {
            TimerPhase::Focus => {
                self.completed_focus_cycles += 1;
                if self.completed_focus_cycles % self.settings.cycles == 0 {
                    TimerPhase::LongBreak
                } else {
                    TimerPhase::ShortBreak
                }
            }
            TimerPhase::ShortBreak | TimerPhase::LongBreak => TimerPhase::Focus,
        };
        self.phase = to;
        self.seconds_remaining = self.settings.phase_seconds(to);
        PhaseChange {
            from,
            to,
            completed_focus_cycles: self.completed_focus_cycles,
        }
    }
}
