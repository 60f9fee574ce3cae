// src/pattern.rs - Non-blocking claxon beep pattern generator
//
// One call per control-loop tick. Each call looks at the time spent in the
// current phase, performs at most one phase transition and re-asserts the
// claxon level for the phase it ends in.
//
//   Pulsing ──beep_length──► Silent ──beep_gap──► Pulsing (next beep)
//      │ last beep
//      └──────beep_length──► SettlingGap ──pattern_pause──► completed

use crate::{
    clock::{elapsed_rebased, Timestamp},
    error::Result,
    io::DigitalOutput,
};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Phase durations of a beep pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternTimings {
    /// Claxon energized per beep
    #[serde(default = "default_beep_length")]
    pub beep_length_ms: u64,

    /// Silence between two beeps of the same pattern
    #[serde(default = "default_beep_gap")]
    pub beep_gap_ms: u64,

    /// Silence after the last beep, marking the end of the pattern
    #[serde(default = "default_pattern_pause")]
    pub pattern_pause_ms: u64,
}

fn default_beep_length() -> u64 { 500 }
fn default_beep_gap() -> u64 { 500 }
fn default_pattern_pause() -> u64 { 2_000 }

impl Default for PatternTimings {
    fn default() -> Self {
        Self {
            beep_length_ms: default_beep_length(),
            beep_gap_ms: default_beep_gap(),
            pattern_pause_ms: default_pattern_pause(),
        }
    }
}

/// Current phase of a pattern cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Claxon energized
    Pulsing,
    /// Claxon off, waiting for the next beep
    Silent,
    /// Claxon off after the last beep
    SettlingGap,
}

/// Progress of the pattern being played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternState {
    /// Beep count fixed when the cycle started
    pub selected_pattern: u32,
    /// 1-based beep being played; never exceeds `selected_pattern`
    pub beep_index: u32,
    pub phase: Phase,
    pub phase_start: Timestamp,
}

impl PatternState {
    fn start(beeps: u32, now: Timestamp) -> Self {
        Self {
            selected_pattern: beeps.max(1),
            beep_index: 1,
            phase: Phase::Pulsing,
            phase_start: now,
        }
    }
}

/// Outcome of one [`BeepPatternGenerator::trigger`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternProgress {
    /// Claxon on, playing the given beep
    Pulsing(u32),
    /// Claxon off between beeps
    Silent,
    /// Claxon off after the last beep
    Settling,
    /// The cycle just finished; the next call starts a new one
    Completed,
}

/// Clock-driven generator turning a beep count into claxon pulses.
#[derive(Debug, Clone)]
pub struct BeepPatternGenerator {
    timings: PatternTimings,
    state: Option<PatternState>,
}

impl BeepPatternGenerator {
    pub fn new(timings: PatternTimings) -> Self {
        Self {
            timings,
            state: None,
        }
    }

    /// Cycle in progress, `None` when idle
    pub fn state(&self) -> Option<&PatternState> {
        self.state.as_ref()
    }

    /// Total duration of one cycle of `beeps` pulses
    pub fn cycle_length_ms(&self, beeps: u32) -> u64 {
        let beeps = u64::from(beeps.max(1));
        beeps * self.timings.beep_length_ms
            + (beeps - 1) * self.timings.beep_gap_ms
            + self.timings.pattern_pause_ms
    }

    /// Advance the pattern to `now`.
    ///
    /// `beeps` is only read when a new cycle starts; changing it mid-cycle
    /// does not truncate the cycle being played. When `counter` is given it
    /// is incremented once per completed cycle.
    pub fn trigger(
        &mut self,
        now: Timestamp,
        beeps: u32,
        counter: Option<&mut u32>,
        claxon: &mut dyn DigitalOutput,
    ) -> Result<PatternProgress> {
        let timings = self.timings;
        let state = self
            .state
            .get_or_insert_with(|| PatternState::start(beeps, now));
        let elapsed = elapsed_rebased(now, &mut state.phase_start);

        let progress = match state.phase {
            Phase::Pulsing if elapsed < timings.beep_length_ms => {
                PatternProgress::Pulsing(state.beep_index)
            }
            Phase::Pulsing => {
                state.phase_start = now;
                if state.beep_index < state.selected_pattern {
                    state.phase = Phase::Silent;
                    PatternProgress::Silent
                } else {
                    state.phase = Phase::SettlingGap;
                    PatternProgress::Settling
                }
            }
            Phase::Silent if elapsed < timings.beep_gap_ms => PatternProgress::Silent,
            Phase::Silent => {
                state.beep_index += 1;
                state.phase = Phase::Pulsing;
                state.phase_start = now;
                PatternProgress::Pulsing(state.beep_index)
            }
            Phase::SettlingGap if elapsed < timings.pattern_pause_ms => PatternProgress::Settling,
            Phase::SettlingGap => PatternProgress::Completed,
        };

        trace!("Beep pattern {:?} at {}ms", progress, now);
        claxon.set(matches!(progress, PatternProgress::Pulsing(_)))?;

        if progress == PatternProgress::Completed {
            self.state = None;
            if let Some(counter) = counter {
                *counter += 1;
            }
        }
        Ok(progress)
    }

    /// Abandon the current cycle and silence the claxon
    pub fn reset(&mut self, claxon: &mut dyn DigitalOutput) -> Result<()> {
        self.state = None;
        claxon.set(false)
    }
}
