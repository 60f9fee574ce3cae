// src/arbiter.rs - Alarm arbitration and escalation
//
// Turns the siren's cause set into light and claxon activity:
//
//   Idle ──causes non-empty──► Active ──causes empty──► Idle
//
// Inside Active the escalation state decides what the claxon does:
//   - Immediate: first `immediate_window_ms` after (re)activation, pattern loops
//   - Quiet:     claxon silent until `repeat_after_ms` since activation
//   - Reminder:  pattern loops, each completed cycle counted; after
//                `repeat_count` cycles activation restarts with the immediate
//                window skipped
// A change in the cause set while Active restarts the immediate window.

use crate::{
    cause::{AlarmCauseSet, BeepCounts, BeepPattern},
    clock::{elapsed_rebased, Timestamp},
    error::Result,
    io::AlarmOutputs,
    pattern::{BeepPatternGenerator, PatternTimings},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Timing of the immediate notice and the periodic reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    /// Length of the immediate notice after activation
    #[serde(default = "default_immediate_window")]
    pub immediate_window_ms: u64,

    /// Time since activation after which reminders start
    #[serde(default = "default_repeat_after")]
    pub repeat_after_ms: u64,

    /// Completed reminder cycles before activation restarts
    #[serde(default = "default_repeat_count")]
    pub repeat_count: u32,
}

fn default_immediate_window() -> u64 { 30_000 }
fn default_repeat_after() -> u64 { 600_000 }
fn default_repeat_count() -> u32 { 5 }

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            immediate_window_ms: default_immediate_window(),
            repeat_after_ms: default_repeat_after(),
            repeat_count: default_repeat_count(),
        }
    }
}

/// Escalation bookkeeping for the current activation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EscalationState {
    /// Start of the current activation, `None` while Idle
    pub activation_time: Option<Timestamp>,
    /// Set after the first reminder roll-over; the immediate notice is then skipped
    pub first_window_elapsed: bool,
    /// Reminder cycles completed since `activation_time`
    pub repeat_count: u32,
}

impl EscalationState {
    fn restart(now: Timestamp) -> Self {
        Self {
            activation_time: Some(now),
            first_window_elapsed: false,
            repeat_count: 0,
        }
    }
}

/// What the claxon was doing on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationPhase {
    /// No cause active, light and claxon off
    Idle,
    /// Pattern looping right after activation
    Immediate,
    /// Active but silent, waiting for the next reminder
    Quiet,
    /// Pattern looping as a periodic reminder
    Reminder,
}

/// Combines the active cause set into one physical alarm.
#[derive(Debug, Clone)]
pub struct ArbitrationEngine {
    policy: EscalationPolicy,
    beeps: BeepCounts,
    generator: BeepPatternGenerator,
    escalation: EscalationState,
}

impl ArbitrationEngine {
    pub fn new(policy: EscalationPolicy, beeps: BeepCounts, timings: PatternTimings) -> Self {
        Self {
            policy,
            beeps,
            generator: BeepPatternGenerator::new(timings),
            escalation: EscalationState::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.escalation.activation_time.is_some()
    }

    pub fn escalation(&self) -> &EscalationState {
        &self.escalation
    }

    pub fn generator(&self) -> &BeepPatternGenerator {
        &self.generator
    }

    /// Apply a freshly replaced cause set.
    ///
    /// `changed` tells whether the membership differs from the previous set;
    /// a change while Active restarts the immediate notice window.
    pub fn on_causes_changed(
        &mut self,
        now: Timestamp,
        causes: &AlarmCauseSet,
        changed: bool,
        outputs: &mut AlarmOutputs,
    ) -> Result<()> {
        if causes.is_empty() {
            return self.deactivate(outputs);
        }
        if changed || !self.is_active() {
            self.activate(now, causes, outputs)?;
        }
        Ok(())
    }

    /// Advance the alarm by one control-loop tick.
    pub fn tick(
        &mut self,
        now: Timestamp,
        causes: &AlarmCauseSet,
        outputs: &mut AlarmOutputs,
    ) -> Result<EscalationPhase> {
        let Some(pattern) = BeepPattern::select(causes) else {
            self.deactivate(outputs)?;
            return Ok(EscalationPhase::Idle);
        };
        if !self.is_active() {
            self.activate(now, causes, outputs)?;
        }
        outputs.light.set(true)?;

        let beeps = self.beeps.beeps(pattern);
        let since = match self.escalation.activation_time.as_mut() {
            Some(at) => elapsed_rebased(now, at),
            None => 0,
        };
        let claxon = outputs.claxon.as_mut();

        if !self.escalation.first_window_elapsed && since <= self.policy.immediate_window_ms {
            self.generator.trigger(now, beeps, None, claxon)?;
            return Ok(EscalationPhase::Immediate);
        }

        if since >= self.policy.repeat_after_ms {
            self.generator
                .trigger(now, beeps, Some(&mut self.escalation.repeat_count), claxon)?;
            if self.escalation.repeat_count >= self.policy.repeat_count {
                info!(
                    "Reminder played {} times, restarting escalation",
                    self.escalation.repeat_count
                );
                self.escalation = EscalationState {
                    activation_time: Some(now),
                    first_window_elapsed: true,
                    repeat_count: 0,
                };
                self.generator.reset(claxon)?;
            }
            return Ok(EscalationPhase::Reminder);
        }

        if self.generator.state().is_some() {
            debug!("Immediate notice over, silencing claxon");
        }
        self.generator.reset(claxon)?;
        Ok(EscalationPhase::Quiet)
    }

    fn activate(&mut self, now: Timestamp, causes: &AlarmCauseSet, outputs: &mut AlarmOutputs) -> Result<()> {
        if self.is_active() {
            info!("Alarm causes changed to {}, restarting immediate notice", causes);
        } else {
            info!("Alarm activated by {}", causes);
        }
        self.escalation = EscalationState::restart(now);
        self.generator.reset(outputs.claxon.as_mut())?;
        outputs.light.set(true)
    }

    fn deactivate(&mut self, outputs: &mut AlarmOutputs) -> Result<()> {
        if self.is_active() {
            info!("Alarm deactivated");
        }
        self.escalation = EscalationState::default();
        self.generator.reset(outputs.claxon.as_mut())?;
        outputs.light.set(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cause::AlarmCause;
    use crate::io::{DigitalOutput, MockDigitalOutput};
    use crate::signal::SignalBus;

    fn engine() -> ArbitrationEngine {
        ArbitrationEngine::new(
            EscalationPolicy::default(),
            BeepCounts::default(),
            PatternTimings::default(),
        )
    }

    fn set(causes: &[AlarmCause]) -> AlarmCauseSet {
        causes.iter().copied().collect()
    }

    #[test]
    fn test_idle_to_active_turns_light_on() {
        let bus = SignalBus::new();
        let mut outputs = AlarmOutputs::on_bus(&bus, "light", "claxon").unwrap();
        let mut engine = engine();
        let causes = set(&[AlarmCause::Test]);

        engine.on_causes_changed(1_000, &causes, true, &mut outputs).unwrap();
        assert!(outputs.light.is_on());
        assert_eq!(engine.escalation().activation_time, Some(1_000));

        assert_eq!(engine.tick(1_000, &causes, &mut outputs).unwrap(), EscalationPhase::Immediate);
        assert!(outputs.claxon.is_on());
    }

    #[test]
    fn test_empty_set_turns_everything_off() {
        let bus = SignalBus::new();
        let mut outputs = AlarmOutputs::on_bus(&bus, "light", "claxon").unwrap();
        let mut engine = engine();
        let causes = set(&[AlarmCause::Airflow]);
        engine.on_causes_changed(0, &causes, true, &mut outputs).unwrap();
        engine.tick(0, &causes, &mut outputs).unwrap();

        let empty = AlarmCauseSet::new();
        engine.on_causes_changed(100, &empty, true, &mut outputs).unwrap();
        assert!(!outputs.light.is_on());
        assert!(!outputs.claxon.is_on());
        assert_eq!(*engine.escalation(), EscalationState::default());
        assert_eq!(engine.tick(200, &empty, &mut outputs).unwrap(), EscalationPhase::Idle);
    }

    #[test]
    fn test_unchanged_set_keeps_window() {
        let bus = SignalBus::new();
        let mut outputs = AlarmOutputs::on_bus(&bus, "light", "claxon").unwrap();
        let mut engine = engine();
        let causes = set(&[AlarmCause::Airflow]);
        engine.on_causes_changed(0, &causes, true, &mut outputs).unwrap();
        engine.on_causes_changed(20_000, &causes, false, &mut outputs).unwrap();
        assert_eq!(engine.escalation().activation_time, Some(0));
    }

    #[test]
    fn test_tick_without_notification_activates() {
        let bus = SignalBus::new();
        let mut outputs = AlarmOutputs::on_bus(&bus, "light", "claxon").unwrap();
        let mut engine = engine();
        let causes = set(&[AlarmCause::AirPressure]);
        assert_eq!(engine.tick(42, &causes, &mut outputs).unwrap(), EscalationPhase::Immediate);
        assert_eq!(engine.escalation().activation_time, Some(42));
        assert!(outputs.light.is_on());
    }

    #[test]
    fn test_quiet_phase_forces_claxon_off() {
        let mut light = MockDigitalOutput::new();
        light.expect_set().returning(|_| Ok(()));
        light.expect_is_on().return_const(true);
        let mut claxon = MockDigitalOutput::new();
        claxon.expect_set().withf(|on| !*on).times(1..).returning(|_| Ok(()));
        claxon.expect_is_on().return_const(false);
        let mut outputs = AlarmOutputs::new(Box::new(light), Box::new(claxon));

        let mut engine = engine();
        engine.escalation = EscalationState {
            activation_time: Some(0),
            first_window_elapsed: false,
            repeat_count: 0,
        };
        let causes = set(&[AlarmCause::Airflow]);
        assert_eq!(engine.tick(45_000, &causes, &mut outputs).unwrap(), EscalationPhase::Quiet);
    }

    #[test]
    fn test_clock_rollback_does_not_escalate() {
        let bus = SignalBus::new();
        let mut outputs = AlarmOutputs::on_bus(&bus, "light", "claxon").unwrap();
        let mut engine = engine();
        let causes = set(&[AlarmCause::Airflow]);
        engine.on_causes_changed(900_000, &causes, true, &mut outputs).unwrap();
        assert_eq!(engine.tick(10, &causes, &mut outputs).unwrap(), EscalationPhase::Immediate);
        assert_eq!(engine.escalation().activation_time, Some(10));
    }
}
