// src/guard.rs - Echo suppression for sensor nodes
//
// A sensor node both writes the shared alarm (alarm/set) and reads it back
// (alarm/status). The guard keeps it from re-announcing a state it already
// caused, and from re-triggering an alarm a human silenced while the
// node's own condition never cleared.

use crate::{
    cause::AlarmCause,
    clock::{elapsed_rebased, Timestamp},
    error::Result,
    protocol::{decode_status_flag, AlarmSetMessage},
};
use tracing::{debug, warn};

/// What a sensor node knows about the shared alarm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EchoGuardState {
    /// This node's cause as last reported by the siren
    pub reported_on: bool,
    /// The siren confirmed this node's cause while this node was asserting it
    pub activated_by_me: bool,
}

/// Per-node guard around `alarm/set` publishing.
#[derive(Debug, Clone)]
pub struct EchoGuard {
    cause: AlarmCause,
    state: EchoGuardState,
    /// Publish time of an activation not yet confirmed by a status echo
    pending_since: Option<Timestamp>,
    retry_after_ms: u64,
}

impl EchoGuard {
    /// `retry_after_ms` bounds how long an unconfirmed activation blocks
    /// re-publishing, so a lost message cannot wedge the node.
    pub fn new(cause: AlarmCause, retry_after_ms: u64) -> Self {
        Self {
            cause,
            state: EchoGuardState::default(),
            pending_since: None,
            retry_after_ms,
        }
    }

    pub fn cause(&self) -> AlarmCause {
        self.cause
    }

    pub fn state(&self) -> EchoGuardState {
        self.state
    }

    /// Whether an activation is awaiting its echo
    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }

    /// The local condition is breached.
    ///
    /// Returns the activation to publish, at most once per transition.
    pub fn activate(&mut self, now: Timestamp) -> Option<AlarmSetMessage> {
        if self.state.reported_on || self.state.activated_by_me {
            return None;
        }
        if let Some(since) = self.pending_since.as_mut() {
            if elapsed_rebased(now, since) < self.retry_after_ms {
                return None;
            }
            warn!("{} activation was never confirmed, publishing again", self.cause);
        }
        self.pending_since = Some(now);
        debug!("Asserting {} alarm", self.cause);
        Some(AlarmSetMessage::single(self.cause, true))
    }

    /// The local condition is clear.
    ///
    /// Returns a de-assertion while the siren still reports this cause.
    pub fn deactivate(&mut self) -> Option<AlarmSetMessage> {
        self.state.activated_by_me = false;
        self.pending_since = None;
        if self.state.reported_on {
            debug!("De-asserting {} alarm", self.cause);
            Some(AlarmSetMessage::single(self.cause, false))
        } else {
            None
        }
    }

    /// Apply an `alarm/status` payload.
    ///
    /// A malformed payload, or one without this node's key, is rejected with
    /// no state change.
    pub fn handle_status(&mut self, payload: &[u8]) -> Result<()> {
        let on = decode_status_flag(payload, self.cause)?;
        self.apply_status(on);
        Ok(())
    }

    /// Apply this node's flag from a decoded status.
    pub fn apply_status(&mut self, on: bool) {
        self.state.reported_on = on;
        if on {
            self.state.activated_by_me = true;
            self.pending_since = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activate_publishes_once_until_echo() {
        let mut guard = EchoGuard::new(AlarmCause::Airflow, 30_000);
        let msg = guard.activate(0).unwrap();
        assert_eq!(msg.get(AlarmCause::Airflow), Some(true));
        assert!(guard.activate(2_000).is_none());
        assert!(guard.is_pending());
        assert!(!guard.state().activated_by_me);
    }

    #[test]
    fn test_echo_sets_activated_by_me() {
        let mut guard = EchoGuard::new(AlarmCause::Airflow, 30_000);
        guard.activate(0);
        guard.handle_status(br#"{"alarmOn":true,"airflowAlarmOn":true}"#).unwrap();
        assert_eq!(
            guard.state(),
            EchoGuardState { reported_on: true, activated_by_me: true }
        );
        assert!(!guard.is_pending());
        assert!(guard.activate(4_000).is_none());
    }

    #[test]
    fn test_silenced_alarm_is_not_retriggered() {
        let mut guard = EchoGuard::new(AlarmCause::AirPressure, 30_000);
        guard.activate(0);
        guard.apply_status(true);
        // A human silenced the siren; the condition persists.
        guard.apply_status(false);
        assert!(guard.activate(60_000).is_none());
        assert!(guard.activate(120_000).is_none());
        // Condition clears, then breaches again: a new alarm is raised.
        assert!(guard.deactivate().is_none());
        assert!(guard.activate(130_000).is_some());
    }

    #[test]
    fn test_deactivate_only_when_reported() {
        let mut guard = EchoGuard::new(AlarmCause::Airflow, 30_000);
        assert!(guard.deactivate().is_none());
        guard.apply_status(true);
        let msg = guard.deactivate().unwrap();
        assert_eq!(msg.get(AlarmCause::Airflow), Some(false));
        assert!(!guard.state().activated_by_me);
        guard.apply_status(false);
        assert!(guard.deactivate().is_none());
    }

    #[test]
    fn test_malformed_status_keeps_state() {
        let mut guard = EchoGuard::new(AlarmCause::Airflow, 30_000);
        guard.apply_status(true);
        assert!(guard.handle_status(b"garbage").is_err());
        assert!(guard.handle_status(br#"{"airflowAlarmOn":"off"}"#).is_err());
        assert!(guard.handle_status(br#"{"airPressureAlarmOn":false}"#).is_err());
        assert!(guard.state().reported_on);
    }

    #[test]
    fn test_lost_activation_is_retried() {
        let mut guard = EchoGuard::new(AlarmCause::Airflow, 30_000);
        assert!(guard.activate(0).is_some());
        assert!(guard.activate(29_999).is_none());
        assert!(guard.activate(30_000).is_some());
        assert!(guard.activate(31_000).is_none());
    }
}
