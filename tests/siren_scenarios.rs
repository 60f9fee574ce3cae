// tests/siren_scenarios.rs
//! End-to-end timelines of the siren node driven by a manual clock

use sirene::config::SirenConfig;
use sirene::{
    AlarmCause, EscalationPhase, Inbound, ManualClock, Node, SignalBus, SirenNode, Timestamp, Value,
};
use std::sync::Arc;

const STEP: u64 = 50;

struct Harness {
    clock: ManualClock,
    bus: SignalBus,
    node: SirenNode,
}

impl Harness {
    fn new() -> Self {
        let clock = ManualClock::new(0);
        let bus = SignalBus::new();
        let node = SirenNode::on_bus("alarm", &SirenConfig::default(), &bus, Arc::new(clock.clone()))
            .unwrap();
        Self { clock, bus, node }
    }

    fn now(&self) -> Timestamp {
        use sirene::Clock;
        self.clock.now_ms()
    }

    fn set(&mut self, payload: &str) {
        self.node
            .handle(&Inbound::new("alarm/set", payload))
            .unwrap();
    }

    fn light(&self) -> bool {
        self.bus.get_bool("alarm.light").unwrap()
    }

    fn claxon(&self) -> bool {
        self.bus.get_bool("alarm.claxon").unwrap()
    }

    /// Tick once at the current time
    fn tick(&mut self) {
        self.node.tick().unwrap();
    }

    /// Tick every STEP ms up to and including `until`, calling `check` after each tick
    fn run_until(&mut self, until: Timestamp, mut check: impl FnMut(Timestamp, &Self)) {
        while self.now() < until {
            self.clock.advance(STEP);
            self.tick();
            check(self.now(), self);
        }
    }
}

#[test]
fn test_light_follows_cause_set() {
    let mut h = Harness::new();
    let steps = [
        (r#"{"testAlarmOn":true}"#, true),
        (r#"{"airflowAlarmOn":true}"#, true),
        (r#"{"testAlarmOn":false}"#, true),
        (r#"{"airflowAlarmOn":false}"#, false),
        (r#"{"airPressureAlarmOn":true,"airflowAlarmOn":true}"#, true),
        (r#"{"airPressureAlarmOn":false,"airflowAlarmOn":false}"#, false),
    ];
    for (payload, lit) in steps {
        h.set(payload);
        h.tick();
        assert_eq!(h.light(), lit, "after {}", payload);
        assert_eq!(h.light(), !h.node.causes().is_empty());
        h.run_until(h.now() + 1_000, |_, h| assert_eq!(h.light(), lit));
    }
    assert!(!h.claxon());
}

#[test]
fn test_airflow_full_escalation_timeline() {
    let mut h = Harness::new();
    h.set(r#"{"airflowAlarmOn":true}"#);
    assert!(h.light());
    h.tick();
    assert!(h.claxon());

    // Immediate notice: the two-beep pattern plays during the first 30 s.
    let mut pulses_in_window = 0;
    let mut was_on = true;
    h.run_until(30_000, |_, h| {
        let on = h.claxon();
        if on && !was_on {
            pulses_in_window += 1;
        }
        was_on = on;
        assert!(h.light());
    });
    assert!(pulses_in_window >= 2);

    // Silence until the first reminder.
    h.run_until(599_950, |t, h| {
        assert!(!h.claxon(), "claxon on at {}ms", t);
        assert_eq!(h.node.phase(), EscalationPhase::Quiet);
    });

    // Five reminder cycles, then the escalation restarts without an immediate window.
    let mut reminder_pulses = 0;
    let mut was_on = false;
    let mut restarted_at = None;
    while restarted_at.is_none() {
        h.clock.advance(STEP);
        h.tick();
        let on = h.claxon();
        if on && !was_on {
            reminder_pulses += 1;
        }
        was_on = on;
        if h.node.engine().escalation().first_window_elapsed {
            restarted_at = Some(h.now());
        }
        assert!(h.now() < 700_000, "reminders never rolled over");
    }

    let restarted_at = restarted_at.unwrap();
    assert_eq!(restarted_at, 617_700);
    assert_eq!(reminder_pulses, 10);
    let escalation = *h.node.engine().escalation();
    assert_eq!(escalation.activation_time, Some(restarted_at));
    assert_eq!(escalation.repeat_count, 0);
    assert!(!h.claxon());

    // No immediate notice after the roll-over, only the next reminder.
    h.run_until(restarted_at + 599_950, |t, h| {
        assert!(!h.claxon(), "claxon on at {}ms after roll-over", t);
        assert!(h.light());
    });
    h.clock.advance(STEP);
    h.tick();
    assert_eq!(h.node.phase(), EscalationPhase::Reminder);
    assert!(h.claxon());
}

#[test]
fn test_second_cause_mid_window_restarts_with_multiple_pattern() {
    let mut h = Harness::new();
    h.set(r#"{"airflowAlarmOn":true}"#);
    h.run_until(15_000, |_, _| {});

    h.set(r#"{"airPressureAlarmOn":true}"#);
    let escalation = *h.node.engine().escalation();
    assert_eq!(escalation.activation_time, Some(15_000));
    assert!(!escalation.first_window_elapsed);
    assert!(h.node.causes().contains(AlarmCause::Airflow));

    h.clock.advance(STEP);
    h.tick();
    let state = *h.node.engine().generator().state().unwrap();
    assert_eq!(state.selected_pattern, 5);
    assert_eq!(state.beep_index, 1);
    assert!(h.claxon());
}

#[test]
fn test_cause_change_after_window_restarts_notice() {
    let mut h = Harness::new();
    h.set(r#"{"testAlarmOn":true}"#);
    h.run_until(45_000, |_, _| {});
    assert_eq!(h.node.phase(), EscalationPhase::Quiet);

    h.set(r#"{"airflowAlarmOn":true}"#);
    h.clock.advance(STEP);
    h.tick();
    assert_eq!(h.node.phase(), EscalationPhase::Immediate);
    assert_eq!(h.node.engine().escalation().activation_time, Some(45_000));
    assert!(h.claxon());

    // Removing a cause while another remains also restarts the notice.
    h.run_until(90_000, |_, _| {});
    h.set(r#"{"testAlarmOn":false}"#);
    assert_eq!(h.node.engine().escalation().activation_time, Some(90_000));
}

#[test]
fn test_cause_change_after_rollover_restarts_immediate_notice() {
    let mut h = Harness::new();
    h.set(r#"{"airflowAlarmOn":true}"#);
    while !h.node.engine().escalation().first_window_elapsed {
        h.clock.advance(STEP);
        h.tick();
        assert!(h.now() < 700_000, "reminders never rolled over");
    }
    h.run_until(650_000, |_, h| {
        assert_eq!(h.node.phase(), EscalationPhase::Quiet);
    });

    h.set(r#"{"airPressureAlarmOn":true}"#);
    let escalation = *h.node.engine().escalation();
    assert!(!escalation.first_window_elapsed);
    assert_eq!(escalation.activation_time, Some(650_000));
    assert_eq!(escalation.repeat_count, 0);

    h.clock.advance(STEP);
    h.tick();
    assert_eq!(h.node.phase(), EscalationPhase::Immediate);
    assert_eq!(h.node.engine().generator().state().unwrap().selected_pattern, 5);
    assert!(h.claxon());

    h.run_until(650_000 + 29_950, |_, h| {
        assert_eq!(h.node.phase(), EscalationPhase::Immediate);
    });
}

#[test]
fn test_repeated_identical_set_keeps_window() {
    let mut h = Harness::new();
    h.set(r#"{"airflowAlarmOn":true}"#);
    h.run_until(20_000, |_, _| {});
    h.set(r#"{"airflowAlarmOn":true}"#);
    assert_eq!(h.node.engine().escalation().activation_time, Some(0));
    h.run_until(31_000, |_, _| {});
    assert_eq!(h.node.phase(), EscalationPhase::Quiet);
}

#[test]
fn test_button_press_turns_everything_off() {
    let mut h = Harness::new();
    h.set(r#"{"airflowAlarmOn":true,"airPressureAlarmOn":true}"#);
    h.run_until(1_000, |_, _| {});

    h.bus.set("alarm.button", Value::Bool(true)).unwrap();
    h.clock.advance(STEP);
    h.tick();
    assert!(h.node.causes().is_empty());
    assert!(!h.light());
    assert!(!h.claxon());

    // Holding the button does not re-trigger anything.
    h.run_until(5_000, |_, h| assert!(!h.light()));
}

#[test]
fn test_clock_rollback_never_escalates_early() {
    let mut h = Harness::new();
    h.clock.set(1_000_000);
    h.set(r#"{"airflowAlarmOn":true}"#);
    h.run_until(1_040_000, |_, _| {});
    assert_eq!(h.node.phase(), EscalationPhase::Quiet);

    // The clock jumps back to near zero; elapsed time restarts instead of wrapping.
    h.clock.set(100);
    h.tick();
    assert_ne!(h.node.phase(), EscalationPhase::Reminder);
    h.run_until(20_000, |_, h| {
        assert_ne!(h.node.phase(), EscalationPhase::Reminder);
    });
}
