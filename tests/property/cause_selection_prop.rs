use proptest::prelude::*;
use sirene::{
    AlarmCause, AlarmCauseSet, AlarmOutputs, AlarmSetMessage, ArbitrationEngine, BeepCounts,
    BeepPattern, BeepPatternGenerator, DigitalOutput, EscalationPolicy, PatternTimings, SignalBus,
    SignalOutput,
};

fn cause() -> impl Strategy<Value = AlarmCause> {
    prop_oneof![
        Just(AlarmCause::Test),
        Just(AlarmCause::Airflow),
        Just(AlarmCause::AirPressure),
    ]
}

fn set_message() -> impl Strategy<Value = AlarmSetMessage> {
    prop::collection::vec((cause(), any::<bool>()), 0..4).prop_map(|pairs| {
        pairs
            .into_iter()
            .fold(AlarmSetMessage::new(), |msg, (cause, on)| msg.with(cause, on))
    })
}

proptest! {
    #[test]
    fn test_selection_ignores_insertion_order(causes in prop::collection::vec(cause(), 0..8)) {
        let forward: AlarmCauseSet = causes.iter().copied().collect();
        let backward: AlarmCauseSet = causes.iter().rev().copied().collect();
        prop_assert_eq!(BeepPattern::select(&forward), BeepPattern::select(&backward));

        let expected = match forward.len() {
            0 => None,
            1 => forward.iter().next().map(BeepPattern::Single),
            _ => Some(BeepPattern::MultipleCauses),
        };
        prop_assert_eq!(BeepPattern::select(&forward), expected);
    }

    #[test]
    fn test_light_tracks_cause_set(
        messages in prop::collection::vec((set_message(), 1u64..5_000), 1..40)
    ) {
        let bus = SignalBus::new();
        let mut outputs = AlarmOutputs::on_bus(&bus, "light", "claxon").unwrap();
        let mut engine = ArbitrationEngine::new(
            EscalationPolicy::default(),
            BeepCounts::default(),
            PatternTimings::default(),
        );
        let mut causes = AlarmCauseSet::new();
        let mut now = 0;

        for (message, gap) in messages {
            let next = message.apply_to(&causes);
            let changed = next != causes;
            causes.update(next.iter());
            engine.on_causes_changed(now, &causes, changed, &mut outputs).unwrap();
            prop_assert_eq!(outputs.light.is_on(), !causes.is_empty());

            now += gap;
            engine.tick(now, &causes, &mut outputs).unwrap();
            prop_assert_eq!(outputs.light.is_on(), !causes.is_empty());
            prop_assert_eq!(engine.is_active(), !causes.is_empty());
            if causes.is_empty() {
                prop_assert!(!outputs.claxon.is_on());
            }
        }
    }

    #[test]
    fn test_beep_index_bounded_under_any_tick_spacing(
        beeps in 1u32..8,
        steps in prop::collection::vec(0u64..1_500, 1..200)
    ) {
        let mut generator = BeepPatternGenerator::new(PatternTimings::default());
        let mut claxon = SignalOutput::new(SignalBus::new(), "claxon").unwrap();
        let mut completed = 0u32;
        let mut now = 0;
        for step in steps {
            now += step;
            generator.trigger(now, beeps, Some(&mut completed), &mut claxon).unwrap();
            if let Some(state) = generator.state() {
                prop_assert!(state.beep_index >= 1);
                prop_assert!(state.beep_index <= state.selected_pattern);
            }
        }
        let cycle = generator.cycle_length_ms(beeps);
        prop_assert!(u64::from(completed) <= now / cycle + 1);
    }
}
