//! Property tests for the countdown arithmetic and the completion guard.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use goaltimer_core::{
    Config, DeadlineCalculator, GoalDraft, GoalSession, LocalZone, ManualClock, MemoryGoalStore,
    MemoryNotificationBackend, PromptChoice, Trigger,
};
use goaltimer_core::goal::{Goal, GoalId};

fn goal_at(date: &str, time: &str) -> Goal {
    Goal::from_draft(
        GoalId::new("1"),
        GoalDraft {
            title: "Practice".into(),
            date: date.into(),
            time: time.into(),
            ..Default::default()
        },
        "00:00".into(),
    )
}

fn trigger() -> impl Strategy<Value = Trigger> {
    prop_oneof![
        Just(Trigger::Tick),
        Just(Trigger::NotificationTap),
        Just(Trigger::Launch),
    ]
}

fn session_at(now: DateTime<Utc>) -> (GoalSession, MemoryGoalStore, ManualClock) {
    let mut config = Config::default();
    config.clock.utc_offset_minutes = Some(0);
    let store = MemoryGoalStore::new();
    let clock = ManualClock::new(now);
    let session = GoalSession::new(
        Box::new(store.clone()),
        Box::new(MemoryNotificationBackend::new()),
        Box::new(clock.clone()),
        config,
    );
    (session, store, clock)
}

proptest! {
    #[test]
    fn remaining_strictly_decreases_before_deadline(
        offset_minutes in -720i32..=840,
        hour in 0u32..24,
        minute in 0u32..60,
        before_ms in 1_000i64..=3 * 86_400_000,
    ) {
        let calc = DeadlineCalculator::new(LocalZone::from_offset_minutes(offset_minutes).unwrap(), 3600);
        let goal = goal_at("2025-06-01", &format!("{hour:02}:{minute:02}"));
        let deadline = calc.deadline_instant(&goal).unwrap();

        let t = deadline - Duration::milliseconds(before_ms);
        let now_remaining = calc.remaining_seconds(&goal, t);
        let later_remaining = calc.remaining_seconds(&goal, t + Duration::seconds(1));
        prop_assert!(now_remaining > later_remaining);
        prop_assert_eq!(calc.remaining_seconds(&goal, deadline), 0);
        prop_assert_eq!(calc.remaining_seconds(&goal, deadline + Duration::milliseconds(before_ms)), 0);
    }

    #[test]
    fn deadline_is_stable_across_recomputation(
        offset_minutes in -720i32..=840,
        day in 1u32..=28,
        hour in 0u32..24,
        minute in 0u32..60,
    ) {
        let calc = DeadlineCalculator::new(LocalZone::from_offset_minutes(offset_minutes).unwrap(), 3600);
        let goal = goal_at(&format!("2025-02-{day:02}"), &format!("{hour:02}:{minute:02}"));
        let first = calc.deadline_instant(&goal);
        prop_assert!(first.is_some());
        for _ in 0..5 {
            prop_assert_eq!(calc.deadline_instant(&goal), first);
        }
    }

    #[test]
    fn any_trigger_sequence_prompts_exactly_once(
        triggers in prop::collection::vec(trigger(), 1..20),
        trailing in prop::collection::vec(trigger(), 0..5),
        spacing_secs in 0i64..30,
    ) {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let (mut session, store, clock) = session_at(start);
        let id = session
            .create_goal(GoalDraft {
                title: "Practice".into(),
                date: "2025-06-01".into(),
                time: "09:00".into(),
                ..Default::default()
            })
            .unwrap()
            .value
            .id;
        clock.set(Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap());

        let mut prompts = Vec::new();
        for t in triggers {
            prompts.extend(session.notify_deadline_reached(&id, t).value);
            clock.advance(Duration::seconds(spacing_secs));
        }
        prop_assert_eq!(prompts.len(), 1);

        let writes = store.write_count();
        let prompt = prompts.pop().unwrap();
        session.resolve_prompt(prompt, PromptChoice::Completed).unwrap();
        prop_assert_eq!(store.write_count(), writes + 1);

        for t in trailing {
            prop_assert!(session.notify_deadline_reached(&id, t).value.is_none());
        }
        prop_assert_eq!(store.write_count(), writes + 1);
    }
}

#[test]
fn test_reschedule_keeps_single_outstanding() {
    let backend = MemoryNotificationBackend::new();
    let calc = DeadlineCalculator::new(LocalZone::from_offset_minutes(0).unwrap(), 3600);
    let mut scheduler = goaltimer_core::NotificationScheduler::new(Box::new(backend.clone()), calc);
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 6, 0, 0).unwrap();

    let mut goal = goal_at("2025-06-01", "09:00");
    for time in ["10:00", "11:30", "07:15", "23:59"] {
        goal.time = time.into();
        scheduler.reschedule(&goal, now);
        assert_eq!(backend.scheduled().len(), 1);
        assert_eq!(scheduler.outstanding_count(), 1);
    }
    assert_eq!(
        backend.scheduled_for(&goal.id).unwrap().fires_at,
        Utc.with_ymd_and_hms(2025, 6, 1, 23, 59, 0).unwrap()
    );
}
