//! # Review Schedule Journey Tests
//!
//! Follows a single word across several days of study: the interval grows
//! 1, 6, 15 days while the learner keeps recalling it, collapses on a
//! lapse, and everything survives reopening the database.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use drill_core::{
    AttemptInput, EngineConfig, ItemStore, SessionManager, SessionState, StartRequest, Storage,
};
use drill_e2e_tests::{TestDataFactory, TestDatabaseManager};
use std::sync::Arc;

/// Run a one-item flashcard session on `topic` at `now`, answering `correct`
fn study_once(
    manager: &SessionManager,
    topic: &str,
    correct: bool,
    now: DateTime<Utc>,
) -> drill_core::AttemptOutcome {
    let start = manager
        .start_at(&StartRequest::new("flashcard", vec![topic.into()], 1), now)
        .unwrap();
    assert_eq!(start.items.len(), 1, "expected one item due at {}", now);

    manager
        .record_attempt_at(
            &start.session_id,
            &AttemptInput {
                item_id: start.items[0].id.clone(),
                response: String::new(),
                correct,
                latency_ms: 900,
            },
            now,
        )
        .unwrap()
}

#[test]
fn test_interval_progression_over_days() {
    let db = TestDatabaseManager::new_temp();
    let word = TestDataFactory::create_word(&db.storage, "pellucid", "clear", &["gre"]);
    let day0 = Utc::now().trunc_subsecs(0);

    let first = study_once(&db.manager, "gre", true, day0);
    assert_eq!(first.retention.interval_days, 1);
    assert_eq!(first.retention.repetitions, 1);

    // Learned today, so nothing is left to study until tomorrow
    let empty = db
        .manager
        .start_at(&StartRequest::new("flashcard", vec!["gre".into()], 5), day0 + Duration::hours(2))
        .unwrap();
    assert_eq!(empty.state, SessionState::Completed);

    let day1 = day0 + Duration::days(1);
    let second = study_once(&db.manager, "gre", true, day1);
    assert_eq!(second.retention.interval_days, 6);
    assert_eq!(second.retention.repetitions, 2);

    let day7 = day1 + Duration::days(6);
    let third = study_once(&db.manager, "gre", true, day7);
    assert_eq!(third.retention.interval_days, 15);
    assert_eq!(third.retention.repetitions, 3);
    assert_eq!(third.retention.next_due, Some(day7 + Duration::days(15)));
    assert!((third.retention.ease - 2.5).abs() < 1e-9);

    // A lapse resets the streak and lowers ease
    let day22 = day7 + Duration::days(15);
    let lapse = study_once(&db.manager, "gre", false, day22);
    assert_eq!(lapse.retention.interval_days, 1);
    assert_eq!(lapse.retention.repetitions, 0);
    assert!((lapse.retention.ease - 2.3).abs() < 1e-9);
    assert_eq!(lapse.retention.last_result, Some(false));

    let stored = db.retention(&word.id);
    assert_eq!(stored.interval_days, 1);
    assert_eq!(stored.next_due, Some(day22 + Duration::days(1)));

    let history = db.storage.item_attempts(&word.id, 10).unwrap();
    assert_eq!(history.len(), 4);
}

#[test]
fn test_repeated_lapses_stop_at_ease_floor() {
    let db = TestDatabaseManager::new_temp();
    TestDataFactory::create_word(&db.storage, "obdurate", "stubborn", &["gre"]);
    let mut now = Utc::now().trunc_subsecs(0);

    let mut ease = f64::MAX;
    for _ in 0..10 {
        let outcome = study_once(&db.manager, "gre", false, now);
        assert!(outcome.retention.ease <= ease);
        ease = outcome.retention.ease;
        now += Duration::days(1);
    }

    assert!((ease - 1.3).abs() < 1e-9);
}

#[test]
fn test_recovered_word_grows_from_lowered_ease() {
    let db = TestDatabaseManager::new_temp();
    TestDataFactory::create_word(&db.storage, "recondite", "obscure", &["gre"]);
    let mut now = Utc::now().trunc_subsecs(0);

    // Fail twice: ease 2.5 -> 2.3 -> 2.1
    for _ in 0..2 {
        study_once(&db.manager, "gre", false, now);
        now += Duration::days(1);
    }

    let mut intervals = Vec::new();
    for _ in 0..3 {
        let outcome = study_once(&db.manager, "gre", true, now);
        intervals.push(outcome.retention.interval_days);
        now += Duration::days(i64::from(outcome.retention.interval_days));
    }

    // Third success uses the ease after its own bonus: round(6 * 2.4)
    assert_eq!(intervals, vec![1, 6, 14]);
}

#[test]
fn test_schedule_survives_reopening_database() {
    let db = TestDatabaseManager::new_temp();
    let ids = db.seed_words(2, "sat");
    let now = Utc::now().trunc_subsecs(0);

    let start = db
        .manager
        .start_at(&StartRequest::new("typed", vec!["sat".into()], 5), now)
        .unwrap();
    for id in &ids {
        db.manager
            .record_attempt_at(
                &start.session_id,
                &AttemptInput {
                    item_id: id.clone(),
                    response: "answer".into(),
                    correct: true,
                    latency_ms: 1200,
                },
                now,
            )
            .unwrap();
    }

    let reopened = Arc::new(Storage::new(Some(db.path().clone())).unwrap());
    let manager = SessionManager::new(reopened.clone(), &EngineConfig::default());

    for id in &ids {
        let candidate = reopened.load_candidate(id).unwrap().unwrap();
        assert_eq!(candidate.state.repetitions, 1);
        assert_eq!(candidate.state.next_due, Some(now + Duration::days(1)));
    }

    // The finished session is readable from its stored record
    let session = manager.session(&start.session_id).unwrap();
    assert_eq!(session.state, SessionState::Completed);
    assert_eq!(session.history.len(), 2);
    assert_eq!(session.summary().correct, 2);

    let stats = manager.stats_at(now + Duration::days(1)).unwrap();
    assert_eq!(stats.due_count, 2);
    assert_eq!(stats.total_attempts, 2);
    assert_eq!(stats.active_sessions, 0);
}

#[test]
fn test_overdue_items_keep_their_order_across_sessions() {
    let db = TestDatabaseManager::new_temp();
    let now = Utc::now().trunc_subsecs(0);
    let ids = db.seed_due_words("gre", &[1, 9, 4], now);

    let start = db
        .manager
        .start_at(&StartRequest::new("flashcard", vec!["gre".into()], 2), now)
        .unwrap();

    let picked: Vec<&str> = start.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(picked, vec![ids[1].as_str(), ids[2].as_str()]);
    assert_eq!(start.due_count, 2);

    db.manager.end_at(&start.session_id, now).unwrap();

    // Ending early leaves the unanswered items due
    let next = db
        .manager
        .start_at(&StartRequest::new("flashcard", vec!["gre".into()], 5), now)
        .unwrap();
    assert_eq!(next.items.len(), 3);
    assert_eq!(next.items[0].id, ids[1]);
}
