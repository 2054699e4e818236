//! Activity store and engine integration tests

use bgs_tally::activity::*;
use bgs_tally::core::config::TallyConfig;
use bgs_tally::core::types::{InfluenceKind, MissionType, Tick};
use bgs_tally::engine::TallyEngine;
use bgs_tally::persistence::{JsonFileStore, SavedState, StateStore};
use bgs_tally::state::Preferences;
use bgs_tally::tick::{PollError, TickSource};
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

struct Offline;

impl TickSource for Offline {
    async fn fetch(&self) -> Result<Tick, PollError> {
        Err(PollError::Unreachable("offline".into()))
    }
}

fn t0() -> Tick {
    Tick::new("6363ccf0", Utc.with_ymd_and_hms(2022, 11, 3, 14, 2, 40).unwrap())
}

#[test]
fn test_wyrd_rotation_scenario() {
    let store = ActivityStore::new(&t0(), 10);

    store.apply("Wyrd", "Wyrd Liberals", &ActivityDelta::primary_inf(4));
    store.apply("Wyrd", "Wyrd Liberals", &ActivityDelta::cz_win(CzBucket::SpaceHigh));

    let current = store.current();
    let liberals = current.faction("Wyrd", "Wyrd Liberals").unwrap();
    assert_eq!(liberals.inf_primary, 4);
    assert_eq!(liberals.conflict_zones.wins.space_high, 1);

    let next = Tick::new("next", t0().time + Duration::days(1));
    assert!(store.rotate(&next));

    // ========================================
    // Previous tick keeps the exact values
    // ========================================

    let history = store.history(1);
    assert_eq!(history.len(), 1);
    let closed = history.latest().unwrap();
    assert_eq!(closed.tick_time, t0().time);
    let liberals = closed.faction("Wyrd", "Wyrd Liberals").unwrap();
    assert_eq!(liberals.inf_primary, 4);
    assert_eq!(liberals.conflict_zones.wins.space_high, 1);
    assert_eq!(liberals.conflict_zones.wins.total(), 1);

    // ========================================
    // Current tick starts empty
    // ========================================

    let current = store.current();
    assert!(current.is_empty());
    assert_eq!(current.tick_time, next.time);
}

#[test]
fn test_engine_classifies_journal_session() {
    let engine = TallyEngine::new(Offline, &TallyConfig::default());
    engine.force_tick(t0().time);

    let lines = [
        concat!(
            r#"{"event":"fsd_jump","timestamp":"2022-11-03T15:00:00Z","#,
            r#""system":"Wyrd","system_address":2789153444179}"#
        ),
        r#"{"event":"docked","timestamp":"2022-11-03T15:05:00Z","faction":"Wyrd Liberals"}"#,
        concat!(
            r#"{"event":"market_sell","timestamp":"2022-11-03T15:06:00Z","#,
            r#""value":120000,"profit":8000}"#
        ),
        r#"{"event":"bounty","timestamp":"2022-11-03T15:07:00Z","credits":45000}"#,
        concat!(
            r#"{"event":"mission_completed","timestamp":"2022-11-03T15:08:00Z","#,
            r#""faction":"Wyrd Liberals","mission":"courier","influence":2}"#
        ),
        concat!(
            r#"{"event":"influence","timestamp":"2022-11-03T15:08:00Z","#,
            r#""faction":"Wyrd Crimson Gang","kind":"secondary","amount":1}"#
        ),
        r#"{"event":"undocked","timestamp":"2022-11-03T15:10:00Z"}"#,
        concat!(
            r#"{"event":"approach_settlement","timestamp":"2022-11-03T15:20:00Z","#,
            r#""name":"Bluford Depot"}"#
        ),
        concat!(
            r#"{"event":"conflict_zone","timestamp":"2022-11-03T15:40:00Z","#,
            r#""faction":"Wyrd Liberals","intensity":"Med","won":true}"#
        ),
        r#"{"event":"bounty","timestamp":"2022-11-03T15:45:00Z","credits":1000}"#,
    ];
    let tallied = lines
        .iter()
        .map(|line| serde_json::from_str::<GameEvent>(line).unwrap())
        .filter(|event| engine.ingest(event))
        .count();

    // Navigation is context only; the last bounty has no station to fall back on
    assert_eq!(tallied, 5);

    let current = engine.current();
    let wyrd = current.system("Wyrd").unwrap();
    assert_eq!(wyrd.address, Some(2_789_153_444_179));

    let liberals = wyrd.faction("Wyrd Liberals").unwrap();
    assert_eq!(liberals.trade_sell, 120_000);
    assert_eq!(liberals.trade_profit, 8_000);
    assert_eq!(liberals.bounties, 45_000);
    assert_eq!(liberals.missions.completed(MissionType::Courier), 1);
    assert_eq!(liberals.inf_primary, 2);
    assert_eq!(liberals.conflict_zones.wins.ground_medium, 1);

    let gang = wyrd.faction("Wyrd Crimson Gang").unwrap();
    assert_eq!(gang.inf_secondary, 1);
    assert_eq!(gang.displayed_influence(&Preferences::default()), 1);
}

#[test]
fn test_double_force_tick_rotates_once() {
    let engine = TallyEngine::new(Offline, &TallyConfig::default());
    engine.force_tick(t0().time);

    let event = GameEvent::new(EventKind::Influence {
        kind: InfluenceKind::Primary,
        amount: 3,
    })
    .in_system("Wyrd")
    .for_faction("Wyrd Liberals");
    engine.ingest(&event);

    let now = t0().time + Duration::hours(20);
    assert!(engine.force_tick(now));
    assert!(!engine.force_tick(now));
    assert!(!engine.force_tick(now - Duration::minutes(5)));

    let history = engine.history(10);
    assert_eq!(history.len(), 1);
    let closed = history.latest().unwrap();
    assert_eq!(closed.faction("Wyrd", "Wyrd Liberals").unwrap().inf_primary, 3);
    assert_eq!(engine.current().tick_time, now);
}

#[test]
fn test_rotation_persists_and_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let config = TallyConfig {
        state_path: path.clone(),
        ..TallyConfig::default()
    };

    {
        let engine =
            TallyEngine::open(Offline, &config, Box::new(JsonFileStore::new(&path))).unwrap();
        engine.force_tick(t0().time);
        engine.ingest(
            &GameEvent::new(EventKind::CartographicData { credits: 900_000 })
                .in_system("Wyrd")
                .for_faction("Wyrd Liberals"),
        );
        engine.force_tick(t0().time + Duration::days(1));
        engine.ingest(
            &GameEvent::new(EventKind::SettlementScanned)
                .in_system("Wyrd")
                .for_faction("Wyrd Liberals"),
        );
        engine.shutdown().unwrap();
    }

    let saved: SavedState = JsonFileStore::new(&path).load().unwrap().unwrap();
    assert!(saved.tick.forced);
    assert_eq!(saved.history.len(), 1);

    let engine = TallyEngine::open(Offline, &config, Box::new(JsonFileStore::new(&path))).unwrap();
    assert_eq!(engine.oracle().last_tick().time, t0().time + Duration::days(1));
    assert_eq!(
        engine.current().faction("Wyrd", "Wyrd Liberals").unwrap().settlements_scanned,
        1
    );
    assert_eq!(
        engine
            .history(1)
            .latest()
            .unwrap()
            .faction("Wyrd", "Wyrd Liberals")
            .unwrap()
            .cartographic_data,
        900_000
    );
}

#[test]
fn test_subscribers_see_apply_and_rotate() {
    let engine = TallyEngine::new(Offline, &TallyConfig::default());
    engine.force_tick(t0().time);
    let mut rx = engine.subscribe();

    engine.ingest(
        &GameEvent::new(EventKind::Murder { on_foot: true })
            .in_system("Wyrd")
            .for_faction("Wyrd Crimson Gang"),
    );
    engine.force_tick(t0().time + Duration::days(1));

    assert!(matches!(rx.try_recv(), Ok(StoreEvent::Applied { .. })));
    assert!(matches!(rx.try_recv(), Ok(StoreEvent::Rotated { .. })));
    assert!(rx.try_recv().is_err());
}

// ========================================
// Concurrent ingestion and rotation
// ========================================

#[test]
fn test_concurrent_ingest_and_force_tick_lose_nothing() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 500;
    const FORCES: i64 = 50;

    let config = TallyConfig {
        history_retention: 100,
        ..TallyConfig::default()
    };
    let engine = TallyEngine::new(Offline, &config);
    assert!(engine.force_tick(t0().time));
    let event = GameEvent::new(EventKind::Influence {
        kind: InfluenceKind::Primary,
        amount: 1,
    })
    .in_system("Wyrd")
    .for_faction("Wyrd Liberals");

    let rotations = std::thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                for _ in 0..PER_THREAD {
                    assert!(engine.ingest(&event));
                }
            });
        }
        let forcer = scope.spawn(|| {
            (1..=FORCES)
                .filter(|minutes| engine.force_tick(t0().time + Duration::minutes(*minutes)))
                .count()
        });
        // Readers only ever see the open snapshot move forward
        scope.spawn(|| {
            let mut seen = t0().time;
            for _ in 0..2_000 {
                let opened = engine.current().tick_time;
                assert!(opened >= seen);
                seen = opened;
            }
        });
        forcer.join().unwrap()
    });

    assert_eq!(rotations, FORCES as usize);
    let history = engine.history(100);
    assert_eq!(history.len(), rotations);

    let current = engine.current();
    let total: i64 = std::iter::once(&*current)
        .chain(history.iter())
        .map(|snapshot| {
            snapshot
                .faction("Wyrd", "Wyrd Liberals")
                .map_or(0, |f| f.inf_primary)
        })
        .sum();
    assert_eq!(total, (THREADS * PER_THREAD) as i64);
    assert_eq!(current.tick_time, t0().time + Duration::minutes(FORCES));
}

// ========================================
// Order independence
// ========================================

fn delta_strategy() -> impl Strategy<Value = ActivityDelta> {
    prop_oneof![
        (-50i64..50).prop_map(ActivityDelta::primary_inf),
        (-50i64..50).prop_map(ActivityDelta::secondary_inf),
        (0u64..1_000_000).prop_map(|credits| ActivityDelta::Bounty { credits }),
        (0u64..1_000_000, -10_000i64..10_000)
            .prop_map(|(value, profit)| ActivityDelta::MarketSell { value, profit }),
        any::<bool>().prop_map(|won| ActivityDelta::ConflictZone {
            bucket: CzBucket::GroundLow,
            won
        }),
        Just(ActivityDelta::MissionFailed),
    ]
}

proptest! {
    #[test]
    fn prop_apply_order_does_not_matter(
        (deltas, shuffled) in proptest::collection::vec(delta_strategy(), 0..40)
            .prop_flat_map(|deltas| (Just(deltas.clone()), Just(deltas).prop_shuffle()))
    ) {
        let mut in_order = FactionActivity::new();
        for delta in &deltas {
            in_order.apply(delta);
        }
        let mut reordered = FactionActivity::new();
        for delta in &shuffled {
            reordered.apply(delta);
        }
        prop_assert_eq!(&in_order, &reordered);

        let expected_inf: i64 = deltas
            .iter()
            .map(|d| match d {
                ActivityDelta::Influence { kind: InfluenceKind::Primary, amount } => *amount,
                _ => 0,
            })
            .sum();
        prop_assert_eq!(in_order.inf_primary, expected_inf);
    }
}
