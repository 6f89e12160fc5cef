use skein_mailbox::ActorId;

use crate::*;

fn actor(value: u64, name: &str) -> ActorId {
    ActorId::new(value, name)
}

fn counter() -> MemoryLocation {
    MemoryLocation::new("counter", 0)
}

#[test]
fn test_epoch_packing() {
    let e = Epoch::new(3, 42);
    assert_eq!(e.actor(), 3);
    assert_eq!(e.clock(), 42);
    assert_eq!(e.tick().clock(), 43);
    assert_eq!(e.tick().actor(), 3);
    assert_eq!(e.to_string(), "42@3");
}

#[test]
fn test_epoch_sentinels() {
    assert_eq!(Epoch::ZERO.clock(), 0);
    assert_eq!(Epoch::ZERO.actor(), 0);
    assert!(Epoch::READ_SHARED.is_read_shared());
    assert!(!Epoch::new(1, 1).is_read_shared());
    assert!(Epoch::ZERO.leq(Epoch::new(5, 0)));
    assert_eq!(Epoch::READ_SHARED.to_string(), "shared");
}

#[test]
fn test_epoch_max_values() {
    let e = Epoch::new(Epoch::MAX_ACTOR, Epoch::MAX_CLOCK);
    assert_eq!(e.actor(), Epoch::MAX_ACTOR);
    assert_eq!(e.clock(), Epoch::MAX_CLOCK);
}

#[test]
#[should_panic(expected = "epoch clock overflow")]
fn test_epoch_clock_overflow_panics() {
    Epoch::new(0, Epoch::MAX_CLOCK).tick();
}

#[test]
#[should_panic(expected = "does not fit in an epoch")]
fn test_epoch_actor_out_of_range_panics() {
    Epoch::new(Epoch::MAX_ACTOR + 1, 0);
}

#[test]
fn test_vclock_grows_with_zero_epochs() {
    let mut vc = VectorClock::new();
    vc.set_component(3, Epoch::new(3, 7));
    assert_eq!(vc.len(), 4);
    for i in 0..3 {
        assert_eq!(vc.get_component(i), Epoch::zero(i));
    }
    assert_eq!(vc.get_component(10), Epoch::zero(10));
    assert_eq!(vc.to_string(), "[0, 0, 0, 7]");
}

#[test]
#[should_panic(expected = "stored in component of actor")]
fn test_vclock_rejects_foreign_epoch() {
    let mut vc = VectorClock::new();
    vc.set_component(1, Epoch::new(2, 1));
}

#[test]
fn test_vclock_tick() {
    let mut vc = VectorClock::initial(1);
    assert_eq!(vc.get_component(1).clock(), 1);
    let e = vc.tick(1);
    assert_eq!(e, Epoch::new(1, 2));
    assert_eq!(vc.get_component(0).clock(), 0);
}

#[test]
fn test_vclock_join_and_order() {
    let mut a = VectorClock::new();
    a.set_component(0, Epoch::new(0, 4));
    a.set_component(1, Epoch::new(1, 1));
    let mut b = VectorClock::new();
    b.set_component(0, Epoch::new(0, 2));
    b.set_component(2, Epoch::new(2, 5));

    assert!(!a.leq(&b));
    assert!(!b.leq(&a));
    assert!(a.any_gt(&b));
    assert!(b.any_gt(&a));

    let mut joined = a.clone();
    joined.join(&b);
    assert_eq!(joined.to_string(), "[4, 1, 5]");
    assert!(a.leq(&joined));
    assert!(b.leq(&joined));
    assert!(!joined.any_gt(&joined.clone()));
}

#[test]
fn test_vclock_extra_components_count_as_greater() {
    let mut longer = VectorClock::new();
    longer.set_component(2, Epoch::new(2, 1));
    let shorter = VectorClock::initial(0);
    assert!(longer.any_gt(&shorter));

    let mut zeros = VectorClock::new();
    zeros.set_component(3, Epoch::zero(3));
    assert!(!zeros.any_gt(&VectorClock::new()));
}

#[test]
fn test_vclock_next_gt() {
    let mut a = VectorClock::new();
    a.set_component(0, Epoch::new(0, 3));
    a.set_component(2, Epoch::new(2, 3));
    let mut b = VectorClock::new();
    b.set_component(0, Epoch::new(0, 3));
    b.set_component(2, Epoch::new(2, 1));

    assert_eq!(a.next_gt(&b, 0), Some(2));
    assert_eq!(a.next_gt(&b, 3), None);
    assert_eq!(b.next_gt(&a, 0), None);
}

#[test]
fn test_unsynchronized_writes_race() {
    let (a, b) = (actor(0, "Writer"), actor(1, "Writer"));
    let mut detector = RaceDetector::new();
    detector.on_create(None, &a);
    detector.on_create(None, &b);

    detector.on_write(&a, &counter(), "writer.rs:10");
    detector.on_write(&b, &counter(), "writer.rs:10");

    let races = detector.races();
    assert_eq!(races.len(), 1);
    assert_eq!(races[0].kind, RaceKind::WriteWrite);
    assert_eq!(races[0].earlier.actor, a);
    assert_eq!(races[0].later.actor, b);
}

#[test]
fn test_message_orders_writes() {
    let (a, b) = (actor(0, "Writer"), actor(1, "Writer"));
    let mut detector = RaceDetector::new();
    detector.on_create(None, &a);
    detector.on_create(None, &b);

    detector.on_write(&a, &counter(), "writer.rs:10");
    detector.on_send(Some(&a), 1);
    detector.on_dequeue(&b, Some(1));
    detector.on_write(&b, &counter(), "writer.rs:10");

    assert!(detector.races().is_empty());
}

#[test]
fn test_creation_orders_accesses() {
    let (parent, child) = (actor(0, "Parent"), actor(1, "Child"));
    let mut detector = RaceDetector::new();
    detector.on_create(None, &parent);
    detector.on_write(&parent, &counter(), "parent.rs:3");
    detector.on_create(Some(&parent), &child);
    detector.on_read(&child, &counter(), "child.rs:8");
    detector.on_write(&child, &counter(), "child.rs:9");

    assert!(detector.races().is_empty());
}

#[test]
fn test_write_then_unordered_read_races() {
    let (a, b) = (actor(0, "Writer"), actor(1, "Reader"));
    let mut detector = RaceDetector::new();
    detector.on_create(None, &a);
    detector.on_create(None, &b);
    detector.on_write(&a, &counter(), "writer.rs:10");
    detector.on_read(&b, &counter(), "reader.rs:4");

    assert_eq!(detector.races().len(), 1);
    assert_eq!(detector.races()[0].kind, RaceKind::WriteRead);
}

#[test]
fn test_read_then_unordered_write_races() {
    let (a, b) = (actor(0, "Reader"), actor(1, "Writer"));
    let mut detector = RaceDetector::new();
    detector.on_create(None, &a);
    detector.on_create(None, &b);
    detector.on_read(&a, &counter(), "reader.rs:4");
    detector.on_write(&b, &counter(), "writer.rs:10");

    assert_eq!(detector.races().len(), 1);
    assert_eq!(detector.races()[0].kind, RaceKind::ReadWrite);
    assert_eq!(detector.races()[0].earlier.source, "reader.rs:4");
}

#[test]
fn test_concurrent_reads_escalate_and_race_with_write() {
    let (r1, r2, w) = (actor(0, "Reader"), actor(1, "Reader"), actor(2, "Writer"));
    let mut detector = RaceDetector::new();
    for a in [&r1, &r2, &w] {
        detector.on_create(None, a);
    }
    detector.on_read(&r1, &counter(), "reader.rs:4");
    detector.on_read(&r2, &counter(), "reader.rs:4");
    assert!(detector.races().is_empty());

    detector.on_write(&w, &counter(), "writer.rs:10");
    let kinds: Vec<RaceKind> = detector.races().iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![RaceKind::SharedReadWrite, RaceKind::SharedReadWrite]);
    let readers: Vec<u64> = detector.races().iter().map(|r| r.earlier.actor.value()).collect();
    assert_eq!(readers, vec![0, 1]);
}

#[test]
fn test_same_actor_accesses_never_race() {
    let a = actor(0, "Solo");
    let mut detector = RaceDetector::new();
    detector.on_create(None, &a);
    detector.on_write(&a, &counter(), "solo.rs:1");
    detector.on_read(&a, &counter(), "solo.rs:2");
    detector.on_write(&a, &counter(), "solo.rs:3");
    assert!(detector.races().is_empty());
}

#[test]
fn test_duplicate_races_reported_once() {
    let (a, b) = (actor(0, "Writer"), actor(1, "Writer"));
    let mut detector = RaceDetector::new();
    detector.on_create(None, &a);
    detector.on_create(None, &b);
    detector.on_write(&a, &counter(), "writer.rs:10");
    detector.on_write(&b, &counter(), "writer.rs:10");
    detector.on_send(Some(&b), 7);
    detector.on_write(&a, &counter(), "writer.rs:10");
    detector.on_write(&b, &counter(), "writer.rs:10");

    let taken = detector.take_races();
    assert_eq!(taken.len(), 2);
    assert!(detector.races().is_empty());
}

#[test]
fn test_dequeue_of_unknown_send_only_ticks() {
    let a = actor(0, "Receiver");
    let mut detector = RaceDetector::new();
    detector.on_create(None, &a);
    detector.on_dequeue(&a, Some(99));
    detector.on_dequeue(&a, None);
    assert_eq!(detector.clock(&a).map(|c| c.get_component(0).clock()), Some(3));
}

#[test]
fn test_reset_forgets_everything() {
    let (a, b) = (actor(0, "Writer"), actor(1, "Writer"));
    let mut detector = RaceDetector::new();
    detector.on_write(&a, &counter(), "writer.rs:10");
    detector.on_write(&b, &counter(), "writer.rs:10");
    assert!(!detector.races().is_empty());
    detector.reset();
    assert!(detector.races().is_empty());
    assert!(detector.clock(&a).is_none());
}

#[test]
fn test_race_report_rendering() {
    let (a, b) = (actor(0, "Writer"), actor(1, "Writer"));
    let mut detector = RaceDetector::new();
    detector.on_write(&a, &counter(), "writer.rs:10");
    detector.on_write(&b, &counter(), "writer.rs:12");
    let race = &detector.races()[0];
    assert_eq!(
        race.to_string(),
        "write-write race on counter[0]: write by Writer(0) at writer.rs:10 and write by Writer(1) at writer.rs:12"
    );
    let json = serde_json::to_string(race).unwrap();
    assert!(json.contains("\"kind\":\"write_write\""));
}
