//! Property tests for `assert`/`assume` multiplicity bounds.

use proptest::prelude::*;
use skein_mailbox::{ActorId, Event, EventInfo, EventQueue, MailboxError, SendOptions};

fn enqueue_n(bound: usize, count: usize, assume: bool) -> Vec<Result<(), MailboxError>> {
    let mut queue = EventQueue::new(ActorId::new(0, "Server"));
    let options = if assume {
        SendOptions { assume: Some(bound), ..SendOptions::default() }
    } else {
        SendOptions { assert: Some(bound), ..SendOptions::default() }
    };
    (0..count)
        .map(|_| {
            let event = Event::new("Request");
            let info = EventInfo::with_options(&event, None, &options);
            queue.enqueue(event, info).map(|_| ())
        })
        .collect()
}

proptest! {
    /// The k-th insert violates the bound iff k > bound.
    #[test]
    fn assert_violation_iff_count_exceeds_bound(bound in 0usize..8, count in 1usize..16) {
        let results = enqueue_n(bound, count, false);
        for (i, result) in results.iter().enumerate() {
            let inserted = i + 1;
            match result {
                Ok(()) => prop_assert!(inserted <= bound),
                Err(err) => {
                    prop_assert!(inserted > bound);
                    prop_assert!(err.is_safety_violation());
                }
            }
        }
    }

    #[test]
    fn assume_violation_is_never_a_safety_violation(bound in 0usize..4, count in 1usize..8) {
        for (i, result) in enqueue_n(bound, count, true).iter().enumerate() {
            prop_assert_eq!(result.is_err(), i + 1 > bound);
            if let Err(err) = result {
                prop_assert!(!err.is_safety_violation());
            }
        }
    }

    /// Other event types never count toward a bound.
    #[test]
    fn bound_counts_only_same_type(others in 0usize..10) {
        let mut queue = EventQueue::new(ActorId::new(0, "Server"));
        for _ in 0..others {
            let event = Event::new("Noise");
            let info = EventInfo::new(&event, None);
            queue.enqueue(event, info).unwrap();
        }
        let options = SendOptions { assert: Some(1), ..SendOptions::default() };
        let event = Event::new("Request");
        let info = EventInfo::with_options(&event, None, &options);
        prop_assert!(queue.enqueue(event, info).is_ok());
    }
}
