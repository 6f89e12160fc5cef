use skein_mailbox::{ActorId, MailboxError};
use skein_strategy::{ScheduleTrace, SchedulingError};

use crate::*;

fn actor(value: u64, name: &str) -> ActorId {
    ActorId::new(value, name)
}

fn sample_trace() -> BugTrace {
    let (env_made, child) = (actor(0, "Server"), actor(1, "Client"));
    let mut trace = BugTrace::new();
    trace.add_create_actor(None, &env_made);
    trace.add_create_actor(Some(&env_made), &child);
    trace.add_send(Some(&child), &env_made, "Request");
    trace.add_dequeue(&env_made, "Request");
    trace.add_random_choice(Some(&env_made), Choice::Bool(true));
    trace.add_halt(&child);
    trace
}

mod bug_trace {
    use super::*;

    #[test]
    fn test_indices_follow_insertion_order() {
        let trace = sample_trace();
        let indices: Vec<usize> = trace.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(trace.len(), 6);
    }

    #[test]
    fn test_previous_and_next_by_index() {
        let trace = sample_trace();
        assert!(trace.previous(0).is_none());
        assert_eq!(trace.previous(2).map(|s| s.kind), Some(StepKind::CreateActor));
        assert_eq!(trace.next(2).map(|s| s.kind), Some(StepKind::DequeueEvent));
        assert!(trace.next(5).is_none());
    }

    #[test]
    fn test_pop_truncates_and_peek_sees_new_tail() {
        let mut trace = sample_trace();
        let popped = trace.pop().unwrap();
        assert_eq!(popped.kind, StepKind::Halt);
        assert_eq!(trace.peek().map(|s| s.index), Some(4));
        assert!(trace.next(4).is_none());

        let step = trace.add_halt(&actor(1, "Client"));
        assert_eq!(step.index, 5);
    }

    #[test]
    fn test_steps_equal_by_index_only() {
        let a = sample_trace();
        let mut b = BugTrace::new();
        b.add_halt(&actor(9, "Other"));
        assert_eq!(a.get(0), b.get(0));
        assert_ne!(a.get(0), a.get(1));
        assert!(!a.same_steps(&b));
        assert!(a.same_steps(&a.clone()));
    }

    #[test]
    fn test_rendering() {
        let trace = sample_trace();
        let text = trace.to_string();
        assert!(text.contains("<CreateLog> Server(0) was created by the environment."));
        assert!(text.contains("<CreateLog> Client(1) was created by Server(0)."));
        assert!(text.contains("<SendLog> Client(1) sent event 'Request' to Server(0)."));
        assert!(text.contains("<RandomLog> Server(0) nondeterministically chose 'true'."));
        assert!(text.contains("<HaltLog> Client(1) halted."));
    }

    #[test]
    fn test_json_schema() {
        let trace = sample_trace();
        let json = trace.to_json().unwrap();
        assert!(json.contains("\"kind\": \"send_event\""));
        assert!(json.contains("\"target_actor\": \"Server\""));
        assert!(json.contains("\"target_actor_id\": 0"));
        assert!(json.contains("\"event_name\": \"Request\""));

        let back = BugTrace::from_json(&json).unwrap();
        assert!(back.same_steps(&trace));
    }

    #[test]
    fn test_json_rejects_future_version() {
        let json = r#"{"version": 7, "steps": []}"#;
        let err = BugTrace::from_json(json).unwrap_err();
        assert!(err.contains("unsupported bug trace version 7"));
    }

    #[test]
    fn test_json_version_defaults() {
        let json = r#"{"steps": [{"index": 0, "kind": "halt", "actor": "A", "actor_id": 0}]}"#;
        let trace = BugTrace::from_json(json).unwrap();
        assert_eq!(trace.version, 1);
        assert_eq!(trace.len(), 1);
    }
}

mod config {
    use super::*;

    #[test]
    fn test_strategy_kind_parsing() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.name().parse::<StrategyKind>().unwrap(), kind);
        }
        let err = "bfs".parse::<StrategyKind>().unwrap_err();
        assert!(err.to_string().contains("unknown strategy 'bfs'"));
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = Configuration::from_json(r#"{"strategy": "pct", "seed": 5}"#).unwrap();
        assert_eq!(config.strategy, StrategyKind::Pct);
        assert_eq!(config.seed, Some(5));
        assert_eq!(config.iterations, 100);
        assert_eq!(config.strategy_bound, 2);
        assert!(!config.enable_race_detection);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = Configuration::from_json("{\"iterations\": \"many\"}").unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
        assert_eq!(err.classify(), ErrorClass::Fatal);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skein.json");
        let config = Configuration {
            strategy: StrategyKind::ExhaustiveDelay,
            iterations: 0,
            seed: Some(3),
            ..Configuration::default()
        };
        std::fs::write(&path, config.to_json().unwrap()).unwrap();
        assert_eq!(Configuration::load(&path).unwrap(), config);
    }

    #[test]
    fn test_build_strategy_descriptions() {
        let config = |strategy| Configuration {
            strategy,
            strategy_bound: 3,
            ..Configuration::default()
        };
        assert_eq!(config(StrategyKind::Dfs).build_strategy(1).description(), "dfs");
        assert_eq!(
            config(StrategyKind::Random).build_strategy(1).description(),
            "random[seed '1']"
        );
        assert_eq!(
            config(StrategyKind::ExhaustiveDelay).build_strategy(4).description(),
            "exhaustive-delay[max delays '3', seed '4']"
        );
        assert!(config(StrategyKind::Random).build_strategy(1).is_fair());
        assert!(!config(StrategyKind::Pct).build_strategy(1).is_fair());
    }

    #[test]
    fn test_explicit_seed_is_used() {
        let config = Configuration {
            seed: Some(77),
            ..Configuration::default()
        };
        assert_eq!(config.resolve_seed(), 77);
    }
}

mod errors {
    use super::*;

    #[test]
    fn test_classification() {
        let owner = actor(0, "Box");
        let assert_bound = RuntimeError::from(MailboxError::AssertBoundExceeded {
            owner: owner.clone(),
            event: "E".into(),
            bound: 1,
        });
        let assume_bound = RuntimeError::from(MailboxError::AssumeBoundExceeded {
            owner: owner.clone(),
            event: "E".into(),
            bound: 1,
        });
        let divergence = RuntimeError::from(SchedulingError::divergence(3, "mismatch"));

        assert_eq!(assert_bound.classify(), ErrorClass::Bug);
        assert_eq!(assume_bound.classify(), ErrorClass::Pruned);
        assert_eq!(divergence.classify(), ErrorClass::Fatal);
        assert_eq!(
            RuntimeError::AssertionFailed("x".into()).classify(),
            ErrorClass::Bug
        );
        assert_eq!(
            RuntimeError::AssumptionFailed("x".into()).classify(),
            ErrorClass::Pruned
        );
        assert_eq!(
            RuntimeError::unhandled(&owner, &Event::new("Odd")).to_string(),
            "Box(0) received event 'Odd' that cannot be handled"
        );
    }

    #[test]
    fn test_mailbox_message_passes_through() {
        let err = RuntimeError::from(MailboxError::MustHandleDropped {
            owner: actor(2, "Worker"),
            event: "Job".into(),
        });
        assert_eq!(
            err.to_string(),
            "Worker(2) halted before dequeueing must-handle event 'Job'"
        );
    }
}

mod trace_file {
    use super::*;

    fn artifact() -> BugArtifact {
        let mut schedule = ScheduleTrace::new();
        schedule.push_schedule(actor(0, "Server"));
        schedule.push_bool(true);
        BugArtifact {
            iteration: 4,
            bug: BugReport::safety("assertion failed: boom"),
            bug_trace: sample_trace(),
            schedule,
            options: RuntimeOptions {
                depth_bound_is_bug: true,
                ..RuntimeOptions::default()
            },
        }
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bug.trace.json");
        let file = TraceFile::new("dfs", &artifact()).unwrap();
        file.save(&path).unwrap();

        let loaded = TraceFile::load(&path).unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.digest, file.digest);
        assert_eq!(loaded.schedule, file.schedule);
        assert_eq!(loaded.bug, file.bug);
        assert!(loaded.bug_trace.same_steps(&file.bug_trace));
    }

    #[test]
    fn test_tampered_schedule_rejected() {
        let file = TraceFile::new("dfs", &artifact()).unwrap();
        let json = file.to_json().unwrap().replace("\"value\": true", "\"value\": false");
        let err = TraceFile::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("replay digest mismatch"));
    }

    #[test]
    fn test_options_round_trip_and_are_digested() {
        let file = TraceFile::new("dfs", &artifact()).unwrap();
        let loaded = TraceFile::from_json(&file.to_json().unwrap()).unwrap();
        assert!(loaded.options.depth_bound_is_bug);
        assert_eq!(loaded.options, file.options);

        let json = file
            .to_json()
            .unwrap()
            .replace("\"depth_bound_is_bug\": true", "\"depth_bound_is_bug\": false");
        let err = TraceFile::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("replay digest mismatch"), "{err}");
    }

    #[test]
    fn test_future_version_rejected() {
        let file = TraceFile::new("dfs", &artifact()).unwrap();
        let json = file.to_json().unwrap().replacen("\"version\": 1", "\"version\": 2", 1);
        let err = TraceFile::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("unsupported trace file version 2"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TraceFile::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, RuntimeError::Io(_)));
    }
}

mod report {
    use super::*;

    #[test]
    fn test_depth_and_bug_bookkeeping() {
        let mut report = TestReport::new("dfs", 0);
        for depth in [5, 2, 9] {
            report.record_depth(depth);
            report.iterations += 1;
        }
        assert_eq!(report.min_explored_depth, 2);
        assert_eq!(report.max_explored_depth, 9);

        let bug = BugReport::safety("assertion failed: x");
        report.record_bug(&bug);
        report.record_bug(&bug);
        assert_eq!(report.buggy_iterations, 2);
        assert_eq!(report.bugs.len(), 1);
        assert!(report.found_bug());
    }

    #[test]
    fn test_display() {
        let mut report = TestReport::new("random[seed '3']", 3);
        report.iterations = 10;
        report.record_bug(&BugReport::liveness("monitor 'M' is hot"));
        let text = report.to_string();
        assert!(text.contains("strategy: random[seed '3'] (seed 3)"));
        assert!(text.contains("iterations: 10 (1 buggy, 0 pruned, 0 hit the depth bound)"));
        assert!(text.contains("  - [liveness] monitor 'M' is hot"));
    }
}
