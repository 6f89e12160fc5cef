use skein_runtime::*;

struct Sender {
    target: ActorId,
    event: &'static str,
}

impl Actor for Sender {
    fn on_start(&mut self, cx: &mut Context<'_>) -> Result<(), RuntimeError> {
        cx.send(&self.target, Event::new(self.event))
    }

    fn on_event(&mut self, cx: &mut Context<'_>, event: &Event) -> Result<(), RuntimeError> {
        Err(RuntimeError::unhandled(cx.id(), event))
    }
}

struct Checker {
    seen: usize,
}

impl Actor for Checker {
    fn on_event(&mut self, cx: &mut Context<'_>, event: &Event) -> Result<(), RuntimeError> {
        let coin = cx.random_int(4)?;
        cx.assert(
            self.seen > 0 || event.name() == "First" || coin == 0,
            format!("'{}' arrived first", event.name()),
        )?;
        self.seen += 1;
        Ok(())
    }
}

fn program(senders: &'static [&'static str]) -> impl Fn(&mut Runtime) -> Result<(), RuntimeError> {
    move |rt: &mut Runtime| {
        let checker = rt.create_actor("Checker", Checker { seen: 0 });
        for &event in senders {
            rt.create_actor(
                event,
                Sender {
                    target: checker.clone(),
                    event,
                },
            );
        }
        Ok(())
    }
}

fn find_bug(strategy: StrategyKind) -> BugArtifact {
    let config = Configuration {
        strategy,
        iterations: 500,
        seed: Some(3),
        stop_at_first_bug: true,
        ..Configuration::default()
    };
    let report = TestingEngine::new(config, program(&["First", "Second"]))
        .run()
        .unwrap();
    report.first_bug.expect("bug should be found")
}

fn replayer() -> TestingEngine {
    TestingEngine::new(Configuration::default(), program(&["First", "Second"]))
}

#[test]
fn test_replay_reproduces_bug_exactly() {
    for strategy in [StrategyKind::Dfs, StrategyKind::Random, StrategyKind::Pct] {
        let artifact = find_bug(strategy);
        let outcome = replayer().replay(&artifact.schedule).unwrap();

        assert_eq!(outcome.bug(), Some(&artifact.bug), "{strategy}");
        assert!(outcome.bug_trace.same_steps(&artifact.bug_trace), "{strategy}");
        assert_eq!(outcome.schedule, artifact.schedule, "{strategy}");
    }
}

#[test]
fn test_replay_is_idempotent() {
    let artifact = find_bug(StrategyKind::Random);
    let engine = replayer();
    let first = engine.replay(&artifact.schedule).unwrap();
    let second = engine.replay(&first.schedule).unwrap();

    assert!(first.bug_trace.same_steps(&second.bug_trace));
    assert_eq!(first.schedule, second.schedule);
    assert_eq!(first.termination, second.termination);
}

#[test]
fn test_replay_on_changed_program_diverges() {
    let artifact = find_bug(StrategyKind::Dfs);
    let engine = TestingEngine::new(Configuration::default(), program(&["First"]));
    let err = engine.replay(&artifact.schedule).unwrap_err();
    assert!(matches!(err, RuntimeError::Scheduling(_)), "{err}");
    assert_eq!(err.classify(), ErrorClass::Fatal);
}

#[test]
fn test_trace_file_round_trip_and_replay() {
    let artifact = find_bug(StrategyKind::Dfs);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bug.json");
    TraceFile::new("dfs", &artifact).unwrap().save(&path).unwrap();

    let file = TraceFile::load(&path).unwrap();
    assert_eq!(file.bug, artifact.bug);
    let outcome = replayer().replay_file(&file).unwrap();
    assert!(outcome.bug_trace.same_steps(&artifact.bug_trace));
}

#[test]
fn test_trace_file_with_other_bug_is_rejected() {
    let artifact = find_bug(StrategyKind::Dfs);
    let mut file = TraceFile::new("dfs", &artifact).unwrap();
    file.bug = BugReport::safety("something else");

    let err = replayer().replay_file(&file).unwrap_err();
    assert!(err.to_string().contains("expected bug '[safety] something else'"), "{err}");
}

#[test]
fn test_tampered_trace_file_is_rejected() {
    let artifact = find_bug(StrategyKind::Dfs);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bug.json");
    TraceFile::new("dfs", &artifact).unwrap().save(&path).unwrap();

    let json = std::fs::read_to_string(&path).unwrap();
    let tampered = json.replacen("\"Second\"", "\"First\"", 1);
    assert_ne!(json, tampered);
    std::fs::write(&path, tampered).unwrap();

    let err = TraceFile::load(&path).unwrap_err();
    assert!(matches!(err, RuntimeError::InvalidTrace(_)), "{err}");
}

/// Keeps itself busy forever, so every schedule runs into the depth bound.
struct Looper;

impl Actor for Looper {
    fn on_start(&mut self, cx: &mut Context<'_>) -> Result<(), RuntimeError> {
        let me = cx.id().clone();
        cx.send(&me, Event::new("Again"))
    }

    fn on_event(&mut self, cx: &mut Context<'_>, _event: &Event) -> Result<(), RuntimeError> {
        let me = cx.id().clone();
        cx.send(&me, Event::new("Again"))
    }
}

fn looping(rt: &mut Runtime) -> Result<(), RuntimeError> {
    rt.create_actor("Looper", Looper);
    Ok(())
}

#[test]
fn test_depth_bound_bug_replays_with_recorded_options() {
    let config = Configuration {
        strategy: StrategyKind::Dfs,
        iterations: 0,
        max_steps: 20,
        depth_bound_is_bug: true,
        stop_at_first_bug: true,
        ..Configuration::default()
    };
    let report = TestingEngine::new(config, looping).run().unwrap();
    let artifact = report.first_bug.expect("depth bound should be a bug");
    assert!(artifact.options.depth_bound_is_bug);

    let json = TraceFile::new("dfs", &artifact).unwrap().to_json().unwrap();
    let file = TraceFile::from_json(&json).unwrap();

    // Replay with a default configuration, as `skein replay` does.
    let engine = TestingEngine::new(Configuration::default(), looping);
    let outcome = engine.replay_file(&file).unwrap();
    assert_eq!(outcome.bug(), Some(&artifact.bug));
    assert_eq!(
        artifact.bug.to_string(),
        "[safety] scheduling steps bound of 20 reached"
    );
}
