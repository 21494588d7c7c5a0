use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use serde_json::{json, Value};

use modflow::{
    Category, ContextError, ExecutionContext, Executor, Flags, ModuleNode, ModuleRegistry,
    ModuleStatus, NoReuse, Pipeline, PriorRun, RunStatus, Settings,
};

fn settings() -> Settings {
    simple_logging::log_to_stderr(log::LevelFilter::Trace);
    Settings {
        verbose: 1,
        poll_interval: Duration::from_millis(5),
        print_recap: true,
        ..Settings::default()
    }
}

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn transcript() -> Value {
    json!({
        "segments": [
            {"speaker": "A", "text": "I think this is going well"},
            {"speaker": "B", "text": "I'm not so sure about that"},
            {"speaker": "A", "text": "Why not"},
        ]
    })
}

fn segment_count(input: &Value) -> u64 {
    input["segments"].as_array().map_or(0, |s| s.len() as u64)
}

/// A small set of analysis modules wired like a real pipeline.
fn analysis_registry() -> Result<ModuleRegistry> {
    let mut reg = ModuleRegistry::new();
    reg.register(
        ModuleNode::from_fn("stats", |ctx| Ok(json!({ "segments": segment_count(ctx.input()) })))
            .describe("basic transcript statistics"),
    )?;
    reg.register(
        ModuleNode::from_fn("sentiment", |ctx| {
            Ok(json!({ "scored": segment_count(ctx.input()) }))
        })
        .category(Category::Medium),
    )?;
    reg.register(
        ModuleNode::from_fn("emotion", |_| Ok(json!({ "dominant": "neutral" })))
            .category(Category::Medium),
    )?;
    reg.register(
        ModuleNode::from_fn("affect_tension", |ctx| {
            let scored = ctx.result("sentiment").map_or(Value::Null, |s| s["scored"].clone());
            let emotion = ctx.result("emotion").map_or(Value::Null, |e| e["dominant"].clone());
            Ok(json!({ "scored": scored, "emotion": emotion }))
        })
        .depends_on(["sentiment", "emotion"])
        .category(Category::Heavy),
    )?;
    reg.register(
        ModuleNode::from_fn("summary", |ctx| {
            let mut names: Vec<&str> = ctx.results().map(|(name, _)| name).collect();
            names.sort();
            Ok(json!({ "from": names }))
        })
        .depends_on(["stats", "affect_tension"]),
    )?;
    Ok(reg)
}

#[test]
fn test_full_run() -> Result<()> {
    let pipeline = Pipeline::new(analysis_registry()?, settings())?;
    let result = pipeline.run(&set(&["summary"]), transcript(), Flags::new(), &NoReuse)?;

    assert!(result.is_success());
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(
        result.modules_run,
        vec!["stats", "emotion", "sentiment", "affect_tension", "summary"]
    );
    assert_eq!(
        result.output("affect_tension"),
        Some(&json!({ "scored": 3, "emotion": "neutral" }))
    );
    assert_eq!(
        result.output("summary"),
        Some(&json!({ "from": ["affect_tension", "emotion", "sentiment", "stats"] }))
    );
    assert_eq!(result.plan.added_as_dependencies().len(), 4);
    Ok(())
}

#[test]
fn test_missing_dependency_fails_validation() -> Result<()> {
    let mut reg = analysis_registry()?;
    reg.register(ModuleNode::from_fn("topics", |_| Ok(json!([]))).depends_on(["embeddings"]))?;

    let validation = reg.validate();
    assert_eq!(
        validation.errors,
        vec!["Module 'topics' depends on 'embeddings' which is not registered"]
    );

    let err = match Pipeline::new(reg, settings()) {
        Ok(_) => bail!("pipeline accepted an invalid registry"),
        Err(e) => e,
    };
    assert!(format!("{err:#}").contains("embeddings"));
    Ok(())
}

#[test]
fn test_failure_skips_dependents_only() -> Result<()> {
    let mut reg = ModuleRegistry::new();
    reg.register(ModuleNode::from_fn("a", |_| bail!("tokenizer unavailable")))?;
    reg.register(ModuleNode::from_fn("b", |_| Ok(json!(1))).depends_on(["a"]))?;
    reg.register(ModuleNode::from_fn("c", |_| Ok(json!(2))))?;

    let pipeline = Pipeline::new(reg, settings())?;
    let result = pipeline.run(&set(&["b", "c"]), transcript(), Flags::new(), &NoReuse)?;

    assert!(!result.is_success());
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.failed(), vec!["a"]);
    assert_eq!(result.skipped(), vec![("b", "missing dependencies: {a}")]);
    assert_eq!(result.modules_run, vec!["c"]);
    assert_eq!(result.errors[0].to_string(), "a: tokenizer unavailable");
    Ok(())
}

#[test]
fn test_reuse_skips_execution() -> Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut reg = ModuleRegistry::new();
    for name in ["stats", "sentiment"] {
        let calls = Arc::clone(&calls);
        reg.register(ModuleNode::from_fn(name, move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!(null))
        }))?;
    }
    let pipeline = Pipeline::new(reg, settings())?;
    let requested = set(&["stats", "sentiment"]);

    let prior = PriorRun::reusable("2026-10-01-a", ["sentiment", "stats"]);
    let reused = pipeline.run(&requested, transcript(), Flags::new(), &prior)?;
    assert_eq!(reused.status, RunStatus::Reused);
    assert_eq!(reused.modules_run, vec!["sentiment", "stats"]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let fresh = pipeline.run(&requested, transcript(), Flags::new(), &NoReuse)?;
    assert_eq!(fresh.status, RunStatus::Completed);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn test_linear_chain() -> Result<()> {
    let mut reg = ModuleRegistry::new();
    for i in 0..15 {
        let mut node = ModuleNode::from_fn(format!("m{i:02}"), move |ctx| {
            let prev = match i {
                0 => 0,
                _ => ctx.result(&format!("m{:02}", i - 1)).and_then(Value::as_u64).unwrap_or(0),
            };
            Ok(json!(prev + 1))
        });
        if i > 0 {
            node = node.depends_on([format!("m{:02}", i - 1)]);
        }
        // categories shouldn't be able to pull a module ahead of its dependency:
        node = node.category(if i % 2 == 0 { Category::Heavy } else { Category::Light });
        reg.register(node)?;
    }

    let pipeline = Pipeline::new(reg, settings())?;
    let result = pipeline.run(&set(&["m14"]), transcript(), Flags::new(), &NoReuse)?;
    let expected: Vec<String> = (0..15).map(|i| format!("m{i:02}")).collect();
    assert_eq!(result.modules_run, expected);
    assert_eq!(result.output("m14"), Some(&json!(15)));
    Ok(())
}

#[test]
fn test_unknown_module_is_fatal() -> Result<()> {
    let pipeline = Pipeline::new(analysis_registry()?, settings())?;
    let err = match pipeline.run(&set(&["diarization"]), transcript(), Flags::new(), &NoReuse) {
        Ok(_) => bail!("run of unregistered module succeeded"),
        Err(e) => e,
    };
    assert!(format!("{err:#}").contains("Module 'diarization' is not registered"));
    Ok(())
}

#[test]
fn test_empty_input() -> Result<()> {
    let pipeline = Pipeline::new(analysis_registry()?, settings())?;
    let result = pipeline.run(&set(&["stats"]), json!({}), Flags::new(), &NoReuse)?;
    assert_eq!(result.status, RunStatus::Failed);
    assert!(result.modules_run.is_empty());
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].module, modflow::INPUT_MODULE);
    Ok(())
}

#[test]
fn test_flags_visible_to_modules() -> Result<()> {
    let mut reg = ModuleRegistry::new();
    reg.register(ModuleNode::from_fn("lang", |ctx| {
        Ok(ctx.flag("language").cloned().unwrap_or(Value::Null))
    }))?;
    let pipeline = Pipeline::new(reg, settings())?;

    let mut flags = Flags::new();
    flags.insert("language".to_owned(), json!("de"));
    let result = pipeline.run(&set(&["lang"]), transcript(), flags, &NoReuse)?;
    assert_eq!(result.output("lang"), Some(&json!("de")));
    Ok(())
}

#[test]
fn test_context_frozen_after_run() -> Result<()> {
    let mut reg = analysis_registry()?;
    reg.finalize()?;
    let plan = modflow::Resolver::new(&reg).resolve(&set(&["stats"]))?;

    let mut ctx = ExecutionContext::new(transcript(), Flags::new());
    let result = Executor::new(&reg, &settings()).execute(&plan, &mut ctx, &NoReuse);
    assert!(result.is_success());

    assert!(ctx.is_frozen());
    assert_eq!(
        ctx.store_result("late", json!(null)),
        Err(ContextError::Frozen("late".to_owned()))
    );
    assert!(ctx.read_only()?.result("stats").is_some());

    ctx.close();
    assert!(!ctx.has_result("stats"));
    Ok(())
}

#[test]
fn test_preflight() -> Result<()> {
    let pipeline = Pipeline::new(analysis_registry()?, settings())?;

    let ok = pipeline.preflight(&set(&["affect_tension"]));
    assert!(ok.is_runnable());
    assert_eq!(
        ok.order,
        Some(vec![
            "emotion".to_owned(),
            "sentiment".to_owned(),
            "affect_tension".to_owned()
        ])
    );

    let bad = pipeline.preflight(&set(&["stats", "speaker_turns"]));
    assert!(!bad.is_runnable());
    assert_eq!(bad.unregistered, vec!["speaker_turns"]);
    Ok(())
}

#[test]
fn test_timeout_and_panic_are_isolated() -> Result<()> {
    let mut reg = ModuleRegistry::new();
    reg.register(
        ModuleNode::from_fn("hang", |_| {
            std::thread::sleep(Duration::from_secs(10));
            Ok(json!(null))
        })
        .timeout(Duration::from_millis(30)),
    )?;
    reg.register(ModuleNode::from_fn("crash", |_| panic!("bad segment")))?;
    reg.register(ModuleNode::from_fn("stats", |ctx| Ok(json!(segment_count(ctx.input())))))?;

    let pipeline = Pipeline::new(reg, settings())?;
    let result = pipeline.run(
        &set(&["hang", "crash", "stats"]),
        transcript(),
        Flags::new(),
        &NoReuse,
    )?;
    assert_eq!(result.status_of("hang"), Some(ModuleStatus::TimedOut));
    assert_eq!(result.status_of("crash"), Some(ModuleStatus::Failed));
    assert_eq!(result.modules_run, vec!["stats"]);
    assert_eq!(result.output("stats"), Some(&json!(3)));
    Ok(())
}

#[test]
fn test_module_without_time_limit() -> Result<()> {
    let mut reg = ModuleRegistry::new();
    reg.register(
        ModuleNode::from_fn("stats", |ctx| Ok(json!(segment_count(ctx.input()))))
            .timeout(Duration::MAX),
    )?;
    let pipeline = Pipeline::new(reg, settings())?;

    let result = pipeline.run(&set(&["stats"]), transcript(), Flags::new(), &NoReuse)?;
    assert!(result.is_success());
    assert_eq!(result.output("stats"), Some(&json!(3)));
    Ok(())
}

#[test]
fn test_reuse_of_partial_prior_run() -> Result<()> {
    let pipeline = Pipeline::new(analysis_registry()?, settings())?;
    let prior = PriorRun::reusable("2026-10-02-b", ["emotion"]);
    let result = pipeline.run(&set(&["affect_tension"]), transcript(), Flags::new(), &prior)?;

    assert_eq!(result.status, RunStatus::Reused);
    assert_eq!(result.modules_run, vec!["emotion"]);
    assert!(result.errors.is_empty());
    assert!(result.is_success());
    Ok(())
}

#[test]
fn test_parallel_pipeline() -> Result<()> {
    let settings = Settings {
        max_workers: 3,
        ..settings()
    };
    let pipeline = Pipeline::new(analysis_registry()?, settings)?;
    let result = pipeline.run(&set(&["summary"]), transcript(), Flags::new(), &NoReuse)?;

    assert!(result.is_success());
    assert_eq!(
        result.modules_run,
        vec!["stats", "emotion", "sentiment", "affect_tension", "summary"]
    );
    assert_eq!(
        result.output("summary"),
        Some(&json!({ "from": ["affect_tension", "emotion", "sentiment", "stats"] }))
    );
    Ok(())
}
