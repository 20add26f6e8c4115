//! Capture pipeline fallback behaviour with scripted strategies

use deckshot::capture::{CaptureJob, CaptureOutcome, CapturePipeline, CaptureStrategy, ViewAccess};
use deckshot::{Config, Error};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

type Calls = Rc<RefCell<Vec<(String, CaptureJob)>>>;

/// Succeeds with fixed bytes or faults with a fixed reason, recording each call.
struct Scripted {
    name: &'static str,
    result: Result<Vec<u8>, String>,
    calls: Calls,
}

impl CaptureStrategy for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    fn attempt(&self, job: &CaptureJob) -> deckshot::Result<Vec<u8>> {
        self.calls.borrow_mut().push((self.name.to_string(), job.clone()));
        self.result.clone().map_err(Error::AutomationError)
    }
}

fn ok(name: &'static str, calls: &Calls) -> Box<dyn CaptureStrategy> {
    Box::new(Scripted {
        name,
        result: Ok(b"\x89PNG\r\n\x1a\nfake".to_vec()),
        calls: calls.clone(),
    })
}

fn fault(name: &'static str, reason: &str, calls: &Calls) -> Box<dyn CaptureStrategy> {
    Box::new(Scripted {
        name,
        result: Err(reason.to_string()),
        calls: calls.clone(),
    })
}

fn config() -> Config {
    Config {
        public_settle_ms: 10,
        edit_settle_ms: 20,
        ..Default::default()
    }
}

const PUB: &str = "https://docs.google.com/presentation/d/abc/pub";
const EDIT: &str = "https://docs.google.com/presentation/d/abc/edit";

#[test]
fn falls_back_to_second_strategy() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Calls::default();
    let mut pipeline = CapturePipeline::new(
        &config(),
        vec![fault("explicit-driver", "launch failed", &calls), ok("managed-driver", &calls)],
    );

    let attempt = pipeline.capture(PUB, dir.path());

    assert!(attempt.is_success());
    assert_eq!(attempt.strategy_name, "managed-driver");
    assert_eq!(attempt.target_url, PUB);

    let log = pipeline.attempts();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].strategy_name, "explicit-driver");
    match &log[0].outcome {
        CaptureOutcome::Failure { reason } => assert!(reason.contains("launch failed")),
        other => panic!("expected failure, got {:?}", other),
    }

    if let CaptureOutcome::Success { file_path, byte_size, .. } = &attempt.outcome {
        assert!(file_path.exists());
        assert_eq!(*byte_size, std::fs::metadata(file_path).unwrap().len());
        assert!(file_path.file_name().unwrap().to_string_lossy().ends_with("_managed-driver.png"));
    }
}

#[test]
fn all_faulting_returns_last_failure() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Calls::default();
    let mut pipeline = CapturePipeline::new(
        &config(),
        vec![
            fault("explicit-driver", "no binary", &calls),
            fault("managed-driver", "navigation timeout", &calls),
            fault("visible-fallback", "no display", &calls),
        ],
    );

    let attempt = pipeline.capture(PUB, dir.path());

    assert!(!attempt.is_success());
    assert_eq!(attempt.strategy_name, "visible-fallback");
    match &attempt.outcome {
        CaptureOutcome::Failure { reason } => assert!(reason.contains("no display")),
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(pipeline.attempts().len(), 3);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn strategies_run_once_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Calls::default();
    let mut pipeline = CapturePipeline::new(
        &config(),
        vec![
            fault("a", "x", &calls),
            fault("b", "y", &calls),
            ok("c", &calls),
            ok("d", &calls),
        ],
    );
    assert_eq!(pipeline.strategy_names(), vec!["a", "b", "c", "d"]);

    pipeline.capture(PUB, dir.path());

    let order: Vec<String> = calls.borrow().iter().map(|(name, _)| name.clone()).collect();
    assert_eq!(order, vec!["a", "b", "c"]);
}

#[test]
fn settle_interval_follows_view_access() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Calls::default();
    let mut pipeline = CapturePipeline::new(&config(), vec![ok("only", &calls)]);

    pipeline.capture(PUB, dir.path());
    pipeline.capture(EDIT, dir.path());

    let calls = calls.borrow();
    assert_eq!(calls[0].1.access, ViewAccess::Public);
    assert_eq!(calls[0].1.settle, Duration::from_millis(10));
    assert_eq!(calls[1].1.access, ViewAccess::Authenticated);
    assert_eq!(calls[1].1.settle, Duration::from_millis(20));
    assert_eq!(calls[1].1.viewport, config().viewport);
}

#[test]
fn log_is_append_only_across_captures() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Calls::default();
    let mut pipeline = CapturePipeline::new(&config(), vec![fault("a", "x", &calls), ok("b", &calls)]);

    pipeline.capture(PUB, dir.path());
    pipeline.capture_tagged(Some("after"), EDIT, dir.path());

    let names: Vec<&str> = pipeline.attempts().iter().map(|a| a.strategy_name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "a", "b"]);
    assert_eq!(pipeline.attempts()[3].target_url, EDIT);
}

#[test]
fn creates_nested_output_directory() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("screenshots").join("run-1");
    let calls = Calls::default();
    let mut pipeline = CapturePipeline::new(&config(), vec![ok("a", &calls)]);

    assert!(pipeline.capture(PUB, &out).is_success());
    assert!(out.is_dir());
}
