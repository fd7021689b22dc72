//! End-to-end behaviour of the registry through its public API.

use optbus_core::builtin::SESSION_DONE;
use optbus_core::{
    Attributes, ErrorCode, Hooks, OptError, Registry, SetOutcome, Value, WatchPhase,
};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn watch_parked_before_registration_fires_after() {
    let registry = Registry::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    registry
        .watch("i:/late/value", WatchPhase::After, move |event| {
            log.lock().push(event.current().as_int());
        })
        .unwrap();
    assert_eq!(
        registry.pending_watch_paths(WatchPhase::After),
        vec!["i:/late/value".to_string()]
    );

    registry.register_default("i:/late/value").unwrap();
    assert!(registry.pending_watch_paths(WatchPhase::After).is_empty());

    registry.set_int("i:/late/value", 4).unwrap();
    assert_eq!(*seen.lock(), vec![Some(4)]);
}

#[test]
fn setter_can_clamp_the_pending_value() {
    let registry = Registry::new();
    let hooks = Hooks::new().with_setter(|ctx| {
        let wanted = ctx.pending().as_int().unwrap_or(0);
        ctx.set_current(Value::Int(wanted.clamp(0, 10)))?;
        Ok(SetOutcome::Handled)
    });
    registry
        .register("i:/limits/level", Attributes::default(), hooks)
        .unwrap();

    registry.set_int("i:/limits/level", 42).unwrap();
    assert_eq!(registry.get_int("i:/limits/level").unwrap(), 10);
    registry.set_int("i:/limits/level", -3).unwrap();
    assert_eq!(registry.get_int("i:/limits/level").unwrap(), 0);
}

#[test]
fn entries_without_set_permission_take_one_value() {
    let registry = Registry::new();
    registry
        .register("s:/ro/name", Attributes::CAN_GET, Hooks::new())
        .unwrap();
    registry.set_str("s:/ro/name", "first").unwrap();
    let err = registry.set_str("s:/ro/name", "second").unwrap_err();
    assert_eq!(err.code(), ErrorCode::Forbidden);
    assert_eq!(registry.get_str("s:/ro/name").unwrap(), "first");
}

#[test]
fn batch_reports_first_error_and_applies_the_rest() {
    let registry = Registry::new();
    registry.register_default("i:/b/one").unwrap();
    registry.register_default("i:/b/two").unwrap();

    let err = registry
        .set_batch("i:/b/one=1\ni:/b/missing=2\ni:/b/two=3\n", false)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
    assert_eq!(registry.get_int("i:/b/one").unwrap(), 1);
    assert_eq!(registry.get_int("i:/b/two").unwrap(), 3);
}

#[test]
fn session_watchers_can_reject_a_batch() {
    let registry = Registry::new();
    registry.register_default("s:/cfg/mode").unwrap();
    registry
        .watch(SESSION_DONE, WatchPhase::After, |event| {
            event.report_session_error(0x2)
        })
        .unwrap();

    let err = registry.set_batch("s:/cfg/mode=fast", true).unwrap_err();
    assert!(matches!(err, OptError::SessionRejected { bits: 0x2 }));
}

#[test]
fn load_file_registers_missing_entries() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "i:/app/workers=8").unwrap();
    writeln!(file, "s:/app/name=demo").unwrap();
    writeln!(file, "a:/app/tags=x;y").unwrap();

    let registry = Registry::new();
    assert_eq!(registry.load_file(file.path()).unwrap(), 3);
    assert_eq!(registry.get_int("i:/app/workers").unwrap(), 8);
    assert_eq!(registry.get_str("s:/app/name").unwrap(), "demo");
    assert_eq!(registry.get_array("a:/app/tags").unwrap(), vec!["x", "y"]);
    assert_eq!(registry.get_ini("i:/app/workers").unwrap(), "8");
}

#[test]
fn concurrent_sets_on_distinct_entries() {
    let registry = Arc::new(Registry::new());
    for i in 0..8 {
        registry.register_default(&format!("i:/par/{i}")).unwrap();
    }

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let path = format!("i:/par/{i}");
                for n in 1..=100 {
                    registry.set_int(&path, n).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    for i in 0..8 {
        assert_eq!(registry.get_int(&format!("i:/par/{i}")).unwrap(), 100);
    }
}

#[test]
fn cross_entry_watchers_on_two_threads_finish() {
    let registry = Arc::new(Registry::new());
    registry.register_default("i:/x/a").unwrap();
    registry.register_default("i:/x/b").unwrap();

    // Each watcher sets the entry the other thread is setting.
    for (path, other) in [("i:/x/a", "i:/x/b"), ("i:/x/b", "i:/x/a")] {
        registry
            .watch(path, WatchPhase::Before, move |event| {
                thread::sleep(Duration::from_millis(20));
                let value = event.pending().as_int().unwrap_or(0);
                if let Err(err) = event.registry().set_int(other, value) {
                    assert_eq!(err.code(), ErrorCode::Recursive);
                }
            })
            .unwrap();
    }

    let barrier = Arc::new(Barrier::new(2));
    let (done_tx, done_rx) = mpsc::channel();
    for (path, value) in [("i:/x/a", 1), ("i:/x/b", 2)] {
        let registry = Arc::clone(&registry);
        let barrier = Arc::clone(&barrier);
        let done_tx = done_tx.clone();
        thread::spawn(move || {
            barrier.wait();
            let result = registry.set_int(path, value);
            let _ = done_tx.send(result.is_ok());
        });
    }
    drop(done_tx);

    for _ in 0..2 {
        assert!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap());
    }
    for path in ["i:/x/a", "i:/x/b"] {
        assert!(matches!(registry.get_int(path).unwrap(), 1 | 2));
    }
}

#[test]
fn unregister_runs_deleter_with_last_value() {
    let registry = Registry::new();
    let deleted = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&deleted);
    let hooks = Hooks::new().with_deleter(move |path, value| {
        *slot.lock() = Some((path.to_string(), value.clone()));
    });
    registry
        .register("s:/tmp/key", Attributes::default(), hooks)
        .unwrap();
    registry.set_str("s:/tmp/key", "bye").unwrap();

    registry.unregister("s:/tmp/key").unwrap();
    assert!(!registry.contains("s:/tmp/key"));
    assert_eq!(
        *deleted.lock(),
        Some(("s:/tmp/key".to_string(), Value::from("bye")))
    );
}
