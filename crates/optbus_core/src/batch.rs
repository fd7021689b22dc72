//! Text-driven sets: single `key=value` pairs, batches and files.

use crate::error::{OptError, OptResult};
use crate::ini::{format_value, parse_kv, parse_value};
use crate::registry::{matches_pattern, Registry, SetStatus};
use crate::types::{SessionId, ValueType};
use std::path::Path;
use tracing::{info, warn};

/// Options for [`Registry::set_batch_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Stop at the first failing line.
    pub stop_on_error: bool,
    /// Register unknown keys with default attributes before setting them.
    pub create_missing: bool,
}

impl BatchOptions {
    /// Keep going on errors, do not create entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the batch stops at the first error.
    pub fn with_stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    /// Sets whether unknown keys are registered on the fly.
    pub fn with_create_missing(mut self, create: bool) -> Self {
        self.create_missing = create;
        self
    }
}

impl Registry {
    /// Parses `text` according to the entry type of `key` and sets it.
    pub fn set_kv(&self, session: SessionId, key: &str, text: &str) -> OptResult<SetStatus> {
        let entry = self.lookup(key)?;
        let value = parse_value(entry.value_type, text)?;
        self.set_entry(session, &entry, value)
            .map(|(status, _)| status)
    }

    /// Applies `key=value` lines inside one session.
    ///
    /// Returns the number of lines applied. Skipped sets count as applied.
    pub fn set_batch(&self, text: &str, stop_on_error: bool) -> OptResult<usize> {
        self.set_batch_with(text, BatchOptions::new().with_stop_on_error(stop_on_error))
    }

    /// Applies `key=value` lines inside one session.
    ///
    /// The session is committed as cancelled when any line failed. The
    /// first line error wins; otherwise error bits reported on commit are
    /// returned as [`OptError::SessionRejected`].
    pub fn set_batch_with(&self, text: &str, options: BatchOptions) -> OptResult<usize> {
        let pairs = parse_kv(text);
        let session = self.session_start();
        let mut applied = 0;
        let mut first_error = None;

        for (key, value) in &pairs {
            let result = self
                .ensure_entry(key, options.create_missing)
                .and_then(|()| self.set_kv(session, key, value));
            match result {
                Ok(_) => applied += 1,
                Err(err) => {
                    warn!("Batch line {}={} failed: {}", key, value, err);
                    first_error.get_or_insert(err);
                    if options.stop_on_error {
                        break;
                    }
                }
            }
        }

        let committed = self.session_commit(session, first_error.is_some());
        match (first_error, committed) {
            (Some(err), _) => Err(err),
            (None, Err(err)) => Err(err),
            (None, Ok(0)) => Ok(applied),
            (None, Ok(bits)) => Err(OptError::SessionRejected { bits }),
        }
    }

    fn ensure_entry(&self, key: &str, create: bool) -> OptResult<()> {
        if create && !self.contains(key) {
            self.register_default(key)?;
        }
        Ok(())
    }

    /// Loads an ini file, registering entries that do not exist yet.
    pub fn load_file(&self, path: impl AsRef<Path>) -> OptResult<usize> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let applied =
            self.set_batch_with(&text, BatchOptions::new().with_create_missing(true))?;
        info!("Loaded {} entries from {:?}", applied, path);
        Ok(applied)
    }

    /// Serializes one entry to its text form, running its getter.
    pub fn get_ini(&self, path: &str) -> OptResult<String> {
        let entry = self.lookup(path)?;
        if entry.value_type == ValueType::Event {
            return Err(OptError::forbidden(format!("{path} is an event and has no value")));
        }
        let value = self.get_entry(&entry)?;
        Ok(format_value(&value))
    }

    /// Serializes every matching entry as `key=value` lines.
    ///
    /// Events and entries that fail to read are left out.
    pub fn dump_ini(&self, pattern: Option<&str>) -> String {
        let mut out = String::new();
        for path in self.paths() {
            if !matches_pattern(pattern, &path) {
                continue;
            }
            if let Ok(text) = self.get_ini(&path) {
                out.push_str(&path);
                out.push('=');
                out.push_str(&text);
                out.push('\n');
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::SESSION_DONE;
    use crate::hooks::{Hooks, SetOutcome};
    use crate::types::{Attributes, Value, WatchPhase};
    use std::io::Write;

    fn registry_with(paths: &[&str]) -> Registry {
        let registry = Registry::new();
        for path in paths {
            registry.register_default(path).unwrap();
        }
        registry
    }

    #[test]
    fn set_kv_dispatches_by_type() {
        let registry = registry_with(&["i:/n", "a:/list", "d:/raw"]);
        registry.set_kv(SessionId::NONE, "i:/n", "42").unwrap();
        registry.set_kv(SessionId::NONE, "a:/list", "x;y").unwrap();
        registry.set_kv(SessionId::NONE, "d:/raw", "0a0b").unwrap();
        assert_eq!(registry.get_int("i:/n").unwrap(), 42);
        assert_eq!(registry.get_array("a:/list").unwrap(), vec!["x", "y"]);
        assert_eq!(registry.get_blob("d:/raw").unwrap(), vec![10, 11]);
    }

    #[test]
    fn batch_applies_all_lines_in_one_session() {
        let registry = registry_with(&["s:/a", "i:/b"]);
        let sessions = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let log = std::sync::Arc::clone(&sessions);
        registry
            .watch("s:/a", WatchPhase::After, move |e| log.lock().push(e.session()))
            .unwrap();
        let log = std::sync::Arc::clone(&sessions);
        registry
            .watch("i:/b", WatchPhase::After, move |e| log.lock().push(e.session()))
            .unwrap();

        assert_eq!(registry.set_batch("s:/a=x\ni:/b=2\n", true).unwrap(), 2);
        let seen = sessions.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].is_some());
        assert_eq!(seen[0], seen[1]);
    }

    #[test]
    fn batch_stops_on_first_error_when_asked() {
        let registry = registry_with(&["i:/a", "i:/c"]);
        let err = registry
            .set_batch("i:/a=1\ni:/missing=2\ni:/c=3\n", true)
            .unwrap_err();
        assert!(matches!(err, OptError::NotFound { .. }));
        assert_eq!(registry.get_int("i:/a").unwrap(), 1);
        assert_eq!(registry.get_int("i:/c").unwrap(), 0);
    }

    #[test]
    fn batch_continues_past_errors_by_default() {
        let registry = registry_with(&["i:/a", "i:/c"]);
        let err = registry
            .set_batch("i:/a=1\ni:/a=oops\ni:/c=3\n", false)
            .unwrap_err();
        assert!(matches!(err, OptError::BadParameter { .. }));
        assert_eq!(registry.get_int("i:/c").unwrap(), 3);
    }

    #[test]
    fn failed_batch_commits_cancelled() {
        let registry = registry_with(&["i:/a"]);
        let cancelled = std::sync::Arc::new(parking_lot::Mutex::new(None));
        let slot = std::sync::Arc::clone(&cancelled);
        registry
            .watch(SESSION_DONE, WatchPhase::After, move |e| {
                *slot.lock() = Some(e.session_cancelled());
            })
            .unwrap();
        assert!(registry.set_batch("i:/a=nope", false).is_err());
        assert_eq!(*cancelled.lock(), Some(true));
        registry.set_batch("i:/a=5", false).unwrap();
        assert_eq!(*cancelled.lock(), Some(false));
    }

    #[test]
    fn skip_counts_as_success() {
        let registry = Registry::new();
        registry
            .register(
                "s:/skip",
                Attributes::default(),
                Hooks::new().with_setter(|_ctx| Ok(SetOutcome::Skip)),
            )
            .unwrap();
        assert_eq!(registry.set_batch("s:/skip=v", true).unwrap(), 1);
    }

    #[test]
    fn session_bits_reject_batch() {
        let registry = registry_with(&["i:/a"]);
        registry
            .watch(SESSION_DONE, WatchPhase::After, |e| e.report_session_error(0x20))
            .unwrap();
        let err = registry.set_batch("i:/a=1", true).unwrap_err();
        assert!(matches!(err, OptError::SessionRejected { bits: 0x20 }));
        assert_eq!(registry.get_int("i:/a").unwrap(), 1);
    }

    #[test]
    fn create_missing_registers_keys() {
        let registry = Registry::new();
        let options = BatchOptions::new().with_create_missing(true);
        assert_eq!(
            registry
                .set_batch_with("s:/new/name=x\nq:/bad=1\n", options)
                .unwrap_err()
                .code(),
            crate::error::ErrorCode::BadType
        );
        assert_eq!(registry.get_str("s:/new/name").unwrap(), "x");
    }

    #[test]
    fn load_file_registers_and_sets() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "s:/cfg/host=example.org").unwrap();
        writeln!(file, "i:/cfg/port=8080").unwrap();
        write!(file, "a:/cfg/tags=x;y").unwrap();

        let registry = Registry::new();
        assert_eq!(registry.load_file(file.path()).unwrap(), 3);
        assert_eq!(registry.get_str("s:/cfg/host").unwrap(), "example.org");
        assert_eq!(registry.get_int("i:/cfg/port").unwrap(), 8080);
        assert_eq!(registry.get_array("a:/cfg/tags").unwrap(), vec!["x", "y"]);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new();
        let err = registry.load_file(dir.path().join("absent.ini")).unwrap_err();
        assert!(matches!(err, OptError::Io(_)));
    }

    #[test]
    fn get_ini_forms() {
        let registry = registry_with(&["p:/h", "e:/go", "d:/bytes"]);
        registry.set_pointer("p:/h", 0xabc).unwrap();
        registry.set_blob("d:/bytes", vec![1, 2]).unwrap();
        assert_eq!(registry.get_ini("p:/h").unwrap(), "0xabc");
        assert_eq!(registry.get_ini("d:/bytes").unwrap(), "0102");
        assert!(matches!(
            registry.get_ini("e:/go").unwrap_err(),
            OptError::Forbidden { .. }
        ));
    }

    #[test]
    fn dump_ini_feeds_another_registry() {
        let source = registry_with(&["s:/app/a", "i:/app/b", "e:/app/tick"]);
        source.set_str("s:/app/a", "alpha").unwrap();
        source.set_int("i:/app/b", 7).unwrap();
        assert_eq!(source.dump_ini(Some("s:/app/*")), "s:/app/a=alpha\n");

        let target = Registry::new();
        let text = source.dump_ini(Some("i:/app/*"));
        target
            .set_batch_with(&text, BatchOptions::new().with_create_missing(true))
            .unwrap();
        assert_eq!(target.get("i:/app/b").unwrap(), Value::Int(7));
        assert!(!source.dump_ini(None).contains("e:/app/tick"));
    }
}
