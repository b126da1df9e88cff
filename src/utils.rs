//! Process-global state kept to a minimum: the current working directory,
//! and a thread-id check used to assert that event-loop-owning operations
//! run on the loop's own thread. Everything else is threaded through
//! constructors instead of reached for as a singleton.

use parking_lot::Mutex;
use std::sync::OnceLock;
use std::thread::ThreadId;

use crate::error::{Error, Result};

static CURRENT_DIR: OnceLock<Mutex<String>> = OnceLock::new();

fn current_dir_cell() -> &'static Mutex<String> {
    CURRENT_DIR.get_or_init(|| {
        let initial = std::env::current_dir()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        Mutex::new(initial)
    })
}

pub fn current_working_directory() -> String {
    current_dir_cell().lock().clone()
}

pub fn set_current_working_directory(path: &str) -> Result<()> {
    std::env::set_current_dir(path).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    *current_dir_cell().lock() = path.to_string();
    Ok(())
}

/// Guards operations that must only run on the thread that owns the event
/// loop (dispatch targets, window destruction), matching the original
/// runtime's thread-affinity assertions in debug builds.
pub struct LoopThreadGuard {
    owner: ThreadId,
}

impl LoopThreadGuard {
    pub fn for_current_thread() -> Self {
        Self {
            owner: std::thread::current().id(),
        }
    }

    pub fn is_loop_thread(&self) -> bool {
        std::thread::current().id() == self.owner
    }
}

/// Trims one pair of matching `"` or `'` quotes, used by the INI parser and
/// by config value normalization.
pub fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

pub fn trim_whitespace(value: &str) -> &str {
    value.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_thread_guard_recognizes_owner() {
        let guard = LoopThreadGuard::for_current_thread();
        assert!(guard.is_loop_thread());
        let moved = std::thread::spawn(move || guard.is_loop_thread())
            .join()
            .unwrap();
        assert!(!moved);
    }

    #[test]
    fn unquote_strips_matching_quotes() {
        assert_eq!(unquote("\"hi\""), "hi");
        assert_eq!(unquote("'hi'"), "hi");
        assert_eq!(unquote("hi"), "hi");
    }
}
