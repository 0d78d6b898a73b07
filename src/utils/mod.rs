// Utility functions

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

// =============================================================================
// Lock Helpers - a panicked holder must not wedge the runner
// =============================================================================

/// Lock a mutex, recovering the guard if a previous holder panicked.
pub fn lock_mutex_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Mutex was poisoned, recovering: {}", poisoned);
            poisoned.into_inner()
        }
    }
}

/// Shared-read counterpart of [`lock_mutex_recover`].
pub fn read_lock_recover<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("RwLock was poisoned, recovering read guard: {}", poisoned);
            poisoned.into_inner()
        }
    }
}

pub fn write_lock_recover<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("RwLock was poisoned, recovering write guard: {}", poisoned);
            poisoned.into_inner()
        }
    }
}

// =============================================================================
// Text Helpers
// =============================================================================

/// Truncate to at most `max_chars` characters, appending "..." when cut.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Lossy UTF-8 rendering of captured process output, trimmed.
pub fn trimmed_output(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}
