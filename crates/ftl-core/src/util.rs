use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering from poison (prior panic in another thread).
///
/// A panicking status loop must not take the connect gate down with it.
pub(crate) fn lock_or_recover<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
