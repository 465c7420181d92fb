use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::InterruptHandle;

/// Hands a running query's interrupt handle from the blocking worker to the
/// async side that enforces the deadline.
#[derive(Default)]
pub(crate) struct InterruptGuard {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    fired: bool,
    handle: Option<InterruptHandle>,
}

impl InterruptGuard {
    /// Returns false if the deadline already fired before the query started.
    pub(crate) fn arm(&self, handle: InterruptHandle) -> bool {
        let mut state = self.lock();
        if state.fired {
            return false;
        }
        state.handle = Some(handle);
        true
    }

    pub(crate) fn disarm(&self) {
        self.lock().handle = None;
    }

    pub(crate) fn fire(&self) {
        let mut state = self.lock();
        state.fired = true;
        if let Some(handle) = state.handle.take() {
            handle.interrupt();
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::{Connection, ErrorCode};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn arm_after_fire_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        let guard = InterruptGuard::default();
        guard.fire();
        assert!(!guard.arm(conn.get_interrupt_handle()));
    }

    #[test]
    fn fire_interrupts_running_statement() {
        let conn = Connection::open_in_memory().unwrap();
        let guard = Arc::new(InterruptGuard::default());
        assert!(guard.arm(conn.get_interrupt_handle()));

        let firing = Arc::clone(&guard);
        let timer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            firing.fire();
        });

        let result: rusqlite::Result<i64> = conn.query_row(
            "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n) \
             SELECT count(*) FROM n",
            [],
            |row| row.get(0),
        );
        timer.join().unwrap();

        let err = result.unwrap_err();
        assert_eq!(err.sqlite_error_code(), Some(ErrorCode::OperationInterrupted));

        // Later statements on the same connection are unaffected.
        guard.disarm();
        let after: i64 = conn.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
        assert_eq!(after, 1);
    }
}
