//! Cooperative handling of SIGINT while a version is being materialized.
//!
//! Killing the process outright would skip the rollback guards, so while an
//! [`InterruptGuard`] is alive the first SIGINT only raises a flag. Long-running
//! steps poll [`interrupted`] and bail out with `StoreError::Interrupted`, which
//! unwinds through the guards normally. A second SIGINT, or any SIGINT with no
//! guard alive, takes the default action and terminates the process.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::debug;

struct InterruptFlags {
    /// Set by the first SIGINT inside a guard.
    interrupted: Arc<AtomicBool>,
    /// While set, SIGINT terminates the process. Cleared by an active guard
    /// and raised again by the first signal.
    terminate: Arc<AtomicBool>,
    active_guards: AtomicUsize,
}

fn flags() -> &'static InterruptFlags {
    static FLAGS: OnceLock<InterruptFlags> = OnceLock::new();
    FLAGS.get_or_init(|| InterruptFlags {
        interrupted: Arc::new(AtomicBool::new(false)),
        terminate: Arc::new(AtomicBool::new(true)),
        active_guards: AtomicUsize::new(0),
    })
}

pub fn interrupted() -> bool {
    flags().interrupted.load(Ordering::SeqCst)
}

#[cfg(unix)]
fn register_handlers() {
    static REGISTERED: OnceLock<()> = OnceLock::new();
    REGISTERED.get_or_init(|| {
        use signal_hook::consts::SIGINT;
        use signal_hook::flag;

        let flags = flags();
        // Actions run in registration order: the default action must observe
        // `terminate` before this same signal raises it.
        let registered = flag::register_conditional_default(SIGINT, Arc::clone(&flags.terminate))
            .and_then(|_| flag::register(SIGINT, Arc::clone(&flags.terminate)))
            .and_then(|_| flag::register(SIGINT, Arc::clone(&flags.interrupted)));
        if let Err(err) = registered {
            tracing::warn!(error = %err, "failed to register SIGINT handler; Ctrl-C skips rollback");
        }
    });
}

/// Turns the first SIGINT into a flag for as long as it is alive.
#[derive(Debug)]
pub struct InterruptGuard {
    _private: (),
}

impl InterruptGuard {
    pub fn install() -> Self {
        let flags = flags();

        #[cfg(unix)]
        register_handlers();

        flags.active_guards.fetch_add(1, Ordering::SeqCst);
        flags.interrupted.store(false, Ordering::SeqCst);
        flags.terminate.store(false, Ordering::SeqCst);
        Self { _private: () }
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        let flags = flags();
        if flags.active_guards.fetch_sub(1, Ordering::SeqCst) == 1 {
            flags.terminate.store(true, Ordering::SeqCst);
            debug!("SIGINT restored to its default action");
        }
    }
}
