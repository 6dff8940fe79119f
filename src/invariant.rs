//! Invariant checking for hardware and session contracts
//!
//! Invariant violations indicate a driver or logic bug (a primary camera
//! facing the wrong way, a configuration referencing a value its camera does
//! not support, an illegal capture state transition). They are never
//! recovered from: the check panics after logging.
//!
//! Every checked invariant is recorded per thread so contract tests can
//! assert that a code path actually exercised the checks it depends on.
//!
//! ```rust,ignore
//! use camera_session::assert_invariant;
//!
//! assert_invariant!(
//!     device.facing == Facing::Back,
//!     "Primary back camera must face back",
//!     "catalog"
//! );
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::thread_local;

thread_local! {
    static CHECKED_INVARIANTS: RefCell<HashSet<String>> = RefCell::new(HashSet::new());
}

/// Assert an invariant, panicking with an `INVARIANT VIOLATION` message if it fails.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $message:expr) => {
        $crate::invariant::check($condition, $message, None)
    };
    ($condition:expr, $message:expr, $context:expr) => {
        $crate::invariant::check($condition, $message, Some($context))
    };
}

/// Backing function of [`assert_invariant!`]
#[doc(hidden)]
#[track_caller]
pub fn check(condition: bool, message: &str, context: Option<&str>) {
    CHECKED_INVARIANTS.with(|log| {
        log.borrow_mut().insert(message.to_string());
    });

    if !condition {
        let ctx = context.unwrap_or("unknown");
        log::error!("Invariant violated in {}: {}", ctx, message);
        panic!("INVARIANT VIOLATION [{}]: {}", ctx, message);
    }
}

/// Raise an invariant violation unconditionally.
#[track_caller]
pub fn violation(message: &str, context: &str) -> ! {
    check(false, message, Some(context));
    unreachable!("invariant check returned after a violation")
}

/// Panic unless every listed invariant was checked on this thread.
pub fn contract_test(test_name: &str, required_invariants: &[&str]) {
    let checked = CHECKED_INVARIANTS.with(|log| log.borrow().clone());

    let missing: Vec<&str> = required_invariants
        .iter()
        .copied()
        .filter(|invariant| !checked.contains(*invariant))
        .collect();

    if !missing.is_empty() {
        panic!(
            "CONTRACT FAILURE [{}]: invariants never checked:\n  - {}",
            test_name,
            missing.join("\n  - ")
        );
    }
}

/// Forget the invariants recorded on this thread
pub fn clear_checked_invariants() {
    CHECKED_INVARIANTS.with(|log| log.borrow_mut().clear());
}
