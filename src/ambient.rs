//! Thread scoped marker for externally coordinated transactions.
//!
//! A coordinator that spans several resources enters the ambient context for the
//! duration of its unit of work. Sessions created inside it leave opening the
//! connection to the coordinator instead of opening it themselves.

use std::{cell::Cell, marker::PhantomData};

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Whether the current thread runs inside an ambient transaction.
pub fn is_active() -> bool {
    DEPTH.with(|depth| depth.get() > 0)
}

/// Enter the ambient context until the returned guard is dropped. Guards nest.
pub fn enter() -> AmbientGuard {
    DEPTH.with(|depth| depth.set(depth.get() + 1));
    log::debug!("Entered the ambient transaction context");
    AmbientGuard {
        _not_send: PhantomData,
    }
}

/// Keeps the ambient context active on the thread that created it.
#[must_use = "the ambient context ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct AmbientGuard {
    _not_send: PhantomData<*const ()>,
}

impl Drop for AmbientGuard {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
        log::debug!("Left the ambient transaction context");
    }
}

#[cfg(test)]
mod tests {
    use crate::ambient;
    use std::thread;

    #[test]
    fn nesting() {
        assert!(!ambient::is_active());
        {
            let _outer = ambient::enter();
            assert!(ambient::is_active());
            {
                let _inner = ambient::enter();
                assert!(ambient::is_active());
            }
            assert!(ambient::is_active());
            thread::spawn(|| assert!(!ambient::is_active()))
                .join()
                .unwrap();
        }
        assert!(!ambient::is_active());
    }
}
