//! Cyclic-dependency detection.
//!
//! A thread-local activation stack, not a persistent graph: cycles only
//! matter *while* a chain of activations is in progress on the calling
//! task, rather than as a static property of the declared components —
//! the actual dependency edges are only known once references start
//! resolving (targets can be restricted by LDAP filters evaluated
//! against live registry state).

use std::cell::RefCell;

thread_local! {
    static ACTIVATION_STACK: RefCell<Vec<String>> = RefCell::new(Vec::new());
}

/// RAII guard pushing `component` onto the thread-local activation stack.
/// Dropped (even on panic/early-return) it pops itself back off.
pub struct ActivationGuard {
    popped: bool,
}

impl Drop for ActivationGuard {
    fn drop(&mut self) {
        if !self.popped {
            ACTIVATION_STACK.with(|stack| {
                stack.borrow_mut().pop();
            });
        }
    }
}

/// Attempts to enter `component`'s activation. Returns `Err` with the
/// full cycle (innermost first) if `component` is already being
/// activated somewhere up this call chain.
pub fn enter(component: &str) -> Result<ActivationGuard, Vec<String>> {
    ACTIVATION_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        if stack.iter().any(|c| c == component) {
            let mut cycle = stack.clone();
            cycle.push(component.to_owned());
            return Err(cycle);
        }
        stack.push(component.to_owned());
        Ok(ActivationGuard { popped: false })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_self_cycle() {
        let _guard = enter("A").unwrap();
        let err = enter("A").unwrap_err();
        assert_eq!(err, vec!["A".to_string(), "A".to_string()]);
    }

    #[test]
    fn allows_reentry_after_drop() {
        {
            let _guard = enter("A").unwrap();
        }
        assert!(enter("A").is_ok());
    }

    #[test]
    fn detects_indirect_cycle() {
        let _a = enter("A").unwrap();
        let _b = enter("B").unwrap();
        let err = enter("A").unwrap_err();
        assert_eq!(err, vec!["A".to_string(), "B".to_string(), "A".to_string()]);
    }
}
