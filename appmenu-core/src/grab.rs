//! The process-wide input grab.

use std::cell::Cell;
use std::rc::Rc;

use log::warn;

/// Identity of a [MenuManager](crate::manager::MenuManager).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordinatorId(pub u32);

/// Shared handle to the input grab. Clones refer to the same grab.
///
/// At most one coordinator owns the grab at a time. Only coordinators acquire and release it.
#[derive(Debug, Clone, Default)]
pub struct InputGrab {
    owner: Rc<Cell<Option<CoordinatorId>>>,
}

impl InputGrab {
    /// Creates a free grab.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the grab. Succeeds when it is free or already held by `by`.
    pub fn acquire(&self, by: CoordinatorId) -> bool {
        match self.owner.get() {
            None => {
                self.owner.set(Some(by));
                true
            },
            Some(owner) if owner == by => true,
            Some(owner) => {
                warn!("Input grab requested by {by:?} is held by {owner:?}");
                false
            },
        }
    }

    /// Give the grab back. Does nothing when `by` does not hold it.
    pub fn release(&self, by: CoordinatorId) -> bool {
        if self.owner.get() == Some(by) {
            self.owner.set(None);
            true
        } else {
            false
        }
    }

    /// Current holder.
    pub fn owner(&self) -> Option<CoordinatorId> {
        self.owner.get()
    }

    /// Whether `by` holds the grab.
    pub fn is_held_by(&self, by: CoordinatorId) -> bool {
        self.owner.get() == Some(by)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_owner() {
        let grab = InputGrab::new();
        let a = CoordinatorId(1);
        let b = CoordinatorId(2);

        assert!(grab.acquire(a));
        assert!(grab.acquire(a));
        assert!(!grab.acquire(b));
        assert!(!grab.release(b));
        assert!(grab.release(a));
        assert_eq!(grab.owner(), None);
        assert!(grab.acquire(b));
    }
}
