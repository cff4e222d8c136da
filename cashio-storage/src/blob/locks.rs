//! Striped per-cid locks.

use std::sync::{Mutex, MutexGuard, PoisonError};

use cashio_core::Cid;

const STRIPES: usize = 64;

/// Serializes operations on the same cid while letting different cids run
/// in parallel. Two cids can share a stripe; that only costs parallelism.
pub(crate) struct CidLocks {
    stripes: Vec<Mutex<()>>,
}

impl CidLocks {
    pub fn new() -> Self {
        Self {
            stripes: (0..STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    fn stripe(cid: &Cid) -> usize {
        cid.as_bytes()[0] as usize % STRIPES
    }

    fn lock_stripe(&self, stripe: usize) -> MutexGuard<'_, ()> {
        self.stripes[stripe]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lock(&self, cid: &Cid) -> MutexGuard<'_, ()> {
        self.lock_stripe(Self::stripe(cid))
    }

    /// Lock the stripes of `cid` and `other`, lower stripe first.
    pub fn lock_pair(&self, cid: &Cid, other: Option<&Cid>) -> Vec<MutexGuard<'_, ()>> {
        let mut stripes = vec![Self::stripe(cid)];
        stripes.extend(other.map(Self::stripe));
        stripes.sort_unstable();
        stripes.dedup();
        stripes.into_iter().map(|s| self.lock_stripe(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_stripes_do_not_block() {
        let locks = CidLocks::new();
        let _a = locks.lock(&Cid::from_bytes([0; 32]));
        let _b = locks.lock(&Cid::from_bytes([1; 32]));
    }

    #[test]
    fn test_same_cid_is_exclusive() {
        let locks = CidLocks::new();
        let cid = Cid::from_bytes([5; 32]);
        let guard = locks.lock(&cid);
        assert!(locks.stripes[5].try_lock().is_err());
        drop(guard);
        assert!(locks.stripes[5].try_lock().is_ok());
    }

    #[test]
    fn test_lock_pair_holds_both_stripes() {
        let locks = CidLocks::new();
        let a = Cid::from_bytes([7; 32]);
        let b = Cid::from_bytes([2; 32]);
        let guards = locks.lock_pair(&a, Some(&b));
        assert_eq!(guards.len(), 2);
        assert!(locks.stripes[7].try_lock().is_err());
        assert!(locks.stripes[2].try_lock().is_err());
        drop(guards);

        assert_eq!(locks.lock_pair(&a, Some(&a)).len(), 1);
        assert_eq!(locks.lock_pair(&a, None).len(), 1);
    }
}
