use core::any::type_name;
use core::ops::Not;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::log;

pub struct Slot<T> {
    is_claimed: AtomicBool,
    inner: T,
}

impl<T> Slot<T> {
    pub const fn new(inner: T) -> Self {
        Slot {
            inner,
            is_claimed: AtomicBool::new(false),
        }
    }

    /// Try to claim the slot, returns None if the slot has already been claimed
    pub(crate) fn claim(&self) -> Option<&T> {
        self.is_claimed
            .fetch_or(true, Ordering::Relaxed)
            .not()
            .then(|| &self.inner)
    }

    /// Release the claim on the slot
    pub(crate) fn release(&self) {
        if !self.is_claimed.fetch_and(false, Ordering::Relaxed) {
            log::error!("Tried to release unclaimed Slot<{:?}>", type_name::<T>());
        }
    }

    pub(crate) fn is_claimed(&self) -> bool {
        self.is_claimed.load(Ordering::Relaxed)
    }
}

/// The number of sockets the modem can keep open at once.
pub const MAX_SOCKETS: usize = 6;

/// Modem-assigned socket id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SocketId(pub(crate) u8);

impl SocketId {
    pub fn ordinal(&self) -> usize {
        usize::from(self.0)
    }
}

/// Pool of the modem's socket ids.
pub(crate) struct SocketPool {
    slots: [Slot<u8>; MAX_SOCKETS],
}

impl SocketPool {
    pub const fn new() -> Self {
        SocketPool {
            slots: [
                Slot::new(0),
                Slot::new(1),
                Slot::new(2),
                Slot::new(3),
                Slot::new(4),
                Slot::new(5),
            ],
        }
    }

    /// Claim the lowest free socket id.
    pub fn claim(&self) -> Option<SocketId> {
        self.slots
            .iter()
            .find_map(|slot| slot.claim().map(|&id| SocketId(id)))
    }

    pub fn release(&self, id: SocketId) {
        if let Some(slot) = self.slots.get(id.ordinal()) {
            slot.release();
        }
    }

    pub fn is_claimed(&self, id: SocketId) -> bool {
        self.slots
            .get(id.ordinal())
            .map_or(false, |slot| slot.is_claimed())
    }

    pub fn any_claimed(&self) -> bool {
        self.slots.iter().any(|slot| slot.is_claimed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot() {
        let slot = Slot::new(());

        for _ in 0..3 {
            assert!(!slot.is_claimed());
            assert!(slot.claim().is_some());
            assert!(slot.is_claimed());
            assert!(slot.claim().is_none());
            assert!(slot.is_claimed());
            slot.release();
        }
    }

    #[test]
    fn pool_hands_out_every_id_once() {
        let pool = SocketPool::new();
        for expected in 0..MAX_SOCKETS as u8 {
            assert_eq!(pool.claim(), Some(SocketId(expected)));
        }
        assert_eq!(pool.claim(), None);

        pool.release(SocketId(3));
        assert!(!pool.is_claimed(SocketId(3)));
        assert!(pool.any_claimed());
        assert_eq!(pool.claim(), Some(SocketId(3)));
    }
}
