//! Double-buffered presentation surface
//!
//! The consumer only ever sees complete images: decode results are rendered
//! into the back slot and made visible by swapping the two slot references.
//! Commits are serialized by the slot lock, so a swap is never observed
//! half-done.

use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct Slots<I> {
    front: Option<Arc<I>>,
    back: Option<Arc<I>>,
    swaps: u64,
}

/// Two-slot presentation surface holding opaque decoded images.
#[derive(Debug)]
pub struct DoubleBuffer<I> {
    slots: Mutex<Slots<I>>,
}

impl<I> DoubleBuffer<I> {
    /// Create an empty surface.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                front: None,
                back: None,
                swaps: 0,
            }),
        }
    }

    /// Render an image into the back slot, then swap it to the front.
    pub fn commit(&self, image: I) {
        let mut slots = self.slots.lock().unwrap();
        let slots = &mut *slots;
        slots.back = Some(Arc::new(image));
        std::mem::swap(&mut slots.front, &mut slots.back);
        slots.swaps += 1;
    }

    /// The currently visible image, if any.
    ///
    /// Consumers holding the returned handle keep seeing the same complete
    /// image even while later commits swap the slots underneath.
    pub fn front(&self) -> Option<Arc<I>> {
        self.slots.lock().unwrap().front.clone()
    }

    /// Number of commits so far.
    pub fn swap_count(&self) -> u64 {
        self.slots.lock().unwrap().swaps
    }

    /// Drop both slots, e.g. when reverting to a fallback presentation.
    pub fn clear(&self) {
        let mut slots = self.slots.lock().unwrap();
        slots.front = None;
        slots.back = None;
    }
}

impl<I> Default for DoubleBuffer<I> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_swaps_to_front() {
        let surface = DoubleBuffer::new();
        assert!(surface.front().is_none());

        surface.commit(1u32);
        assert_eq!(*surface.front().unwrap(), 1);

        surface.commit(2u32);
        assert_eq!(*surface.front().unwrap(), 2);
        assert_eq!(surface.swap_count(), 2);
    }

    #[test]
    fn test_held_handle_survives_swap() {
        let surface = DoubleBuffer::new();
        surface.commit(1u32);

        let held = surface.front().unwrap();
        surface.commit(2u32);
        surface.commit(3u32);

        // The old handle still points at the image it was taken from
        assert_eq!(*held, 1);
        assert_eq!(*surface.front().unwrap(), 3);
    }

    #[test]
    fn test_clear() {
        let surface = DoubleBuffer::new();
        surface.commit(7u32);
        surface.clear();
        assert!(surface.front().is_none());
    }
}
