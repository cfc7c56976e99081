//! Ring buffer properties: counting, Full/Empty sentinels, FIFO order, wraparound.
use super::*;

#[test]
/// After k <= N inserts the count is k and the remaining slots shrink accordingly.
fn test_count_tracks_inserts() {
    let mut ring = FrameRing::<u32>::try_new(4).expect("ring must allocate");
    for k in 1..=4usize {
        let remaining = ring.insert(k as u32).expect("room left");
        assert_eq!(ring.len(), k);
        assert_eq!(remaining, 4 - k);
    }
    assert!(ring.is_full());
}

#[test]
/// The (N+1)th insert is refused and leaves the contents untouched.
fn test_full_leaves_contents_unchanged() {
    let mut ring = FrameRing::<u8>::try_new(3).expect("ring must allocate");
    for value in [10, 20, 30] {
        ring.insert(value).expect("room left");
    }
    assert_eq!(ring.insert(40), Err(RingError::Full));
    assert_eq!(ring.len(), 3);

    assert_eq!(ring.extract(), Ok((10, 2)));
    assert_eq!(ring.extract(), Ok((20, 1)));
    assert_eq!(ring.extract(), Ok((30, 0)));
}

#[test]
/// Extract on an empty ring is refused without side effects.
fn test_empty_extract() {
    let mut ring = FrameRing::<u8>::try_new(2).expect("ring must allocate");
    assert_eq!(ring.extract(), Err(RingError::Empty));
    assert_eq!(ring.len(), 0);
    assert!(ring.peek().is_none());

    ring.insert(7).expect("room left");
    assert_eq!(ring.extract(), Ok((7, 0)));
    assert_eq!(ring.extract(), Err(RingError::Empty));
}

#[test]
/// FIFO order is preserved across many wraparounds of the cursors.
fn test_fifo_across_wraparound() {
    let mut ring = FrameRing::<u16>::try_new(5).expect("ring must allocate");
    let mut next_in = 0u16;
    let mut next_out = 0u16;

    for round in 0..40 {
        // Alternate between filling and draining a few entries.
        let pushes = 1 + round % 4;
        for _ in 0..pushes {
            if ring.insert(next_in).is_ok() {
                next_in += 1;
            }
        }
        let pops = 1 + (round + 2) % 3;
        for _ in 0..pops {
            if let Ok((value, _)) = ring.extract() {
                assert_eq!(value, next_out);
                next_out += 1;
            }
        }
    }
    while let Ok((value, _)) = ring.extract() {
        assert_eq!(value, next_out);
        next_out += 1;
    }
    assert_eq!(next_in, next_out);
}

#[test]
fn test_zero_capacity_is_allocation_failure() {
    assert!(matches!(
        FrameRing::<u8>::try_new(0),
        Err(ShimError::AllocationFailure)
    ));
}

#[test]
fn test_clear_resets_cursors() {
    let mut ring = FrameRing::<u8>::try_new(2).expect("ring must allocate");
    ring.insert(1).expect("room left");
    ring.insert(2).expect("room left");
    ring.clear();
    assert!(ring.is_empty());
    assert_eq!(ring.insert(3), Ok(1));
    assert_eq!(ring.peek(), Some(&3));
}

#[test]
/// Iteration walks the queued items oldest first across the wrap point.
fn test_iter_follows_fifo_order() {
    let mut ring = FrameRing::<u8>::try_new(3).expect("ring must allocate");
    for value in [1, 2, 3] {
        ring.insert(value).expect("room left");
    }
    ring.extract().expect("not empty");
    ring.insert(4).expect("room left");

    assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
    ring.clear();
    assert_eq!(ring.iter().count(), 0);
}
