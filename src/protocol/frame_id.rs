//! Modular arithmetic over the 11-bit frame-id space.

use super::{FRAME_ID_MAX, FRAME_ID_SPACE};

/// Largest distance at which two ids are still ordered unambiguously.
///
/// Send windows must not exceed this, otherwise an acknowledgement could refer
/// either to the past or to the future.
pub const INFLIGHT_MAX: u16 = FRAME_ID_SPACE / 2 - 1;

/// Signed distance `a - b`, wrapped into `[-1024, 1024]`.
///
/// A raw difference above `INFLIGHT_MAX` is taken as negative and one below
/// `-INFLIGHT_MAX` as positive, so `subtract(1024, 0) == -1024` and
/// `subtract(0, 1024) == 1024`. That keeps `subtract(a, b) == -subtract(b, a)`
/// for every pair.
#[must_use]
pub fn subtract(a: u16, b: u16) -> i32 {
    let space = i32::from(FRAME_ID_SPACE);
    let half = i32::from(INFLIGHT_MAX);
    let d = i32::from(a & FRAME_ID_MAX) - i32::from(b & FRAME_ID_MAX);
    if d > half {
        d - space
    } else if d < -half {
        d + space
    } else {
        d
    }
}

/// `id + n` wrapped into the frame-id space.
#[must_use]
pub const fn add(id: u16, n: u16) -> u16 {
    id.wrapping_add(n) & FRAME_ID_MAX
}

/// Successor of `id`.
#[must_use]
pub const fn next(id: u16) -> u16 {
    add(id, 1)
}

/// Predecessor of `id`.
#[must_use]
pub const fn prev(id: u16) -> u16 {
    id.wrapping_sub(1) & FRAME_ID_MAX
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn subtract_points() {
        assert_eq!(subtract(0, 0), 0);
        assert_eq!(subtract(1, 0), 1);
        assert_eq!(subtract(0, 1), -1);
        assert_eq!(subtract(0, FRAME_ID_MAX), 1);
        assert_eq!(subtract(FRAME_ID_MAX, 0), -1);
        assert_eq!(subtract(5, 2040), 13);
        assert_eq!(subtract(2040, 5), -13);
        assert_eq!(subtract(1023, 0), 1023);
        assert_eq!(subtract(0, 1023), -1023);
    }

    #[test]
    fn subtract_midpoint() {
        assert_eq!(subtract(1024, 0), -1024);
        assert_eq!(subtract(0, 1024), 1024);
        assert_eq!(subtract(1500, 476), -1024);
        assert_eq!(subtract(476, 1500), 1024);
    }

    #[test]
    fn add_wraps() {
        assert_eq!(next(FRAME_ID_MAX), 0);
        assert_eq!(prev(0), FRAME_ID_MAX);
        assert_eq!(add(2000, 100), 52);
    }

    proptest! {
        #[test]
        fn prop_subtract_antisymmetric(a in 0u16..=FRAME_ID_MAX, b in 0u16..=FRAME_ID_MAX) {
            prop_assert_eq!(subtract(a, b), -subtract(b, a));
        }

        #[test]
        fn prop_subtract_inverts_add(a in 0u16..=FRAME_ID_MAX, n in 0u16..=INFLIGHT_MAX) {
            prop_assert_eq!(subtract(add(a, n), a), i32::from(n));
            prop_assert_eq!(subtract(a, add(a, n)), -i32::from(n));
        }

        #[test]
        fn prop_subtract_self_is_zero(a in 0u16..=FRAME_ID_MAX) {
            prop_assert_eq!(subtract(a, a), 0);
        }
    }
}
