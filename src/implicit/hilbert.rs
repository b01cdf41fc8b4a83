//! Hilbert curve indices
//!
//! Used to place descendants of an S2 cell, whose positions along a face
//! follow the Hilbert curve. Generic tile addressing uses Morton order.

use crate::error::{Tiles3dError, Tiles3dResult};

/// Deepest level whose `4^level` positions fit in a `u64`
pub const MAX_LEVEL: u32 = 31;

/// Rotate/flip a quadrant appropriately
fn rotate(n: u64, x: &mut u64, y: &mut u64, rx: u64, ry: u64) {
    if ry == 0 {
        if rx == 1 {
            *x = n - 1 - *x;
            *y = n - 1 - *y;
        }
        std::mem::swap(x, y);
    }
}

fn check_level(level: u32) -> Tiles3dResult<u64> {
    if level < 1 {
        return Err(Tiles3dError::invalid_input("Hilbert level cannot be less than 1"));
    }
    if level > MAX_LEVEL {
        return Err(Tiles3dError::invalid_input(format!(
            "Hilbert level cannot be greater than {}",
            MAX_LEVEL
        )));
    }
    Ok(1u64 << level)
}

/// Position of `(x, y)` along the Hilbert curve of a `2^level` grid
pub fn encode_2d(level: u32, x: u64, y: u64) -> Tiles3dResult<u64> {
    let n = check_level(level)?;
    if x >= n || y >= n {
        return Err(Tiles3dError::invalid_input(format!(
            "coordinates ({}, {}) out of range for level {}",
            x, y, level
        )));
    }
    let (mut x, mut y) = (x, y);
    let mut index = 0u64;
    let mut s = n / 2;
    while s > 0 {
        let rx = u64::from(x & s > 0);
        let ry = u64::from(y & s > 0);
        index += s * s * ((3 * rx) ^ ry);
        rotate(n, &mut x, &mut y, rx, ry);
        s /= 2;
    }
    Ok(index)
}

/// Coordinates of the `index`-th cell along the Hilbert curve of a `2^level` grid
pub fn decode_2d(level: u32, index: u64) -> Tiles3dResult<(u64, u64)> {
    let n = check_level(level)?;
    if index >= n * n {
        return Err(Tiles3dError::invalid_input(format!(
            "index {} out of range for level {}",
            index, level
        )));
    }
    let mut t = index;
    let (mut x, mut y) = (0u64, 0u64);
    let mut s = 1u64;
    while s < n {
        let rx = 1 & (t / 2);
        let ry = 1 & (t ^ rx);
        rotate(s, &mut x, &mut y, rx, ry);
        x += s * rx;
        y += s * ry;
        t /= 4;
        s *= 2;
    }
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_one_curve() {
        // the U shape: (0,0) -> (0,1) -> (1,1) -> (1,0)
        assert_eq!(encode_2d(1, 0, 0).unwrap(), 0);
        assert_eq!(encode_2d(1, 0, 1).unwrap(), 1);
        assert_eq!(encode_2d(1, 1, 1).unwrap(), 2);
        assert_eq!(encode_2d(1, 1, 0).unwrap(), 3);
    }

    #[test]
    fn test_round_trip_level_three() {
        let n = 8;
        let mut seen = vec![false; 64];
        for x in 0..n {
            for y in 0..n {
                let index = encode_2d(3, x, y).unwrap();
                assert!(!seen[index as usize]);
                seen[index as usize] = true;
                assert_eq!(decode_2d(3, index).unwrap(), (x, y));
            }
        }
    }

    #[test]
    fn test_consecutive_indices_are_adjacent() {
        for index in 0..255u64 {
            let (x0, y0) = decode_2d(4, index).unwrap();
            let (x1, y1) = decode_2d(4, index + 1).unwrap();
            let distance = x0.abs_diff(x1) + y0.abs_diff(y1);
            assert_eq!(distance, 1, "index {}", index);
        }
    }

    #[test]
    fn test_invalid_input() {
        assert!(encode_2d(0, 0, 0).is_err());
        assert!(decode_2d(0, 0).is_err());
        assert!(encode_2d(2, 4, 0).is_err());
        assert!(decode_2d(2, 16).is_err());
        assert!(encode_2d(30, (1 << 30) - 1, 0).is_ok());
    }
}
