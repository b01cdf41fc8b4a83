//! Morton (Z-order) indices
//!
//! Implicit tiling orders the nodes of one level by interleaving the bits of
//! their coordinates, x in the lowest position.

/// Spread the bits of `v` so that bit `i` moves to bit `i * stride`
fn spread(v: u64, stride: u32) -> u64 {
    let mut out = 0u64;
    for bit in 0..64 {
        if bit * stride >= 64 {
            break;
        }
        out |= ((v >> bit) & 1) << (bit * stride);
    }
    out
}

/// Inverse of [`spread`]
fn compact(v: u64, stride: u32) -> u64 {
    let mut out = 0u64;
    for bit in 0..64 {
        if bit * stride >= 64 {
            break;
        }
        out |= ((v >> (bit * stride)) & 1) << bit;
    }
    out
}

pub fn encode_2d(x: u64, y: u64) -> u64 {
    spread(x, 2) | (spread(y, 2) << 1)
}

pub fn decode_2d(index: u64) -> (u64, u64) {
    (compact(index, 2), compact(index >> 1, 2))
}

pub fn encode_3d(x: u64, y: u64, z: u64) -> u64 {
    spread(x, 3) | (spread(y, 3) << 1) | (spread(z, 3) << 2)
}

pub fn decode_3d(index: u64) -> (u64, u64, u64) {
    (
        compact(index, 3),
        compact(index >> 1, 3),
        compact(index >> 2, 3),
    )
}
