//! S2 cell identifiers
//!
//! A cell id packs a 3-bit cube face, `2 * level` bits of Hilbert position on
//! that face and a trailing sentinel bit, left-aligned in 64 bits. Tokens are
//! the hexadecimal id with trailing zero nibbles removed.

use std::fmt;
use std::str::FromStr;

use crate::error::{Tiles3dError, Tiles3dResult};

/// Bits available for the position and the sentinel below the face bits
pub const POSITION_BITS: u32 = 61;

/// Deepest S2 level
pub const MAX_LEVEL: u32 = 30;

/// 64-bit S2 cell identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct S2CellId(u64);

impl S2CellId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn id(self) -> u64 {
        self.0
    }

    /// Parse a hexadecimal token, re-padding the stripped trailing zeros
    pub fn from_token(token: &str) -> Tiles3dResult<Self> {
        if token == "X" {
            return Ok(Self(0));
        }
        if token.is_empty() || token.len() > 16 {
            return Err(Tiles3dError::invalid_input(format!(
                "invalid S2 token '{}'",
                token
            )));
        }
        let padded = format!("{:0<16}", token);
        u64::from_str_radix(&padded, 16)
            .map(Self)
            .map_err(|e| {
                Tiles3dError::invalid_input(format!("invalid S2 token '{}': {}", token, e))
            })
    }

    /// Hexadecimal token with trailing zero nibbles stripped
    pub fn to_token(self) -> String {
        if self.0 == 0 {
            return "X".to_string();
        }
        let hex = format!("{:016x}", self.0);
        hex.trim_end_matches('0').to_string()
    }

    /// Cell on `face` at `level` whose Hilbert position on the face is `position`
    pub fn from_face_position_level(face: u8, position: u64, level: u32) -> Tiles3dResult<Self> {
        if face > 5 {
            return Err(Tiles3dError::invalid_input(format!("invalid S2 face {}", face)));
        }
        if level > MAX_LEVEL {
            return Err(Tiles3dError::invalid_input(format!("invalid S2 level {}", level)));
        }
        if position >= 1u64 << (2 * level) {
            return Err(Tiles3dError::invalid_input(format!(
                "S2 position {} out of range for level {}",
                position, level
            )));
        }
        let shift = POSITION_BITS - 2 * level;
        let id = (u64::from(face) << POSITION_BITS) | (position << shift) | (1u64 << (shift - 1));
        Ok(Self(id))
    }

    /// Cube face, the top three bits
    pub fn face(self) -> u8 {
        (self.0 >> POSITION_BITS) as u8
    }

    /// Subdivision level, derived from the position of the sentinel bit
    pub fn level(self) -> u32 {
        MAX_LEVEL - (self.0.trailing_zeros() / 2).min(MAX_LEVEL)
    }

    /// Hilbert position on the face at this cell's level
    pub fn position(self) -> u64 {
        let level = self.level();
        let shift = POSITION_BITS - 2 * level;
        (self.0 >> shift) & ((1u64 << (2 * level)) - 1)
    }

    pub fn is_valid(self) -> bool {
        self.0 != 0 && self.face() <= 5 && self.0.trailing_zeros() % 2 == 0
    }
}

impl fmt::Display for S2CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_token())
    }
}

impl FromStr for S2CellId {
    type Err = Tiles3dError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(s)
    }
}
