//! Availability of tiles, contents and child subtrees
//!
//! Availability is either a constant for every node or a packed bitstream,
//! least significant bit first.

use crate::error::{Tiles3dError, Tiles3dResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvailabilityInfo {
    /// Every node is available, or none is
    Constant { available: bool, length: u64 },
    /// Bit `i` of the stream tells whether node `i` is available
    Bitstream { bits: Vec<u8>, length: u64 },
}

impl AvailabilityInfo {
    pub fn constant(available: bool, length: u64) -> Self {
        Self::Constant { available, length }
    }

    /// Wrap a bitstream, which must be exactly `ceil(length / 8)` bytes
    pub fn bitstream(bits: Vec<u8>, length: u64, path: &str) -> Tiles3dResult<Self> {
        let expected = length.div_ceil(8);
        if bits.len() as u64 != expected {
            return Err(Tiles3dError::structural(
                path,
                format!(
                    "availability bitstream has {} bytes, expected {} for {} bits",
                    bits.len(),
                    expected,
                    length
                ),
            ));
        }
        Ok(Self::Bitstream { bits, length })
    }

    /// Number of nodes described
    pub fn len(&self) -> u64 {
        match self {
            Self::Constant { length, .. } | Self::Bitstream { length, .. } => *length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether node `index` is available; indices past the end are not
    pub fn is_available(&self, index: u64) -> bool {
        if index >= self.len() {
            log::warn!("Availability index {} out of range (length {})", index, self.len());
            return false;
        }
        match self {
            Self::Constant { available, .. } => *available,
            Self::Bitstream { bits, .. } => {
                let byte = bits[(index / 8) as usize];
                (byte >> (index % 8)) & 1 == 1
            }
        }
    }

    /// Number of available nodes
    pub fn available_count(&self) -> u64 {
        match self {
            Self::Constant { available: true, length } => *length,
            Self::Constant { available: false, .. } => 0,
            Self::Bitstream { bits, length } => {
                let full_bytes = (length / 8) as usize;
                let mut count: u64 = bits[..full_bytes]
                    .iter()
                    .map(|b| u64::from(b.count_ones()))
                    .sum();
                let remaining_bits = length % 8;
                if remaining_bits > 0 {
                    let mask = (1u16 << remaining_bits) - 1;
                    count += u64::from((u16::from(bits[full_bytes]) & mask).count_ones());
                }
                count
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant() {
        let all = AvailabilityInfo::constant(true, 5);
        assert!(all.is_available(0));
        assert!(all.is_available(4));
        assert!(!all.is_available(5));
        assert_eq!(all.available_count(), 5);
        assert_eq!(AvailabilityInfo::constant(false, 5).available_count(), 0);
    }

    #[test]
    fn test_bitstream_lsb_first() {
        // child subtree index 2 of 4
        let info = AvailabilityInfo::bitstream(vec![0b0000_0100], 4, "/root").unwrap();
        let available: Vec<bool> = (0..4).map(|i| info.is_available(i)).collect();
        assert_eq!(available, vec![false, false, true, false]);
        assert_eq!(info.available_count(), 1);
    }

    #[test]
    fn test_bitstream_ignores_padding_bits_in_count() {
        let info = AvailabilityInfo::bitstream(vec![0xFF, 0xFF, 0xFF], 21, "/root").unwrap();
        assert_eq!(info.available_count(), 21);
        assert!(info.is_available(20));
        assert!(!info.is_available(21));
    }

    #[test]
    fn test_bitstream_length_mismatch() {
        let err = AvailabilityInfo::bitstream(vec![0, 0], 5, "/root/[implicit]").unwrap_err();
        assert_eq!(err.path(), Some("/root/[implicit]"));
        assert!(AvailabilityInfo::bitstream(vec![], 1, "/root").is_err());
    }
}
