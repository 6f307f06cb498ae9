//! Bit, basis and sifted-key value types.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::QkdError;

/// Serialized as the integer `0` or `1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Bit {
    Zero,
    One,
}

impl Bit {
    fn as_u8(self) -> u8 {
        match self {
            Bit::Zero => 0,
            Bit::One => 1,
        }
    }

    fn as_char(self) -> char {
        match self {
            Bit::Zero => '0',
            Bit::One => '1',
        }
    }
}

impl From<Bit> for u8 {
    fn from(bit: Bit) -> Self {
        bit.as_u8()
    }
}

impl TryFrom<u8> for Bit {
    type Error = QkdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Bit::Zero),
            1 => Ok(Bit::One),
            other => Err(QkdError::InvalidBitValue(other)),
        }
    }
}

impl From<bool> for Bit {
    fn from(value: bool) -> Self {
        if value { Bit::One } else { Bit::Zero }
    }
}

/// Measurement basis. `Rectilinear` is the computational (Z) basis,
/// `Diagonal` the Hadamard (X) basis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Basis {
    Rectilinear,
    Diagonal,
}

impl Basis {
    pub fn from_bit(bit: Bit) -> Self {
        match bit {
            Bit::Zero => Basis::Rectilinear,
            Bit::One => Basis::Diagonal,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Basis::Rectilinear => '+',
            Basis::Diagonal => 'x',
        }
    }
}

/// Sifted key shared between a session and the channel built from it.
///
/// Cloning is cheap: the bits live behind an `Arc` and are never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SharedKey {
    bits: Arc<[Bit]>,
}

impl SharedKey {
    pub fn new(bits: Vec<Bit>) -> Self {
        Self { bits: bits.into() }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn bits(&self) -> &[Bit] {
        &self.bits
    }

    /// Packed key bytes, see [`pack_bits`].
    pub fn to_bytes(&self) -> Vec<u8> {
        pack_bits(&self.bits)
    }

    /// Parses a string of `0`/`1` characters.
    pub fn from_bit_str(text: &str) -> Result<Self, QkdError> {
        text.chars()
            .enumerate()
            .map(|(position, found)| match found {
                '0' => Ok(Bit::Zero),
                '1' => Ok(Bit::One),
                _ => Err(QkdError::InvalidKeyEncoding { position, found }),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }
}

impl From<Vec<Bit>> for SharedKey {
    fn from(bits: Vec<Bit>) -> Self {
        Self::new(bits)
    }
}

impl FromIterator<Bit> for SharedKey {
    fn from_iter<I: IntoIterator<Item = Bit>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl FromStr for SharedKey {
    type Err = QkdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bit_str(s)
    }
}

impl fmt::Display for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.bits.iter() {
            write!(f, "{}", bit.as_char())?;
        }
        Ok(())
    }
}

/// Packs bits MSB-first, eight per byte. The last byte is padded with zero
/// bits when the length is not a multiple of eight.
pub fn pack_bits(bits: &[Bit]) -> Vec<u8> {
    let mut bytes = vec![0u8; bits.len().div_ceil(8)];
    for (i, bit) in bits.iter().enumerate() {
        if *bit == Bit::One {
            bytes[i / 8] |= 0x80 >> (i % 8);
        }
    }
    bytes
}
