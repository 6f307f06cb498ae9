use log::debug;

use crate::bits::{Basis, Bit};
use crate::error::QkdError;
use crate::rng::RandomSource;

/// One party of a key agreement.
///
/// The sending party owns both a bit and a basis sequence of the requested
/// length. The receiving party only chooses bases; its measurement outcomes
/// belong to the session. Both constructors either generate everything or
/// fail, so a half-generated participant never exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Participant {
    name: String,
    bits: Vec<Bit>,
    bases: Vec<Basis>,
}

impl Participant {
    /// Draws `n` bits, then `n` bases.
    pub fn sender<S: RandomSource>(
        name: impl Into<String>,
        n: usize,
        source: &mut S,
    ) -> Result<Self, QkdError> {
        let name = name.into();
        let bits = draw(n, || source.next_bit())?;
        let bases = draw(n, || source.next_basis())?;
        debug!("{name} prepared {n} bits");
        Ok(Self { name, bits, bases })
    }

    /// Draws `n` bases and no bits.
    pub fn receiver<S: RandomSource>(
        name: impl Into<String>,
        n: usize,
        source: &mut S,
    ) -> Result<Self, QkdError> {
        let name = name.into();
        let bases = draw(n, || source.next_basis())?;
        debug!("{name} chose {n} measurement bases");
        Ok(Self {
            name,
            bits: Vec::new(),
            bases,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bits(&self) -> &[Bit] {
        &self.bits
    }

    pub fn bases(&self) -> &[Basis] {
        &self.bases
    }

    /// Renders the basis choices as `+`/`x` symbols.
    pub fn basis_string(&self) -> String {
        self.bases.iter().map(|basis| basis.symbol()).collect()
    }
}

fn draw<T>(n: usize, mut next: impl FnMut() -> Result<T, QkdError>) -> Result<Vec<T>, QkdError> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(next()?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seeded_source;

    #[test]
    fn sender_generates_bits_and_bases() {
        let mut source = seeded_source(b"participant", 0, b"alice");
        let alice = Participant::sender("Alice", 64, &mut source).unwrap();
        assert_eq!(alice.name(), "Alice");
        assert_eq!(alice.bits().len(), 64);
        assert_eq!(alice.bases().len(), 64);
        assert_eq!(alice.basis_string().len(), 64);
    }

    #[test]
    fn receiver_has_no_bits() {
        let mut source = seeded_source(b"participant", 0, b"bob");
        let bob = Participant::receiver("Bob", 32, &mut source).unwrap();
        assert!(bob.bits().is_empty());
        assert_eq!(bob.bases().len(), 32);
    }

    #[test]
    fn zero_length_is_fine() {
        let mut source = seeded_source(b"participant", 0, b"empty");
        let alice = Participant::sender("Alice", 0, &mut source).unwrap();
        assert!(alice.bits().is_empty());
        assert!(alice.bases().is_empty());
    }
}
