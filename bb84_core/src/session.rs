//! BB84 key agreement: basis choice, simulated transmission and sifting.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::bits::{Bit, SharedKey};
use crate::config::SessionConfig;
use crate::error::QkdError;
use crate::participant::Participant;
use crate::rng::RandomSource;

/// Outcome report of one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub requested_bits: usize,
    pub key_length: usize,
    pub error_rate: f64,
}

/// A completed key agreement between a sender and a receiver.
///
/// Values of this type only exist for runs that finished: any draw failure
/// aborts [`KeyAgreementSession::run`] and nothing is returned.
#[derive(Clone, Debug)]
pub struct KeyAgreementSession {
    requested_bits: usize,
    alice: Participant,
    bob: Participant,
    transmission_outcomes: Vec<Bit>,
    shared_key: SharedKey,
}

impl KeyAgreementSession {
    /// Runs the protocol for `requested_bits` positions with the default
    /// participant names.
    pub fn run<S: RandomSource>(requested_bits: usize, source: &mut S) -> Result<Self, QkdError> {
        Self::run_with_config(&SessionConfig::new(requested_bits), source)
    }

    pub fn run_with_config<S: RandomSource>(
        config: &SessionConfig,
        source: &mut S,
    ) -> Result<Self, QkdError> {
        let n = config.requested_bits;
        let alice = Participant::sender(config.sender_name.as_str(), n, source)?;
        let bob = Participant::receiver(config.receiver_name.as_str(), n, source)?;
        let transmission_outcomes = simulate_transmission(&alice, &bob, source)?;
        let shared_key = sift(&alice, &bob);
        debug!(
            "key agreement: requested={} matched={} ({}/{})",
            n,
            shared_key.len(),
            alice.name(),
            bob.name()
        );
        Ok(Self {
            requested_bits: n,
            alice,
            bob,
            transmission_outcomes,
            shared_key,
        })
    }

    pub fn requested_bits(&self) -> usize {
        self.requested_bits
    }

    pub fn alice(&self) -> &Participant {
        &self.alice
    }

    pub fn bob(&self) -> &Participant {
        &self.bob
    }

    pub fn transmission_outcomes(&self) -> &[Bit] {
        &self.transmission_outcomes
    }

    pub fn shared_key(&self) -> &SharedKey {
        &self.shared_key
    }

    /// Indices where both parties picked the same basis.
    pub fn matching_indices(&self) -> impl Iterator<Item = usize> + '_ {
        matching_indices(&self.alice, &self.bob)
    }

    /// Share of sifted positions where the receiver's outcome disagrees
    /// with the sender's bit. Zero when nothing matched.
    pub fn error_rate(&self) -> f64 {
        let mut total = 0usize;
        let mut errors = 0usize;
        for i in self.matching_indices() {
            total += 1;
            if self.alice.bits()[i] != self.transmission_outcomes[i] {
                errors += 1;
            }
        }
        if total == 0 {
            return 0.0;
        }
        errors as f64 / total as f64
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            requested_bits: self.requested_bits,
            key_length: self.shared_key.len(),
            error_rate: self.error_rate(),
        }
    }
}

fn matching_indices<'a>(
    alice: &'a Participant,
    bob: &'a Participant,
) -> impl Iterator<Item = usize> + 'a {
    alice
        .bases()
        .iter()
        .zip(bob.bases())
        .enumerate()
        .filter(|(_, (a, b))| a == b)
        .map(|(i, _)| i)
}

/// Matching bases reproduce the sender's bit; a mismatch yields a fresh
/// uniform bit.
fn simulate_transmission<S: RandomSource>(
    alice: &Participant,
    bob: &Participant,
    source: &mut S,
) -> Result<Vec<Bit>, QkdError> {
    let sent = alice.bits().iter().zip(alice.bases());
    let mut outcomes = Vec::with_capacity(alice.bits().len());
    for ((&bit, sent_basis), measured_basis) in sent.zip(bob.bases()) {
        let outcome = if sent_basis == measured_basis {
            bit
        } else {
            source.next_bit()?
        };
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// The key is read from the sender's bits, not from the outcomes.
fn sift(alice: &Participant, bob: &Participant) -> SharedKey {
    matching_indices(alice, bob)
        .map(|i| alice.bits()[i])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{secure_source, seeded_source};
    use proptest::prelude::*;

    /// Serves `budget` draws from a seeded stream, then fails.
    struct Rationed<S> {
        inner: S,
        budget: usize,
    }

    impl<S: RandomSource> RandomSource for Rationed<S> {
        fn next_bit(&mut self) -> Result<Bit, QkdError> {
            if self.budget == 0 {
                return Err(QkdError::EntropyUnavailable("rationed".into()));
            }
            self.budget -= 1;
            self.inner.next_bit()
        }
    }

    fn rationed(budget: usize) -> Rationed<impl RandomSource> {
        Rationed {
            inner: seeded_source(b"rationed", 0, b"bits"),
            budget,
        }
    }

    #[test]
    fn zero_bits_gives_empty_key() {
        let session = KeyAgreementSession::run(0, &mut secure_source()).unwrap();
        assert!(session.shared_key().is_empty());
        assert_eq!(session.error_rate(), 0.0);
        assert!(session.transmission_outcomes().is_empty());
    }

    #[test]
    fn key_is_alice_bits_at_matching_bases() {
        let session = KeyAgreementSession::run(512, &mut seeded_source(b"sift", 0, b"")).unwrap();
        let expected: Vec<Bit> = (0..512)
            .filter(|&i| session.alice().bases()[i] == session.bob().bases()[i])
            .map(|i| session.alice().bits()[i])
            .collect();
        assert_eq!(session.shared_key().bits(), expected.as_slice());
        assert_eq!(session.matching_indices().count(), expected.len());
    }

    #[test]
    fn matching_positions_transmit_faithfully() {
        let session = KeyAgreementSession::run(1024, &mut secure_source()).unwrap();
        assert_eq!(session.transmission_outcomes().len(), 1024);
        for i in session.matching_indices() {
            assert_eq!(session.transmission_outcomes()[i], session.alice().bits()[i]);
        }
        assert_eq!(session.error_rate(), 0.0);
    }

    #[test]
    fn large_run_sifts_about_half() {
        let session = KeyAgreementSession::run(10_000, &mut secure_source()).unwrap();
        let len = session.shared_key().len();
        assert!((4500..=5500).contains(&len), "sifted length {len}");
    }

    #[test]
    fn summary_reports_run() {
        let session = KeyAgreementSession::run(256, &mut secure_source()).unwrap();
        let summary = session.summary();
        assert_eq!(summary.requested_bits, 256);
        assert_eq!(summary.key_length, session.shared_key().len());
        assert_eq!(summary.error_rate, 0.0);
    }

    #[test]
    fn custom_names_are_kept() {
        let config = SessionConfig::new(8).with_names("Carol", "Dave");
        let session = KeyAgreementSession::run_with_config(&config, &mut secure_source()).unwrap();
        assert_eq!(session.alice().name(), "Carol");
        assert_eq!(session.bob().name(), "Dave");
    }

    #[test]
    fn entropy_failure_during_generation_aborts() {
        // Alice's bits and bases take 2N draws, Bob's bases N more.
        for budget in [0, 10, 31, 32, 47] {
            let err = KeyAgreementSession::run(16, &mut rationed(budget)).unwrap_err();
            assert!(matches!(err, QkdError::EntropyUnavailable(_)));
        }
    }

    #[test]
    fn entropy_failure_during_transmission_aborts() {
        let n = 64;
        let mut probe = seeded_source(b"rationed", 0, b"bits");
        let session = KeyAgreementSession::run(n, &mut probe).unwrap();
        let mismatches = n - session.matching_indices().count();
        assert!(mismatches > 0);
        let err = KeyAgreementSession::run(n, &mut rationed(3 * n + mismatches - 1)).unwrap_err();
        assert!(matches!(err, QkdError::EntropyUnavailable(_)));
        assert!(KeyAgreementSession::run(n, &mut rationed(3 * n + mismatches)).is_ok());
    }

    proptest! {
        #[test]
        fn sifted_key_never_exceeds_request(n in 0usize..600) {
            let session = KeyAgreementSession::run(n, &mut secure_source()).unwrap();
            prop_assert!(session.shared_key().len() <= n);
            prop_assert_eq!(session.alice().bits().len(), n);
            prop_assert_eq!(session.bob().bases().len(), n);
        }
    }
}
