//! BB84-style key agreement simulator and the keyed message channel it
//! feeds.
//!
//! The "quantum" part is limited to discarding positions where the two
//! parties' simulated measurement bases disagree, and the channel is a
//! repeating-key XOR. Both are for demonstration and must **not** be used
//! to protect real data.

pub mod bits;
pub mod channel;
pub mod config;
pub mod error;
pub mod keyfile;
pub mod participant;
pub mod registry;
pub mod rng;
pub mod session;
pub mod versioning;

pub use crate::bits::{Basis, Bit, SharedKey, pack_bits};
pub use crate::channel::{
    KeyedChannel, Message, apply_keystream, decrypt_with_key, encrypt_with_key,
};
pub use crate::config::{KeySize, SessionConfig, session_preset};
pub use crate::error::QkdError;
pub use crate::keyfile::{decode_key, encode_key, load_key, save_key};
pub use crate::participant::Participant;
pub use crate::registry::SessionRegistry;
pub use crate::rng::{
    EntropySource, RandomSource, SecureSource, derive_session_rng, secure_source, seeded_source,
};
pub use crate::session::{KeyAgreementSession, SessionSummary};
