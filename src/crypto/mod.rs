// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Journal Vault

//! # Envelope Encryption Module
//!
//! Entry content and tag lists are stored only as AES-256-GCM envelopes.
//! Keys are derived per user from {service secret, user salt} via a
//! deliberately slow PBKDF2; neither the database file nor a dump of the
//! users table is sufficient to read a journal.
//!
//! ## Rules
//!
//! - Key derivation runs on the blocking worker pool, never inside an open
//!   storage transaction.
//! - Decryption failures are uniform: callers learn *that* an envelope
//!   failed authentication, never *why*.
//! - Plaintext, salts, and derived keys are never logged.

pub mod engine;
pub mod envelope;

pub use engine::{
    generate_salt, CryptoError, EncryptionEngine, DEFAULT_KDF_ITERATIONS, SALT_LEN,
};
pub use envelope::Envelope;
