//! Property-based tests for NIP-44 mail encryption.
//!
//! Sender resolution relies on two properties: the right counterparty key
//! always decrypts, and any other key always fails. These tests check both
//! for arbitrary bodies.

use nostr::Keys;
use nostrmail_core::nostr::encryption::{decrypt_nip44, encrypt_nip44};
use proptest::prelude::*;

/// Non-empty printable bodies, including multi-byte characters.
fn plaintext_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 äöü€\n]{1,500}"
}

fn hex(keys: &Keys) -> String {
    keys.public_key().to_hex()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The recipient decrypts with the sender's pubkey.
    #[test]
    fn recipient_decrypts_with_sender_key(plaintext in plaintext_strategy()) {
        let sender = Keys::generate();
        let recipient = Keys::generate();

        let ciphertext = encrypt_nip44(&sender, &hex(&recipient), &plaintext).unwrap();
        let decrypted = decrypt_nip44(&recipient, &hex(&sender), &ciphertext).unwrap();
        prop_assert_eq!(decrypted, plaintext);
    }

    /// The conversation key is symmetric: the sender can read its own mail.
    #[test]
    fn sender_decrypts_own_message(plaintext in plaintext_strategy()) {
        let sender = Keys::generate();
        let recipient = Keys::generate();

        let ciphertext = encrypt_nip44(&sender, &hex(&recipient), &plaintext).unwrap();
        let decrypted = decrypt_nip44(&sender, &hex(&recipient), &ciphertext).unwrap();
        prop_assert_eq!(decrypted, plaintext);
    }

    /// A wrong counterparty never yields a plaintext.
    #[test]
    fn wrong_counterparty_fails(plaintext in plaintext_strategy()) {
        let sender = Keys::generate();
        let recipient = Keys::generate();
        let other = Keys::generate();

        let ciphertext = encrypt_nip44(&sender, &hex(&recipient), &plaintext).unwrap();
        prop_assert!(decrypt_nip44(&recipient, &hex(&other), &ciphertext).is_err());
    }

    /// Ciphertexts are randomized and never contain the body.
    #[test]
    fn ciphertext_is_randomized(plaintext in "[a-zA-Z]{16,64}") {
        let sender = Keys::generate();
        let recipient = hex(&Keys::generate());

        let first = encrypt_nip44(&sender, &recipient, &plaintext).unwrap();
        let second = encrypt_nip44(&sender, &recipient, &plaintext).unwrap();
        prop_assert_ne!(&first, &second);
        prop_assert!(!first.contains(&plaintext));
    }

    /// Flipping any payload character breaks the MAC.
    #[test]
    fn tampering_fails(plaintext in plaintext_strategy(), position in any::<prop::sample::Index>()) {
        let sender = Keys::generate();
        let recipient = Keys::generate();

        let ciphertext = encrypt_nip44(&sender, &hex(&recipient), &plaintext).unwrap();
        let mut chars: Vec<char> = ciphertext.chars().collect();
        // Stay clear of the final quantum, whose spare bits carry no data
        let i = position.index(chars.len() - 4);
        chars[i] = if chars[i] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();

        prop_assert!(decrypt_nip44(&recipient, &hex(&sender), &tampered).is_err());
    }
}

#[test]
fn empty_plaintext_is_rejected() {
    let sender = Keys::generate();
    let recipient = hex(&Keys::generate());
    assert!(encrypt_nip44(&sender, &recipient, "").is_err());
}

#[test]
fn malformed_counterparty_is_rejected() {
    let keys = Keys::generate();
    assert!(encrypt_nip44(&keys, "not-hex", "body").is_err());
    assert!(decrypt_nip44(&keys, "not-hex", "payload").is_err());
}
