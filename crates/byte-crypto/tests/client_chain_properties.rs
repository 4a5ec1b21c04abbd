//! Property tests for the client chain: key encryption round trips, tamper
//! detection, derivation determinism and token validity windows.

use byte_crypto::{ClientChain, KeyError, OsRandom, TokenError, NONCE_SIZE, TAG_SIZE};
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

const CLIENT_ID: &str = "550e8400-e29b-41d4-a716-446655440000";

fn arb_root() -> impl Strategy<Value = [u8; 32]> {
    prop::array::uniform32(any::<u8>())
}

fn arb_client_id() -> impl Strategy<Value = String> {
    any::<u128>().prop_map(|bits| uuid::Builder::from_random_bytes(bits.to_le_bytes()).into_uuid().to_string())
}

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 4, 12, 0, 0).unwrap()
}

proptest! {
    /// Whatever goes in comes back out.
    #[test]
    fn encrypt_key_roundtrip(
        root in arb_root(),
        plaintext in prop::collection::vec(any::<u8>(), 0..2048),
    ) {
        let chain = ClientChain::new(&root, CLIENT_ID).unwrap();
        let sealed = chain.encrypt_key(&plaintext).unwrap();

        prop_assert_eq!(sealed.len(), plaintext.len() + NONCE_SIZE + TAG_SIZE);
        prop_assert_eq!(chain.decrypt_key(&sealed).unwrap(), plaintext);
    }

    /// Two seals of the same plaintext never coincide.
    #[test]
    fn encrypt_key_is_not_deterministic(
        plaintext in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let chain = ClientChain::new(&[0x42u8; 32], CLIENT_ID).unwrap();
        let a = chain.encrypt_key(&plaintext).unwrap();
        let b = chain.encrypt_key(&plaintext).unwrap();
        prop_assert_ne!(a, b);
    }

    /// Flipping any single bit makes decryption fail.
    #[test]
    fn bit_flip_detected(
        plaintext in prop::collection::vec(any::<u8>(), 1..256),
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let chain = ClientChain::new(&[0x42u8; 32], CLIENT_ID).unwrap();
        let mut sealed = chain.encrypt_key(&plaintext).unwrap();
        let i = index.index(sealed.len());
        sealed[i] ^= 1 << bit;

        prop_assert_eq!(chain.decrypt_key(&sealed), Err(KeyError::DecryptionFailed));
    }

    /// Any truncation makes decryption fail.
    #[test]
    fn truncation_detected(
        plaintext in prop::collection::vec(any::<u8>(), 0..256),
        cut in 1usize..64,
    ) {
        let chain = ClientChain::new(&[0x42u8; 32], CLIENT_ID).unwrap();
        let sealed = chain.encrypt_key(&plaintext).unwrap();
        let keep = sealed.len().saturating_sub(cut);

        prop_assert_eq!(chain.decrypt_key(&sealed[..keep]), Err(KeyError::DecryptionFailed));
    }

    /// Derivation depends only on the root, and the two domains never collide.
    #[test]
    fn derivation_deterministic_and_separated(root in arb_root(), id in arb_client_id()) {
        let a = ClientChain::new(&root, &id).unwrap();
        let b = ClientChain::new(&root, CLIENT_ID).unwrap();

        let token_key = a.token_key().unwrap();
        let kek = a.key_encryption_key().unwrap();

        let b_key = b.token_key().unwrap();
        prop_assert_eq!(token_key.as_bytes(), b_key.as_bytes());
        prop_assert_ne!(token_key.as_bytes(), kek.as_bytes());
    }

    /// Tokens verify exactly within [iat, iat + 30s].
    #[test]
    fn token_validity_window(root in arb_root(), id in arb_client_id(), offset in -60i64..90) {
        let chain = ClientChain::new(&root, &id).unwrap();
        let token = chain.issue_token(epoch(), &OsRandom).unwrap();
        let now = epoch() + Duration::seconds(offset);

        let result = chain.verify_token(&token, now);
        match offset {
            o if o < 0 => prop_assert_eq!(result, Err(TokenError::NotYetValid)),
            o if o > 30 => prop_assert_eq!(result, Err(TokenError::Expired)),
            _ => {
                let claims = result.unwrap();
                prop_assert_eq!(claims.issued_at, epoch());
                prop_assert_eq!(claims.expiration - claims.issued_at, Duration::seconds(30));
            }
        }
    }

    /// A token never verifies for a different device id.
    #[test]
    fn token_bound_to_identity(root in arb_root(), a in arb_client_id(), b in arb_client_id()) {
        prop_assume!(a != b);
        let minted = ClientChain::new(&root, &a).unwrap();
        let other = ClientChain::new(&root, &b).unwrap();
        let token = minted.issue_token(epoch(), &OsRandom).unwrap();

        prop_assert_eq!(other.verify_token(&token, epoch()), Err(TokenError::Authentication));
    }
}
