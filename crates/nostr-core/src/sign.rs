//! Deterministic event signing.
//!
//! `nostr-sdk` signs with fresh auxiliary randomness, so two signatures over
//! the same id differ. Replies are signed here with BIP-340 and no auxiliary
//! data instead: the same unsigned event and key always produce the same id
//! and signature. [`sign_event`] consumes the unsigned event, so one instance
//! can only be signed once.

use std::sync::LazyLock;

use nostr_sdk::secp256k1::{All, Keypair, Message, Secp256k1};
use nostr_sdk::{Event, Keys, PublicKey, UnsignedEvent};

static SECP: LazyLock<Secp256k1<All>> = LazyLock::new(Secp256k1::new);

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("event author {declared} does not match signing key {signer}")]
    AuthorMismatch {
        declared: PublicKey,
        signer: PublicKey,
    },
    #[error("event id could not be computed")]
    MissingId,
    #[error("signature rejected: {0}")]
    Rejected(String),
}

/// Sign `unsigned` with `keys`, setting its id and signature.
pub fn sign_event(unsigned: UnsignedEvent, keys: &Keys) -> Result<Event, SigningError> {
    let signer = keys.public_key();
    if unsigned.pubkey != signer {
        return Err(SigningError::AuthorMismatch {
            declared: unsigned.pubkey,
            signer,
        });
    }

    let mut unsigned = unsigned;
    unsigned.ensure_id();
    let id = unsigned.id.ok_or(SigningError::MissingId)?;

    let secp: &Secp256k1<All> = &SECP;
    let message = Message::from_digest(id.to_bytes());
    let keypair = Keypair::from_secret_key(secp, keys.secret_key());
    let sig = secp.sign_schnorr_no_aux_rand(&message, &keypair);

    unsigned
        .add_signature(sig)
        .map_err(|e| SigningError::Rejected(e.to_string()))
}
