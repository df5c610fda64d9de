//! VAPID key material used by the sending side of push delivery.
//!
//! The public half is the same key the subscription controller hands to the
//! push manager, so a configuration is only usable when that key decodes the
//! way the controller decodes it and belongs to the private key.

use base64::{URL_SAFE_NO_PAD, encode_config};
use jwt_simple::prelude::ES256KeyPair;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

use crate::config::AppConfig;
use crate::controller::key::{KeyError, application_server_key};
use crate::types::push::VapidConfig;

#[derive(Debug, thiserror::Error)]
pub enum VapidError {
    #[error("VAPID public key is not a usable application server key: {0}")]
    PublicKey(#[from] KeyError),
    #[error("VAPID private key rejected: {0}")]
    PrivateKey(web_push::WebPushError),
    #[error("VAPID public key does not belong to the private key")]
    Mismatch,
    #[error("VAPID subject must be a mailto: or https: URI, got '{0}'")]
    Subject(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VapidCredentials {
    pub private_key: String,
    /// Set the controller's `application_server_key` to this value.
    pub public_key: String,
}

#[derive(Debug)]
pub enum VapidConfigStatus {
    Missing,
    Incomplete,
    Invalid(VapidError),
    Ready(VapidConfig),
}

pub fn load_vapid_config(config: &AppConfig) -> VapidConfigStatus {
    let fields = (
        config.vapid_private_key.as_deref(),
        config.vapid_public_key.as_deref(),
        config.vapid_subject.as_deref(),
    );
    let vapid = match fields {
        (None, None, None) => return VapidConfigStatus::Missing,
        (Some(private_key), Some(public_key), Some(subject)) => VapidConfig {
            private_key: private_key.trim().to_string(),
            public_key: public_key.trim().to_string(),
            subject: subject.trim().to_string(),
        },
        _ => return VapidConfigStatus::Incomplete,
    };
    match validate(&vapid) {
        Ok(()) => VapidConfigStatus::Ready(vapid),
        Err(err) => {
            tracing::warn!("ignoring VAPID configuration: {err}");
            VapidConfigStatus::Invalid(err)
        }
    }
}

pub fn validate(vapid: &VapidConfig) -> Result<(), VapidError> {
    if !(vapid.subject.starts_with("mailto:") || vapid.subject.starts_with("https://")) {
        return Err(VapidError::Subject(vapid.subject.clone()));
    }
    let public_key = application_server_key(&vapid.public_key)?;
    let derived = derive_public_key(&vapid.private_key).map_err(VapidError::PrivateKey)?;
    if derived != public_key {
        return Err(VapidError::Mismatch);
    }
    Ok(())
}

fn derive_public_key(private_key: &str) -> Result<Vec<u8>, web_push::WebPushError> {
    let partial =
        web_push::VapidSignatureBuilder::from_base64_no_sub(private_key, URL_SAFE_NO_PAD)?;
    Ok(partial.get_public_key())
}

pub fn generate_vapid_credentials() -> Result<VapidCredentials, web_push::WebPushError> {
    credentials_from_rng(&mut OsRng)
}

pub(crate) fn credentials_from_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> Result<VapidCredentials, web_push::WebPushError> {
    let private_key = encode_config(signing_key(rng).to_bytes(), URL_SAFE_NO_PAD);
    let public_key = encode_config(derive_public_key(&private_key)?, URL_SAFE_NO_PAD);
    Ok(VapidCredentials {
        private_key,
        public_key,
    })
}

/// Draws scalars until one is a valid P-256 secret key.
fn signing_key<R: RngCore + CryptoRng>(rng: &mut R) -> ES256KeyPair {
    let mut secret = [0u8; 32];
    loop {
        rng.fill_bytes(&mut secret);
        if let Ok(key_pair) = ES256KeyPair::from_bytes(&secret) {
            return key_pair;
        }
    }
}
