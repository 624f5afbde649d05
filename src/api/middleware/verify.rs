use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use http::{HeaderMap, StatusCode};
use ring::signature::{self, UnparsedPublicKey};
use tracing::instrument;

use crate::api::middleware::{VerifyErr, VerifyResult};
use crate::util::env::Var;
use crate::var;

pub const SIGNATURE_HEADER: &str = "X-Signature-Ed25519";
pub const TIMESTAMP_HEADER: &str = "X-Signature-Timestamp";

const PUBLIC_KEY_LEN: usize = 32;

/// Checks interaction signatures against the application's Ed25519 public key.
#[derive(Debug, Clone)]
pub struct Verifier {
    public_key: [u8; PUBLIC_KEY_LEN],
}

impl Verifier {
    pub fn from_hex(public_key: &str) -> VerifyResult<Self> {
        let bytes = hex::decode(public_key.trim())?;
        let public_key: [u8; PUBLIC_KEY_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| VerifyErr::InvalidKeyLength(bytes.len()))?;

        Ok(Self { public_key })
    }

    pub async fn from_env() -> VerifyResult<Self> {
        Self::from_hex(var!(Var::DiscordPublicKey).await?)
    }

    /// The signed message is the timestamp header followed by the raw body.
    pub fn verify(&self, timestamp: &str, body: &[u8], signature_hex: &str) -> bool {
        let Ok(signature) = hex::decode(signature_hex) else {
            return false;
        };

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);

        UnparsedPublicKey::new(&signature::ED25519, &self.public_key)
            .verify(&message, &signature)
            .is_ok()
    }
}

/// Request body that passed signature verification.
#[derive(Clone)]
pub struct VerifiedBody(pub Bytes);

impl VerifiedBody {
    pub fn as_json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(&self.0)
    }
}

#[instrument(skip_all)]
pub async fn verify_interaction(
    State(verifier): State<Arc<Verifier>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let (timestamp, signature) = match get_signature_parts(req.headers()) {
        Ok((ts, sig)) => (ts.to_owned(), sig.to_owned()),
        Err(status) => {
            tracing::warn!(%status, "interaction request without signature headers");
            return Err(status);
        }
    };

    let body = match extract_body(&mut req).await {
        Ok(bytes) => bytes,
        Err(_) => return Err(StatusCode::BAD_REQUEST),
    };

    if !verifier.verify(&timestamp, &body, &signature) {
        tracing::warn!("unable to verify interaction signature");
        return Err(StatusCode::UNAUTHORIZED);
    }

    req.extensions_mut().insert(VerifiedBody(body));
    Ok(next.run(req).await)
}

async fn extract_body(request: &mut Request) -> Result<Bytes, axum::Error> {
    let body = std::mem::replace(request.body_mut(), Body::empty());
    axum::body::to_bytes(body, usize::MAX).await
}

fn get_signature_parts(headers: &HeaderMap) -> Result<(&str, &str), StatusCode> {
    let timestamp = headers
        .get(TIMESTAMP_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::BAD_REQUEST)?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::BAD_REQUEST)?;

    Ok((timestamp, signature))
}

impl<S> FromRequest<S> for VerifiedBody
where
    S: Send + Sync,
{
    type Rejection = StatusCode;
    async fn from_request(req: Request, _: &S) -> Result<Self, Self::Rejection> {
        req.extensions()
            .get::<VerifiedBody>()
            .cloned()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use ring::rand::SystemRandom;
    use ring::signature::{Ed25519KeyPair, KeyPair};

    use super::Verifier;

    /// Throwaway application key pair for signing test requests.
    pub struct SigningKey(Ed25519KeyPair);

    impl SigningKey {
        pub fn generate() -> Self {
            let pkcs8 = Ed25519KeyPair::generate_pkcs8(&SystemRandom::new()).unwrap();
            Self(Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap())
        }

        pub fn public_hex(&self) -> String {
            hex::encode(self.0.public_key().as_ref())
        }

        pub fn verifier(&self) -> Verifier {
            Verifier::from_hex(&self.public_hex()).unwrap()
        }

        pub fn sign(&self, timestamp: &str, body: &[u8]) -> String {
            let mut message = timestamp.as_bytes().to_vec();
            message.extend_from_slice(body);
            hex::encode(self.0.sign(&message).as_ref())
        }
    }
}

#[cfg(test)]
mod test {
    use super::testing::SigningKey;
    use super::*;

    #[test]
    fn test_verify_signature() {
        let key = SigningKey::generate();
        let verifier = key.verifier();

        let body = br#"{"type":1}"#;
        let signature = key.sign("1700000000", body);

        assert!(verifier.verify("1700000000", body, &signature));
        assert!(!verifier.verify("1700000001", body, &signature));
        assert!(!verifier.verify("1700000000", br#"{"type":2}"#, &signature));
        assert!(!verifier.verify("1700000000", body, "not-hex"));

        let other = SigningKey::generate().verifier();
        assert!(!other.verify("1700000000", body, &signature));
    }

    #[test]
    fn test_public_key_parsing() {
        assert!(matches!(
            Verifier::from_hex("abcd"),
            Err(VerifyErr::InvalidKeyLength(2))
        ));
        assert!(matches!(
            Verifier::from_hex("zz"),
            Err(VerifyErr::HexError(_))
        ));
        assert!(Verifier::from_hex(&SigningKey::generate().public_hex()).is_ok());
    }
}
