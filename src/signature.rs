//! The `Signature` authorization header.
//!
//! The streaming API parses the header positionally, so the parameter order and quoting produced here are a wire
//! contract:
//!
//! ```text
//! Signature algorithm="rsa-sha256",headers="(request-target) date host",keyId="{tenancy}/{user}/{fingerprint}",signature="{base64}",version="1"
//! ```

use {
    crate::{constants::*, signing_key::KeyId, SigningError},
    base64::{engine::general_purpose::STANDARD, Engine},
    std::{
        fmt::{Display, Formatter, Result as FmtResult},
        str::FromStr,
    },
};

/// A base64-encoded RSA signature over a canonical string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature(String);

impl Signature {
    /// Encode raw signature bytes.
    pub fn from_bytes(raw: &[u8]) -> Self {
        Self(STANDARD.encode(raw))
    }

    /// The base64 text of the signature.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.write_str(&self.0)
    }
}

/// A complete `Signature` authorization header value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureHeader {
    key_id: KeyId,
    signature: Signature,
}

impl SignatureHeader {
    /// Bind a signature to the identity that produced it. The signature is consumed.
    pub fn new(key_id: KeyId, signature: Signature) -> Self {
        Self {
            key_id,
            signature,
        }
    }

    /// The identity of the signing key.
    #[inline]
    pub fn key_id(&self) -> &KeyId {
        &self.key_id
    }

    /// The signature.
    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The signing algorithm. Always `rsa-sha256`.
    #[inline]
    pub fn algorithm(&self) -> &'static str {
        SIG_ALGORITHM_RSA_SHA256
    }

    /// The signed headers, in order.
    pub fn headers(&self) -> Vec<&'static str> {
        SIG_SIGNED_HEADERS.split(' ').collect()
    }
}

impl Display for SignatureHeader {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(
            f,
            "{} algorithm=\"{}\",headers=\"{}\",keyId=\"{}\",signature=\"{}\",version=\"{}\"",
            SIG_SCHEME, SIG_ALGORITHM_RSA_SHA256, SIG_SIGNED_HEADERS, self.key_id, self.signature, SIG_VERSION
        )
    }
}

/// Encode a signature header from its components.
///
/// # Errors
/// Returns [`SigningError::InvalidCanonicalInput`] if an identity component is not a safe token; see
/// [`KeyId::new`].
pub fn encode_signature_header(
    tenancy: &str,
    user: &str,
    fingerprint: &str,
    signature: Signature,
) -> Result<String, SigningError> {
    Ok(SignatureHeader::new(KeyId::new(tenancy, user, fingerprint)?, signature).to_string())
}

/// Parse a header value produced by [`SignatureHeader`]'s `Display` implementation.
///
/// Parsing is strict: the scheme, parameter order, algorithm, signed headers and version must all be exactly what
/// this crate emits.
impl FromStr for SignatureHeader {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |why: &str| SigningError::InvalidCanonicalInput(format!("malformed signature header: {}", why));

        let params = s
            .strip_prefix(SIG_SCHEME)
            .and_then(|rest| rest.strip_prefix(' '))
            .ok_or_else(|| malformed("missing Signature scheme"))?;

        let mut values = Vec::with_capacity(5);
        for (param, expected_name) in params.split(',').zip(["algorithm", "headers", "keyId", "signature", "version"]) {
            let (name, value) = param.split_once('=').ok_or_else(|| malformed("parameter without '='"))?;
            if name != expected_name {
                return Err(malformed(&format!("expected parameter {}, got {}", expected_name, name)));
            }

            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .ok_or_else(|| malformed("unquoted parameter value"))?;
            values.push(value);
        }

        if values.len() != 5 || params.split(',').count() != 5 {
            return Err(malformed("expected exactly 5 parameters"));
        }

        if values[0] != SIG_ALGORITHM_RSA_SHA256 {
            return Err(malformed("unsupported algorithm"));
        }

        if values[1] != SIG_SIGNED_HEADERS {
            return Err(malformed("unexpected signed headers"));
        }

        if values[4] != SIG_VERSION {
            return Err(malformed("unsupported version"));
        }

        let key_id_parts: Vec<&str> = values[2].split('/').collect();
        if key_id_parts.len() != 3 {
            return Err(malformed("keyId must have exactly 3 slash-delimited elements"));
        }

        let key_id = KeyId::new(key_id_parts[0], key_id_parts[1], key_id_parts[2])?;
        if STANDARD.decode(values[3]).is_err() {
            return Err(malformed("signature is not base64"));
        }

        Ok(Self::new(key_id, Signature(values[3].to_string())))
    }
}
