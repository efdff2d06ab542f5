use {
    crate::constants::*,
    http::status::StatusCode,
    std::{
        error::Error,
        fmt::{Display, Formatter, Result as FmtResult},
        io::Error as IOError,
    },
    tower::BoxError,
};

/// Error returned when the inbound request payload cannot be interpreted.
#[derive(Debug)]
#[non_exhaustive]
pub enum ParseError {
    /// The body is not valid JSON, or does not have a `data` object.
    InvalidJson(/* message */ String),

    /// The `data` object has no string `token` field.
    MissingToken,

    /// The `token` field is present but empty.
    EmptyToken,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::InvalidJson(msg) => f.write_str(msg),
            Self::MissingToken => f.write_str("missing field 'data.token'"),
            Self::EmptyToken => f.write_str("'token' must not be empty"),
        }
    }
}

impl Error for ParseError {}

/// Error returned when a bearer token could not be validated.
///
/// [`Inactive`][ValidationError::Inactive] is the only variant that reflects a verdict from the authorization
/// server; every other variant means no verdict was obtained.
#[derive(Debug)]
#[non_exhaustive]
pub enum ValidationError {
    /// The authorization server reported the token as not active.
    Inactive,

    /// The introspection call did not complete within the configured timeout.
    Timeout,

    /// The introspection call failed at the transport level (connection refused, TLS failure, ...).
    Transport(/* message */ String),

    /// The authorization server answered with a non-200 status.
    UnexpectedStatus(/* status */ u16),

    /// The authorization server answered 200, but the body is not an introspection response.
    MalformedResponse(/* message */ String),

    /// The introspection request could not be constructed (e.g. an invalid base URL).
    InvalidRequest(/* message */ String),
}

impl ValidationError {
    /// Indicates whether this is an authoritative "not active" verdict rather than a failure to obtain one.
    pub fn is_inactive(&self) -> bool {
        matches!(self, Self::Inactive)
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Inactive => f.write_str("token is not active"),
            Self::Timeout => f.write_str("introspection request timed out"),
            Self::Transport(msg) => write!(f, "introspection transport error: {}", msg),
            Self::UnexpectedStatus(status) => write!(f, "introspection endpoint returned HTTP {}", status),
            Self::MalformedResponse(msg) => write!(f, "malformed introspection response: {}", msg),
            Self::InvalidRequest(msg) => write!(f, "invalid introspection request: {}", msg),
        }
    }
}

impl Error for ValidationError {}

impl From<BoxError> for ValidationError {
    fn from(e: BoxError) -> ValidationError {
        match e.downcast::<ValidationError>() {
            Ok(validation_err) => *validation_err,
            Err(e) => ValidationError::Transport(e.to_string()),
        }
    }
}

/// Error returned when a signature cannot be produced.
///
/// Messages never include key material.
#[derive(Debug)]
#[non_exhaustive]
pub enum SigningError {
    /// The private key could not be decoded, or is not an RSA key.
    InvalidKey(/* message */ String),

    /// A canonical string input or key identity component contains characters that would corrupt the signed
    /// structure.
    InvalidCanonicalInput(/* message */ String),

    /// The RSA primitive rejected the input (e.g. the key is too small for the digest).
    Crypto(/* message */ String),

    /// The private key file could not be read.
    KeyIo(IOError),
}

impl Display for SigningError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::InvalidKey(msg) => write!(f, "invalid private key: {}", msg),
            Self::InvalidCanonicalInput(msg) => f.write_str(msg),
            Self::Crypto(msg) => write!(f, "signing failed: {}", msg),
            Self::KeyIo(ref e) => write!(f, "unable to read private key: {}", e),
        }
    }
}

impl Error for SigningError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::KeyIo(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<IOError> for SigningError {
    fn from(e: IOError) -> SigningError {
        SigningError::KeyIo(e)
    }
}

/// Error returned by an [`AuditSink`][crate::AuditSink]. The gate logs and discards these.
#[derive(Debug)]
#[non_exhaustive]
pub enum AuditError {
    /// The sink could not accept the entry.
    Sink(/* message */ String),
}

impl Display for AuditError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Sink(msg) => write!(f, "audit sink error: {}", msg),
        }
    }
}

impl Error for AuditError {}

/// Error returned while assembling the [`ServiceConfig`][crate::ServiceConfig] at startup.
#[derive(Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// A configuration file could not be read.
    IO(IOError),

    /// The options file is not valid JSON for the expected shape.
    Json(serde_json::Error),

    /// A required setting is absent.
    MissingField(&'static str),

    /// The requested profile is not present in the OCI config file.
    MissingProfile(String),

    /// An identity component (tenancy, user, fingerprint), host or region is not a safe token.
    InvalidIdentity(String),

    /// A setting is present but its value is out of range.
    InvalidSetting(/* setting */ &'static str, /* message */ String),

    /// The signing key could not be loaded.
    Signing(SigningError),

    /// The introspection HTTP client could not be created.
    HttpClient(ValidationError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::IO(ref e) => Display::fmt(e, f),
            Self::Json(ref e) => write!(f, "invalid options file: {}", e),
            Self::MissingField(field) => write!(f, "missing configuration setting: {}", field),
            Self::MissingProfile(profile) => write!(f, "profile [{}] not found in OCI config file", profile),
            Self::InvalidIdentity(msg) => f.write_str(msg),
            Self::InvalidSetting(setting, msg) => write!(f, "invalid configuration setting {}: {}", setting, msg),
            Self::Signing(ref e) => Display::fmt(e, f),
            Self::HttpClient(ref e) => Display::fmt(e, f),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::IO(ref e) => Some(e),
            Self::Json(ref e) => Some(e),
            Self::Signing(ref e) => Some(e),
            Self::HttpClient(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<IOError> for ConfigError {
    fn from(e: IOError) -> ConfigError {
        ConfigError::IO(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> ConfigError {
        ConfigError::Json(e)
    }
}

impl From<SigningError> for ConfigError {
    fn from(e: SigningError) -> ConfigError {
        match e {
            SigningError::InvalidCanonicalInput(msg) => ConfigError::InvalidIdentity(msg),
            e => ConfigError::Signing(e),
        }
    }
}

/// Why the gate refused to issue a signature.
///
/// All reasons produce the same external `401` response shape; the variant is preserved for logging and tests.
#[derive(Debug)]
pub enum DenialReason {
    /// The inbound payload could not be parsed. No introspection call was made.
    Parse(ParseError),

    /// The token was inactive, or its validity could not be determined.
    Validation(ValidationError),

    /// The token was active but the signing chain failed.
    Signing(SigningError),
}

impl DenialReason {
    /// A stable, machine-readable code for this reason.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse(_) => DENIAL_KIND_PARSE_ERROR,
            Self::Validation(e) if e.is_inactive() => DENIAL_KIND_INACTIVE_TOKEN,
            Self::Validation(_) => DENIAL_KIND_INTROSPECTION_ERROR,
            Self::Signing(_) => DENIAL_KIND_SIGNING_ERROR,
        }
    }

    /// The HTTP status of the response sent for this denial.
    pub fn http_status(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    /// The diagnostic placed in the `wwwAuthenticate` field of the response body.
    ///
    /// An inactive token yields an empty diagnostic. Introspection and signing failures yield a fixed message so
    /// that endpoint addresses, key details and transport errors stay internal.
    pub fn www_authenticate(&self) -> String {
        match self {
            Self::Parse(e) => format!("{}{}", MSG_PARSE_ERROR_PREFIX, e),
            Self::Validation(e) if e.is_inactive() => String::new(),
            Self::Validation(_) => MSG_INTROSPECTION_FAILED.to_string(),
            Self::Signing(_) => MSG_SIGNING_FAILED.to_string(),
        }
    }
}

impl Display for DenialReason {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Parse(e) => write!(f, "{}: {}", DENIAL_KIND_PARSE_ERROR, e),
            Self::Validation(e) => write!(f, "{}: {}", self.kind(), e),
            Self::Signing(e) => write!(f, "{}: {}", DENIAL_KIND_SIGNING_ERROR, e),
        }
    }
}

impl Error for DenialReason {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(ref e) => Some(e),
            Self::Validation(ref e) => Some(e),
            Self::Signing(ref e) => Some(e),
        }
    }
}

impl From<ParseError> for DenialReason {
    fn from(e: ParseError) -> DenialReason {
        DenialReason::Parse(e)
    }
}

impl From<ValidationError> for DenialReason {
    fn from(e: ValidationError) -> DenialReason {
        DenialReason::Validation(e)
    }
}

impl From<SigningError> for DenialReason {
    fn from(e: SigningError) -> DenialReason {
        DenialReason::Signing(e)
    }
}
