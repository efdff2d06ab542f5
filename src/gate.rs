//! The validate-then-sign gate.
//!
//! Each inbound request moves through `Received → TokenExtracted → Validating → {Authorized | Denied} →
//! Responded`. A signature is only computed after the authorization server has reported the token as active, and
//! every exit is an explicit [`AuthOutcome`].

use {
    crate::{
        audit::{AuditCategory, AuditEntry, AuditSink, LogAuditSink},
        body::IntoRequestBytes,
        canonical::CanonicalRequestContext,
        config::ServiceConfig,
        constants::*,
        introspect::{HttpIntrospector, IntrospectionRequest, IntrospectionResponse},
        signature::SignatureHeader,
        signing_key::{RequestSigner, SigningIdentity},
        ConfigError, DenialReason, ParseError, SigningError, ValidationError,
    },
    bytes::Bytes,
    chrono::{DateTime, Utc},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, DATE},
        Request, Response, StatusCode,
    },
    log::{debug, info, trace, warn},
    serde::{Deserialize, Serialize},
    serde_json::{error::Category, Map, Value},
    std::{
        any::type_name,
        fmt::{Debug, Formatter, Result as FmtResult},
        future::Future,
        pin::Pin,
        sync::Arc,
        task::{Context, Poll},
    },
    tower::{BoxError, Service, ServiceExt},
};

/// A signature issued for an authorized request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Authorization {
    header: SignatureHeader,
    context: CanonicalRequestContext,
}

impl Authorization {
    /// The RFC 1123 date that was signed; it must be sent as the `Date` header.
    #[inline]
    pub fn date(&self) -> &str {
        self.context.date()
    }

    /// The signature header.
    #[inline]
    pub fn header(&self) -> &SignatureHeader {
        &self.header
    }

    /// The request-scoped values that were signed.
    #[inline]
    pub fn context(&self) -> &CanonicalRequestContext {
        &self.context
    }
}

/// The terminal state of one request through the gate.
#[derive(Debug)]
pub enum AuthOutcome {
    /// The token is active and a signature was issued.
    Authorized(Authorization),

    /// No signature was issued.
    Denied(DenialReason),
}

impl AuthOutcome {
    /// Indicates whether a signature was issued.
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized(_))
    }

    /// The issued signature, if any.
    pub fn authorization(&self) -> Option<&Authorization> {
        match self {
            Self::Authorized(authorization) => Some(authorization),
            Self::Denied(_) => None,
        }
    }

    /// The denial reason, if any.
    pub fn denial(&self) -> Option<&DenialReason> {
        match self {
            Self::Authorized(_) => None,
            Self::Denied(reason) => Some(reason),
        }
    }

    /// The HTTP status this outcome is rendered with.
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Authorized(_) => StatusCode::OK,
            Self::Denied(reason) => reason.http_status(),
        }
    }

    /// Render this outcome as the HTTP response sent to the caller.
    ///
    /// An authorized outcome yields `200` with the signature in both the headers and the JSON body; a denied outcome
    /// yields `401` with `{"active": false, "wwwAuthenticate": ...}`.
    pub fn to_response(&self) -> Result<Response<Bytes>, BoxError> {
        match self {
            Self::Authorized(authorization) => {
                let header_value = authorization.header().to_string();
                let key_id = authorization.header().key_id();
                let context = authorization.context();
                let body = serde_json::to_vec(&AuthorizedBody {
                    active: true,
                    context: AuthorizedContext {
                        date: context.date(),
                        authorization: &header_value,
                        streaming_host: context.streaming_host(),
                        oci_region: context.oci_region(),
                        tenancy: key_id.tenancy(),
                        user: key_id.user(),
                        fingerprint: key_id.fingerprint(),
                    },
                })?;

                Ok(Response::builder()
                    .status(StatusCode::OK)
                    .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
                    .header(AUTHORIZATION, header_value.as_str())
                    .header(DATE, context.date())
                    .body(Bytes::from(body))?)
            }
            Self::Denied(reason) => {
                let body = serde_json::to_vec(&DeniedBody {
                    active: false,
                    www_authenticate: reason.www_authenticate(),
                })?;

                Ok(Response::builder()
                    .status(reason.http_status())
                    .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
                    .body(Bytes::from(body))?)
            }
        }
    }
}

#[derive(Serialize)]
struct AuthorizedBody<'a> {
    active: bool,
    context: AuthorizedContext<'a>,
}

#[derive(Serialize)]
struct AuthorizedContext<'a> {
    date: &'a str,
    authorization: &'a str,
    streaming_host: &'a str,
    oci_region: &'a str,
    tenancy: &'a str,
    user: &'a str,
    fingerprint: &'a str,
}

#[derive(Serialize)]
struct DeniedBody {
    active: bool,
    #[serde(rename = "wwwAuthenticate")]
    www_authenticate: String,
}

#[derive(Deserialize)]
struct InboundPayload {
    data: Map<String, Value>,
}

/// Extract the bearer token from an inbound body of the form `{"data": {"token": "..."}}`.
///
/// Returns the `data` object (for auditing) along with the token.
pub fn parse_inbound_payload(body: &[u8]) -> Result<(Value, String), ParseError> {
    let payload: InboundPayload = serde_json::from_slice(body).map_err(|e| {
        // The serde message can quote input values, so only the location is reported.
        let what = match e.classify() {
            Category::Io => "unreadable input",
            Category::Syntax => "invalid JSON",
            Category::Data => "expected {\"data\": {\"token\": ...}}",
            Category::Eof => "unexpected end of input",
        };
        ParseError::InvalidJson(format!("{} at line {} column {}", what, e.line(), e.column()))
    })?;

    let token = match payload.data.get("token") {
        Some(Value::String(token)) if token.is_empty() => return Err(ParseError::EmptyToken),
        Some(Value::String(token)) => token.clone(),
        _ => return Err(ParseError::MissingToken),
    };

    Ok((Value::Object(payload.data), token))
}

/// The gate: validates bearer tokens and issues signatures for active ones.
///
/// * `V` validates tokens; in production this is [`HttpIntrospector`].
/// * `S` signs canonical strings; in production this is [`SigningIdentity`].
/// * `A` receives audit entries.
///
/// The configuration and signer are shared read-only between clones, so one gate can serve concurrent requests
/// without locking.
pub struct AuthGate<V, S, A> {
    config: Arc<ServiceConfig>,
    signer: Arc<S>,
    validator: V,
    audit: A,
}

impl<V, S, A> Clone for AuthGate<V, S, A>
where
    V: Clone,
    A: Clone,
{
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            signer: self.signer.clone(),
            validator: self.validator.clone(),
            audit: self.audit.clone(),
        }
    }
}

impl<V, S, A> Debug for AuthGate<V, S, A> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("AuthGate")
            .field("config", &self.config)
            .field("signer", &type_name::<S>())
            .field("validator", &type_name::<V>())
            .field("audit", &type_name::<A>())
            .finish()
    }
}

impl AuthGate<HttpIntrospector, SigningIdentity, LogAuditSink> {
    /// Create the production gate: load the private key, and introspect over HTTP.
    ///
    /// # Errors
    /// Fails if the key file is missing or unreadable, or the HTTP client cannot be created. The service must not
    /// start in that case.
    pub fn from_config(config: ServiceConfig) -> Result<Self, ConfigError> {
        let signer = config.load_signing_identity()?;
        let validator = HttpIntrospector::new(config.introspection().clone()).map_err(ConfigError::HttpClient)?;
        info!("Gate ready for stream {} in {}", config.streaming_host(), config.oci_region());
        Ok(Self::new(config, signer, validator, LogAuditSink))
    }
}

impl<V, S, A> AuthGate<V, S, A>
where
    V: Service<IntrospectionRequest, Response = IntrospectionResponse, Error = BoxError> + Clone + Send + Sync,
    V::Future: Send,
    S: RequestSigner,
    A: AuditSink,
{
    /// Create a gate from its parts.
    pub fn new(config: ServiceConfig, signer: S, validator: V, audit: A) -> Self {
        Self {
            config: Arc::new(config),
            signer: Arc::new(signer),
            validator,
            audit,
        }
    }

    /// The configuration the gate was created with.
    #[inline]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Run one inbound body through the gate.
    ///
    /// The signed date is taken from the clock after the token has been found active, so it does not lag behind
    /// the signature by the duration of the introspection call. Audit entries are emitted before this returns.
    /// Their failures are logged and do not affect the outcome.
    pub async fn authorize(&self, body: &[u8]) -> AuthOutcome {
        self.authorize_with_clock(body, Utc::now).await
    }

    /// Run one inbound body through the gate with the clock pinned to `now`.
    pub async fn authorize_at(&self, body: &[u8], now: DateTime<Utc>) -> AuthOutcome {
        self.authorize_with_clock(body, move || now).await
    }

    /// Run one inbound body through the gate at the current time and render the response.
    pub async fn handle(&self, body: &[u8]) -> Result<Response<Bytes>, BoxError> {
        self.authorize(body).await.to_response()
    }

    async fn authorize_with_clock<C>(&self, body: &[u8], clock: C) -> AuthOutcome
    where
        C: Fn() -> DateTime<Utc> + Send,
    {
        trace!("authorize: received {} byte body", body.len());
        let (data, token) = match parse_inbound_payload(body) {
            Ok(parsed) => parsed,
            Err(e) => return self.deny(e.into(), clock()).await,
        };

        trace!("authorize: token extracted; validating");
        let introspection = match self.validator.clone().oneshot(IntrospectionRequest::new(token)).await {
            Ok(response) if response.active() => response,
            Ok(_) => return self.deny(ValidationError::Inactive.into(), clock()).await,
            Err(e) => return self.deny(ValidationError::from(e).into(), clock()).await,
        };

        let now = clock();
        let authorization = match self.sign_at(now) {
            Ok(authorization) => authorization,
            Err(e) => return self.deny(e.into(), now).await,
        };

        debug!("authorize: issued signature for {}", authorization.header().key_id());
        self.emit(AuditCategory::IssuedAuthorization, &authorization.header().to_string(), now).await;
        self.emit(AuditCategory::RequestPayload, &data.to_string(), now).await;
        let raw_response = Value::String(introspection.raw().to_string()).to_string();
        self.emit(AuditCategory::IntrospectionResponse, &raw_response, now).await;

        AuthOutcome::Authorized(authorization)
    }

    /// Build the canonical string for `now`, sign it, and encode the header.
    fn sign_at(&self, now: DateTime<Utc>) -> Result<Authorization, SigningError> {
        let context = CanonicalRequestContext::at(now, self.config.streaming_host(), self.config.oci_region())?;
        let signature = self.signer.sign(&context.to_canonical_bytes())?;
        Ok(Authorization {
            header: SignatureHeader::new(self.signer.key_id().clone(), signature),
            context,
        })
    }

    async fn deny(&self, reason: DenialReason, now: DateTime<Utc>) -> AuthOutcome {
        info!("authorize: denied ({})", reason);
        self.emit(AuditCategory::Error, &reason.to_string(), now).await;
        AuthOutcome::Denied(reason)
    }

    async fn emit(&self, category: AuditCategory, payload: &str, now: DateTime<Utc>) {
        let entry = AuditEntry::new(category, payload, self.config.audit(), now);
        if let Err(e) = self.audit.emit(entry).await {
            warn!("Failed to emit {} audit entry: {}", category, e);
        }
    }
}

impl<B, V, S, A> Service<Request<B>> for AuthGate<V, S, A>
where
    B: IntoRequestBytes + Send + 'static,
    V: Service<IntrospectionRequest, Response = IntrospectionResponse, Error = BoxError>
        + Clone
        + Send
        + Sync
        + 'static,
    V::Future: Send,
    S: RequestSigner + 'static,
    A: AuditSink + Clone + 'static,
{
    type Response = Response<Bytes>;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Bytes>, BoxError>> + Send>>;

    fn poll_ready(&mut self, _c: &mut Context) -> Poll<Result<(), Self::Error>> {
        // The validator is driven with `oneshot`, which waits for readiness itself.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let gate = self.clone();
        Box::pin(async move {
            let outcome = match req.into_body().into_request_bytes().await {
                Ok(body) => gate.authorize(&body).await,
                Err(e) => {
                    debug!("call: unable to read request body: {}", e);
                    let reason = ParseError::InvalidJson("unreadable request body".to_string()).into();
                    gate.deny(reason, Utc::now()).await
                }
            };
            outcome.to_response()
        })
    }
}
