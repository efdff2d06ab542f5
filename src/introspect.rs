//! OAuth2 token introspection ([RFC 7662](https://www.rfc-editor.org/rfc/rfc7662)).
//!
//! The validator makes a single attempt with a bounded timeout. It distinguishes an authoritative `"active": false`
//! verdict from every way of failing to obtain a verdict; see [`ValidationError`].

use {
    crate::{config::IntrospectionConfig, constants::*, ValidationError},
    base64::{engine::general_purpose::STANDARD, Engine},
    derive_builder::Builder,
    http::header::{AUTHORIZATION, CONTENT_TYPE},
    log::{debug, trace},
    serde_json::Value,
    std::{
        fmt::{Debug, Formatter, Result as FmtResult},
        future::Future,
        pin::Pin,
        sync::Arc,
        task::{Context, Poll},
    },
    tower::{service_fn, util::ServiceFn, BoxError, Service},
};

/// A request to introspect a bearer token.
#[derive(Builder, Clone)]
#[non_exhaustive]
pub struct IntrospectionRequest {
    /// The bearer token presented by the caller.
    #[builder(setter(into))]
    token: String,
}

impl IntrospectionRequest {
    /// Create a [IntrospectionRequestBuilder] to construct a [IntrospectionRequest].
    #[inline]
    pub fn builder() -> IntrospectionRequestBuilder {
        IntrospectionRequestBuilder::default()
    }

    /// Create a request for `token`.
    #[inline]
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Retrieve the bearer token.
    #[inline]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl Debug for IntrospectionRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("IntrospectionRequest").field("token", &"<redacted>").finish()
    }
}

/// The verdict of the authorization server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntrospectionResponse {
    /// Whether the token is active.
    active: bool,

    /// The response body as received, for auditing.
    raw: String,
}

impl IntrospectionResponse {
    /// Create a response directly. Mostly useful for substitute validators.
    pub fn new<S: Into<String>>(active: bool, raw: S) -> Self {
        Self {
            active,
            raw: raw.into(),
        }
    }

    /// Interpret a `200 OK` introspection body.
    ///
    /// # Errors
    /// Returns [`ValidationError::MalformedResponse`] if the body is not a JSON object, or if its `active` member is
    /// missing or not a boolean.
    pub fn from_body<S: Into<String>>(body: S) -> Result<Self, ValidationError> {
        let raw = body.into();
        let value: Value = serde_json::from_str(&raw).map_err(|e| ValidationError::MalformedResponse(e.to_string()))?;
        let Value::Object(fields) = value else {
            return Err(ValidationError::MalformedResponse("body is not a JSON object".to_string()));
        };

        match fields.get("active") {
            Some(Value::Bool(active)) => Ok(Self {
                active: *active,
                raw,
            }),
            Some(_) => Err(ValidationError::MalformedResponse("'active' is not a boolean".to_string())),
            None => Err(ValidationError::MalformedResponse("'active' is missing".to_string())),
        }
    }

    /// Whether the token is active.
    #[inline]
    pub fn active(&self) -> bool {
        self.active
    }

    /// The response body as received.
    #[inline]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// The full URL of the introspection endpoint for a base URL.
pub fn introspection_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), INTROSPECTION_PATH)
}

/// The `Authorization` header value carrying the client credentials.
pub fn basic_authorization(client_id: &str, client_secret: &str) -> String {
    format!("{}{}", BASIC_AUTH_SCHEME, STANDARD.encode(format!("{}:{}", client_id, client_secret)))
}

/// The form-encoded introspection request body.
pub fn introspection_form_body(token: &str) -> String {
    form_urlencoded::Serializer::new(String::new()).append_pair("token", token).finish()
}

/// Token validator that calls the configured introspection endpoint over HTTP.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct HttpIntrospector {
    client: reqwest::Client,
    config: Arc<IntrospectionConfig>,
}

impl HttpIntrospector {
    /// Create a validator. The configured timeout bounds the whole call, from connecting to reading the body.
    pub fn new(config: IntrospectionConfig) -> Result<Self, ValidationError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ValidationError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    /// Introspect a token.
    ///
    /// Returns the server's verdict, active or not. Errors are reserved for failures to obtain a verdict.
    pub async fn introspect(&self, token: &str) -> Result<IntrospectionResponse, ValidationError> {
        let url = introspection_url(self.config.base_url());
        trace!("introspect: POST {}", url);

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, basic_authorization(self.config.client_id(), self.config.client_secret()))
            .header(CONTENT_TYPE, CONTENT_TYPE_FORM_URLENCODED)
            .body(introspection_form_body(token))
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            debug!("introspect: endpoint returned HTTP {}", status);
            return Err(ValidationError::UnexpectedStatus(status.as_u16()));
        }

        let body = response.text().await.map_err(classify_reqwest_error)?;
        let result = IntrospectionResponse::from_body(body)?;
        debug!("introspect: active={}", result.active());
        Ok(result)
    }
}

impl Debug for HttpIntrospector {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("HttpIntrospector").field("config", &self.config).finish()
    }
}

impl Service<IntrospectionRequest> for HttpIntrospector {
    type Response = IntrospectionResponse;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<IntrospectionResponse, BoxError>> + Send>>;

    fn poll_ready(&mut self, _c: &mut Context) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: IntrospectionRequest) -> Self::Future {
        let introspector = self.clone();
        Box::pin(async move { introspector.introspect(req.token()).await.map_err(BoxError::from) })
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> ValidationError {
    if e.is_timeout() {
        debug!("introspect: timed out");
        ValidationError::Timeout
    } else if e.is_builder() {
        ValidationError::InvalidRequest(e.to_string())
    } else {
        debug!("introspect: transport error: {}", e);
        ValidationError::Transport(e.to_string())
    }
}

/// Create a Service that wraps a function that can introspect a token.
pub fn service_for_introspection_fn<F, Fut>(f: F) -> ServiceFn<F>
where
    F: FnMut(IntrospectionRequest) -> Fut + Send + 'static,
    Fut: Future<Output = Result<IntrospectionResponse, BoxError>> + Send + 'static,
{
    service_fn(f)
}
