//! The `streaming_auth_bridge` crate is a small authorization gate between an event-streaming client and the Oracle
//! Cloud Infrastructure (OCI) streaming API. Callers present an OAuth2 bearer token; if the authorization server
//! reports the token as active, the gate answers with a freshly computed OCI `Signature` Authorization header (and
//! the `Date` it covers) that the caller can use to create a group cursor on the configured stream.
//!
//! This *is not* a general-purpose OCI request signer. Only the `POST .../groupCursors` request of a single stream
//! is ever signed, and only over the `(request-target)`, `date` and `host` pseudo-headers.
//!
//! # Workflow
//! 1. At startup, load a [`ServiceConfig`] (options file plus an OCI config profile) and build an [`AuthGate`]. The
//!    RSA private key is read once, here; a missing or unreadable key aborts startup.
//! 2. For each inbound request body of the form `{"data": {"token": "..."}}`, the gate extracts the token and
//!    introspects it against `{BaseUrl}/oauth2/v1/introspect`.
//! 3. An active token is answered with `200`, a JSON body containing the signature context, and the `Authorization`
//!    and `Date` headers. Anything else is answered with `401` and `{"active": false, "wwwAuthenticate": ...}`.
//! 4. Audit entries are emitted for the issued header, the request payload and the introspection response, or for
//!    the reason the request was denied.
//!
//! [`AuthGate`] is a [`tower::Service`] over [`http::Request`], so it can be mounted directly in any tower-based
//! HTTP server.
//!
//! ## Example
//! ```rust
//! use streaming_auth_bridge::{build_canonical_string, KeyId, SignatureHeader};
//!
//! let canonical = build_canonical_string(
//!     "Tue, 07 Jun 2022 20:51:35 GMT",
//!     "ocid1.stream.oc1.iad.amaaaaaaexample",
//!     "us-ashburn-1",
//! )
//! .unwrap();
//! assert_eq!(
//!     String::from_utf8(canonical).unwrap(),
//!     "(request-target): post /20180418/streams/ocid1.stream.oc1.iad.amaaaaaaexample/groupCursors\n\
//!      date: Tue, 07 Jun 2022 20:51:35 GMT\n\
//!      host: cell-1.streaming.us-ashburn-1.oci.oraclecloud.com"
//! );
//!
//! // Headers issued by the gate parse back into their parts.
//! let header: SignatureHeader = "Signature algorithm=\"rsa-sha256\",headers=\"(request-target) date host\",\
//!     keyId=\"ocid1.tenancy.oc1..aaaa/ocid1.user.oc1..bbbb/aa:bb:cc\",signature=\"eA==\",version=\"1\""
//!     .parse()
//!     .unwrap();
//! assert_eq!(header.key_id(), &KeyId::new("ocid1.tenancy.oc1..aaaa", "ocid1.user.oc1..bbbb", "aa:bb:cc").unwrap());
//! ```
//!
//! Running the gate itself:
//! ```rust,no_run
//! use streaming_auth_bridge::{AuthGate, ServiceConfig};
//!
//! # async fn serve() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let config = ServiceConfig::load("/etc/bridge/options.json", "/etc/bridge/oci/config", None)?;
//! let gate = AuthGate::from_config(config)?;
//!
//! let response = gate.handle(br#"{"data": {"token": "abc123"}}"#).await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![warn(rustdoc::missing_crate_level_docs)]

mod audit;
mod body;
mod canonical;
mod chronoutil;
mod config;
mod constants;
mod error;
mod gate;
mod introspect;
mod signature;
mod signing_key;

pub use crate::{
    audit::{AuditCategory, AuditEntry, AuditSink, JsonlAuditSink, LogAuditSink},
    body::IntoRequestBytes,
    canonical::{build_canonical_string, CanonicalRequestContext},
    chronoutil::{format_http_date, ParseHttpDate},
    config::{
        AuditConfig, AuditConfigBuilder, AuditConfigBuilderError, IntrospectionConfig, IntrospectionConfigBuilder,
        IntrospectionConfigBuilderError, ServiceConfig, ServiceConfigBuilder, ServiceConfigBuilderError,
    },
    error::{AuditError, ConfigError, DenialReason, ParseError, SigningError, ValidationError},
    gate::{parse_inbound_payload, AuthGate, AuthOutcome, Authorization},
    introspect::{
        basic_authorization, introspection_form_body, introspection_url, service_for_introspection_fn,
        HttpIntrospector, IntrospectionRequest, IntrospectionRequestBuilder, IntrospectionRequestBuilderError,
        IntrospectionResponse,
    },
    signature::{encode_signature_header, Signature, SignatureHeader},
    signing_key::{KeyId, RequestSigner, SigningIdentity},
};
