//! Common constants used throughout the crate.
//!
//! This was consolidated here so the canonical string, the signature header and the gate responses all agree on
//! the exact spelling of every wire value. If a value is spelled incorrectly, at least it can be fixed in one spot.
//!
//! Tests that are testing the content of a wire value or message should not use these constants; they should use
//! hard-coded strings so the tests are also testing for misspellings.
//!
//! Please keep this file organized alphabetically.

/// Prefix of the data of the `error` audit entry.
pub(crate) const AUDIT_PREFIX_ERROR: &str = "error: ";

/// Prefix of the data of the `introspection-response` audit entry.
pub(crate) const AUDIT_PREFIX_INTROSPECTION: &str = "access: ";

/// Prefix of the data of the `issued-authorization` audit entry.
pub(crate) const AUDIT_PREFIX_ISSUED_AUTHORIZATION: &str = "authorization: ";

/// Prefix of the data of the `request-payload` audit entry.
pub(crate) const AUDIT_PREFIX_REQUEST_PAYLOAD: &str = "request payload: ";

/// `Authorization` scheme used for the introspection client credentials.
pub(crate) const BASIC_AUTH_SCHEME: &str = "Basic ";

/// API version path segment of the streaming API.
pub(crate) const CANONICAL_API_VERSION: &str = "20180418";

/// Prefix of the canonical `host` value, before the region.
pub(crate) const CANONICAL_HOST_PREFIX: &str = "cell-1.streaming.";

/// Suffix of the canonical `host` value, after the region.
pub(crate) const CANONICAL_HOST_SUFFIX: &str = ".oci.oraclecloud.com";

/// Method of the signed request, lowercased as it appears in `(request-target)`.
pub(crate) const CANONICAL_METHOD: &str = "post";

/// Content-Type string for HTML forms
pub(crate) const CONTENT_TYPE_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Content-Type string for JSON bodies
pub(crate) const CONTENT_TYPE_JSON: &str = "application/json";

/// Default audit entry source.
pub(crate) const DEFAULT_AUDIT_SOURCE: &str = "streaming-auth-bridge";

/// Default audit entry type.
pub(crate) const DEFAULT_AUDIT_TYPE: &str = "auth";

/// Default timeout applied to the introspection call, in seconds.
pub(crate) const DEFAULT_INTROSPECTION_TIMEOUT_SECS: u64 = 5;

/// Default profile read from the OCI config file.
pub(crate) const DEFAULT_OCI_PROFILE: &str = "DEFAULT";

/// Denial kind: the signing chain failed.
pub(crate) const DENIAL_KIND_SIGNING_ERROR: &str = "signing-error";

/// Denial kind: the introspection call failed.
pub(crate) const DENIAL_KIND_INTROSPECTION_ERROR: &str = "introspection-error";

/// Denial kind: the token is not active.
pub(crate) const DENIAL_KIND_INACTIVE_TOKEN: &str = "inactive-token";

/// Denial kind: the inbound payload could not be parsed.
pub(crate) const DENIAL_KIND_PARSE_ERROR: &str = "parse-error";

/// Header for `date`
pub(crate) const HDR_DATE: &str = "date";

/// Format of an RFC 1123 date in the GMT time zone, e.g. `Tue, 07 Jun 2022 20:51:35 GMT`.
pub(crate) const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Path of the OAuth2 introspection endpoint, relative to the configured base URL.
pub(crate) const INTROSPECTION_PATH: &str = "/oauth2/v1/introspect";

/// Diagnostic message: the introspection call failed.
pub(crate) const MSG_INTROSPECTION_FAILED: &str = "token introspection failed";

/// Diagnostic message prefix: the inbound payload could not be parsed.
pub(crate) const MSG_PARSE_ERROR_PREFIX: &str = "error parsing json payload: ";

/// Diagnostic message: the signature could not be produced.
pub(crate) const MSG_SIGNING_FAILED: &str = "unable to sign request";

/// Signature header: algorithm parameter value.
pub(crate) const SIG_ALGORITHM_RSA_SHA256: &str = "rsa-sha256";

/// Signature header: authentication scheme.
pub(crate) const SIG_SCHEME: &str = "Signature";

/// Signature header: names of the signed headers, in signing order.
pub(crate) const SIG_SIGNED_HEADERS: &str = "(request-target) date host";

/// Signature header: version parameter value.
pub(crate) const SIG_VERSION: &str = "1";
