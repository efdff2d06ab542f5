//! Canonical string construction for RSA-SHA256 request signatures.
//!
//! The canonical string binds the request line, the `date` header and the `host` header of a streaming API
//! `groupCursors` call:
//!
//! ```text
//! (request-target): post /20180418/streams/{stream}/groupCursors
//! date: {date}
//! host: cell-1.streaming.{region}.oci.oraclecloud.com
//! ```
//!
//! Lines are separated by a bare `\n` and there is no trailing newline.

use {
    crate::{
        chronoutil::{format_http_date, ParseHttpDate},
        constants::*,
        SigningError,
    },
    chrono::{DateTime, Utc},
    lazy_static::lazy_static,
    log::trace,
    regex::Regex,
    std::fmt::{Display, Formatter, Result as FmtResult},
};

lazy_static! {
    /// A stream identifier usable as a single path segment of the request target.
    static ref STREAM_ID_REGEX: Regex = Regex::new(r"^[A-Za-z0-9._:-]+$").unwrap();

    /// A region identifier usable as a single DNS label, e.g. `us-ashburn-1`.
    static ref REGION_REGEX: Regex = Regex::new(r"^[a-z0-9](?:[a-z0-9-]*[a-z0-9])?$").unwrap();
}

/// The request-scoped values covered by a signature.
///
/// The method and path are fixed by the streaming API; only the date, the stream and the region vary. Values are
/// validated on construction, so a `CanonicalRequestContext` always renders an unambiguous canonical string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanonicalRequestContext {
    /// RFC 1123 date, e.g. `Tue, 07 Jun 2022 20:51:35 GMT`.
    date: String,

    /// The stream the cursor group belongs to.
    streaming_host: String,

    /// The region hosting the stream.
    oci_region: String,
}

impl CanonicalRequestContext {
    /// Create a new context from a preformatted date.
    ///
    /// # Errors
    /// Returns [`SigningError::InvalidCanonicalInput`] if the date is not an RFC 1123 GMT date, or if the stream or
    /// region contain characters (newlines, slashes, whitespace, ...) that would change the structure of the
    /// canonical string.
    pub fn new<S1, S2, S3>(date: S1, streaming_host: S2, oci_region: S3) -> Result<Self, SigningError>
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        let date = date.into();
        let streaming_host = streaming_host.into();
        let oci_region = oci_region.into();

        match DateTime::<Utc>::parse_from_http_date(&date) {
            Ok(parsed) if format_http_date(parsed) == date => (),
            _ => {
                return Err(SigningError::InvalidCanonicalInput(format!(
                    "date is not an RFC 1123 GMT date: {:?}",
                    date
                )))
            }
        }

        validate_streaming_host(&streaming_host)?;
        validate_oci_region(&oci_region)?;

        Ok(Self {
            date,
            streaming_host,
            oci_region,
        })
    }

    /// Create a new context for a request made at `timestamp`.
    pub fn at<S1, S2>(timestamp: DateTime<Utc>, streaming_host: S1, oci_region: S2) -> Result<Self, SigningError>
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self::new(format_http_date(timestamp), streaming_host, oci_region)
    }

    /// The RFC 1123 date of the request.
    #[inline]
    pub fn date(&self) -> &str {
        &self.date
    }

    /// The stream identifier.
    #[inline]
    pub fn streaming_host(&self) -> &str {
        &self.streaming_host
    }

    /// The region.
    #[inline]
    pub fn oci_region(&self) -> &str {
        &self.oci_region
    }

    /// The lowercase method of the signed request. Always `post`.
    #[inline]
    pub fn method(&self) -> &'static str {
        CANONICAL_METHOD
    }

    /// The path of the signed request.
    pub fn path(&self) -> String {
        format!("/{}/streams/{}/groupCursors", CANONICAL_API_VERSION, self.streaming_host)
    }

    /// The value of the `host` header of the signed request.
    pub fn host(&self) -> String {
        format!("{}{}{}", CANONICAL_HOST_PREFIX, self.oci_region, CANONICAL_HOST_SUFFIX)
    }

    /// Render the canonical string to sign.
    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        let path = self.path();
        let host = self.host();

        let mut result = Vec::with_capacity(
            "(request-target): ".len()
                + CANONICAL_METHOD.len()
                + 1
                + path.len()
                + 1
                + HDR_DATE.len()
                + 2
                + self.date.len()
                + 1
                + "host: ".len()
                + host.len(),
        );

        result.extend(b"(request-target): ");
        result.extend(CANONICAL_METHOD.as_bytes());
        result.push(b' ');
        result.extend(path.as_bytes());
        result.push(b'\n');
        result.extend(HDR_DATE.as_bytes());
        result.extend(b": ");
        result.extend(self.date.as_bytes());
        result.push(b'\n');
        result.extend(b"host: ");
        result.extend(host.as_bytes());

        trace!("Canonical string:\n{}", String::from_utf8_lossy(&result));
        result
    }
}

impl Display for CanonicalRequestContext {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.write_str(&String::from_utf8_lossy(&self.to_canonical_bytes()))
    }
}

/// Build the canonical string for a `groupCursors` request.
///
/// This is shorthand for [`CanonicalRequestContext::new`] followed by
/// [`to_canonical_bytes`][CanonicalRequestContext::to_canonical_bytes].
pub fn build_canonical_string(date: &str, streaming_host: &str, oci_region: &str) -> Result<Vec<u8>, SigningError> {
    Ok(CanonicalRequestContext::new(date, streaming_host, oci_region)?.to_canonical_bytes())
}

/// Verify that a stream identifier can be placed in the request target.
pub(crate) fn validate_streaming_host(streaming_host: &str) -> Result<(), SigningError> {
    if STREAM_ID_REGEX.is_match(streaming_host) {
        Ok(())
    } else {
        Err(SigningError::InvalidCanonicalInput(format!("invalid streaming host: {:?}", streaming_host)))
    }
}

/// Verify that a region can be placed in the `host` header.
pub(crate) fn validate_oci_region(oci_region: &str) -> Result<(), SigningError> {
    if REGION_REGEX.is_match(oci_region) {
        Ok(())
    } else {
        Err(SigningError::InvalidCanonicalInput(format!("invalid region: {:?}", oci_region)))
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{build_canonical_string, CanonicalRequestContext},
        crate::SigningError,
        chrono::NaiveDate,
    };

    const STREAM: &str = "ocid1.stream.oc1.iad.amaaaaaaexample";

    #[test_log::test]
    fn test_canonical_string_layout() {
        let result = build_canonical_string("Tue, 07 Jun 2022 20:51:35 GMT", STREAM, "us-ashburn-1").unwrap();
        assert_eq!(
            String::from_utf8(result).unwrap(),
            "(request-target): post /20180418/streams/ocid1.stream.oc1.iad.amaaaaaaexample/groupCursors\n\
             date: Tue, 07 Jun 2022 20:51:35 GMT\n\
             host: cell-1.streaming.us-ashburn-1.oci.oraclecloud.com"
        );
    }

    #[test_log::test]
    fn test_canonical_string_deterministic() {
        let date = "Mon, 01 Jan 2024 00:00:00 GMT";
        let first = build_canonical_string(date, STREAM, "sa-saopaulo-1").unwrap();
        for _ in 0..10 {
            assert_eq!(build_canonical_string(date, STREAM, "sa-saopaulo-1").unwrap(), first);
        }
        assert!(!first.ends_with(b"\n"));
        assert_eq!(first.iter().filter(|b| **b == b'\n').count(), 2);
    }

    #[test_log::test]
    fn test_context_at() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(12, 30, 0).unwrap().and_utc();
        let ctx = CanonicalRequestContext::at(ts, STREAM, "us-ashburn-1").unwrap();
        assert_eq!(ctx.date(), "Mon, 01 Jan 2024 12:30:00 GMT");
        assert_eq!(ctx.method(), "post");
        assert_eq!(ctx.path(), "/20180418/streams/ocid1.stream.oc1.iad.amaaaaaaexample/groupCursors");
        assert_eq!(ctx.host(), "cell-1.streaming.us-ashburn-1.oci.oraclecloud.com");
        assert_eq!(ctx.to_string().as_bytes(), ctx.to_canonical_bytes().as_slice());
    }

    #[test_log::test]
    fn test_rejects_structure_breaking_input() {
        let date = "Tue, 07 Jun 2022 20:51:35 GMT";

        // Newlines would forge additional signed headers.
        let e = build_canonical_string(date, "stream\nhost: evil.example.com", "us-ashburn-1").unwrap_err();
        assert!(matches!(e, SigningError::InvalidCanonicalInput(_)));
        let e = build_canonical_string(date, STREAM, "us-ashburn-1\nx").unwrap_err();
        assert!(matches!(e, SigningError::InvalidCanonicalInput(_)));
        let e = build_canonical_string("Tue, 07 Jun 2022 20:51:35 GMT\nhost: x", STREAM, "us-ashburn-1").unwrap_err();
        assert!(matches!(e, SigningError::InvalidCanonicalInput(_)));

        for date in [
            "Tue, 07 Jun 2022\n20:51:35 GMT",
            "Tue,\n07 Jun 2022 20:51:35 GMT",
            "Tue, 07 Jun 2022 20:51:35\tGMT",
            "Tue, 07  Jun 2022 20:51:35 GMT",
            "Tue, 7 Jun 2022 20:51:35 GMT",
        ] {
            let e = build_canonical_string(date, STREAM, "us-ashburn-1").unwrap_err();
            assert!(matches!(e, SigningError::InvalidCanonicalInput(_)), "accepted {:?}", date);
        }

        // Slashes would change the request target.
        assert!(build_canonical_string(date, "a/../b", "us-ashburn-1").is_err());
        // Dots would change the host.
        assert!(build_canonical_string(date, STREAM, "evil.example.com/x").is_err());
        assert!(build_canonical_string(date, "", "us-ashburn-1").is_err());
        assert!(build_canonical_string(date, STREAM, "").is_err());
        assert!(build_canonical_string("yesterday", STREAM, "us-ashburn-1").is_err());

        // Placeholder-looking text is treated as ordinary characters only where it cannot break structure.
        assert!(build_canonical_string(date, "<date_str>", "us-ashburn-1").is_err());
    }
}
