//! RFC 1123 (`IMF-fixdate`) date handling for the `date` signed header.
use {
    crate::constants::HTTP_DATE_FORMAT,
    chrono::{
        format::{ParseError, ParseResult},
        DateTime, NaiveDateTime, Utc,
    },
    lazy_static::lazy_static,
    regex::Regex,
};

lazy_static! {
    /// IMF-fixdate: fixed-width fields separated by single spaces.
    static ref HTTP_DATE_REGEX: Regex = Regex::new(
        r"(?x)^
        (?:Mon|Tue|Wed|Thu|Fri|Sat|Sun),\x20
        (?:0[1-9]|[12][0-9]|3[01])\x20
        (?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\x20
        [0-9]{4}\x20
        (?:[01][0-9]|2[0-3]):[0-5][0-9]:[0-5][0-9]\x20
        GMT$").unwrap();

    static ref INVALID: ParseError = NaiveDateTime::parse_from_str("", HTTP_DATE_FORMAT).unwrap_err();
}

/// Format a timestamp as an RFC 1123 date in GMT, e.g. `Tue, 07 Jun 2022 20:51:35 GMT`.
///
/// Sub-second precision is discarded.
pub fn format_http_date(timestamp: DateTime<Utc>) -> String {
    timestamp.format(HTTP_DATE_FORMAT).to_string()
}

/// Trait for parsing an RFC 1123 date in GMT.
pub trait ParseHttpDate<T> {
    /// Parse the string `s` as an RFC 1123 date. Only the `GMT` zone designator is accepted.
    ///
    /// The format is matched exactly: two-digit days, single spaces, no other whitespace.
    fn parse_from_http_date(s: &str) -> ParseResult<T>;
}

impl ParseHttpDate<DateTime<Utc>> for DateTime<Utc> {
    fn parse_from_http_date(s: &str) -> ParseResult<DateTime<Utc>> {
        if !HTTP_DATE_REGEX.is_match(s) {
            return Err(*INVALID);
        }

        let naive = NaiveDateTime::parse_from_str(s, HTTP_DATE_FORMAT)?;
        Ok(naive.and_utc())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{format_http_date, ParseHttpDate},
        chrono::{DateTime, NaiveDate, Utc},
    };

    #[test_log::test]
    fn test_format_http_date() {
        let ts =
            NaiveDate::from_ymd_opt(2022, 6, 7).unwrap().and_hms_nano_opt(20, 51, 35, 123_456_789).unwrap().and_utc();
        assert_eq!(format_http_date(ts), "Tue, 07 Jun 2022 20:51:35 GMT");

        let ts = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap().and_utc();
        assert_eq!(format_http_date(ts), "Mon, 01 Jan 2024 00:00:00 GMT");
    }

    #[test_log::test]
    fn test_parse_http_date() {
        let dt = DateTime::<Utc>::parse_from_http_date("Tue, 07 Jun 2022 20:51:35 GMT").unwrap();
        assert_eq!(format_http_date(dt), "Tue, 07 Jun 2022 20:51:35 GMT");

        assert!(DateTime::<Utc>::parse_from_http_date("2022-06-07T20:51:35Z").is_err());
        assert!(DateTime::<Utc>::parse_from_http_date("Tue, 07 Jun 2022 20:51:35 PST").is_err());
        assert!(DateTime::<Utc>::parse_from_http_date("Tue, 07 Jun 2022 20:51:35 GMT\nhost: x").is_err());
        // Weekday must agree with the date.
        assert!(DateTime::<Utc>::parse_from_http_date("Wed, 07 Jun 2022 20:51:35 GMT").is_err());
    }

    #[test_log::test]
    fn test_parse_http_date_is_exact() {
        for bad in [
            "Tue, 07 Jun 2022\n20:51:35 GMT",
            "Tue,\n07 Jun 2022 20:51:35 GMT",
            "Tue, 07 Jun 2022 20:51:35\tGMT",
            "Tue, 07 Jun 2022 20:51:35\r\nGMT",
            "Tue,  07 Jun 2022 20:51:35 GMT",
            "Tue, 07 Jun 2022  20:51:35 GMT",
            "Tue, 7 Jun 2022 20:51:35 GMT",
            "Tue, 07 Jun 2022 20:51:35 GMT ",
            " Tue, 07 Jun 2022 20:51:35 GMT",
            "Tue, 07 jun 2022 20:51:35 GMT",
            "Tue, 07 Jun 2022 20:51:35 gmt",
        ] {
            assert!(DateTime::<Utc>::parse_from_http_date(bad).is_err(), "accepted {:?}", bad);
        }

        // Single-digit days are zero padded on output, so every accepted date renders back to itself.
        let dt = DateTime::<Utc>::parse_from_http_date("Sat, 01 Jan 2000 00:00:00 GMT").unwrap();
        assert_eq!(format_http_date(dt), "Sat, 01 Jan 2000 00:00:00 GMT");
    }
}
