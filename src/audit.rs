//! Audit entries and the sinks that receive them.
//!
//! The gate emits entries at fixed checkpoints: three on the success path and one on every denial. Sinks are
//! best-effort; an [`AuditError`] is logged by the gate and otherwise ignored.

use {
    crate::{config::AuditConfig, constants::*, AuditError},
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    log::info,
    serde::Serialize,
    std::{
        fmt::{Display, Formatter, Result as FmtResult},
        fs::{File, OpenOptions},
        io::{BufWriter, Write},
        path::Path,
        sync::{
            atomic::{AtomicU64, Ordering},
            Arc, Mutex,
        },
    },
};

/// Distinguishes entries created in the same nanosecond.
static ENTRY_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// What an audit entry records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditCategory {
    /// The `Authorization` header issued to the caller.
    IssuedAuthorization,

    /// The `data` object of the inbound request.
    RequestPayload,

    /// The body returned by the introspection endpoint.
    IntrospectionResponse,

    /// The reason a request was denied.
    Error,
}

impl AuditCategory {
    /// The stable label of this category.
    pub fn label(&self) -> &'static str {
        match self {
            Self::IssuedAuthorization => "issued-authorization",
            Self::RequestPayload => "request-payload",
            Self::IntrospectionResponse => "introspection-response",
            Self::Error => "error",
        }
    }

    fn data_prefix(&self) -> &'static str {
        match self {
            Self::IssuedAuthorization => AUDIT_PREFIX_ISSUED_AUTHORIZATION,
            Self::RequestPayload => AUDIT_PREFIX_REQUEST_PAYLOAD,
            Self::IntrospectionResponse => AUDIT_PREFIX_INTROSPECTION,
            Self::Error => AUDIT_PREFIX_ERROR,
        }
    }
}

impl Display for AuditCategory {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.write_str(self.label())
    }
}

/// A single audit log entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    /// Free-text payload, prefixed with what it records (e.g. `authorization: ...`).
    pub data: String,

    /// Unique id of the entry: `{source}-{category}-{unix nanos}-{sequence}`.
    pub id: String,

    /// The audit log the entry is destined for, when one is configured.
    #[serde(rename = "logId", skip_serializing_if = "Option::is_none")]
    pub log_id: Option<String>,

    /// Source label from the configuration.
    pub source: String,

    /// Type label from the configuration.
    #[serde(rename = "type")]
    pub entry_type: String,

    /// What the entry records. Not part of the sink interface; kept for filtering.
    #[serde(skip)]
    pub category: AuditCategory,
}

impl AuditEntry {
    /// Create an entry recording `payload` at `timestamp`.
    pub fn new(category: AuditCategory, payload: &str, config: &AuditConfig, timestamp: DateTime<Utc>) -> Self {
        let nanos = timestamp.timestamp_nanos_opt().unwrap_or_else(|| timestamp.timestamp_micros() * 1000);
        let sequence = ENTRY_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self {
            data: format!("{}{}", category.data_prefix(), payload),
            id: format!("{}-{}-{}-{}", config.source(), category.label(), nanos, sequence),
            log_id: config.log_id().map(str::to_string),
            source: config.source().to_string(),
            entry_type: config.entry_type().to_string(),
            category,
        }
    }
}

/// Destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record an entry. Failures are reported but never retried.
    async fn emit(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

#[async_trait]
impl<T: AuditSink + ?Sized> AuditSink for Arc<T> {
    async fn emit(&self, entry: AuditEntry) -> Result<(), AuditError> {
        (**self).emit(entry).await
    }
}

/// Audit sink that writes each entry as a JSON line through the `log` facade, with target `audit`.
///
/// The configured log id travels inside the line as `logId`, so the log shipper can route it.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn emit(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let json = serde_json::to_string(&entry).map_err(|e| AuditError::Sink(e.to_string()))?;
        info!(target: "audit", "{}", json);
        Ok(())
    }
}

/// Audit sink that appends JSON lines to a file.
///
/// Writes are small, so a blocking write under a mutex is acceptable.
#[derive(Debug)]
pub struct JsonlAuditSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonlAuditSink {
    /// Open (or create) the audit file in append mode.
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn emit(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let json = serde_json::to_string(&entry).map_err(|e| AuditError::Sink(e.to_string()))?;
        let mut writer = self.writer.lock().map_err(|_| AuditError::Sink("audit writer poisoned".to_string()))?;
        writeln!(writer, "{}", json).map_err(|e| AuditError::Sink(e.to_string()))?;
        writer.flush().map_err(|e| AuditError::Sink(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{AuditCategory, AuditEntry, AuditSink, JsonlAuditSink, LogAuditSink},
        crate::AuditConfig,
        chrono::{DateTime, NaiveDate, Utc},
        std::{collections::HashSet, fs},
    };

    fn timestamp() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_nano_opt(0, 0, 1, 5).unwrap().and_utc()
    }

    #[test_log::test]
    fn test_entry_shape() {
        let config = AuditConfig::builder().source("bridge").entry_type("auth").build().unwrap();
        let entry = AuditEntry::new(AuditCategory::IssuedAuthorization, "Signature ...", &config, timestamp());
        assert_eq!(entry.data, "authorization: Signature ...");
        assert!(entry.id.starts_with("bridge-issued-authorization-1704067201000000005-"));
        assert_eq!(entry.source, "bridge");
        assert_eq!(entry.entry_type, "auth");
        assert_eq!(entry.log_id, None);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "data": "authorization: Signature ...",
                "id": entry.id,
                "source": "bridge",
                "type": "auth",
            })
        );

        let config = AuditConfig::default();
        let entry = AuditEntry::new(AuditCategory::RequestPayload, "{}", &config, timestamp());
        assert_eq!(entry.data, "request payload: {}");
        assert_eq!(AuditEntry::new(AuditCategory::IntrospectionResponse, "x", &config, timestamp()).data, "access: x");
        assert_eq!(AuditEntry::new(AuditCategory::Error, "boom", &config, timestamp()).data, "error: boom");
        assert_eq!(AuditCategory::Error.to_string(), "error");
    }

    #[test_log::test]
    fn test_entry_carries_log_id() {
        let config = AuditConfig::builder().log_id("ocid1.log.oc1.iad.example").build().unwrap();
        let entry = AuditEntry::new(AuditCategory::Error, "boom", &config, timestamp());
        assert_eq!(entry.log_id.as_deref(), Some("ocid1.log.oc1.iad.example"));

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["logId"], "ocid1.log.oc1.iad.example");
    }

    #[test_log::test]
    fn test_ids_unique_for_same_instant() {
        let config = AuditConfig::default();
        let ids: HashSet<String> =
            (0..100).map(|_| AuditEntry::new(AuditCategory::Error, "boom", &config, timestamp()).id).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test_log::test(tokio::test)]
    async fn test_log_sink() {
        let entry = AuditEntry::new(AuditCategory::Error, "boom", &AuditConfig::default(), timestamp());
        LogAuditSink.emit(entry).await.unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn test_jsonl_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let sink = JsonlAuditSink::open(&path).unwrap();
        let config = AuditConfig::builder().log_id("audit-log").build().unwrap();
        sink.emit(AuditEntry::new(AuditCategory::RequestPayload, "{\"token\":\"t\"}", &config, timestamp()))
            .await
            .unwrap();
        sink.emit(AuditEntry::new(AuditCategory::Error, "boom", &config, timestamp())).await.unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["data"], "request payload: {\"token\":\"t\"}");
        assert_eq!(first["type"], "auth");
        assert_eq!(first["logId"], "audit-log");
    }
}
