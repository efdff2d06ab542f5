//! Startup configuration.
//!
//! A deployment supplies three sources:
//! * an options JSON file with the introspection client (`BaseUrl`, `ClientId`, `ClientSecret`, and optionally
//!   `TimeoutSeconds`, `AuditLogId`, `AuditSource`, `AuditType`);
//! * an OCI-style config file whose selected profile names the signing identity (`tenancy`, `user`,
//!   `fingerprint`, `key_file`);
//! * application settings `streaming_host` and `oci_region`, which the function runtime exposes as environment
//!   variables.
//!
//! Everything is validated once, before any request is served. [`ServiceConfig`] is immutable afterwards.

use {
    crate::{
        canonical::{validate_oci_region, validate_streaming_host},
        constants::*,
        signing_key::{KeyId, SigningIdentity},
        ConfigError,
    },
    derive_builder::Builder,
    log::{debug, info},
    serde::Deserialize,
    std::{
        collections::HashMap,
        env,
        fmt::{Debug, Formatter, Result as FmtResult},
        fs::read_to_string,
        path::{Path, PathBuf},
        time::Duration,
    },
};

/// Settings for the OAuth2 introspection client.
#[derive(Builder, Clone)]
pub struct IntrospectionConfig {
    /// Base URL of the authorization server, e.g. `https://idcs-1234.identity.oraclecloud.com`.
    #[builder(setter(into))]
    base_url: String,

    /// OAuth2 client id.
    #[builder(setter(into))]
    client_id: String,

    /// OAuth2 client secret.
    #[builder(setter(into))]
    client_secret: String,

    /// Upper bound on the duration of one introspection call.
    #[builder(default = "Duration::from_secs(DEFAULT_INTROSPECTION_TIMEOUT_SECS)")]
    timeout: Duration,
}

impl IntrospectionConfig {
    /// Create a [IntrospectionConfigBuilder] to construct a [IntrospectionConfig].
    #[inline]
    pub fn builder() -> IntrospectionConfigBuilder {
        IntrospectionConfigBuilder::default()
    }

    /// Base URL of the authorization server.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// OAuth2 client id.
    #[inline]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// OAuth2 client secret.
    #[inline]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Upper bound on the duration of one introspection call.
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Debug for IntrospectionConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("IntrospectionConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Labels attached to every audit entry.
#[derive(Builder, Clone, Debug, PartialEq, Eq)]
pub struct AuditConfig {
    /// Identifier of the destination log, if the sink needs one.
    #[builder(setter(into, strip_option), default)]
    log_id: Option<String>,

    /// Source label.
    #[builder(setter(into), default = "DEFAULT_AUDIT_SOURCE.to_string()")]
    source: String,

    /// Type label.
    #[builder(setter(into), default = "DEFAULT_AUDIT_TYPE.to_string()")]
    entry_type: String,
}

impl AuditConfig {
    /// Create a [AuditConfigBuilder] to construct a [AuditConfig].
    #[inline]
    pub fn builder() -> AuditConfigBuilder {
        AuditConfigBuilder::default()
    }

    /// Identifier of the destination log.
    #[inline]
    pub fn log_id(&self) -> Option<&str> {
        self.log_id.as_deref()
    }

    /// Source label.
    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Type label.
    #[inline]
    pub fn entry_type(&self) -> &str {
        &self.entry_type
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_id: None,
            source: DEFAULT_AUDIT_SOURCE.to_string(),
            entry_type: DEFAULT_AUDIT_TYPE.to_string(),
        }
    }
}

/// Everything the gate needs besides the private key itself.
#[derive(Builder, Clone, Debug)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct ServiceConfig {
    /// The stream whose `groupCursors` endpoint is signed for.
    #[builder(setter(into))]
    streaming_host: String,

    /// The region of the streaming endpoint.
    #[builder(setter(into))]
    oci_region: String,

    /// Tenancy OCID of the signing identity.
    #[builder(setter(into))]
    tenancy: String,

    /// User OCID of the signing identity.
    #[builder(setter(into))]
    user: String,

    /// Fingerprint of the signing key.
    #[builder(setter(into))]
    fingerprint: String,

    /// Path to the PEM-encoded private key.
    #[builder(setter(into, strip_option), default)]
    key_file: Option<PathBuf>,

    /// Introspection client settings.
    introspection: IntrospectionConfig,

    /// Audit entry labels.
    #[builder(default)]
    audit: AuditConfig,
}

impl ServiceConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(streaming_host) = &self.streaming_host {
            validate_streaming_host(streaming_host).map_err(|e| e.to_string())?;
        }

        if let Some(oci_region) = &self.oci_region {
            validate_oci_region(oci_region).map_err(|e| e.to_string())?;
        }

        if let (Some(tenancy), Some(user), Some(fingerprint)) = (&self.tenancy, &self.user, &self.fingerprint) {
            KeyId::new(tenancy.as_str(), user.as_str(), fingerprint.as_str()).map_err(|e| e.to_string())?;
        }

        Ok(())
    }
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OptionsFile {
    base_url: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    timeout_seconds: Option<u64>,
    audit_log_id: Option<String>,
    audit_source: Option<String>,
    audit_type: Option<String>,
}

impl ServiceConfig {
    /// Create a [ServiceConfigBuilder] to construct a [ServiceConfig].
    #[inline]
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Assemble the configuration from the contents of the options file, the contents of the OCI config file, and
    /// an application-setting lookup (usually the process environment).
    pub fn from_sources<F>(options_json: &str, oci_config: &str, profile: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let options: OptionsFile = serde_json::from_str(options_json)?;
        let mut oci = parse_oci_config(oci_config, profile)?;

        let setting = |name: &'static str| -> Result<String, ConfigError> {
            lookup(name).or_else(|| lookup(&name.to_uppercase())).ok_or(ConfigError::MissingField(name))
        };
        let mut oci_setting = |name: &'static str| -> Result<String, ConfigError> {
            oci.remove(name).ok_or(ConfigError::MissingField(name))
        };

        let tenancy = oci_setting("tenancy")?;
        let user = oci_setting("user")?;
        let fingerprint = oci_setting("fingerprint")?;
        let key_file = oci_setting("key_file").ok().map(|path| expand_home(&path, lookup("HOME")));

        let mut introspection = IntrospectionConfig::builder();
        introspection
            .base_url(options.base_url.ok_or(ConfigError::MissingField("BaseUrl"))?)
            .client_id(options.client_id.ok_or(ConfigError::MissingField("ClientId"))?)
            .client_secret(options.client_secret.ok_or(ConfigError::MissingField("ClientSecret"))?);
        match options.timeout_seconds {
            Some(0) => return Err(ConfigError::InvalidSetting("TimeoutSeconds", "must be at least 1".to_string())),
            Some(seconds) => {
                introspection.timeout(Duration::from_secs(seconds));
            }
            None => (),
        }

        let mut audit = AuditConfig::builder();
        if let Some(log_id) = options.audit_log_id {
            audit.log_id(log_id);
        }
        if let Some(source) = options.audit_source {
            audit.source(source);
        }
        if let Some(entry_type) = options.audit_type {
            audit.entry_type(entry_type);
        }

        let mut builder = ServiceConfig::builder();
        builder
            .streaming_host(setting("streaming_host")?)
            .oci_region(setting("oci_region")?)
            .tenancy(tenancy)
            .user(user)
            .fingerprint(fingerprint)
            .introspection(introspection.build().map_err(|e| ConfigError::InvalidIdentity(e.to_string()))?)
            .audit(audit.build().map_err(|e| ConfigError::InvalidIdentity(e.to_string()))?);
        if let Some(key_file) = key_file {
            builder.key_file(key_file);
        }

        let config = builder.build().map_err(|e| ConfigError::InvalidIdentity(e.to_string()))?;
        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Read the options file and the OCI config file from disk and take application settings from the process
    /// environment.
    pub fn load<P1, P2>(options_path: P1, oci_config_path: P2, profile: Option<&str>) -> Result<Self, ConfigError>
    where
        P1: AsRef<Path>,
        P2: AsRef<Path>,
    {
        let options_json = read_to_string(options_path.as_ref())?;
        let oci_config = read_to_string(oci_config_path.as_ref())?;
        let profile = profile.unwrap_or(DEFAULT_OCI_PROFILE);
        info!("Loading configuration profile [{}] from {}", profile, oci_config_path.as_ref().display());
        Self::from_sources(&options_json, &oci_config, profile, |name| env::var(name).ok())
    }

    /// The stream whose `groupCursors` endpoint is signed for.
    #[inline]
    pub fn streaming_host(&self) -> &str {
        &self.streaming_host
    }

    /// The region of the streaming endpoint.
    #[inline]
    pub fn oci_region(&self) -> &str {
        &self.oci_region
    }

    /// Tenancy OCID of the signing identity.
    #[inline]
    pub fn tenancy(&self) -> &str {
        &self.tenancy
    }

    /// User OCID of the signing identity.
    #[inline]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Fingerprint of the signing key.
    #[inline]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Path to the PEM-encoded private key, if configured.
    #[inline]
    pub fn key_file(&self) -> Option<&Path> {
        self.key_file.as_deref()
    }

    /// Introspection client settings.
    #[inline]
    pub fn introspection(&self) -> &IntrospectionConfig {
        &self.introspection
    }

    /// Audit entry labels.
    #[inline]
    pub fn audit(&self) -> &AuditConfig {
        &self.audit
    }

    /// The key id of the signing identity.
    pub fn key_id(&self) -> Result<KeyId, ConfigError> {
        Ok(KeyId::new(self.tenancy.as_str(), self.user.as_str(), self.fingerprint.as_str())?)
    }

    /// Load the signing identity from the configured key file.
    ///
    /// This is the only place the private key is read; call it once at startup.
    pub fn load_signing_identity(&self) -> Result<SigningIdentity, ConfigError> {
        let key_file = self.key_file.as_ref().ok_or(ConfigError::MissingField("key_file"))?;
        Ok(SigningIdentity::from_pem_file(self.key_id()?, key_file)?)
    }
}

/// Parse an OCI-style config file and return the settings of `profile`.
///
/// Profiles other than `DEFAULT` inherit unset keys from `DEFAULT`. Blank lines and lines starting with `#` or `;`
/// are ignored.
pub(crate) fn parse_oci_config(text: &str, profile: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut profiles: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_string();
            profiles.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        if let Some(name) = &current {
            profiles.entry(name.clone()).or_default().insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    let mut result = profiles.get(DEFAULT_OCI_PROFILE).cloned().unwrap_or_default();
    match profiles.remove(profile) {
        Some(settings) => result.extend(settings),
        None => return Err(ConfigError::MissingProfile(profile.to_string())),
    }

    Ok(result)
}

fn expand_home(path: &str, home: Option<String>) -> PathBuf {
    match (path.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => Path::new(&home).join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{parse_oci_config, ServiceConfig},
        crate::ConfigError,
        std::{collections::HashMap, path::Path, time::Duration},
    };

    const OPTIONS: &str = r#"{
        "BaseUrl": "https://idcs-1234.identity.oraclecloud.com",
        "ClientId": "client",
        "ClientSecret": "s3cret"
    }"#;

    const OCI_CONFIG: &str = "
[DEFAULT]
user=ocid1.user.oc1..aaaaaaaexampleuser
fingerprint=20:3b:97:13:55:1c:5b:0d:d3:37:d8:50:4e:c5:3a:34
tenancy=ocid1.tenancy.oc1..aaaaaaaexampletenancy
region=us-ashburn-1
key_file=~/.oci/oci_api_key.pem

# A second identity sharing the tenancy.
[STREAMING]
user = ocid1.user.oc1..aaaaaaaotheruser
key_file = /etc/bridge/key.pem
";

    fn env(settings: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = settings.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test_log::test]
    fn test_parse_oci_config_profiles() {
        let default = parse_oci_config(OCI_CONFIG, "DEFAULT").unwrap();
        assert_eq!(default["user"], "ocid1.user.oc1..aaaaaaaexampleuser");
        assert_eq!(default["region"], "us-ashburn-1");

        let streaming = parse_oci_config(OCI_CONFIG, "STREAMING").unwrap();
        assert_eq!(streaming["user"], "ocid1.user.oc1..aaaaaaaotheruser");
        assert_eq!(streaming["tenancy"], "ocid1.tenancy.oc1..aaaaaaaexampletenancy");
        assert_eq!(streaming["key_file"], "/etc/bridge/key.pem");

        let e = parse_oci_config(OCI_CONFIG, "MISSING").unwrap_err();
        assert!(matches!(e, ConfigError::MissingProfile(ref p) if p == "MISSING"));
    }

    #[test_log::test]
    fn test_from_sources() {
        let lookup = env(&[
            ("streaming_host", "ocid1.stream.oc1.iad.example"),
            ("oci_region", "us-ashburn-1"),
            ("HOME", "/home/fn"),
        ]);
        let config = ServiceConfig::from_sources(OPTIONS, OCI_CONFIG, "DEFAULT", lookup).unwrap();

        assert_eq!(config.streaming_host(), "ocid1.stream.oc1.iad.example");
        assert_eq!(config.oci_region(), "us-ashburn-1");
        assert_eq!(config.tenancy(), "ocid1.tenancy.oc1..aaaaaaaexampletenancy");
        assert_eq!(config.user(), "ocid1.user.oc1..aaaaaaaexampleuser");
        assert_eq!(config.fingerprint(), "20:3b:97:13:55:1c:5b:0d:d3:37:d8:50:4e:c5:3a:34");
        assert_eq!(config.key_file(), Some(Path::new("/home/fn/.oci/oci_api_key.pem")));
        assert_eq!(config.introspection().base_url(), "https://idcs-1234.identity.oraclecloud.com");
        assert_eq!(config.introspection().client_id(), "client");
        assert_eq!(config.introspection().client_secret(), "s3cret");
        assert_eq!(config.introspection().timeout(), Duration::from_secs(5));
        assert_eq!(config.audit().source(), "streaming-auth-bridge");
        assert_eq!(config.audit().entry_type(), "auth");
        assert_eq!(config.audit().log_id(), None);
        assert_eq!(
            config.key_id().unwrap().to_string(),
            "ocid1.tenancy.oc1..aaaaaaaexampletenancy/ocid1.user.oc1..aaaaaaaexampleuser/\
             20:3b:97:13:55:1c:5b:0d:d3:37:d8:50:4e:c5:3a:34"
        );

        // The secret never appears in debug output.
        assert!(!format!("{:?}", config).contains("s3cret"));
    }

    #[test_log::test]
    fn test_from_sources_overrides() {
        let options = r#"{
            "BaseUrl": "https://idcs.example.com",
            "ClientId": "client",
            "ClientSecret": "s3cret",
            "TimeoutSeconds": 2,
            "AuditLogId": "ocid1.log.oc1.iad.example",
            "AuditSource": "bridge-test",
            "AuditType": "test"
        }"#;
        let lookup = env(&[("STREAMING_HOST", "stream1"), ("OCI_REGION", "sa-saopaulo-1")]);
        let config = ServiceConfig::from_sources(options, OCI_CONFIG, "STREAMING", lookup).unwrap();
        assert_eq!(config.streaming_host(), "stream1");
        assert_eq!(config.user(), "ocid1.user.oc1..aaaaaaaotheruser");
        assert_eq!(config.key_file(), Some(Path::new("/etc/bridge/key.pem")));
        assert_eq!(config.introspection().timeout(), Duration::from_secs(2));
        assert_eq!(config.audit().log_id(), Some("ocid1.log.oc1.iad.example"));
        assert_eq!(config.audit().source(), "bridge-test");
        assert_eq!(config.audit().entry_type(), "test");
    }

    #[test_log::test]
    fn test_from_sources_errors() {
        let lookup = env(&[("oci_region", "us-ashburn-1")]);
        let e = ServiceConfig::from_sources(OPTIONS, OCI_CONFIG, "DEFAULT", lookup).unwrap_err();
        assert!(matches!(e, ConfigError::MissingField("streaming_host")));

        let lookup = env(&[("streaming_host", "stream1"), ("oci_region", "us-ashburn-1")]);
        let e = ServiceConfig::from_sources(r#"{"BaseUrl": "x", "ClientId": "y"}"#, OCI_CONFIG, "DEFAULT", lookup)
            .unwrap_err();
        assert!(matches!(e, ConfigError::MissingField("ClientSecret")));

        let lookup = env(&[("streaming_host", "stream1"), ("oci_region", "us-ashburn-1")]);
        let e = ServiceConfig::from_sources("not json", OCI_CONFIG, "DEFAULT", lookup).unwrap_err();
        assert!(matches!(e, ConfigError::Json(_)));

        let lookup = env(&[("streaming_host", "stream1\nhost: evil"), ("oci_region", "us-ashburn-1")]);
        let e = ServiceConfig::from_sources(OPTIONS, OCI_CONFIG, "DEFAULT", lookup).unwrap_err();
        assert!(matches!(e, ConfigError::InvalidIdentity(_)));

        let zero_timeout = r#"{"BaseUrl": "x", "ClientId": "y", "ClientSecret": "z", "TimeoutSeconds": 0}"#;
        let lookup = env(&[("streaming_host", "stream1"), ("oci_region", "us-ashburn-1")]);
        let e = ServiceConfig::from_sources(zero_timeout, OCI_CONFIG, "DEFAULT", lookup).unwrap_err();
        assert!(matches!(e, ConfigError::InvalidSetting("TimeoutSeconds", _)));
        assert_eq!(e.to_string(), "invalid configuration setting TimeoutSeconds: must be at least 1");

        let bad_identity = "[DEFAULT]\ntenancy=a/b\nuser=u\nfingerprint=f\n";
        let lookup = env(&[("streaming_host", "stream1"), ("oci_region", "us-ashburn-1")]);
        let e = ServiceConfig::from_sources(OPTIONS, bad_identity, "DEFAULT", lookup).unwrap_err();
        assert!(matches!(e, ConfigError::InvalidIdentity(_)));
    }

    #[test_log::test]
    fn test_load_signing_identity_requires_key() {
        let lookup = env(&[("streaming_host", "stream1"), ("oci_region", "us-ashburn-1")]);
        let no_key = "[DEFAULT]\ntenancy=t\nuser=u\nfingerprint=f\n";
        let config = ServiceConfig::from_sources(OPTIONS, no_key, "DEFAULT", lookup).unwrap();
        assert!(matches!(config.load_signing_identity(), Err(ConfigError::MissingField("key_file"))));

        let lookup = env(&[("streaming_host", "stream1"), ("oci_region", "us-ashburn-1")]);
        let missing_key = "[DEFAULT]\ntenancy=t\nuser=u\nfingerprint=f\nkey_file=/nonexistent/key.pem\n";
        let config = ServiceConfig::from_sources(OPTIONS, missing_key, "DEFAULT", lookup).unwrap();
        assert!(matches!(config.load_signing_identity(), Err(ConfigError::Signing(_))));
    }
}
