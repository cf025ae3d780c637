//! Service configuration from `OAUTHZ_*` environment variables

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use oauthz_bridge::handlers::OAuthClientConfig;
use oauthz_bridge::{BridgeError, ProviderKind};
use oauthz_core::{ContainerId, PolicyConfig, DEFAULT_IDENTITY_ATTRIBUTE};
use thiserror::Error;

const PREFIX: &str = "OAUTHZ_";

const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8083";
const DEFAULT_BEARER_LIFETIME: u64 = 30;
const DEFAULT_MAX_OBJECT_SIZE: u64 = 200 << 20;
const DEFAULT_MAX_OBJECT_LIFETIME: Duration = Duration::from_secs(4 * 24 * 3600);
const DEFAULT_MS_PER_EPOCH: u64 = 3_600_000;
const DEFAULT_COOKIE_NAME: &str = "Bearer";
const DEFAULT_REDIRECT_URL: &str = "http://localhost:8083/";
const DEFAULT_SIGNING_KEY_ID: &str = "oauthz";
const DEFAULT_STATE_TTL: Duration = Duration::from_secs(10 * 60);
const DEFAULT_PROMETHEUS_ADDRESS: &str = "127.0.0.1:8084";

/// Errors raised while reading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(String),

    #[error("{key}: invalid value '{value}': {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Provider(#[from] BridgeError),
}

/// One configured identity provider
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub name: String,
    pub kind: ProviderKind,
    pub client: OAuthClientConfig,
}

/// Certificate chain and private key, both PEM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub certificate: PathBuf,
    pub key: PathBuf,
}

/// Full service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_address: SocketAddr,
    pub tls: Option<TlsFiles>,

    pub container_id: String,
    pub identity_attribute: String,
    pub user_id: Option<String>,
    pub bearer_lifetime: u64,
    pub max_object_size: u64,
    pub max_object_lifetime: Duration,
    pub ms_per_epoch: u64,

    pub cookie_name: String,
    pub redirect_url: String,

    pub signing_key_path: Option<PathBuf>,
    pub signing_key_id: String,
    pub epoch_url: Option<String>,

    /// Pending logins older than this are dropped
    pub state_ttl: Duration,

    /// Metrics listener, when enabled
    pub prometheus_address: Option<SocketAddr>,

    pub providers: Vec<ProviderSettings>,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Keys are looked up with the `OAUTHZ_` prefix. Empty values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(&format!("{}{}", PREFIX, key))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let listen_raw = get("LISTEN_ADDRESS").unwrap_or_else(|| DEFAULT_LISTEN_ADDRESS.into());
        let listen_address: SocketAddr = listen_raw
            .parse()
            .map_err(|e: std::net::AddrParseError| invalid("LISTEN_ADDRESS", &listen_raw, e))?;

        let container_id = get("CONTAINER_ID").ok_or_else(|| missing("CONTAINER_ID"))?;

        let bearer_lifetime = match parse_number(&get, "BEARER_LIFETIME")? {
            None | Some(0) => DEFAULT_BEARER_LIFETIME,
            Some(n) => n,
        };
        let max_object_size =
            parse_number(&get, "MAX_OBJECT_SIZE")?.unwrap_or(DEFAULT_MAX_OBJECT_SIZE);
        let max_object_lifetime =
            parse_duration_key(&get, "MAX_OBJECT_LIFETIME")?.unwrap_or(DEFAULT_MAX_OBJECT_LIFETIME);

        let ms_per_epoch = parse_number(&get, "MS_PER_EPOCH")?.unwrap_or(DEFAULT_MS_PER_EPOCH);
        if ms_per_epoch == 0 {
            return Err(invalid("MS_PER_EPOCH", "0", "must be positive"));
        }

        let redirect_url = get("REDIRECT_URL").unwrap_or_else(|| DEFAULT_REDIRECT_URL.into());
        let callback_url = callback_url(&redirect_url);

        let tls = match (get("TLS_CERTIFICATE"), get("TLS_KEY")) {
            (Some(certificate), Some(key)) => Some(TlsFiles {
                certificate: PathBuf::from(certificate),
                key: PathBuf::from(key),
            }),
            (Some(_), None) => return Err(missing("TLS_KEY")),
            (None, Some(_)) => return Err(missing("TLS_CERTIFICATE")),
            (None, None) => None,
        };

        let state_ttl = parse_duration_key(&get, "STATE_TTL")?.unwrap_or(DEFAULT_STATE_TTL);
        if state_ttl.is_zero() {
            return Err(invalid("STATE_TTL", "0", "must be positive"));
        }

        let prometheus_address = if parse_flag(&get, "PROMETHEUS_ENABLED")? {
            let raw =
                get("PROMETHEUS_ADDRESS").unwrap_or_else(|| DEFAULT_PROMETHEUS_ADDRESS.into());
            let address: SocketAddr = raw.parse().map_err(|e: std::net::AddrParseError| {
                invalid("PROMETHEUS_ADDRESS", &raw, e)
            })?;
            Some(address)
        } else {
            None
        };

        let providers = match get("OAUTH_PROVIDERS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| provider_settings(&get, name, &callback_url))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            listen_address,
            tls,
            container_id,
            identity_attribute: get("BEARER_EMAIL_ATTRIBUTE")
                .unwrap_or_else(|| DEFAULT_IDENTITY_ATTRIBUTE.into()),
            user_id: get("BEARER_USER_ID"),
            bearer_lifetime,
            max_object_size,
            max_object_lifetime,
            ms_per_epoch,
            cookie_name: get("BEARER_COOKIE_NAME").unwrap_or_else(|| DEFAULT_COOKIE_NAME.into()),
            redirect_url,
            signing_key_path: get("SIGNING_KEY_PATH").map(PathBuf::from),
            signing_key_id: get("SIGNING_KEY_ID").unwrap_or_else(|| DEFAULT_SIGNING_KEY_ID.into()),
            epoch_url: get("EPOCH_URL"),
            state_ttl,
            prometheus_address,
            providers,
        })
    }

    pub fn tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Provider callback URL
    pub fn callback_url(&self) -> String {
        callback_url(&self.redirect_url)
    }

    /// Policy builder settings
    pub fn policy_config(&self) -> PolicyConfig {
        PolicyConfig::new(ContainerId::new(self.container_id.clone()))
            .with_identity_attribute(self.identity_attribute.clone())
            .with_lifetime(self.bearer_lifetime)
            .with_max_object_size(self.max_object_size)
            .with_max_object_age(self.max_object_lifetime)
            .with_ms_per_epoch(self.ms_per_epoch)
    }
}

fn callback_url(redirect_url: &str) -> String {
    format!("{}callback", redirect_url)
}

fn provider_settings<G>(
    get: &G,
    name: &str,
    callback_url: &str,
) -> Result<ProviderSettings, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let kind: ProviderKind = name.parse()?;
    let upper = name.to_uppercase();
    let key = |suffix: &str| format!("OAUTH_{}_{}", upper, suffix);

    let (default_auth, default_token) = match kind {
        ProviderKind::Google => (
            "https://accounts.google.com/o/oauth2/auth",
            "https://oauth2.googleapis.com/token",
        ),
        _ => (
            "https://github.com/login/oauth/authorize",
            "https://github.com/login/oauth/access_token",
        ),
    };

    let client_id = get(&key("ID")).ok_or_else(|| missing(&key("ID")))?;
    let client_secret = get(&key("SECRET")).ok_or_else(|| missing(&key("SECRET")))?;
    let scopes: Vec<String> = get(&key("SCOPES"))
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut client = OAuthClientConfig::new(
        client_id,
        client_secret,
        get(&key("ENDPOINT_AUTH")).unwrap_or_else(|| default_auth.into()),
        get(&key("ENDPOINT_TOKEN")).unwrap_or_else(|| default_token.into()),
        callback_url,
    )
    .with_scopes(scopes);
    if let Some(userinfo) = get(&key("ENDPOINT_USERINFO")) {
        client = client.with_userinfo_url(userinfo);
    }

    Ok(ProviderSettings {
        name: name.to_lowercase(),
        kind,
        client,
    })
}

fn parse_number<G>(get: &G, key: &str) -> Result<Option<u64>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| raw.parse::<u64>().map_err(|e| invalid(key, &raw, e)))
        .transpose()
}

fn parse_duration_key<G>(get: &G, key: &str) -> Result<Option<Duration>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| parse_duration(&raw).map_err(|reason| invalid(key, &raw, reason)))
        .transpose()
}

fn parse_flag<G>(get: &G, key: &str) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|raw| raw.to_lowercase()) {
        None => Ok(false),
        Some(raw) => match raw.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(invalid(key, &raw, "expected a boolean")),
        },
    }
}

fn missing(key: &str) -> ConfigError {
    ConfigError::Missing(format!("{}{}", PREFIX, key))
}

fn invalid(key: &str, value: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        key: format!("{}{}", PREFIX, key),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse a duration such as `96h`, `4d`, `1h30m`, `45s` or `1500ms`
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("empty duration".into());
    }

    let mut total = Duration::ZERO;
    let mut rest = raw;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(format!("expected a number at '{}'", rest));
        }
        let value: u64 = rest[..digits].parse().map_err(|e| format!("{}", e))?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let millis_per_unit: u64 = match unit {
            "ms" => 1,
            "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            "d" => 86_400_000,
            "" => return Err(format!("missing unit after {}", value)),
            other => return Err(format!("unknown unit '{}'", other)),
        };

        let millis = value
            .checked_mul(millis_per_unit)
            .ok_or_else(|| "duration overflows".to_string())?;
        total = total
            .checked_add(Duration::from_millis(millis))
            .ok_or_else(|| "duration overflows".to_string())?;
    }

    Ok(total)
}
