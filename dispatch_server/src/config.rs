use std::{env, io::Write, str::FromStr, time::Duration};

use dispatch_common::{parse_boolean_flag, parse_positive_number, Secret};
use dispatch_engine::{sqlite::db::db_url, LockConfig, SearchConfig};
use log::*;
use rand::{thread_rng, RngCore};
use tempfile::NamedTempFile;

use crate::errors::ServerError;

const DEFAULT_VDS_HOST: &str = "127.0.0.1";
const DEFAULT_VDS_PORT: u16 = 8370;
const DEFAULT_VDS_WS_PORT: u16 = 8371;
const DEFAULT_OFFER_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Shorter HMAC keys are rejected.
pub const MIN_AUTH_SECRET_LENGTH: usize = 32;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    /// Port for the HTTP administration and ingestion API.
    pub port: u16,
    /// Port for the real-time WebSocket channel.
    pub ws_port: u16,
    pub database_url: String,
    /// The shared lock store. `None` selects the in-process store, which is only safe with a single server instance.
    pub redis_url: Option<Secret<String>>,
    pub lock: LockConfig,
    pub search: SearchConfig,
    /// Pending offers older than this are expired by the background sweep.
    pub offer_timeout: Duration,
    pub expiry_sweep_interval: Duration,
    pub auth: AuthConfig,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address in the access log, rather
    /// than the connection's remote address.
    pub use_x_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_VDS_HOST.to_string(),
            port: DEFAULT_VDS_PORT,
            ws_port: DEFAULT_VDS_WS_PORT,
            database_url: String::default(),
            redis_url: None,
            lock: LockConfig::default(),
            search: SearchConfig::default(),
            offer_timeout: DEFAULT_OFFER_TIMEOUT,
            expiry_sweep_interval: DEFAULT_EXPIRY_SWEEP_INTERVAL,
            auth: AuthConfig::default(),
            use_x_forwarded_for: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("VDS_HOST").ok().unwrap_or_else(|| DEFAULT_VDS_HOST.into());
        let port = env_port("VDS_PORT", DEFAULT_VDS_PORT);
        let ws_port = env_port("VDS_WS_PORT", DEFAULT_VDS_WS_PORT);
        let database_url = db_url();
        let redis_url = env::var("VDS_REDIS_URL").ok().filter(|s| !s.trim().is_empty()).map(Secret::new);
        let lock = LockConfig {
            ttl: env_seconds("VDS_LOCK_TTL", LockConfig::default().ttl),
            prefix: env::var("VDS_LOCK_PREFIX")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| LockConfig::default().prefix),
        };
        let search = SearchConfig {
            radius_km: env_positive("VDS_SEARCH_RADIUS_KM", SearchConfig::default().radius_km),
            max_candidates: env_positive("VDS_MAX_CANDIDATES", SearchConfig::default().max_candidates),
        };
        let offer_timeout = env_seconds("VDS_OFFER_TIMEOUT", DEFAULT_OFFER_TIMEOUT);
        let expiry_sweep_interval = env_seconds("VDS_EXPIRY_SWEEP_INTERVAL", DEFAULT_EXPIRY_SWEEP_INTERVAL);
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("VDS_USE_X_FORWARDED_FOR").ok(), false);
        Self {
            host,
            port,
            ws_port,
            database_url,
            redis_url,
            lock,
            search,
            offer_timeout,
            expiry_sweep_interval,
            auth,
            use_x_forwarded_for,
        }
    }
}

fn env_port(name: &str, default: u16) -> u16 {
    env::var(name)
        .map(|s| {
            s.parse::<u16>().unwrap_or_else(|e| {
                error!("🪛️ {s} is not a valid port for {name}. {e} Using the default, {default}, instead.");
                default
            })
        })
        .ok()
        .unwrap_or(default)
}

fn env_positive<T>(name: &str, default: T) -> T
where T: FromStr + PartialOrd + Default + Copy + std::fmt::Display {
    match env::var(name) {
        Ok(s) => parse_positive_number::<T>(&s).unwrap_or_else(|| {
            warn!("🪛️ Invalid configuration value for {name}: {s}. Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            info!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

fn env_seconds(name: &str, default: Duration) -> Duration {
    Duration::from_secs(env_positive(name, default.as_secs()))
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HMAC-SHA256 key that bearer tokens are signed with. Tokens are minted by the identity service, which shares
    /// this key.
    pub token_secret: Secret<Vec<u8>>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The token signing secret has not been set. I'm using a random value for this session. DO NOT \
             operate on production like this since no externally issued token will be accepted. 🚨️🚨️🚨️"
        );
        let mut secret = vec![0u8; 48];
        thread_rng().fill_bytes(&mut secret);
        let encoded = base64::encode_config(&secret, base64::URL_SAFE_NO_PAD);
        match NamedTempFile::new().ok().and_then(|f| f.keep().ok()) {
            Some((mut f, p)) => match writeln!(f, "{encoded}") {
                Ok(()) => warn!(
                    "🚨️🚨️🚨️ The token signing secret for this session was written to {}. If this is a production \
                     instance, you are doing it wrong! Set the VDS_AUTH_SECRET environment variable instead. 🚨️🚨️🚨️",
                    p.to_str().unwrap_or("???")
                ),
                Err(e) => warn!("🪛️ Could not write the token signing secret to the temporary file. {e}"),
            },
            None => warn!("🪛️ Could not create a temporary file to store the token signing secret."),
        }
        Self { token_secret: Secret::new(encoded.into_bytes()) }
    }
}

impl AuthConfig {
    pub fn new<S: Into<String>>(secret: S) -> Result<Self, ServerError> {
        let secret = secret.into();
        if secret.trim().len() < MIN_AUTH_SECRET_LENGTH {
            return Err(ServerError::ConfigurationError(format!(
                "The token secret must be at least {MIN_AUTH_SECRET_LENGTH} characters long"
            )));
        }
        Ok(Self { token_secret: Secret::new(secret.trim().as_bytes().to_vec()) })
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("VDS_AUTH_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [VDS_AUTH_SECRET]")))?;
        Self::new(secret)
    }
}
