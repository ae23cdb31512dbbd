use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::error::AuthError;

/// Environment variable selecting the deployment environment.
pub const ENV_DEPLOYMENT: &str = "REGISTRY_AUTH_ENV";
/// Environment variable holding the session signing secret.
pub const ENV_JWT_SECRET: &str = "REGISTRY_AUTH_JWT_SECRET";
/// Environment variable overriding the session TTL in seconds.
pub const ENV_ACCESS_TTL: &str = "REGISTRY_AUTH_ACCESS_TTL";
/// Environment variable overriding the challenge TTL in seconds.
pub const ENV_CHALLENGE_TTL: &str = "REGISTRY_AUTH_CHALLENGE_TTL";
/// Environment variable overriding the failed-attempt threshold.
pub const ENV_MAX_FAILED_ATTEMPTS: &str = "REGISTRY_AUTH_MAX_FAILED_ATTEMPTS";

const DEFAULT_ACCESS_TTL_SECS: u64 = 3600;
const DEFAULT_CHALLENGE_TTL_SECS: u64 = 300;
const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;
const DEFAULT_LOCKOUT_WINDOW_SECS: u64 = 300;

/// `SameSite` attribute applied to the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSitePolicy {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSitePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            SameSitePolicy::Strict => "Strict",
            SameSitePolicy::Lax => "Lax",
            SameSitePolicy::None => "None",
        };
        f.write_str(value)
    }
}

impl FromStr for SameSitePolicy {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(SameSitePolicy::Strict),
            "lax" => Ok(SameSitePolicy::Lax),
            "none" => Ok(SameSitePolicy::None),
            other => Err(AuthError::ConfigError(format!(
                "Unknown SameSite policy: {other}"
            ))),
        }
    }
}

/// Predefined configuration presets for common deployments.
///
/// The presets differ in how strict the session cookie is; TTLs stay the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPreset {
    /// Production deployment behind HTTPS with a cross-site frontend.
    ///
    /// - Cookie: `Secure`, `SameSite=None`
    /// - Session TTL: 1 hour, challenge TTL: 5 minutes
    Production,

    /// Local development over plain HTTP.
    ///
    /// - Cookie: not `Secure`, `SameSite=Lax`
    /// - Session TTL: 1 hour, challenge TTL: 5 minutes
    Development,

    /// Load configuration from environment variables.
    ///
    /// Reads:
    /// - `REGISTRY_AUTH_ENV`: `production` selects the production cookie policy,
    ///   anything else the development one
    /// - `REGISTRY_AUTH_ACCESS_TTL`: session TTL in seconds (default: 3600)
    /// - `REGISTRY_AUTH_CHALLENGE_TTL`: challenge TTL in seconds (default: 300)
    /// - `REGISTRY_AUTH_MAX_FAILED_ATTEMPTS`: lockout threshold (default: 5)
    FromEnv,
}

/// Configuration for the authentication flow and session issuance.
///
/// The signing secret and cookie policy are explicit fields rather than
/// process globals, so every [`SessionIssuer`](crate::SessionIssuer) and
/// [`AuthFlow`](crate::AuthFlow) is built from one value.
///
/// # Example
///
/// ```rust
/// use registry_auth::{AuthConfig, ConfigPreset, SameSitePolicy};
/// use std::time::Duration;
///
/// let config = AuthConfig::new("a-very-long-server-side-signing-secret", ConfigPreset::Production);
/// assert!(config.cookie_secure);
/// assert_eq!(config.cookie_same_site, SameSitePolicy::None);
/// assert_eq!(config.access_ttl, Duration::from_secs(3600));
/// ```
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret used to sign session tokens
    pub secret: String,
    /// Lifetime of an issued session token
    pub access_ttl: Duration,
    /// Lifetime of an unconsumed login challenge
    pub challenge_ttl: Duration,
    /// Whether the session cookie carries the `Secure` attribute
    pub cookie_secure: bool,
    /// `SameSite` attribute of the session cookie
    pub cookie_same_site: SameSitePolicy,
    /// Failed signature or credential attempts tolerated per window
    pub max_failed_attempts: u32,
    /// Window over which failed attempts are counted
    pub lockout_window: Duration,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("challenge_ttl", &self.challenge_ttl)
            .field("cookie_secure", &self.cookie_secure)
            .field("cookie_same_site", &self.cookie_same_site)
            .field("max_failed_attempts", &self.max_failed_attempts)
            .field("lockout_window", &self.lockout_window)
            .finish()
    }
}

impl AuthConfig {
    /// Creates a configuration from a signing secret and a preset.
    pub fn new(secret: impl Into<String>, preset: ConfigPreset) -> Self {
        let production = match preset {
            ConfigPreset::Production => true,
            ConfigPreset::Development => false,
            ConfigPreset::FromEnv => std::env::var(ENV_DEPLOYMENT)
                .map(|v| v.eq_ignore_ascii_case("production"))
                .unwrap_or(false),
        };

        let mut config = Self {
            secret: secret.into(),
            access_ttl: Duration::from_secs(DEFAULT_ACCESS_TTL_SECS),
            challenge_ttl: Duration::from_secs(DEFAULT_CHALLENGE_TTL_SECS),
            cookie_secure: production,
            cookie_same_site: if production {
                SameSitePolicy::None
            } else {
                SameSitePolicy::Lax
            },
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            lockout_window: Duration::from_secs(DEFAULT_LOCKOUT_WINDOW_SECS),
        };

        if preset == ConfigPreset::FromEnv {
            config.access_ttl = Duration::from_secs(env_or(ENV_ACCESS_TTL, DEFAULT_ACCESS_TTL_SECS));
            config.challenge_ttl =
                Duration::from_secs(env_or(ENV_CHALLENGE_TTL, DEFAULT_CHALLENGE_TTL_SECS));
            config.max_failed_attempts =
                env_or(ENV_MAX_FAILED_ATTEMPTS, DEFAULT_MAX_FAILED_ATTEMPTS);
        }

        config
    }

    /// Loads the full configuration, secret included, from the environment.
    ///
    /// Fails with [`AuthError::ConfigError`] when `REGISTRY_AUTH_JWT_SECRET`
    /// is unset or empty.
    pub fn from_env() -> Result<Self, AuthError> {
        let secret = std::env::var(ENV_JWT_SECRET)
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::ConfigError(format!("{ENV_JWT_SECRET} is not set")))?;
        Ok(Self::new(secret, ConfigPreset::FromEnv))
    }

    /// Sets the session TTL.
    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    /// Sets the challenge TTL.
    pub fn with_challenge_ttl(mut self, ttl: Duration) -> Self {
        self.challenge_ttl = ttl;
        self
    }

    /// Sets the failed-attempt threshold and its counting window.
    pub fn with_lockout(mut self, max_failed_attempts: u32, window: Duration) -> Self {
        self.max_failed_attempts = max_failed_attempts;
        self.lockout_window = window;
        self
    }

    /// Validates the configuration and returns any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.secret.len() < 32 {
            warnings.push("Signing secret shorter than 32 bytes is easy to brute force".to_string());
        }

        if self.cookie_same_site == SameSitePolicy::None && !self.cookie_secure {
            warnings.push(
                "SameSite=None without Secure is rejected by browsers".to_string(),
            );
        }

        if self.access_ttl.as_secs() > 24 * 3600 {
            warnings.push("Long session TTL (> 24 hours) extends stolen-token exposure".to_string());
        }

        if self.challenge_ttl.as_secs() < 30 {
            warnings.push(
                "Very short challenge TTL (< 30 seconds) leaves little time to sign".to_string(),
            );
        }
        if self.challenge_ttl.as_secs() > 3600 {
            warnings.push("Long challenge TTL (> 1 hour) widens the guessing window".to_string());
        }

        if self.max_failed_attempts == 0 {
            warnings.push("max_failed_attempts of 0 locks out every identity".to_string());
        }

        warnings
    }

    /// Returns a summary of the current configuration.
    pub fn summary(&self) -> String {
        format!(
            "AuthConfig {{ Access TTL: {}s, Challenge TTL: {}s, Cookie: Secure={} SameSite={}, Lockout: {} per {}s }}",
            self.access_ttl.as_secs(),
            self.challenge_ttl.as_secs(),
            self.cookie_secure,
            self.cookie_same_site,
            self.max_failed_attempts,
            self.lockout_window.as_secs(),
        )
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn clear_env_vars() {
        unsafe {
            std::env::remove_var(ENV_DEPLOYMENT);
            std::env::remove_var(ENV_JWT_SECRET);
            std::env::remove_var(ENV_ACCESS_TTL);
            std::env::remove_var(ENV_CHALLENGE_TTL);
            std::env::remove_var(ENV_MAX_FAILED_ATTEMPTS);
        }
    }

    #[test]
    fn test_production_preset() {
        let config = AuthConfig::new(SECRET, ConfigPreset::Production);
        assert!(config.cookie_secure);
        assert_eq!(config.cookie_same_site, SameSitePolicy::None);
        assert_eq!(config.access_ttl.as_secs(), 3600);
        assert_eq!(config.challenge_ttl.as_secs(), 300);
    }

    #[test]
    fn test_development_preset() {
        let config = AuthConfig::new(SECRET, ConfigPreset::Development);
        assert!(!config.cookie_secure);
        assert_eq!(config.cookie_same_site, SameSitePolicy::Lax);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        clear_env_vars();

        unsafe {
            std::env::set_var(ENV_DEPLOYMENT, "production");
            std::env::set_var(ENV_JWT_SECRET, SECRET);
            std::env::set_var(ENV_ACCESS_TTL, "900");
            std::env::set_var(ENV_CHALLENGE_TTL, "120");
            std::env::set_var(ENV_MAX_FAILED_ATTEMPTS, "3");
        }

        let config = AuthConfig::from_env().unwrap();
        assert_eq!(config.secret, SECRET);
        assert!(config.cookie_secure);
        assert_eq!(config.cookie_same_site, SameSitePolicy::None);
        assert_eq!(config.access_ttl.as_secs(), 900);
        assert_eq!(config.challenge_ttl.as_secs(), 120);
        assert_eq!(config.max_failed_attempts, 3);

        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_requires_secret() {
        clear_env_vars();
        let result = AuthConfig::from_env();
        assert!(matches!(result, Err(AuthError::ConfigError(_))));
    }

    #[test]
    #[serial]
    fn test_from_env_defaults_to_development_cookie() {
        clear_env_vars();
        unsafe {
            std::env::set_var(ENV_JWT_SECRET, SECRET);
        }

        let config = AuthConfig::from_env().unwrap();
        assert!(!config.cookie_secure);
        assert_eq!(config.cookie_same_site, SameSitePolicy::Lax);
        assert_eq!(config.access_ttl.as_secs(), 3600);

        clear_env_vars();
    }

    #[test]
    fn test_validation_valid_config() {
        let config = AuthConfig::new(SECRET, ConfigPreset::Production);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_validation_warnings() {
        let mut config = AuthConfig::new("short", ConfigPreset::Development)
            .with_challenge_ttl(Duration::from_secs(5));
        config.cookie_same_site = SameSitePolicy::None;

        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("Signing secret")));
        assert!(warnings.iter().any(|w| w.contains("SameSite=None without Secure")));
        assert!(warnings.iter().any(|w| w.contains("Very short challenge TTL")));
    }

    #[test]
    fn test_same_site_parsing() {
        assert_eq!("lax".parse::<SameSitePolicy>().unwrap(), SameSitePolicy::Lax);
        assert_eq!("NONE".parse::<SameSitePolicy>().unwrap(), SameSitePolicy::None);
        assert!("sideways".parse::<SameSitePolicy>().is_err());
        assert_eq!(SameSitePolicy::Strict.to_string(), "Strict");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = AuthConfig::new(SECRET, ConfigPreset::Development);
        let debug = format!("{config:?}");
        assert!(!debug.contains(SECRET));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_summary() {
        let config = AuthConfig::new(SECRET, ConfigPreset::Development);
        let summary = config.summary();
        assert!(summary.contains("Access TTL: 3600s"));
        assert!(summary.contains("SameSite=Lax"));
    }
}
