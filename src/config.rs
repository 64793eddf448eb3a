//! Gateway configuration
//!
//! Every adapter receives an immutable config value at construction. Configs can be
//! built directly, from a string option map (missing keys are reported by name), or
//! loaded for all gateways at once from a TOML file plus `CARD_GATEWAYS__*`
//! environment variables.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::error::{GatewayError, GatewayResult};

pub const ENV_PREFIX: &str = "CARD_GATEWAYS";

pub const GESTPAY_TEST_HOST: &str = "testecomm.sella.it";
pub const GESTPAY_LIVE_HOST: &str = "ecomms2s.sella.it";

pub const GLOBAL_COLLECT_TEST_URL_IP_CHECK: &str = "https://ps.gcsip.nl/wdl/wdl";
pub const GLOBAL_COLLECT_TEST_URL_CLIENT_AUTH: &str = "https://ca.gcsip.nl/wdl/wdl";
pub const GLOBAL_COLLECT_LIVE_URL_IP_CHECK: &str = "https://ps.gcsip.com/wdl/wdl";
pub const GLOBAL_COLLECT_LIVE_URL_CLIENT_AUTH: &str = "https://ca.gcsip.com/wdl/wdl";

pub const HSBC_TEST_URL: &str = "https://www.uat.apixml.netq.hsbc.com";
pub const HSBC_LIVE_URL: &str = "https://www.secure-epayments.apixml.hsbc.com";

fn required(options: &HashMap<String, String>, key: &str) -> GatewayResult<String> {
    options
        .get(key)
        .filter(|value| !value.trim().is_empty())
        .cloned()
        .ok_or_else(|| GatewayError::missing_option(key))
}

fn flag(options: &HashMap<String, String>, key: &str) -> GatewayResult<bool> {
    match options.get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) if v.is_empty() || v == "false" || v == "0" => Ok(false),
        Some(v) if v == "true" || v == "1" => Ok(true),
        Some(v) => Err(GatewayError::invalid_option(
            key,
            format!("expected true or false, got {}", v),
        )),
    }
}

fn ensure_present(value: &str, key: &str) -> GatewayResult<()> {
    if value.trim().is_empty() {
        return Err(GatewayError::missing_option(key));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct GestpayConfig {
    pub shop_login: String,
    #[serde(default)]
    pub test: bool,
}

impl GestpayConfig {
    pub fn new(shop_login: impl Into<String>, test: bool) -> Self {
        Self {
            shop_login: shop_login.into(),
            test,
        }
    }

    pub fn from_options(options: &HashMap<String, String>) -> GatewayResult<Self> {
        let config = Self {
            shop_login: required(options, "shop_login")?,
            test: flag(options, "test")?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GatewayResult<()> {
        ensure_present(&self.shop_login, "shop_login")
    }

    pub fn host(&self) -> &'static str {
        if self.test {
            GESTPAY_TEST_HOST
        } else {
            GESTPAY_LIVE_HOST
        }
    }
}

/// How GlobalCollect authenticates the caller; each mode has its own endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Security {
    #[default]
    IpCheck,
    ClientAuth,
}

impl std::str::FromStr for Security {
    type Err = GatewayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ip_check" => Ok(Security::IpCheck),
            "client_auth" => Ok(Security::ClientAuth),
            other => Err(GatewayError::invalid_option(
                "security",
                format!("must be ip_check or client_auth, got {}", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalCollectConfig {
    pub merchant: String,
    pub ip: String,
    #[serde(default)]
    pub security: Security,
    #[serde(default)]
    pub test: bool,
    /// Run DO_CHECKENROLLMENT before authorizing.
    #[serde(default)]
    pub secure_3d: bool,
}

impl GlobalCollectConfig {
    pub fn new(merchant: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            merchant: merchant.into(),
            ip: ip.into(),
            security: Security::default(),
            test: false,
            secure_3d: false,
        }
    }

    pub fn from_options(options: &HashMap<String, String>) -> GatewayResult<Self> {
        let security = match options.get("security") {
            Some(value) => value.trim().parse()?,
            None => Security::default(),
        };
        let config = Self {
            merchant: required(options, "merchant")?,
            ip: required(options, "ip")?,
            security,
            test: flag(options, "test")?,
            secure_3d: flag(options, "secure_3d")?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GatewayResult<()> {
        ensure_present(&self.merchant, "merchant")?;
        ensure_present(&self.ip, "ip")
    }

    pub fn url(&self) -> &'static str {
        match (self.test, self.security) {
            (true, Security::IpCheck) => GLOBAL_COLLECT_TEST_URL_IP_CHECK,
            (true, Security::ClientAuth) => GLOBAL_COLLECT_TEST_URL_CLIENT_AUTH,
            (false, Security::IpCheck) => GLOBAL_COLLECT_LIVE_URL_IP_CHECK,
            (false, Security::ClientAuth) => GLOBAL_COLLECT_LIVE_URL_CLIENT_AUTH,
        }
    }
}

fn default_pipeline() -> String {
    "Payment".to_string()
}

fn default_locale() -> String {
    "826".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct HsbcConfig {
    pub client_id: String,
    pub name: String,
    pub password: String,
    #[serde(default = "default_pipeline")]
    pub pipeline: String,
    /// ISO 3166 numeric country used as the expiry date locale.
    #[serde(default = "default_locale")]
    pub locale: String,
    /// `Y` (test), `N` (test, always declines) or `P` (production).
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub test: bool,
}

impl HsbcConfig {
    pub fn new(
        client_id: impl Into<String>,
        name: impl Into<String>,
        password: impl Into<String>,
        test: bool,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            name: name.into(),
            password: password.into(),
            pipeline: default_pipeline(),
            locale: default_locale(),
            mode: None,
            test,
        }
    }

    pub fn from_options(options: &HashMap<String, String>) -> GatewayResult<Self> {
        let config = Self {
            client_id: required(options, "client_id")?,
            name: required(options, "name")?,
            password: required(options, "password")?,
            pipeline: options
                .get("pipeline")
                .cloned()
                .unwrap_or_else(default_pipeline),
            locale: options.get("locale").cloned().unwrap_or_else(default_locale),
            mode: options.get("mode").filter(|m| !m.is_empty()).cloned(),
            test: flag(options, "test")?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GatewayResult<()> {
        ensure_present(&self.client_id, "client_id")?;
        ensure_present(&self.name, "name")?;
        ensure_present(&self.password, "password")?;
        if self.test && self.mode.as_deref() == Some("P") {
            return Err(GatewayError::invalid_option(
                "mode",
                "Cannot use mode \"P\" in test mode",
            ));
        }
        Ok(())
    }

    /// Explicit mode, else `Y` in test and `P` in production.
    pub fn mode(&self) -> &str {
        match self.mode.as_deref() {
            Some(mode) => mode,
            None if self.test => "Y",
            None => "P",
        }
    }

    pub fn url(&self) -> &'static str {
        if self.test {
            HSBC_TEST_URL
        } else {
            HSBC_LIVE_URL
        }
    }
}

/// Configuration for every gateway the host application enables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewaysConfig {
    pub gestpay: Option<GestpayConfig>,
    pub global_collect: Option<GlobalCollectConfig>,
    pub hsbc: Option<HsbcConfig>,
}

impl GatewaysConfig {
    /// Load from an optional TOML file, overridden by `CARD_GATEWAYS__<GATEWAY>__<KEY>`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read gateway configuration")?;

        let config: Self = settings
            .try_deserialize()
            .context("invalid gateway configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.gestpay.is_none() && self.global_collect.is_none() && self.hsbc.is_none() {
            return Err(anyhow!("at least one gateway must be configured"));
        }
        if let Some(gestpay) = &self.gestpay {
            gestpay.validate().context("gestpay")?;
        }
        if let Some(global_collect) = &self.global_collect {
            global_collect.validate().context("global_collect")?;
        }
        if let Some(hsbc) = &self.hsbc {
            hsbc.validate().context("hsbc")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_hsbc_requires_client_id_name_password_in_order() {
        let err = HsbcConfig::from_options(&options(&[])).unwrap_err();
        assert!(matches!(err, GatewayError::Configuration { ref key, .. } if key == "client_id"));

        let err = HsbcConfig::from_options(&options(&[("client_id", "359")])).unwrap_err();
        assert!(matches!(err, GatewayError::Configuration { ref key, .. } if key == "name"));

        let err = HsbcConfig::from_options(&options(&[("client_id", "359"), ("name", "prada")]))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Configuration { ref key, .. } if key == "password"));
    }

    #[test]
    fn test_hsbc_mode_selection() {
        let base = [("client_id", "359"), ("name", "prada"), ("password", "ab123456")];

        let test = HsbcConfig::from_options(&options(&[base[0], base[1], base[2], ("test", "true")]))
            .unwrap();
        assert_eq!(test.mode(), "Y");

        let live = HsbcConfig::from_options(&options(&base)).unwrap();
        assert_eq!(live.mode(), "P");

        let explicit =
            HsbcConfig::from_options(&options(&[base[0], base[1], base[2], ("mode", "N")])).unwrap();
        assert_eq!(explicit.mode(), "N");

        let err = HsbcConfig::from_options(&options(&[
            base[0],
            base[1],
            base[2],
            ("mode", "P"),
            ("test", "true"),
        ]))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Cannot use mode \"P\" in test mode (mode)"
        );
    }

    #[test]
    fn test_hsbc_defaults() {
        let config = HsbcConfig::new("359", "prada", "ab123456", true);
        assert_eq!(config.pipeline, "Payment");
        assert_eq!(config.locale, "826");
        assert_eq!(config.url(), HSBC_TEST_URL);
    }

    #[test]
    fn test_global_collect_requires_merchant_and_ip() {
        let err = GlobalCollectConfig::from_options(&options(&[("ip", "1.2.3.4")])).unwrap_err();
        assert!(matches!(err, GatewayError::Configuration { ref key, .. } if key == "merchant"));

        let err = GlobalCollectConfig::from_options(&options(&[("merchant", "1")])).unwrap_err();
        assert!(matches!(err, GatewayError::Configuration { ref key, .. } if key == "ip"));
    }

    #[test]
    fn test_global_collect_url_selection() {
        let mut config = GlobalCollectConfig::new("1", "123.123.123.123");
        assert_eq!(config.url(), GLOBAL_COLLECT_LIVE_URL_IP_CHECK);
        config.test = true;
        assert_eq!(config.url(), GLOBAL_COLLECT_TEST_URL_IP_CHECK);
        config.security = Security::ClientAuth;
        assert_eq!(config.url(), GLOBAL_COLLECT_TEST_URL_CLIENT_AUTH);
    }

    #[test]
    fn test_invalid_security_is_rejected() {
        let err = GlobalCollectConfig::from_options(&options(&[
            ("merchant", "1"),
            ("ip", "1.2.3.4"),
            ("security", "password"),
        ]))
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_gestpay_requires_shop_login() {
        let err = GestpayConfig::from_options(&options(&[("test", "true")])).unwrap_err();
        assert!(matches!(err, GatewayError::Configuration { ref key, .. } if key == "shop_login"));

        let config = GestpayConfig::from_options(&options(&[("shop_login", "GESPAY46234"), ("test", "1")]))
            .unwrap();
        assert_eq!(config.host(), GESTPAY_TEST_HOST);
    }

    fn write_toml(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "card-gateways-{}-{}.toml",
            name,
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    const HSBC_TOML: &str = r#"
[hsbc]
client_id = "file-client"
name = "prada"
password = "ab123456"
test = true
"#;

    // Environment variables are process-wide, so every load scenario runs in this one test.
    #[test]
    fn test_load_reads_file_then_environment() {
        let path = write_toml("hsbc", HSBC_TOML);

        let config = GatewaysConfig::load(Some(&path)).unwrap();
        let hsbc = config.hsbc.unwrap();
        assert_eq!(hsbc.client_id, "file-client");
        assert_eq!(hsbc.pipeline, "Payment");
        assert_eq!(hsbc.locale, "826");
        assert_eq!(hsbc.mode(), "Y");
        assert!(config.gestpay.is_none());
        assert!(config.global_collect.is_none());

        std::env::set_var("CARD_GATEWAYS__HSBC__CLIENT_ID", "env-client");
        let loaded = GatewaysConfig::load(Some(&path));
        std::env::remove_var("CARD_GATEWAYS__HSBC__CLIENT_ID");
        assert_eq!(loaded.unwrap().hsbc.unwrap().client_id, "env-client");

        let invalid = write_toml("hsbc-live-mode", &format!("{}mode = \"P\"\n", HSBC_TOML));
        let err = GatewaysConfig::load(Some(&invalid)).unwrap_err();
        let chain = format!("{:#}", err);
        assert!(chain.starts_with("hsbc"), "{}", chain);
        assert!(chain.contains("Cannot use mode \"P\" in test mode"), "{}", chain);

        let missing = std::env::temp_dir().join("card-gateways-absent.toml");
        assert!(GatewaysConfig::load(Some(&missing)).is_err());

        std::fs::remove_file(path).unwrap();
        std::fs::remove_file(invalid).unwrap();
    }

    #[test]
    fn test_empty_gateways_config_is_invalid() {
        assert!(GatewaysConfig::default().validate().is_err());
    }
}
