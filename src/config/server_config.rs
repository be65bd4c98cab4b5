use serde::Deserialize;
use crate::config::ConfigError;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,
    /// Absolute base used when building `image_url`; falls back to the request Host header.
    pub public_url: Option<String>,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_bind_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
            public_url: None,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::InvalidServer(
                "bind_address must not be empty".to_string(),
            ));
        }
        if self.bind_port == 0 {
            return Err(ConfigError::InvalidServer(
                "bind_port must be non-zero".to_string(),
            ));
        }
        if let Some(public) = &self.public_url {
            url::Url::parse(public).map_err(|e| {
                ConfigError::InvalidServer(format!("public_url '{}': {}", public, e))
            })?;
        }
        Ok(())
    }

    /// Address the listener binds to, as `host:port`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }
}
