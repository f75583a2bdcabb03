use std::net::{Ipv6Addr, SocketAddr};

use config::{Config, ConfigError};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TaskportConfiguration {
    pub listen: ListenConfiguration,
    pub idp: IdpConfiguration,
    pub backend: BackendConfiguration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfiguration {
    pub http: SocketAddr,
}

/// Identity provider endpoints. `public_url` has no default; loading fails
/// without it.
#[derive(Debug, Clone, Deserialize)]
pub struct IdpConfiguration {
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfiguration {
    pub base_url: String,
}

impl Default for ListenConfiguration {
    fn default() -> Self {
        Self {
            http: SocketAddr::new(std::net::IpAddr::V6(Ipv6Addr::UNSPECIFIED), 4455),
        }
    }
}

impl TaskportConfiguration {
    pub fn load() -> Result<Self, ConfigError> {
        let default_listen = ListenConfiguration::default();
        let loaded = Config::builder()
            .add_source(
                config::Environment::with_prefix("TASKPORT")
                    .ignore_empty(true)
                    .separator("__")
                    .prefix_separator("_"),
            )
            .set_default("listen.http", default_listen.http.to_string())?
            .set_default("backend.base_url", "http://localhost:8787")?
            .build()?;
        loaded.try_deserialize()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_idp_url_fails_load() {
        std::env::remove_var("TASKPORT_IDP__PUBLIC_URL");
        let result = TaskportConfiguration::load();
        assert!(result.is_err());
    }
}
