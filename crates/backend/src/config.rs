use color_eyre::eyre::Result;
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use quotebench_core::config::{DatabaseConfig, CONFIG_FILE, ENV_PREFIX};
use serde::{Deserialize, Serialize};

/// The API's slice of `quotebench.yaml`. Sections used only by the benchmark
/// runner are ignored.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Yaml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_shared_file_and_defaults_server() {
        let yaml = r#"
user_address: "0x000000000000000000000000000000000000dEaD"
chains: []
database:
  url: "postgres://bench@localhost/bench"
"#;
        let config: Config = Figment::new().merge(Yaml::string(yaml)).extract().unwrap();

        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn server_section_overrides_defaults() {
        let yaml = r#"
database:
  url: "postgres://bench@localhost/bench"
server:
  host: "127.0.0.1"
  port: 9100
"#;
        let config: Config = Figment::new().merge(Yaml::string(yaml)).extract().unwrap();

        assert_eq!(config.server.port, 9100);
    }
}
