use std::env;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub listen_addr: String,
    /// Seed credentials for a first user, since the API has no public
    /// registration endpoint.
    pub bootstrap_user: Option<BootstrapUser>,
}

#[derive(Debug, Clone)]
pub struct BootstrapUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable `{0}` is not set")]
    MissingVar(&'static str),
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("TASKS_DATABASE_URL")
            .or_else(|_| env::var("DATABASE_URL"))
            .unwrap_or_else(|_| "sqlite://tasks.sqlite".to_string());

        let listen_addr =
            env::var("TASKS_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let bootstrap_user = match env::var("TASKS_BOOTSTRAP_EMAIL") {
            Ok(email) => {
                let password = env::var("TASKS_BOOTSTRAP_PASSWORD")
                    .map_err(|_| ConfigError::MissingVar("TASKS_BOOTSTRAP_PASSWORD"))?;
                let name =
                    env::var("TASKS_BOOTSTRAP_NAME").unwrap_or_else(|_| "Admin".to_string());
                Some(BootstrapUser {
                    name,
                    email,
                    password,
                })
            }
            Err(_) => None,
        };

        Ok(Self {
            database_url,
            listen_addr,
            bootstrap_user,
        })
    }
}
