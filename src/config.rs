use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    /// Secret the provider echoes back during the webhook subscription handshake.
    pub whatsapp_verify_token: String,
    /// Graph API bearer token. Absent in environments that only ingest webhooks.
    pub whatsapp_access_token: Option<String>,
    pub whatsapp_api_base_url: String,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

const DEFAULT_API_BASE_URL: &str = "https://graph.facebook.com/v18.0";

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            whatsapp_verify_token: get_env("WHATSAPP_VERIFY_TOKEN")?,
            whatsapp_access_token: env::var("WHATSAPP_ACCESS_TOKEN").ok(),
            whatsapp_api_base_url: env::var("WHATSAPP_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
