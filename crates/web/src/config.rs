use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub remote_database_url: Option<String>,
    pub cors_origin: Option<String>,
    pub api_keys: String,
    pub judge_token_secret: String,
    pub public_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("HOST").context("Cannot load HOST env variable")?;
        let port: u16 = std::env::var("PORT")
            .context("Cannot load PORT env variable")?
            .parse()
            .context("PORT must be a number")?;
        let public_url = std::env::var("PUBLIC_URL").unwrap_or_else(|_| format!("http://{host}:{port}"));

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .context("Cannot load DATABASE_URL env variable")?,
            remote_database_url: std::env::var("REMOTE_DATABASE_URL").ok(),
            cors_origin: std::env::var("CORS_ORIGIN").ok(),
            api_keys: std::env::var("API_KEYS").unwrap_or_default(),
            judge_token_secret: std::env::var("JUDGE_TOKEN_SECRET")
                .context("Cannot load JUDGE_TOKEN_SECRET env variable")?,
            host,
            port,
            public_url,
        })
    }
}
