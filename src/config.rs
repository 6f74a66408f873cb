use std::env::{self, VarError};

/// Settings read once from the environment at startup.
pub struct Config {
    /// Port to listen on, on all interfaces.
    pub port: u16,
    pub pg_username: String,
    pub pg_password: String,
    pub pg_hostname: String,
    pub pg_database: String,
    pub pg_port: u16,
}

const DEFAULT_PG_PORT: u16 = 5432;

fn var(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|err| anyhow::anyhow!("{key}: {err}"))
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let pg_port = match env::var("PG_PORT") {
            Ok(port) => port.parse()?,
            Err(VarError::NotPresent) => DEFAULT_PG_PORT,
            Err(err) => anyhow::bail!("PG_PORT: {err}"),
        };
        Ok(Self {
            port: var("PORT")?.parse()?,
            pg_username: var("PG_USERNAME")?,
            pg_password: var("PG_PASSWORD")?,
            pg_hostname: var("PG_HOSTNAME")?,
            pg_database: var("PG_DATABASE")?,
            pg_port,
        })
    }

    pub fn postgres(&self) -> db::Config {
        let mut config = db::Config::new();
        config
            .user(&self.pg_username)
            .password(&self.pg_password)
            .host(&self.pg_hostname)
            .dbname(&self.pg_database)
            .port(self.pg_port);
        config
    }
}
