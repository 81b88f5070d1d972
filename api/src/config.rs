use clap::Parser;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Process configuration. Every flag falls back to its environment variable.
#[derive(Debug, Clone, Parser)]
#[command(name = "templog-api")]
#[command(about = "HTTP API for sensors and temperature log readings")]
#[command(version)]
pub struct Config {
    /// Database host
    #[arg(long, env = "DB_HOST")]
    pub db_host: String,

    /// Database port
    #[arg(long, env = "DB_PORT", default_value_t = 5432)]
    pub db_port: u16,

    /// Database user
    #[arg(long, env = "DB_USER")]
    pub db_user: String,

    /// Database password
    #[arg(long, env = "DB_PASS", hide_env_values = true)]
    pub db_pass: String,

    /// Database name
    #[arg(long, env = "DB_NAME")]
    pub db_name: String,

    /// CA bundle for TLS; ignored when the file does not exist
    #[arg(long, env = "DB_SSL_CA", default_value = "./combined-ca-certificates.pem")]
    pub db_ssl_ca: PathBuf,

    /// HTTP listen address
    #[arg(long, env = "HTTP_ADDR", default_value = "0.0.0.0:5003")]
    pub http_addr: SocketAddr,
}

impl Config {
    /// The CA bundle, if it exists on disk as a regular file.
    pub fn ssl_ca(&self) -> Option<&Path> {
        let path = self.db_ssl_ca.as_path();
        path.is_file().then_some(path)
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.db_host)
            .port(self.db_port)
            .username(&self.db_user)
            .password(&self.db_pass)
            .database(&self.db_name);

        match self.ssl_ca() {
            Some(ca) => options.ssl_mode(PgSslMode::VerifyCa).ssl_root_cert(ca),
            None => options.ssl_mode(PgSslMode::Disable),
        }
    }

    /// `user@host:port/name`, safe to log.
    pub fn database_label(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.db_user, self.db_host, self.db_port, self.db_name
        )
    }
}
