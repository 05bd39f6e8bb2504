use clap::Parser;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

/// Keep dnsmasq in sync with the running Docker containers.
///
/// Containers with a `VIRTUAL_HOST` environment entry get an
/// `address=/<host>/<ip>` line in the dnsmasq config, and dnsmasq is
/// restarted whenever that file changes.
#[derive(Debug, Default, Parser, Serialize)]
#[command(name = "dockmasq", version, about)]
pub struct Cli {
    /// Docker socket (unix:///path or tcp://host:port)
    #[arg(short = 'd', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_socket: Option<String>,

    /// dnsmasq config file to manage (should otherwise be empty)
    #[arg(short = 'c', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dnsmasq_config: Option<PathBuf>,

    /// Shell command that restarts dnsmasq
    #[arg(short = 'r', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_command: Option<String>,

    /// Gateway for container subnet routes (macOS only)
    #[arg(short = 'g', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<Ipv4Addr>,

    /// Directory holding ca.pem, cert.pem and key.pem for a TLS docker endpoint
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_cert_path: Option<PathBuf>,

    /// Seconds between staleness checks
    #[arg(long = "interval")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,

    /// Docker API timeout in seconds
    #[arg(long = "docker-timeout")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_timeout_secs: Option<u64>,

    /// Config file to read instead of dockmasq.toml
    #[arg(long = "config")]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub docker_socket: String,
    pub dnsmasq_config: PathBuf,
    pub restart_command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_cert_path: Option<PathBuf>,
    pub interval_secs: u64,
    pub docker_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            docker_socket: "unix:///var/run/docker.sock".into(),
            dnsmasq_config: "/etc/dnsmasq.d/docker.conf".into(),
            restart_command: "systemctl restart dnsmasq".into(),
            gateway: None,
            tls_cert_path: None,
            interval_secs: 5,
            docker_timeout_secs: 120,
        }
    }
}

impl Config {
    /// Defaults, then the config file, `dockmasq.json`, `DOCKMASQ_*`
    /// environment variables and finally the command line.
    pub fn figment(cli: &Cli) -> Figment {
        let file = cli
            .config_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("dockmasq.toml"));
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Json::file("dockmasq.json"))
            .merge(Env::prefixed("DOCKMASQ_"))
            .merge(Serialized::defaults(cli))
    }

    pub fn load(cli: &Cli) -> Result<Self, Error> {
        Self::from_figment(Self::figment(cli))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, Error> {
        let config: Config = figment.extract().map_err(Box::new)?;

        if config.interval_secs == 0 {
            return Err(Error::InvalidConfig("interval must be at least 1 second".into()));
        }
        if config.restart_command.trim().is_empty() {
            return Err(Error::InvalidConfig("restart command is empty".into()));
        }
        Ok(config)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_figment(base()).unwrap();
        assert_eq!(config.docker_socket, "unix:///var/run/docker.sock");
        assert_eq!(config.dnsmasq_config, PathBuf::from("/etc/dnsmasq.d/docker.conf"));
        assert_eq!(config.restart_command, "systemctl restart dnsmasq");
        assert_eq!(config.interval(), Duration::from_secs(5));
        assert!(config.gateway.is_none());
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let figment = base().merge(Toml::string(
            r#"
            dnsmasq_config = "/tmp/docker.conf"
            gateway = "192.168.64.2"
            interval_secs = 10
            "#,
        ));
        let config = Config::from_figment(figment).unwrap();
        assert_eq!(config.dnsmasq_config, PathBuf::from("/tmp/docker.conf"));
        assert_eq!(config.gateway, Some(Ipv4Addr::new(192, 168, 64, 2)));
        assert_eq!(config.interval_secs, 10);
    }

    #[test]
    fn test_cli_wins_over_file() {
        let cli = Cli::parse_from([
            "dockmasq",
            "-c",
            "/srv/dns.conf",
            "--restart-command",
            "service dnsmasq restart",
        ]);
        let figment = base()
            .merge(Toml::string(r#"dnsmasq_config = "/tmp/docker.conf""#))
            .merge(Serialized::defaults(&cli));
        let config = Config::from_figment(figment).unwrap();
        assert_eq!(config.dnsmasq_config, PathBuf::from("/srv/dns.conf"));
        assert_eq!(config.restart_command, "service dnsmasq restart");
        assert_eq!(config.docker_socket, "unix:///var/run/docker.sock");
    }

    #[test]
    fn test_cli_interval_flag() {
        let cli = Cli::parse_from(["dockmasq", "--interval", "30", "-g", "10.0.0.1"]);
        let config = Config::from_figment(base().merge(Serialized::defaults(&cli))).unwrap();
        assert_eq!(config.interval(), Duration::from_secs(30));
        assert_eq!(config.gateway, Some(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let figment = base().merge(Toml::string("interval_secs = 0"));
        assert!(matches!(
            Config::from_figment(figment),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_empty_restart_command_rejected() {
        let figment = base().merge(Toml::string(r#"restart_command = "  ""#));
        assert!(matches!(
            Config::from_figment(figment),
            Err(Error::InvalidConfig(_))
        ));
    }
}
