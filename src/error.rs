//! Error types.
//!
//! Every variant here is fatal to the daemon. Containers with missing
//! metadata are not errors at all; they are simply left out of the
//! rendered configuration.

use std::path::PathBuf;
use std::process::ExitStatus;

use ipnetwork::Ipv4Network;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The Docker daemon could not be reached or returned a malformed
    /// response. The control-plane connection is considered unusable.
    #[error("docker error: {0}")]
    Runtime(#[from] bollard::errors::Error),

    /// The configured TLS certificate directory is missing one of
    /// `ca.pem`, `cert.pem` or `key.pem`.
    #[error("TLS certificate {} not found", .0.display())]
    TlsCerts(PathBuf),

    /// The docker socket string names a transport this platform can't use.
    #[error("unsupported docker socket: {0}")]
    UnsupportedSocket(String),

    /// The dnsmasq config file could not be opened or written.
    #[error("failed to write {}: {source}", .path.display())]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The restart command could not be started at all.
    #[error("failed to run restart command `{command}`: {source}")]
    RestartSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The restart command ran and exited non-zero.
    #[error("restart command `{command}` failed: {status}")]
    RestartFailed { command: String, status: ExitStatus },

    /// The route command could not be started.
    #[error("failed to run `{program}`: {source}")]
    RouteSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Adding a static route for a container subnet exited non-zero.
    #[error("adding route {subnet} failed: {status}")]
    RouteAdd {
        subnet: Ipv4Network,
        status: ExitStatus,
    },

    #[error("failed to load configuration: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
