use super::{ContainerRuntime, EventStream, RuntimeEvent};
use crate::error::Error;
use crate::types::{self, ContainerSnapshot, ContainerView};
use async_trait::async_trait;
use bollard::container::ListContainersOptions;
use bollard::models::{EndpointSettings, EventMessage};
use bollard::system::EventsOptions;
use bollard::{Docker, API_DEFAULT_VERSION};
use futures_util::stream::StreamExt;
use log::{debug, info};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::Path;

/// File names Docker uses inside a TLS certificate directory.
const TLS_FILES: [&str; 3] = ["key.pem", "cert.pem", "ca.pem"];

pub struct DockerRuntime {
    docker: Docker,
}

/// Where the Docker daemon listens.
#[derive(Debug, PartialEq, Eq)]
enum Endpoint<'a> {
    Unix(&'a str),
    Tcp(&'a str),
}

fn endpoint(socket: &str) -> Result<Endpoint<'_>, Error> {
    if let Some(path) = socket.strip_prefix("unix://") {
        Ok(Endpoint::Unix(path))
    } else if ["tcp://", "http://", "https://"]
        .iter()
        .any(|scheme| socket.starts_with(scheme))
    {
        Ok(Endpoint::Tcp(socket))
    } else if socket.contains("://") {
        Err(Error::UnsupportedSocket(socket.to_string()))
    } else {
        Ok(Endpoint::Unix(socket))
    }
}

impl DockerRuntime {
    /// Connect to the daemon at `socket`, using TLS when a certificate
    /// directory is given.
    pub fn connect(socket: &str, tls_cert_path: Option<&Path>, timeout: u64) -> Result<Self, Error> {
        let docker = match (endpoint(socket)?, tls_cert_path) {
            (Endpoint::Tcp(addr), Some(dir)) => {
                let [key, cert, ca] = TLS_FILES.map(|name| dir.join(name));
                for file in [&key, &cert, &ca] {
                    if !file.is_file() {
                        return Err(Error::TlsCerts(file.clone()));
                    }
                }
                info!("Connecting to Docker at {} with TLS from {}", addr, dir.display());
                Docker::connect_with_ssl(addr, &key, &cert, &ca, timeout, API_DEFAULT_VERSION)?
            }
            (Endpoint::Tcp(addr), None) => {
                info!("Connecting to Docker at {}", addr);
                Docker::connect_with_http(addr, timeout, API_DEFAULT_VERSION)?
            }
            #[cfg(unix)]
            (Endpoint::Unix(path), _) => {
                info!("Connecting to Docker at unix://{}", path);
                Docker::connect_with_unix(path, timeout, API_DEFAULT_VERSION)?
            }
            #[cfg(not(unix))]
            (Endpoint::Unix(_), _) => return Err(Error::UnsupportedSocket(socket.to_string())),
        };
        Ok(Self { docker })
    }

    async fn container_view(
        &self,
        id: String,
        networks: Option<&HashMap<String, EndpointSettings>>,
    ) -> Result<ContainerView, Error> {
        let detail = self.docker.inspect_container(&id, None).await?;
        let virtual_host = detail
            .config
            .and_then(|config| config.env)
            .and_then(|env| types::virtual_host(&env));
        let address = networks.and_then(first_ipv4);
        debug!("Container {}: address={:?} virtual_host={:?}", id, address, virtual_host);
        Ok(ContainerView {
            id,
            address,
            virtual_host,
        })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn snapshot(&self) -> Result<ContainerSnapshot, Error> {
        let opts = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(opts)).await?;

        let mut views = Vec::with_capacity(containers.len());
        for c in containers {
            let Some(id) = c.id else {
                continue;
            };
            let networks = c.network_settings.as_ref().and_then(|s| s.networks.as_ref());
            views.push(self.container_view(id, networks).await?);
        }
        Ok(ContainerSnapshot::new(views))
    }

    fn events(&self) -> EventStream {
        self.docker
            .events(None::<EventsOptions<String>>)
            .map(|msg| msg.map(runtime_event).map_err(Error::from))
            .boxed()
    }
}

fn runtime_event(event: EventMessage) -> RuntimeEvent {
    let actor = event.actor.unwrap_or_default();
    let name = actor
        .attributes
        .and_then(|mut attributes| attributes.remove("name"))
        .filter(|name| !name.is_empty());
    RuntimeEvent {
        action: event.action.unwrap_or_default(),
        actor: name.or(actor.id).unwrap_or_default(),
    }
}

/// The first usable IPv4 address, visiting networks by name so the choice
/// is stable between passes.
fn first_ipv4(networks: &HashMap<String, EndpointSettings>) -> Option<Ipv4Addr> {
    let mut names: Vec<&String> = networks.keys().collect();
    names.sort();
    names.into_iter().find_map(|name| {
        networks[name]
            .ip_address
            .as_deref()
            .filter(|ip| !ip.is_empty())
            .and_then(|ip| ip.parse().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::EventActor;

    fn network(ip: &str) -> EndpointSettings {
        EndpointSettings {
            ip_address: Some(ip.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_endpoint_parsing() {
        assert_eq!(
            endpoint("unix:///var/run/docker.sock").unwrap(),
            Endpoint::Unix("/var/run/docker.sock")
        );
        assert_eq!(
            endpoint("/var/run/docker.sock").unwrap(),
            Endpoint::Unix("/var/run/docker.sock")
        );
        assert_eq!(
            endpoint("tcp://10.0.0.1:2376").unwrap(),
            Endpoint::Tcp("tcp://10.0.0.1:2376")
        );
        assert_eq!(
            endpoint("http://localhost:2375").unwrap(),
            Endpoint::Tcp("http://localhost:2375")
        );
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        assert!(matches!(
            endpoint("ssh://user@host"),
            Err(Error::UnsupportedSocket(s)) if s == "ssh://user@host"
        ));
    }

    #[test]
    fn test_first_ipv4_skips_empty_networks() {
        let networks = HashMap::from([
            ("a_none".to_string(), network("")),
            ("b_bridge".to_string(), network("172.17.0.2")),
            ("c_custom".to_string(), network("172.18.0.2")),
        ]);
        assert_eq!(first_ipv4(&networks), Some(Ipv4Addr::new(172, 17, 0, 2)));
    }

    #[test]
    fn test_first_ipv4_none() {
        assert_eq!(first_ipv4(&HashMap::new()), None);
        let networks = HashMap::from([("host".to_string(), EndpointSettings::default())]);
        assert_eq!(first_ipv4(&networks), None);
    }

    #[test]
    fn test_runtime_event_prefers_name() {
        let event = EventMessage {
            action: Some("start".to_string()),
            actor: Some(EventActor {
                id: Some("abc123".to_string()),
                attributes: Some(HashMap::from([("name".to_string(), "web".to_string())])),
            }),
            ..Default::default()
        };
        let event = runtime_event(event);
        assert_eq!(event.action, "start");
        assert_eq!(event.actor, "web");

        let bare = runtime_event(EventMessage {
            actor: Some(EventActor {
                id: Some("abc123".to_string()),
                attributes: None,
            }),
            ..Default::default()
        });
        assert_eq!(bare.actor, "abc123");
    }

    #[test]
    fn test_tls_requires_cert_files() {
        let dir = std::env::temp_dir().join(format!("dockmasq-no-certs-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let err = DockerRuntime::connect("tcp://127.0.0.1:2376", Some(&dir), 5)
            .err()
            .expect("missing certs must fail");
        assert!(matches!(err, Error::TlsCerts(path) if path.ends_with("key.pem")));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
