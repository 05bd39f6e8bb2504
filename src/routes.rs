//! Host routes to container subnets.
//!
//! On macOS, Docker containers live inside a VM and their addresses aren't
//! reachable from the host unless a static route points the container
//! subnet at the VM's gateway. Each pass replaces that route for every /16
//! a running container lives in. Everywhere else this is a no-op.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::process::Stdio;

use async_trait::async_trait;
use ipnetwork::Ipv4Network;
use log::{debug, info, warn};
use tokio::process::Command;

use crate::error::Error;
use crate::types::ContainerSnapshot;

const SUBNET_PREFIX: u8 = 16;
const SUBNET_MASK: u32 = u32::MAX << (32 - SUBNET_PREFIX as u32);

#[async_trait]
pub trait RouteTable: Send + Sync {
    async fn replace(&self, snapshot: &ContainerSnapshot) -> Result<(), Error>;
}

/// Leaves the routing table alone.
pub struct NoRoutes;

#[async_trait]
impl RouteTable for NoRoutes {
    async fn replace(&self, _snapshot: &ContainerSnapshot) -> Result<(), Error> {
        Ok(())
    }
}

/// Routes container subnets through `gateway` using the BSD `route` tool.
pub struct StaticRoutes {
    gateway: Ipv4Addr,
    program: String,
}

impl StaticRoutes {
    pub fn new(gateway: Ipv4Addr) -> Self {
        Self::with_program(gateway, "route")
    }

    pub fn with_program(gateway: Ipv4Addr, program: impl Into<String>) -> Self {
        Self {
            gateway,
            program: program.into(),
        }
    }

    async fn route(&self, args: &[String]) -> Result<std::process::ExitStatus, Error> {
        Command::new(&self.program)
            .arg("-n")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .await
            .map_err(|source| Error::RouteSpawn {
                program: self.program.clone(),
                source,
            })
    }
}

#[async_trait]
impl RouteTable for StaticRoutes {
    async fn replace(&self, snapshot: &ContainerSnapshot) -> Result<(), Error> {
        for subnet in subnets(snapshot) {
            let net = subnet.to_string();
            // A missing route is expected the first time round.
            let deleted = self.route(&["delete".into(), net.clone()]).await?;
            debug!("route delete {}: {}", net, deleted);

            let status = self.route(&["add".into(), net.clone(), self.gateway.to_string()]).await?;
            if !status.success() {
                return Err(Error::RouteAdd { subnet, status });
            }
            info!("Routed {} via {}", net, self.gateway);
        }
        Ok(())
    }
}

/// Pick the routing strategy for this host.
pub fn for_platform(gateway: Option<Ipv4Addr>) -> Box<dyn RouteTable> {
    match gateway {
        Some(gateway) if cfg!(target_os = "macos") => Box::new(StaticRoutes::new(gateway)),
        Some(gateway) => {
            warn!(
                "Gateway {} ignored: container routes are only managed on macOS",
                gateway
            );
            Box::new(NoRoutes)
        }
        None => Box::new(NoRoutes),
    }
}

/// Distinct /16 networks holding a container address.
fn subnets(snapshot: &ContainerSnapshot) -> Vec<Ipv4Network> {
    let networks: BTreeSet<Ipv4Addr> = snapshot
        .iter()
        .filter_map(|view| view.address)
        .map(|ip| Ipv4Addr::from(u32::from(ip) & SUBNET_MASK))
        .collect();
    networks
        .into_iter()
        .map(|net| Ipv4Network::new(net, SUBNET_PREFIX).expect("prefix is at most 32"))
        .collect()
}
