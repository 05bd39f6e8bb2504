//! Writes the dnsmasq config file and restarts dnsmasq.
//!
//! The write and the restart are not transactional. If the process dies
//! between them, the next pass rewrites the same file and restarts again.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use log::info;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::Error;
use crate::render::ConfigDocument;
use crate::routes::RouteTable;
use crate::types::ContainerSnapshot;

#[async_trait]
pub trait Applier: Send + Sync + 'static {
    /// Bring the DNS forwarder in line with `document`, rendered from
    /// `snapshot`. Any error is fatal.
    async fn apply(&self, snapshot: &ContainerSnapshot, document: &ConfigDocument)
        -> Result<(), Error>;
}

pub struct DnsmasqApplier {
    path: PathBuf,
    restart_command: String,
    routes: Box<dyn RouteTable>,
}

impl DnsmasqApplier {
    pub fn new(
        path: impl Into<PathBuf>,
        restart_command: impl Into<String>,
        routes: Box<dyn RouteTable>,
    ) -> Self {
        Self {
            path: path.into(),
            restart_command: restart_command.into(),
            routes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&self, document: &ConfigDocument) -> Result<(), Error> {
        let wrap = |source| Error::ConfigWrite {
            path: self.path.clone(),
            source,
        };

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o644);

        let mut file = options.open(&self.path).await.map_err(wrap)?;
        file.write_all(document.as_bytes()).await.map_err(wrap)?;
        file.sync_all().await.map_err(wrap)?;
        Ok(())
    }

    async fn restart(&self) -> Result<(), Error> {
        let status = Command::new("sh")
            .arg("-c")
            .arg(&self.restart_command)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|source| Error::RestartSpawn {
                command: self.restart_command.clone(),
                source,
            })?;
        if !status.success() {
            return Err(Error::RestartFailed {
                command: self.restart_command.clone(),
                status,
            });
        }
        info!("Restarted dnsmasq");
        Ok(())
    }
}

#[async_trait]
impl Applier for DnsmasqApplier {
    async fn apply(
        &self,
        snapshot: &ContainerSnapshot,
        document: &ConfigDocument,
    ) -> Result<(), Error> {
        self.routes.replace(snapshot).await?;
        self.write(document).await?;
        self.restart().await
    }
}
