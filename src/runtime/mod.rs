use crate::error::Error;
use crate::types::ContainerSnapshot;
use async_trait::async_trait;
use futures_util::stream::BoxStream;

pub mod docker;
pub use docker::DockerRuntime;

/// A lifecycle event reported by the runtime. Only used for logging; every
/// event is treated the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeEvent {
    pub action: String,
    pub actor: String,
}

pub type EventStream = BoxStream<'static, Result<RuntimeEvent, Error>>;

#[async_trait]
pub trait ContainerRuntime: Send + Sync + 'static {
    /// List the running containers along with their address and virtual host.
    async fn snapshot(&self) -> Result<ContainerSnapshot, Error>;

    /// Open a new subscription to the runtime's event stream. The stream may
    /// end or fail at any time.
    fn events(&self) -> EventStream;
}
