//! Link bring-up and host identity files.
//!
//! Only administrative state is touched: `lo` and `eth0` are set up.
//! Addressing and routing are left to the interface's own configuration.

pub mod etc;

use async_trait::async_trait;
use futures::TryStreamExt;
use vminit_shared::{InitError, InitResult};

/// Synchronous boundary used by the boot sequence.
pub trait NetworkBackend {
    /// Set each named link administratively up, in order.
    fn bring_up(&mut self, links: &[&str]) -> InitResult<()>;
}

/// Kernel link table operations.
#[async_trait]
pub trait LinkControl: Send + Sync {
    /// Interface index for `name`, or `None` if no such link exists.
    async fn link_index(&self, name: &str) -> InitResult<Option<u32>>;

    async fn set_up(&self, index: u32) -> InitResult<()>;
}

/// Look up and activate every link; a missing link is fatal.
pub async fn bring_up_links(control: &dyn LinkControl, links: &[&str]) -> InitResult<()> {
    for name in links {
        let index = control
            .link_index(name)
            .await?
            .ok_or_else(|| InitError::Network(format!("link not found: {}", name)))?;
        control.set_up(index).await.map_err(|e| {
            InitError::Network(format!("failed to set link {} up: {}", name, e))
        })?;
        tracing::info!(link = %name, index, "Link up");
    }
    Ok(())
}

/// rtnetlink-backed link control.
pub struct NetlinkLinks {
    handle: rtnetlink::Handle,
}

impl NetlinkLinks {
    pub fn new(handle: rtnetlink::Handle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl LinkControl for NetlinkLinks {
    async fn link_index(&self, name: &str) -> InitResult<Option<u32>> {
        let mut links = self
            .handle
            .link()
            .get()
            .match_name(name.to_string())
            .execute();
        match links.try_next().await {
            Ok(link) => Ok(link.map(|l| l.header.index)),
            // The kernel answers a name lookup for an absent link with ENODEV.
            Err(rtnetlink::Error::NetlinkError(msg))
                if msg.code.map(|c| -c.get()) == Some(libc::ENODEV) =>
            {
                Ok(None)
            }
            Err(e) => Err(InitError::Network(format!(
                "failed to look up link {}: {}",
                name, e
            ))),
        }
    }

    async fn set_up(&self, index: u32) -> InitResult<()> {
        self.handle
            .link()
            .set(index)
            .up()
            .execute()
            .await
            .map_err(|e| InitError::Network(e.to_string()))
    }
}

/// Runs netlink requests on a current-thread runtime that lives only for
/// the duration of one call.
#[derive(Debug, Default)]
pub struct NetlinkBackend;

impl NetlinkBackend {
    pub fn new() -> Self {
        Self
    }
}

impl NetworkBackend for NetlinkBackend {
    fn bring_up(&mut self, links: &[&str]) -> InitResult<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()
            .map_err(|e| InitError::Network(format!("failed to start netlink runtime: {}", e)))?;

        runtime.block_on(async {
            let (connection, handle, _) = rtnetlink::new_connection()
                .map_err(|e| InitError::Network(format!("failed to open netlink socket: {}", e)))?;
            let connection = tokio::spawn(connection);

            let result = bring_up_links(&NetlinkLinks::new(handle), links).await;
            connection.abort();
            result
        })
    }
}
