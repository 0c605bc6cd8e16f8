//! External capability bridge
//!
//! Vendor SDK services (customer displays, card reader daemons) are bound
//! asynchronously by the platform and report readiness some time later.
//! They are modelled as an opaque [`ExternalCapability`] with an explicit
//! connect/disconnect lifecycle; readiness is awaited with a bounded poll.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Default readiness poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Default number of polls before giving up (3 s at the default interval)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;

/// An externally provided service with a connect/disconnect lifecycle
pub trait ExternalCapability: Send + Sync {
    /// Short name for logs and errors
    fn name(&self) -> &str;

    /// Begin connecting; readiness is reported later by `is_connected`
    fn connect(&self) -> Result<()>;

    fn is_connected(&self) -> bool;

    fn disconnect(&self) -> Result<()>;
}

/// Bounded readiness polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Poll `capability` until it reports connected
///
/// Checks immediately, then once per interval, and gives up after
/// `max_attempts` waits with a [`Error::Transport`]. Returns the time spent
/// waiting.
pub async fn wait_for_connection<C>(capability: &C, policy: ConnectPolicy) -> Result<Duration>
where
    C: ExternalCapability + ?Sized,
{
    let started = Instant::now();
    let mut attempt = 0;

    loop {
        if capability.is_connected() {
            let waited = started.elapsed();
            info!("{} connected after {:?}", capability.name(), waited);
            return Ok(waited);
        }

        if attempt >= policy.max_attempts {
            warn!(
                "{} not connected after {} attempts",
                capability.name(),
                attempt
            );
            return Err(Error::Transport(format!(
                "{} not connected after {:?}",
                capability.name(),
                policy.interval * policy.max_attempts
            )));
        }

        attempt += 1;
        debug!(
            "Waiting for {} (attempt {}/{})",
            capability.name(),
            attempt,
            policy.max_attempts
        );
        sleep(policy.interval).await;
    }
}

/// Connect and wait for readiness
pub async fn connect_with_retry<C>(capability: &C, policy: ConnectPolicy) -> Result<Duration>
where
    C: ExternalCapability + ?Sized,
{
    if capability.is_connected() {
        return Ok(Duration::ZERO);
    }
    capability.connect()?;
    wait_for_connection(capability, policy).await
}
