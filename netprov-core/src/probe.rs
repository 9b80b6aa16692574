use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Round-trip reachability check against one fixed external host.
///
/// A TCP handshake stands in for `ping`: it needs no privileges and works the
/// same on every platform the backends run on.
#[derive(Debug, Clone)]
pub struct Reachability {
    target: String,
    timeout: Duration,
}

impl Reachability {
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target: target.into(),
            timeout,
        }
    }

    /// `true` as soon as one of `attempts` handshakes completes in time.
    pub async fn check(&self, attempts: u32) -> bool {
        for attempt in 1..=attempts.max(1) {
            match timeout(self.timeout, TcpStream::connect(&self.target)).await {
                Ok(Ok(_)) => return true,
                Ok(Err(e)) => {
                    tracing::trace!(target = %self.target, attempt, "reachability check failed: {}", e)
                }
                Err(_) => tracing::trace!(target = %self.target, attempt, "reachability check timed out"),
            }
        }
        false
    }
}
