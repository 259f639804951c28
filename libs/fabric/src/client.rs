use std::time::Duration;

use constellation_core::{Parameters, Reply, Request};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::socket::{DealerSocket, Envelope};
use crate::transport::Multipart;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_ATTEMPTS: u32 = 5;

pub const REQUEST_TIMEOUT_ENV: &str = "CONSTELLATION_REQUEST_TIMEOUT_MS";
pub const REQUEST_ATTEMPTS_ENV: &str = "CONSTELLATION_REQUEST_ATTEMPTS";

/// Timeout and retry budget of a [`ClientSocket`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// How long one attempt waits for a reply
    pub request_timeout_ms: u64,
    /// How many times a request is sent before giving up
    pub attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            attempts: DEFAULT_ATTEMPTS,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `CONSTELLATION_REQUEST_TIMEOUT_MS` and
    /// `CONSTELLATION_REQUEST_ATTEMPTS` when set
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(REQUEST_TIMEOUT_ENV) {
            config.request_timeout_ms = raw
                .parse()
                .map_err(|_| Error::Custom(format!("{REQUEST_TIMEOUT_ENV} is not a number: {raw}")))?;
        }
        if let Ok(raw) = std::env::var(REQUEST_ATTEMPTS_ENV) {
            config.attempts = raw
                .parse()
                .map_err(|_| Error::Custom(format!("{REQUEST_ATTEMPTS_ENV} is not a number: {raw}")))?;
        }
        Ok(config)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

enum State {
    Disconnected,
    Connected(DealerSocket),
    Reconnecting,
    Closed,
}

/// Resilient request/reply caller for one peer
///
/// Each attempt waits up to the timeout for a reply. When none arrives the
/// connection is torn down, a fresh one is opened to the same endpoint and
/// the request is sent again, until the attempt budget runs out. Tearing the
/// connection down discards anything half-received, so a late reply to an
/// abandoned attempt can never be mistaken for the answer to the next one.
///
/// The socket connects lazily on the first call.
pub struct ClientSocket {
    endpoint: Endpoint,
    timeout: Duration,
    max_attempts: u32,
    state: State,
}

impl ClientSocket {
    pub fn new(endpoint: Endpoint, timeout: Duration, max_attempts: u32) -> Self {
        Self {
            endpoint,
            timeout,
            max_attempts,
            state: State::Disconnected,
        }
    }

    pub fn from_config(endpoint: Endpoint, config: &ClientConfig) -> Self {
        Self::new(endpoint, config.request_timeout(), config.attempts)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, State::Connected(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Send a request and wait for its reply parameters
    pub async fn call(&mut self, request: &Request) -> Result<Parameters> {
        let payload = request.to_bytes()?;
        self.round_trip(&request.command, vec![Vec::new(), payload])
            .await
    }

    /// Send a request through a router to the service registered as `service`
    pub async fn call_through_router(&mut self, service: &str, request: &Request) -> Result<Parameters> {
        let payload = request.to_bytes()?;
        self.round_trip(
            &request.command,
            vec![Vec::new(), service.as_bytes().to_vec(), payload],
        )
        .await
    }

    /// Release the connection; later calls fail with [`Error::SocketClosed`]
    pub async fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Connected(dealer) => dealer.close().await,
            _ => Ok(()),
        }
    }

    async fn round_trip(&mut self, command: &str, message: Multipart) -> Result<Parameters> {
        if self.is_closed() {
            return Err(Error::SocketClosed {
                command: command.to_string(),
            });
        }

        for attempt in 1..=self.max_attempts {
            match self.attempt(&message).await {
                Ok(reply) => return parse_reply(command, reply),
                Err(reason) => {
                    warn!(
                        endpoint = %self.endpoint,
                        command,
                        attempt,
                        max_attempts = self.max_attempts,
                        %reason,
                        "no reply, reconnecting"
                    );
                    self.state = State::Reconnecting;
                }
            }
        }

        Err(Error::Timeout {
            command: command.to_string(),
            attempts: self.max_attempts,
        })
    }

    /// One send-and-wait cycle; `Err` carries why no reply came back
    async fn attempt(&mut self, message: &[Vec<u8>]) -> std::result::Result<Multipart, String> {
        let deadline = Instant::now() + self.timeout;

        let dealer = match self.ensure_connected(deadline).await {
            Ok(dealer) => dealer,
            Err(error) => {
                // Behave like a lazily connecting socket: the attempt still
                // lasts until its deadline
                tokio::time::sleep_until(deadline).await;
                return Err(format!("connect failed: {error}"));
            }
        };

        if let Err(error) = dealer.send(message).await {
            tokio::time::sleep_until(deadline).await;
            return Err(format!("send failed: {error}"));
        }

        match tokio::time::timeout_at(deadline, dealer.recv()).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(error)) => {
                tokio::time::sleep_until(deadline).await;
                Err(format!("connection lost: {error}"))
            }
            Err(_) => Err("timed out".to_string()),
        }
    }

    async fn ensure_connected(&mut self, deadline: Instant) -> Result<&mut DealerSocket> {
        if !self.is_connected() {
            if matches!(self.state, State::Reconnecting) {
                debug!(endpoint = %self.endpoint, "reconnecting");
            }
            let dealer = tokio::time::timeout_at(deadline, DealerSocket::connect(&self.endpoint))
                .await
                .map_err(|_| Error::Custom("Connect timeout exceeded".to_string()))??;
            self.state = State::Connected(dealer);
        }

        match &mut self.state {
            State::Connected(dealer) => Ok(dealer),
            _ => Err(Error::Closed),
        }
    }
}

fn parse_reply(command: &str, message: Multipart) -> Result<Parameters> {
    let malformed = |source| Error::MalformedReply {
        command: command.to_string(),
        source,
    };

    let (_, body) = Envelope::split(message);
    let [payload] = body.as_slice() else {
        return Err(malformed(constellation_core::Error::custom(format!(
            "expected a single payload frame, got {}",
            body.len()
        ))));
    };

    Reply::from_bytes(payload)
        .map_err(malformed)?
        .into_result()
        .map_err(|message| Error::Remote {
            command: command.to_string(),
            message,
        })
}
