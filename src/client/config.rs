//! Connection engine configuration.

use std::time::Duration;

use crate::core::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_DRAIN_POLL_INTERVAL, DEFAULT_ENDPOINT_CACHE_CAPACITY,
    DEFAULT_ENDPOINT_IDLE_TIMEOUT, DEFAULT_MAX_RETRIES, DEFAULT_MTU, DEFAULT_RESEND_INTERVAL,
    DEFAULT_SEND_TICK, MAX_HEADER_SIZE, MAX_MTU,
};

use super::client::ClientError;

/// What an inbound Logout does to the local connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogoutPolicy {
    /// Logged and reported as a received packet. The connection stays up
    /// until it times out or is disconnected locally.
    #[default]
    Advisory,
    /// Disconnect locally, using the peer's reason.
    Authoritative,
}

/// What happens when a reliable packet exhausts its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryFailurePolicy {
    /// Emit a delivery failed event and keep the connection.
    #[default]
    Notify,
    /// Emit the event, then disconnect.
    Disconnect,
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Resend a reliable packet when unacknowledged for this long.
    pub resend_interval: Duration,

    /// Retransmissions before a reliable packet is abandoned.
    pub max_retries: u32,

    /// Disconnect when nothing has been received for this long.
    pub connect_timeout: Duration,

    /// Largest datagram sent or received.
    pub mtu: usize,

    /// Sender loop yield between iterations when idle.
    pub send_tick: Duration,

    /// Poll period while `disconnect` waits for the reliability queue.
    pub drain_poll_interval: Duration,

    /// Handling of inbound Logout.
    pub logout_policy: LogoutPolicy,

    /// Handling of exhausted reliable packets.
    pub delivery_failure_policy: DeliveryFailurePolicy,

    /// Send a Ping after this much outbound silence while connected.
    pub keepalive_interval: Option<Duration>,

    /// Endpoint cache size before eviction.
    pub endpoint_cache_capacity: usize,

    /// Cached endpoints idle for this long may be evicted.
    pub endpoint_idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            resend_interval: DEFAULT_RESEND_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            mtu: DEFAULT_MTU,
            send_tick: DEFAULT_SEND_TICK,
            drain_poll_interval: DEFAULT_DRAIN_POLL_INTERVAL,
            logout_policy: LogoutPolicy::default(),
            delivery_failure_policy: DeliveryFailurePolicy::default(),
            keepalive_interval: None,
            endpoint_cache_capacity: DEFAULT_ENDPOINT_CACHE_CAPACITY,
            endpoint_idle_timeout: DEFAULT_ENDPOINT_IDLE_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Start a builder from the defaults.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Check the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.mtu < MAX_HEADER_SIZE || self.mtu > MAX_MTU {
            return Err(ClientError::Config(format!(
                "mtu must be within {MAX_HEADER_SIZE}..={MAX_MTU}, got {}",
                self.mtu
            )));
        }
        if self.resend_interval.is_zero() {
            return Err(ClientError::Config("resend interval must be non-zero".into()));
        }
        if self.connect_timeout.is_zero() {
            return Err(ClientError::Config("connect timeout must be non-zero".into()));
        }
        if self.send_tick.is_zero() || self.drain_poll_interval.is_zero() {
            return Err(ClientError::Config("loop intervals must be non-zero".into()));
        }
        if self.keepalive_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(ClientError::Config("keepalive interval must be non-zero".into()));
        }
        if self.endpoint_cache_capacity == 0 {
            return Err(ClientError::Config(
                "endpoint cache capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the resend interval.
    pub fn resend_interval(mut self, interval: Duration) -> Self {
        self.config.resend_interval = interval;
        self
    }

    /// Set the retry limit.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the MTU ceiling.
    pub fn mtu(mut self, mtu: usize) -> Self {
        self.config.mtu = mtu;
        self
    }

    /// Set the sender loop idle yield.
    pub fn send_tick(mut self, tick: Duration) -> Self {
        self.config.send_tick = tick;
        self
    }

    /// Set the drain poll interval.
    pub fn drain_poll_interval(mut self, interval: Duration) -> Self {
        self.config.drain_poll_interval = interval;
        self
    }

    /// Set the Logout policy.
    pub fn logout_policy(mut self, policy: LogoutPolicy) -> Self {
        self.config.logout_policy = policy;
        self
    }

    /// Set the delivery failure policy.
    pub fn delivery_failure_policy(mut self, policy: DeliveryFailurePolicy) -> Self {
        self.config.delivery_failure_policy = policy;
        self
    }

    /// Enable keepalive pings.
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.config.keepalive_interval = Some(interval);
        self
    }

    /// Set the endpoint cache capacity.
    pub fn endpoint_cache_capacity(mut self, capacity: usize) -> Self {
        self.config.endpoint_cache_capacity = capacity;
        self
    }

    /// Set the endpoint idle timeout.
    pub fn endpoint_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.endpoint_idle_timeout = timeout;
        self
    }

    /// Build the configuration, validating it.
    pub fn build(self) -> Result<ClientConfig, ClientError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
