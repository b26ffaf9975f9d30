// Executor configuration, read from environment variables
//
// NETCAT_CONNECT_TIMEOUT_MS: Bound on one outbound connect attempt (default: 3000)
// NETCAT_POLL_INTERVAL_MS: Sleep between non-blocking accept attempts (default: 100)
use std::env;
use std::time::Duration;

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetCatConfig {
    pub connect_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for NetCatConfig {
    fn default() -> Self {
        NetCatConfig {
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl NetCatConfig {
    pub fn from_env() -> Self {
        NetCatConfig {
            connect_timeout: Duration::from_millis(
                env_millis("NETCAT_CONNECT_TIMEOUT_MS").unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
            ),
            poll_interval: Duration::from_millis(
                env_millis("NETCAT_POLL_INTERVAL_MS").unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

fn env_millis(name: &str) -> Option<u64> {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|&ms| ms > 0)
}
