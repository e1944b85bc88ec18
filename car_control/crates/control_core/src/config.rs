use std::time::Duration;
use url::Url;

pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:5500";
pub const DEFAULT_DEVICE_ID: u32 = 1;
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);
pub const REVERT_DELAY: Duration = Duration::from_secs(2);
pub const HISTORY_CAP: usize = 10;

#[derive(Debug, Clone)]
pub struct ControlConfig {
    pub endpoint: Url,
    pub device_id: u32,
    /// Fixed wait between a disconnect and the next attempt. No backoff.
    pub reconnect_delay: Duration,
    /// How long the movement indicator shows the last action before going idle.
    pub revert_delay: Duration,
    pub history_cap: usize,
}

impl ControlConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            device_id: DEFAULT_DEVICE_ID,
            reconnect_delay: RECONNECT_DELAY,
            revert_delay: REVERT_DELAY,
            history_cap: HISTORY_CAP,
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self::new(Url::parse(DEFAULT_WS_URL).expect("default ws url is valid"))
    }
}
