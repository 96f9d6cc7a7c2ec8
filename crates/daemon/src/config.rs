use std::path::PathBuf;
use std::time::Duration;

use oscvars::ConnectionOptions;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub config_path: PathBuf,
    pub tick_rate: u32,
    pub settle_delay: Duration,
    pub save_on_exit: bool,
}

impl DaemonConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            settle_delay: self.settle_delay,
            ..Default::default()
        }
    }
}
