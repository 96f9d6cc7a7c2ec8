use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use oscvars::{BoundState, Group, GroupDirectory, LoadReport, Mode, NetworkStats};

use crate::config::DaemonConfig;
use crate::events::MonitorEvent;
use crate::host::LogHost;

pub struct Monitor {
    directory: GroupDirectory,
    host: Arc<LogHost>,
    config: DaemonConfig,
    tick: u64,
    tick_duration: Duration,
    last_tick_time: Instant,
    accumulator: Duration,
    running: Arc<AtomicBool>,
    start_time: Instant,
    applied_total: u64,
    pending_events: VecDeque<MonitorEvent>,
}

impl Monitor {
    pub fn new(config: DaemonConfig) -> Result<Self> {
        let host = Arc::new(LogHost::default());
        let directory = GroupDirectory::with_options(host.clone(), config.connection_options());

        let mut monitor = Self {
            directory,
            host,
            tick: 0,
            tick_duration: config.tick_duration(),
            last_tick_time: Instant::now(),
            accumulator: Duration::ZERO,
            running: Arc::new(AtomicBool::new(true)),
            start_time: Instant::now(),
            applied_total: 0,
            pending_events: VecDeque::new(),
            config,
        };

        if monitor.config.config_path.exists() {
            monitor.reload()?;
        } else {
            log::info!(
                "No configuration at {}, starting with no groups",
                monitor.config.config_path.display()
            );
        }

        Ok(monitor)
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = MonitorEvent> + '_ {
        let directory_events = self.directory.drain_events();
        self.pending_events
            .extend(directory_events.into_iter().map(MonitorEvent::from));
        self.pending_events.drain(..)
    }

    pub fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            self.step_headless();
            std::thread::sleep(Duration::from_millis(1));
        }
        self.shutdown();
        self.log_pending();
    }

    /// One headless iteration: tick, then log and discard every queued event.
    pub fn step_headless(&mut self) {
        self.tick_once();
        self.log_pending();
    }

    fn log_pending(&mut self) {
        let events: Vec<MonitorEvent> = self.drain_events().collect();
        for event in events {
            match event {
                // The library logged these when they happened.
                MonitorEvent::Directory(_) => log::debug!("{}", event),
                _ => log::log!(event.level(), "{}", event),
            }
        }
    }

    pub fn tick_once(&mut self) {
        let now = Instant::now();
        self.accumulator += now - self.last_tick_time;
        self.last_tick_time = now;

        if self.accumulator < self.tick_duration {
            return;
        }
        // Ticks missed while stalled are not replayed; one drain covers them.
        self.accumulator = Duration::ZERO;
        self.tick += 1;

        for (id, report) in self.directory.tick_all() {
            if report.applied == 0 {
                continue;
            }
            self.applied_total += report.applied as u64;
            if let Ok(group) = self.directory.resolve(id) {
                self.pending_events.push_back(MonitorEvent::Applied {
                    group: group.name().to_string(),
                    count: report.applied,
                });
            }
        }
    }

    pub fn save(&mut self) {
        let path = self.config.config_path.clone();
        match self.directory.save_config(&path) {
            Ok(()) => self.pending_events.push_back(MonitorEvent::Saved { path }),
            Err(e) => self.pending_events.push_back(MonitorEvent::Error {
                message: format!("Failed to save {}: {}", path.display(), e),
            }),
        }
    }

    pub fn reload(&mut self) -> Result<LoadReport> {
        let path = &self.config.config_path;
        self.directory
            .load_config(path)
            .with_context(|| format!("loading {}", path.display()))
    }

    /// Reload triggered from the monitor; failures are reported, not fatal.
    pub fn try_reload(&mut self) {
        if let Err(e) = self.reload() {
            self.pending_events.push_back(MonitorEvent::Error {
                message: format!("{:#}", e),
            });
        }
    }

    pub fn reset_group(&mut self, name: &str) {
        if let Err(e) = self.directory.reset_connection(name) {
            self.pending_events.push_back(MonitorEvent::Error {
                message: e.to_string(),
            });
        }
    }

    pub fn resend_group(&mut self, name: &str) {
        let Some(group) = self.directory.group(name) else {
            return;
        };
        if group.mode() != Mode::Sender {
            return;
        }
        let count = group.resend_all();
        self.pending_events.push_back(MonitorEvent::Resent {
            group: name.to_string(),
            count,
        });
    }

    pub fn shutdown(&mut self) {
        if self.config.save_on_exit {
            self.save();
        }
        self.directory.clear();
    }

    pub fn stats(&self) -> MonitorStats {
        let groups = self.directory.groups();
        let mut network = NetworkStats::default();
        for group in &groups {
            let stats = group.stats();
            network.packets_sent += stats.packets_sent;
            network.packets_received += stats.packets_received;
            network.bytes_sent += stats.bytes_sent;
            network.bytes_received += stats.bytes_received;
            network.messages_received += stats.messages_received;
            network.decode_errors += stats.decode_errors;
            network.send_errors += stats.send_errors;
        }

        MonitorStats {
            tick: self.tick,
            uptime_secs: self.start_time.elapsed().as_secs(),
            group_count: groups.len(),
            bound_count: groups
                .iter()
                .filter(|g| g.bound_state() == BoundState::Bound)
                .count(),
            schema_kinds: self.host.kind_count(),
            applied_total: self.applied_total,
            network,
        }
    }

    pub fn group_infos(&self) -> Vec<GroupInfo> {
        self.directory
            .groups()
            .iter()
            .map(|g| GroupInfo::from_group(g))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct MonitorStats {
    pub tick: u64,
    pub uptime_secs: u64,
    pub group_count: usize,
    pub bound_count: usize,
    pub schema_kinds: usize,
    pub applied_total: u64,
    pub network: NetworkStats,
}

#[derive(Debug, Clone)]
pub struct VariableInfo {
    pub name: String,
    pub kind: &'static str,
    pub value: String,
    pub bounds: String,
}

#[derive(Debug, Clone)]
pub struct GroupInfo {
    pub name: String,
    pub mode: Mode,
    pub endpoint: String,
    pub state: BoundState,
    pub stats: NetworkStats,
    pub variables: Vec<VariableInfo>,
}

impl GroupInfo {
    fn from_group(group: &Group) -> Self {
        Self {
            name: group.name().to_string(),
            mode: group.mode(),
            endpoint: group.endpoint().to_string(),
            state: group.bound_state(),
            stats: group.stats(),
            variables: group
                .variables()
                .iter()
                .map(|v| VariableInfo {
                    name: v.name().to_string(),
                    kind: v.kind().label(),
                    value: v.value().to_string(),
                    bounds: v.bounds().to_string(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use oscvars::Endpoint;

    use super::*;

    fn config(dir: &tempfile::TempDir) -> DaemonConfig {
        DaemonConfig {
            config_path: dir.path().join("groups.json"),
            tick_rate: 1000,
            settle_delay: Duration::ZERO,
            save_on_exit: false,
        }
    }

    #[test]
    fn headless_steps_drain_every_event() {
        let tmp = tempfile::tempdir().unwrap();
        let mut monitor = Monitor::new(config(&tmp)).unwrap();

        monitor
            .directory
            .create_group("rx", Endpoint::receiver(0))
            .unwrap();
        for i in 0..500 {
            monitor.pending_events.push_back(MonitorEvent::Error {
                message: format!("error {}", i),
            });
        }

        monitor.step_headless();
        assert!(monitor.pending_events.is_empty());
        assert!(monitor.directory.drain_events().is_empty());

        monitor.reset_group("missing");
        monitor.step_headless();
        assert!(monitor.pending_events.is_empty());
    }

    #[test]
    fn shutdown_saves_when_asked() {
        let tmp = tempfile::tempdir().unwrap();
        let mut monitor = Monitor::new(DaemonConfig {
            save_on_exit: true,
            ..config(&tmp)
        })
        .unwrap();
        monitor
            .directory
            .create_group("out", Endpoint::sender("127.0.0.1", 9))
            .unwrap();

        monitor.running().store(false, Ordering::SeqCst);
        monitor.run();
        assert!(monitor.pending_events.is_empty());
        assert!(tmp.path().join("groups.json").exists());
        assert_eq!(monitor.stats().group_count, 0);
    }
}
