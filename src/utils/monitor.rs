use crate::core::DerivationSummary;
#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Resource usage sampled when a run phase finishes.
#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct PhaseStats {
    pub cpu_percent: f32,
    pub rss_mb: u64,
    pub peak_rss_mb: u64,
    pub phase_time: Duration,
    pub total_time: Duration,
}

#[cfg(feature = "cli")]
struct Sampler {
    system: System,
    pid: Pid,
    peak_rss_mb: u64,
    phase_started: Instant,
}

/// Samples only the current process, once per phase.
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    sampler: Option<Mutex<Sampler>>,
    started: Instant,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let started = Instant::now();
        let sampler = enabled
            .then(sysinfo::get_current_pid)
            .and_then(|pid| match pid {
                Ok(pid) => Some(Mutex::new(Sampler {
                    system: System::new(),
                    pid,
                    peak_rss_mb: 0,
                    phase_started: started,
                })),
                Err(e) => {
                    tracing::warn!("Process monitoring unavailable: {}", e);
                    None
                }
            });

        Self { sampler, started }
    }

    /// Takes the baseline sample; process CPU usage needs a previous refresh.
    pub fn start(&self) {
        self.sample();
    }

    /// Closes the current phase and starts timing the next one.
    pub fn sample(&self) -> Option<PhaseStats> {
        let mut sampler = self.sampler.as_ref()?.lock().ok()?;
        let pid = sampler.pid;
        sampler
            .system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let process = sampler.system.process(pid)?;
        let rss_mb = process.memory() / 1024 / 1024;
        let cpu_percent = process.cpu_usage();

        sampler.peak_rss_mb = sampler.peak_rss_mb.max(rss_mb);
        let now = Instant::now();
        let phase_time = now.duration_since(sampler.phase_started);
        sampler.phase_started = now;

        Some(PhaseStats {
            cpu_percent,
            rss_mb,
            peak_rss_mb: sampler.peak_rss_mb,
            phase_time,
            total_time: now.duration_since(self.started),
        })
    }

    /// `counts` says what the phase handled, e.g. "12 species".
    pub fn log_phase(&self, phase: &str, counts: &str) {
        if let Some(stats) = self.sample() {
            tracing::info!(
                "📊 {} ({}) - CPU: {:.1}%, RSS: {}MB, Peak: {}MB, Phase: {:?}",
                phase,
                counts,
                stats.cpu_percent,
                stats.rss_mb,
                stats.peak_rss_mb,
                stats.phase_time
            );
        }
    }

    pub fn log_run_total(&self, summary: &DerivationSummary) {
        if let Some(stats) = self.sample() {
            tracing::info!(
                "📊 Run complete - {} species, {} medicines ({} augmented, {} passed through) in {:?}, Peak: {}MB",
                summary.species,
                summary.medicines,
                summary.augmented,
                summary.passed_through,
                stats.total_time,
                stats.peak_rss_mb
            );
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sampler.is_some()
    }
}

#[cfg(feature = "cli")]
impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

// 非 CLI 建置的空實現
#[cfg(not(feature = "cli"))]
#[derive(Default)]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn start(&self) {}

    pub fn log_phase(&self, _phase: &str, _counts: &str) {}

    pub fn log_run_total(&self, _summary: &DerivationSummary) {}

    pub fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_monitor_reports_nothing() {
        let monitor = SystemMonitor::new(false);
        assert!(!monitor.is_enabled());
        assert!(monitor.sample().is_none());
    }

    #[test]
    fn test_phase_clock_restarts_on_each_sample() {
        let monitor = SystemMonitor::new(true);
        let (Some(first), Some(second)) = (monitor.sample(), monitor.sample()) else {
            return;
        };
        assert!(first.peak_rss_mb >= first.rss_mb);
        assert!(second.peak_rss_mb >= first.peak_rss_mb);
        assert!(second.total_time >= first.total_time);
        assert!(second.phase_time <= second.total_time);
    }
}
