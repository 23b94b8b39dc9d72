//! Process metrics for the diagnostics command.

use std::path::PathBuf;

/// Memory and process facts about the running bot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessStats {
    /// Resident set size in bytes.
    pub rss: Option<u64>,
    /// Virtual memory size in bytes.
    pub vms: Option<u64>,
    /// Memory unique to this process in bytes.
    pub uss: Option<u64>,
    pub pid: u32,
    pub name: Option<String>,
    pub threads: Option<usize>,
}

/// Source of [`ProcessStats`]. Absence of a provider is normal.
pub trait MetricsProvider: Send + Sync {
    /// Current stats, or `None` if they cannot be read.
    fn process_stats(&self) -> Option<ProcessStats>;
}

/// Reads `/proc/<pid>/status` on Linux.
#[derive(Debug, Clone)]
pub struct ProcStatusMetrics {
    path: PathBuf,
}

impl ProcStatusMetrics {
    /// Provider for the current process.
    #[must_use]
    pub fn current() -> Self {
        Self {
            path: PathBuf::from("/proc/self/status"),
        }
    }

    /// Provider reading an arbitrary status file.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MetricsProvider for ProcStatusMetrics {
    fn process_stats(&self) -> Option<ProcessStats> {
        let status = std::fs::read_to_string(&self.path).ok()?;
        Some(parse_status(&status))
    }
}

fn parse_status(status: &str) -> ProcessStats {
    let mut stats = ProcessStats {
        pid: std::process::id(),
        ..ProcessStats::default()
    };

    for line in status.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key {
            "Name" => stats.name = Some(value.to_owned()),
            "Pid" => {
                if let Ok(pid) = value.parse() {
                    stats.pid = pid;
                }
            }
            "Threads" => stats.threads = value.parse().ok(),
            "VmRSS" => stats.rss = parse_kb(value),
            "VmSize" => stats.vms = parse_kb(value),
            "RssAnon" => stats.uss = parse_kb(value),
            _ => {}
        }
    }

    stats
}

/// Parses values like `"1024 kB"` into bytes.
fn parse_kb(value: &str) -> Option<u64> {
    let number = value.split_whitespace().next()?;
    number.parse::<u64>().ok().map(|kb| kb * 1024)
}
