use parking_lot::Mutex;
use serde::Serialize;
use sysinfo::{Pid, System};

/// One gauge value read at flush time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricReading {
    pub name: String,
    pub value: f64,
}

impl MetricReading {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Source of the system and process gauges attached to every interval
pub trait MetricSource: Send + Sync {
    fn collect(&self) -> Vec<MetricReading>;
}

/// Attaches no metrics
pub struct NoMetrics;

impl MetricSource for NoMetrics {
    fn collect(&self) -> Vec<MetricReading> {
        Vec::new()
    }
}

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Process and host gauges read through sysinfo
pub struct SystemMetrics {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl SystemMetrics {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!(error = e, "Cannot resolve own pid, process metrics disabled");
                None
            }
        };
        Self {
            system: Mutex::new(System::new()),
            pid,
        }
    }
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for SystemMetrics {
    fn collect(&self) -> Vec<MetricReading> {
        let mut system = self.system.lock();
        let mut readings = Vec::with_capacity(4);

        if let Some(pid) = self.pid {
            if system.refresh_process(pid) {
                if let Some(process) = system.process(pid) {
                    readings.push(MetricReading::new(
                        "process-rss-mb",
                        process.memory() as f64 / BYTES_PER_MB,
                    ));
                    readings.push(MetricReading::new(
                        "process-cpu-percent",
                        process.cpu_usage() as f64,
                    ));
                }
            }
        }

        system.refresh_memory();
        readings.push(MetricReading::new(
            "system-used-memory-mb",
            system.used_memory() as f64 / BYTES_PER_MB,
        ));
        readings.push(MetricReading::new(
            "system-load-1m",
            System::load_average().one,
        ));
        readings
    }
}
