//! Background sampler: measures host CPU and memory once per second and
//! appends a row to the store. Best-effort — a failed tick is logged and
//! skipped, never fatal.

use std::time::Duration;

use chrono::Utc;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::store::QueryStore;
use crate::types::MetricSample;

pub const SAMPLE_PERIOD: Duration = Duration::from_secs(1);

/// Spawns the periodic sampling task. Each tick awaits the store write
/// before the next one can fire, so samples never overlap; a slow query
/// holding the store delays the tick rather than stacking writes.
pub fn spawn_sampler(store: QueryStore, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let refresh = RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::everything())
            .with_memory(MemoryRefreshKind::everything());
        let mut sys = System::new_with_specifics(refresh);
        // Baseline refresh; CPU usage is a delta since the previous refresh.
        sys.refresh_cpu_usage();

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await; // first tick completes immediately

        loop {
            interval.tick().await;
            sys.refresh_cpu_usage();
            sys.refresh_memory();
            let sample = collect(&sys);

            let store = store.clone();
            match tokio::task::spawn_blocking(move || store.append(&sample)).await {
                Ok(Ok(())) => debug!("metrics sample recorded"),
                Ok(Err(e)) => warn!("failed to record metrics sample: {e}"),
                Err(e) => warn!("metrics append task failed: {e}"),
            }
        }
    })
}

fn collect(sys: &System) -> MetricSample {
    let total = sys.total_memory();
    let used = sys.used_memory();
    let memory_percent = if total > 0 {
        (used as f64 / total as f64) * 100.0
    } else {
        0.0
    };
    MetricSample {
        timestamp: Utc::now(),
        cpu_percent: (sys.global_cpu_usage() as f64).clamp(0.0, 100.0),
        memory_percent: memory_percent.clamp(0.0, 100.0),
        memory_mb: used as f64 / 1024.0 / 1024.0,
    }
}
