//! Replay statistics.

use std::time::Duration;

use observability::SyncMetricsAggregator;
use sync_engine::SyncStatsSnapshot;

/// Statistics from a replay run
#[derive(Debug, Clone, Default)]
pub struct ReplayStats {
    /// Total duration of the replay
    pub duration: Duration,

    /// Seed used for dropping and reordering
    pub seed: u64,

    /// Number of producer channels
    pub channels: usize,

    /// Values handed to the synchronizer
    pub messages_sent: u64,

    /// Values withheld by the drop rate
    pub messages_dropped: u64,

    /// Values the synchronizer refused (stale, off schedule)
    pub messages_rejected: u64,

    /// Pulses still buffered when the replay closed the synchronizer
    pub left_buffered: usize,

    /// Synchronizer counters at the end of the run
    pub sync: SyncStatsSnapshot,

    /// Bundles seen by the consumer
    pub bundles: SyncMetricsAggregator,
}

impl ReplayStats {
    /// Bundles received per second
    pub fn bundles_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.bundles.summary().total_bundles as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                     Replay Statistics                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Seed: {}", self.seed);
        println!("   ├─ Channels: {}", self.channels);
        println!("   ├─ Values sent: {}", self.messages_sent);
        println!("   ├─ Values dropped at source: {}", self.messages_dropped);
        println!("   ├─ Values rejected: {}", self.messages_rejected);
        println!("   └─ Bundles/s: {:.2}", self.bundles_per_sec());

        let sync = &self.sync;
        println!("\n⚙️  Synchronizer");
        println!("   ├─ Complete bundles: {}", sync.complete);
        println!("   ├─ Incomplete bundles: {}", sync.incomplete);
        println!("   ├─ Evicted pulses: {}", sync.evicted);
        println!("   ├─ Startup discarded: {}", sync.startup_discarded);
        println!("   ├─ Stale values: {}", sync.stale);
        println!("   ├─ Duplicate values: {}", sync.duplicates);
        println!("   ├─ Queue full drops: {}", sync.queue_full);
        println!("   └─ Left buffered: {}", self.left_buffered);

        let summary = self.bundles.summary();
        println!("\n📈 Consumer");
        println!("   ├─ Bundles received: {}", summary.total_bundles);
        println!(
            "   ├─ Incomplete: {} ({:.2}%)",
            summary.incomplete_bundles, summary.incomplete_rate
        );
        println!("   ├─ Skipped pulses: {}", summary.skipped_pulses);
        println!("   ├─ Order violations: {}", summary.order_violations);
        println!("   └─ Mean fill ratio: {:.3}", summary.fill_ratio.mean);

        if !summary.channel_counts.is_empty() {
            println!("\n📡 Values per Channel");
            let mut channels: Vec<_> = summary.channel_counts.iter().collect();
            channels.sort();
            for (i, (channel, count)) in channels.iter().enumerate() {
                let prefix = if i == channels.len() - 1 { "└─" } else { "├─" };
                println!("   {} {}: {}", prefix, channel, count);
            }
        }

        println!();
    }
}
