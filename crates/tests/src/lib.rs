//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Reference delivery scenarios
//! - Concurrent producers and consumers
//! - Configuration file to synchronizer

#[cfg(test)]
mod support {
    use contracts::{ChannelMessage, ChannelSchedule, SynchronizerConfig};
    use sync_engine::{BundleReceiver, SyncedBundle};

    pub fn msg(channel: &str, pulse_id: i64) -> ChannelMessage {
        ChannelMessage::empty(channel, pulse_id)
    }

    pub fn two_channels(b_period: i64, max_buffered: usize) -> SynchronizerConfig {
        SynchronizerConfig::new(vec![
            ChannelSchedule::every_pulse("A"),
            ChannelSchedule::new("B", b_period, 0),
        ])
        .with_max_buffered_pulses(max_buffered)
    }

    pub fn drain(rx: &BundleReceiver<ChannelMessage>) -> Vec<SyncedBundle<ChannelMessage>> {
        let mut out = Vec::new();
        while let Ok(bundle) = rx.try_recv() {
            out.push(bundle);
        }
        out
    }
}

#[cfg(test)]
mod scenario_tests {
    use super::support::*;
    use sync_engine::{AddOutcome, PulseSynchronizer};

    #[test]
    fn test_out_of_order_pair_then_stale_replay() {
        let sync = PulseSynchronizer::new(two_channels(1, 3)).unwrap();
        let rx = sync.receiver().unwrap();

        for m in [msg("A", 1), msg("A", 2), msg("B", 2), msg("B", 1)] {
            assert_eq!(sync.add_message(m), AddOutcome::Buffered);
        }

        let bundles = drain(&rx);
        assert_eq!(bundles.len(), 2);
        assert_eq!(bundles[0].pulse_id, 1);
        assert_eq!(bundles[0].channels(), vec!["A", "B"]);
        assert_eq!(bundles[1].pulse_id, 2);
        assert_eq!(bundles[1].channels(), vec!["A", "B"]);
        assert_eq!(sync.buffered_pulse_count(), 0);

        // Older than the last resolved pulse
        assert_eq!(sync.add_message(msg("A", 0)), AddOutcome::Stale);
        assert_eq!(sync.add_message(msg("B", 0)), AddOutcome::Stale);
        assert_eq!(sync.buffered_pulse_count(), 0);
        assert!(drain(&rx).is_empty());
        assert_eq!(sync.stats().stale(), 2);
    }

    #[test]
    fn test_sub_rate_channel_releases_every_pulse() {
        let sync = PulseSynchronizer::new(two_channels(10, 4)).unwrap();
        let rx = sync.receiver().unwrap();

        sync.add_message(msg("A", 0));
        assert!(drain(&rx).is_empty());
        sync.add_message(msg("B", 0));

        let first = drain(&rx);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].pulse_id, 0);
        assert_eq!(first[0].channels(), vec!["A", "B"]);

        for pulse_id in 1..10 {
            sync.add_message(msg("A", pulse_id));
            let bundles = drain(&rx);
            assert_eq!(bundles.len(), 1, "pulse {pulse_id}");
            assert_eq!(bundles[0].pulse_id, pulse_id);
            assert_eq!(bundles[0].channels(), vec!["A"]);
            assert!(bundles[0].is_complete());
        }
    }

    #[test]
    fn test_size_eviction_without_incomplete_delivery() {
        let sync = PulseSynchronizer::new(two_channels(1, 3)).unwrap();
        let rx = sync.receiver().unwrap();

        for pulse_id in 3..=6 {
            sync.add_message(msg("A", pulse_id));
        }

        assert!(drain(&rx).is_empty());
        assert_eq!(sync.buffered_pulse_count(), 3);
        assert_eq!(sync.stats().evicted(), 1);
        assert_eq!(sync.last_resolved_boundary(), Some(3));

        // The evicted pulse can no longer be completed
        assert_eq!(sync.add_message(msg("B", 3)), AddOutcome::Stale);
    }

    #[test]
    fn test_size_eviction_with_incomplete_delivery() {
        let sync =
            PulseSynchronizer::new(two_channels(1, 3).with_send_incomplete(true)).unwrap();
        let rx = sync.receiver().unwrap();

        for pulse_id in 3..=6 {
            sync.add_message(msg("A", pulse_id));
        }

        let bundles = drain(&rx);
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].pulse_id, 3);
        assert!(!bundles[0].is_complete());
        assert_eq!(bundles[0].expected, 2);
    }
}

#[cfg(test)]
mod concurrency_tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    use contracts::{ChannelMessage, ChannelSchedule, DeliveryMode, SynchronizerConfig};
    use rand::seq::SliceRandom;
    use sync_engine::PulseSynchronizer;

    use super::support::*;

    fn channels(n: usize) -> Vec<ChannelSchedule> {
        (0..n)
            .map(|i| ChannelSchedule::every_pulse(format!("CH{i}")))
            .collect()
    }

    #[test]
    fn test_load_all_bundles_complete_and_ordered() {
        const PRODUCERS: usize = 8;
        const PULSES: i64 = 500;

        let config = SynchronizerConfig::new(channels(PRODUCERS))
            .with_max_buffered_pulses(PULSES as usize * 2)
            .with_delivery(DeliveryMode::Push {
                queue_capacity: PULSES as usize * 2,
            });
        let sync = Arc::new(PulseSynchronizer::new(config).unwrap());
        let rx = sync.receiver().unwrap();
        let barrier = Arc::new(Barrier::new(PRODUCERS));

        let handles: Vec<_> = (0..PRODUCERS)
            .map(|i| {
                let sync = Arc::clone(&sync);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let channel = format!("CH{i}");
                    barrier.wait();
                    for pulse_id in 0..PULSES {
                        sync.add_message(msg(&channel, pulse_id));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(sync.buffered_pulse_count(), 0);
        let bundles = drain(&rx);
        assert_eq!(bundles.len(), PULSES as usize);
        for (expected_id, bundle) in (0..PULSES).zip(&bundles) {
            assert_eq!(bundle.pulse_id, expected_id);
            assert_eq!(bundle.len(), PRODUCERS);
            assert!(bundle.is_complete());
        }
        assert_eq!(sync.stats().complete(), PULSES as u64);
        assert_eq!(sync.stats().evicted(), 0);
    }

    #[test]
    fn test_load_with_local_reordering() {
        const PRODUCERS: usize = 4;
        const PULSES: i64 = 400;

        let config = SynchronizerConfig::new(channels(PRODUCERS))
            .with_max_buffered_pulses(PULSES as usize * 2)
            .with_delivery(DeliveryMode::Push {
                queue_capacity: PULSES as usize * 2,
            });
        let sync = Arc::new(PulseSynchronizer::new(config).unwrap());
        let rx = sync.receiver().unwrap();

        let handles: Vec<_> = (0..PRODUCERS)
            .map(|i| {
                let sync = Arc::clone(&sync);
                thread::spawn(move || {
                    let channel = format!("CH{i}");
                    let mut pulses: Vec<i64> = (0..PULSES).collect();
                    let mut rng = rand::rng();
                    for window in pulses.chunks_mut(5) {
                        window.shuffle(&mut rng);
                    }
                    for pulse_id in pulses {
                        sync.add_message(msg(&channel, pulse_id));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let ids: Vec<i64> = drain(&rx).iter().map(|b| b.pulse_id).collect();
        assert_eq!(ids, (0..PULSES).collect::<Vec<_>>());
        assert_eq!(sync.buffered_pulse_count(), 0);
    }

    #[test]
    fn test_concurrent_pull_consumers_never_overlap() {
        const PRODUCERS: usize = 4;
        const CONSUMERS: usize = 3;
        const PULSES: i64 = 300;

        let config = SynchronizerConfig::new(channels(PRODUCERS))
            .with_max_buffered_pulses(PULSES as usize * 2)
            .with_delivery(DeliveryMode::Pull);
        let sync = Arc::new(PulseSynchronizer::new(config).unwrap());

        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let sync = Arc::clone(&sync);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some(bundle) = sync.next_message() {
                        assert_eq!(bundle.len(), PRODUCERS);
                        seen.push(bundle.pulse_id);
                    }
                    seen
                })
            })
            .collect();

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|i| {
                let sync = Arc::clone(&sync);
                thread::spawn(move || {
                    let channel = format!("CH{i}");
                    for pulse_id in 0..PULSES {
                        sync.add_message(msg(&channel, pulse_id));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        while sync.pending_bundles() > 0 {
            thread::sleep(Duration::from_millis(1));
        }
        sync.close();

        let mut all = HashSet::new();
        for consumer in consumers {
            let seen = consumer.join().unwrap();
            assert!(
                seen.windows(2).all(|w| w[0] < w[1]),
                "consumer saw decreasing pulse ids"
            );
            for pulse_id in seen {
                assert!(all.insert(pulse_id), "pulse {pulse_id} delivered twice");
            }
        }
        assert_eq!(all.len(), PULSES as usize);
    }

    #[test]
    fn test_pull_late_slow_consumer_small_buffer() {
        const PRODUCERS: usize = 4;
        const PULSES: i64 = 200;

        let config = SynchronizerConfig::new(channels(PRODUCERS))
            .with_max_buffered_pulses(4)
            .with_delivery(DeliveryMode::Pull);
        let sync = Arc::new(PulseSynchronizer::<ChannelMessage>::new(config).unwrap());

        let consumer = {
            let sync = Arc::clone(&sync);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                let mut seen = Vec::new();
                while seen.len() < PULSES as usize {
                    let Some(bundle) = sync.next_message_timeout(Duration::from_secs(5)) else {
                        break;
                    };
                    assert!(bundle.is_complete());
                    seen.push(bundle.pulse_id);
                    thread::sleep(Duration::from_micros(200));
                }
                seen
            })
        };

        // Producers advance pulse by pulse so the buffer itself never overflows.
        let barrier = Arc::new(Barrier::new(PRODUCERS));
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|i| {
                let sync = Arc::clone(&sync);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let channel = format!("CH{i}");
                    for pulse_id in 0..PULSES {
                        sync.add_message(msg(&channel, pulse_id));
                        barrier.wait();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let seen = consumer.join().unwrap();
        assert_eq!(seen, (0..PULSES).collect::<Vec<_>>());
        let snapshot = sync.stats().snapshot();
        assert_eq!(snapshot.complete, PULSES as u64);
        assert_eq!(snapshot.queue_full, 0);
        assert_eq!(snapshot.evicted, 0);
        assert_eq!(sync.buffered_pulse_count(), 0);
    }

    #[test]
    fn test_close_releases_parked_consumers() {
        let config = two_channels(1, 10).with_delivery(DeliveryMode::Pull);
        let sync = Arc::new(PulseSynchronizer::<ChannelMessage>::new(config).unwrap());

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let sync = Arc::clone(&sync);
                thread::spawn(move || sync.next_message())
            })
            .collect();

        while sync.waiting_consumers() < 4 {
            thread::sleep(Duration::from_millis(1));
        }
        sync.close();
        sync.close();

        for consumer in consumers {
            assert!(consumer.join().unwrap().is_none());
        }
        assert!(sync.is_closed());
    }

    #[test]
    fn test_at_most_once_under_eviction_races() {
        const PRODUCERS: usize = 6;
        const PULSES: i64 = 400;

        // Small buffer: evictions and completions race on the oldest pulse.
        let config = SynchronizerConfig::new(channels(PRODUCERS))
            .with_max_buffered_pulses(4)
            .with_send_incomplete(true)
            .with_delivery(DeliveryMode::Push {
                queue_capacity: PULSES as usize * 2,
            });
        let sync = Arc::new(PulseSynchronizer::new(config).unwrap());
        let rx = sync.receiver().unwrap();

        let handles: Vec<_> = (0..PRODUCERS)
            .map(|i| {
                let sync = Arc::clone(&sync);
                thread::spawn(move || {
                    let channel = format!("CH{i}");
                    let mut pulses: Vec<i64> = (0..PULSES).collect();
                    pulses.shuffle(&mut rand::rng());
                    for pulse_id in pulses {
                        sync.add_message(msg(&channel, pulse_id));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let ids: Vec<i64> = drain(&rx).iter().map(|b| b.pulse_id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        let snapshot = sync.stats().snapshot();
        assert_eq!(snapshot.delivered(), ids.len() as u64);
        assert!(sync.buffered_pulse_count() <= 4);
    }
}

#[cfg(test)]
mod async_tests {
    use std::sync::Arc;

    use contracts::DeliveryMode;
    use observability::SyncMetricsAggregator;
    use sync_engine::PulseSynchronizer;

    use super::support::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_async_consumer_with_blocking_producers() {
        let config = two_channels(2, 128).with_delivery(DeliveryMode::Push {
            queue_capacity: 256,
        });
        let sync = Arc::new(PulseSynchronizer::new(config).unwrap());
        let rx = sync.receiver().unwrap();

        let consumer = tokio::spawn(async move {
            let mut aggregator = SyncMetricsAggregator::new();
            while let Ok(bundle) = rx.recv().await {
                aggregator.update(&bundle);
            }
            aggregator
        });

        let producers: Vec<_> = [("A", 1), ("B", 2)]
            .into_iter()
            .map(|(channel, period)| {
                let sync = Arc::clone(&sync);
                tokio::task::spawn_blocking(move || {
                    for pulse_id in (0..100).filter(|p| p % period == 0) {
                        sync.add_message(msg(channel, pulse_id));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.await.unwrap();
        }
        sync.close();

        let summary = consumer.await.unwrap().summary();
        assert_eq!(summary.total_bundles, 100);
        assert_eq!(summary.complete_bundles, 100);
        assert_eq!(summary.order_violations, 0);
        assert_eq!(summary.skipped_pulses, 0);
        assert_eq!(summary.channel_counts.get("A"), Some(&100));
        assert_eq!(summary.channel_counts.get("B"), Some(&50));
    }
}

#[cfg(test)]
mod config_tests {
    use std::io::Write;

    use config_loader::ConfigLoader;
    use contracts::DeliveryMode;
    use sync_engine::{PulseSynchronizer, SyncedBundle};

    use super::support::*;

    #[test]
    fn test_config_file_to_pull_synchronizer() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(
            br#"
max_buffered_pulses = 8
send_incomplete = true

[delivery]
mode = "pull"

[[channels]]
name = "BPM1:X"

[[channels]]
name = "CAM1:IMAGE"
period = 4
phase = 2
"#,
        )
        .unwrap();

        let config = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(config.delivery, DeliveryMode::Pull);
        let sync = PulseSynchronizer::new(config).unwrap();

        sync.add_message(msg("BPM1:X", 0));
        sync.add_message(msg("BPM1:X", 1));
        sync.add_message(msg("BPM1:X", 2));
        let first: Vec<SyncedBundle<_>> = std::iter::from_fn(|| sync.try_next_message()).collect();
        let ids: Vec<i64> = first.iter().map(|b| b.pulse_id).collect();
        assert_eq!(ids, vec![0, 1]);

        // Pulse 2 waits for the camera
        sync.add_message(msg("CAM1:IMAGE", 2));
        let bundle = sync.try_next_message().unwrap();
        assert_eq!(bundle.pulse_id, 2);
        assert_eq!(bundle.channels(), vec!["BPM1:X", "CAM1:IMAGE"]);
        assert!(sync.try_next_message().is_none());
    }

    #[test]
    fn test_json_config_round_trip_builds_same_schedules() {
        let config = two_channels(5, 20).with_max_pulse_age_ms(250);
        let json = ConfigLoader::to_json(&config).unwrap();
        let loaded = ConfigLoader::load_from_str(&json, config_loader::ConfigFormat::Json).unwrap();

        let sync = PulseSynchronizer::<contracts::ChannelMessage>::new(loaded).unwrap();
        assert_eq!(sync.schedules().expected_channels(10), vec!["A", "B"]);
        assert_eq!(sync.schedules().expected_channels(11), vec!["A"]);
        assert_eq!(sync.config().max_pulse_age_ms, Some(250));
    }
}
