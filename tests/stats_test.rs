/// Counter, extrapolation and sampler behaviour, including CSV output
#[cfg(test)]
mod tests {
    use stampede::failure::FailureKind;
    use stampede::operation::OperationType;
    use stampede::stats::{
        extrapolate, CollectingConsumer, Counter, CsvFormatter, MetricReading, MetricSource,
        NoMetrics, Sampler, SamplerConfig, SamplingInterval,
    };
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_counter_success_sum_matches_updates() {
        let counter = Counter::new(OperationType::Read);
        let spans = [(0u64, 3u64), (10, 10), (5, 105), (7, 8)];
        for (start, end) in spans {
            counter.update(start, end, &[]).unwrap();
        }
        let values = counter.get_and_reset();
        assert_eq!(values.success_count, 4);
        assert_eq!(values.success_duration_nanos, 3 + 0 + 100 + 1);

        let empty = counter.get_and_reset();
        assert_eq!(empty.success_count, 0);
        assert_eq!(empty.success_duration_nanos, 0);
    }

    #[test]
    fn test_counter_contract_violations() {
        let counter = Counter::new(OperationType::Write);
        assert!(counter.update(2, 1, &[]).is_err());
        assert!(counter
            .update(1, 2, &[FailureKind::Timeout, FailureKind::Timeout])
            .is_err());
        assert_eq!(counter.get_and_reset().total_count(), 0);
    }

    #[test]
    fn test_failure_kind_survives_reset() {
        let counter = Counter::new(OperationType::Send);
        counter.update(0, 1, &[FailureKind::PoolExhausted]).unwrap();
        counter.get_and_reset();
        let values = counter.get_and_reset();
        assert!(values.failures.contains_key(&FailureKind::PoolExhausted));
        assert_eq!(values.failure(FailureKind::PoolExhausted).count, 0);
    }

    #[test]
    fn test_extrapolation_conserves_counts() {
        let counter = Counter::new(OperationType::Read);
        for i in 0..1_003u64 {
            let failure = if i % 7 == 0 { vec![FailureKind::Timeout] } else { vec![] };
            counter.update(0, i % 13, &failure).unwrap();
        }
        let mut recorded = SamplingInterval::new(0, 1_000);
        recorded
            .counters
            .insert(OperationType::Read, counter.get_and_reset());
        let original = recorded.values(OperationType::Read).unwrap().clone();

        for extra in [0i64, 1, 4, 9, 250] {
            let windows = extrapolate(&recorded, extra).unwrap();
            assert_eq!(windows.len() as i64, extra + 1);
            let successes: u64 = windows
                .iter()
                .map(|w| w.values(OperationType::Read).unwrap().success_count)
                .sum();
            let timeouts: u64 = windows
                .iter()
                .map(|w| {
                    w.values(OperationType::Read)
                        .unwrap()
                        .failure(FailureKind::Timeout)
                        .count
                })
                .sum();
            assert_eq!(successes, original.success_count);
            assert_eq!(timeouts, original.failure(FailureKind::Timeout).count);
        }
        assert_eq!(extrapolate(&recorded, 0).unwrap(), vec![recorded.clone()]);
        assert!(extrapolate(&recorded, -3).is_err());
    }

    #[test]
    fn test_concurrent_recording_through_sampler() {
        let sampler = Arc::new(
            Sampler::new(
                SamplerConfig {
                    sampling_interval_ms: 100,
                    run_interval_ms: 100,
                },
                [OperationType::Read, OperationType::Write],
                Box::new(NoMetrics),
            )
            .unwrap(),
        );
        let consumer = CollectingConsumer::new();
        sampler.add_consumer(Box::new(consumer.clone()));
        sampler.open(0).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let sampler = sampler.clone();
                std::thread::spawn(move || {
                    for i in 0..2_500u64 {
                        let op = if (i + t) % 2 == 0 {
                            OperationType::Read
                        } else {
                            OperationType::Write
                        };
                        sampler.record(op, i, i + 1, None).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(sampler.sample(250).unwrap(), 2);
        sampler.close(260).unwrap();
        let total: u64 = consumer
            .intervals()
            .iter()
            .map(|i| i.total_operations())
            .sum();
        assert_eq!(total, 10_000);
    }

    struct Gauge;

    impl MetricSource for Gauge {
        fn collect(&self) -> Vec<MetricReading> {
            vec![MetricReading::new("queue-depth", 3.0)]
        }
    }

    #[test]
    fn test_csv_file_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.csv");

        let sampler = Sampler::new(
            SamplerConfig {
                sampling_interval_ms: 1_000,
                run_interval_ms: 250,
            },
            [OperationType::Write],
            Box::new(Gauge),
        )
        .unwrap();
        sampler.add_consumer(Box::new(
            CsvFormatter::create(&path, vec![OperationType::Write]).unwrap(),
        ));
        sampler.open(0).unwrap();
        for _ in 0..20 {
            sampler.record(OperationType::Write, 0, 2_000_000, None).unwrap();
        }
        sampler
            .record(OperationType::Write, 0, 1, Some(FailureKind::BrokenPipe))
            .unwrap();
        sampler.annotate("node 2 restarted, rebalancing");
        sampler.sample(1_000).unwrap();
        sampler.close(1_500).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp,write success/s,write avg ms"));
        assert!(lines[0].contains("write broken-pipe/s"));
        assert!(lines[0].ends_with("queue-depth,notes"));
        assert!(lines[1].starts_with("1970-01-01T00:00:00.000Z,20.00,2.000,"));
        assert!(lines[1].ends_with(",3.00,\"node 2 restarted, rebalancing\""));
        assert!(lines[2].starts_with("1970-01-01T00:00:01.000Z,0.00,,"));
    }
}
