/// Many-worker runs against the in-memory services
#[cfg(test)]
mod scalability_tests {
    use stampede::config::{CacheServiceConfig, MessagingServiceConfig, ServiceConfig, StrategyConfig};
    use stampede::error::LoadError;
    use stampede::operation::OperationType;
    use stampede::runner::{RunSummary, RunnerBuilder, RunnerConfig, StrategyFactory};
    use stampede::service::{InMemoryBroker, InMemoryCache};
    use stampede::stats::{CollectingConsumer, NoMetrics, Sampler, SamplerConfig};
    use stampede::strategy::{LoadStrategy, StrategyRegistry};
    use std::sync::Arc;
    use std::time::Duration;

    fn sampler(ops: &[OperationType], consumer: &CollectingConsumer) -> Arc<Sampler> {
        let sampler = Sampler::new(
            SamplerConfig {
                sampling_interval_ms: 100,
                run_interval_ms: 20,
            },
            ops.iter().copied(),
            Box::new(NoMetrics),
        )
        .unwrap();
        sampler.add_consumer(Box::new(consumer.clone()));
        Arc::new(sampler)
    }

    fn factory(name: &'static str) -> StrategyFactory {
        let registry = StrategyRegistry::with_builtins();
        Box::new(move |_: usize| -> Result<Box<dyn LoadStrategy>, LoadError> {
            registry.create(name)
        })
    }

    fn print_summary(title: &str, summary: &RunSummary) {
        println!("\n{}", title);
        println!("{}", "=".repeat(title.len()));
        println!("Workers: {}", summary.workers);
        println!("Total operations: {}", summary.total_operations);
        println!("Success rate: {:.2}%", summary.success_rate());
        println!("Throughput: {:.2} ops/sec", summary.throughput_ops_per_sec());
        println!("Intervals emitted: {}", summary.intervals_emitted);
    }

    /// Stress test: many workers sharing one cache
    #[test]
    fn test_many_workers_write_then_read() {
        let cache = Arc::new(InMemoryCache::default());
        let consumer = CollectingConsumer::new();
        let mut strategy = StrategyConfig::named("write-then-read");
        strategy.key_count = Some(500);
        strategy.value_size = 64;

        let summary = RunnerBuilder::new(RunnerConfig::new(32))
            .service(cache.clone(), ServiceConfig::Cache(CacheServiceConfig::default()))
            .sampler(sampler(&[OperationType::Read, OperationType::Write], &consumer))
            .strategies(factory("write-then-read"), strategy)
            .build()
            .unwrap()
            .run()
            .unwrap();

        print_summary("Many Workers Write-Then-Read", &summary);

        assert_eq!(summary.workers, 32);
        assert_eq!(summary.total_operations, 32 * 500);
        assert_eq!(summary.failed_operations, 0);
        assert_eq!(cache.len(), 32 * 250);

        let sampled: u64 = consumer
            .intervals()
            .iter()
            .map(|i| i.total_operations())
            .sum();
        assert_eq!(sampled, summary.total_operations);
    }

    /// Timed run: workers keep going until the deadline
    #[test]
    fn test_timed_run_spans_several_intervals() {
        let consumer = CollectingConsumer::new();
        let mut config = RunnerConfig::new(8);
        config.duration = Some(Duration::from_millis(350));

        let summary = RunnerBuilder::new(config)
            .service(
                Arc::new(InMemoryCache::default()),
                ServiceConfig::Cache(CacheServiceConfig::default()),
            )
            .sampler(sampler(&[OperationType::Read, OperationType::Write], &consumer))
            .strategies(
                factory("read-then-write-on-miss"),
                StrategyConfig::named("read-then-write-on-miss"),
            )
            .build()
            .unwrap()
            .run()
            .unwrap();

        print_summary("Timed Read-Then-Write-On-Miss", &summary);

        assert!(summary.total_operations > 0);
        assert!(summary.elapsed_ms >= 350);
        let intervals = consumer.intervals();
        assert!(intervals.len() >= 3, "only {} intervals", intervals.len());
        for pair in intervals.windows(2) {
            assert_eq!(pair[1].start_ms, pair[0].end_ms());
        }
    }

    /// Producers fill a queue that consumers then drain
    #[test]
    fn test_send_then_receive_drains_queue() {
        let broker = Arc::new(InMemoryBroker::default());
        let service = ServiceConfig::Messaging(MessagingServiceConfig::default());

        let mut send = StrategyConfig::named("send");
        send.key_count = Some(50);
        let sent = RunnerBuilder::new(RunnerConfig::new(4))
            .service(broker.clone(), service.clone())
            .sampler(sampler(
                &[OperationType::Send, OperationType::CloseSession],
                &CollectingConsumer::new(),
            ))
            .strategies(factory("send"), send)
            .build()
            .unwrap()
            .run()
            .unwrap();
        print_summary("Send", &sent);
        assert_eq!(broker.depth("stampede-queue"), 200);

        let mut receive = StrategyConfig::named("receive");
        receive.key_count = Some(50);
        let received = RunnerBuilder::new(RunnerConfig::new(4))
            .service(broker.clone(), service)
            .sampler(sampler(
                &[OperationType::Receive, OperationType::CloseSession],
                &CollectingConsumer::new(),
            ))
            .strategies(factory("receive"), receive)
            .build()
            .unwrap()
            .run()
            .unwrap();
        print_summary("Receive", &received);

        assert_eq!(received.failed_operations, 0);
        assert_eq!(broker.depth("stampede-queue"), 0);
        assert_eq!(broker.open_sessions(), 0);
    }
}
