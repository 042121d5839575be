use clap::{Parser, Subcommand};
use stampede::config::LoadConfiguration;
use stampede::error::{exit_code, LoadError};
use stampede::key::{InMemoryKeyStore, KeyProvider};
use stampede::logging::init_logging;
use stampede::operation::OperationType;
use stampede::runner::{
    install_signal_handler, RunSummary, RunnerBuilder, RunnerConfig, StrategyFactory,
};
use stampede::service::ServiceRegistry;
use stampede::stats::{CsvFormatter, Sampler, SamplerConfig, SystemMetrics};
use stampede::strategy::{LoadStrategy, StrategyRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "stampede")]
#[command(about = "Drive load against caches and message brokers and report windowed statistics")]
#[command(version)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a load test described by a JSON configuration file
    Run {
        /// Configuration file
        #[arg(short, long, env = "STAMPEDE_CONFIG")]
        config: PathBuf,

        /// Override the number of worker threads
        #[arg(short, long)]
        threads: Option<usize>,

        /// Override the run length in seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Write CSV rows to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the registered strategies and services
    List,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.json_logs) {
        eprintln!("warning: logging not initialized: {}", e);
    }

    let result = match cli.command {
        Command::Run {
            config,
            threads,
            duration,
            output,
        } => load_config(&config, threads, duration, output).and_then(|config| run(&config)),
        Command::List => {
            list();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("stampede: {}", e);
        std::process::exit(exit_code(&e));
    }
}

fn load_config(
    path: &Path,
    threads: Option<usize>,
    duration: Option<u64>,
    output: Option<PathBuf>,
) -> Result<LoadConfiguration, LoadError> {
    let mut config = LoadConfiguration::from_file(path)?;
    if let Some(threads) = threads {
        config.threads = threads;
    }
    if let Some(duration) = duration {
        config.duration_secs = Some(duration);
    }
    if output.is_some() {
        config.output = output;
    }
    config.validate()?;
    Ok(config)
}

fn list() {
    println!("Strategies:");
    for name in StrategyRegistry::with_builtins().names() {
        println!("  {}", name);
    }
    println!("Services:");
    for name in ServiceRegistry::with_builtins().names() {
        println!("  {}", name);
    }
}

fn run(config: &LoadConfiguration) -> Result<(), LoadError> {
    let strategies = Arc::new(StrategyRegistry::with_builtins());
    let services = ServiceRegistry::with_builtins();

    // resolves the name before anything is started
    let operations: Vec<OperationType> = strategies
        .create(&config.strategy.name)?
        .operation_types();
    let service = services.create(&config.service)?;

    let sampler = Arc::new(Sampler::new(
        SamplerConfig {
            sampling_interval_ms: config.sampling_interval_ms,
            run_interval_ms: config.sampler_run_interval_ms,
        },
        operations.iter().copied(),
        Box::new(SystemMetrics::new()),
    )?);
    match &config.output {
        Some(path) => sampler.add_consumer(Box::new(CsvFormatter::create(path, operations)?)),
        None => sampler.add_consumer(Box::new(CsvFormatter::new(std::io::stdout(), operations))),
    }

    let key_store = config
        .key_store
        .as_ref()
        .map(|ks| Arc::new(InMemoryKeyStore::preloaded(ks.capacity, ks.keys.iter().cloned())));

    let name = config.strategy.name.clone();
    let shared_keys: Option<Arc<dyn KeyProvider>> = match &key_store {
        Some(store) if config.strategy.use_key_store => Some(store.clone()),
        _ => None,
    };
    let factory: StrategyFactory = Box::new(
        move |_: usize| -> Result<Box<dyn LoadStrategy>, LoadError> {
            let mut strategy = strategies.create(&name)?;
            if let Some(keys) = &shared_keys {
                strategy.attach_key_provider(Arc::clone(keys))?;
            }
            Ok(strategy)
        },
    );

    let mut builder = RunnerBuilder::new(RunnerConfig::from(config))
        .service(service, config.service.clone())
        .sampler(sampler)
        .strategies(factory, config.strategy.clone());
    if let Some(store) = key_store {
        builder = builder.key_store(store);
    }

    let runner = builder.build()?;
    if let Err(e) = install_signal_handler(runner.shutdown_handle()) {
        tracing::warn!(error = %e, "Signal handler not installed, only the run duration ends the run");
    }
    let summary = runner.run()?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    eprintln!("\nRun summary");
    eprintln!("===========");
    eprintln!("Workers:          {}", summary.workers);
    eprintln!("Operations:       {}", summary.total_operations);
    eprintln!("  successful:     {}", summary.successful_operations);
    eprintln!("  failed:         {}", summary.failed_operations);
    for (kind, count) in &summary.failures_by_kind {
        eprintln!("    {:<20}{}", kind.label(), count);
    }
    eprintln!("Elapsed:          {} ms", summary.elapsed_ms);
    eprintln!("Throughput:       {:.2} ops/s", summary.throughput_ops_per_sec());
    eprintln!("Success rate:     {:.2}%", summary.success_rate());
    eprintln!("Intervals:        {}", summary.intervals_emitted);
}
