//! pcmon - Host Telemetry Streamer Binary
//!
//! Samples host telemetry once per interval and writes each sample as a JSON
//! line to the serial-attached display.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use pcmon::link::{self, config::DEFAULT_SERIAL_PORT};
use pcmon::{
    GpuCapability, LinkConfig, Sample, SampleBuilder, Scaling, SysinfoHost, TemperatureProbe,
    UtilizationCollector, DEFAULT_BAUD_RATE, DEFAULT_INTERVAL_MS,
};
use std::io;
use tokio_stream::StreamExt;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "pcmon")]
#[command(about = "Stream host telemetry to a serial status display")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = "Samples CPU/GPU load and temperature, memory, network and disk \
activity, and writes one JSON line per interval to a serial-attached display")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Serial port the display is attached to
    #[arg(short, long, default_value = DEFAULT_SERIAL_PORT)]
    port: String,

    /// Serial baud rate
    #[arg(short, long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Sampling interval in milliseconds
    #[arg(short, long, default_value_t = DEFAULT_INTERVAL_MS)]
    interval: u64,

    /// Hardware monitor sensor tree URL
    #[arg(long, default_value = pcmon::metrics::temperature::DEFAULT_SENSOR_URL)]
    sensor_url: String,

    /// Sensor service timeout in milliseconds
    #[arg(long, default_value_t = pcmon::metrics::temperature::DEFAULT_SENSOR_TIMEOUT_MS)]
    sensor_timeout: u64,

    /// Upload KB per interval that counts as one percent
    #[arg(long, default_value_t = Scaling::default().net_up_kbps_per_percent)]
    net_up_scale: f64,

    /// Download KB per interval that counts as one percent
    #[arg(long, default_value_t = Scaling::default().net_down_kbps_per_percent)]
    net_down_scale: f64,

    /// Percent per MB of disk traffic per interval
    #[arg(long, default_value_t = Scaling::default().disk_percent_per_mbps)]
    disk_scale: f64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Cli {
    fn link_config(&self) -> LinkConfig {
        LinkConfig::new(&self.port, self.baud)
            .with_interval_ms(self.interval)
            .with_sensor_url(&self.sensor_url)
            .with_sensor_timeout_ms(self.sensor_timeout)
            .with_scaling(Scaling {
                net_up_kbps_per_percent: self.net_up_scale,
                net_down_kbps_per_percent: self.net_down_scale,
                disk_percent_per_mbps: self.disk_scale,
            })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Stream samples to the display (default)
    Stream(StreamArgs),

    /// Take a single sample and exit
    Snapshot(SnapshotArgs),

    /// Show which sensors are available
    Info,
}

#[derive(Args, Default)]
struct StreamArgs {
    /// Write lines to stdout instead of the serial port
    #[arg(long)]
    stdout: bool,
}

#[derive(Args)]
struct SnapshotArgs {
    /// Output format: json or pretty
    #[arg(short, long, default_value = "pretty")]
    format: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging
    init_logging(&cli)?;

    let config = cli.link_config();
    config.validate()?;

    match &cli.command {
        Some(Commands::Stream(args)) => stream_command(&config, args).await?,
        Some(Commands::Snapshot(args)) => snapshot_command(&config, args).await?,
        Some(Commands::Info) => info_command(&config).await?,
        None => stream_command(&config, &StreamArgs::default()).await?,
    }

    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    // Logs go to stderr so `stream --stdout` output stays clean.
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn print_banner() {
    println!("pcmon - host telemetry for serial displays");
    println!("   Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
}

fn build_sampler(config: &LinkConfig) -> SampleBuilder<SysinfoHost> {
    let probe = TemperatureProbe::with_default_sources(&config.sensor_url, config.sensor_timeout());
    let utilization = UtilizationCollector::new(GpuCapability::detect());

    SampleBuilder::new(SysinfoHost::new(), probe, utilization, config.scaling)
}

async fn warn_if_no_cpu_temperature(builder: &SampleBuilder<SysinfoHost>) {
    let reading = builder.probe().probe().await;
    match reading.celsius {
        Some(celsius) => info!("CPU temperature from {}: {}°C", reading.provenance, celsius),
        None => warn!(
            "No CPU temperature source answered, cput will read 0. Make sure the hardware \
             monitor is running as administrator with its web server enabled."
        ),
    }
}

async fn stream_command(config: &LinkConfig, args: &StreamArgs) -> anyhow::Result<()> {
    info!("Starting pcmon...");

    if args.stdout {
        let builder = build_sampler(config);
        warn_if_no_cpu_temperature(&builder).await;

        let shutdown = link::shutdown_signal()?;
        let mut emitter = pcmon::LineEmitter::new(io::stdout());
        let sent = link::run(builder.into_stream(config.interval()), &mut emitter, shutdown).await?;
        info!("Wrote {} samples to stdout", sent);
        return Ok(());
    }

    print_banner();
    let mut emitter = link::open_serial(config)?;
    println!("Streaming to {}...", config.port);

    let builder = build_sampler(config);
    warn_if_no_cpu_temperature(&builder).await;

    info!("Link configuration:");
    info!("  - Port: {} @ {} baud", config.port, config.baud);
    info!("  - Interval: {}ms", config.interval_ms);
    info!("  - Sensor service: {}", config.sensor_url);

    let shutdown = link::shutdown_signal()?;
    let result = link::run(builder.into_stream(config.interval()), &mut emitter, shutdown).await;
    match result {
        Ok(sent) => {
            info!("Stopped after {} samples", sent);
            Ok(())
        }
        Err(err) => {
            error!("Link failed: {}", err);
            Err(err.into())
        }
    }
}

async fn snapshot_command(config: &LinkConfig, args: &SnapshotArgs) -> anyhow::Result<()> {
    let mut samples = build_sampler(config).into_stream(config.interval());
    let sample = samples
        .next()
        .await
        .context("sampler produced no sample")?;

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string(&sample)?),
        "pretty" => print_pretty_sample(&sample),
        other => bail!("Unsupported format: {}. Use 'json' or 'pretty'", other),
    }

    Ok(())
}

async fn info_command(config: &LinkConfig) -> anyhow::Result<()> {
    print_banner();
    let builder = build_sampler(config);

    println!("Link:");
    println!("  Port: {} @ {} baud", config.port, config.baud);
    println!("  Interval: {}ms", config.interval_ms);
    println!();

    println!("CPU temperature sources (in order):");
    for name in builder.probe().source_names() {
        println!("  - {}", name);
    }
    let reading = builder.probe().probe().await;
    match reading.celsius {
        Some(celsius) => println!("  Current: {}°C from {}", celsius, reading.provenance),
        None => println!("  Current: unavailable"),
    }
    println!();

    println!("GPU:");
    match builder.utilization().gpu().device_name() {
        Some(name) => println!("  {} (device 0)", name),
        None => println!("  not available"),
    }
    println!();

    let scaling = builder.scaling();
    println!("Activity scaling:");
    println!("  Upload: {} KB per percent", scaling.net_up_kbps_per_percent);
    println!("  Download: {} KB per percent", scaling.net_down_kbps_per_percent);
    println!("  Disk: {} percent per MB", scaling.disk_percent_per_mbps);

    println!();
    println!("Features compiled:");
    #[cfg(feature = "nvml")]
    println!("  - NVML GPU support: ✓");
    #[cfg(not(feature = "nvml"))]
    println!("  - NVML GPU support: ✗");

    Ok(())
}

fn print_pretty_sample(sample: &Sample) {
    println!(
        "Sample ({})",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    println!("==========================================");
    println!("  CPU: {}% at {}°C", sample.cpu, sample.cpu_temp_c);
    println!("  Memory: {}%", sample.mem);
    println!(
        "  GPU: {}% at {}°C, memory {}%",
        sample.gpu_util, sample.gpu_temp_c, sample.gpu_mem_percent
    );
    println!(
        "  Network: up {}%, down {}%",
        sample.net_up_percent, sample.net_down_percent
    );
    println!("  Disk: {}%", sample.disk_percent);
}
