//! canscope monitor: replays a candump log through ISO-TP reassembly and
//! UDS decoding and prints the diagnostic conversation.

use anyhow::{Context, bail};
use tracing_subscriber::EnvFilter;

use cs_monitor::config::{LogFormat, MonitorConfig, OutputFormat};
use cs_monitor::replay::{self, Replay, ReplayStats};

const USAGE: &str = "usage: cs-monitor <config.toml> [log-path]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(config_path) = args.next() else {
        bail!(USAGE);
    };
    let config = MonitorConfig::from_file(&config_path)
        .with_context(|| format!("failed to load config from {config_path}"))?;

    init_tracing(config.log_format);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "cs-monitor starting");

    let Some(log_path) = args.next().or_else(|| config.log_path.clone()) else {
        bail!("no candump log given on the command line or as log_path in {config_path}\n{USAGE}");
    };
    tracing::info!(
        log_path = %log_path,
        bus_count = config.bus_count,
        addressing = ?config.isotp.addressing,
        "config loaded"
    );

    let contents = tokio::fs::read_to_string(&log_path)
        .await
        .with_context(|| format!("failed to read {log_path}"))?;

    let stats = tokio::select! {
        stats = run(&config, &contents) => stats?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            return Ok(());
        }
    };

    tracing::info!(
        lines = stats.lines,
        frames = stats.frames,
        malformed = stats.malformed,
        unmapped = stats.unmapped,
        transport_messages = stats.transport_messages,
        diagnostic_messages = stats.diagnostic_messages,
        negative_responses = stats.negative_responses,
        flow_control_sent = stats.flow_control_sent,
        "replay finished"
    );
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn run(config: &MonitorConfig, contents: &str) -> anyhow::Result<ReplayStats> {
    let mut replay = Replay::new(config);

    for line in contents.lines() {
        for record in replay.feed_line(line) {
            match config.output {
                OutputFormat::Text => println!("{}", replay::render(&record)),
                OutputFormat::Json => println!("{}", serde_json::to_string(&record)?),
            }
        }
        // Keep ctrl-c responsive on large logs.
        if replay.stats().lines % 4096 == 0 {
            tokio::task::yield_now().await;
        }
    }

    tracing::debug!(interfaces = ?replay.interfaces(), "buses seen");
    Ok(replay.finish())
}
