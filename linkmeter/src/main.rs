use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use linkmeter::{
    MeasurementSession, Scenario,
    output::{write_json, write_outputs},
    report::{ConsoleReport, write_plan},
    scenario::LinkConfig,
};
use linkmeter_core::{capacity::OfferedLoad, defaults, measure::Throughput};
use std::{io, path::PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Measure delays, throughput and link quality of simulated wireless runs")]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a finished run.
    Analyze {
        /// Scenario file (TOML): link, traffic and flow counters.
        #[arg(long)]
        scenario: PathBuf,

        /// Event trace of the traced client (`tx|rx <packet-id> <time>` lines).
        #[arg(long)]
        events: Option<PathBuf>,

        /// Directory receiving the delay CSV, plot parameters and metrics
        /// summary.
        #[arg(long, default_value = "out")]
        out_dir: PathBuf,

        /// Also dump the statistics report as JSON.
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Compute the offered load for a link configuration.
    Plan {
        #[arg(long, default_value_t = 1)]
        spatial_streams: u32,

        /// In MHz, 20 or 40.
        #[arg(long, default_value_t = 20)]
        channel_width: u32,

        /// Distance between the station and the access point, in meters.
        #[arg(long, default_value_t = defaults::DEFAULT_DISTANCE_M)]
        distance: f64,

        /// UDP payload size, in bytes.
        #[arg(long, default_value_t = defaults::DEFAULT_PACKET_SIZE)]
        packet_size: u32,

        /// Offered load (e.g. `45mbps`) instead of the target data rate of
        /// the configuration.
        #[arg(long)]
        rate: Option<Throughput>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Analyze {
            scenario,
            events,
            out_dir,
            json,
        } => {
            let scenario = Scenario::load(&scenario)?;
            let mut session = MeasurementSession::new(scenario);

            let replay = match &events {
                Some(path) => Some(session.replay_file(path)?),
                None => {
                    info!("no event trace given, the delay ledger stays empty");
                    None
                }
            };

            let measurement = session.finish();

            let mut console = ConsoleReport::new(&measurement);
            if let Some(replay) = replay {
                console = console.with_replay(replay);
            }
            console.print().context("Failed to print the report")?;

            let files = write_outputs(&measurement, &out_dir)?;
            println!();
            println!("Delays written to {}", files.delays.display());

            if let Some(path) = &json {
                write_json(&measurement, path)?;
            }
        }
        Command::Plan {
            spatial_streams,
            channel_width,
            distance,
            packet_size,
            rate,
        } => {
            let parameters = LinkConfig {
                spatial_streams,
                channel_width,
                distance,
            }
            .parameters()?;
            let load = match rate {
                Some(rate) => OfferedLoad::at_rate(rate, packet_size)?,
                None => OfferedLoad::plan(&parameters, packet_size)?,
            };

            write_plan(&mut io::stdout().lock(), &parameters, &load)
                .context("Failed to print the plan")?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}
