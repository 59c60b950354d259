//! hexbridge - line-protocol remote control for a hex-tile world
//!
//! Loads a scenario into the sandbox world, opens a command channel and serves controller
//! requests until the world quits or a run limit is reached.

mod channel;
mod classifier;
mod command_script;
mod commands;
mod config;
mod headless;
mod look;
mod navigation;
mod snapshot;

use anyhow::{Context, Result};
use channel::pipe::{write_envelope, PipeChannel};
use channel::protocol::Envelope;
use channel::server::SocketChannel;
use channel::{CommandChannel, ExchangeLog};
use command_script::CommandScriptPlayer;
use commands::Interpreter;
use config::BridgeConfig;
use headless::HeadlessConfig;
use hexbridge_world::{SandboxWorld, Scenario};
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

fn main() -> Result<()> {
    // WARN by default; RUST_LOG overrides.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    info!("Starting hexbridge v{}", env!("CARGO_PKG_VERSION"));

    let cli = CliOptions::parse(env::args().skip(1));
    if cli.help {
        print!("{USAGE}");
        return Ok(());
    }
    run(cli)
}

fn run(cli: CliOptions) -> Result<()> {
    let mut config = match cli.config.as_deref() {
        Some(path) => BridgeConfig::load_from_path(path),
        None => BridgeConfig::load(),
    };
    if let Some(input) = cli.input.clone() {
        config.channel.input = input;
    }
    if let Some(output) = cli.output.clone() {
        config.channel.output = output;
    }
    if let Some(tick_ms) = cli.tick_ms {
        config.run.tick_ms = tick_ms;
    }
    if let Some(path) = cli.write_config.as_deref() {
        config
            .save_to_path(path)
            .with_context(|| format!("failed to write config {}", path.display()))?;
        info!(path = %path.display(), "Wrote effective configuration");
        return Ok(());
    }
    let tick = Duration::from_millis(config.run.tick_ms);

    let world = load_world(cli.scenario.as_deref())?;
    let command_script = cli
        .command_script
        .as_deref()
        .map(CommandScriptPlayer::from_path)
        .transpose()?;
    if cli.exit_when_script_finished && command_script.is_none() {
        tracing::warn!("--exit-when-script-finished has no effect without --command-script");
    }

    let log = ExchangeLog::open_optional(cli.log.as_deref());
    let output = config.channel.output.clone();
    let mut channel = match open_channel(&cli, &config, log) {
        Ok(channel) => channel,
        Err(err) => {
            if let Err(write_err) = write_envelope(&output, &Envelope::init_failed()) {
                tracing::warn!(%write_err, "Failed to report channel failure");
            }
            return Err(err.context("failed to open command channel"));
        }
    };
    channel.send(&Envelope::init_ready())?;

    let mut interpreter = Interpreter::new(world, config);
    let reason = headless::run(
        &mut interpreter,
        channel.as_mut(),
        HeadlessConfig {
            command_script,
            max_ticks: cli.max_ticks,
            exit_when_script_finished: cli.exit_when_script_finished,
            tick,
        },
    )?;
    info!(?reason, "hexbridge stopped");
    Ok(())
}

fn load_world(scenario: Option<&Path>) -> Result<SandboxWorld> {
    match scenario {
        Some(path) => SandboxWorld::load(path)
            .with_context(|| format!("failed to load scenario {}", path.display())),
        None => {
            tracing::warn!("No --scenario given; starting with an empty world");
            SandboxWorld::from_scenario(Scenario::default()).context("default scenario")
        }
    }
}

fn open_channel(
    cli: &CliOptions,
    config: &BridgeConfig,
    log: Option<ExchangeLog>,
) -> Result<Box<dyn CommandChannel>> {
    if cli.listen.is_some() && cli.uds.is_some() {
        anyhow::bail!("--listen and --uds are mutually exclusive");
    }
    if let Some(addr) = cli.listen {
        let server = SocketChannel::start(addr, log)?;
        info!(endpoint = %server.endpoint, "Serving commands over tcp");
        return Ok(Box::new(server));
    }
    if let Some(path) = cli.uds.clone() {
        #[cfg(unix)]
        {
            let server = SocketChannel::start_uds(path, log)?;
            info!(endpoint = %server.endpoint, "Serving commands over uds");
            return Ok(Box::new(server));
        }
        #[cfg(not(unix))]
        {
            let _ = path;
            anyhow::bail!("--uds is only supported on unix");
        }
    }
    let pipe = PipeChannel::open(&config.channel.input, &config.channel.output, log)?;
    info!(
        input = %config.channel.input.display(),
        output = %config.channel.output.display(),
        "Serving commands over pipe"
    );
    Ok(Box::new(pipe))
}

const USAGE: &str = "\
usage: hexbridge [options]

  --config <toml>               bridge configuration (default config/bridge.toml)
  --scenario <json>             sandbox scenario to load
  --input <path>                request pipe (overrides [channel].input)
  --output <path>               response file (overrides [channel].output)
  --listen <addr>               serve commands over tcp instead of the pipe
  --uds <path>                  serve commands over a unix socket instead of the pipe
  --log <path>                  append request/response pairs as json lines
  --command-script <json>       run scripted commands by tick
  --max-ticks <n>               stop after n ticks
  --exit-when-script-finished   stop once the command script is drained
  --tick-ms <n>                 tick length in milliseconds (overrides [run].tick_ms)
  --write-config <toml>         write the effective configuration and exit
";

#[derive(Debug, Default)]
struct CliOptions {
    help: bool,
    config: Option<PathBuf>,
    scenario: Option<PathBuf>,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    listen: Option<SocketAddr>,
    uds: Option<PathBuf>,
    log: Option<PathBuf>,
    command_script: Option<PathBuf>,
    max_ticks: Option<u64>,
    exit_when_script_finished: bool,
    tick_ms: Option<u64>,
    write_config: Option<PathBuf>,
}

impl CliOptions {
    fn parse<I: Iterator<Item = String>>(mut args: I) -> Self {
        let mut opts = CliOptions::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => opts.help = true,
                "--config" => opts.config = path_arg(&arg, args.next()),
                "--scenario" => opts.scenario = path_arg(&arg, args.next()),
                "--input" => opts.input = path_arg(&arg, args.next()),
                "--output" => opts.output = path_arg(&arg, args.next()),
                "--uds" => opts.uds = path_arg(&arg, args.next()),
                "--log" => opts.log = path_arg(&arg, args.next()),
                "--command-script" => opts.command_script = path_arg(&arg, args.next()),
                "--write-config" => opts.write_config = path_arg(&arg, args.next()),
                "--listen" => {
                    if let Some(raw) = args.next() {
                        match raw.parse::<SocketAddr>() {
                            Ok(addr) => opts.listen = Some(addr),
                            Err(err) => {
                                tracing::error!(%err, value = %raw, "--listen must be host:port");
                            }
                        }
                    } else {
                        tracing::error!("--listen requires an address");
                    }
                }
                "--max-ticks" => opts.max_ticks = u64_arg(&arg, args.next()),
                "--tick-ms" => opts.tick_ms = u64_arg(&arg, args.next()),
                "--exit-when-script-finished" => opts.exit_when_script_finished = true,
                other => {
                    tracing::warn!(arg = other, "Ignoring unknown argument");
                }
            }
        }

        opts
    }
}

fn path_arg(flag: &str, value: Option<String>) -> Option<PathBuf> {
    match value {
        Some(path) => Some(PathBuf::from(path)),
        None => {
            tracing::error!(flag, "flag requires a path");
            None
        }
    }
}

fn u64_arg(flag: &str, value: Option<String>) -> Option<u64> {
    let raw = match value {
        Some(raw) => raw,
        None => {
            tracing::error!(flag, "flag requires an integer");
            return None;
        }
    };
    match raw.parse::<u64>() {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::error!(%err, flag, value = %raw, "flag must be an integer");
            None
        }
    }
}
