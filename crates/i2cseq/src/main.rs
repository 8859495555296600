use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use log::{LevelFilter, debug};

use i2cseq::{
    bus::{BusTransport, MemoryBus, RegisterDevice, device_path},
    compiler::{SequenceCompiler, read_len, transaction::hex_bytes},
    config::Config,
    notation::{format_sequence, parse_sequence},
    orchestrator::send_sequence,
    token::{Address, Token},
};

/// Compile and execute multi-segment I2C transactions
#[derive(Debug, Parser)]
#[command(name = "i2cseq", version, about)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file layered over the user and project configuration
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile a sequence and print its transfer descriptors
    Compile {
        /// Sequence in text notation, e.g. `0x38 0x16 restart 0x39 read*3`
        #[arg(required = true, num_args = 1..)]
        sequence: Vec<String>,
    },
    /// Compile a sequence and execute it as one bus transaction
    Send {
        #[command(flatten)]
        target: Target,

        #[arg(required = true, num_args = 1..)]
        sequence: Vec<String>,
    },
    /// Execute a named sequence from the configuration
    Run {
        #[command(flatten)]
        target: Target,

        name: String,
    },
    /// List named sequences from the configuration
    List,
}

#[derive(Debug, Args)]
struct Target {
    /// Bus number, opened as /dev/i2c-N
    #[arg(long, conflicts_with_all = ["device", "simulate"])]
    bus: Option<u8>,

    /// Explicit i2c-dev device node
    #[arg(long, value_name = "PATH", conflicts_with = "simulate")]
    device: Option<PathBuf>,

    /// Use an in-memory bus with a register device at every address
    #[arg(long)]
    simulate: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(cli.config.as_deref())?;
    debug!("Effective configuration: {config:?}");

    let mut out = io::stdout().lock();
    match cli.command {
        Command::Compile { sequence } => {
            let tokens = parse_args(&sequence)?;
            compile(&config, &tokens, &mut out)
        }
        Command::Send { target, sequence } => {
            let tokens = parse_args(&sequence)?;
            send(&config, &target, &tokens, &mut out)
        }
        Command::Run { target, name } => {
            let tokens = config.sequence(&name)?;
            send(&config, &target, &tokens, &mut out)
        }
        Command::List => {
            for (name, text) in &config.sequences {
                writeln!(out, "{name}: {text}")?;
            }
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    match verbose {
        0 if std::env::var_os("RUST_LOG").is_some() => {}
        0 => {
            builder.filter_level(LevelFilter::Warn);
        }
        1 => {
            builder.filter_level(LevelFilter::Info);
        }
        2 => {
            builder.filter_level(LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(LevelFilter::Trace);
        }
    }
    builder.format_timestamp(None).init();
}

fn parse_args(words: &[String]) -> Result<Vec<Token>> {
    parse_sequence(&words.join(" ")).context("invalid sequence")
}

fn compile(config: &Config, tokens: &[Token], out: &mut impl Write) -> Result<()> {
    let mut received = vec![0; read_len(tokens)];
    let transaction = SequenceCompiler::new(config.compile_options()).compile(tokens, &mut received)?;

    writeln!(out, "{}", format_sequence(tokens))?;
    write!(out, "{}", transaction.describe())?;
    Ok(())
}

fn send(config: &Config, target: &Target, tokens: &[Token], out: &mut impl Write) -> Result<()> {
    let mut received = vec![0; read_len(tokens)];
    let mut transport = open_transport(config, target)?;

    let transferred = send_sequence(
        transport.as_mut(),
        tokens,
        &mut received,
        config.compile_options(),
    )?;

    writeln!(out, "transferred {transferred} segment(s)")?;
    if !received.is_empty() {
        writeln!(out, "received: {}", hex_bytes(&received))?;
    }
    Ok(())
}

fn open_transport(config: &Config, target: &Target) -> Result<Box<dyn BusTransport>> {
    if target.simulate {
        return Ok(Box::new(simulated_bus()));
    }

    let path = match (&target.device, target.bus) {
        (Some(device), _) => device.clone(),
        (None, Some(bus)) => device_path(bus),
        (None, None) => config.device_path(),
    };
    open_device(&path)
}

fn simulated_bus() -> MemoryBus {
    let mut bus = MemoryBus::new();
    for raw in 0..=Address::MAX {
        if let Ok(address) = Address::new(raw) {
            bus.attach(address, RegisterDevice::new());
        }
    }
    bus
}

#[cfg(target_os = "linux")]
fn open_device(path: &Path) -> Result<Box<dyn BusTransport>> {
    let device = i2cseq::bus::I2cDevice::open_path(path)?;
    Ok(Box::new(device))
}

#[cfg(not(target_os = "linux"))]
fn open_device(path: &Path) -> Result<Box<dyn BusTransport>> {
    anyhow::bail!(
        "cannot open {}: i2c-dev devices are only available on Linux",
        path.display()
    )
}
