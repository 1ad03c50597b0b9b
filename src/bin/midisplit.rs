//! midisplit command line bridge
//!
//! Connects a MIDI input port to an output port, spreading polyphonic input
//! across channels so each note lands on its own single-voice channel.
//!
//! While running, commands are read from stdin:
//! - "status" - print per-channel usage
//! - "split on" / "split off" - route through the splitter or straight to the output
//! - "reset" - send a system reset through the current route
//! - "quit" - exit (EOF does the same)

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use parking_lot::Mutex;

use midisplit_lib::config::{BridgeConfig, ResetPolicy};
use midisplit_lib::logging;
use midisplit_lib::midi::{
    list_input_ports, list_output_ports, Forwarder, MidiEvent, MidiInputManager, MidiPortInfo,
    MidiSink, MidiSplitter, MidirOutputDevice, SharedSink, SinkBinding, SplitterWorker,
};

#[derive(Parser)]
#[command(name = "midisplit", version, about = "Spread polyphonic MIDI across single-voice channels")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write the log to ~/.midisplit/logs/midisplit.log
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List MIDI input and output ports
    List,
    /// Bridge an input port to an output port
    Run(RunArgs),
    /// Print or clear the log file
    Log {
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Input port index or name fragment
    #[arg(short, long)]
    input: Option<String>,

    /// Output port index or name fragment
    #[arg(short, long)]
    output: Option<String>,

    /// Forward input unchanged instead of splitting
    #[arg(long)]
    no_split: bool,

    /// Log every channel assignment
    #[arg(long)]
    trace: bool,

    /// Send note offs for sounding notes before a reset event
    #[arg(long)]
    release_on_reset: bool,

    /// Config file (defaults to <config dir>/midisplit/config.json)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    logging::init_logging(level, cli.log_file);

    let result = match cli.command {
        Command::List => list_ports(),
        Command::Run(args) => run_bridge(args),
        Command::Log { clear } => show_log(clear),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_ports(title: &str, ports: &[MidiPortInfo]) {
    println!("{}:", title);
    if ports.is_empty() {
        println!("  (none)");
    }
    for port in ports {
        println!("  {}: {}", port.index, port.name);
    }
}

fn list_ports() -> Result<(), String> {
    let inputs = list_input_ports().map_err(|e| e.to_string())?;
    let outputs = list_output_ports().map_err(|e| e.to_string())?;
    print_ports("Inputs", &inputs);
    print_ports("Outputs", &outputs);
    Ok(())
}

fn show_log(clear: bool) -> Result<(), String> {
    if clear {
        return logging::clear_log_file();
    }
    let size = logging::get_log_file_size()?;
    println!("{} ({} bytes)", logging::get_log_path().display(), size);
    print!("{}", logging::read_log_file()?);
    Ok(())
}

fn load_config(args: &RunArgs) -> Result<BridgeConfig, String> {
    let mut config = match &args.config {
        Some(path) => BridgeConfig::load(path),
        None => BridgeConfig::load_or_default(&BridgeConfig::default_path()),
    }
    .map_err(|e| e.to_string())?;

    // Flags win over the file
    if args.input.is_some() {
        config.input = args.input.clone();
    }
    if args.output.is_some() {
        config.output = args.output.clone();
    }
    if args.no_split {
        config.split = false;
    }
    if args.trace {
        config.splitter.trace = true;
    }
    if args.release_on_reset {
        config.splitter.reset_policy = ResetPolicy::ReleaseActive;
    }
    Ok(config)
}

fn run_bridge(args: RunArgs) -> Result<(), String> {
    let config = load_config(&args)?;
    log::debug!("Bridge config: {:?}", config);

    // Output device, shared by the split and direct routes
    let device = MidirOutputDevice::new(config.output.as_deref());
    let binding = SinkBinding::open(Box::new(device)).map_err(|e| e.to_string())?;
    let output_name = binding.describe();
    let output: SharedSink = Arc::new(Mutex::new(binding));

    let splitter = Arc::new(Mutex::new(MidiSplitter::with_config(
        output.clone(),
        config.splitter.clone(),
    )));
    let split_route: SharedSink = splitter.clone();

    let initial = if config.split {
        split_route.clone()
    } else {
        output.clone()
    };
    let forwarder = Arc::new(Mutex::new(Forwarder::new(Some(initial))));

    // The input callback only enqueues; the worker does the forwarding
    let mut worker = SplitterWorker::spawn(forwarder.clone(), config.splitter.queue_capacity);
    let input = MidiInputManager::new();
    let input_name = input
        .connect(config.input.as_deref(), Arc::new(Mutex::new(worker.sink())))
        .map_err(|e| e.to_string())?;

    println!(
        "Bridging '{}' -> '{}' ({})",
        input_name,
        output_name,
        if config.split { "split" } else { "direct" }
    );

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::warn!("Failed to read stdin: {}", e);
                break;
            }
        };

        match line.trim() {
            "" => {}
            "status" => {
                let splitter = splitter.lock();
                let usage: Vec<String> =
                    splitter.channel_usage().iter().map(|u| u.to_string()).collect();
                println!(
                    "active notes: {}  usage: [{}]  queued: {}  last note: {:?}",
                    splitter.active_notes(),
                    usage.join(","),
                    worker.pending(),
                    input.last_note()
                );
            }
            "split on" => {
                forwarder.lock().set_target(Some(split_route.clone()));
                println!("splitting enabled");
            }
            "split off" => {
                forwarder.lock().set_target(Some(output.clone()));
                println!("splitting disabled");
            }
            "reset" => {
                if !worker.push(MidiEvent::SystemReset, None) {
                    println!("queue full, reset not sent");
                }
            }
            "quit" | "exit" => break,
            other => println!("unknown command: {}", other),
        }
    }

    input.disconnect();
    worker.stop();
    splitter.lock().shutdown();
    output.clone().shutdown();
    log::info!("Bridge stopped");
    Ok(())
}
