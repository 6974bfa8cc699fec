//! Dendron streaming - headless entry point
//!
//! Connects to one device, optionally starts streaming, recording and
//! broadcasting, and then takes line commands from stdin until `quit` or
//! end of input.

mod cli;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use cli::{parse_line, Cli, Input};
use crossbeam_channel::{bounded, select};
use dendron_rs::{
    backend::{ControlCommand, DendronBackend, SessionMessage},
    config::{self, DendronConfig},
    session::SessionEvent,
    sinks::OscBroadcaster,
    transport::{ByteTransport, DeviceFileTransport, TcpTransport},
};
use std::io::BufRead;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging(cli: &Cli) -> anyhow::Result<Option<WorkerGuard>> {
    let default_filter = match cli.verbose {
        0 => "info,dendron_rs=debug",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let (file_layer, guard) = if cli.log_file {
        let dir = config::ensure_app_data_dir()?;
        let appender = tracing_appender::rolling::daily(dir, "dendron-stream.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (
            Some(fmt::layer().with_writer(writer).with_ansi(false)),
            Some(guard),
        )
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

fn load_config(cli: &Cli) -> anyhow::Result<DendronConfig> {
    let mut config = match &cli.config {
        Some(path) => DendronConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DendronConfig::load_or_default(),
    };

    if let Some(path) = &cli.data_path {
        config.data.path = path.clone();
    }
    if let Some(host) = &cli.osc_host {
        config.osc.host = host.clone();
    }
    if let Some(port) = cli.osc_port {
        config.osc.port = port;
    }
    config.validate()?;
    Ok(config)
}

fn build_transport(cli: &Cli) -> anyhow::Result<Box<dyn ByteTransport>> {
    #[cfg(feature = "simulator")]
    if cli.simulate {
        return Ok(Box::new(dendron_rs::transport::SimulatedTransport::new()));
    }
    if let Some(address) = &cli.address {
        return Ok(Box::new(TcpTransport::new(address.clone())));
    }
    if let Some(device) = &cli.device {
        return Ok(Box::new(DeviceFileTransport::new(device)));
    }
    bail!("no device given, use --address or --device")
}

fn log_message(message: &SessionMessage) {
    match message {
        SessionMessage::State(flags) => tracing::info!(
            connected = flags.is_connected,
            streaming = flags.is_streaming,
            recording = flags.is_recording,
            broadcasting = flags.is_broadcasting,
            "Session state"
        ),
        SessionMessage::Frame(frame) => tracing::trace!("Scope frame at cursor {}", frame.cursor),
        SessionMessage::Event(SessionEvent::RecordingStarted { path }) => {
            tracing::info!("Recording started: {:?}", path)
        }
        SessionMessage::Event(SessionEvent::RecordingStopped { path, lines }) => {
            tracing::info!("Recording stopped after {} samples: {:?}", lines, path)
        }
        SessionMessage::Event(event) => tracing::warn!("{:?}", event),
        SessionMessage::Stats(stats) => match serde_json::to_string(stats) {
            Ok(json) => tracing::debug!("Stats {}", json),
            Err(e) => tracing::debug!("Stats not serializable: {}", e),
        },
        SessionMessage::Error(e) => tracing::error!("{}", e),
        SessionMessage::Shutdown => tracing::info!("Backend stopped"),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli)?;

    tracing::info!("Starting Dendron stream");

    let config = load_config(&cli)?;
    let transport = build_transport(&cli)?;
    let broadcaster = OscBroadcaster::connect(&config.osc.host, config.osc.port)
        .unwrap_or_else(|e| {
            tracing::warn!("OSC broadcast unavailable: {}", e);
            OscBroadcaster::new()
        });

    let (backend, handle) = DendronBackend::new(config, transport, Box::new(broadcaster))?;
    let worker = backend.spawn().context("spawning backend thread")?;

    handle.connect();
    if cli.start || cli.record {
        handle.start_streaming();
    }
    if cli.record {
        handle.send_command(ControlCommand::StartRecording);
    }
    if cli.osc {
        handle.set_broadcasting(true);
    }

    // stdin gets its own thread so it can be selected on together with
    // backend messages; dropping the sender signals end of input
    let (line_tx, line_rx) = bounded::<String>(16);
    std::thread::Builder::new()
        .name("dendron-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("spawning stdin reader")?;

    let mut backend_stopped = false;
    loop {
        select! {
            recv(line_rx) -> line => match line {
                Ok(line) => match parse_line(&line) {
                    Ok(Input::Command(cmd)) => {
                        handle.send_command(cmd);
                    }
                    Ok(Input::Quit) => break,
                    Ok(Input::Empty) => {}
                    Err(e) => tracing::warn!("{}", e),
                },
                Err(_) => {
                    tracing::info!("End of input");
                    break;
                }
            },
            recv(handle.receiver) -> msg => match msg {
                Ok(SessionMessage::Shutdown) | Err(_) => {
                    backend_stopped = true;
                    break;
                }
                Ok(msg) => log_message(&msg),
            }
        }
    }

    tracing::info!("Shutting down...");
    if !backend_stopped {
        handle.shutdown();
        // Keep draining so the worker never blocks on a full queue
        while let Ok(msg) = handle.receiver.recv() {
            log_message(&msg);
            if msg == SessionMessage::Shutdown {
                break;
            }
        }
    }

    worker
        .join()
        .map_err(|_| anyhow!("backend thread panicked"))?;
    Ok(())
}
