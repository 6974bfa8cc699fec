use clap::Parser;
use dendron_rs::protocol::ChannelMode;
use dendron_rs::ControlCommand;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "dendron-stream",
    version,
    about = "Stream, record and broadcast Dendron biosignal telemetry",
    long_about = "Connects to a Dendron device through a TCP bridge or a bound RFCOMM TTY,\n\
                  then reads commands from stdin: start, stop, record, osc, mark, battery,\n\
                  path <osc-address>, mode <t|g|n> <channel>, stats, quit."
)]
pub struct Cli {
    /// Device bridge address (host:port)
    #[arg(long, env = "DENDRON_ADDRESS", conflicts_with = "device")]
    pub address: Option<String>,

    /// Device node, e.g. /dev/rfcomm0
    #[arg(long)]
    pub device: Option<PathBuf>,

    /// Use a simulated device instead of hardware
    #[cfg(feature = "simulator")]
    #[arg(long, conflicts_with_all = ["address", "device"])]
    pub simulate: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory for recordings, overrides data.path
    #[arg(long)]
    pub data_path: Option<PathBuf>,

    /// OSC destination host, overrides osc.host
    #[arg(long)]
    pub osc_host: Option<String>,

    /// OSC destination port, overrides osc.port
    #[arg(long)]
    pub osc_port: Option<u16>,

    /// Start streaming once connected
    #[arg(long)]
    pub start: bool,

    /// Start recording once streaming (implies --start)
    #[arg(long)]
    pub record: bool,

    /// Broadcast samples over OSC
    #[arg(long)]
    pub osc: bool,

    /// Also write logs to a daily file in the app data directory
    #[arg(long)]
    pub log_file: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// One line read from stdin
#[derive(Debug, PartialEq)]
pub enum Input {
    Command(ControlCommand),
    Quit,
    Empty,
}

fn parse_mode(word: &str) -> Option<ChannelMode> {
    match word {
        "t" | "test" => Some(ChannelMode::Test),
        "g" | "ground" => Some(ChannelMode::Ground),
        "n" | "normal" => Some(ChannelMode::Normal),
        _ => None,
    }
}

/// Parse an interactive command line
pub fn parse_line(line: &str) -> Result<Input, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Input::Empty);
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "start" => ControlCommand::StartStreaming,
        "stop" => ControlCommand::StopStreaming,
        "record" => ControlCommand::ToggleRecording,
        "osc" => ControlCommand::ToggleBroadcasting,
        "mark" => ControlCommand::Mark,
        "battery" => ControlCommand::QueryBattery,
        "stats" => ControlCommand::RequestStats,
        "connect" => ControlCommand::Connect,
        "disconnect" => ControlCommand::Disconnect,
        "quit" | "exit" => return Ok(Input::Quit),
        "path" => {
            let path = words.next().ok_or("usage: path <osc-address>")?;
            if !path.starts_with('/') {
                return Err(format!("OSC address must start with '/': {:?}", path));
            }
            ControlCommand::SetBroadcastPath(path.to_string())
        }
        "mode" => {
            let usage = "usage: mode <t|g|n> <channel>";
            let mode = words.next().and_then(parse_mode).ok_or(usage)?;
            let channel = words
                .next()
                .and_then(|c| c.parse::<u8>().ok())
                .ok_or(usage)?;
            ControlCommand::SetChannelMode { mode, channel }
        }
        other => return Err(format!("unknown command {:?}", other)),
    };
    Ok(Input::Command(command))
}
