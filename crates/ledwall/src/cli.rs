//! Clap derive structures for the `ledwall` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use ledwall_core::TransportKind;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// ledwall -- drive an addressable LED climbing wall
#[derive(Debug, Parser)]
#[command(
    name = "ledwall",
    version,
    about = "Drive an addressable LED climbing wall from the command line",
    long_about = "Light pixels, show frames and manage the route catalog of an LED\n\
        climbing wall, over a USB serial link or a network relay.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "LEDWALL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Transport to the controller (overrides config)
    #[arg(long, short = 't', env = "LEDWALL_TRANSPORT", global = true)]
    pub transport: Option<Transport>,

    /// Serial port name (overrides config)
    #[arg(long, short = 'p', global = true)]
    pub port: Option<String>,

    /// Network relay host (overrides config)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Output format (defaults to the config's `defaults.output`)
    #[arg(long, short = 'o', env = "LEDWALL_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Transport Enums ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// USB serial link
    Serial,
    /// HTTP relay on the local network
    #[value(alias = "wifi")]
    Network,
}

impl From<Transport> for TransportKind {
    fn from(t: Transport) -> Self {
        match t {
            Transport::Serial => TransportKind::Serial,
            Transport::Network => TransportKind::Network,
        }
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List serial ports, likely controllers first
    Ports,

    /// Connect and show the device's LED count and brightness
    Info,

    /// Light one pixel
    #[command(allow_negative_numbers = true)]
    Set(SetArgs),

    /// Set every pixel to one color
    #[command(allow_negative_numbers = true)]
    Fill(ColorArgs),

    /// Turn every pixel off
    Clear,

    /// Set global brightness (0-255)
    #[command(alias = "bright", allow_negative_numbers = true)]
    Brightness(BrightnessArgs),

    /// Put a frame from a JSON file on the wall
    Frame(FrameArgs),

    /// Browse, show and edit the route catalog
    #[command(alias = "r")]
    Routes(RoutesArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Device commands ──────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ColorArgs {
    /// Red (clamped to 0-255)
    pub r: i64,
    /// Green (clamped to 0-255)
    pub g: i64,
    /// Blue (clamped to 0-255)
    pub b: i64,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Pixel index (0-based)
    pub index: usize,

    #[command(flatten)]
    pub color: ColorArgs,
}

#[derive(Debug, Args)]
pub struct BrightnessArgs {
    /// Brightness (clamped to 0-255)
    pub value: i64,
}

#[derive(Debug, Args)]
pub struct FrameArgs {
    /// JSON file: an array of [r, g, b] triples, or a route as printed
    /// by `routes get -o json`
    pub file: PathBuf,
}

// ── Routes ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RoutesArgs {
    #[command(subcommand)]
    pub command: RoutesCommand,
}

#[derive(Debug, Subcommand)]
pub enum RoutesCommand {
    /// List stored routes by level
    #[command(alias = "ls")]
    List,

    /// Show one route
    Get(RouteRef),

    /// Put a stored route on the wall
    Apply(RouteRef),

    /// Store a route (requires the admin pin)
    Put(PutArgs),
}

#[derive(Debug, Args)]
pub struct RouteRef {
    /// Difficulty level
    pub level: u32,
    /// Slot within the level (1-based)
    pub slot: u32,
}

#[derive(Debug, Args)]
pub struct PutArgs {
    #[command(flatten)]
    pub at: RouteRef,

    /// Route name
    pub name: String,

    /// Frame JSON file
    #[arg(long, short = 'f', conflicts_with = "lit", required_unless_present = "lit")]
    pub frame: Option<PathBuf>,

    /// Comma-separated pixel indices to light
    #[arg(long, value_delimiter = ',')]
    pub lit: Vec<usize>,

    /// Color for --lit pixels, as r,g,b
    #[arg(long, default_value = "255,255,255", value_parser = parse_color)]
    pub color: [i64; 3],

    /// Admin pin (prompted for when absent)
    #[arg(long, env = "LEDWALL_PIN", hide_env_values = true)]
    pub pin: Option<String>,
}

fn parse_color(s: &str) -> Result<[i64; 3], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let &[r, g, b] = parts.as_slice() else {
        return Err(format!("expected r,g,b but got '{s}'"));
    };
    let channel = |v: &str| v.parse::<i64>().map_err(|e| format!("'{v}': {e}"));
    Ok([channel(r)?, channel(g)?, channel(b)?])
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration (secrets redacted)
    Show,

    /// Print the config file path
    Path,

    /// Write a starter config file
    Init(InitArgs),

    /// Store the route catalog admin pin in the system keyring
    SetPin,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn negative_channels_parse() {
        let cli = Cli::try_parse_from(["ledwall", "set", "4", "255", "-20", "0"]).unwrap();
        let Command::Set(args) = cli.command else {
            panic!("expected set");
        };
        assert_eq!(args.index, 4);
        assert_eq!(args.color.g, -20);
    }

    #[test]
    fn put_requires_a_frame_source() {
        assert!(Cli::try_parse_from(["ledwall", "routes", "put", "4", "1", "Slab"]).is_err());
        let cli = Cli::try_parse_from([
            "ledwall", "routes", "put", "4", "1", "Slab", "--lit", "1,5,9", "--color", "0,255,0",
        ])
        .unwrap();
        let Command::Routes(RoutesArgs {
            command: RoutesCommand::Put(put),
        }) = cli.command
        else {
            panic!("expected routes put");
        };
        assert_eq!(put.lit, vec![1, 5, 9]);
        assert_eq!(put.color, [0, 255, 0]);
    }

    #[test]
    fn color_parser_rejects_garbage() {
        assert!(parse_color("1,2").is_err());
        assert!(parse_color("1,x,3").is_err());
        assert_eq!(parse_color(" 1, 2 ,3").unwrap(), [1, 2, 3]);
    }

    #[test]
    fn wifi_is_an_alias_for_network() {
        let cli = Cli::try_parse_from(["ledwall", "--transport", "wifi", "info"]).unwrap();
        assert_eq!(cli.global.transport, Some(Transport::Network));
    }
}
