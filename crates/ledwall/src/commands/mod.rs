//! Command dispatch: bridges CLI args -> `Wall` calls -> output formatting.

pub mod config_cmd;
pub mod device;
pub mod ports;
pub mod routes;

use tracing::debug;

use ledwall_config::Config;
use ledwall_core::{ConnectionSession, DeviceInfo, RouteStore, Wall};

use crate::cli::{Command, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

/// Everything a handler needs: the loaded config and output settings.
pub struct Context<'a> {
    pub global: &'a GlobalOpts,
    pub config: Config,
    pub format: OutputFormat,
}

impl<'a> Context<'a> {
    pub fn new(global: &'a GlobalOpts) -> Result<Self, CliError> {
        let config = config::load(global)?;
        let format = config::output_format(global, &config);
        Ok(Self {
            global,
            config,
            format,
        })
    }

    /// Open the route catalog and an idle session around it.
    pub fn wall(&self) -> Result<Wall, CliError> {
        let store = RouteStore::open(self.config.store_config())?;
        let session = ConnectionSession::with_default_connector(self.config.session_config());
        Ok(Wall::new(session, store))
    }

    /// Open the wall and connect to the configured device.
    pub async fn connect(&self) -> Result<Link, CliError> {
        let params = config::connection_params(self.global, &self.config)?;
        let wall = self.wall()?;
        let info = wall.connect(params.kind, &params.endpoint).await?;
        debug!(endpoint = %params.endpoint, num_leds = info.num_leds, "connected");
        Ok(Link { wall, info })
    }

    pub fn print(&self, rendered: &str) {
        output::print_output(rendered, self.global.quiet);
    }
}

/// A connected wall for the length of one command.
pub struct Link {
    pub wall: Wall,
    pub info: DeviceInfo,
}

impl Link {
    /// Disconnect, then hand back the command's result.
    pub async fn finish<T>(self, result: Result<T, ledwall_core::CoreError>) -> Result<T, CliError> {
        self.wall.disconnect().await;
        Ok(result?)
    }
}

/// Dispatch a wall-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let ctx = Context::new(global)?;
    debug!(command = ?cmd, format = ?ctx.format, "dispatching command");
    match cmd {
        Command::Ports => ports::handle(&ctx),
        Command::Info => device::info(&ctx).await,
        Command::Set(args) => device::set(&ctx, args).await,
        Command::Fill(args) => device::fill(&ctx, args).await,
        Command::Clear => device::clear(&ctx).await,
        Command::Brightness(args) => device::brightness(&ctx, args).await,
        Command::Frame(args) => device::frame(&ctx, args).await,
        Command::Routes(args) => routes::handle(&ctx, args).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
