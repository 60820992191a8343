//! Serial port discovery.

use tabled::Tabled;

use ledwall_api::{PortInfo, list_ports};

use super::Context;
use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::output::render_list;

#[derive(Tabled)]
struct PortRow {
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Description")]
    description: String,
}

pub fn handle(ctx: &Context<'_>) -> Result<(), CliError> {
    let ports = list_ports().map_err(ledwall_core::CoreError::from)?;
    if ports.is_empty() && ctx.format == OutputFormat::Table {
        eprintln!("No serial ports found");
        return Ok(());
    }
    let out = render_list(
        ctx.format,
        &ports,
        |p: &PortInfo| PortRow {
            device: p.device.clone(),
            description: p.description.clone(),
        },
        |p| p.device.clone(),
    )?;
    ctx.print(&out);
    Ok(())
}
