//! Route catalog handlers.

use serde::Serialize;
use tabled::Tabled;

use ledwall_core::{Frame, Rgb, Route};

use super::Context;
use super::device::read_frame_file;
use crate::cli::{OutputFormat, PutArgs, RouteRef, RoutesArgs, RoutesCommand};
use crate::error::CliError;
use crate::output::{detail, render_list, render_single};

// ── Table rows ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct RouteEntry {
    level: u32,
    slot: u32,
    name: String,
}

#[derive(Tabled)]
struct RouteRow {
    #[tabled(rename = "Level")]
    level: u32,
    #[tabled(rename = "Slot")]
    slot: u32,
    #[tabled(rename = "Name")]
    name: String,
}

fn route_detail(route: &Route) -> String {
    let lit = route.frame.lit_indices();
    let lit = if lit.is_empty() {
        "-".to_owned()
    } else {
        lit.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    };
    detail(&[
        ("Level", route.level.to_string()),
        ("Slot", route.slot.to_string()),
        ("Name", route.name.clone()),
        ("LEDs", route.frame.len().to_string()),
        ("Lit", lit),
    ])
}

fn route_line(route: &Route) -> String {
    format!("{}/{} {}", route.level, route.slot, route.name)
}

// ── Handler ──────────────────────────────────────────────────────────

pub async fn handle(ctx: &Context<'_>, args: RoutesArgs) -> Result<(), CliError> {
    match args.command {
        RoutesCommand::List => list(ctx),
        RoutesCommand::Get(at) => get(ctx, &at),
        RoutesCommand::Apply(at) => apply(ctx, &at).await,
        RoutesCommand::Put(put_args) => put(ctx, put_args).await,
    }
}

fn list(ctx: &Context<'_>) -> Result<(), CliError> {
    let wall = ctx.wall()?;
    let listing = wall.list_routes();

    // Structured formats keep the catalog's own shape.
    let out = if matches!(ctx.format, OutputFormat::Table | OutputFormat::Plain) {
        let entries: Vec<RouteEntry> = listing
            .levels
            .iter()
            .flat_map(|l| {
                l.routes.iter().map(|r| RouteEntry {
                    level: l.level,
                    slot: r.slot,
                    name: r.name.clone(),
                })
            })
            .collect();
        render_list(
            ctx.format,
            &entries,
            |e| RouteRow {
                level: e.level,
                slot: e.slot,
                name: e.name.clone(),
            },
            |e| format!("{}/{} {}", e.level, e.slot, e.name),
        )?
    } else {
        render_single(ctx.format, &listing, |_| String::new(), |_| String::new())?
    };
    ctx.print(&out);
    Ok(())
}

fn get(ctx: &Context<'_>, at: &RouteRef) -> Result<(), CliError> {
    let route = ctx.wall()?.get_route(at.level, at.slot)?;
    let out = render_single(ctx.format, &route, route_detail, route_line)?;
    ctx.print(&out);
    Ok(())
}

async fn apply(ctx: &Context<'_>, at: &RouteRef) -> Result<(), CliError> {
    let link = ctx.connect().await?;
    let result = link.wall.apply_route(at.level, at.slot).await;
    let route = link.finish(result).await?;
    if ctx.format == OutputFormat::Table {
        ctx.print(&format!(
            "Showing {} ({}/{})",
            route.name, route.level, route.slot
        ));
    }
    Ok(())
}

async fn put(ctx: &Context<'_>, args: PutArgs) -> Result<(), CliError> {
    let wall = ctx.wall()?;
    let frame = match args.frame {
        Some(ref path) => read_frame_file(path)?,
        None => {
            let num_leds = wall.store().num_leds();
            if let Some(bad) = args.lit.iter().find(|&&i| i >= num_leds) {
                return Err(CliError::Validation {
                    field: "lit".into(),
                    reason: format!("pixel {bad} is out of range for {num_leds} LEDs"),
                });
            }
            let [r, g, b] = args.color;
            Frame::lit(num_leds, &args.lit, Rgb::clamped(r, g, b))
        }
    };
    let pin = match args.pin {
        Some(pin) => pin,
        None => rpassword::prompt_password("Admin pin: ").map_err(|e| CliError::Prompt {
            reason: e.to_string(),
        })?,
    };

    let route = wall
        .put_route(args.at.level, args.at.slot, &args.name, frame, &pin)
        .await?;
    let out = render_single(
        ctx.format,
        &route,
        |r| format!("Saved {} at {}/{}", r.name, r.level, r.slot),
        route_line,
    )?;
    ctx.print(&out);
    Ok(())
}
