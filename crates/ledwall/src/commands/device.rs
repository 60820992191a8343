//! One-shot device commands: connect, run, disconnect.

use std::path::Path;

use serde::{Deserialize, Serialize};

use ledwall_core::{Frame, Pixel, Rgb};

use super::Context;
use crate::cli::{BrightnessArgs, ColorArgs, FrameArgs, OutputFormat, SetArgs};
use crate::error::CliError;
use crate::output::{detail, render_single};

// ── View types ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct DeviceView {
    transport: String,
    endpoint: String,
    num_leds: usize,
    brightness: u8,
}

#[derive(Debug, Serialize)]
struct BrightnessView {
    brightness: u8,
}

fn hex(c: Rgb) -> String {
    format!("#{:02x}{:02x}{:02x}", c.r, c.g, c.b)
}

// ── Handlers ─────────────────────────────────────────────────────────

pub async fn info(ctx: &Context<'_>) -> Result<(), CliError> {
    let link = ctx.connect().await?;
    let status = link.wall.status();
    let view = DeviceView {
        transport: status.kind.map(|k| k.to_string()).unwrap_or_default(),
        endpoint: status.endpoint.unwrap_or_default(),
        num_leds: link.info.num_leds,
        brightness: link.info.brightness,
    };
    link.finish(Ok(())).await?;

    let out = render_single(
        ctx.format,
        &view,
        |v| {
            detail(&[
                ("Transport", v.transport.clone()),
                ("Endpoint", v.endpoint.clone()),
                ("LEDs", v.num_leds.to_string()),
                ("Brightness", v.brightness.to_string()),
            ])
        },
        |v| format!("{} {}", v.num_leds, v.brightness),
    )?;
    ctx.print(&out);
    Ok(())
}

pub async fn set(ctx: &Context<'_>, args: SetArgs) -> Result<(), CliError> {
    let ColorArgs { r, g, b } = args.color;
    let link = ctx.connect().await?;
    let result = link.wall.set_pixel(args.index, r, g, b).await;
    let pixel = link.finish(result).await?;

    let out = render_single(
        ctx.format,
        &pixel,
        |p: &Pixel| format!("Pixel {} set to {}", p.index, hex(p.color)),
        |p| format!("{} {}", p.index, hex(p.color)),
    )?;
    ctx.print(&out);
    Ok(())
}

pub async fn fill(ctx: &Context<'_>, args: ColorArgs) -> Result<(), CliError> {
    let link = ctx.connect().await?;
    let result = link.wall.fill(args.r, args.g, args.b).await;
    link.finish(result).await?;
    if ctx.format == OutputFormat::Table {
        ctx.print(&format!("Filled with {}", hex(Rgb::clamped(args.r, args.g, args.b))));
    }
    Ok(())
}

pub async fn clear(ctx: &Context<'_>) -> Result<(), CliError> {
    let link = ctx.connect().await?;
    let result = link.wall.clear().await;
    link.finish(result).await?;
    if ctx.format == OutputFormat::Table {
        ctx.print("Cleared");
    }
    Ok(())
}

pub async fn brightness(ctx: &Context<'_>, args: BrightnessArgs) -> Result<(), CliError> {
    let link = ctx.connect().await?;
    let result = link.wall.set_brightness(args.value).await;
    let applied = link.finish(result).await?;

    let out = render_single(
        ctx.format,
        &BrightnessView { brightness: applied },
        |v| format!("Brightness set to {}", v.brightness),
        |v| v.brightness.to_string(),
    )?;
    ctx.print(&out);
    Ok(())
}

pub async fn frame(ctx: &Context<'_>, args: FrameArgs) -> Result<(), CliError> {
    let frame = read_frame_file(&args.file)?;
    let link = ctx.connect().await?;
    let result = link.wall.apply_frame(&frame).await;
    link.finish(result).await?;
    if ctx.format == OutputFormat::Table {
        ctx.print(&format!(
            "Applied {} pixels ({} lit)",
            frame.len(),
            frame.lit_indices().len()
        ));
    }
    Ok(())
}

// ── Frame files ──────────────────────────────────────────────────────

/// Either a bare pixel array or anything carrying a `frame` field, such
/// as a route exported with `routes get -o json`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FrameFile {
    Bare(Vec<[i64; 3]>),
    Wrapped { frame: Vec<[i64; 3]> },
}

/// Read a frame from JSON, clamping channels into `0..=255`.
pub fn read_frame_file(path: &Path) -> Result<Frame, CliError> {
    let contents = std::fs::read_to_string(path)?;
    let parsed: FrameFile = serde_json::from_str(&contents)?;
    let rows = match parsed {
        FrameFile::Bare(rows) | FrameFile::Wrapped { frame: rows } => rows,
    };
    Ok(Frame::from_wide(&rows))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("frame.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn bare_frame_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let frame = read_frame_file(&write(&dir, "[[300,-1,7],[0,0,0]]")).unwrap();
        assert_eq!(frame.pixels(), &[Rgb::new(255, 0, 7), Rgb::BLACK]);
    }

    #[test]
    fn exported_route_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"{"level":4,"slot":1,"name":"Everest","frame":[[0,0,0],[0,255,0]]}"#;
        let frame = read_frame_file(&write(&dir, body)).unwrap();
        assert_eq!(frame.lit_indices(), vec![1]);
    }

    #[test]
    fn malformed_file_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_frame_file(&write(&dir, r#"{"pixels":[]}"#)).unwrap_err();
        assert!(matches!(err, CliError::Json(_)));
    }

    #[test]
    fn color_hex_is_lowercase() {
        assert_eq!(hex(Rgb::new(255, 0, 16)), "#ff0010");
    }
}
