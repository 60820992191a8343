// ── Typed device operations ──
//
// `DeviceController` owns one `TransportChannel` and turns typed calls into
// protocol lines. All argument checks happen here, before any byte is
// written, so invalid input never reaches the wire.

use tracing::debug;

use ledwall_api::{ColorOrder, Command, Reply, Rgb, TransportChannel, TransportKind};

use crate::config::FrameMode;
use crate::error::CoreError;
use crate::model::{DeviceInfo, Frame};

/// Typed operations on top of a single transport channel.
pub struct DeviceController {
    channel: Box<dyn TransportChannel>,
    color_order: ColorOrder,
    frame_mode: FrameMode,
    info: Option<DeviceInfo>,
}

impl DeviceController {
    pub fn new(
        channel: Box<dyn TransportChannel>,
        color_order: ColorOrder,
        frame_mode: FrameMode,
    ) -> Self {
        Self {
            channel,
            color_order,
            frame_mode,
            info: None,
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.channel.kind()
    }

    pub fn endpoint(&self) -> &str {
        self.channel.endpoint()
    }

    /// Last successfully queried device info.
    pub fn info(&self) -> Option<DeviceInfo> {
        self.info
    }

    // ── Protocol exchange ────────────────────────────────────────────

    /// Send one command and return the `OK` payload.
    async fn exec(&mut self, command: &Command) -> Result<String, CoreError> {
        let line = command.to_string();
        let raw = self.channel.send_command(&line).await?;
        match Reply::parse(&raw) {
            Some(Reply::Ok(payload)) => Ok(payload),
            Some(Reply::Err(reason)) => Err(CoreError::Device {
                command: command.verb().to_owned(),
                reason,
            }),
            None => Err(CoreError::Device {
                command: command.verb().to_owned(),
                reason: format!("unrecognized reply {raw:?}"),
            }),
        }
    }

    /// Like [`exec`](Self::exec) but requires a bare `OK`.
    async fn exec_ok(&mut self, command: &Command) -> Result<(), CoreError> {
        let payload = self.exec(command).await?;
        if payload.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Device {
                command: command.verb().to_owned(),
                reason: format!("expected OK, got \"OK {payload}\""),
            })
        }
    }

    fn num_leds(&self) -> Result<usize, CoreError> {
        self.info
            .map(|i| i.num_leds)
            .ok_or_else(|| CoreError::validation("LED count unknown; query INFO first"))
    }

    // ── Operations ───────────────────────────────────────────────────

    pub async fn ping(&mut self) -> Result<(), CoreError> {
        self.exec_ok(&Command::Ping).await
    }

    pub async fn get_info(&mut self) -> Result<DeviceInfo, CoreError> {
        let payload = self.exec(&Command::Info).await?;
        let info = DeviceInfo::parse(&payload).ok_or_else(|| CoreError::Device {
            command: "INFO".into(),
            reason: format!("malformed INFO payload {payload:?}"),
        })?;
        debug!(num_leds = info.num_leds, brightness = info.brightness, "device info");
        self.info = Some(info);
        Ok(info)
    }

    /// Set global brightness. Out-of-range values are clamped to `0..=255`.
    pub async fn set_brightness(&mut self, value: i64) -> Result<u8, CoreError> {
        let value = ledwall_api::protocol::clamp_channel(value);
        self.exec_ok(&Command::Bright(value)).await?;
        if let Some(info) = self.info.as_mut() {
            info.brightness = value;
        }
        Ok(value)
    }

    pub async fn fill(&mut self, color: Rgb) -> Result<(), CoreError> {
        let color = self.color_order.apply(color);
        self.exec_ok(&Command::Fill(color)).await
    }

    /// Set one pixel. `show = true` sends `SET`, otherwise `SETN`.
    pub async fn set_pixel(&mut self, index: usize, color: Rgb, show: bool) -> Result<(), CoreError> {
        let num_leds = self.num_leds()?;
        if index >= num_leds {
            return Err(CoreError::validation(format!(
                "pixel index {index} out of range (0..{num_leds})"
            )));
        }
        let color = self.color_order.apply(color);
        let command = if show {
            Command::Set { index, color }
        } else {
            Command::SetN { index, color }
        };
        self.exec_ok(&command).await
    }

    pub async fn show(&mut self) -> Result<(), CoreError> {
        self.exec_ok(&Command::Show).await
    }

    pub async fn clear_all(&mut self) -> Result<(), CoreError> {
        self.exec_ok(&Command::Clear).await
    }

    /// Put a whole frame on the wall.
    ///
    /// In per-pixel mode a failure part-way aborts the sequence without
    /// `SHOW` and reports how many pixels were already written.
    pub async fn apply_frame(&mut self, frame: &Frame) -> Result<(), CoreError> {
        frame.ensure_len(self.num_leds()?)?;

        match self.frame_mode {
            FrameMode::Bulk => {
                let pixels = frame
                    .pixels()
                    .iter()
                    .map(|&c| self.color_order.apply(c))
                    .collect();
                self.exec_ok(&Command::Frame(pixels)).await
            }
            FrameMode::PerPixel => {
                for (index, &color) in frame.pixels().iter().enumerate() {
                    let color = self.color_order.apply(color);
                    if let Err(cause) = self.exec_ok(&Command::SetN { index, color }).await {
                        return Err(CoreError::PartialFrame {
                            failed_index: index,
                            applied: index,
                            cause: Box::new(cause),
                        });
                    }
                }
                self.show().await
            }
        }
    }

    /// Release the channel.
    pub async fn close(&mut self) {
        self.channel.close().await;
    }
}

impl std::fmt::Debug for DeviceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceController")
            .field("kind", &self.channel.kind())
            .field("endpoint", &self.channel.endpoint())
            .field("color_order", &self.color_order)
            .field("frame_mode", &self.frame_mode)
            .field("info", &self.info)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ledwall_api::{FaultAction, SimHandle};
    use pretty_assertions::assert_eq;

    async fn controller(num_leds: usize, mode: FrameMode) -> (DeviceController, SimHandle) {
        let sim = SimHandle::new(num_leds);
        let mut dev = DeviceController::new(Box::new(sim.open("sim")), ColorOrder::Rgb, mode);
        dev.get_info().await.unwrap();
        sim.clear_log();
        (dev, sim)
    }

    #[tokio::test]
    async fn set_pixel_round_trip() {
        let (mut dev, sim) = controller(35, FrameMode::PerPixel).await;
        dev.set_pixel(4, Rgb::new(255, 0, 0), true).await.unwrap();
        assert_eq!(sim.commands(), vec!["SET 4 255 0 0"]);
        assert_eq!(sim.shown()[4], Rgb::new(255, 0, 0));

        dev.set_pixel(5, Rgb::new(0, 0, 9), false).await.unwrap();
        assert_eq!(sim.commands()[1], "SETN 5 0 0 9");
    }

    #[tokio::test]
    async fn set_pixel_leaves_other_pixels_untouched() {
        let (mut dev, sim) = controller(35, FrameMode::PerPixel).await;
        let before = Frame::new(
            (0..35u8)
                .map(|i| Rgb::new(i, 200 - i, i.wrapping_mul(7)))
                .collect(),
        );
        dev.apply_frame(&before).await.unwrap();
        assert_eq!(sim.shown(), before.pixels());

        for (index, show) in [(17, true), (0, false), (34, true)] {
            dev.set_pixel(index, Rgb::new(255, 255, 255), show).await.unwrap();
        }
        dev.show().await.unwrap();

        let shown = sim.shown();
        for (i, pixel) in shown.iter().enumerate() {
            let expected = if [0, 17, 34].contains(&i) {
                Rgb::new(255, 255, 255)
            } else {
                before.pixels()[i]
            };
            assert_eq!(*pixel, expected, "pixel {i}");
        }
    }

    #[tokio::test]
    async fn out_of_range_pixel_sends_nothing() {
        let (mut dev, sim) = controller(35, FrameMode::PerPixel).await;
        let err = dev.set_pixel(35, Rgb::new(1, 1, 1), true).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        assert!(sim.commands().is_empty());
        assert!(sim.wire().is_empty());
    }

    #[tokio::test]
    async fn wrong_length_frame_sends_nothing() {
        let (mut dev, sim) = controller(35, FrameMode::PerPixel).await;
        let err = dev.apply_frame(&Frame::blank(34)).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        assert!(sim.commands().is_empty());
    }

    #[tokio::test]
    async fn per_pixel_frame_ends_with_single_show() {
        let (mut dev, sim) = controller(3, FrameMode::PerPixel).await;
        let frame = Frame::new(vec![Rgb::new(1, 0, 0), Rgb::BLACK, Rgb::new(0, 0, 3)]);
        dev.apply_frame(&frame).await.unwrap();
        assert_eq!(
            sim.commands(),
            vec!["SETN 0 1 0 0", "SETN 1 0 0 0", "SETN 2 0 0 3", "SHOW"]
        );
        assert_eq!(sim.shown(), frame.pixels());
    }

    #[tokio::test]
    async fn sixth_setn_failure_aborts_without_show() {
        let (mut dev, sim) = controller(35, FrameMode::PerPixel).await;
        sim.fail_nth("SETN", 6, FaultAction::Reject("index out of range".into()));

        let err = dev.apply_frame(&Frame::blank(35)).await.unwrap_err();
        match err {
            CoreError::PartialFrame {
                failed_index,
                applied,
                cause,
            } => {
                assert_eq!(failed_index, 5);
                assert_eq!(applied, 5);
                assert!(matches!(*cause, CoreError::Device { .. }));
            }
            other => panic!("expected PartialFrame, got {other:?}"),
        }
        let commands = sim.commands();
        assert_eq!(commands.len(), 6);
        assert!(commands.iter().all(|c| c.starts_with("SETN")));
    }

    #[tokio::test]
    async fn bulk_frame_is_one_command() {
        let (mut dev, sim) = controller(2, FrameMode::Bulk).await;
        sim.set_frame_support(true);
        let frame = Frame::new(vec![Rgb::new(255, 0, 16), Rgb::new(1, 2, 171)]);
        dev.apply_frame(&frame).await.unwrap();
        assert_eq!(sim.commands(), vec!["FRAME FF00100102AB"]);
        assert_eq!(sim.shown(), frame.pixels());
    }

    #[tokio::test]
    async fn color_order_remaps_before_the_wire() {
        let sim = SimHandle::new(4);
        let mut dev =
            DeviceController::new(Box::new(sim.open("sim")), ColorOrder::Brg, FrameMode::PerPixel);
        dev.get_info().await.unwrap();
        dev.fill(Rgb::new(1, 2, 3)).await.unwrap();
        dev.set_pixel(0, Rgb::new(10, 20, 30), true).await.unwrap();
        assert_eq!(&sim.commands()[2..], &["FILL 3 1 2", "SET 0 30 10 20"]);
    }

    #[tokio::test]
    async fn brightness_is_clamped_and_cached() {
        let (mut dev, sim) = controller(4, FrameMode::PerPixel).await;
        assert_eq!(dev.set_brightness(400).await.unwrap(), 255);
        assert_eq!(dev.set_brightness(-3).await.unwrap(), 0);
        assert_eq!(sim.commands(), vec!["BRIGHT 255", "BRIGHT 0"]);
        assert_eq!(dev.info().unwrap().brightness, 0);
    }

    #[tokio::test]
    async fn err_reply_maps_to_device_error() {
        let (mut dev, sim) = controller(4, FrameMode::PerPixel).await;
        sim.fail_nth("CLEAR", 1, FaultAction::Reject("busy".into()));
        let err = dev.clear_all().await.unwrap_err();
        match err {
            CoreError::Device { command, reason } => {
                assert_eq!(command, "CLEAR");
                assert_eq!(reason, "busy");
            }
            other => panic!("expected Device, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ping_requires_bare_ok() {
        let sim = SimHandle::new(4);
        let mut dev =
            DeviceController::new(Box::new(sim.open("sim")), ColorOrder::Rgb, FrameMode::PerPixel);
        tokio_test::assert_ok!(dev.ping().await);
        assert!(dev.info().is_none());
    }
}
