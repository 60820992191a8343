// ── Frames ──

use serde::{Deserialize, Serialize};

use ledwall_api::Rgb;

use crate::error::CoreError;

/// A full set of pixel colors, index position = wiring order.
///
/// Serializes as a plain `[[r, g, b], ...]` array.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frame(Vec<Rgb>);

impl Frame {
    pub fn new(pixels: Vec<Rgb>) -> Self {
        Self(pixels)
    }

    /// An all-black frame.
    pub fn blank(num_leds: usize) -> Self {
        Self(vec![Rgb::BLACK; num_leds])
    }

    /// A black frame with `indices` lit in `color`. Out-of-range and
    /// repeated indices are ignored.
    pub fn lit(num_leds: usize, indices: &[usize], color: Rgb) -> Self {
        let mut frame = Self::blank(num_leds);
        for &i in indices {
            if let Some(px) = frame.0.get_mut(i) {
                *px = color;
            }
        }
        frame
    }

    /// Build a frame from wide integer triples, clamping each channel.
    pub fn from_wide(rows: &[[i64; 3]]) -> Self {
        Self(rows.iter().map(|&[r, g, b]| Rgb::clamped(r, g, b)).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn pixels(&self) -> &[Rgb] {
        &self.0
    }

    /// Indices of pixels that are not black.
    pub fn lit_indices(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_black())
            .map(|(i, _)| i)
            .collect()
    }

    /// Fail with a validation error unless the frame has exactly `expected` pixels.
    pub fn ensure_len(&self, expected: usize) -> Result<(), CoreError> {
        if self.0.len() == expected {
            Ok(())
        } else {
            Err(CoreError::validation(format!(
                "frame has {} pixels, expected {expected}",
                self.0.len()
            )))
        }
    }

    /// Truncate or pad with black to `num_leds` pixels.
    pub(crate) fn resize(&mut self, num_leds: usize) {
        self.0.resize(num_leds, Rgb::BLACK);
    }
}

impl From<Vec<Rgb>> for Frame {
    fn from(pixels: Vec<Rgb>) -> Self {
        Self(pixels)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn lit_ignores_out_of_range() {
        let white = Rgb::new(255, 255, 255);
        let frame = Frame::lit(5, &[0, 3, 3, 9], white);
        assert_eq!(frame.len(), 5);
        assert_eq!(frame.lit_indices(), vec![0, 3]);
    }

    #[test]
    fn wide_input_is_clamped() {
        let frame = Frame::from_wide(&[[-1, 256, 7]]);
        assert_eq!(frame.pixels(), &[Rgb::new(0, 255, 7)]);
    }

    #[test]
    fn length_check() {
        let frame = Frame::blank(34);
        let err = frame.ensure_len(35).unwrap_err();
        assert!(err.to_string().contains("34 pixels, expected 35"));
        assert!(Frame::blank(35).ensure_len(35).is_ok());
    }

    #[test]
    fn serializes_as_nested_arrays() {
        let frame = Frame::new(vec![Rgb::new(1, 2, 3), Rgb::BLACK]);
        assert_eq!(serde_json::to_string(&frame).unwrap(), "[[1,2,3],[0,0,0]]");
        let back: Frame = serde_json::from_str("[[1,2,3],[0,0,0]]").unwrap();
        assert_eq!(back, frame);
    }
}
