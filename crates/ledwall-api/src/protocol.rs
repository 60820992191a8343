// ── Device line protocol ──
//
// One ASCII command per line, one reply per line. Replies are either
// `OK` (optionally followed by a payload) or `ERR <reason>`. Everything
// in here is transport-agnostic: serial and network channels both carry
// the exact same text.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One pixel color. Serialized as a `[r, g, b]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build a color from wider integers, clamping each channel into `0..=255`.
    pub fn clamped(r: i64, g: i64, b: i64) -> Self {
        Self::new(clamp_channel(r), clamp_channel(g), clamp_channel(b))
    }

    pub fn is_black(self) -> bool {
        self == Self::BLACK
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self::new(r, g, b)
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(c: Rgb) -> Self {
        [c.r, c.g, c.b]
    }
}

/// Clamp an integer into a single 8-bit channel.
pub fn clamp_channel(v: i64) -> u8 {
    u8::try_from(v.clamp(0, 255)).unwrap_or(u8::MAX)
}

/// Physical channel order of the strip.
///
/// Many WS2812 clones are wired GRB or BRG; the controller firmware writes
/// bytes as given, so remapping happens on the host side before encoding.
/// Defaults to BRG, the wiring of the stock wall strips.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ColorOrder {
    Rgb,
    Rbg,
    Grb,
    Gbr,
    #[default]
    Brg,
    Bgr,
}

impl ColorOrder {
    /// Reorder a logical RGB color into wire order.
    pub fn apply(self, c: Rgb) -> Rgb {
        let Rgb { r, g, b } = c;
        match self {
            Self::Rgb => Rgb::new(r, g, b),
            Self::Rbg => Rgb::new(r, b, g),
            Self::Grb => Rgb::new(g, r, b),
            Self::Gbr => Rgb::new(g, b, r),
            Self::Brg => Rgb::new(b, r, g),
            Self::Bgr => Rgb::new(b, g, r),
        }
    }
}

// ── Commands ─────────────────────────────────────────────────────────

/// A typed device command. `Display` yields the wire line (no terminator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    Info,
    Bright(u8),
    Fill(Rgb),
    /// Set one pixel and show immediately.
    Set { index: usize, color: Rgb },
    /// Set one pixel without showing.
    SetN { index: usize, color: Rgb },
    Show,
    Clear,
    /// Bulk frame extension: 6 hex digits per pixel in wiring order.
    Frame(Vec<Rgb>),
}

impl Command {
    /// The leading keyword of the wire line.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Ping => "PING",
            Self::Info => "INFO",
            Self::Bright(_) => "BRIGHT",
            Self::Fill(_) => "FILL",
            Self::Set { .. } => "SET",
            Self::SetN { .. } => "SETN",
            Self::Show => "SHOW",
            Self::Clear => "CLEAR",
            Self::Frame(_) => "FRAME",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ping | Self::Info | Self::Show | Self::Clear => f.write_str(self.verb()),
            Self::Bright(v) => write!(f, "BRIGHT {v}"),
            Self::Fill(c) => write!(f, "FILL {} {} {}", c.r, c.g, c.b),
            Self::Set { index, color } | Self::SetN { index, color } => write!(
                f,
                "{} {index} {} {} {}",
                self.verb(),
                color.r,
                color.g,
                color.b
            ),
            Self::Frame(colors) => write!(f, "FRAME {}", encode_frame_hex(colors)),
        }
    }
}

/// Hex-encode a frame: two lowercase digits per channel, pixels in order.
pub fn encode_frame_hex(colors: &[Rgb]) -> String {
    let bytes: Vec<u8> = colors.iter().flat_map(|c| [c.r, c.g, c.b]).collect();
    hex::encode(bytes)
}

// ── Replies ──────────────────────────────────────────────────────────

/// A parsed reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `OK` plus whatever followed it (empty for a bare `OK`).
    Ok(String),
    /// `ERR <reason>`.
    Err(String),
}

impl Reply {
    /// Parse a single reply line. Returns `None` for anything outside the
    /// `OK…` / `ERR …` grammar (boot banners, partial lines, noise).
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if let Some(rest) = strip_keyword(line, "OK") {
            return Some(Self::Ok(rest.to_owned()));
        }
        strip_keyword(line, "ERR").map(|rest| Self::Err(rest.to_owned()))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// `keyword` alone, or `keyword` followed by whitespace and a payload.
fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    if rest.is_empty() {
        Some(rest)
    } else if rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn commands_encode_to_wire_lines() {
        let red = Rgb::new(255, 0, 0);
        assert_eq!(Command::Ping.to_string(), "PING");
        assert_eq!(Command::Bright(32).to_string(), "BRIGHT 32");
        assert_eq!(Command::Fill(red).to_string(), "FILL 255 0 0");
        assert_eq!(
            Command::Set { index: 4, color: red }.to_string(),
            "SET 4 255 0 0"
        );
        assert_eq!(
            Command::SetN { index: 34, color: Rgb::new(1, 2, 3) }.to_string(),
            "SETN 34 1 2 3"
        );
    }

    #[test]
    fn frame_hex_is_six_digits_per_pixel() {
        let cmd = Command::Frame(vec![Rgb::new(255, 0, 16), Rgb::new(1, 2, 171)]);
        assert_eq!(cmd.to_string(), "FRAME ff00100102ab");
    }

    #[test]
    fn reply_grammar() {
        assert_eq!(Reply::parse("OK"), Some(Reply::Ok(String::new())));
        assert_eq!(
            Reply::parse("OK NUM_LEDS 35 BRIGHT 32\r"),
            Some(Reply::Ok("NUM_LEDS 35 BRIGHT 32".into()))
        );
        assert_eq!(
            Reply::parse("ERR index out of range"),
            Some(Reply::Err("index out of range".into()))
        );
        assert_eq!(Reply::parse("READY"), None);
        assert_eq!(Reply::parse("OKAY"), None);
        assert_eq!(Reply::parse(""), None);
    }

    #[test]
    fn clamping_bounds_channels() {
        assert_eq!(Rgb::clamped(-5, 300, 128), Rgb::new(0, 255, 128));
    }

    #[test]
    fn color_order_remaps_channels() {
        let c = Rgb::new(1, 2, 3);
        assert_eq!(ColorOrder::Rgb.apply(c), c);
        assert_eq!(ColorOrder::Grb.apply(c), Rgb::new(2, 1, 3));
        assert_eq!(ColorOrder::Brg.apply(c), Rgb::new(3, 1, 2));
        assert_eq!("BGR".parse::<ColorOrder>().unwrap(), ColorOrder::Bgr);
        assert_eq!(ColorOrder::default(), ColorOrder::Brg);
    }
}
