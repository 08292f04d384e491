use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};

/// Identifier of a bookmark node. Generated ids combine a millisecond
/// timestamp with a random suffix; uniqueness is best effort.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BookmarkId(String);

impl BookmarkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let suffix: u32 = rand::random();
        Self(format!("{millis}-{suffix:08x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BookmarkId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

// Older exports store ids as floating point timestamps.
impl<'de> Deserialize<'de> for BookmarkId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => Self(text),
            RawId::Number(number) => Self(number.to_string()),
        })
    }
}

/// Removes C0/C1 control characters and trims surrounding whitespace.
pub fn clean_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| !matches!(*c as u32, 0x00..=0x1F | 0x7F..=0x9F))
        .collect::<String>()
        .trim()
        .to_owned()
}

/// Bookmark colour: one of the named palette entries or a literal `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, SerializeDisplay, DeserializeFromStr)]
pub enum BookmarkColor {
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
    Custom([u8; 3]),
}

impl BookmarkColor {
    pub const PALETTE: [BookmarkColor; 5] = [
        BookmarkColor::Red,
        BookmarkColor::Blue,
        BookmarkColor::Green,
        BookmarkColor::Yellow,
        BookmarkColor::Purple,
    ];

    /// Fractional RGB components as written into an outline `/C` entry.
    pub fn to_rgb(self) -> [f32; 3] {
        match self {
            BookmarkColor::Red => [1.0, 0.0, 0.0],
            BookmarkColor::Blue => [0.0, 0.0, 1.0],
            BookmarkColor::Green => [0.0, 1.0, 0.0],
            BookmarkColor::Yellow => [1.0, 1.0, 0.0],
            BookmarkColor::Purple => [0.5, 0.0, 0.5],
            BookmarkColor::Custom([r, g, b]) => {
                [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
            }
        }
    }

    /// 8-bit RGB, used when painting the colour in the terminal.
    pub fn to_rgb8(self) -> [u8; 3] {
        match self {
            BookmarkColor::Custom(rgb) => rgb,
            other => other
                .to_rgb()
                .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8),
        }
    }

    /// Maps a fractional outline colour to the palette. Black (the outline
    /// default) means "no colour"; anything off-palette is kept as hex.
    pub fn from_rgb(r: f32, g: f32, b: f32) -> Option<Self> {
        if r > 0.8 && g < 0.3 && b < 0.3 {
            Some(BookmarkColor::Red)
        } else if r < 0.3 && g < 0.3 && b > 0.8 {
            Some(BookmarkColor::Blue)
        } else if r < 0.3 && g > 0.8 && b < 0.3 {
            Some(BookmarkColor::Green)
        } else if r > 0.8 && g > 0.8 && b < 0.3 {
            Some(BookmarkColor::Yellow)
        } else if r >= 0.5 && g < 0.5 && b >= 0.5 {
            Some(BookmarkColor::Purple)
        } else if r <= 0.0 && g <= 0.0 && b <= 0.0 {
            None
        } else {
            let to_byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
            Some(BookmarkColor::Custom([to_byte(r), to_byte(g), to_byte(b)]))
        }
    }

    /// Next entry when cycling through the palette; custom colours and the
    /// last palette entry wrap around to "no colour".
    pub fn cycle(current: Option<Self>) -> Option<Self> {
        match current {
            None => Some(BookmarkColor::Red),
            Some(color) => {
                let position = Self::PALETTE.iter().position(|c| *c == color)?;
                Self::PALETTE.get(position + 1).copied()
            }
        }
    }
}

impl fmt::Display for BookmarkColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookmarkColor::Red => f.write_str("red"),
            BookmarkColor::Blue => f.write_str("blue"),
            BookmarkColor::Green => f.write_str("green"),
            BookmarkColor::Yellow => f.write_str("yellow"),
            BookmarkColor::Purple => f.write_str("purple"),
            BookmarkColor::Custom([r, g, b]) => write!(f, "#{r:02x}{g:02x}{b:02x}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColorError(String);

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown bookmark color '{}'", self.0)
    }
}

impl std::error::Error for ParseColorError {}

impl FromStr for BookmarkColor {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        match value.to_ascii_lowercase().as_str() {
            "red" => return Ok(BookmarkColor::Red),
            "blue" => return Ok(BookmarkColor::Blue),
            "green" => return Ok(BookmarkColor::Green),
            "yellow" => return Ok(BookmarkColor::Yellow),
            "purple" => return Ok(BookmarkColor::Purple),
            _ => {}
        }

        let hex = value
            .strip_prefix('#')
            .filter(|hex| hex.len() == 6 && hex.is_ascii())
            .ok_or_else(|| ParseColorError(s.to_owned()))?;
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| ParseColorError(s.to_owned()))
        };
        Ok(BookmarkColor::Custom([
            channel(0..2)?,
            channel(2..4)?,
            channel(4..6)?,
        ]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookmarkStyle {
    Normal,
    Bold,
    Italic,
    BoldItalic,
}

impl BookmarkStyle {
    /// Outline item flags: bit 0 italic, bit 1 bold.
    pub fn flags(self) -> i64 {
        match self {
            BookmarkStyle::Normal => 0,
            BookmarkStyle::Italic => 1,
            BookmarkStyle::Bold => 2,
            BookmarkStyle::BoldItalic => 3,
        }
    }

    pub fn from_flags(flags: i64) -> Option<Self> {
        match (flags & 2 != 0, flags & 1 != 0) {
            (true, true) => Some(BookmarkStyle::BoldItalic),
            (true, false) => Some(BookmarkStyle::Bold),
            (false, true) => Some(BookmarkStyle::Italic),
            (false, false) => None,
        }
    }

    pub fn is_bold(self) -> bool {
        matches!(self, BookmarkStyle::Bold | BookmarkStyle::BoldItalic)
    }

    pub fn is_italic(self) -> bool {
        matches!(self, BookmarkStyle::Italic | BookmarkStyle::BoldItalic)
    }

    pub fn cycle(current: Option<Self>) -> Option<Self> {
        match current {
            None | Some(BookmarkStyle::Normal) => Some(BookmarkStyle::Bold),
            Some(BookmarkStyle::Bold) => Some(BookmarkStyle::Italic),
            Some(BookmarkStyle::Italic) => Some(BookmarkStyle::BoldItalic),
            Some(BookmarkStyle::BoldItalic) => None,
        }
    }
}

/// Jump target inside a page, in document space (origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Destination {
    pub x: Option<f64>,
    pub y: Option<f64>,
    /// Zoom as a percentage, `100.0` meaning actual size.
    pub zoom: Option<f64>,
}

impl Destination {
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.zoom.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkNode {
    #[serde(default = "BookmarkId::generate")]
    pub id: BookmarkId,
    pub title: String,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub children: Vec<BookmarkNode>,
    #[serde(default)]
    pub color: Option<BookmarkColor>,
    #[serde(default)]
    pub style: Option<BookmarkStyle>,
    #[serde(rename = "destX", default)]
    pub dest_x: Option<f64>,
    #[serde(rename = "destY", default)]
    pub dest_y: Option<f64>,
    #[serde(default, with = "zoom_percent")]
    pub zoom: Option<f64>,
}

fn first_page() -> u32 {
    1
}

impl BookmarkNode {
    pub fn new(title: impl Into<String>, page: u32) -> Self {
        Self {
            id: BookmarkId::generate(),
            title: title.into(),
            page,
            children: Vec::new(),
            color: None,
            style: None,
            dest_x: None,
            dest_y: None,
            zoom: None,
        }
    }

    pub fn destination(&self) -> Option<Destination> {
        let destination = Destination {
            x: self.dest_x,
            y: self.dest_y,
            zoom: self.zoom,
        };
        (!destination.is_empty()).then_some(destination)
    }

    pub fn set_destination(&mut self, destination: Option<Destination>) {
        let destination = destination.unwrap_or_default();
        self.dest_x = destination.x;
        self.dest_y = destination.y;
        self.zoom = destination.zoom;
    }

    pub(crate) fn clean_titles(&mut self) {
        self.title = clean_title(&self.title);
        for child in &mut self.children {
            child.clean_titles();
        }
    }
}

/// Field replacements for an edit. `None` leaves a field untouched; the
/// nested options of colour, style and destination allow clearing them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookmarkEdit {
    pub title: Option<String>,
    pub page: Option<u32>,
    pub color: Option<Option<BookmarkColor>>,
    pub style: Option<Option<BookmarkStyle>>,
    pub destination: Option<Option<Destination>>,
}

impl BookmarkEdit {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.page.is_none()
            && self.color.is_none()
            && self.style.is_none()
            && self.destination.is_none()
    }
}

mod zoom_percent {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(zoom: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match zoom {
            Some(value) => serializer.serialize_f64(*value),
            None => serializer.serialize_none(),
        }
    }

    // Zoom was historically stored as a percentage string; "" and "0" mean unset.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawZoom {
            Number(f64),
            Text(String),
        }

        let parsed = match Option::<RawZoom>::deserialize(deserializer)? {
            None => None,
            Some(RawZoom::Number(value)) => Some(value),
            Some(RawZoom::Text(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    None
                } else {
                    Some(text.parse::<f64>().map_err(serde::de::Error::custom)?)
                }
            }
        };
        Ok(parsed.filter(|zoom| zoom.is_finite() && *zoom != 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_title_strips_control_characters() {
        assert_eq!(clean_title("  Chapter\u{0}1\u{1f}\u{85} "), "Chapter1");
        assert_eq!(clean_title("Tab\tSeparated"), "TabSeparated");
        let once = clean_title("\u{7f}Intro\n");
        assert_eq!(clean_title(&once), once);
    }

    #[test]
    fn color_round_trips_through_strings() {
        assert_eq!("RED".parse::<BookmarkColor>().unwrap(), BookmarkColor::Red);
        let custom: BookmarkColor = "#FF8000".parse().unwrap();
        assert_eq!(custom, BookmarkColor::Custom([255, 128, 0]));
        assert_eq!(custom.to_string(), "#ff8000");
        assert!("#12345".parse::<BookmarkColor>().is_err());
        assert!("orange".parse::<BookmarkColor>().is_err());
    }

    #[test]
    fn color_from_outline_rgb_uses_palette_thresholds() {
        assert_eq!(BookmarkColor::from_rgb(0.9, 0.1, 0.1), Some(BookmarkColor::Red));
        assert_eq!(BookmarkColor::from_rgb(0.0, 0.0, 1.0), Some(BookmarkColor::Blue));
        assert_eq!(BookmarkColor::from_rgb(0.1, 0.9, 0.2), Some(BookmarkColor::Green));
        assert_eq!(BookmarkColor::from_rgb(1.0, 1.0, 0.0), Some(BookmarkColor::Yellow));
        assert_eq!(BookmarkColor::from_rgb(0.5, 0.0, 0.5), Some(BookmarkColor::Purple));
        assert_eq!(BookmarkColor::from_rgb(0.0, 0.0, 0.0), None);
        assert_eq!(
            BookmarkColor::from_rgb(0.4, 0.4, 0.4),
            Some(BookmarkColor::Custom([102, 102, 102]))
        );
    }

    #[test]
    fn style_flags_match_outline_encoding() {
        assert_eq!(BookmarkStyle::Italic.flags(), 1);
        assert_eq!(BookmarkStyle::Bold.flags(), 2);
        assert_eq!(BookmarkStyle::BoldItalic.flags(), 3);
        assert_eq!(BookmarkStyle::from_flags(3), Some(BookmarkStyle::BoldItalic));
        assert_eq!(BookmarkStyle::from_flags(0), None);
    }

    #[test]
    fn node_json_accepts_legacy_fields() {
        let json = r##"{
            "id": 1700000000000.25,
            "title": "Intro",
            "page": 3,
            "children": [],
            "color": "#00ff00",
            "style": "bold-italic",
            "destX": 10,
            "destY": 700.5,
            "zoom": "150"
        }"##;
        let node: BookmarkNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.id.as_str(), "1700000000000.25");
        assert_eq!(node.color, Some(BookmarkColor::Custom([0, 255, 0])));
        assert_eq!(node.style, Some(BookmarkStyle::BoldItalic));
        assert_eq!(node.zoom, Some(150.0));
        assert_eq!(node.destination().unwrap().y, Some(700.5));
    }

    #[test]
    fn node_json_treats_empty_zoom_as_unset() {
        let node: BookmarkNode =
            serde_json::from_str(r#"{"title": "A", "page": 1, "zoom": ""}"#).unwrap();
        assert_eq!(node.zoom, None);
        assert!(node.destination().is_none());
        assert!(!node.id.as_str().is_empty());
    }

    #[test]
    fn generated_ids_differ() {
        assert_ne!(BookmarkId::generate(), BookmarkId::generate());
    }
}
