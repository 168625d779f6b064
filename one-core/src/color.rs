//! Event colors.
//!
//! Google exposes eleven event color ids. The UI only distinguishes five
//! semantic colors, so the ids are folded into those.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventColor {
    #[default]
    Blue,
    Green,
    Purple,
    Red,
    Orange,
}

/// Color of events organized by a public holiday calendar.
pub const HOLIDAY_COLOR: EventColor = EventColor::Green;

/// Color of events with no color id and no holiday organizer.
pub const DEFAULT_COLOR: EventColor = EventColor::Blue;

impl EventColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventColor::Blue => "blue",
            EventColor::Green => "green",
            EventColor::Purple => "purple",
            EventColor::Red => "red",
            EventColor::Orange => "orange",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "blue" => Some(EventColor::Blue),
            "green" => Some(EventColor::Green),
            "purple" => Some(EventColor::Purple),
            "red" => Some(EventColor::Red),
            "orange" => Some(EventColor::Orange),
            _ => None,
        }
    }

    /// Map a Google event color id ("1".."11") to its semantic color.
    pub fn from_color_id(color_id: &str) -> Option<Self> {
        match color_id {
            // Lavender, Grape
            "1" | "3" => Some(EventColor::Purple),
            // Sage, Basil
            "2" | "10" => Some(EventColor::Green),
            // Flamingo, Tomato
            "4" | "11" => Some(EventColor::Red),
            // Banana, Tangerine
            "5" | "6" => Some(EventColor::Orange),
            // Peacock, Graphite, Blueberry
            "7" | "8" | "9" => Some(EventColor::Blue),
            _ => None,
        }
    }

    /// Pick the color for an event: explicit color id, then holiday, then the default.
    pub fn resolve(color_id: Option<&str>, organized_by_holiday_calendar: bool) -> Self {
        if let Some(color) = color_id.and_then(EventColor::from_color_id) {
            return color;
        }
        if organized_by_holiday_calendar {
            HOLIDAY_COLOR
        } else {
            DEFAULT_COLOR
        }
    }
}
