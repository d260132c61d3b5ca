//! Status flags and the overall self-check verdict.
//!
//! `StatusFlag` is the per-entity color used throughout the report. The
//! derived `Ord` follows the severity order, so "bubble the worst status
//! up" is a plain `max` and clamping a subtree floor is a plain `min`.

use serde::{Deserialize, Serialize};

/// Per-entity health color, ordered by severity.
///
/// `Grey` means "no data"; everything above `Green` is an issue.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusFlag {
    #[default]
    Unspecified,
    Grey,
    Green,
    Blue,
    Yellow,
    Orange,
    Red,
}

impl StatusFlag {
    /// Number of distinct flags, for per-color counting arrays.
    pub const COUNT: usize = 7;

    /// The uppercase wire name, as embedded in issue ids.
    pub fn name(self) -> &'static str {
        match self {
            StatusFlag::Unspecified => "UNSPECIFIED",
            StatusFlag::Grey => "GREY",
            StatusFlag::Green => "GREEN",
            StatusFlag::Blue => "BLUE",
            StatusFlag::Yellow => "YELLOW",
            StatusFlag::Orange => "ORANGE",
            StatusFlag::Red => "RED",
        }
    }

    /// Anything except `Green` counts as an issue worth recording.
    pub fn is_error(self) -> bool {
        self != StatusFlag::Green
    }
}

/// Final verdict of a self-check request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelfCheck {
    #[default]
    Unspecified,
    Good,
    Degraded,
    MaintenanceRequired,
    Emergency,
}

/// Color flag reported by the per-node whiteboard (disk-space pressure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WhiteboardFlag {
    Green,
    Yellow,
    Orange,
    Red,
}

impl WhiteboardFlag {
    /// Maps the whiteboard color onto the report status scale.
    pub fn to_status(self) -> StatusFlag {
        match self {
            WhiteboardFlag::Green => StatusFlag::Green,
            WhiteboardFlag::Yellow => StatusFlag::Yellow,
            WhiteboardFlag::Orange => StatusFlag::Orange,
            WhiteboardFlag::Red => StatusFlag::Red,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WhiteboardFlag::Green => "Green",
            WhiteboardFlag::Yellow => "Yellow",
            WhiteboardFlag::Orange => "Orange",
            WhiteboardFlag::Red => "Red",
        }
    }
}
