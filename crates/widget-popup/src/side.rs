use std::fmt;
use std::str::FromStr;

/// Edge of the target the popup attaches to. `Inner*` sides place the
/// popup inside the target span instead of next to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
    InnerTop,
    InnerBottom,
    InnerLeft,
    InnerRight,
    InnerCenter,
}

/// Placement along the cross axis of the side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Align {
    #[default]
    Center,
    Start,
    End,
}

/// Axis a side stacks the popup on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Side {
    pub const ALL: [Side; 9] = [
        Side::Top,
        Side::Bottom,
        Side::Left,
        Side::Right,
        Side::InnerTop,
        Side::InnerBottom,
        Side::InnerLeft,
        Side::InnerRight,
        Side::InnerCenter,
    ];

    /// `None` for `InnerCenter`, which has no main axis.
    pub fn axis(self) -> Option<Axis> {
        match self {
            Side::Top | Side::Bottom | Side::InnerTop | Side::InnerBottom => Some(Axis::Vertical),
            Side::Left | Side::Right | Side::InnerLeft | Side::InnerRight => {
                Some(Axis::Horizontal)
            }
            Side::InnerCenter => None,
        }
    }

    /// Opposite outer side. Inner sides never flip.
    pub fn flipped(self) -> Option<Side> {
        match self {
            Side::Top => Some(Side::Bottom),
            Side::Bottom => Some(Side::Top),
            Side::Left => Some(Side::Right),
            Side::Right => Some(Side::Left),
            _ => None,
        }
    }

    pub fn is_inner(self) -> bool {
        !matches!(self, Side::Top | Side::Bottom | Side::Left | Side::Right)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Top => "top",
            Side::Bottom => "bottom",
            Side::Left => "left",
            Side::Right => "right",
            Side::InnerTop => "inner-top",
            Side::InnerBottom => "inner-bottom",
            Side::InnerLeft => "inner-left",
            Side::InnerRight => "inner-right",
            Side::InnerCenter => "inner-center",
        }
    }
}

impl Align {
    pub fn flipped(self) -> Option<Align> {
        match self {
            Align::Start => Some(Align::End),
            Align::End => Some(Align::Start),
            Align::Center => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Align::Center => "center",
            Align::Start => "start",
            Align::End => "end",
        }
    }
}

/// Text that names no side or alignment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    what: &'static str,
    text: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} is not a popup {}", self.text, self.what)
    }
}

impl std::error::Error for ParseError {}

impl FromStr for Side {
    type Err = ParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Side::ALL
            .into_iter()
            .find(|side| side.as_str() == text)
            .ok_or_else(|| ParseError {
                what: "side",
                text: text.to_string(),
            })
    }
}

impl FromStr for Align {
    type Err = ParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "center" => Ok(Align::Center),
            "start" => Ok(Align::Start),
            "end" => Ok(Align::End),
            _ => Err(ParseError {
                what: "alignment",
                text: text.to_string(),
            }),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Align {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
