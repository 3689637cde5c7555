use std::fmt::{self, Display};

/// Direction of a single navigation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("next"),
            Direction::Backward => f.write_str("prev"),
        }
    }
}

/// A user navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Move one item, wrapping at both ends.
    Step(Direction),
    /// Show a specific index (thumbnail click).
    Jump(usize),
}

impl Navigation {
    pub const NEXT: Self = Navigation::Step(Direction::Forward);
    pub const PREV: Self = Navigation::Step(Direction::Backward);

    /// Resolve the target index for a gallery of `len` items, or `None`
    /// when the gallery is empty or a jump is out of range.
    pub fn target(self, current: usize, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        match self {
            Navigation::Step(Direction::Forward) => Some((current + 1) % len),
            Navigation::Step(Direction::Backward) => {
                Some((current % len + len - 1) % len)
            }
            Navigation::Jump(index) => (index < len).then_some(index),
        }
    }

    pub fn direction(self) -> Option<Direction> {
        match self {
            Navigation::Step(direction) => Some(direction),
            Navigation::Jump(_) => None,
        }
    }
}
