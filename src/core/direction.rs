use serde::{Deserialize, Serialize};

/// Direction of fluid flow momentum.
///
/// Recorded per cell as the last direction fluid left it in, and used to
/// bias subsequent flow. Serialized as its ordinal so persisted cells stay
/// compact and stable across renames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum FlowDirection {
    #[default]
    None,
    North,
    East,
    South,
    West,
    /// Upward flow, for special cases like pumps
    Up,
    /// Downward flow (gravity)
    Down,
}

impl FlowDirection {
    /// Horizontal scan order used by the pressure pass
    pub const HORIZONTAL: [FlowDirection; 4] = [
        FlowDirection::North,
        FlowDirection::East,
        FlowDirection::South,
        FlowDirection::West,
    ];

    /// Get the opposite flow direction
    pub fn opposite(self) -> Self {
        match self {
            FlowDirection::North => FlowDirection::South,
            FlowDirection::East => FlowDirection::West,
            FlowDirection::South => FlowDirection::North,
            FlowDirection::West => FlowDirection::East,
            FlowDirection::Up => FlowDirection::Down,
            FlowDirection::Down => FlowDirection::Up,
            FlowDirection::None => FlowDirection::None,
        }
    }

    /// Unit offset vector (x, y, z) for this direction
    pub fn offset(self) -> (i32, i32, i32) {
        match self {
            FlowDirection::North => (0, 0, -1),
            FlowDirection::East => (1, 0, 0),
            FlowDirection::South => (0, 0, 1),
            FlowDirection::West => (-1, 0, 0),
            FlowDirection::Up => (0, 1, 0),
            FlowDirection::Down => (0, -1, 0),
            FlowDirection::None => (0, 0, 0),
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(
            self,
            FlowDirection::North | FlowDirection::East | FlowDirection::South | FlowDirection::West
        )
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, FlowDirection::Up | FlowDirection::Down)
    }
}

impl From<FlowDirection> for u8 {
    fn from(direction: FlowDirection) -> u8 {
        match direction {
            FlowDirection::None => 0,
            FlowDirection::North => 1,
            FlowDirection::East => 2,
            FlowDirection::South => 3,
            FlowDirection::West => 4,
            FlowDirection::Up => 5,
            FlowDirection::Down => 6,
        }
    }
}

impl TryFrom<u8> for FlowDirection {
    type Error = String;

    fn try_from(ordinal: u8) -> Result<Self, Self::Error> {
        match ordinal {
            0 => Ok(FlowDirection::None),
            1 => Ok(FlowDirection::North),
            2 => Ok(FlowDirection::East),
            3 => Ok(FlowDirection::South),
            4 => Ok(FlowDirection::West),
            5 => Ok(FlowDirection::Up),
            6 => Ok(FlowDirection::Down),
            other => Err(format!("invalid flow direction ordinal {}", other)),
        }
    }
}
