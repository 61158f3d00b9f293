//! # Block Side Module
//!
//! The six faces of a voxel, and the axis/facing pair each face decomposes into.

use cgmath::Vector3;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

/// One of the three grid axes.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug, FromPrimitive, Serialize, Deserialize)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    pub fn all() -> [Axis; 3] {
        [Axis::X, Axis::Y, Axis::Z]
    }

    /// The two in-plane axes `(u, v)` of a slice perpendicular to this axis.
    ///
    /// Merged faces grow their width along `u` and their height along `v`.
    pub fn plane_axes(self) -> (Axis, Axis) {
        match self {
            Axis::X => (Axis::Y, Axis::Z),
            Axis::Y => (Axis::Z, Axis::X),
            Axis::Z => (Axis::X, Axis::Y),
        }
    }
}

/// Whether a face looks along or against its axis.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug, Serialize, Deserialize)]
pub enum Facing {
    Positive,
    Negative,
}

/// Represents the six possible faces of a voxel block.
///
/// The discriminants index per-side tables (textures, edge flags, neighbour slots).
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug, FromPrimitive, Serialize, Deserialize)]
pub enum BlockSide {
    /// Facing negative X
    LEFT = 0,
    /// Facing positive X
    RIGHT = 1,
    /// Facing negative Y
    BOTTOM = 2,
    /// Facing positive Y
    TOP = 3,
    /// Facing negative Z
    BACK = 4,
    /// Facing positive Z
    FRONT = 5,
}

impl BlockSide {
    /// All six sides in discriminant order.
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::LEFT,
            BlockSide::RIGHT,
            BlockSide::BOTTOM,
            BlockSide::TOP,
            BlockSide::BACK,
            BlockSide::FRONT,
        ]
    }

    pub fn from_index(index: usize) -> Option<BlockSide> {
        BlockSide::from_usize(index)
    }

    pub fn from_axis(axis: Axis, facing: Facing) -> BlockSide {
        let offset = match facing {
            Facing::Negative => 0,
            Facing::Positive => 1,
        };
        match BlockSide::from_usize(axis as usize * 2 + offset) {
            Some(side) => side,
            None => unreachable!("axis index is always below three"),
        }
    }

    pub fn axis(self) -> Axis {
        match self {
            BlockSide::LEFT | BlockSide::RIGHT => Axis::X,
            BlockSide::BOTTOM | BlockSide::TOP => Axis::Y,
            BlockSide::BACK | BlockSide::FRONT => Axis::Z,
        }
    }

    pub fn facing(self) -> Facing {
        if self.is_positive() {
            Facing::Positive
        } else {
            Facing::Negative
        }
    }

    pub fn is_positive(self) -> bool {
        matches!(self, BlockSide::RIGHT | BlockSide::TOP | BlockSide::FRONT)
    }

    pub fn opposite(self) -> BlockSide {
        match self {
            BlockSide::LEFT => BlockSide::RIGHT,
            BlockSide::RIGHT => BlockSide::LEFT,
            BlockSide::BOTTOM => BlockSide::TOP,
            BlockSide::TOP => BlockSide::BOTTOM,
            BlockSide::BACK => BlockSide::FRONT,
            BlockSide::FRONT => BlockSide::BACK,
        }
    }

    /// Unit outward normal of the face.
    pub fn normal(self) -> Vector3<i32> {
        let sign = if self.is_positive() { 1 } else { -1 };
        match self.axis() {
            Axis::X => Vector3::new(sign, 0, 0),
            Axis::Y => Vector3::new(0, sign, 0),
            Axis::Z => Vector3::new(0, 0, sign),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_and_facing_round_trip() {
        for side in BlockSide::all() {
            assert_eq!(BlockSide::from_axis(side.axis(), side.facing()), side);
            assert_eq!(BlockSide::from_index(side as usize), Some(side));
            assert_eq!(side.opposite().opposite(), side);
            assert_eq!(side.normal(), side.opposite().normal() * -1);
        }
        assert_eq!(BlockSide::from_index(6), None);
    }
}
