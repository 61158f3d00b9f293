//! # Block Module
//!
//! Block records as stored in the voxel grid, the six block sides, and the
//! registry that maps block type ids to their behaviour.

use serde::{Deserialize, Serialize};

pub mod block_side;
pub mod registry;

/// The integer type used to represent block types in memory.
pub type BlockTypeSize = u16;

/// The reserved type id of empty space.
pub const AIR: BlockTypeSize = 0;

/// A single voxel as stored in a chunk's grid.
///
/// The solid flag is cached from the registry when the block is created so that
/// the meshing loop never needs a registry lookup to decide occlusion.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    pub block_type: BlockTypeSize,
    pub solid: bool,
}

impl Block {
    /// Empty space.
    pub const AIR: Block = Block {
        block_type: AIR,
        solid: false,
    };

    pub fn new(block_type: BlockTypeSize, solid: bool) -> Self {
        Block { block_type, solid }
    }

    pub fn is_air(&self) -> bool {
        self.block_type == AIR
    }
}
