//! # Voxel Grid
//!
//! Padded 3-D storage of block records for a single chunk.
//!
//! The visible `N³` interior is surrounded by `P` layers of padding that mirror
//! the neighbouring chunks' boundary blocks, so face visibility at the chunk
//! edge is answered from local memory without bounds branches or cross-chunk
//! queries. Storage is row-major with X varying fastest, then Y, then Z.
//!
//! Coordinates passed to [`VoxelGrid::get`] and [`VoxelGrid::set`] are padded
//! coordinates in `0..N + 2P`; the interior starts at `P`. Out-of-range
//! coordinates are a caller error and trip a debug assertion.

use super::block::{block_side::{Axis, BlockSide}, Block};

#[derive(Clone, Debug, PartialEq)]
pub struct VoxelGrid {
    dimension: usize,
    padding: usize,
    extent: usize,
    blocks: Vec<Block>,
}

impl VoxelGrid {
    /// Creates a grid filled with air.
    ///
    /// # Arguments
    /// * `dimension` - Visible edge length `N`
    /// * `padding` - Mirrored layers `P` on every side
    pub fn new(dimension: usize, padding: usize) -> Self {
        let extent = dimension + 2 * padding;
        Self {
            dimension,
            padding,
            extent,
            blocks: vec![Block::AIR; extent * extent * extent],
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Edge length including padding.
    pub fn extent(&self) -> usize {
        self.extent
    }

    /// Linear index of a padded coordinate.
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        debug_assert!(
            x < self.extent && y < self.extent && z < self.extent,
            "({x}, {y}, {z}) outside padded extent {}",
            self.extent
        );
        x + self.extent * (y + self.extent * z)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> Block {
        self.blocks[self.index(x, y, z)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, block: Block) {
        let index = self.index(x, y, z);
        self.blocks[index] = block;
    }

    /// Reads a block by chunk-local coordinates in `-P..N + P`.
    pub fn get_local(&self, x: i32, y: i32, z: i32) -> Block {
        let [x, y, z] = self.local_to_padded([x, y, z]);
        self.get(x, y, z)
    }

    /// Writes a block by chunk-local coordinates in `-P..N + P`.
    pub fn set_local(&mut self, x: i32, y: i32, z: i32, block: Block) {
        let [x, y, z] = self.local_to_padded([x, y, z]);
        self.set(x, y, z, block);
    }

    fn local_to_padded(&self, local: [i32; 3]) -> [usize; 3] {
        let padding = self.padding as i32;
        local.map(|coordinate| {
            debug_assert!(coordinate >= -padding, "local coordinate {coordinate} below padding");
            (coordinate + padding) as usize
        })
    }

    /// Whether a padded coordinate lies in the visible interior.
    pub fn is_interior(&self, x: usize, y: usize, z: usize) -> bool {
        let range = self.padding..self.padding + self.dimension;
        range.contains(&x) && range.contains(&y) && range.contains(&z)
    }

    /// Sets every interior voxel to `block`, leaving the padding untouched.
    pub fn fill_interior(&mut self, block: Block) {
        let range = self.padding..self.padding + self.dimension;
        for z in range.clone() {
            for y in range.clone() {
                for x in range.clone() {
                    self.set(x, y, z, block);
                }
            }
        }
    }

    /// Number of interior voxels that are not air.
    pub fn count_non_air(&self) -> usize {
        let range = self.padding..self.padding + self.dimension;
        let mut count = 0;
        for z in range.clone() {
            for y in range.clone() {
                for x in range.clone() {
                    if !self.get(x, y, z).is_air() {
                        count += 1;
                    }
                }
            }
        }
        count
    }

    /// Maps a position in a side slab back to a padded coordinate.
    fn slab_coordinate(&self, axis: Axis, layer: usize, u: usize, v: usize) -> [usize; 3] {
        let (u_axis, v_axis) = axis.plane_axes();
        let mut coordinate = [0; 3];
        coordinate[axis as usize] = layer;
        coordinate[u_axis as usize] = u + self.padding;
        coordinate[v_axis as usize] = v + self.padding;
        coordinate
    }

    fn slab_cells(&self) -> usize {
        self.padding * self.dimension * self.dimension
    }

    /// Copies the `P` interior layers adjacent to `side`, ordered by increasing coordinate.
    ///
    /// This is what a neighbour on that side needs for its own padding.
    pub fn boundary_slab(&self, side: BlockSide) -> Vec<Block> {
        let first_layer = if side.is_positive() {
            self.dimension
        } else {
            self.padding
        };
        self.read_slab(side.axis(), first_layer)
    }

    /// Overwrites the padding on `side` with a neighbour's [`VoxelGrid::boundary_slab`].
    pub fn apply_padding(&mut self, side: BlockSide, slab: &[Block]) {
        debug_assert_eq!(slab.len(), self.slab_cells(), "padding slab has the wrong size");
        let first_layer = self.padding_start(side);
        let axis = side.axis();
        let mut cells = slab.iter();
        for layer in first_layer..first_layer + self.padding {
            for v in 0..self.dimension {
                for u in 0..self.dimension {
                    let [x, y, z] = self.slab_coordinate(axis, layer, u, v);
                    if let Some(block) = cells.next() {
                        self.set(x, y, z, *block);
                    }
                }
            }
        }
    }

    /// Resets the padding on `side` to air.
    pub fn clear_padding(&mut self, side: BlockSide) {
        let slab = vec![Block::AIR; self.slab_cells()];
        self.apply_padding(side, &slab);
    }

    /// The current padding contents on `side`.
    pub fn padding_slab(&self, side: BlockSide) -> Vec<Block> {
        self.read_slab(side.axis(), self.padding_start(side))
    }

    fn padding_start(&self, side: BlockSide) -> usize {
        if side.is_positive() {
            self.padding + self.dimension
        } else {
            0
        }
    }

    fn read_slab(&self, axis: Axis, first_layer: usize) -> Vec<Block> {
        let mut slab = Vec::with_capacity(self.slab_cells());
        for layer in first_layer..first_layer + self.padding {
            for v in 0..self.dimension {
                for u in 0..self.dimension {
                    let [x, y, z] = self.slab_coordinate(axis, layer, u, v);
                    slab.push(self.get(x, y, z));
                }
            }
        }
        slab
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stone() -> Block {
        Block::new(1, true)
    }

    #[test]
    fn local_and_padded_coordinates_agree() {
        let mut grid = VoxelGrid::new(4, 1);
        assert_eq!(grid.extent(), 6);
        grid.set_local(0, 0, 0, stone());
        assert_eq!(grid.get(1, 1, 1), stone());
        grid.set_local(-1, 4, 2, stone());
        assert_eq!(grid.get(0, 5, 3), stone());
        assert!(!grid.is_interior(0, 5, 3));
        assert!(grid.is_interior(1, 4, 3));
    }

    #[test]
    fn fill_interior_leaves_padding_as_air() {
        let mut grid = VoxelGrid::new(3, 1);
        grid.fill_interior(stone());
        assert_eq!(grid.count_non_air(), 27);
        assert!(grid.get(0, 1, 1).is_air());
        assert!(grid.get(4, 4, 4).is_air());
    }

    #[test]
    fn boundary_slab_lands_in_the_opposite_padding() {
        let mut left = VoxelGrid::new(4, 1);
        let mut right = VoxelGrid::new(4, 1);
        // Rightmost interior column of the left chunk.
        left.set_local(3, 2, 1, stone());

        right.apply_padding(BlockSide::LEFT, &left.boundary_slab(BlockSide::RIGHT));
        assert_eq!(right.get_local(-1, 2, 1), stone());
        assert!(right.get_local(-1, 1, 1).is_air());

        right.clear_padding(BlockSide::LEFT);
        assert!(right.get_local(-1, 2, 1).is_air());
    }

    #[test]
    fn wide_padding_copies_every_layer() {
        let mut below = VoxelGrid::new(4, 2);
        let mut above = VoxelGrid::new(4, 2);
        below.set_local(1, 2, 3, stone());
        below.set_local(1, 3, 3, stone());

        above.apply_padding(BlockSide::BOTTOM, &below.boundary_slab(BlockSide::TOP));
        assert_eq!(above.get_local(1, -2, 3), stone());
        assert_eq!(above.get_local(1, -1, 3), stone());
        assert_eq!(above.padding_slab(BlockSide::BOTTOM), below.boundary_slab(BlockSide::TOP));
    }
}
