//! Greedy meshing of a padded voxel grid.
//!
//! For each of the six directions the grid is swept one slice at a time. Every
//! cell of a slice gets a mask value: the block type plus one where the block
//! shows a face in that direction, zero otherwise. The mask is then scanned
//! row-major; each unconsumed non-zero cell grows a rectangle first along `u`
//! and then along `v` while the mask value matches, and the covered cells are
//! marked consumed. Padding supplies the neighbour for the outermost slice, so
//! faces hidden by an adjacent chunk are never emitted.
//!
//! Output order is deterministic: sides in [`BlockSide::all`] order, slices by
//! increasing coordinate, rectangles in scan order.

use bitvec::vec::BitVec;
use cgmath::Point3;

use super::face::MergedFace;
use crate::{
    config::EngineConfig,
    core::pool::{ArrayPool, BucketPolicy},
    engine_state::voxels::{
        block::{block_side::BlockSide, registry::BlockRegistry, Block},
        grid::VoxelGrid,
    },
    error::EngineResult,
};

/// Which blocks produce faces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceFilter {
    /// Solid blocks whose kind is drawn.
    Render,
    /// Every solid block, drawn or not.
    Collision,
}

impl FaceFilter {
    #[inline]
    fn emits(self, registry: &BlockRegistry, block: Block, side: BlockSide) -> bool {
        registry.is_solid(block, side)
            && match self {
                FaceFilter::Render => registry.builds_faces(block.block_type),
                FaceFilter::Collision => true,
            }
    }
}

/// Per-side switches that drop faces pointing into the padding.
///
/// Used for chunks on the world edge, where there is never a neighbour to look at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EdgePolicy {
    suppress: [bool; 6],
}

impl EdgePolicy {
    /// Keeps every face.
    pub fn none() -> Self {
        Self::default()
    }

    /// The policy the configuration prescribes for the chunk at `position`.
    pub fn for_chunk(config: &EngineConfig, position: Point3<i32>) -> Self {
        let mut policy = Self::none();
        for side in BlockSide::all() {
            policy.suppress[side as usize] = config.suppresses_edge(position, side);
        }
        policy
    }

    pub fn with_suppressed(mut self, side: BlockSide) -> Self {
        self.suppress[side as usize] = true;
        self
    }

    #[inline]
    pub fn suppresses(&self, side: BlockSide) -> bool {
        self.suppress[side as usize]
    }
}

/// Reusable buffers for one meshing thread.
pub struct GreedyScratch {
    masks: ArrayPool<u32>,
    consumed: BitVec,
}

impl GreedyScratch {
    pub fn new(policy: BucketPolicy) -> Self {
        Self {
            masks: ArrayPool::new(policy),
            consumed: BitVec::new(),
        }
    }
}

/// Appends the merged faces of every interior block of `grid` to `out`.
///
/// # Arguments
/// * `grid` - The chunk's padded grid; padding must already mirror its neighbours
/// * `registry` - Resolves solidity and drawability of block types
/// * `filter` - Whether to mesh for rendering or for collision
/// * `edges` - Sides whose outward faces are dropped
/// * `scratch` - Mask and consumed buffers, reused across calls
/// * `out` - Receives the merged faces in deterministic order
pub fn merge_faces(
    grid: &VoxelGrid,
    registry: &BlockRegistry,
    filter: FaceFilter,
    edges: &EdgePolicy,
    scratch: &mut GreedyScratch,
    out: &mut Vec<MergedFace>,
) -> EngineResult<()> {
    let dimension = grid.dimension();
    let mut mask = scratch.masks.pop(dimension * dimension);

    for side in BlockSide::all() {
        merge_side(grid, registry, filter, edges, side, &mut mask, &mut scratch.consumed, out);
    }

    scratch.masks.push(mask)
}

#[allow(clippy::too_many_arguments)]
fn merge_side(
    grid: &VoxelGrid,
    registry: &BlockRegistry,
    filter: FaceFilter,
    edges: &EdgePolicy,
    side: BlockSide,
    mask: &mut [u32],
    consumed: &mut BitVec,
    out: &mut Vec<MergedFace>,
) {
    let dimension = grid.dimension();
    let padding = grid.padding();
    let axis = side.axis();
    let (u_axis, v_axis) = axis.plane_axes();
    let opposite = side.opposite();

    let cell = |layer: usize, u: usize, v: usize| {
        let mut coordinate = [0; 3];
        coordinate[axis as usize] = layer;
        coordinate[u_axis as usize] = u + padding;
        coordinate[v_axis as usize] = v + padding;
        grid.get(coordinate[0], coordinate[1], coordinate[2])
    };

    consumed.clear();
    consumed.resize(dimension * dimension, false);

    for layer in padding..padding + dimension {
        let neighbour_layer = if side.is_positive() { layer + 1 } else { layer - 1 };
        let faces_padding =
            neighbour_layer < padding || neighbour_layer >= padding + dimension;
        if faces_padding && edges.suppresses(side) {
            continue;
        }

        let mut any = false;
        for v in 0..dimension {
            for u in 0..dimension {
                let block = cell(layer, u, v);
                let visible = filter.emits(registry, block, side)
                    && !registry.is_solid(cell(neighbour_layer, u, v), opposite);
                mask[u + v * dimension] = if visible {
                    any = true;
                    block.block_type as u32 + 1
                } else {
                    0
                };
            }
        }
        if !any {
            continue;
        }

        consumed.fill(false);
        for v in 0..dimension {
            let mut u = 0;
            while u < dimension {
                let start = u + v * dimension;
                let value = mask[start];
                if value == 0 || consumed[start] {
                    u += 1;
                    continue;
                }

                let mut width = 1;
                while u + width < dimension
                    && mask[start + width] == value
                    && !consumed[start + width]
                {
                    width += 1;
                }

                let mut height = 1;
                'grow: while v + height < dimension {
                    let row = start + height * dimension;
                    for du in 0..width {
                        if mask[row + du] != value || consumed[row + du] {
                            break 'grow;
                        }
                    }
                    height += 1;
                }

                for dv in 0..height {
                    let row = start + dv * dimension;
                    for du in 0..width {
                        consumed.set(row + du, true);
                    }
                }

                let mut origin = [0; 3];
                origin[axis as usize] = layer - padding;
                origin[u_axis as usize] = u;
                origin[v_axis as usize] = v;
                out.push(MergedFace {
                    origin: Point3::new(origin[0], origin[1], origin[2]),
                    width,
                    height,
                    axis,
                    facing: side.facing(),
                    block_type: (value - 1) as _,
                });

                u += width;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn scratch() -> GreedyScratch {
        GreedyScratch::new(BucketPolicy::RoundUp(100))
    }

    fn mesh(grid: &VoxelGrid, registry: &BlockRegistry, edges: EdgePolicy) -> Vec<MergedFace> {
        let mut faces = Vec::new();
        let mut pools = scratch();
        merge_faces(grid, registry, FaceFilter::Render, &edges, &mut pools, &mut faces).unwrap();
        faces
    }

    #[test]
    fn empty_grid_has_no_faces() {
        let registry = BlockRegistry::with_default_blocks();
        let grid = VoxelGrid::new(4, 1);
        assert!(mesh(&grid, &registry, EdgePolicy::none()).is_empty());
    }

    #[test]
    fn single_block_has_six_unit_faces() {
        let registry = BlockRegistry::with_default_blocks();
        let mut grid = VoxelGrid::new(4, 1);
        grid.set_local(1, 2, 3, registry.block_named("stone"));

        let faces = mesh(&grid, &registry, EdgePolicy::none());
        assert_eq!(faces.len(), 6);
        assert!(faces.iter().all(|face| face.area() == 1 && face.origin == Point3::new(1, 2, 3)));
        let sides: HashSet<_> = faces.iter().map(|face| face.side()).collect();
        assert_eq!(sides.len(), 6);
    }

    #[test]
    fn two_types_split_a_plane() {
        let registry = BlockRegistry::with_default_blocks();
        let stone = registry.block_named("stone");
        let dirt = registry.block_named("dirt");
        let mut grid = VoxelGrid::new(4, 1);
        for z in 0..4 {
            for x in 0..4 {
                grid.set_local(x, 0, z, if x < 2 { stone } else { dirt });
            }
        }

        let tops: Vec<_> = mesh(&grid, &registry, EdgePolicy::none())
            .into_iter()
            .filter(|face| face.side() == BlockSide::TOP)
            .collect();
        assert_eq!(tops.len(), 2);
        assert!(tops.iter().all(|face| face.area() == 8));
        // A merged rectangle never spans both types.
        for face in &tops {
            let expected = if face.origin.x < 2 { stone } else { dirt };
            assert_eq!(face.block_type, expected.block_type);
        }
    }

    #[test]
    fn suppressed_edge_drops_outward_faces() {
        let registry = BlockRegistry::with_default_blocks();
        let mut grid = VoxelGrid::new(2, 1);
        grid.fill_interior(registry.block_named("stone"));

        let edges = EdgePolicy::none().with_suppressed(BlockSide::BOTTOM);
        let faces = mesh(&grid, &registry, edges);
        assert_eq!(faces.len(), 5);
        assert!(faces.iter().all(|face| face.side() != BlockSide::BOTTOM));
    }

    #[test]
    fn barrier_hides_neighbours_but_is_only_meshed_for_collision() {
        let registry = BlockRegistry::with_default_blocks();
        let mut grid = VoxelGrid::new(2, 1);
        grid.set_local(0, 0, 0, registry.block_named("barrier"));

        assert!(mesh(&grid, &registry, EdgePolicy::none()).is_empty());

        let mut faces = Vec::new();
        merge_faces(
            &grid,
            &registry,
            FaceFilter::Collision,
            &EdgePolicy::none(),
            &mut scratch(),
            &mut faces,
        )
        .unwrap();
        assert_eq!(faces.len(), 6);
    }

    #[test]
    fn scratch_mask_returns_to_its_pool() {
        let registry = BlockRegistry::with_default_blocks();
        let grid = VoxelGrid::new(4, 1);
        let mut scratch = scratch();
        let mut faces = Vec::new();
        for _ in 0..3 {
            let edges = EdgePolicy::none();
            merge_faces(&grid, &registry, FaceFilter::Render, &edges, &mut scratch, &mut faces)
                .unwrap();
        }
        assert_eq!(scratch.masks.outstanding(16), 0);
        assert_eq!(scratch.masks.available(16), 1);
    }
}
