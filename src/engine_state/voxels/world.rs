//! # World Module
//!
//! The sparse set of loaded chunks, addressed by chunk coordinates.
//!
//! ## Padding
//!
//! Each chunk's grid carries `P` layers mirrored from its six face
//! neighbours. [`World::refresh_padding`] copies them right before a mesh
//! build. Neighbour slabs are read one chunk at a time and the target chunk is
//! locked only afterwards, so no two chunk locks are ever held together.
//!
//! ## Edits
//!
//! An edit inside the `P` layers next to a chunk face changes what the
//! neighbour on that side mirrors, so the neighbour is marked edited too and
//! rebuilds with fresh padding.

use std::collections::HashMap;

use cgmath::{Point3, Vector3};
use log::debug;

use super::{
    block::{block_side::BlockSide, registry::BlockRegistry, Block},
    chunk::Chunk,
};
use crate::{
    core::MtResource,
    engine_state::task_management::WorkerId,
    error::{EngineError, EngineResult},
};

/// Represents a voxel world composed of multiple chunks.
///
/// # Examples
///
/// ```
/// use cgmath::Point3;
/// use voxel_geometry_engine::engine_state::voxels::world::World;
///
/// let mut world = World::new(16, 1);
/// world.create_chunk(Point3::new(0, 0, 0), 0);
/// assert!(world.get_chunk_at(Point3::new(0, 0, 0)).is_some());
/// ```
pub struct World {
    chunks: HashMap<Point3<i32>, MtResource<Chunk>>,
    dimension: usize,
    padding: usize,
}

impl World {
    /// Creates a new, empty world.
    ///
    /// # Arguments
    /// * `dimension` - Visible edge length of every chunk
    /// * `padding` - Mirrored layers around every chunk
    pub fn new(dimension: usize, padding: usize) -> Self {
        World {
            chunks: HashMap::new(),
            dimension,
            padding,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Adds an empty chunk, or returns the chunk already at `position`.
    ///
    /// # Arguments
    /// * `position` - Chunk coordinates
    /// * `worker` - The worker all of the chunk's tasks will run on
    pub fn create_chunk(&mut self, position: Point3<i32>, worker: WorkerId) -> MtResource<Chunk> {
        let (dimension, padding) = (self.dimension, self.padding);
        self.chunks
            .entry(position)
            .or_insert_with(|| MtResource::new(Chunk::new(position, dimension, padding, worker)))
            .clone()
    }

    /// Retrieves a chunk at the specified position.
    pub fn get_chunk_at(&self, position: Point3<i32>) -> Option<MtResource<Chunk>> {
        self.chunks.get(&position).cloned()
    }

    /// Like [`World::get_chunk_at`], but a missing chunk is an error.
    pub fn chunk(&self, position: Point3<i32>) -> EngineResult<MtResource<Chunk>> {
        self.get_chunk_at(position)
            .ok_or(EngineError::ChunkNotLoaded(position))
    }

    pub fn remove_chunk(&mut self, position: Point3<i32>) -> Option<MtResource<Chunk>> {
        self.chunks.remove(&position)
    }

    pub fn contains(&self, position: Point3<i32>) -> bool {
        self.chunks.contains_key(&position)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Positions of every loaded chunk, sorted for stable iteration.
    pub fn positions(&self) -> Vec<Point3<i32>> {
        let mut positions: Vec<_> = self.chunks.keys().copied().collect();
        positions.sort_by_key(|position| (position.x, position.y, position.z));
        positions
    }

    /// Splits a world block coordinate into a chunk position and chunk-local coordinates.
    pub fn locate(&self, block: Point3<i32>) -> (Point3<i32>, [i32; 3]) {
        let dimension = self.dimension as i32;
        let split = |coordinate: i32| {
            (
                coordinate.div_euclid(dimension),
                coordinate.rem_euclid(dimension),
            )
        };
        let (cx, lx) = split(block.x);
        let (cy, ly) = split(block.y);
        let (cz, lz) = split(block.z);
        (Point3::new(cx, cy, cz), [lx, ly, lz])
    }

    fn neighbour(position: Point3<i32>, side: BlockSide) -> Point3<i32> {
        let normal: Vector3<i32> = side.normal();
        position + normal
    }

    /// Copies every neighbour's boundary layers into the padding of the chunk at `position`.
    ///
    /// Sides without a neighbour holding voxel data get air padding.
    ///
    /// # Errors
    /// [`EngineError::ChunkNotLoaded`] if there is no chunk at `position`.
    pub fn refresh_padding(&self, position: Point3<i32>) -> EngineResult<()> {
        let chunk = self.chunk(position)?;

        let slabs: Vec<(BlockSide, Option<Vec<Block>>)> = BlockSide::all()
            .into_iter()
            .map(|side| {
                let slab = self
                    .get_chunk_at(Self::neighbour(position, side))
                    .and_then(|neighbour| {
                        let neighbour = neighbour.get();
                        let slab = neighbour
                            .state()
                            .has_voxels()
                            .then(|| neighbour.grid.boundary_slab(side.opposite()));
                        slab
                    });
                (side, slab)
            })
            .collect();

        let mut chunk = chunk.get_mut();
        for (side, slab) in slabs {
            match slab {
                Some(slab) => chunk.grid.apply_padding(side, &slab),
                None => chunk.grid.clear_padding(side),
            }
        }
        Ok(())
    }

    /// Reads a block by world block coordinate.
    pub fn get_block(&self, block: Point3<i32>) -> Option<Block> {
        let (position, [x, y, z]) = self.locate(block);
        let chunk = self.get_chunk_at(position)?;
        let block = chunk.get().grid.get_local(x, y, z);
        Some(block)
    }

    /// Writes a block by world block coordinate.
    ///
    /// # Returns
    /// Every chunk whose geometry is now out of date, the edited chunk first
    ///
    /// # Errors
    /// - [`EngineError::ChunkNotLoaded`] if the block's chunk is not loaded
    /// - [`EngineError::InvalidTransition`] if the chunk has no voxel data yet
    pub fn set_block(&self, block: Point3<i32>, value: Block) -> EngineResult<Vec<Point3<i32>>> {
        let (position, local) = self.locate(block);
        let [x, y, z] = local;
        self.chunk(position)?.get_mut().set_block(x, y, z, value)?;

        let mut affected = vec![position];
        let low = self.padding as i32;
        let high = self.dimension as i32 - self.padding as i32;
        for side in BlockSide::all() {
            let coordinate = local[side.axis() as usize];
            let near_face = if side.is_positive() {
                coordinate >= high
            } else {
                coordinate < low
            };
            if !near_face {
                continue;
            }
            let neighbour_position = Self::neighbour(position, side);
            if let Some(neighbour) = self.get_chunk_at(neighbour_position) {
                let mut neighbour = neighbour.get_mut();
                if neighbour.state().has_voxels() {
                    neighbour.mark_edited()?;
                    affected.push(neighbour_position);
                }
            }
        }
        debug!("block edit at {:?} affects {} chunks", block, affected.len());
        Ok(affected)
    }

    /// Marks every face neighbour holding voxel data as edited.
    ///
    /// Called when a chunk's voxel data appears, since neighbours meshed
    /// earlier mirrored air where it now has blocks.
    pub fn invalidate_neighbours(&self, position: Point3<i32>) -> EngineResult<Vec<Point3<i32>>> {
        let mut invalidated = Vec::new();
        for side in BlockSide::all() {
            let neighbour_position = Self::neighbour(position, side);
            if let Some(neighbour) = self.get_chunk_at(neighbour_position) {
                let mut neighbour = neighbour.get_mut();
                if neighbour.state().has_voxels() {
                    neighbour.mark_edited()?;
                    invalidated.push(neighbour_position);
                }
            }
        }
        Ok(invalidated)
    }

    /// Gives one random interior voxel of a chunk the chance to change type.
    ///
    /// # Returns
    /// Whether the voxel changed
    pub fn random_tick(
        &self,
        position: Point3<i32>,
        registry: &BlockRegistry,
        rng: &mut fastrand::Rng,
    ) -> EngineResult<bool> {
        let chunk = self.chunk(position)?;
        let mut chunk = chunk.get_mut();
        if !chunk.state().has_voxels() {
            return Ok(false);
        }

        let dimension = self.dimension as i32;
        let (x, y, z) = (
            rng.i32(0..dimension),
            rng.i32(0..dimension),
            rng.i32(0..dimension),
        );
        let current = chunk.grid.get_local(x, y, z);
        match registry.definition(current.block_type).random_update() {
            Some(next) => {
                chunk.set_block(x, y, z, registry.block(next))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::chunk::ChunkBuildEvent;

    fn generated(world: &mut World, position: Point3<i32>) -> MtResource<Chunk> {
        let chunk = world.create_chunk(position, 0);
        chunk.get_mut().apply(ChunkBuildEvent::TerrainGenerated).unwrap();
        chunk
    }

    #[test]
    fn locate_handles_negative_coordinates() {
        let world = World::new(16, 1);
        let (position, local) = world.locate(Point3::new(-1, 17, 0));
        assert_eq!(position, Point3::new(-1, 1, 0));
        assert_eq!(local, [15, 1, 0]);
    }

    #[test]
    fn padding_mirrors_neighbours_with_voxels() {
        let registry = BlockRegistry::with_default_blocks();
        let stone = registry.block_named("stone");
        let mut world = World::new(4, 1);
        let left = generated(&mut world, Point3::new(-1, 0, 0));
        let centre = generated(&mut world, Point3::new(0, 0, 0));
        left.get_mut().grid.set_local(3, 1, 2, stone);

        world.refresh_padding(Point3::new(0, 0, 0)).unwrap();
        assert_eq!(centre.get().grid.get_local(-1, 1, 2), stone);
        assert!(centre.get().grid.get_local(4, 1, 2).is_air());
    }

    #[test]
    fn boundary_edit_dirties_the_neighbour() {
        let registry = BlockRegistry::with_default_blocks();
        let mut world = World::new(4, 1);
        generated(&mut world, Point3::new(0, 0, 0));
        let right = generated(&mut world, Point3::new(1, 0, 0));
        let revision = right.get().revision();

        let affected = world
            .set_block(Point3::new(3, 0, 0), registry.block_named("stone"))
            .unwrap();
        assert_eq!(affected, vec![Point3::new(0, 0, 0), Point3::new(1, 0, 0)]);
        assert_eq!(right.get().revision(), revision + 1);

        let affected = world
            .set_block(Point3::new(1, 1, 1), registry.block_named("stone"))
            .unwrap();
        assert_eq!(affected, vec![Point3::new(0, 0, 0)]);
    }

    #[test]
    fn random_tick_applies_decay() {
        let registry = BlockRegistry::with_default_blocks();
        let mut world = World::new(2, 1);
        let chunk = generated(&mut world, Point3::new(0, 0, 0));
        chunk.get_mut().grid.fill_interior(registry.block_named("grass"));

        let mut rng = fastrand::Rng::with_seed(1);
        assert!(world.random_tick(Point3::new(0, 0, 0), &registry, &mut rng).unwrap());
        let dirt = registry.block_named("dirt");
        let chunk = chunk.get();
        let count = (0..2)
            .flat_map(|z| (0..2).flat_map(move |y| (0..2).map(move |x| (x, y, z))))
            .filter(|&(x, y, z)| chunk.grid.get_local(x, y, z) == dirt)
            .count();
        assert_eq!(count, 1);
    }
}
