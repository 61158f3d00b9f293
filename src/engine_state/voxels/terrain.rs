//! # Terrain Generation
//!
//! Fills a freshly created chunk's interior with blocks. Generators are
//! shared between workers, so they must be deterministic functions of the
//! chunk position and must not rely on interior mutability.

use cgmath::Point3;
use noise::{NoiseFn, Perlin};

use super::{
    block::{registry::BlockRegistry, Block},
    grid::VoxelGrid,
};

/// Populates the interior of a chunk's grid.
pub trait TerrainGenerator: Send + Sync {
    /// # Arguments
    /// * `position` - The chunk's position in chunk coordinates
    /// * `grid` - The chunk's grid; only the interior is written
    /// * `registry` - Resolves block names to records
    fn generate(&self, position: Point3<i32>, grid: &mut VoxelGrid, registry: &BlockRegistry);
}

/// Layered ground: `filler` below the surface, `surface` on top, air above.
#[derive(Clone, Debug)]
pub struct FlatTerrain {
    /// World y of the first air layer.
    pub height: i32,
    pub surface: String,
    pub filler: String,
}

impl FlatTerrain {
    pub fn new(height: i32, surface: &str, filler: &str) -> Self {
        Self {
            height,
            surface: surface.to_string(),
            filler: filler.to_string(),
        }
    }
}

impl TerrainGenerator for FlatTerrain {
    fn generate(&self, position: Point3<i32>, grid: &mut VoxelGrid, registry: &BlockRegistry) {
        let surface = registry.block_named(&self.surface);
        let filler = registry.block_named(&self.filler);
        let dimension = grid.dimension() as i32;

        for y in 0..dimension {
            let world_y = position.y * dimension + y;
            if world_y >= self.height {
                continue;
            }
            let block = if world_y == self.height - 1 {
                surface
            } else {
                filler
            };
            for z in 0..dimension {
                for x in 0..dimension {
                    grid.set_local(x, y, z, block);
                }
            }
        }
    }
}

/// Threshold above which Perlin noise is considered solid.
pub const PERLIN_POSITIVE_THRESHOLD: f64 = 0.2;
/// Threshold below which Perlin noise is considered solid.
pub const PERLIN_NEGATIVE_THRESHOLD: f64 = -0.2;
/// Scaling factor applied to world coordinates when sampling Perlin noise.
pub const PERLIN_SCALE_FACTOR: f64 = 0.02;

/// Cave-like terrain from 3-D Perlin noise.
///
/// A voxel is solid where the noise falls outside the threshold band. Solid
/// voxels pick one of `palette` with a generator seeded from the voxel's world
/// position, so a chunk always regenerates identically.
pub struct PerlinTerrain {
    perlin: Perlin,
    seed: u32,
    palette: Vec<String>,
}

impl PerlinTerrain {
    pub fn new(seed: u32, palette: &[&str]) -> Self {
        Self {
            perlin: Perlin::new(seed),
            seed,
            palette: palette.iter().map(|name| name.to_string()).collect(),
        }
    }

    fn sample(&self, world: Point3<i32>) -> f64 {
        self.perlin.get([
            world.x as f64 * PERLIN_SCALE_FACTOR,
            world.y as f64 * PERLIN_SCALE_FACTOR,
            world.z as f64 * PERLIN_SCALE_FACTOR,
        ])
    }

    fn voxel_seed(&self, world: Point3<i32>) -> u64 {
        let mut hash = self.seed as u64;
        for coordinate in [world.x, world.y, world.z] {
            hash = hash.wrapping_mul(0x100_0000_01b3) ^ (coordinate as u32 as u64);
        }
        hash
    }
}

impl TerrainGenerator for PerlinTerrain {
    fn generate(&self, position: Point3<i32>, grid: &mut VoxelGrid, registry: &BlockRegistry) {
        let palette: Vec<Block> = self
            .palette
            .iter()
            .map(|name| registry.block_named(name))
            .collect();
        if palette.is_empty() {
            return;
        }
        let dimension = grid.dimension() as i32;

        for z in 0..dimension {
            for y in 0..dimension {
                for x in 0..dimension {
                    let world = Point3::new(
                        position.x * dimension + x,
                        position.y * dimension + y,
                        position.z * dimension + z,
                    );
                    let sample = self.sample(world);
                    if (PERLIN_NEGATIVE_THRESHOLD..=PERLIN_POSITIVE_THRESHOLD).contains(&sample) {
                        continue;
                    }
                    let mut rng = fastrand::Rng::with_seed(self.voxel_seed(world));
                    grid.set_local(x, y, z, palette[rng.usize(..palette.len())]);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_terrain_layers_surface_over_filler() {
        let registry = BlockRegistry::with_default_blocks();
        let terrain = FlatTerrain::new(3, "grass", "dirt");
        let mut grid = VoxelGrid::new(4, 1);
        terrain.generate(Point3::new(0, 0, 0), &mut grid, &registry);

        assert_eq!(grid.get_local(1, 2, 1), registry.block_named("grass"));
        assert_eq!(grid.get_local(1, 0, 1), registry.block_named("dirt"));
        assert!(grid.get_local(1, 3, 1).is_air());
        assert_eq!(grid.count_non_air(), 3 * 16);

        let mut above = VoxelGrid::new(4, 1);
        terrain.generate(Point3::new(0, 1, 0), &mut above, &registry);
        assert_eq!(above.count_non_air(), 0);
    }

    #[test]
    fn perlin_terrain_is_deterministic() {
        let registry = BlockRegistry::with_default_blocks();
        let terrain = PerlinTerrain::new(7, &["stone", "dirt"]);
        let mut first = VoxelGrid::new(8, 1);
        let mut second = VoxelGrid::new(8, 1);
        terrain.generate(Point3::new(2, -1, 3), &mut first, &registry);
        terrain.generate(Point3::new(2, -1, 3), &mut second, &registry);
        assert_eq!(first, second);
    }
}
