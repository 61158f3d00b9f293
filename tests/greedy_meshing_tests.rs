use std::collections::HashSet;

use voxel_geometry_engine::{
    core::pool::{shared, BucketPolicy, ObjectPool},
    engine_state::{
        meshing::{
            geometry_buffer::{GeometryBatcher, GeometryBuffer},
            mesh::{
                face::MergedFace,
                greedy::{merge_faces, EdgePolicy, FaceFilter, GreedyScratch},
            },
        },
        voxels::{
            block::{block_side::BlockSide, registry::BlockRegistry, Block},
            grid::VoxelGrid,
        },
    },
};

fn faces_of(grid: &VoxelGrid, registry: &BlockRegistry, edges: EdgePolicy) -> Vec<MergedFace> {
    let mut scratch = GreedyScratch::new(BucketPolicy::RoundUp(16));
    let mut faces = Vec::new();
    merge_faces(grid, registry, FaceFilter::Render, &edges, &mut scratch, &mut faces).unwrap();
    faces
}

fn random_grid(dimension: usize, seed: u64, registry: &BlockRegistry) -> VoxelGrid {
    let palette = [
        Block::AIR,
        registry.block_named("stone"),
        registry.block_named("dirt"),
        registry.block_named("grass"),
    ];
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut grid = VoxelGrid::new(dimension, 1);
    let n = dimension as i32;
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                grid.set_local(x, y, z, palette[rng.usize(..palette.len())]);
            }
        }
    }
    grid
}

/// Visible unit faces computed cell by cell, as `(interior cell, side)`.
fn naive_faces(grid: &VoxelGrid, registry: &BlockRegistry) -> HashSet<([usize; 3], BlockSide)> {
    let padding = grid.padding();
    let interior = padding..padding + grid.dimension();
    let mut visible = HashSet::new();
    for z in interior.clone() {
        for y in interior.clone() {
            for x in interior.clone() {
                let block = grid.get(x, y, z);
                let solid = registry.is_solid(block, BlockSide::TOP);
                if !solid || !registry.builds_faces(block.block_type) {
                    continue;
                }
                for side in BlockSide::all() {
                    let normal = side.normal();
                    let nx = (x as i32 + normal.x) as usize;
                    let ny = (y as i32 + normal.y) as usize;
                    let nz = (z as i32 + normal.z) as usize;
                    if !registry.is_solid(grid.get(nx, ny, nz), side.opposite()) {
                        visible.insert(([x - padding, y - padding, z - padding], side));
                    }
                }
            }
        }
    }
    visible
}

#[test]
fn solid_chunk_is_six_full_faces() {
    let registry = BlockRegistry::with_default_blocks();
    let mut grid = VoxelGrid::new(8, 1);
    grid.fill_interior(registry.block_named("stone"));

    let faces = faces_of(&grid, &registry, EdgePolicy::none());
    assert_eq!(faces.len(), 6);
    assert!(faces.iter().all(|face| face.area() == 64));
    let sides: HashSet<_> = faces.iter().map(MergedFace::side).collect();
    assert_eq!(sides.len(), 6);
}

#[test]
fn merged_faces_cover_each_visible_face_exactly_once() {
    let registry = BlockRegistry::with_default_blocks();
    for seed in [1, 7, 42] {
        let grid = random_grid(6, seed, &registry);
        let faces = faces_of(&grid, &registry, EdgePolicy::none());

        let mut covered = HashSet::new();
        for face in &faces {
            let side = face.side();
            for cell in face.cells() {
                let cell = [cell.x, cell.y, cell.z];
                assert!(covered.insert((cell, side)), "{cell:?} {side:?} covered twice");
            }
        }
        assert_eq!(covered, naive_faces(&grid, &registry), "seed {seed}");
    }
}

#[test]
fn faces_never_span_block_types() {
    let registry = BlockRegistry::with_default_blocks();
    let grid = random_grid(6, 99, &registry);
    for face in faces_of(&grid, &registry, EdgePolicy::none()) {
        for cell in face.cells() {
            let block = grid.get_local(cell.x as i32, cell.y as i32, cell.z as i32);
            assert_eq!(block.block_type, face.block_type);
        }
    }
}

#[test]
fn stone_slab_merges_into_large_faces() {
    let registry = BlockRegistry::with_default_blocks();
    let stone = registry.block_named("stone");
    let mut grid = VoxelGrid::new(8, 1);
    for z in 0..8 {
        for y in 0..4 {
            for x in 0..8 {
                grid.set_local(x, y, z, stone);
            }
        }
    }

    let faces = faces_of(&grid, &registry, EdgePolicy::none());
    assert_eq!(faces.len(), 6);
    let top: Vec<_> = faces.iter().filter(|face| face.side() == BlockSide::TOP).collect();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].area(), 64);
    assert_eq!(top[0].origin.y, 3);
    assert!(faces
        .iter()
        .filter(|face| face.side().axis() != BlockSide::TOP.axis())
        .all(|face| face.area() == 32));

    // A stone chunk below hides the bottom face.
    grid.apply_padding(BlockSide::BOTTOM, &vec![stone; 64]);
    let faces = faces_of(&grid, &registry, EdgePolicy::none());
    assert_eq!(faces.len(), 5);
    assert!(faces.iter().all(|face| face.side() != BlockSide::BOTTOM));

    // So does a suppressed world edge.
    grid.clear_padding(BlockSide::BOTTOM);
    let edges = EdgePolicy::none().with_suppressed(BlockSide::LEFT);
    let faces = faces_of(&grid, &registry, edges);
    assert_eq!(faces.len(), 5);
    assert!(faces.iter().all(|face| face.side() != BlockSide::LEFT));
}

#[test]
fn batching_splits_without_losing_vertices() {
    let registry = BlockRegistry::with_default_blocks();
    let stone = registry.block_named("stone");
    let mut grid = VoxelGrid::new(6, 1);
    // Checkerboard defeats merging.
    for z in 0..6 {
        for y in 0..6 {
            for x in 0..6 {
                if (x + y + z) % 2 == 0 {
                    grid.set_local(x, y, z, stone);
                }
            }
        }
    }
    let faces = faces_of(&grid, &registry, EdgePolicy::none());
    assert_eq!(faces.len(), 108 * 6);

    let pool = shared(ObjectPool::new("geometry", 1, GeometryBuffer::new));
    let mut batcher = GeometryBatcher::new(64, pool.clone());
    for face in &faces {
        let vertices = registry
            .definition(face.block_type)
            .build_face(face, [0.0; 3])
            .unwrap();
        batcher.add_face(vertices, face.is_backface()).unwrap();
    }
    let geometry = batcher.commit();

    assert_eq!(geometry.vertex_count(), faces.len() * 4);
    assert_eq!(geometry.index_count(), faces.len() * 6);
    assert_eq!(geometry.buffers.len(), (faces.len() * 4).div_ceil(64));
    for buffer in &geometry.buffers {
        assert!(buffer.vertex_count() <= 64);
        assert!(buffer.indices.iter().all(|&index| (index as usize) < buffer.vertex_count()));
    }
    assert_eq!(pool.lock().in_use(), geometry.buffers.len());
}
