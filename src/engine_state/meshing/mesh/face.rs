use cgmath::Point3;

use crate::engine_state::voxels::block::{
    block_side::{Axis, BlockSide, Facing},
    BlockTypeSize,
};

/// A rectangle of coplanar, same-type unit faces produced by the greedy merger.
///
/// `origin` is the chunk-local cell (interior coordinates, `0..N`) of the block
/// at the rectangle's minimum corner. The rectangle spans `width` cells along the
/// slice's `u` axis and `height` cells along its `v` axis, as given by
/// [`Axis::plane_axes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MergedFace {
    pub origin: Point3<usize>,
    pub width: usize,
    pub height: usize,
    pub axis: Axis,
    pub facing: Facing,
    pub block_type: BlockTypeSize,
}

impl MergedFace {
    /// The block side this face shows.
    pub fn side(&self) -> BlockSide {
        BlockSide::from_axis(self.axis, self.facing)
    }

    /// Number of unit faces covered.
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Whether the face must be wound the other way to point along its facing.
    pub fn is_backface(&self) -> bool {
        self.facing == Facing::Negative
    }

    /// Every block cell whose face this rectangle covers.
    pub fn cells(&self) -> impl Iterator<Item = Point3<usize>> + '_ {
        let (u_axis, v_axis) = self.axis.plane_axes();
        (0..self.height).flat_map(move |dv| {
            (0..self.width).map(move |du| {
                let mut cell = [self.origin.x, self.origin.y, self.origin.z];
                cell[u_axis as usize] += du;
                cell[v_axis as usize] += dv;
                Point3::new(cell[0], cell[1], cell[2])
            })
        })
    }

    /// Quad corners in chunk-local space.
    ///
    /// Ordered `origin`, `+u`, `+u+v`, `+v`; counter-clockwise when seen from the
    /// positive end of `axis`.
    pub fn corners(&self) -> [Point3<f32>; 4] {
        let (u_axis, v_axis) = self.axis.plane_axes();
        let mut base = [
            self.origin.x as f32,
            self.origin.y as f32,
            self.origin.z as f32,
        ];
        if self.facing == Facing::Positive {
            base[self.axis as usize] += 1.0;
        }
        let offset = |du: f32, dv: f32| {
            let mut corner = base;
            corner[u_axis as usize] += du;
            corner[v_axis as usize] += dv;
            Point3::new(corner[0], corner[1], corner[2])
        };
        let (w, h) = (self.width as f32, self.height as f32);
        [offset(0.0, 0.0), offset(w, 0.0), offset(w, h), offset(0.0, h)]
    }
}
