//! # Chunk Persistence
//!
//! Chunks are stored as a compact `bincode` record holding the chunk position
//! and a `(cell index, block type)` pair for every non-air interior voxel.
//!
//! Saving writes a sibling `.tmp` file and renames it over the target, so a
//! failed save never damages the previous file. Save and load run as
//! scheduler tasks; the caller gets a [`PersistenceJob`] that reports progress
//! and resolves once the result has been applied on the main thread.

use std::{
    ffi::OsString,
    fs::{self, File},
    future::Future,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    task::{Context, Poll},
};

use cgmath::Point3;
use futures::channel::oneshot;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::{
    block::{registry::BlockRegistry, Block, BlockTypeSize},
    grid::VoxelGrid,
};
use crate::error::{EngineError, EngineResult};

/// The on-disk form of one chunk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub position: [i32; 3],
    pub dimension: u32,
    /// Interior cell index (`x + N * (y + N * z)`) and block type of every non-air voxel.
    pub blocks: Vec<(u32, BlockTypeSize)>,
}

impl ChunkRecord {
    /// Captures the interior of `grid`.
    pub fn from_grid(position: Point3<i32>, grid: &VoxelGrid) -> Self {
        let dimension = grid.dimension();
        let mut blocks = Vec::new();
        for z in 0..dimension {
            for y in 0..dimension {
                for x in 0..dimension {
                    let block = grid.get_local(x as i32, y as i32, z as i32);
                    if !block.is_air() {
                        let index = x + dimension * (y + dimension * z);
                        blocks.push((index as u32, block.block_type));
                    }
                }
            }
        }
        Self {
            position: [position.x, position.y, position.z],
            dimension: dimension as u32,
            blocks,
        }
    }

    /// Replaces the interior of `grid` with the recorded blocks.
    ///
    /// # Arguments
    /// * `grid` - Target grid, must have the recorded dimension
    /// * `registry` - Restores each block's solid flag
    /// * `progress` - Advanced once per restored block
    ///
    /// # Errors
    /// [`EngineError::InvalidRecord`] on a dimension mismatch or an out-of-range index.
    pub fn apply_to(
        &self,
        grid: &mut VoxelGrid,
        registry: &BlockRegistry,
        progress: &PersistenceProgress,
    ) -> EngineResult<()> {
        let dimension = grid.dimension();
        if self.dimension as usize != dimension {
            return Err(EngineError::InvalidRecord(format!(
                "record has dimension {}, chunk has {}",
                self.dimension, dimension
            )));
        }
        let cells = dimension * dimension * dimension;
        if let Some((index, _)) = self.blocks.iter().find(|(index, _)| *index as usize >= cells) {
            return Err(EngineError::InvalidRecord(format!(
                "cell index {} outside a chunk of {} cells",
                index, cells
            )));
        }

        grid.fill_interior(Block::AIR);
        progress.start(self.blocks.len());
        for &(index, block_type) in &self.blocks {
            let index = index as usize;
            let x = index % dimension;
            let y = (index / dimension) % dimension;
            let z = index / (dimension * dimension);
            grid.set_local(x as i32, y as i32, z as i32, registry.block(block_type));
            progress.advance(1);
        }
        Ok(())
    }
}

/// Counts completed units of a save or load.
#[derive(Debug, Default)]
pub struct PersistenceProgress {
    done: AtomicUsize,
    total: AtomicUsize,
}

impl PersistenceProgress {
    fn start(&self, total: usize) {
        self.done.store(0, Ordering::Release);
        self.total.store(total, Ordering::Release);
    }

    fn advance(&self, units: usize) {
        self.done.fetch_add(units, Ordering::AcqRel);
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::Acquire)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }

    /// Completed share between 0 and 1; 0 before the job has started.
    pub fn fraction(&self) -> f32 {
        match self.total() {
            0 => 0.0,
            total => self.done().min(total) as f32 / total as f32,
        }
    }
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Writes `record` to `path` through a temporary sibling file.
///
/// # Errors
/// [`EngineError::Io`] or [`EngineError::Serialization`]; the previous file at `path`
/// is left untouched in either case.
pub fn save_record(
    record: &ChunkRecord,
    path: &Path,
    progress: &PersistenceProgress,
) -> EngineResult<()> {
    progress.start(record.blocks.len());
    let temporary = temporary_path(path);

    let written = (|| -> EngineResult<()> {
        let mut writer = BufWriter::new(File::create(&temporary)?);
        bincode::serialize_into(&mut writer, record)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        fs::rename(&temporary, path)?;
        Ok(())
    })();

    if let Err(error) = written {
        if temporary.exists() {
            if let Err(cleanup) = fs::remove_file(&temporary) {
                warn!("could not remove {}: {}", temporary.display(), cleanup);
            }
        }
        return Err(error);
    }

    progress.advance(record.blocks.len());
    debug!("saved {} blocks to {}", record.blocks.len(), path.display());
    Ok(())
}

/// Reads a record written by [`save_record`].
pub fn load_record(path: &Path) -> EngineResult<ChunkRecord> {
    let reader = BufReader::new(File::open(path)?);
    let record = bincode::deserialize_from(reader)?;
    Ok(record)
}

/// A save or load in progress.
///
/// Await it (or poll [`PersistenceJob::try_result`]) for the outcome. The job
/// resolves once the main thread has applied the task's result, so after a
/// successful load the chunk is ready for a mesh build.
pub struct PersistenceJob {
    progress: Arc<PersistenceProgress>,
    completion: oneshot::Receiver<EngineResult<()>>,
}

/// The task-side end of a [`PersistenceJob`].
pub struct PersistenceHandle {
    pub progress: Arc<PersistenceProgress>,
    completion: oneshot::Sender<EngineResult<()>>,
}

impl PersistenceJob {
    /// Creates a job and the handle its task reports through.
    pub fn channel() -> (PersistenceJob, PersistenceHandle) {
        let progress = Arc::new(PersistenceProgress::default());
        let (sender, receiver) = oneshot::channel();
        (
            PersistenceJob {
                progress: progress.clone(),
                completion: receiver,
            },
            PersistenceHandle {
                progress,
                completion: sender,
            },
        )
    }

    pub fn progress(&self) -> &PersistenceProgress {
        &self.progress
    }

    /// The outcome if the job has finished, without blocking.
    pub fn try_result(&mut self) -> Option<EngineResult<()>> {
        match self.completion.try_recv() {
            Ok(outcome) => outcome,
            Err(oneshot::Canceled) => Some(Err(abandoned())),
        }
    }
}

impl Future for PersistenceJob {
    type Output = EngineResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.completion).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(abandoned())),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl PersistenceHandle {
    /// Resolves the job.
    pub fn finish(self, outcome: EngineResult<()>) {
        if self.completion.send(outcome).is_err() {
            debug!("persistence job was dropped before it finished");
        }
    }
}

fn abandoned() -> EngineError {
    EngineError::TaskFailed {
        task: "persistence".to_string(),
        reason: "the job was abandoned before it finished".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_captures_only_non_air_blocks() {
        let registry = BlockRegistry::with_default_blocks();
        let mut grid = VoxelGrid::new(4, 1);
        grid.set_local(1, 2, 3, registry.block_named("wood"));
        let record = ChunkRecord::from_grid(Point3::new(0, 0, 0), &grid);
        assert_eq!(record.blocks, vec![(1 + 4 * (2 + 4 * 3), registry.id_of("wood"))]);

        let mut restored = VoxelGrid::new(4, 1);
        restored.set_local(0, 0, 0, registry.block_named("stone"));
        let progress = PersistenceProgress::default();
        record.apply_to(&mut restored, &registry, &progress).unwrap();
        assert_eq!(restored, grid);
        assert_eq!(progress.fraction(), 1.0);
    }

    #[test]
    fn mismatched_dimension_is_rejected() {
        let registry = BlockRegistry::with_default_blocks();
        let record = ChunkRecord {
            position: [0, 0, 0],
            dimension: 8,
            blocks: Vec::new(),
        };
        let mut grid = VoxelGrid::new(4, 1);
        let result = record.apply_to(&mut grid, &registry, &PersistenceProgress::default());
        assert!(matches!(result, Err(EngineError::InvalidRecord(_))));
    }

    #[test]
    fn dropped_handle_resolves_the_job_with_an_error() {
        let (mut job, handle) = PersistenceJob::channel();
        assert!(job.try_result().is_none());
        drop(handle);
        assert!(matches!(job.try_result(), Some(Err(EngineError::TaskFailed { .. }))));
    }
}
