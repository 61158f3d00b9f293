//! # Engine State Module
//!
//! The main-thread side of the engine and the subsystems it coordinates.
//!
//! ## Key Components
//!
//! * `EngineState` - Owns the world, the committed meshes and the task scheduler
//! * `context` - Resources shared with the workers and per-worker scratch memory
//! * `meshing` - Greedy meshing, geometry buffers, mesh slots and colliders
//! * `task_management` - Worker threads, priorities and completion routing
//! * `voxels` - Blocks, chunk grids, the world, terrain and persistence
//!
//! ## Frame Flow
//!
//! Once per frame the host calls [`EngineState::tick`]. It handles every task
//! result that arrived since the last tick (committing meshes and colliders
//! through the [`RenderCollaborator`]), requests rebuilds for chunks whose
//! voxels changed, and commits the new work to the workers. The tick never
//! waits on a worker.

use std::{collections::HashSet, path::PathBuf, sync::Arc, time::Duration};

use cgmath::Point3;
use log::{debug, error, warn};
use web_time::Instant;

use self::{
    context::EngineResources,
    meshing::{
        mesh::greedy::EdgePolicy,
        mesh_registry::{MeshRegistry, RenderCollaborator},
        tasks::chunk_mesh_generation_task::ChunkMeshGenerationTask,
    },
    task_management::{
        task::{TaskCompletion, TaskItem, TaskLabel, TaskPriority},
        TaskScheduler,
    },
    voxels::{
        block::{registry::BlockRegistry, Block},
        chunk::{Chunk, ChunkBuildEvent, ChunkBuildState},
        persistence::PersistenceJob,
        tasks::{
            chunk_generation_task::ChunkGenerationTask,
            chunk_persistence_task::{ChunkLoadTask, ChunkSaveTask},
        },
        terrain::TerrainGenerator,
        world::World,
    },
};
use crate::{
    config::EngineConfig,
    core::MtResource,
    error::{EngineError, EngineResult},
};

pub mod context;
pub mod meshing;
pub mod task_management;
pub mod voxels;

/// Main-thread state a [`TaskResult`](task_management::task::TaskResult) may touch.
pub struct CommitContext<'a> {
    pub world: &'a mut World,
    pub meshes: &'a mut MeshRegistry,
    pub renderer: &'a mut dyn RenderCollaborator,
    pub resources: &'a EngineResources,
}

/// What one [`EngineState::tick`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Results handled successfully.
    pub completed: usize,
    /// Tasks that failed on a worker or while their result was handled.
    pub failed: usize,
    /// Tasks handed to the workers at the end of the tick.
    pub committed: usize,
}

/// The main state container for the voxel engine.
///
/// # Examples
///
/// ```no_run
/// use std::{sync::Arc, time::Duration};
///
/// use cgmath::Point3;
/// use voxel_geometry_engine::{
///     config::EngineConfig,
///     engine_state::{
///         meshing::mesh_registry::NullRenderer,
///         voxels::{block::registry::BlockRegistry, terrain::FlatTerrain},
///         EngineState,
///     },
/// };
///
/// let mut engine = EngineState::new(
///     EngineConfig::default(),
///     BlockRegistry::with_default_blocks(),
///     Arc::new(FlatTerrain::new(8, "grass", "dirt")),
/// )?;
/// engine.request_terrain(Point3::new(0, 0, 0))?;
/// engine.flush(&mut NullRenderer, Duration::from_secs(5))?;
/// # Ok::<(), voxel_geometry_engine::error::EngineError>(())
/// ```
pub struct EngineState {
    resources: Arc<EngineResources>,
    world: World,
    meshes: MeshRegistry,
    scheduler: TaskScheduler,
    terrain: Arc<dyn TerrainGenerator>,
    failed: HashSet<Point3<i32>>,
    rng: fastrand::Rng,
}

impl EngineState {
    /// Validates the configuration and starts the worker pool.
    ///
    /// # Arguments
    /// * `config` - Engine configuration
    /// * `registry` - The block set
    /// * `terrain` - Fills chunks requested with [`EngineState::request_terrain`]
    pub fn new(
        config: EngineConfig,
        registry: BlockRegistry,
        terrain: Arc<dyn TerrainGenerator>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let world = World::new(config.chunk_dimension, config.padding);
        let resources = EngineResources::new(config, registry);
        let scheduler = TaskScheduler::from_config(resources.clone())?;
        let meshes = MeshRegistry::new(resources.geometry_pool.clone());

        Ok(Self {
            resources,
            world,
            meshes,
            scheduler,
            terrain,
            failed: HashSet::new(),
            rng: fastrand::Rng::new(),
        })
    }

    pub fn resources(&self) -> &EngineResources {
        &self.resources
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn meshes(&self) -> &MeshRegistry {
        &self.meshes
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    pub fn chunk_state(&self, position: Point3<i32>) -> Option<ChunkBuildState> {
        let chunk = self.world.get_chunk_at(position)?;
        let state = chunk.get().state();
        Some(state)
    }

    /// Chunks whose last build or load failed, for the streaming layer to retry.
    pub fn failed_chunks(&self) -> Vec<Point3<i32>> {
        let mut failed: Vec<_> = self.failed.iter().copied().collect();
        failed.sort_by_key(|position| (position.x, position.y, position.z));
        failed
    }

    fn ensure_running(&self) -> EngineResult<()> {
        if self.scheduler.is_stopped() {
            return Err(EngineError::SchedulerStopped);
        }
        Ok(())
    }

    fn chunk_or_create(&mut self, position: Point3<i32>) -> MtResource<Chunk> {
        match self.world.get_chunk_at(position) {
            Some(chunk) => chunk,
            None => {
                let worker = self.scheduler.next_worker_id();
                self.world.create_chunk(position, worker)
            }
        }
    }

    /// Creates the chunk if needed and schedules terrain generation for it.
    ///
    /// # Errors
    /// [`EngineError::InvalidTransition`] if the chunk already holds or is receiving voxels.
    pub fn request_terrain(&mut self, position: Point3<i32>) -> EngineResult<()> {
        self.ensure_running()?;
        let chunk = self.chunk_or_create(position);
        let (worker, revision) = {
            let mut guard = chunk.get_mut();
            guard.apply(ChunkBuildEvent::LoadStarted)?;
            (guard.worker, guard.revision())
        };
        self.failed.remove(&position);
        let task = ChunkGenerationTask::new(chunk, position, revision, self.terrain.clone());
        self.scheduler
            .enqueue(TaskItem::new(task, TaskPriority::Ordinary).on_worker(worker))?;
        Ok(())
    }

    /// Refreshes the chunk's padding and schedules a mesh build.
    ///
    /// # Arguments
    /// * `position` - The chunk to mesh
    /// * `priority` - [`TaskPriority::High`] for chunks the player is looking at or editing
    ///
    /// # Errors
    /// - [`EngineError::ChunkNotLoaded`] if there is no such chunk
    /// - [`EngineError::InvalidTransition`] if its voxels are not ready or a build is running
    pub fn request_mesh(
        &mut self,
        position: Point3<i32>,
        priority: TaskPriority,
    ) -> EngineResult<()> {
        self.ensure_running()?;
        let chunk = self.world.chunk(position)?;
        {
            let guard = chunk.get();
            guard.state().transition(ChunkBuildEvent::MeshRequested)?;
        }
        self.world.refresh_padding(position)?;
        let (worker, snapshot) = {
            let mut guard = chunk.get_mut();
            guard.apply(ChunkBuildEvent::MeshRequested)?;
            (guard.worker, guard.snapshot())
        };
        self.failed.remove(&position);

        let edges = EdgePolicy::for_chunk(&self.resources.config, position);
        let task = ChunkMeshGenerationTask::new(chunk, position, snapshot, edges);
        self.scheduler
            .enqueue(TaskItem::new(task, priority).on_worker(worker))?;
        Ok(())
    }

    /// Requests a new mesh for a chunk whose last build failed.
    pub fn retry(&mut self, position: Point3<i32>) -> EngineResult<()> {
        self.request_mesh(position, TaskPriority::Ordinary)
    }

    /// Edits a block and schedules priority rebuilds of every affected chunk.
    ///
    /// # Arguments
    /// * `block_position` - World block coordinate
    /// * `block` - The new block
    pub fn set_block(&mut self, block_position: Point3<i32>, block: Block) -> EngineResult<()> {
        let affected = self.world.set_block(block_position, block)?;
        for position in affected {
            if self.chunk_state(position) == Some(ChunkBuildState::Dirty) {
                self.request_mesh(position, TaskPriority::High)?;
            }
        }
        Ok(())
    }

    /// Edits a block by name; unknown names place air.
    pub fn set_block_named(&mut self, block_position: Point3<i32>, name: &str) -> EngineResult<()> {
        let block = self.resources.registry.block_named(name);
        self.set_block(block_position, block)
    }

    /// Gives one random voxel of the chunk a chance to change type.
    ///
    /// A changed chunk is rebuilt on the next tick.
    pub fn random_tick(&mut self, position: Point3<i32>) -> EngineResult<bool> {
        self.world
            .random_tick(position, &self.resources.registry, &mut self.rng)
    }

    /// Schedules a save of the chunk's voxels to `path`.
    ///
    /// # Errors
    /// [`EngineError::ChunkNotLoaded`] if the chunk does not exist or has no voxel data yet.
    pub fn save_chunk(
        &mut self,
        position: Point3<i32>,
        path: impl Into<PathBuf>,
    ) -> EngineResult<PersistenceJob> {
        self.ensure_running()?;
        let chunk = self.world.chunk(position)?;
        let (worker, snapshot) = {
            let guard = chunk.get();
            if !guard.state().has_voxels() {
                return Err(EngineError::ChunkNotLoaded(position));
            }
            (guard.worker, guard.snapshot())
        };
        let (job, handle) = PersistenceJob::channel();
        let task = ChunkSaveTask::new(position, snapshot, path.into(), handle);
        self.scheduler
            .enqueue(TaskItem::new(task, TaskPriority::Ordinary).on_worker(worker))?;
        Ok(job)
    }

    /// Creates the chunk if needed and schedules loading its voxels from `path`.
    ///
    /// The chunk cannot be meshed until the returned job has resolved.
    pub fn load_chunk(
        &mut self,
        position: Point3<i32>,
        path: impl Into<PathBuf>,
    ) -> EngineResult<PersistenceJob> {
        self.ensure_running()?;
        let chunk = self.chunk_or_create(position);
        let (worker, revision) = {
            let mut guard = chunk.get_mut();
            guard.apply(ChunkBuildEvent::LoadStarted)?;
            (guard.worker, guard.revision())
        };
        self.failed.remove(&position);
        let (job, handle) = PersistenceJob::channel();
        let task = ChunkLoadTask::new(chunk, position, revision, path.into(), handle);
        self.scheduler
            .enqueue(TaskItem::new(task, TaskPriority::Ordinary).on_worker(worker))?;
        Ok(job)
    }

    /// Drops a chunk and its committed geometry. Results still in flight for it are discarded.
    pub fn unload_chunk(
        &mut self,
        position: Point3<i32>,
        renderer: &mut dyn RenderCollaborator,
    ) -> bool {
        self.failed.remove(&position);
        if self.world.remove_chunk(position).is_none() {
            return false;
        }
        self.meshes.remove(position, renderer);
        true
    }

    /// Requests meshes for chunks that have voxel data but no current mesh.
    ///
    /// Failed chunks are left alone until they are retried.
    ///
    /// # Returns
    /// The number of builds requested
    pub fn rebuild_stale(&mut self) -> EngineResult<usize> {
        let mut requested = 0;
        for position in self.world.positions() {
            if matches!(
                self.chunk_state(position),
                Some(ChunkBuildState::TerrainGenerated | ChunkBuildState::Dirty)
            ) {
                self.request_mesh(position, TaskPriority::Ordinary)?;
                requested += 1;
            }
        }
        Ok(requested)
    }

    /// Runs one main-thread pass: handle results, request rebuilds, commit work.
    ///
    /// # Arguments
    /// * `renderer` - Receives committed meshes and colliders
    pub fn tick(&mut self, renderer: &mut dyn RenderCollaborator) -> EngineResult<TickSummary> {
        let mut summary = TickSummary::default();

        for completion in self.scheduler.try_completions() {
            match completion {
                TaskCompletion::Completed { label, result, .. } => {
                    let mut context = CommitContext {
                        world: &mut self.world,
                        meshes: &mut self.meshes,
                        renderer: &mut *renderer,
                        resources: &self.resources,
                    };
                    match result.handle_result(&mut context) {
                        Ok(follow_ups) => {
                            summary.completed += 1;
                            for item in follow_ups {
                                self.scheduler.enqueue(item)?;
                            }
                        }
                        Err(error) => {
                            error!("handling the result of {} failed: {}", label, error);
                            summary.failed += 1;
                            self.mark_failed(&label);
                        }
                    }
                }
                TaskCompletion::Failed { label, .. } => {
                    summary.failed += 1;
                    self.mark_failed(&label);
                }
            }
        }

        self.rebuild_stale()?;
        summary.committed = self.scheduler.commit();
        if summary != TickSummary::default() {
            debug!("tick: {:?}", summary);
        }
        Ok(summary)
    }

    /// Moves the failed task's chunk out of its build or load state and records it as retryable.
    ///
    /// Failures of builds the chunk has moved past (an edit bumped its
    /// revision, or the build already finished) leave the chunk alone.
    fn mark_failed(&mut self, label: &TaskLabel) {
        let (Some(position), Some(build)) = (label.chunk, label.build) else {
            return;
        };
        let Some(chunk) = self.world.get_chunk_at(position) else {
            return;
        };
        let mut chunk = chunk.get_mut();
        if chunk.state() != build.state || chunk.revision() != build.revision {
            debug!(
                "ignoring failed {} of revision {}; chunk is at {} in {:?}",
                label.name,
                build.revision,
                chunk.revision(),
                chunk.state()
            );
            return;
        }
        match chunk.apply(ChunkBuildEvent::BuildFailed) {
            Ok(_) => {
                self.failed.insert(position);
            }
            Err(error) => warn!("could not mark chunk {:?} failed: {}", position, error),
        }
    }

    /// Ticks until no task is pending or in flight.
    ///
    /// Blocks between ticks; meant for tools, tests and shutdown rather than a frame loop.
    ///
    /// # Errors
    /// [`EngineError::Timeout`] if work is still outstanding after `timeout`.
    pub fn flush(
        &mut self,
        renderer: &mut dyn RenderCollaborator,
        timeout: Duration,
    ) -> EngineResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            self.tick(renderer)?;
            let in_flight = self.scheduler.in_flight();
            if in_flight == 0 && self.scheduler.pending() == 0 {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(EngineError::Timeout { in_flight });
            }
            self.scheduler.wait_for_completion(deadline - now);
        }
    }

    /// Stops the worker pool. Further requests fail with [`EngineError::SchedulerStopped`].
    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::{meshing::mesh_registry::NullRenderer, voxels::terrain::FlatTerrain};

    fn engine() -> EngineState {
        let config = EngineConfig {
            chunk_dimension: 8,
            worker_threads: Some(1),
            ..EngineConfig::default()
        };
        let terrain = Arc::new(FlatTerrain::new(4, "stone", "stone"));
        EngineState::new(config, BlockRegistry::with_default_blocks(), terrain).unwrap()
    }

    #[test]
    fn failures_of_superseded_builds_leave_the_chunk_alone() {
        let mut engine = engine();
        let position = Point3::new(0, 0, 0);
        engine.request_terrain(position).unwrap();
        engine.flush(&mut NullRenderer, Duration::from_secs(10)).unwrap();
        let before_edit = engine.world.chunk(position).unwrap().get().revision();

        engine.set_block_named(Point3::new(2, 6, 2), "wood").unwrap();
        assert_eq!(engine.chunk_state(position), Some(ChunkBuildState::MeshBuilding));

        let stale = TaskLabel::for_build(
            "build mesh",
            position,
            ChunkBuildState::MeshBuilding,
            before_edit,
        );
        engine.mark_failed(&stale);
        assert_eq!(engine.chunk_state(position), Some(ChunkBuildState::MeshBuilding));
        assert!(engine.failed_chunks().is_empty());

        // A collider failure from the finished build is just as stale.
        let finished = TaskLabel::for_build(
            "build collider",
            position,
            ChunkBuildState::ColliderBuilding,
            before_edit,
        );
        engine.mark_failed(&finished);
        assert_eq!(engine.chunk_state(position), Some(ChunkBuildState::MeshBuilding));

        engine.flush(&mut NullRenderer, Duration::from_secs(10)).unwrap();
        assert_eq!(engine.chunk_state(position), Some(ChunkBuildState::Ready));
    }

    #[test]
    fn failures_of_the_running_build_fail_the_chunk() {
        let mut engine = engine();
        let position = Point3::new(0, 0, 0);
        engine.request_terrain(position).unwrap();
        engine.flush(&mut NullRenderer, Duration::from_secs(10)).unwrap();

        engine.set_block_named(Point3::new(2, 6, 2), "wood").unwrap();
        let revision = engine.world.chunk(position).unwrap().get().revision();
        let current = TaskLabel::for_build(
            "build mesh",
            position,
            ChunkBuildState::MeshBuilding,
            revision,
        );
        engine.mark_failed(&current);
        assert_eq!(engine.chunk_state(position), Some(ChunkBuildState::Failed));
        assert_eq!(engine.failed_chunks(), vec![position]);

        // The discarded mesh of the failed build does not resurrect the chunk.
        engine.flush(&mut NullRenderer, Duration::from_secs(10)).unwrap();
        assert_eq!(engine.chunk_state(position), Some(ChunkBuildState::Failed));

        engine.retry(position).unwrap();
        engine.flush(&mut NullRenderer, Duration::from_secs(10)).unwrap();
        assert_eq!(engine.chunk_state(position), Some(ChunkBuildState::Ready));
        assert!(engine.failed_chunks().is_empty());
    }
}
