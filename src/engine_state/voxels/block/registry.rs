//! # Block Registry
//!
//! Maps block type ids to their behaviour. Behaviour is a small tagged variant
//! ([`BlockKind`]) dispatched by match, so the per-voxel meshing loop never pays
//! for dynamic dispatch.
//!
//! Block sets are data driven: a JSON list of [`BlockConfigEntry`] names a
//! `class` for each block, and the [`BlockFactoryRegistry`] turns that class
//! name into a [`BlockKind`]. Broken entries are logged and skipped; the engine
//! keeps running with whatever loaded, and unknown names resolve to air.

use std::collections::HashMap;

use log::warn;
use serde::Deserialize;

use super::{block_side::BlockSide, Block, BlockTypeSize, AIR};
use crate::{
    engine_state::meshing::{mesh::face::MergedFace, vertex::Vertex},
    error::EngineResult,
};

/// The behaviour shared by every block of a type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    /// Empty space: not solid, never drawn.
    Air,
    /// A full opaque cube.
    Cube,
    /// Solid for occlusion but never drawn.
    Barrier,
}

impl BlockKind {
    /// Whether this block hides the face of its neighbour on `side`.
    pub fn is_solid(&self, _side: BlockSide) -> bool {
        matches!(self, BlockKind::Cube | BlockKind::Barrier)
    }

    /// Whether the mesher emits faces for this block.
    pub fn builds_faces(&self) -> bool {
        matches!(self, BlockKind::Cube)
    }
}

/// Everything the engine knows about one block type.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockDefinition {
    pub id: BlockTypeSize,
    pub name: String,
    pub kind: BlockKind,
    /// Texture layer per side, indexed by [`BlockSide`].
    pub textures: [u32; 6],
    pub color: [f32; 4],
    /// Type this block turns into when a random tick selects it.
    pub decays_to: Option<BlockTypeSize>,
}

impl BlockDefinition {
    /// The type a random tick turns this block into, if any.
    pub fn random_update(&self) -> Option<BlockTypeSize> {
        self.decays_to
    }

    /// Emits the vertices of a merged face of this block type.
    ///
    /// # Arguments
    /// * `face` - The merged rectangle to draw
    /// * `position_offset` - Added to every corner
    ///
    /// # Returns
    /// The quad's four vertices, or `None` for kinds that are never drawn
    pub fn build_face(&self, face: &MergedFace, position_offset: [f32; 3]) -> Option<[Vertex; 4]> {
        match self.kind {
            BlockKind::Cube => Some(Vertex::quad(face, self, position_offset)),
            BlockKind::Air | BlockKind::Barrier => None,
        }
    }
}

/// One block as written in a block set file.
#[derive(Clone, Debug, Deserialize)]
pub struct BlockConfigEntry {
    pub name: Option<String>,
    pub class: String,
    /// A single texture for all sides.
    #[serde(default)]
    pub texture: Option<u32>,
    /// Per-side textures; wins over `texture`.
    #[serde(default)]
    pub textures: Option<[u32; 6]>,
    #[serde(default)]
    pub color: Option<[f32; 4]>,
    #[serde(default)]
    pub decays_to: Option<String>,
}

/// Builds a [`BlockKind`] from a config entry.
pub type BlockFactory = fn(&BlockConfigEntry) -> BlockKind;

/// String class names to block factories, populated at startup.
pub struct BlockFactoryRegistry {
    factories: HashMap<String, BlockFactory>,
}

impl BlockFactoryRegistry {
    /// An empty factory table.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// The built-in block classes.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("AirBlock", |_| BlockKind::Air);
        registry.register("CubeBlock", |_| BlockKind::Cube);
        registry.register("BarrierBlock", |_| BlockKind::Barrier);
        registry
    }

    pub fn register(&mut self, class: &str, factory: BlockFactory) {
        self.factories.insert(class.to_string(), factory);
    }

    pub fn create(&self, entry: &BlockConfigEntry) -> Option<BlockKind> {
        self.factories.get(&entry.class).map(|factory| factory(entry))
    }
}

impl Default for BlockFactoryRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

const DEFAULT_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// The set of block types known to the engine. Id 0 is always air.
#[derive(Clone, Debug)]
pub struct BlockRegistry {
    definitions: Vec<BlockDefinition>,
    ids: HashMap<String, BlockTypeSize>,
}

impl BlockRegistry {
    /// A registry containing only air.
    pub fn new() -> Self {
        let air = BlockDefinition {
            id: AIR,
            name: "air".to_string(),
            kind: BlockKind::Air,
            textures: [0; 6],
            color: [0.0; 4],
            decays_to: None,
        };
        let mut ids = HashMap::new();
        ids.insert(air.name.clone(), AIR);
        Self {
            definitions: vec![air],
            ids,
        }
    }

    /// Adds a block type, returning its id, or `None` if the name is taken.
    pub fn register(
        &mut self,
        name: &str,
        kind: BlockKind,
        textures: [u32; 6],
        color: [f32; 4],
    ) -> Option<BlockTypeSize> {
        if self.ids.contains_key(name) {
            return None;
        }
        let id = self.definitions.len() as BlockTypeSize;
        self.definitions.push(BlockDefinition {
            id,
            name: name.to_string(),
            kind,
            textures,
            color,
            decays_to: None,
        });
        self.ids.insert(name.to_string(), id);
        Some(id)
    }

    /// Sets the type `name` decays into on a random tick.
    pub fn set_decay(&mut self, name: &str, into: &str) -> bool {
        match (self.lookup(name), self.lookup(into)) {
            (Some(from), Some(to)) => {
                self.definitions[from as usize].decays_to = Some(to);
                true
            }
            _ => false,
        }
    }

    /// Builds a registry from config entries, skipping the broken ones.
    pub fn from_config_entries(
        entries: &[BlockConfigEntry],
        factories: &BlockFactoryRegistry,
    ) -> Self {
        let mut registry = Self::new();

        for entry in entries {
            let Some(name) = entry.name.as_deref().filter(|name| !name.is_empty()) else {
                warn!("skipping block definition of class `{}` without a name", entry.class);
                continue;
            };
            let Some(kind) = factories.create(entry) else {
                warn!("skipping block `{}`: unknown class `{}`", name, entry.class);
                continue;
            };
            let textures = entry
                .textures
                .unwrap_or([entry.texture.unwrap_or(0); 6]);
            let color = entry.color.unwrap_or(DEFAULT_COLOR);
            if registry.register(name, kind, textures, color).is_none() {
                warn!("skipping duplicate block definition `{}`", name);
            }
        }

        for entry in entries {
            if let (Some(name), Some(into)) = (&entry.name, &entry.decays_to) {
                if !registry.set_decay(name, into) {
                    warn!("block `{}` decays into unknown block `{}`", name, into);
                }
            }
        }

        registry
    }

    /// Parses a JSON block set. Only malformed JSON is an error.
    pub fn from_json_str(json: &str, factories: &BlockFactoryRegistry) -> EngineResult<Self> {
        let entries: Vec<BlockConfigEntry> = serde_json::from_str(json)?;
        Ok(Self::from_config_entries(&entries, factories))
    }

    /// The id registered under `name`.
    pub fn lookup(&self, name: &str) -> Option<BlockTypeSize> {
        self.ids.get(name).copied()
    }

    /// The id registered under `name`, or air when there is none.
    pub fn id_of(&self, name: &str) -> BlockTypeSize {
        self.lookup(name).unwrap_or_else(|| {
            warn!("unknown block `{}`, using air", name);
            AIR
        })
    }

    /// The definition of `id`; unknown ids resolve to air.
    pub fn definition(&self, id: BlockTypeSize) -> &BlockDefinition {
        self.definitions
            .get(id as usize)
            .unwrap_or(&self.definitions[AIR as usize])
    }

    pub fn kind(&self, id: BlockTypeSize) -> BlockKind {
        self.definition(id).kind
    }

    /// A block record of type `id` with its cached solid flag.
    pub fn block(&self, id: BlockTypeSize) -> Block {
        let kind = self.kind(id);
        Block::new(id, kind.is_solid(BlockSide::TOP))
    }

    /// A block record by name, air if the name is unknown.
    pub fn block_named(&self, name: &str) -> Block {
        self.block(self.id_of(name))
    }

    /// Whether `block` occludes its neighbour across `side`.
    #[inline]
    pub fn is_solid(&self, block: Block, side: BlockSide) -> bool {
        block.solid && self.kind(block.block_type).is_solid(side)
    }

    #[inline]
    pub fn builds_faces(&self, block_type: BlockTypeSize) -> bool {
        self.kind(block_type).builds_faces()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// A small block set used by the demo and the tests.
    pub fn with_default_blocks() -> Self {
        let mut registry = Self::new();
        registry.register("stone", BlockKind::Cube, [1; 6], [0.5, 0.5, 0.5, 1.0]);
        registry.register("dirt", BlockKind::Cube, [2; 6], [0.45, 0.3, 0.2, 1.0]);
        registry.register("grass", BlockKind::Cube, [3, 3, 2, 4, 3, 3], [0.3, 0.7, 0.2, 1.0]);
        registry.register("wood", BlockKind::Cube, [5; 6], [0.6, 0.4, 0.2, 1.0]);
        registry.register("barrier", BlockKind::Barrier, [0; 6], [0.0; 4]);
        registry.set_decay("grass", "dirt");
        registry
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn air_is_reserved() {
        let registry = BlockRegistry::new();
        assert_eq!(registry.lookup("air"), Some(AIR));
        assert_eq!(registry.kind(AIR), BlockKind::Air);
        assert!(!registry.block(AIR).solid);
    }

    #[test]
    fn broken_entries_are_skipped() {
        let json = r#"[
            { "name": "stone", "class": "CubeBlock", "texture": 3 },
            { "class": "CubeBlock" },
            { "name": "stone", "class": "BarrierBlock" },
            { "name": "mystery", "class": "NoSuchBlock" },
            { "name": "glass_wall", "class": "BarrierBlock", "decays_to": "stone" }
        ]"#;
        let registry =
            BlockRegistry::from_json_str(json, &BlockFactoryRegistry::default()).unwrap();

        assert_eq!(registry.len(), 3);
        let stone = registry.lookup("stone").unwrap();
        assert_eq!(registry.kind(stone), BlockKind::Cube);
        assert_eq!(registry.definition(stone).textures, [3; 6]);
        assert_eq!(registry.id_of("mystery"), AIR);

        let wall = registry.definition(registry.id_of("glass_wall"));
        assert_eq!(wall.random_update(), Some(stone));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let result = BlockRegistry::from_json_str("{ not json", &BlockFactoryRegistry::default());
        assert!(result.is_err());
    }

    #[test]
    fn custom_factories_can_be_registered() {
        let mut factories = BlockFactoryRegistry::empty();
        factories.register("Rock", |_| BlockKind::Cube);
        let entries = vec![BlockConfigEntry {
            name: Some("rock".into()),
            class: "Rock".into(),
            texture: None,
            textures: None,
            color: None,
            decays_to: None,
        }];
        let registry = BlockRegistry::from_config_entries(&entries, &factories);
        assert!(registry.builds_faces(registry.id_of("rock")));
    }

    #[test]
    fn barrier_occludes_without_faces() {
        let registry = BlockRegistry::with_default_blocks();
        let barrier = registry.block_named("barrier");
        assert!(registry.is_solid(barrier, BlockSide::TOP));
        assert!(!registry.builds_faces(barrier.block_type));
    }
}
