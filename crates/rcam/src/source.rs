use crate::geometry::{Curve, Mesh, SourceId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Chord tolerance used when curves are handed to the strategies.
pub const FLATTEN_TOLERANCE: f64 = 0.25;

/// Supplies evaluated, world-space geometry for an operation's sources.
///
/// Unknown or empty references are skipped; an empty result is a valid
/// answer, not an error.
pub trait SourceProvider {
    fn evaluate(&self, ids: &[SourceId]) -> Vec<Mesh>;
}

/// Geometry a source id can refer to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SourceGeometry {
    Mesh(Mesh),
    Curve(Curve),
}

impl SourceGeometry {
    fn to_mesh(&self) -> Mesh {
        match self {
            SourceGeometry::Mesh(mesh) => mesh.clone(),
            SourceGeometry::Curve(curve) => curve.to_mesh(FLATTEN_TOLERANCE, 0.0),
        }
    }
}

/// In-memory store of source geometry keyed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceRegistry {
    pub sources: HashMap<SourceId, SourceGeometry>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> SourceId {
        self.insert(SourceGeometry::Mesh(mesh))
    }

    pub fn add_curve(&mut self, curve: Curve) -> SourceId {
        self.insert(SourceGeometry::Curve(curve))
    }

    pub fn insert(&mut self, geometry: SourceGeometry) -> SourceId {
        let id = SourceId::new();
        self.sources.insert(id, geometry);
        id
    }

    pub fn get(&self, id: &SourceId) -> Option<&SourceGeometry> {
        self.sources.get(id)
    }

    pub fn remove(&mut self, id: &SourceId) -> Option<SourceGeometry> {
        self.sources.remove(id)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl SourceProvider for SourceRegistry {
    fn evaluate(&self, ids: &[SourceId]) -> Vec<Mesh> {
        ids.iter()
            .filter_map(|id| {
                let geometry = self.sources.get(id);
                if geometry.is_none() {
                    debug!("Skipping unknown source {}", id);
                }
                geometry
            })
            .map(SourceGeometry::to_mesh)
            .filter(|mesh| !mesh.is_empty())
            .collect()
    }
}
