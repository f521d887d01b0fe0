use crate::geometry::mesh::meshes_bounds;
use crate::geometry::{bounding_box, Point3, SourceId};
use crate::operation::Operation;
use crate::source::SourceProvider;
use crate::types::{ComputeStatus, ComputedPoint, Machine};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Material block the job is cut from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Stock {
    /// Bounding box of every source of the job, grown by `offset`.
    Estimate { offset: [f64; 3] },
    /// Explicit block whose top face lies at Z=0.
    Custom { position: [f64; 2], size: [f64; 3] },
}

impl Default for Stock {
    fn default() -> Self {
        Stock::Estimate {
            offset: [1.0, 1.0, 0.0],
        }
    }
}

impl Stock {
    /// Stock box for sources spanning `source_bounds`. An estimated stock
    /// needs source bounds.
    pub fn bounds(&self, source_bounds: Option<(Point3, Point3)>) -> Option<(Point3, Point3)> {
        match self {
            Stock::Estimate { offset } => source_bounds.map(|(min, max)| {
                (
                    min.translated(-offset[0], -offset[1], -offset[2]),
                    max.translated(offset[0], offset[1], offset[2]),
                )
            }),
            Stock::Custom { position, size } => Some((
                Point3::new(position[0], position[1], -size[2]),
                Point3::new(position[0] + size[0], position[1] + size[1], 0.0),
            )),
        }
    }
}

/// Merged output of a computed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Toolpath {
    pub status: ComputeStatus,
    pub points: Vec<ComputedPoint>,
}

/// An ordered list of operations cut from one stock, optionally repeated on
/// a grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub operations: Vec<Operation>,
    /// Copies along X and Y.
    pub count: (u32, u32),
    /// Spacing between copies along X and Y.
    pub gap: (f64, f64),
    #[serde(default)]
    pub stock: Stock,
    #[serde(default)]
    pub machine: Machine,
    /// Result of the last computation, owned by the job and never persisted.
    #[serde(skip)]
    pub computed: Option<Toolpath>,
}

impl Default for Job {
    fn default() -> Self {
        Self::new("Job")
    }
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operations: Vec::new(),
            count: (1, 1),
            gap: (0.0, 0.0),
            stock: Stock::default(),
            machine: Machine::default(),
            computed: None,
        }
    }

    /// Persist the job description to disk as prettified JSON.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let data = serde_json::to_vec_pretty(self).context("serialize job")?;
        fs::write(&path, data)
            .with_context(|| format!("write job file {}", path.as_ref().to_string_lossy()))
    }

    /// Load a job description from disk.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(&path)
            .with_context(|| format!("read job file from {}", path.as_ref().to_string_lossy()))?;
        let job: Job = serde_json::from_slice(&bytes).context("deserialize job file")?;
        Ok(job)
    }

    /// Append a new operation to the job, returning its index.
    pub fn add_operation(&mut self, operation: Operation) -> usize {
        self.operations.push(operation);
        self.computed = None;
        self.operations.len() - 1
    }

    /// Replace the operation at `index`.
    pub fn update_operation(&mut self, index: usize, operation: Operation) -> Result<()> {
        let slot = self
            .operations
            .get_mut(index)
            .ok_or_else(|| anyhow!("invalid operation index {index}"))?;
        *slot = operation;
        self.computed = None;
        Ok(())
    }

    /// Remove the operation at `index`, returning it.
    pub fn remove_operation(&mut self, index: usize) -> Result<Operation> {
        if index >= self.operations.len() {
            return Err(anyhow!("invalid operation index {index}"));
        }
        self.computed = None;
        Ok(self.operations.remove(index))
    }

    /// Every source referenced by the job's operations, in first-use order.
    pub fn source_ids(&self) -> Vec<SourceId> {
        let mut ids: Vec<SourceId> = Vec::new();
        for operation in &self.operations {
            for id in operation
                .source
                .iter()
                .chain(operation.strategy.curve_sources())
            {
                if !ids.contains(id) {
                    ids.push(*id);
                }
            }
        }
        ids
    }

    /// Stock box of the job.
    pub fn stock_bounds(&self, sources: &dyn SourceProvider) -> Option<(Point3, Point3)> {
        let meshes = sources.evaluate(&self.source_ids());
        let source_bounds = (!meshes.is_empty()).then(|| meshes_bounds(&meshes));
        self.stock.bounds(source_bounds)
    }

    /// Repeat `points` over the `count` grid, each copy shifted by the XY
    /// extent of the points plus `gap`.
    pub fn replicate(&self, points: &[ComputedPoint]) -> Vec<ComputedPoint> {
        let (nx, ny) = self.count;
        if points.is_empty() || nx as u64 * ny as u64 <= 1 {
            return points.to_vec();
        }

        let positions: Vec<Point3> = points.iter().map(|p| p.position).collect();
        let (min, max) = bounding_box(&positions);
        let step_x = max.x - min.x + self.gap.0;
        let step_y = max.y - min.y + self.gap.1;

        let mut result = Vec::with_capacity(points.len() * nx as usize * ny as usize);
        for j in 0..ny {
            for i in 0..nx {
                let (dx, dy) = (i as f64 * step_x, j as f64 * step_y);
                result.extend(points.iter().map(|p| ComputedPoint {
                    position: p.position.translated(dx, dy, 0.0),
                    ..*p
                }));
            }
        }
        result
    }
}
