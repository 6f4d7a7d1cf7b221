//! Uniform-cell bucket index over dynamic entities.
//!
//! Trees and units are bucketed by the cell containing their position;
//! radius queries only visit buckets overlapping the query box, then
//! filter by exact distance.

use std::collections::HashMap;

use crate::components::EntityId;
use crate::math::{Fixed, Vec2Fixed};

/// Bucket coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    /// Column.
    pub x: i64,
    /// Row.
    pub y: i64,
}

impl CellCoord {
    /// Bucket containing a world position.
    #[must_use]
    pub fn from_world(pos: Vec2Fixed, cell_size: Fixed) -> Self {
        Self {
            x: (pos.x / cell_size).floor().to_num::<i64>(),
            y: (pos.y / cell_size).floor().to_num::<i64>(),
        }
    }
}

/// Spatial hash of entity positions.
#[derive(Debug, Clone)]
pub struct SpatialHash {
    cell_size: Fixed,
    buckets: HashMap<CellCoord, Vec<EntityId>>,
    positions: HashMap<EntityId, Vec2Fixed>,
}

impl SpatialHash {
    /// Create an empty hash. Non-positive sizes fall back to one unit.
    #[must_use]
    pub fn new(cell_size: Fixed) -> Self {
        Self {
            cell_size: if cell_size > Fixed::ZERO { cell_size } else { Fixed::ONE },
            buckets: HashMap::new(),
            positions: HashMap::new(),
        }
    }

    /// Bucket edge length.
    #[must_use]
    pub const fn cell_size(&self) -> Fixed {
        self.cell_size
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.positions.clear();
    }

    /// Number of indexed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Whether an entity is indexed.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Insert or move an entity.
    pub fn insert(&mut self, id: EntityId, pos: Vec2Fixed) {
        self.remove(id);
        let coord = CellCoord::from_world(pos, self.cell_size);
        self.buckets.entry(coord).or_default().push(id);
        self.positions.insert(id, pos);
    }

    /// Drop an entity. Returns `false` if it was not indexed.
    pub fn remove(&mut self, id: EntityId) -> bool {
        let Some(pos) = self.positions.remove(&id) else {
            return false;
        };
        let coord = CellCoord::from_world(pos, self.cell_size);
        if let Some(bucket) = self.buckets.get_mut(&coord) {
            bucket.retain(|&other| other != id);
            if bucket.is_empty() {
                self.buckets.remove(&coord);
            }
        }
        true
    }

    /// Entities within `radius` of `center` (inclusive), in ascending id order.
    #[must_use]
    pub fn query_radius(&self, center: Vec2Fixed, radius: Fixed) -> Vec<EntityId> {
        let radius = radius.max(Fixed::ZERO);
        let min = CellCoord::from_world(center - Vec2Fixed::new(radius, radius), self.cell_size);
        let max = CellCoord::from_world(center + Vec2Fixed::new(radius, radius), self.cell_size);
        let radius_sq = radius.saturating_mul(radius);

        let mut found = Vec::new();
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                let Some(bucket) = self.buckets.get(&CellCoord { x, y }) else {
                    continue;
                };
                for &id in bucket {
                    let within = self
                        .positions
                        .get(&id)
                        .is_some_and(|pos| pos.distance_squared(center) <= radius_sq);
                    if within {
                        found.push(id);
                    }
                }
            }
        }
        found.sort_unstable();
        found
    }

    /// Nearest entity within `radius`, ties broken by lowest id.
    #[must_use]
    pub fn nearest(&self, center: Vec2Fixed, radius: Fixed) -> Option<EntityId> {
        self.query_radius(center, radius)
            .into_iter()
            .filter_map(|id| self.positions.get(&id).map(|pos| (pos.distance_squared(center), id)))
            .min()
            .map(|(_, id)| id)
    }
}

impl Default for SpatialHash {
    fn default() -> Self {
        Self::new(Fixed::from_num(64))
    }
}
