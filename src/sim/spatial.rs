//! Uniform-grid spatial hash for proximity queries
//!
//! The index stores a lightweight projection of each entity (id, kind,
//! position, radius), never the entity itself. An occupant is registered in
//! every cell its bounding square overlaps, so large radii may span several
//! cells. Removal always uses the stored projection so no cell keeps an
//! orphaned reference.

use std::collections::{HashMap, HashSet};

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    #[error("cell size must be positive and finite, got {0}")]
    InvalidCellSize(f32),
}

/// Identity of an indexed entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OccupantId {
    Pellet(u32),
    /// Segment `index` (0 = head) of snake `snake`
    Segment { snake: u32, index: u32 },
}

impl OccupantId {
    /// Snake that owns this occupant, if any
    pub fn owner(&self) -> Option<u32> {
        match *self {
            OccupantId::Pellet(_) => None,
            OccupantId::Segment { snake, .. } => Some(snake),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OccupantKind {
    Pellet,
    SnakeHead,
    SnakeSegment,
    SnakeTail,
}

impl OccupantKind {
    pub const SNAKE_PARTS: [OccupantKind; 3] = [
        OccupantKind::SnakeHead,
        OccupantKind::SnakeSegment,
        OccupantKind::SnakeTail,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialOccupant {
    pub id: OccupantId,
    pub kind: OccupantKind,
    pub position: Vec2,
    pub radius: f32,
}

/// Filters applied before the distance test
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryFilter<'a> {
    pub kinds: Option<&'a [OccupantKind]>,
    pub exclude_ids: &'a [OccupantId],
    /// Skip every occupant owned by this snake
    pub exclude_owner: Option<u32>,
}

impl<'a> QueryFilter<'a> {
    pub fn kinds(kinds: &'a [OccupantKind]) -> Self {
        Self {
            kinds: Some(kinds),
            ..Default::default()
        }
    }

    pub fn excluding_owner(mut self, owner: u32) -> Self {
        self.exclude_owner = Some(owner);
        self
    }

    fn accepts(&self, occupant: &SpatialOccupant) -> bool {
        if self.kinds.is_some_and(|kinds| !kinds.contains(&occupant.kind)) {
            return false;
        }
        if self.exclude_ids.contains(&occupant.id) {
            return false;
        }
        match (self.exclude_owner, occupant.id.owner()) {
            (Some(excluded), Some(owner)) => excluded != owner,
            _ => true,
        }
    }
}

type CellKey = (i32, i32);

#[derive(Debug, Clone)]
pub struct SpatialHash {
    cell_size: f32,
    lookup: HashMap<CellKey, HashSet<OccupantId>>,
    occupants: HashMap<OccupantId, SpatialOccupant>,
}

impl SpatialHash {
    /// Create an empty index
    ///
    /// Panics if `cell_size` is not positive; that is a caller error.
    pub fn new(cell_size: f32) -> Self {
        match Self::try_new(cell_size) {
            Ok(index) => index,
            Err(err) => panic!("{err}"),
        }
    }

    pub fn try_new(cell_size: f32) -> Result<Self, IndexError> {
        if !(cell_size > 0.0 && cell_size.is_finite()) {
            return Err(IndexError::InvalidCellSize(cell_size));
        }
        Ok(Self {
            cell_size,
            lookup: HashMap::new(),
            occupants: HashMap::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.occupants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    pub fn contains(&self, id: OccupantId) -> bool {
        self.occupants.contains_key(&id)
    }

    /// Insert an occupant, replacing any previous projection with the same id
    pub fn insert(&mut self, occupant: SpatialOccupant) {
        self.remove(occupant.id);
        for key in self.cell_range(occupant.position, occupant.radius) {
            self.lookup.entry(key).or_default().insert(occupant.id);
        }
        self.occupants.insert(occupant.id, occupant);
    }

    /// Move or resize a known occupant; unknown ids are ignored
    pub fn update(&mut self, occupant: SpatialOccupant) {
        let Some(previous) = self.occupants.get(&occupant.id) else {
            return;
        };
        // Same cell footprint: only the stored projection changes
        if self.cell_bounds(previous.position, previous.radius)
            == self.cell_bounds(occupant.position, occupant.radius)
        {
            self.occupants.insert(occupant.id, occupant);
            return;
        }
        self.insert(occupant);
    }

    /// Remove an occupant using its last stored projection
    pub fn remove(&mut self, id: OccupantId) -> Option<SpatialOccupant> {
        let previous = self.occupants.remove(&id)?;
        for key in self.cell_range(previous.position, previous.radius) {
            if let Some(cell) = self.lookup.get_mut(&key) {
                cell.remove(&id);
                if cell.is_empty() {
                    self.lookup.remove(&key);
                }
            }
        }
        Some(previous)
    }

    /// Occupants whose circles intersect the query circle, sorted by id
    pub fn query(&self, position: Vec2, radius: f32, filter: &QueryFilter) -> Vec<SpatialOccupant> {
        let mut seen: HashSet<OccupantId> = HashSet::new();
        let mut hits = Vec::new();
        for key in self.cell_range(position, radius) {
            let Some(cell) = self.lookup.get(&key) else {
                continue;
            };
            for id in cell {
                if !seen.insert(*id) {
                    continue;
                }
                let Some(occupant) = self.occupants.get(id) else {
                    continue;
                };
                if !filter.accepts(occupant) {
                    continue;
                }
                let reach = radius + occupant.radius;
                if occupant.position.distance_squared(position) <= reach * reach {
                    hits.push(*occupant);
                }
            }
        }
        hits.sort_by_key(|o| o.id);
        hits
    }

    /// Every occupant id maps to exactly the cells its projection covers
    pub fn is_consistent(&self) -> bool {
        for (id, occupant) in &self.occupants {
            for key in self.cell_range(occupant.position, occupant.radius) {
                if !self.lookup.get(&key).is_some_and(|cell| cell.contains(id)) {
                    return false;
                }
            }
        }
        self.lookup.iter().all(|(key, cell)| {
            !cell.is_empty()
                && cell.iter().all(|id| {
                    self.occupants.get(id).is_some_and(|o| {
                        let (min, max) = self.cell_bounds(o.position, o.radius);
                        key.0 >= min.0 && key.0 <= max.0 && key.1 >= min.1 && key.1 <= max.1
                    })
                })
        })
    }

    fn cell_coord(&self, v: f32) -> i32 {
        (v / self.cell_size).floor() as i32
    }

    fn cell_bounds(&self, position: Vec2, radius: f32) -> (CellKey, CellKey) {
        let r = radius.max(0.0);
        (
            (self.cell_coord(position.x - r), self.cell_coord(position.y - r)),
            (self.cell_coord(position.x + r), self.cell_coord(position.y + r)),
        )
    }

    fn cell_range(&self, position: Vec2, radius: f32) -> impl Iterator<Item = CellKey> + use<> {
        let ((min_x, min_y), (max_x, max_y)) = self.cell_bounds(position, radius);
        (min_x..=max_x).flat_map(move |x| (min_y..=max_y).map(move |y| (x, y)))
    }
}
