//! Pellet economy
//!
//! Pellets are spawned area-uniformly inside the arena, topped up toward a
//! target count, swallowed by snake heads and scattered in clusters when a
//! snake dies. Every pellet is mirrored in the spatial index.

use std::collections::BTreeMap;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::spatial::{OccupantId, OccupantKind, QueryFilter, SpatialHash, SpatialOccupant};
use crate::config::SlitherConfig;
use crate::random_in_disc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PelletKind {
    #[default]
    Normal,
    /// Worth `rare_value_multiplier` times a normal pellet
    Rare,
    /// Also refills boost charge
    Boost,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pellet {
    pub id: u32,
    pub kind: PelletKind,
    pub position: Vec2,
    /// Growth units granted when eaten
    pub value: f32,
    pub radius: f32,
    pub color: String,
}

impl Pellet {
    fn occupant(&self) -> SpatialOccupant {
        SpatialOccupant {
            id: OccupantId::Pellet(self.id),
            kind: OccupantKind::Pellet,
            position: self.position,
            radius: self.radius,
        }
    }
}

/// How a snake died, for scatter value scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScatterCause {
    /// Boundary or own body
    SelfInflicted,
    /// Ran into another snake
    Collision,
}

/// All live pellets, ordered by id
#[derive(Debug, Clone)]
pub struct PelletField {
    pellets: BTreeMap<u32, Pellet>,
    next_id: u32,
    respawn_timer: f32,
}

impl Default for PelletField {
    fn default() -> Self {
        Self::new()
    }
}

impl PelletField {
    pub fn new() -> Self {
        Self {
            pellets: BTreeMap::new(),
            next_id: 1,
            respawn_timer: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.pellets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pellets.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&Pellet> {
        self.pellets.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pellet> {
        self.pellets.values()
    }

    /// Population the field is maintained toward
    pub fn target_count(config: &SlitherConfig) -> usize {
        config.pellet.initial_count.min(config.pellet.max_count)
    }

    /// Roll a kind: boost first, then rare, otherwise normal
    pub fn roll_kind<R: Rng + ?Sized>(rng: &mut R, config: &SlitherConfig) -> PelletKind {
        if rng.random::<f32>() < config.pellet.boost_chance {
            PelletKind::Boost
        } else if rng.random::<f32>() < config.pellet.rare_chance {
            PelletKind::Rare
        } else {
            PelletKind::Normal
        }
    }

    pub fn value_for(kind: PelletKind, config: &SlitherConfig) -> f32 {
        match kind {
            PelletKind::Rare => config.snake.growth_per_pellet * config.pellet.rare_value_multiplier,
            PelletKind::Normal | PelletKind::Boost => config.snake.growth_per_pellet,
        }
    }

    /// Place a pellet unless the field is at its cap; returns the new id
    pub fn spawn(
        &mut self,
        index: &mut SpatialHash,
        config: &SlitherConfig,
        kind: PelletKind,
        position: Vec2,
        value: f32,
        color: String,
    ) -> Option<u32> {
        if self.pellets.len() >= config.pellet.max_count {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        let pellet = Pellet {
            id,
            kind,
            position,
            value,
            radius: config.pellet.radius,
            color,
        };
        index.insert(pellet.occupant());
        self.pellets.insert(id, pellet);
        Some(id)
    }

    /// Spawn one pellet of a random kind at a random spot in the arena
    pub fn spawn_random<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        index: &mut SpatialHash,
        config: &SlitherConfig,
    ) -> Option<u32> {
        let max_radius = (config.world.radius - config.pellet.radius * 2.0).max(0.0);
        let position = random_in_disc(rng, Vec2::ZERO, max_radius);
        let kind = Self::roll_kind(rng, config);
        let color = match kind {
            PelletKind::Rare => config.colors.rare_pellet.clone(),
            PelletKind::Boost => config.colors.boost_pellet.clone(),
            PelletKind::Normal => {
                let palette = &config.colors.palette;
                palette[rng.random_range(0..palette.len())].clone()
            }
        };
        self.spawn(index, config, kind, position, Self::value_for(kind, config), color)
    }

    /// Fill the field to its target count immediately
    pub fn seed<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        index: &mut SpatialHash,
        config: &SlitherConfig,
    ) {
        let target = Self::target_count(config);
        while self.pellets.len() < target {
            if self.spawn_random(rng, index, config).is_none() {
                break;
            }
        }
        self.respawn_timer = config.pellet.respawn_interval;
    }

    /// Top up toward the target count in paced batches; returns pellets added
    pub fn maintain<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        index: &mut SpatialHash,
        config: &SlitherConfig,
        dt: f32,
    ) -> usize {
        let target = Self::target_count(config);
        if self.pellets.len() >= target {
            self.respawn_timer = config.pellet.respawn_interval;
            return 0;
        }
        self.respawn_timer -= dt;
        if self.respawn_timer > 0.0 {
            return 0;
        }
        self.respawn_timer = config.pellet.respawn_interval;

        let deficit = target - self.pellets.len();
        let mut added = 0;
        for _ in 0..deficit.min(config.pellet.respawn_batch.max(1)) {
            if self.spawn_random(rng, index, config).is_none() {
                break;
            }
            added += 1;
        }
        added
    }

    /// Remove and return every pellet within `radius` of `position`
    pub fn consume_at(&mut self, index: &mut SpatialHash, position: Vec2, radius: f32) -> Vec<Pellet> {
        let kinds = [OccupantKind::Pellet];
        let hits = index.query(position, radius, &QueryFilter::kinds(&kinds));
        let mut eaten = Vec::with_capacity(hits.len());
        for hit in hits {
            let OccupantId::Pellet(id) = hit.id else {
                continue;
            };
            index.remove(hit.id);
            if let Some(pellet) = self.pellets.remove(&id) {
                eaten.push(pellet);
            }
        }
        eaten
    }

    /// Remove a single pellet; unknown ids are ignored
    pub fn remove(&mut self, index: &mut SpatialHash, id: u32) -> Option<Pellet> {
        index.remove(OccupantId::Pellet(id));
        self.pellets.remove(&id)
    }

    /// Drop a cluster of pellets around a death point; returns how many landed
    ///
    /// Cluster size follows the body length (one pellet per segment spacing),
    /// clamped to the configured range and the population cap.
    #[allow(clippy::too_many_arguments)]
    pub fn scatter<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        index: &mut SpatialHash,
        config: &SlitherConfig,
        center: Vec2,
        body_length: f32,
        cause: ScatterCause,
        color: &str,
    ) -> usize {
        let pellet = &config.pellet;
        let count = ((body_length / config.snake.segment_spacing).round() as usize)
            .clamp(pellet.scatter_min, pellet.scatter_max);
        let multiplier = match cause {
            ScatterCause::SelfInflicted => pellet.self_scatter_value_multiplier,
            ScatterCause::Collision => pellet.scatter_value_multiplier,
        };
        let value = config.snake.growth_per_pellet * multiplier;

        let mut spawned = 0;
        for _ in 0..count {
            let mut position = random_in_disc(rng, center, pellet.scatter_radius);
            // Keep the cluster inside the arena
            let limit = config.world.radius - pellet.radius;
            if position.length() > limit {
                position = position.normalize_or_zero() * limit;
            }
            if self
                .spawn(index, config, PelletKind::Normal, position, value, color.to_string())
                .is_none()
            {
                break;
            }
            spawned += 1;
        }
        spawned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use serde_json::json;

    fn setup(overrides: serde_json::Value) -> (SlitherConfig, SpatialHash, PelletField, Pcg32) {
        let config = SlitherConfig::default().with_overrides(&overrides).unwrap();
        let index = SpatialHash::new(config.spatial_cell_size());
        (config, index, PelletField::new(), Pcg32::seed_from_u64(3))
    }

    #[test]
    fn test_seed_fills_to_target_within_arena() {
        let (config, mut index, mut field, mut rng) =
            setup(json!({ "pellet": { "initial_count": 300, "max_count": 250 } }));
        field.seed(&mut rng, &mut index, &config);
        assert_eq!(field.len(), 250);
        assert_eq!(index.len(), 250);
        for p in field.iter() {
            assert!(p.position.length() <= config.world.radius);
        }
    }

    #[test]
    fn test_kind_values() {
        let config = SlitherConfig::default();
        assert_eq!(PelletField::value_for(PelletKind::Normal, &config), 4.0);
        assert_eq!(PelletField::value_for(PelletKind::Rare, &config), 8.0);
    }

    #[test]
    fn test_roll_kind_thresholds() {
        let (config, ..) = setup(json!({ "pellet": { "boost_chance": 1.0 } }));
        let mut rng = Pcg32::seed_from_u64(1);
        assert_eq!(PelletField::roll_kind(&mut rng, &config), PelletKind::Boost);

        let (config, ..) = setup(json!({ "pellet": { "boost_chance": 0.0, "rare_chance": 1.0 } }));
        assert_eq!(PelletField::roll_kind(&mut rng, &config), PelletKind::Rare);

        let (config, ..) = setup(json!({ "pellet": { "boost_chance": 0.0, "rare_chance": 0.0 } }));
        assert_eq!(PelletField::roll_kind(&mut rng, &config), PelletKind::Normal);
    }

    #[test]
    fn test_consume_removes_from_field_and_index() {
        let (config, mut index, mut field, _) = setup(json!({}));
        let near = field
            .spawn(&mut index, &config, PelletKind::Normal, Vec2::new(3.0, 0.0), 4.0, String::new())
            .unwrap();
        let far = field
            .spawn(&mut index, &config, PelletKind::Rare, Vec2::new(300.0, 0.0), 8.0, String::new())
            .unwrap();

        let eaten = field.consume_at(&mut index, Vec2::ZERO, config.capture_radius());
        assert_eq!(eaten.len(), 1);
        assert_eq!(eaten[0].id, near);
        assert!(field.get(near).is_none());
        assert!(!index.contains(OccupantId::Pellet(near)));
        assert!(field.get(far).is_some());
    }

    #[test]
    fn test_maintain_paces_refill() {
        let (config, mut index, mut field, mut rng) = setup(json!({
            "pellet": { "initial_count": 40, "respawn_interval": 0.5, "respawn_batch": 10 }
        }));
        field.seed(&mut rng, &mut index, &config);
        let ids: Vec<u32> = field.iter().take(25).map(|p| p.id).collect();
        for id in ids {
            field.remove(&mut index, id);
        }
        assert_eq!(field.len(), 15);

        // Timer has not elapsed yet
        assert_eq!(field.maintain(&mut rng, &mut index, &config, 0.25), 0);
        assert_eq!(field.maintain(&mut rng, &mut index, &config, 0.25), 10);
        assert_eq!(field.len(), 25);
        for _ in 0..10 {
            field.maintain(&mut rng, &mut index, &config, 0.5);
        }
        assert_eq!(field.len(), 40);
        assert_eq!(index.len(), 40);
    }

    #[test]
    fn test_scatter_respects_cap_and_cause() {
        let (config, mut index, mut field, mut rng) =
            setup(json!({ "pellet": { "initial_count": 0, "max_count": 20 } }));
        let center = Vec2::new(100.0, 50.0);
        let spawned = field.scatter(
            &mut rng,
            &mut index,
            &config,
            center,
            120.0,
            ScatterCause::SelfInflicted,
            "#abc",
        );
        assert_eq!(spawned, 10);
        for p in field.iter() {
            assert!(p.position.distance(center) <= config.pellet.scatter_radius + 1e-3);
            assert_eq!(p.value, 2.0);
        }

        let spawned =
            field.scatter(&mut rng, &mut index, &config, center, 2000.0, ScatterCause::Collision, "#abc");
        assert_eq!(spawned, 10);
        assert_eq!(field.len(), 20);
    }

    #[test]
    fn test_scatter_minimum_cluster() {
        let (config, mut index, mut field, mut rng) = setup(json!({ "pellet": { "initial_count": 0 } }));
        let spawned =
            field.scatter(&mut rng, &mut index, &config, Vec2::ZERO, 1.0, ScatterCause::Collision, "#fff");
        assert_eq!(spawned, config.pellet.scatter_min);
    }
}
