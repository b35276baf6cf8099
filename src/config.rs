//! Simulation tuning
//!
//! Every tunable lives in one immutable `SlitherConfig`. Sections are
//! `#[serde(default)]` so a host can override any subset: overrides are
//! deep-merged onto the defaults as JSON, then validated once.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while building a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config override: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config value `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Arena geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Arena radius in world units
    pub radius: f32,
    /// Slack subtracted from the radius before a boundary crash triggers
    pub boundary_forgiveness: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            radius: 2500.0,
            boundary_forgiveness: 4.0,
        }
    }
}

/// Snake body and movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnakeConfig {
    /// Units per second at boost multiplier 1
    pub base_speed: f32,
    pub initial_length: f32,
    /// Floor for boost shedding
    pub min_length: f32,
    /// Distance between resampled segments
    pub segment_spacing: f32,
    /// Turn rate is `speed / min_turn_radius` radians per second
    pub min_turn_radius: f32,
    /// Growth reserve applied to target length per second
    pub growth_rate: f32,
    /// Value of a normal pellet
    pub growth_per_pellet: f32,
}

impl Default for SnakeConfig {
    fn default() -> Self {
        Self {
            base_speed: 140.0,
            initial_length: 120.0,
            min_length: 48.0,
            segment_spacing: 12.0,
            min_turn_radius: 36.0,
            growth_rate: 30.0,
            growth_per_pellet: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostConfig {
    pub multiplier: f32,
    /// Length units shed per second; charge drains at `drain_rate / initial_length`
    pub drain_rate: f32,
    /// Charge regained per second when not boosting
    pub regen_rate: f32,
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            multiplier: 1.75,
            drain_rate: 18.0,
            regen_rate: 0.2,
        }
    }
}

/// Pellet economy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PelletConfig {
    pub initial_count: usize,
    pub max_count: usize,
    pub radius: f32,
    /// Rolled first
    pub boost_chance: f32,
    /// Rolled when the boost roll fails
    pub rare_chance: f32,
    pub rare_value_multiplier: f32,
    /// Boost charge restored by a boost pellet
    pub boost_charge_bonus: f32,
    /// Capture radius is the larger of `radius * capture_radius_factor`
    /// and `segment_spacing * capture_spacing_factor`
    pub capture_radius_factor: f32,
    pub capture_spacing_factor: f32,
    /// Seconds between top-up batches
    pub respawn_interval: f32,
    pub respawn_batch: usize,
    /// Death scatter cluster
    pub scatter_radius: f32,
    pub scatter_min: usize,
    pub scatter_max: usize,
    pub scatter_value_multiplier: f32,
    /// Multiplier for boundary and self crashes
    pub self_scatter_value_multiplier: f32,
}

impl Default for PelletConfig {
    fn default() -> Self {
        Self {
            initial_count: 900,
            max_count: 1200,
            radius: 6.0,
            boost_chance: 0.03,
            rare_chance: 0.06,
            rare_value_multiplier: 2.0,
            boost_charge_bonus: 0.25,
            capture_radius_factor: 1.75,
            capture_spacing_factor: 0.8,
            respawn_interval: 0.25,
            respawn_batch: 12,
            scatter_radius: 40.0,
            scatter_min: 8,
            scatter_max: 48,
            scatter_value_multiplier: 1.0,
            self_scatter_value_multiplier: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Collision radius as a fraction of segment spacing
    pub radius_factor: f32,
    /// Own segments nearest the head that never self-collide
    pub self_skip_segments: usize,
    /// Only every n-th own segment is tested
    pub self_stride: usize,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            radius_factor: 0.7,
            self_skip_segments: 6,
            self_stride: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Exponential follow rate for position (1/s)
    pub position_smoothing: f32,
    /// Exponential follow rate for zoom (1/s)
    pub zoom_smoothing: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub zoom_exponent: f32,
    /// Zoom factor applied while boosting
    pub boost_zoom: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position_smoothing: 6.0,
            zoom_smoothing: 2.5,
            min_zoom: 0.45,
            max_zoom: 1.0,
            zoom_exponent: 0.35,
            boost_zoom: 0.92,
        }
    }
}

/// Bot population and the adaptive governor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Initial and maximum population target
    pub count: usize,
    /// Governor never lowers the target below this
    pub min_count: usize,
    pub speed_factor: f32,
    pub degrade_frame_ms: f32,
    pub recover_frame_ms: f32,
    pub frame_ceiling_ms: f32,
    pub frame_ema_alpha: f32,
    pub adjust_cooldown: f32,
    pub adjust_step: usize,
    pub respawn_delay_min: f32,
    pub respawn_delay_max: f32,
    pub length_growth_per_generation: f32,
    pub max_length_scale: f32,
    pub speed_growth_per_generation: f32,
    pub max_speed_scale: f32,
    /// Minimum distance from the player head when spawning
    pub spawn_clearance: f32,
    /// Spawn inside this fraction of the arena radius
    pub spawn_radius_fraction: f32,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            count: 12,
            min_count: 4,
            speed_factor: 0.92,
            degrade_frame_ms: 22.0,
            recover_frame_ms: 17.5,
            frame_ceiling_ms: 100.0,
            frame_ema_alpha: 0.1,
            adjust_cooldown: 2.0,
            adjust_step: 1,
            respawn_delay_min: 2.5,
            respawn_delay_max: 6.0,
            length_growth_per_generation: 0.15,
            max_length_scale: 2.0,
            speed_growth_per_generation: 0.03,
            max_speed_scale: 1.2,
            spawn_clearance: 500.0,
            spawn_radius_fraction: 0.85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WanderConfig {
    pub min_interval: f32,
    pub max_interval: f32,
    /// Max heading drift per second
    pub jitter: f32,
    /// Fractions of the arena radius over which the inward bias ramps in
    pub boundary_start: f32,
    pub boundary_end: f32,
}

impl Default for WanderConfig {
    fn default() -> Self {
        Self {
            min_interval: 1.5,
            max_interval: 4.0,
            jitter: 0.6,
            boundary_start: 0.82,
            boundary_end: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaseConfig {
    pub pellet_radius: f32,
    /// Score penalty per unit of distance
    pub distance_weight: f32,
    pub reach_radius: f32,
    /// Seconds after evading or giving up before chase may resume
    pub cooldown: f32,
    /// Seconds a chase may run before the bot gives up on its target
    pub max_duration: f32,
}

impl Default for ChaseConfig {
    fn default() -> Self {
        Self {
            pellet_radius: 260.0,
            distance_weight: 0.02,
            reach_radius: 10.0,
            cooldown: 1.5,
            max_duration: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvadeConfig {
    pub player_radius: f32,
    pub min_duration: f32,
    pub inward_bias: f32,
    pub boost_min_charge: f32,
}

impl Default for EvadeConfig {
    fn default() -> Self {
        Self {
            player_radius: 220.0,
            min_duration: 1.2,
            inward_bias: 0.35,
            boost_min_charge: 0.5,
        }
    }
}

/// Bot steering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub avoidance_radius: f32,
    pub avoidance_strength: f32,
    pub lookahead: f32,
    /// Extra weight for the player's body
    pub player_bias: f32,
    pub self_skip_segments: usize,
    /// Probability per second of starting an avoidance lapse
    pub mistake_chance: f32,
    pub mistake_duration: f32,
    pub wander: WanderConfig,
    pub chase: ChaseConfig,
    pub evade: EvadeConfig,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            avoidance_radius: 90.0,
            avoidance_strength: 1.6,
            lookahead: 60.0,
            player_bias: 1.6,
            self_skip_segments: 8,
            mistake_chance: 0.08,
            mistake_duration: 0.6,
            wander: WanderConfig::default(),
            chase: ChaseConfig::default(),
            evade: EvadeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub player: String,
    pub rare_pellet: String,
    pub boost_pellet: String,
    /// Bot bodies and normal pellets draw from this
    pub palette: Vec<String>,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            player: "#4dabf7".to_string(),
            rare_pellet: "#ffd166".to_string(),
            boost_pellet: "#22d3ee".to_string(),
            palette: [
                "#ff6b6b", "#06d6a0", "#f06595", "#845ef7", "#20c997", "#fcc419", "#ff922b",
                "#94d82d",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        }
    }
}

/// Complete tuning bundle, immutable for a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlitherConfig {
    pub world: WorldConfig,
    pub snake: SnakeConfig,
    pub boost: BoostConfig,
    pub pellet: PelletConfig,
    pub collision: CollisionConfig,
    pub camera: CameraConfig,
    pub bots: BotConfig,
    pub ai: AiConfig,
    pub colors: ColorConfig,
}

impl SlitherConfig {
    /// Deep-merge `overrides` onto `self` and validate the result
    pub fn with_overrides(&self, overrides: &Value) -> Result<Self, ConfigError> {
        let mut merged = serde_json::to_value(self)?;
        merge_json(&mut merged, overrides);
        let config: Self = serde_json::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a (partial) JSON document on top of the defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let overrides: Value = serde_json::from_str(json)?;
        Self::default().with_overrides(&overrides)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        log::info!("Loaded config ({} bots, arena radius {})", config.bots.count, config.world.radius);
        Ok(config)
    }

    /// Effective cell size for the spatial index
    ///
    /// At least the segment spacing and a few pellet radii, so hot entities
    /// rarely span more than a handful of cells.
    pub fn spatial_cell_size(&self) -> f32 {
        (self.snake.segment_spacing * 4.0)
            .max(self.pellet.radius * 4.0)
            .max(1.0)
    }

    /// Radius within which a head swallows pellets
    pub fn capture_radius(&self) -> f32 {
        (self.pellet.radius * self.pellet.capture_radius_factor)
            .max(self.snake.segment_spacing * self.pellet.capture_spacing_factor)
    }

    pub fn collision_radius(&self) -> f32 {
        self.snake.segment_spacing * self.collision.radius_factor
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    field,
                    reason: "must be positive",
                })
            }
        }
        fn probability(field: &'static str, value: f32) -> Result<(), ConfigError> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    field,
                    reason: "must be within [0, 1]",
                })
            }
        }

        positive("world.radius", self.world.radius)?;
        positive("snake.base_speed", self.snake.base_speed)?;
        positive("snake.initial_length", self.snake.initial_length)?;
        positive("snake.segment_spacing", self.snake.segment_spacing)?;
        positive("snake.min_turn_radius", self.snake.min_turn_radius)?;
        positive("boost.multiplier", self.boost.multiplier)?;
        positive("ai.chase.max_duration", self.ai.chase.max_duration)?;
        positive("pellet.radius", self.pellet.radius)?;
        probability("pellet.boost_chance", self.pellet.boost_chance)?;
        probability("pellet.rare_chance", self.pellet.rare_chance)?;
        probability("ai.mistake_chance", self.ai.mistake_chance)?;
        probability("bots.frame_ema_alpha", self.bots.frame_ema_alpha)?;

        if self.snake.min_length > self.snake.initial_length {
            return Err(ConfigError::Invalid {
                field: "snake.min_length",
                reason: "must not exceed snake.initial_length",
            });
        }
        if self.camera.min_zoom > self.camera.max_zoom {
            return Err(ConfigError::Invalid {
                field: "camera.min_zoom",
                reason: "must not exceed camera.max_zoom",
            });
        }
        if self.bots.respawn_delay_min > self.bots.respawn_delay_max {
            return Err(ConfigError::Invalid {
                field: "bots.respawn_delay_min",
                reason: "must not exceed bots.respawn_delay_max",
            });
        }
        if self.ai.wander.min_interval > self.ai.wander.max_interval {
            return Err(ConfigError::Invalid {
                field: "ai.wander.min_interval",
                reason: "must not exceed ai.wander.max_interval",
            });
        }
        if self.pellet.scatter_min > self.pellet.scatter_max {
            return Err(ConfigError::Invalid {
                field: "pellet.scatter_min",
                reason: "must not exceed pellet.scatter_max",
            });
        }
        if self.colors.palette.is_empty() {
            return Err(ConfigError::Invalid {
                field: "colors.palette",
                reason: "must contain at least one color",
            });
        }
        Ok(())
    }
}

/// Recursively merge `overrides` into `base`
///
/// Objects merge key by key; any other value (arrays included) replaces.
pub fn merge_json(base: &mut Value, overrides: &Value) {
    match (base, overrides) {
        (Value::Object(base_map), Value::Object(over_map)) => {
            for (key, value) in over_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overrides) => *base = overrides.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SlitherConfig::default().validate().is_ok());
    }

    #[test]
    fn test_deep_merge_keeps_siblings() {
        let config = SlitherConfig::default()
            .with_overrides(&json!({ "ai": { "chase": { "pellet_radius": 10.0 } } }))
            .unwrap();
        assert_eq!(config.ai.chase.pellet_radius, 10.0);
        // Untouched siblings fall back to defaults
        assert_eq!(config.ai.chase.cooldown, ChaseConfig::default().cooldown);
        assert_eq!(config.ai.evade, EvadeConfig::default());
        assert_eq!(config.world, WorldConfig::default());
    }

    #[test]
    fn test_arrays_replace_instead_of_merging() {
        let config = SlitherConfig::default()
            .with_overrides(&json!({ "colors": { "palette": ["#000000"] } }))
            .unwrap();
        assert_eq!(config.colors.palette, vec!["#000000".to_string()]);
    }

    #[test]
    fn test_invalid_spacing_rejected() {
        let err = SlitherConfig::default()
            .with_overrides(&json!({ "snake": { "segment_spacing": 0.0 } }))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "snake.segment_spacing",
                ..
            }
        ));
    }

    #[test]
    fn test_type_mismatch_is_json_error() {
        let err = SlitherConfig::from_json_str(r#"{ "bots": { "count": "many" } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_capture_radius_uses_larger_term() {
        let config = SlitherConfig::default();
        // 6 * 1.75 = 10.5 vs 12 * 0.8 = 9.6
        assert!((config.capture_radius() - 10.5).abs() < 1e-5);
        assert!(config.spatial_cell_size() >= config.snake.segment_spacing);
    }
}
