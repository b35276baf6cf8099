//! Game state and session construction
//!
//! `GameState` is the single aggregate for a session: entities, the spatial
//! index, RNG streams and the bot budget all live here and are only mutated
//! from `tick`.

use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::bot::{BotMode, BotSnakeState, RespawnQueue, pick_spawn_point};
use super::camera::CameraState;
use super::collision::{CrashReason, body_radius};
use super::governor::BotPerformanceBudget;
use super::pellet::{Pellet, PelletField, PelletKind};
use super::snake::{SnakeKind, SnakeSegment, SnakeState};
use super::spatial::{OccupantId, SpatialHash};
use crate::config::{ConfigError, SlitherConfig};
use crate::random_in_disc;

/// Default fixed timestep (60 Hz)
pub const SIM_DT: f32 = 1.0 / 60.0;

/// PCG stream for cosmetic AI rolls (jitter, avoidance lapses)
const AI_STREAM: u64 = 0xb07;

/// Player spawns within this fraction of the arena radius
const PLAYER_SPAWN_FRACTION: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    Playing,
    /// Player died; ticking is a no-op from here on
    Crashed,
}

/// Player death, as reported to the host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrashEvent {
    pub reason: CrashReason,
    pub position: Vec2,
    /// Session time in seconds
    pub time: f32,
}

#[derive(Debug, Clone)]
pub struct GameState {
    pub config: Arc<SlitherConfig>,
    pub seed: u64,
    /// Gameplay stream
    pub(crate) rng: Pcg32,
    pub(crate) ai_rng: Pcg32,
    pub time_ticks: u64,
    /// Seconds simulated
    pub elapsed: f32,
    pub phase: GamePhase,
    pub player: SnakeState,
    /// Live bots (sorted by id for determinism)
    pub bots: Vec<BotSnakeState>,
    pub respawns: RespawnQueue,
    pub pellets: PelletField,
    pub spatial: SpatialHash,
    pub budget: BotPerformanceBudget,
    pub camera: CameraState,
    pub crash: Option<CrashEvent>,
    /// Segment count currently indexed per snake
    indexed_segments: HashMap<u32, usize>,
    next_id: u32,
}

impl GameState {
    /// Start a session from an already validated config
    pub fn new(config: SlitherConfig, seed: u64) -> Self {
        let config = Arc::new(config);
        let mut rng = Pcg32::seed_from_u64(seed);
        let ai_rng = Pcg32::new(seed, AI_STREAM);

        let spawn = random_in_disc(&mut rng, Vec2::ZERO, config.world.radius * PLAYER_SPAWN_FRACTION);
        let angle = rng.random::<f32>() * std::f32::consts::TAU;
        let player = SnakeState::new(
            1,
            SnakeKind::Player,
            spawn,
            angle,
            config.snake.initial_length,
            config.snake.base_speed,
            config.colors.player.clone(),
            &config,
        );

        let mut state = Self {
            spatial: SpatialHash::new(config.spatial_cell_size()),
            budget: BotPerformanceBudget::new(&config),
            camera: CameraState::new(spawn, &config),
            config,
            seed,
            rng,
            ai_rng,
            time_ticks: 0,
            elapsed: 0.0,
            phase: GamePhase::Playing,
            player,
            bots: Vec::new(),
            respawns: RespawnQueue::default(),
            pellets: PelletField::new(),
            crash: None,
            indexed_segments: HashMap::new(),
            next_id: 2,
        };

        let config = Arc::clone(&state.config);
        state.pellets.seed(&mut state.rng, &mut state.spatial, &config);
        state.sync_snake_index(SnakeRef::Player);
        state.replenish_bots();

        log::info!(
            "New session: seed {}, {} pellets, {} bots",
            seed,
            state.pellets.len(),
            state.bots.len()
        );
        state
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn is_crashed(&self) -> bool {
        self.phase == GamePhase::Crashed
    }

    pub fn bot(&self, id: u32) -> Option<&BotSnakeState> {
        self.bots.iter().find(|b| b.id() == id)
    }

    /// Place a pellet of `kind` with its standard value; returns `None` at the cap
    pub fn spawn_pellet_at(&mut self, kind: PelletKind, position: Vec2) -> Option<u32> {
        let config = Arc::clone(&self.config);
        let color = match kind {
            PelletKind::Normal => config.colors.palette.first().cloned().unwrap_or_default(),
            PelletKind::Rare => config.colors.rare_pellet.clone(),
            PelletKind::Boost => config.colors.boost_pellet.clone(),
        };
        let value = PelletField::value_for(kind, &config);
        self.pellets
            .spawn(&mut self.spatial, &config, kind, position, value, color)
    }

    /// Add a bot; `id` reuses a dead bot's id, `None` allocates a fresh one
    pub fn spawn_bot(&mut self, id: Option<u32>, generation: u32) -> u32 {
        let config = Arc::clone(&self.config);
        let id = id.unwrap_or_else(|| self.next_entity_id());
        let avoid = (!self.is_crashed()).then(|| self.player.head());
        let position = pick_spawn_point(&mut self.rng, &config, &self.spatial, avoid);
        let bot = BotSnakeState::spawn(&mut self.rng, id, generation, position, &config);
        self.bots.push(bot);
        self.normalize_order();
        self.sync_snake_index(SnakeRef::Bot(id));
        id
    }

    /// Promote due respawns, then spawn fresh bots, up to the budget target
    ///
    /// Queued respawns count against the target so fresh spawns never crowd
    /// them out. Live bots above the target are left alone.
    pub(crate) fn replenish_bots(&mut self) {
        let target = self.budget.target_count;
        while self.bots.len() < target {
            let Some(entry) = self.respawns.pop_due() else {
                break;
            };
            log::debug!("Respawning bot {} (generation {})", entry.id, entry.generation);
            self.spawn_bot(Some(entry.id), entry.generation);
        }
        while self.bots.len() + self.respawns.len() < target {
            self.spawn_bot(None, 0);
        }
    }

    /// Remove a dead bot, scatter its body and queue its replacement
    pub(crate) fn kill_bot(&mut self, id: u32, reason: CrashReason) {
        let Some(pos) = self.bots.iter().position(|b| b.id() == id) else {
            return;
        };
        let config = Arc::clone(&self.config);
        let bot = self.bots.remove(pos);
        unindex_snake(&mut self.spatial, &mut self.indexed_segments, id);

        let dropped = self.pellets.scatter(
            &mut self.rng,
            &mut self.spatial,
            &config,
            bot.snake.head(),
            bot.snake.length,
            reason.scatter_cause(),
            &bot.snake.color,
        );
        self.respawns.schedule(&mut self.rng, id, bot.generation + 1, &config);
        log::debug!(
            "Bot {} died ({:?}), dropped {} pellets, queued generation {}",
            id,
            reason,
            dropped,
            bot.generation + 1
        );
    }

    /// End the session: scatter the player's body and record the crash
    pub(crate) fn crash_player(&mut self, reason: CrashReason) {
        let config = Arc::clone(&self.config);
        let position = self.player.head();
        self.pellets.scatter(
            &mut self.rng,
            &mut self.spatial,
            &config,
            position,
            self.player.length,
            reason.scatter_cause(),
            &self.player.color,
        );
        self.player.is_boosting = false;
        self.crash = Some(CrashEvent {
            reason,
            position,
            time: self.elapsed,
        });
        self.phase = GamePhase::Crashed;
        log::info!(
            "Player crashed ({:?}) at ({:.0}, {:.0}) after {:.1}s, score {:.0}",
            reason,
            position.x,
            position.y,
            self.elapsed,
            self.player.score
        );
    }

    /// Mirror one snake's current segments into the spatial index
    pub(crate) fn sync_snake_index(&mut self, which: SnakeRef) {
        let radius = body_radius(&self.config);
        let snake = match which {
            SnakeRef::Player => &self.player,
            SnakeRef::Bot(id) => match self.bots.iter().find(|b| b.id() == id) {
                Some(bot) => &bot.snake,
                None => return,
            },
        };
        sync_snake(&mut self.spatial, &mut self.indexed_segments, snake, radius);
    }

    /// Mirror every live snake into the spatial index
    pub(crate) fn sync_all_snakes(&mut self) {
        let radius = body_radius(&self.config);
        sync_snake(&mut self.spatial, &mut self.indexed_segments, &self.player, radius);
        for bot in &self.bots {
            sync_snake(&mut self.spatial, &mut self.indexed_segments, &bot.snake, radius);
        }
    }

    /// Ensure bots are sorted by ID for deterministic iteration
    pub fn normalize_order(&mut self) {
        self.bots.sort_by_key(|b| b.id());
    }

    /// Renderer-facing view of the current state
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.time_ticks,
            elapsed: self.elapsed,
            phase: self.phase,
            score: self.player.score,
            player: SnakeView::of(&self.player, None, &self.config),
            bots: self
                .bots
                .iter()
                .map(|b| SnakeView::of(&b.snake, Some(b), &self.config))
                .collect(),
            pellets: self.pellets.iter().cloned().collect(),
            camera: self.camera,
            crash: self.crash,
            bot_target: self.budget.target_count,
        }
    }
}

/// Which snake to re-index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SnakeRef {
    Player,
    Bot(u32),
}

fn sync_snake(
    spatial: &mut SpatialHash,
    indexed: &mut HashMap<u32, usize>,
    snake: &SnakeState,
    radius: f32,
) {
    let mut count = 0;
    for occupant in snake.occupants(radius) {
        if spatial.contains(occupant.id) {
            spatial.update(occupant);
        } else {
            spatial.insert(occupant);
        }
        count += 1;
    }
    let previous = indexed.insert(snake.id, count).unwrap_or(0);
    for index in count..previous {
        spatial.remove(OccupantId::Segment {
            snake: snake.id,
            index: index as u32,
        });
    }
}

fn unindex_snake(spatial: &mut SpatialHash, indexed: &mut HashMap<u32, usize>, id: u32) {
    let count = indexed.remove(&id).unwrap_or(0);
    for index in 0..count {
        spatial.remove(OccupantId::Segment {
            snake: id,
            index: index as u32,
        });
    }
}

/// Build a session from optional config, JSON overrides and seed
///
/// A missing seed is drawn from the thread RNG.
pub fn create_game_state(
    config: Option<SlitherConfig>,
    overrides: Option<&Value>,
    seed: Option<u64>,
) -> Result<GameState, ConfigError> {
    let base = config.unwrap_or_default();
    let config = match overrides {
        Some(overrides) => base.with_overrides(overrides)?,
        None => {
            base.validate()?;
            base
        }
    };
    let seed = seed.unwrap_or_else(rand::random);
    Ok(GameState::new(config, seed))
}

/// One snake as the renderer sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnakeView {
    pub id: u32,
    pub kind: SnakeKind,
    pub color: String,
    pub length: f32,
    /// Current speed including boost
    pub speed: f32,
    pub boosting: bool,
    pub segments: Vec<SnakeSegment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<BotMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<u32>,
}

impl SnakeView {
    fn of(snake: &SnakeState, bot: Option<&BotSnakeState>, config: &SlitherConfig) -> Self {
        Self {
            id: snake.id,
            kind: snake.kind,
            color: snake.color.clone(),
            length: snake.length,
            speed: snake.effective_speed(config),
            boosting: snake.is_boosting,
            segments: snake.segments.clone(),
            mode: bot.map(|b| b.ai.mode),
            generation: bot.map(|b| b.generation),
        }
    }
}

/// Read-only frame for hosts and renderers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub elapsed: f32,
    pub phase: GamePhase,
    pub score: f32,
    pub player: SnakeView,
    pub bots: Vec<SnakeView>,
    pub pellets: Vec<Pellet>,
    pub camera: CameraState,
    pub crash: Option<CrashEvent>,
    pub bot_target: usize,
}
