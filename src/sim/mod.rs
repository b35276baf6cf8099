//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Caller-supplied timestep only
//! - Seeded RNG only (gameplay and cosmetic AI streams)
//! - Stable iteration order (by entity ID)
//! - No rendering or platform dependencies

pub mod bot;
pub mod camera;
pub mod collision;
pub mod governor;
pub mod pellet;
pub mod snake;
pub mod spatial;
pub mod state;
pub mod tick;

pub use bot::{BotAiState, BotMode, BotRespawnEntry, BotSnakeState};
pub use camera::CameraState;
pub use collision::CrashReason;
pub use governor::BotPerformanceBudget;
pub use pellet::{Pellet, PelletField, PelletKind};
pub use snake::{SnakeKind, SnakeSegment, SnakeState};
pub use spatial::{IndexError, OccupantId, OccupantKind, QueryFilter, SpatialHash, SpatialOccupant};
pub use state::{CrashEvent, GamePhase, GameState, SIM_DT, Snapshot, SnakeView, create_game_state};
pub use tick::{TickInput, tick, tick_with_frame_time};
