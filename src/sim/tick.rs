//! Fixed timestep simulation tick
//!
//! One call advances the whole session by `dt`:
//! player movement, player feeding, pellet upkeep, bot budget and respawns,
//! bot decisions, bot movement and feeding, index sync, collisions, camera.

use std::sync::Arc;

use glam::Vec2;

use super::bot::{AiContext, BotCommand, think};
use super::collision::{CrashReason, check_snake};
use super::pellet::{PelletField, PelletKind};
use super::snake::SnakeState;
use super::spatial::SpatialHash;
use super::state::{GamePhase, GameState, SnakeRef};
use crate::config::SlitherConfig;

/// Longest step a single tick will simulate
pub const MAX_DT: f32 = 0.1;

/// Input sample for a single tick
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput {
    /// Desired direction, unit length or zero for "keep heading"
    pub steering: Vec2,
    pub boost: bool,
}

/// Advance the game state by `dt` seconds
///
/// The governor is fed `dt` as the frame cost.
pub fn tick(state: &mut GameState, input: &TickInput, dt: f32) {
    tick_with_frame_time(state, input, dt, dt * 1000.0);
}

/// Advance the game state, feeding a host-measured frame cost to the governor
pub fn tick_with_frame_time(state: &mut GameState, input: &TickInput, dt: f32, frame_ms: f32) {
    if state.phase == GamePhase::Crashed {
        return;
    }
    if dt.is_nan() || dt <= 0.0 {
        return;
    }
    let dt = dt.min(MAX_DT);
    let config = Arc::clone(&state.config);

    state.time_ticks += 1;
    state.elapsed += dt;

    // Player
    state
        .player
        .advance(input.steering.normalize_or_zero(), input.boost, dt, &config);
    feed(&mut state.player, &mut state.pellets, &mut state.spatial, &config);
    state.sync_snake_index(SnakeRef::Player);

    state.pellets.maintain(&mut state.rng, &mut state.spatial, &config, dt);

    // Bot population
    state.budget.observe(frame_ms, dt, &config);
    state.respawns.advance(dt);
    state.replenish_bots();

    // Bot decisions all read the same world
    let commands: Vec<BotCommand> = {
        let ctx = AiContext {
            config: &config,
            index: &state.spatial,
            pellets: &state.pellets,
            player: Some(&state.player),
        };
        state
            .bots
            .iter_mut()
            .map(|bot| think(bot, &ctx, &mut state.rng, &mut state.ai_rng, dt))
            .collect()
    };

    for (bot, command) in state.bots.iter_mut().zip(commands) {
        bot.snake.advance(command.steering, command.boost, dt, &config);
        feed(&mut bot.snake, &mut state.pellets, &mut state.spatial, &config);
    }
    state.sync_all_snakes();

    // Collisions are judged before anyone is removed
    let player_crash = check_snake(&state.player, &state.spatial, &config);
    let bot_deaths: Vec<(u32, CrashReason)> = state
        .bots
        .iter()
        .filter_map(|bot| check_snake(&bot.snake, &state.spatial, &config).map(|reason| (bot.id(), reason)))
        .collect();
    for (id, reason) in bot_deaths {
        state.kill_bot(id, reason);
    }
    if let Some(reason) = player_crash {
        state.crash_player(reason);
    }

    state.camera.update(
        state.player.head(),
        state.player.length,
        state.player.is_boosting,
        dt,
        &config,
    );
}

/// Swallow every pellet within capture range of the head
fn feed(snake: &mut SnakeState, pellets: &mut PelletField, spatial: &mut SpatialHash, config: &SlitherConfig) -> usize {
    let eaten = pellets.consume_at(spatial, snake.head(), config.capture_radius());
    for pellet in &eaten {
        snake.feed(pellet.value);
        if pellet.kind == PelletKind::Boost {
            snake.boost_charge = (snake.boost_charge + config.pellet.boost_charge_bonus).min(1.0);
        }
    }
    eaten.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::bot::BotMode;
    use crate::sim::snake::SnakeKind;
    use crate::sim::spatial::{OccupantKind, QueryFilter};
    use crate::sim::state::{SIM_DT, create_game_state};
    use serde_json::json;
    use std::f32::consts::PI;

    /// Empty arena: no pellets, no bots
    fn empty_arena() -> GameState {
        let overrides = json!({ "pellet": { "initial_count": 0 }, "bots": { "count": 0 } });
        create_game_state(None, Some(&overrides), Some(42)).unwrap()
    }

    fn place_player(state: &mut GameState, head: Vec2, angle: f32) {
        let config = Arc::clone(&state.config);
        state.player = SnakeState::new(
            1,
            SnakeKind::Player,
            head,
            angle,
            config.snake.initial_length,
            config.snake.base_speed,
            config.colors.player.clone(),
            &config,
        );
        state.sync_snake_index(SnakeRef::Player);
    }

    fn circling(state: &GameState) -> TickInput {
        TickInput {
            steering: crate::heading(state.player.heading + PI / 2.0),
            boost: false,
        }
    }

    #[test]
    fn test_straight_run() {
        let mut state = empty_arena();
        place_player(&mut state, Vec2::ZERO, 0.0);
        let input = TickInput {
            steering: Vec2::X,
            boost: false,
        };
        for _ in 0..60 {
            tick(&mut state, &input, SIM_DT);
        }
        let head = state.player.head();
        assert!((head.x - state.config.snake.base_speed).abs() < 1.0, "head at {head}");
        assert!(head.y.abs() < 1e-3);
        assert_eq!(state.phase, GamePhase::Playing);
        assert_eq!(state.time_ticks, 60);
    }

    #[test]
    fn test_pellet_at_head_is_eaten() {
        let mut state = empty_arena();
        place_player(&mut state, Vec2::ZERO, 0.0);
        let id = state.spawn_pellet_at(PelletKind::Normal, Vec2::ZERO).unwrap();

        tick(&mut state, &TickInput::default(), SIM_DT);

        assert!(state.pellets.get(id).is_none());
        assert!((state.player.growth_reserve - state.config.snake.growth_per_pellet).abs() < 1e-5);
        let kinds = [OccupantKind::Pellet];
        assert!(state.spatial.query(Vec2::ZERO, 1.0, &QueryFilter::kinds(&kinds)).is_empty());
    }

    #[test]
    fn test_growth_is_conserved() {
        let mut state = empty_arena();
        place_player(&mut state, Vec2::ZERO, 0.0);
        let start = state.player.target_length;
        state.spawn_pellet_at(PelletKind::Rare, Vec2::new(1.0, 0.0)).unwrap();
        let value = PelletField::value_for(PelletKind::Rare, &state.config);

        let input = TickInput {
            steering: Vec2::X,
            boost: false,
        };
        for _ in 0..120 {
            tick(&mut state, &input, SIM_DT);
        }
        assert_eq!(state.player.growth_reserve, 0.0);
        assert!((state.player.target_length - (start + value)).abs() < 1e-3);
        assert!((state.player.score - value).abs() < 1e-5);
    }

    #[test]
    fn test_boost_pellet_restores_charge() {
        let mut state = empty_arena();
        place_player(&mut state, Vec2::ZERO, 0.0);
        state.player.boost_charge = 0.5;
        state.spawn_pellet_at(PelletKind::Boost, Vec2::ZERO).unwrap();
        tick(&mut state, &TickInput::default(), SIM_DT);
        assert!(state.player.boost_charge > 0.5 + state.config.pellet.boost_charge_bonus - 1e-3);
        assert!(state.player.boost_charge <= 1.0);
    }

    #[test]
    fn test_lonely_bot_keeps_wandering() {
        let overrides = json!({ "pellet": { "initial_count": 0 }, "bots": { "count": 1, "min_count": 1 } });
        let mut state = create_game_state(None, Some(&overrides), Some(8)).unwrap();
        assert_eq!(state.bots.len(), 1);

        // Park the bot well outside evade range of the circling player
        let config = Arc::clone(&state.config);
        let id = state.bots[0].id();
        state.bots[0].snake = SnakeState::new(
            id,
            SnakeKind::Bot,
            Vec2::new(1500.0, 0.0),
            PI / 2.0,
            config.snake.initial_length,
            config.snake.base_speed * config.bots.speed_factor,
            String::new(),
            &config,
        );
        state.sync_snake_index(SnakeRef::Bot(id));
        for _ in 0..300 {
            let input = circling(&state);
            tick(&mut state, &input, SIM_DT);
            for bot in &state.bots {
                assert_eq!(bot.ai.mode, BotMode::Wander);
                assert_eq!(bot.ai.target_pellet_id, None);
            }
        }
        assert!(state.pellets.is_empty());
    }

    #[test]
    fn test_bot_eats_pellets() {
        let overrides = json!({ "pellet": { "initial_count": 0 }, "bots": { "count": 1, "min_count": 1 } });
        let mut state = create_game_state(None, Some(&overrides), Some(12)).unwrap();
        let bot = &state.bots[0];
        let bot_id = bot.id();
        let ahead = bot.snake.head() + crate::heading(bot.snake.heading) * 2.0;
        let pellet = state.spawn_pellet_at(PelletKind::Normal, ahead).unwrap();

        tick(&mut state, &TickInput::default(), SIM_DT);

        assert!(state.pellets.get(pellet).is_none());
        let bot = state.bot(bot_id).unwrap();
        assert!((bot.snake.score - state.config.snake.growth_per_pellet).abs() < 1e-5);
    }

    #[test]
    fn test_boundary_crash_scatters_pellets() {
        let mut state = empty_arena();
        let edge = state.config.world.radius - state.config.world.boundary_forgiveness;
        place_player(&mut state, Vec2::new(edge + 1.0, 0.0), 0.0);

        tick(&mut state, &TickInput::default(), SIM_DT);

        assert_eq!(state.phase, GamePhase::Crashed);
        let crash = state.crash.unwrap();
        assert_eq!(crash.reason, CrashReason::Boundary);
        assert!(state.pellets.len() >= 8);
        let spread = state.config.pellet.scatter_radius * 2.0;
        for pellet in state.pellets.iter() {
            assert!(pellet.position.distance(crash.position) <= spread);
            assert!(pellet.position.length() <= state.config.world.radius);
        }

        // Nothing moves after the crash
        let ticks = state.time_ticks;
        let pellets = state.pellets.len();
        tick(&mut state, &TickInput::default(), SIM_DT);
        assert_eq!(state.time_ticks, ticks);
        assert_eq!(state.pellets.len(), pellets);
    }

    #[test]
    fn test_non_positive_dt_is_ignored() {
        let mut state = empty_arena();
        let head = state.player.head();
        tick(&mut state, &TickInput::default(), 0.0);
        tick(&mut state, &TickInput::default(), -1.0);
        tick(&mut state, &TickInput::default(), f32::NAN);
        assert_eq!(state.time_ticks, 0);
        assert_eq!(state.player.head(), head);
    }

    #[test]
    fn test_population_bounds() {
        let overrides = json!({
            "pellet": { "initial_count": 150, "max_count": 160 },
            "bots": { "count": 6, "min_count": 2 }
        });
        let mut state = create_game_state(None, Some(&overrides), Some(77)).unwrap();
        for _ in 0..900 {
            let input = circling(&state);
            tick(&mut state, &input, SIM_DT);
            assert!(state.pellets.len() <= state.config.pellet.max_count);
            assert!(state.bots.len() <= state.budget.target_count);
            assert!(state.bots.len() + state.respawns.len() <= state.config.bots.count);
            assert!(state.spatial.is_consistent());
        }
    }

    #[test]
    fn test_slow_frames_throttle_spawns() {
        let overrides = json!({ "bots": { "count": 8, "min_count": 2, "adjust_cooldown": 0.1 } });
        let mut state = create_game_state(None, Some(&overrides), Some(31)).unwrap();
        let mut previous = state.bots.len();
        for _ in 0..600 {
            let input = circling(&state);
            tick_with_frame_time(&mut state, &input, SIM_DT, 60.0);
            let live = state.bots.len();
            if live > previous {
                assert!(live <= state.budget.target_count);
            }
            previous = live;
        }
        assert_eq!(state.budget.target_count, 2);
    }

    #[test]
    fn test_determinism() {
        let overrides = json!({ "pellet": { "initial_count": 300 }, "bots": { "count": 6 } });
        let mut state1 = create_game_state(None, Some(&overrides), Some(99999)).unwrap();
        let mut state2 = create_game_state(None, Some(&overrides), Some(99999)).unwrap();

        for i in 0..240 {
            let input = TickInput {
                steering: crate::heading(i as f32 * 0.05),
                boost: i % 50 < 10,
            };
            tick(&mut state1, &input, SIM_DT);
            tick(&mut state2, &input, SIM_DT);
        }

        let a = serde_json::to_string(&state1.snapshot()).unwrap();
        let b = serde_json::to_string(&state2.snapshot()).unwrap();
        assert_eq!(a, b);
    }
}
