//! Follow camera with smoothed position and length-based zoom

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::config::SlitherConfig;
use crate::lerp;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub position: Vec2,
    pub zoom: f32,
    pub target_zoom: f32,
}

impl CameraState {
    pub fn new(position: Vec2, config: &SlitherConfig) -> Self {
        let zoom = config.camera.max_zoom;
        Self {
            position,
            zoom,
            target_zoom: zoom,
        }
    }

    /// Zoom the camera settles toward for a snake of `length`
    ///
    /// Longer snakes zoom out; boosting pulls out a little further.
    pub fn zoom_for(length: f32, boosting: bool, config: &SlitherConfig) -> f32 {
        let cam = &config.camera;
        let ratio = config.snake.initial_length / length.max(1.0);
        let mut zoom = (cam.max_zoom * ratio.powf(cam.zoom_exponent)).clamp(cam.min_zoom, cam.max_zoom);
        if boosting {
            zoom = (zoom * cam.boost_zoom).max(cam.min_zoom);
        }
        zoom
    }

    pub fn update(&mut self, focus: Vec2, length: f32, boosting: bool, dt: f32, config: &SlitherConfig) {
        let cam = &config.camera;
        self.target_zoom = Self::zoom_for(length, boosting, config);
        let follow = 1.0 - (-cam.position_smoothing * dt).exp();
        let settle = 1.0 - (-cam.zoom_smoothing * dt).exp();
        self.position = self.position.lerp(focus, follow);
        self.zoom = lerp(self.zoom, self.target_zoom, settle);
    }
}
