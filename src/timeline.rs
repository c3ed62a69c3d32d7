use kurbo::Vec2;

use crate::{
    core::Progress,
    model::{Scene, Storyboard},
};

/// Live style values for one scene at a given scroll progress.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct SceneStyle {
    pub name: String,
    /// Opacity in `[0, 1]`.
    pub opacity: f64,
    /// Translation offset in logical pixels.
    pub translate: Vec2,
    pub scale: f64,
}

/// Styles for every scene of a storyboard, in storyboard order.
#[derive(Clone, Debug, serde::Serialize)]
pub struct TimelineSnapshot {
    pub progress: f64,
    pub styles: Vec<SceneStyle>,
}

/// Recompute every scene's style values for `progress`.
///
/// Stateless: each call evaluates the breakpoint tables from scratch. Curves
/// are tiny, so there is nothing worth caching between scroll notifications.
#[tracing::instrument(skip(storyboard))]
pub fn evaluate_timeline(storyboard: &Storyboard, progress: Progress) -> TimelineSnapshot {
    TimelineSnapshot {
        progress: progress.as_f64(),
        styles: storyboard
            .scenes
            .iter()
            .map(|scene| evaluate_scene(scene, progress))
            .collect(),
    }
}

pub fn evaluate_scene(scene: &Scene, progress: Progress) -> SceneStyle {
    SceneStyle {
        name: scene.name.clone(),
        opacity: scene.opacity.sample(progress).clamp(0.0, 1.0),
        translate: Vec2::new(
            scene.translate_x.sample(progress),
            scene.translate_y.sample(progress),
        ),
        scale: scene.scale.sample(progress),
    }
}
