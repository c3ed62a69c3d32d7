use std::path::PathBuf;

use crate::{
    curve::Curve,
    error::{CinescrollError, CinescrollResult},
};

/// Naming convention for the on-disk frame sequence.
///
/// Frame `i` (1-based) resolves to `<root>/<prefix>-<i zero-padded>.<ext>`.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SequenceSpec {
    /// Directory holding the frame files.
    pub root: String,
    pub prefix: String,
    /// Zero-pad width of the index, e.g. 3 -> `007`.
    #[serde(default = "default_padding")]
    pub padding: u8,
    pub ext: String,
    /// Total frame count N; indices run 1..=N with no gaps.
    pub count: u32,
}

fn default_padding() -> u8 {
    3
}

impl SequenceSpec {
    pub fn validate(&self) -> CinescrollResult<()> {
        if self.count == 0 {
            return Err(CinescrollError::validation("sequence count must be > 0"));
        }
        if self.prefix.trim().is_empty() {
            return Err(CinescrollError::validation(
                "sequence prefix must be non-empty",
            ));
        }
        if self.ext.trim().is_empty() {
            return Err(CinescrollError::validation(
                "sequence ext must be non-empty",
            ));
        }
        if self.padding == 0 {
            return Err(CinescrollError::validation("sequence padding must be > 0"));
        }
        let max_named = 10u64.saturating_pow(u32::from(self.padding)) - 1;
        if u64::from(self.count) > max_named {
            return Err(CinescrollError::validation(format!(
                "sequence count {} does not fit in {} padded digits",
                self.count, self.padding
            )));
        }
        Ok(())
    }

    /// Resolve the path of 1-based frame `index`.
    pub fn frame_path(&self, index: u32) -> PathBuf {
        let name = format!(
            "{}-{:0width$}.{}",
            self.prefix,
            index,
            self.ext,
            width = usize::from(self.padding)
        );
        PathBuf::from(&self.root).join(name)
    }
}

/// Display copy a scene hands to the overlay layer. Never rendered here.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct SceneCopy {
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub body: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta_label: Option<String>,
}

/// A named overlay with independent fade/motion curves over the scroll
/// timeline.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Scene {
    pub name: String,
    pub opacity: Curve,
    #[serde(default = "Curve::zero")]
    pub translate_x: Curve,
    #[serde(default = "Curve::zero")]
    pub translate_y: Curve,
    #[serde(default = "Curve::one")]
    pub scale: Curve,
    #[serde(default)]
    pub copy: SceneCopy,
}

impl Scene {
    pub fn validate(&self) -> CinescrollResult<()> {
        if self.name.trim().is_empty() {
            return Err(CinescrollError::validation("scene name must be non-empty"));
        }
        self.opacity.validate()?;
        self.translate_x.validate()?;
        self.translate_y.validate()?;
        self.scale.validate()?;
        Ok(())
    }
}

/// Top-level configuration document for one showcase.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Storyboard {
    pub sequence: SequenceSpec,
    /// Canvas fill behind the letterboxed frame, straight RGBA.
    #[serde(default = "default_background")]
    pub background: [u8; 4],
    pub scenes: Vec<Scene>,
}

fn default_background() -> [u8; 4] {
    [5, 5, 5, 255]
}

impl Storyboard {
    pub fn validate(&self) -> CinescrollResult<()> {
        self.sequence.validate()?;
        let mut seen = std::collections::BTreeSet::new();
        for scene in &self.scenes {
            scene.validate()?;
            if !seen.insert(scene.name.as_str()) {
                return Err(CinescrollError::validation(format!(
                    "duplicate scene name '{}'",
                    scene.name
                )));
            }
        }
        Ok(())
    }

    /// The five-scene product showcase the engine ships with: a hero title,
    /// three feature reveals and a sticky closing call to action, cross-fading
    /// over one full scroll of the timeline.
    pub fn showcase_default(sequence: SequenceSpec) -> Self {
        let scenes = vec![
            Scene {
                name: "hero".to_string(),
                opacity: Curve::linear(&[(0.0, 1.0), (0.10, 1.0), (0.15, 0.0)]),
                translate_x: Curve::zero(),
                translate_y: Curve::linear(&[(0.0, 0.0), (0.15, -50.0)]),
                scale: Curve::one(),
                copy: SceneCopy {
                    headline: "Silence, perfected.".to_string(),
                    body: vec![
                        "Flagship noise cancelling, re-engineered for a world that never stops."
                            .to_string(),
                    ],
                    cta_label: None,
                },
            },
            Scene {
                name: "engineering".to_string(),
                opacity: Curve::linear(&[(0.15, 0.0), (0.25, 1.0), (0.35, 1.0), (0.40, 0.0)]),
                translate_x: Curve::linear(&[(0.15, -50.0), (0.25, 0.0), (0.35, 0.0), (0.40, -50.0)]),
                translate_y: Curve::zero(),
                scale: Curve::one(),
                copy: SceneCopy {
                    headline: "Precision-engineered for silence.".to_string(),
                    body: vec![
                        "Custom drivers, sealed acoustic chambers and optimized airflow."
                            .to_string(),
                    ],
                    cta_label: None,
                },
            },
            Scene {
                name: "noise-cancelling".to_string(),
                opacity: Curve::linear(&[(0.40, 0.0), (0.50, 1.0), (0.60, 1.0), (0.65, 0.0)]),
                translate_x: Curve::linear(&[(0.40, 50.0), (0.50, 0.0), (0.60, 0.0), (0.65, 50.0)]),
                translate_y: Curve::zero(),
                scale: Curve::one(),
                copy: SceneCopy {
                    headline: "Adaptive noise cancelling, redefined.".to_string(),
                    body: vec![
                        "A multi-microphone array adapts to your environment in real time."
                            .to_string(),
                    ],
                    cta_label: None,
                },
            },
            Scene {
                name: "sound".to_string(),
                opacity: Curve::linear(&[(0.65, 0.0), (0.75, 1.0), (0.80, 1.0), (0.85, 0.0)]),
                translate_x: Curve::zero(),
                translate_y: Curve::zero(),
                scale: Curve::linear(&[(0.65, 0.9), (0.75, 1.0), (0.80, 1.0), (0.85, 0.9)]),
                copy: SceneCopy {
                    headline: "Immersive, lifelike sound.".to_string(),
                    body: vec![
                        "High-performance drivers unlock detail, depth and texture.".to_string(),
                    ],
                    cta_label: None,
                },
            },
            Scene {
                name: "reassembly-cta".to_string(),
                opacity: Curve::linear(&[(0.85, 0.0), (0.95, 1.0), (1.0, 1.0)]),
                translate_x: Curve::zero(),
                translate_y: Curve::linear(&[(0.85, 50.0), (0.95, 0.0)]),
                scale: Curve::one(),
                copy: SceneCopy {
                    headline: "Hear everything. Feel nothing else.".to_string(),
                    body: vec!["Designed for focus, crafted for comfort.".to_string()],
                    cta_label: Some("Experience the flagship".to_string()),
                },
            },
        ];

        Self {
            sequence,
            background: default_background(),
            scenes,
        }
    }
}
