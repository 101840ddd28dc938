use serde::{Deserialize, Serialize};

use super::scene::Context;

/// One scene emitted by the generator. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedScene {
    pub timestamp: String,
    /// Element identifier, repeat-marked for validated repeats.
    pub element: String,
    pub element_type: String,
    pub context: Context,
    /// Seconds, rounded to two decimals.
    pub duration: f64,
    pub is_repeat: bool,
    /// The base element this scene repeats, if any.
    pub repeated_base: Option<String>,
    /// 1-based order of appearance.
    pub order: usize,
    pub level: String,
}

impl GeneratedScene {
    /// The element identity used for continuation: the repeated base for
    /// repeats, the element itself otherwise.
    pub fn base_element(&self) -> &str {
        self.repeated_base.as_deref().unwrap_or(&self.element)
    }

    /// Human-readable line:
    /// `<timecode> - <element> (<context> - <duration>s) - Ordem: <order> - NV: <level>`
    pub fn to_line(&self) -> String {
        format!(
            "{} - {} ({} - {:.2}s) - Ordem: {} - NV: {}",
            self.timestamp, self.element, self.context, self.duration, self.order, self.level
        )
    }
}

/// The result of one generation run.
///
/// `halted` carries the reason when generation stopped before reaching the
/// requested count; the scenes produced up to that point are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedTrailer {
    pub scenes: Vec<GeneratedScene>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halted: Option<String>,
}

impl GeneratedTrailer {
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.halted.is_none()
    }

    pub fn lines(&self) -> Vec<String> {
        self.scenes.iter().map(GeneratedScene::to_line).collect()
    }

    /// Total running time: the last scene's start plus its duration.
    pub fn total_duration(&self) -> f64 {
        self.scenes.iter().map(|s| s.duration).sum()
    }
}
