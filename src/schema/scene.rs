use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Suffix appended to an element identifier to mark an immediate repeat
/// of the preceding scene's element (`"B3_R"` repeats `"B3"`).
pub const REPEAT_MARKER: &str = "_R";

/// Coarse intensity label of a scene. Ordered Low < Medium < High.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Context {
    #[serde(rename = "L", alias = "Low")]
    Low,
    #[serde(rename = "M", alias = "Medium")]
    Medium,
    #[serde(rename = "H", alias = "High")]
    High,
}

impl Context {
    pub const ALL: [Context; 3] = [Context::Low, Context::Medium, Context::High];

    /// Position in the ordered label set, used for one-hot encoding.
    pub fn index(self) -> usize {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }

    /// Short label used in formatted output (e.g., "M").
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "L",
            Self::Medium => "M",
            Self::High => "H",
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One scene of a training trailer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    #[serde(rename = "elemento")]
    pub element: String,
    #[serde(rename = "contexto")]
    pub context: Context,
    #[serde(rename = "duracao_segundos")]
    pub duration: f64,
    #[serde(rename = "NV")]
    pub level: String,
}

impl SceneRecord {
    pub fn new(element: &str, context: Context, duration: f64, level: &str) -> Self {
        Self {
            element: element.to_string(),
            context,
            duration,
            level: level.to_string(),
        }
    }

    /// Returns true if the identifier carries the repeat marker.
    pub fn is_repeat_marked(&self) -> bool {
        is_repeat_marked(&self.element)
    }

    /// The element identifier with any repeat marker stripped.
    pub fn base_element(&self) -> &str {
        base_element(&self.element)
    }
}

/// Strip the repeat marker from an element identifier.
pub fn base_element(element: &str) -> &str {
    if is_repeat_marked(element) {
        &element[..element.len() - REPEAT_MARKER.len()]
    } else {
        element
    }
}

pub fn is_repeat_marked(element: &str) -> bool {
    element.ends_with(REPEAT_MARKER) && element.len() > REPEAT_MARKER.len()
}

/// Append the repeat marker to a base element.
pub fn mark_repeat(base: &str) -> String {
    format!("{}{}", base, REPEAT_MARKER)
}

/// Derive the type tag of an element: its leading run of ASCII letters
/// (`"EXP12"` → `"EXP"`), or the whole base identifier if it has none.
pub fn element_type(element: &str) -> String {
    let base = base_element(element);
    let prefix: String = base.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    if prefix.is_empty() {
        base.to_string()
    } else {
        prefix
    }
}

/// An ordered sequence of scenes. Order defines all transition statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trailer {
    #[serde(rename = "cenas")]
    pub scenes: Vec<SceneRecord>,
}

impl Trailer {
    pub fn new(scenes: Vec<SceneRecord>) -> Self {
        Self { scenes }
    }
}

/// A training corpus: every trailer plus optional free-form metadata
/// describing how the corpus was produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Corpus {
    pub trailers: Vec<Trailer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Corpus {
    pub fn new(trailers: Vec<Trailer>) -> Self {
        Self {
            trailers,
            metadata: None,
        }
    }

    /// Parse a corpus from its JSON document form.
    pub fn parse_json(input: &str) -> Result<Corpus, serde_json::Error> {
        serde_json::from_str(input)
    }

    /// Load a corpus from a JSON file.
    pub fn load_json(path: &Path) -> Result<Corpus, CorpusError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::parse_json(&contents)?)
    }

    /// Iterate over every scene of every trailer, in order.
    pub fn scenes(&self) -> impl Iterator<Item = &SceneRecord> {
        self.trailers.iter().flat_map(|t| t.scenes.iter())
    }

    pub fn scene_count(&self) -> usize {
        self.trailers.iter().map(|t| t.scenes.len()).sum()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
