use serde::{Deserialize, Serialize};

/// A feature of the prototype, as detected by an extractor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// 1 to 10.
    pub complexity: u8,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub is_user_facing: bool,
    #[serde(default)]
    pub estimated_hours: f64,
}

impl Feature {
    pub fn new(id: impl Into<String>, name: impl Into<String>, complexity: u8) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            complexity: complexity.clamp(1, 10),
            files: Vec::new(),
            is_user_facing: false,
            estimated_hours: 0.0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn user_facing(mut self, is_user_facing: bool) -> Self {
        self.is_user_facing = is_user_facing;
        self
    }

    pub fn with_estimated_hours(mut self, hours: f64) -> Self {
        self.estimated_hours = hours;
        self
    }
}

/// Output of a successful feature extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureAnalysis {
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub overall_complexity: Option<u8>,
}

impl FeatureAnalysis {
    /// Fill in missing ids, clamp complexity into 1..=10 and drop features
    /// without a name.
    pub fn normalized(mut self) -> Self {
        self.features.retain(|f| !f.name.trim().is_empty());
        for (i, feature) in self.features.iter_mut().enumerate() {
            if feature.id.trim().is_empty() {
                feature.id = format!("feature-{}", i + 1);
            }
            feature.complexity = feature.complexity.clamp(1, 10);
            if !feature.estimated_hours.is_finite() || feature.estimated_hours < 0.0 {
                feature.estimated_hours = 0.0;
            }
        }
        self.overall_complexity = self.overall_complexity.map(|c| c.clamp(1, 10));
        self
    }
}

/// The prototype's file list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileManifest {
    pub files: Vec<String>,
}

impl FileManifest {
    pub fn new<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }
}

/// Result of asking an extractor for features.
///
/// Only `Extracted` drives feature-derived ticket synthesis; the other two
/// send the pipeline down the setup-only fallback path.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Extracted(FeatureAnalysis),
    /// No extractor is configured.
    Unavailable,
    Failed { reason: String },
}

impl ExtractionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ExtractionOutcome::Extracted(_) => "extracted",
            ExtractionOutcome::Unavailable => "unavailable",
            ExtractionOutcome::Failed { .. } => "failed",
        }
    }
}
