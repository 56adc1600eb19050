//! Context snapshots staged for persistence alongside generated tickets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::extraction::{detect_tech_stack, Feature, FeatureAnalysis, FileManifest};
use crate::graph::DependencyAnalysis;

/// Flattened view of one extracted feature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureSummary {
    pub id: String,
    pub name: String,
    pub complexity: u8,
    pub is_user_facing: bool,
    pub file_count: usize,
    pub estimated_hours: f64,
}

impl From<&Feature> for FeatureSummary {
    fn from(feature: &Feature) -> Self {
        Self {
            id: feature.id.clone(),
            name: feature.name.clone(),
            complexity: feature.complexity,
            is_user_facing: feature.is_user_facing,
            file_count: feature.files.len(),
            estimated_hours: feature.estimated_hours,
        }
    }
}

/// One kind of project context, keyed by `context_type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "context_type", rename_all = "snake_case")]
pub enum ContextSnapshot {
    TechStack {
        technologies: Vec<String>,
        overall_complexity: Option<u8>,
    },
    Features {
        features: Vec<FeatureSummary>,
    },
    FileStructure {
        total_files: usize,
        /// File count per top-level directory; root files count under ".".
        directories: BTreeMap<String, usize>,
        /// File count per extension; files without one count under "".
        extensions: BTreeMap<String, usize>,
    },
    DependencyAnalysis {
        ticket_count: usize,
        edge_count: usize,
        critical_path: Vec<String>,
    },
}

impl ContextSnapshot {
    pub fn context_type(&self) -> &'static str {
        match self {
            ContextSnapshot::TechStack { .. } => "tech_stack",
            ContextSnapshot::Features { .. } => "features",
            ContextSnapshot::FileStructure { .. } => "file_structure",
            ContextSnapshot::DependencyAnalysis { .. } => "dependency_analysis",
        }
    }

    fn file_structure(manifest: &FileManifest) -> Self {
        let mut directories = BTreeMap::new();
        let mut extensions = BTreeMap::new();

        for path in manifest.paths() {
            let path = path.trim_start_matches("./");
            let dir = match path.split_once('/') {
                Some((top, _)) => top.to_string(),
                None => ".".to_string(),
            };
            *directories.entry(dir).or_insert(0) += 1;

            let file = path.rsplit('/').next().unwrap_or(path);
            let ext = match file.rsplit_once('.') {
                Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
                _ => String::new(),
            };
            *extensions.entry(ext).or_insert(0) += 1;
        }

        ContextSnapshot::FileStructure {
            total_files: manifest.len(),
            directories,
            extensions,
        }
    }
}

/// Build the snapshots for a run. `analysis` is `None` on the fallback
/// path, in which case the tech stack is detected from the manifest and no
/// feature summary is staged.
pub fn stage_contexts(
    manifest: &FileManifest,
    analysis: Option<&FeatureAnalysis>,
    dependencies: &DependencyAnalysis,
) -> Vec<ContextSnapshot> {
    let mut contexts = Vec::with_capacity(4);

    let (technologies, overall_complexity) = match analysis {
        Some(a) if !a.tech_stack.is_empty() => (a.tech_stack.clone(), a.overall_complexity),
        Some(a) => (detect_tech_stack(manifest), a.overall_complexity),
        None => (detect_tech_stack(manifest), None),
    };
    contexts.push(ContextSnapshot::TechStack {
        technologies,
        overall_complexity,
    });

    if let Some(a) = analysis {
        contexts.push(ContextSnapshot::Features {
            features: a.features.iter().map(FeatureSummary::from).collect(),
        });
    }

    contexts.push(ContextSnapshot::file_structure(manifest));

    contexts.push(ContextSnapshot::DependencyAnalysis {
        ticket_count: dependencies.graph.len(),
        edge_count: dependencies.graph.edge_count(),
        critical_path: dependencies.critical_path.clone(),
    });

    contexts
}
