//! Offline feature extraction from the shape of the file tree.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::{ExtractionOutcome, Feature, FeatureAnalysis, FeatureExtractor, FileManifest};

/// Path fragments that suggest user-facing code.
const UI_MARKERS: &[&str] = &[
    "components/",
    "pages/",
    "views/",
    "screens/",
    "ui/",
    "layouts/",
    "public/",
    "styles/",
];

const UI_EXTENSIONS: &[&str] = &["tsx", "jsx", "vue", "svelte", "html", "css", "scss"];

/// Top-level directories that hold tooling rather than features.
const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    ".github",
    "dist",
    "build",
    "target",
    "vendor",
    "coverage",
];

/// Groups manifest files into features by directory.
///
/// Files under a `src/` (or `app/`, `lib/`) root are grouped by the
/// directory below it; everything else by its top-level directory. Files
/// at the repository root are treated as project configuration and belong
/// to no feature.
#[derive(Debug, Default)]
pub struct HeuristicFeatureExtractor;

impl HeuristicFeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Name of the feature group a path belongs to, if any.
    fn group_of(path: &str) -> Option<String> {
        let parts: Vec<&str> = path
            .trim_start_matches("./")
            .split('/')
            .filter(|p| !p.is_empty())
            .collect();
        match parts.as_slice() {
            [] | [_] => None,
            [top, ..] if IGNORED_DIRS.contains(top) => None,
            [root, _file] if matches!(*root, "src" | "app" | "lib") => Some((*root).to_string()),
            [root, dir, ..] if matches!(*root, "src" | "app" | "lib") => Some((*dir).to_string()),
            [top, ..] => Some((*top).to_string()),
        }
    }

    fn is_user_facing(path: &str) -> bool {
        let lower = path.to_lowercase();
        UI_MARKERS.iter().any(|m| lower.contains(m))
            || lower
                .rsplit_once('.')
                .is_some_and(|(_, ext)| UI_EXTENSIONS.contains(&ext))
    }

    fn complexity_for(file_count: usize) -> u8 {
        // One point per three files, on top of a base of two.
        (2 + file_count / 3).min(10) as u8
    }

    fn title_case(name: &str) -> String {
        name.split(['-', '_', ' '])
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Build the analysis synchronously.
    pub fn extract(&self, manifest: &FileManifest) -> FeatureAnalysis {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for path in manifest.paths() {
            if let Some(group) = Self::group_of(path) {
                groups.entry(group).or_default().push(path.to_string());
            }
        }

        let features: Vec<Feature> = groups
            .into_iter()
            .enumerate()
            .map(|(i, (group, files))| {
                let complexity = Self::complexity_for(files.len());
                let user_facing = files.iter().any(|f| Self::is_user_facing(f));
                Feature::new(format!("feature-{}", i + 1), Self::title_case(&group), complexity)
                    .with_description(format!(
                        "Work covering {} file(s) under {}",
                        files.len(),
                        group
                    ))
                    .user_facing(user_facing)
                    .with_estimated_hours(f64::from(complexity) * 2.0)
                    .with_files(files)
            })
            .collect();

        let overall_complexity = if features.is_empty() {
            None
        } else {
            let total: u32 = features.iter().map(|f| u32::from(f.complexity)).sum();
            Some((total / features.len() as u32).clamp(1, 10) as u8)
        };

        FeatureAnalysis {
            features,
            tech_stack: detect_tech_stack(manifest),
            overall_complexity,
        }
    }
}

#[async_trait]
impl FeatureExtractor for HeuristicFeatureExtractor {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn analyze(&self, manifest: &FileManifest, _description: &str) -> ExtractionOutcome {
        ExtractionOutcome::Extracted(self.extract(manifest))
    }
}

/// Detect languages and frameworks from manifest file names and extensions.
pub fn detect_tech_stack(manifest: &FileManifest) -> Vec<String> {
    let mut stack: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        if !stack.iter().any(|s| s == name) {
            stack.push(name.to_string());
        }
    };

    for path in manifest.paths() {
        let file = path.rsplit('/').next().unwrap_or(path);
        match file {
            "package.json" => push("javascript"),
            "tsconfig.json" => push("typescript"),
            "Cargo.toml" => push("rust"),
            "go.mod" => push("go"),
            "pyproject.toml" | "setup.py" | "requirements.txt" => push("python"),
            "Gemfile" => push("ruby"),
            "next.config.js" | "next.config.mjs" | "next.config.ts" => push("next.js"),
            "vite.config.ts" | "vite.config.js" => push("vite"),
            "tailwind.config.js" | "tailwind.config.ts" => push("tailwind"),
            "Dockerfile" => push("docker"),
            _ => {}
        }

        match file.rsplit_once('.').map(|(_, ext)| ext) {
            Some("ts") => push("typescript"),
            Some("tsx") => {
                push("typescript");
                push("react");
            }
            Some("jsx") => push("react"),
            Some("js" | "mjs") => push("javascript"),
            Some("vue") => push("vue"),
            Some("svelte") => push("svelte"),
            Some("py") => push("python"),
            Some("rs") => push("rust"),
            Some("go") => push("go"),
            Some("rb") => push("ruby"),
            Some("sql") => push("sql"),
            _ => {}
        }
    }

    stack
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> FileManifest {
        FileManifest::new([
            "package.json",
            "tsconfig.json",
            "src/main.tsx",
            "src/components/Header.tsx",
            "src/components/Footer.tsx",
            "src/api/client.ts",
            "server/routes.ts",
            "node_modules/react/index.js",
        ])
    }

    #[test]
    fn test_groups_by_directory() {
        let analysis = HeuristicFeatureExtractor::new().extract(&manifest());
        let names: Vec<_> = analysis.features.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Api", "Components", "Server", "Src"]);

        let components = &analysis.features[1];
        assert_eq!(components.files.len(), 2);
        assert!(components.is_user_facing);
        assert!(!analysis.features[0].is_user_facing);
    }

    #[test]
    fn test_root_files_and_ignored_dirs_form_no_feature() {
        let analysis =
            HeuristicFeatureExtractor::new().extract(&FileManifest::new(["README.md", "node_modules/x/y.js"]));
        assert!(analysis.features.is_empty());
        assert!(analysis.overall_complexity.is_none());
    }

    #[test]
    fn test_complexity_grows_with_file_count() {
        assert_eq!(HeuristicFeatureExtractor::complexity_for(1), 2);
        assert_eq!(HeuristicFeatureExtractor::complexity_for(9), 5);
        assert_eq!(HeuristicFeatureExtractor::complexity_for(100), 10);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(HeuristicFeatureExtractor::title_case("user-profile"), "User Profile");
    }

    #[test]
    fn test_detect_tech_stack() {
        let stack = detect_tech_stack(&manifest());
        assert_eq!(stack, vec!["javascript", "typescript", "react"]);
    }

    #[tokio::test]
    async fn test_analyze_always_extracts() {
        let outcome = HeuristicFeatureExtractor::new()
            .analyze(&manifest(), "demo")
            .await;
        assert!(matches!(outcome, ExtractionOutcome::Extracted(_)));
    }
}
