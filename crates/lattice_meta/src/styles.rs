//! Style metadata, style-id assignment, and external style path resolution.

use std::collections::BTreeMap;
use std::path::Path;

use lattice_common::{join_normalized, normalize_path, relative_path};
use serde::{Deserialize, Serialize};

/// The mode name used for styles declared without an explicit mode.
pub const DEFAULT_STYLE_MODE: &str = "$";

/// Where a style's CSS text comes from.
///
/// Declarations arrive in several shapes: literal text, a reference to an
/// identifier the parser resolved, a path to an external file, or a map
/// from mode name to any of the above. Consumers match exhaustively.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StyleSource {
    /// Literal CSS text declared inline.
    Inline {
        /// The CSS text.
        text: String,
    },
    /// A reference to an identifier whose value the parser resolved.
    ImportedIdentifier {
        /// The identifier name.
        name: String,
    },
    /// A path to an external style file, as written in the declaration.
    ExternalFile {
        /// The declared path, possibly relative to the component file.
        path: String,
    },
    /// A map from mode name to a nested style source.
    ModeMap {
        /// Mode name to source, ordered for deterministic output.
        modes: BTreeMap<String, StyleSource>,
    },
}

/// An external style file with its declared, absolute, and
/// component-relative paths.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ExternalStyle {
    /// The path exactly as written in the declaration.
    pub original_path: String,
    /// The absolute, normalized path.
    pub absolute_path: String,
    /// The path relative to the component's declaring file.
    pub relative_path: String,
}

/// One style entry of a component, for one mode.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct StyleMeta {
    /// The style mode this entry belongs to ([`DEFAULT_STYLE_MODE`] when
    /// the declaration named none).
    pub mode_name: String,
    /// Deterministic id used by the CSS scoping collaborator. Assigned by
    /// [`normalize_styles`].
    pub style_id: String,
    /// The declared sources for this mode.
    pub sources: Vec<StyleSource>,
    /// External style files resolved from the sources. Filled by
    /// [`normalize_styles`].
    pub external: Vec<ExternalStyle>,
}

impl StyleMeta {
    /// Creates a style entry for `mode_name` with no sources.
    pub fn new(mode_name: impl Into<String>) -> Self {
        Self {
            mode_name: mode_name.into(),
            style_id: String::new(),
            sources: Vec::new(),
            external: Vec::new(),
        }
    }
}

/// Computes the deterministic style id for a tag and mode.
///
/// The id is the upper-cased tag name, suffixed with `#mode` for any
/// non-default mode. Identical declarations produce identical ids across
/// builds and processes.
pub fn style_id(tag_name: &str, mode_name: &str) -> String {
    let tag = tag_name.to_uppercase();
    if mode_name == DEFAULT_STYLE_MODE {
        tag
    } else {
        format!("{tag}#{mode_name}")
    }
}

/// Assigns style ids and resolves external style paths in place.
///
/// External paths are resolved against the directory of the component's
/// declaring file; already-absolute paths are normalized as-is. Each
/// external file is recorded with its original, absolute, and
/// component-relative paths.
pub fn normalize_styles(tag_name: &str, component_file_path: &str, styles: &mut [StyleMeta]) {
    let component_dir = Path::new(component_file_path)
        .parent()
        .unwrap_or_else(|| Path::new("/"));

    for style in styles.iter_mut() {
        style.style_id = style_id(tag_name, &style.mode_name);

        let mut external = Vec::new();
        for source in &style.sources {
            collect_external(source, component_dir, &mut external);
        }
        style.external = external;
    }
}

fn collect_external(source: &StyleSource, component_dir: &Path, out: &mut Vec<ExternalStyle>) {
    match source {
        StyleSource::ExternalFile { path } => {
            let declared = Path::new(path);
            let absolute_path = if declared.is_absolute() {
                normalize_path(declared)
            } else {
                join_normalized(component_dir, declared)
            };
            let relative = relative_path(component_dir, Path::new(&absolute_path));
            out.push(ExternalStyle {
                original_path: path.clone(),
                absolute_path,
                relative_path: relative,
            });
        }
        StyleSource::ModeMap { modes } => {
            for nested in modes.values() {
                collect_external(nested, component_dir, out);
            }
        }
        StyleSource::Inline { .. } | StyleSource::ImportedIdentifier { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_id_is_uppercased_tag() {
        assert_eq!(style_id("app-header", DEFAULT_STYLE_MODE), "APP-HEADER");
    }

    #[test]
    fn non_default_mode_id_has_suffix() {
        assert_eq!(style_id("app-header", "ios"), "APP-HEADER#ios");
    }

    #[test]
    fn normalize_assigns_ids_per_mode() {
        let mut styles = vec![StyleMeta::new(DEFAULT_STYLE_MODE), StyleMeta::new("md")];
        normalize_styles("my-cmp", "/src/components/my-cmp/my-cmp.tsx", &mut styles);
        assert_eq!(styles[0].style_id, "MY-CMP");
        assert_eq!(styles[1].style_id, "MY-CMP#md");
    }

    #[test]
    fn external_paths_resolved_against_component_dir() {
        let mut style = StyleMeta::new(DEFAULT_STYLE_MODE);
        style.sources.push(StyleSource::ExternalFile {
            path: "../../styles/theme.css".to_string(),
        });
        let mut styles = vec![style];
        normalize_styles("my-cmp", "/src/components/my-cmp/my-cmp.tsx", &mut styles);

        let external = &styles[0].external[0];
        assert_eq!(external.original_path, "../../styles/theme.css");
        assert_eq!(external.absolute_path, "/src/styles/theme.css");
        assert_eq!(external.relative_path, "../../styles/theme.css");
    }

    #[test]
    fn absolute_external_paths_kept() {
        let mut style = StyleMeta::new(DEFAULT_STYLE_MODE);
        style.sources.push(StyleSource::ExternalFile {
            path: "/src/global/app.css".to_string(),
        });
        let mut styles = vec![style];
        normalize_styles("my-cmp", "/src/components/my-cmp/my-cmp.tsx", &mut styles);

        let external = &styles[0].external[0];
        assert_eq!(external.absolute_path, "/src/global/app.css");
        assert_eq!(external.relative_path, "../../global/app.css");
    }

    #[test]
    fn mode_map_sources_contribute_external_files() {
        let mut modes = BTreeMap::new();
        modes.insert(
            "ios".to_string(),
            StyleSource::ExternalFile {
                path: "cmp.ios.css".to_string(),
            },
        );
        modes.insert(
            "md".to_string(),
            StyleSource::Inline {
                text: ":host { color: red }".to_string(),
            },
        );
        let mut style = StyleMeta::new(DEFAULT_STYLE_MODE);
        style.sources.push(StyleSource::ModeMap { modes });
        let mut styles = vec![style];
        normalize_styles("my-cmp", "/src/cmp/my-cmp.tsx", &mut styles);

        assert_eq!(styles[0].external.len(), 1);
        assert_eq!(styles[0].external[0].absolute_path, "/src/cmp/cmp.ios.css");
    }
}
