//! Project and collection manifest shapes.

use lattice_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use lattice_meta::ComponentMeta;
use serde::{Deserialize, Serialize};

/// The fields of the project manifest the compiler cares about.
///
/// The manifest is a `package.json`-shaped file; everything else in it is
/// ignored.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectManifest {
    /// The package name.
    pub name: String,
    /// The package version string.
    pub version: String,
    /// Entry path of a precompiled collection this package ships, if any.
    pub collection: Option<String>,
    /// Declared dependency names, used to resolve collection dependencies.
    pub dependencies: std::collections::BTreeMap<String, String>,
}

/// Parses the project manifest.
///
/// A malformed manifest is a user input problem, not a compiler failure:
/// it yields an error diagnostic on `sink` and `None`, and the build
/// carries on without manifest-derived information.
pub fn parse_project_manifest(
    content: &str,
    manifest_path: &str,
    sink: &DiagnosticSink,
) -> Option<ProjectManifest> {
    match serde_json::from_str(content) {
        Ok(manifest) => Some(manifest),
        Err(err) => {
            sink.emit(
                Diagnostic::error(
                    DiagnosticCode::new(Category::Error, 120),
                    "Invalid Project Manifest",
                    format!("Unable to parse {manifest_path}: {err}"),
                )
                .with_file(manifest_path),
            );
            None
        }
    }
}

/// The manifest a collection output target emits, and the shape read
/// back when another project consumes the collection as a dependency.
///
/// Carries the full serialized component metadata so consumers never
/// re-extract it from source.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionManifest {
    /// Version of this manifest shape.
    pub schema_version: u32,
    /// The compiler that produced the collection.
    pub compiler: CompilerInfo,
    /// Source paths of the modules in the collection.
    pub entries: Vec<String>,
    /// Full metadata for every component in the collection.
    pub components: Vec<ComponentMeta>,
}

/// Name and version of the compiler that produced a collection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompilerInfo {
    /// Compiler name.
    pub name: String,
    /// Compiler version string.
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_manifest_roundtrip() {
        let manifest = CollectionManifest {
            schema_version: 1,
            compiler: CompilerInfo {
                name: "lattice".to_string(),
                version: "0.1.0".to_string(),
            },
            entries: vec!["/src/ui-button.tsx".to_string()],
            components: vec![ComponentMeta::new(
                "ui-button",
                "UiButton",
                "/src/ui-button.tsx",
            )],
        };
        let json = serde_json::to_string(&manifest).unwrap();
        assert!(json.contains("\"schemaVersion\":1"));
        let back: CollectionManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.components[0].tag_name, "ui-button");
    }

    #[test]
    fn parses_known_fields() {
        let sink = DiagnosticSink::new();
        let manifest = parse_project_manifest(
            r#"{"name":"@app/core","version":"1.2.0","collection":"dist/collection/collection-manifest.json","license":"MIT"}"#,
            "/project/package.json",
            &sink,
        )
        .unwrap();
        assert_eq!(manifest.name, "@app/core");
        assert_eq!(
            manifest.collection.as_deref(),
            Some("dist/collection/collection-manifest.json")
        );
        assert!(!sink.has_errors());
    }

    #[test]
    fn malformed_manifest_is_a_diagnostic_not_an_error() {
        let sink = DiagnosticSink::new();
        let manifest = parse_project_manifest("{not json", "/project/package.json", &sink);
        assert!(manifest.is_none());
        assert!(sink.has_errors());
        let diags = sink.diagnostics();
        assert_eq!(diags[0].file_path.as_deref(), Some("/project/package.json"));
    }
}
