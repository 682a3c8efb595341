//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::CompilerConfig;
use std::collections::BTreeSet;
use std::path::Path;

/// Loads and validates a `lattice.toml` configuration from a project directory.
///
/// Reads `<project_dir>/lattice.toml`, parses it, and validates required fields.
pub fn load_config(project_dir: &Path) -> Result<CompilerConfig, ConfigError> {
    let config_path = project_dir.join("lattice.toml");
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `lattice.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<CompilerConfig, ConfigError> {
    let config: CompilerConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that required fields are present and configuration values are consistent.
fn validate_config(config: &CompilerConfig) -> Result<(), ConfigError> {
    if config.project.namespace.is_empty() {
        return Err(ConfigError::MissingField("project.namespace".to_string()));
    }
    if config.project.src_dir.is_empty() {
        return Err(ConfigError::MissingField("project.src_dir".to_string()));
    }

    let mut seen_dirs = BTreeSet::new();
    for target in &config.output_targets {
        let dir = &target.dir_settings().dir;
        if dir.is_empty() {
            return Err(ConfigError::MissingField(format!(
                "output.{}.dir",
                target.kind_name()
            )));
        }
        if !seen_dirs.insert(dir.clone()) {
            return Err(ConfigError::ValidationError(format!(
                "output dir '{dir}' is used by more than one target"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
[project]
namespace = "App"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.project.namespace, "App");
        assert_eq!(config.project.src_dir, "src");
        assert_eq!(config.project.manifest_path, "package.json");
        assert!(config.build.enable_cache);
        assert_eq!(config.build.cache_dir, ".lattice/cache");
        assert_eq!(config.build.max_workers, 0);
        assert!(config.output_targets.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[project]
namespace = "MyDesignSystem"
src_dir = "components"
manifest_path = "pkg/package.json"

[build]
enable_cache = false
cache_dir = ".cache"
max_workers = 4
minify_js = false
minify_css = false
watch_timeout_ms = 120

[[output]]
type = "www"
dir = "www"
empty = true

[[output]]
type = "collection"
dir = "dist/collection"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.project.namespace, "MyDesignSystem");
        assert_eq!(config.project.src_dir, "components");
        assert!(!config.build.enable_cache);
        assert_eq!(config.build.max_workers, 4);
        assert!(!config.build.minify_js);
        assert_eq!(config.build.watch_timeout_ms, 120);
        assert_eq!(config.output_targets.len(), 2);
    }

    #[test]
    fn missing_namespace_errors() {
        let toml = r#"
[project]
namespace = ""
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn empty_output_dir_errors() {
        let toml = r#"
[project]
namespace = "App"

[[output]]
type = "www"
dir = ""
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn duplicate_output_dir_errors() {
        let toml = r#"
[project]
namespace = "App"

[[output]]
type = "www"
dir = "dist"

[[output]]
type = "hydrate"
dir = "dist"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let toml = "this is not valid toml {{{}}}";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn io_error_from_nonexistent_dir() {
        let err = load_config(Path::new("/nonexistent/dir")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
