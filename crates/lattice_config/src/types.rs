//! Configuration types deserialized from `lattice.toml`.

use serde::Deserialize;

/// The top-level compiler configuration parsed from `lattice.toml`.
///
/// Contains project metadata, source and cache directories, worker-pool
/// settings, and the list of output targets the build produces.
#[derive(Debug, Clone, Deserialize)]
pub struct CompilerConfig {
    /// Core project metadata (namespace, source dir).
    pub project: ProjectMeta,
    /// Build settings (cache, workers, minification).
    #[serde(default)]
    pub build: BuildSettings,
    /// Output targets to generate, in declaration order.
    #[serde(default, rename = "output")]
    pub output_targets: Vec<OutputTarget>,
}

impl CompilerConfig {
    /// Returns `true` if any configured output target is a hydrate target.
    pub fn has_hydrate_target(&self) -> bool {
        self.output_targets
            .iter()
            .any(|t| matches!(t, OutputTarget::Hydrate(_)))
    }
}

/// Core project metadata required in every `lattice.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMeta {
    /// The project namespace used to name emitted bundles (e.g. "App").
    pub namespace: String,
    /// Directory containing component source files, relative to the project root.
    #[serde(default = "default_src_dir")]
    pub src_dir: String,
    /// Path to the project manifest file (`package.json` shape).
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,
}

fn default_src_dir() -> String {
    "src".to_string()
}

fn default_manifest_path() -> String {
    "package.json".to_string()
}

/// Build settings controlling caching, workers, and optimization.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildSettings {
    /// Whether the on-disk content cache is enabled.
    #[serde(default = "default_true")]
    pub enable_cache: bool,
    /// Directory for the on-disk content cache, relative to the project root.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    /// Maximum number of worker threads. `0` means use hardware concurrency.
    #[serde(default)]
    pub max_workers: usize,
    /// Whether emitted scripts are minified.
    #[serde(default = "default_true")]
    pub minify_js: bool,
    /// Whether emitted styles are minified.
    #[serde(default = "default_true")]
    pub minify_css: bool,
    /// Source directory watch debounce, in milliseconds, for watch mode.
    #[serde(default = "default_watch_timeout")]
    pub watch_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_cache_dir() -> String {
    ".lattice/cache".to_string()
}

fn default_watch_timeout() -> u64 {
    80
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            enable_cache: true,
            cache_dir: default_cache_dir(),
            max_workers: 0,
            minify_js: true,
            minify_css: true,
            watch_timeout_ms: default_watch_timeout(),
        }
    }
}

/// An output target the build emits artifacts for.
///
/// Tagged by the `type` field in TOML, e.g.:
///
/// ```toml
/// [[output]]
/// type = "www"
/// dir = "www"
/// empty = true
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutputTarget {
    /// A web-app bundle with an index document.
    Www(OutputTargetDir),
    /// A custom-elements bundle.
    CustomElements(OutputTargetDir),
    /// A server-side-rendering (hydrate) script bundle.
    Hydrate(OutputTargetDir),
    /// A distributable, already-compiled component collection.
    Collection(OutputTargetDir),
}

impl OutputTarget {
    /// Returns the shared directory settings for this target.
    pub fn dir_settings(&self) -> &OutputTargetDir {
        match self {
            OutputTarget::Www(d)
            | OutputTarget::CustomElements(d)
            | OutputTarget::Hydrate(d)
            | OutputTarget::Collection(d) => d,
        }
    }

    /// Returns a stable name for this target kind, used as the bundler-cache key.
    pub fn kind_name(&self) -> &'static str {
        match self {
            OutputTarget::Www(_) => "www",
            OutputTarget::CustomElements(_) => "custom-elements",
            OutputTarget::Hydrate(_) => "hydrate",
            OutputTarget::Collection(_) => "collection",
        }
    }
}

/// Directory settings shared by every output-target kind.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputTargetDir {
    /// Output directory, relative to the project root.
    pub dir: String,
    /// Whether the directory is emptied before the first build.
    /// Rebuilds never empty directories.
    #[serde(default)]
    pub empty: bool,
}
