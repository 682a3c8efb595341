//! The build orchestration: one call runs one full (re)build.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use lattice_cache::CacheKey;
use lattice_common::{normalize_path, ContentHash};
use lattice_config::OutputTarget;
use lattice_diagnostics::{Category, Diagnostic, DiagnosticCode};
use lattice_meta::{
    extract_components, get_build_features, get_hydrate_conditionals, ComponentDecl,
    StyleSource,
};
use lattice_vfs::FileReadResult;
use lattice_workers::{TaskError, TaskOptions};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::build_ctx::BuildContext;
use crate::context::CompilerContext;
use crate::events::BuildEvent;
use crate::manifest::{
    parse_project_manifest, CollectionManifest, CompilerInfo, ProjectManifest,
};
use crate::module::Module;
use crate::results::BuildResults;

/// The external parser seam: turns one source file into the structural
/// facts of the components it declares.
///
/// The compiler never sees an AST; implementations return plain data and
/// own all syntax concerns.
pub trait ModuleParser {
    /// Parses one source file into its component declarations.
    fn parse_module(&self, path: &str, source: &str) -> Vec<ComponentDecl>;
}

/// Runs one build against the context.
///
/// Snapshots the dirty sets, re-extracts metadata for changed modules
/// only (all modules on the first build), runs the cached style
/// optimization through the worker pool, stages output artifacts in the
/// VFS, commits, and archives the results on the context. A build with
/// errors still commits whatever partial output was staged.
pub fn build(ctx: &mut CompilerContext, parser: &dyn ModuleParser) -> BuildResults {
    let mut bctx = ctx.start_build();
    ctx.events.emit(&BuildEvent::BuildStart {
        build_id: bctx.build_id,
    });

    if !bctx.is_rebuild {
        empty_output_dirs(ctx);
    }

    if let Some(manifest) = read_manifest(ctx, &bctx) {
        resolve_collections(ctx, &manifest);
    }
    update_modules(ctx, parser, &mut bctx);

    bctx.components = ctx
        .module_map
        .values()
        .filter(|m| !m.is_stale)
        .flat_map(|m| m.cmps.iter().cloned())
        .collect();
    bctx.components.sort_by(|a, b| a.tag_name.cmp(&b.tag_name));
    bctx.conditionals = get_build_features(&bctx.components);
    ctx.events.emit(&BuildEvent::BuildLog(format!(
        "{} components in scope",
        bctx.components.len()
    )));

    generate_styles(ctx, &bctx);
    write_output_manifests(ctx, &bctx);

    ctx.bundler_caches
        .invalidate_changed(ctx.module_map.values(), &bctx.changed_files);

    let commit = ctx.vfs.commit();
    for error in &commit.errors {
        bctx.sink.emit(
            Diagnostic::error(
                DiagnosticCode::new(Category::Error, 130),
                "Output Write Failed",
                error.message.clone(),
            )
            .with_file(error.path.clone()),
        );
    }

    let results = bctx.finalize(&ctx.config.project.namespace, commit);
    info!(
        build = results.build_id,
        components = results.component_count,
        duration_ms = results.duration_ms,
        has_error = results.has_error,
        "build finished"
    );
    ctx.events.emit(&BuildEvent::BuildFinish {
        build_id: results.build_id,
        has_error: results.has_error,
    });

    let keep = results.clone();
    ctx.finish_build(results).unwrap_or(keep)
}

/// Stages the emptying of every output directory whose `empty` flag is
/// set. First build only; the VFS additionally refuses dir emptying after
/// its first commit.
fn empty_output_dirs(ctx: &mut CompilerContext) {
    let dirs: Vec<PathBuf> = ctx
        .config
        .output_targets
        .iter()
        .filter(|t| t.dir_settings().empty)
        .map(|t| ctx.project_dir.join(&t.dir_settings().dir))
        .collect();
    if dirs.is_empty() {
        return;
    }
    let refs: Vec<&Path> = dirs.iter().map(PathBuf::as_path).collect();
    ctx.vfs.empty_dirs(&refs);
}

/// Reads and parses the project manifest. A missing manifest is fine; a
/// malformed one becomes a diagnostic.
fn read_manifest(ctx: &mut CompilerContext, bctx: &BuildContext) -> Option<ProjectManifest> {
    let manifest_path = ctx.project_dir.join(&ctx.config.project.manifest_path);
    match ctx.vfs.read_file(&manifest_path) {
        FileReadResult::Found(content) => {
            let key = normalize_path(&manifest_path);
            let manifest = parse_project_manifest(&content, &key, &bctx.sink)?;
            debug!(name = %manifest.name, "project manifest loaded");
            Some(manifest)
        }
        FileReadResult::NotFound => {
            debug!("no project manifest found");
            None
        }
    }
}

/// Loads the precompiled metadata of every dependency that ships a
/// collection. Each dependency is resolved at most once per process; its
/// components enter the module map as collection-dependency modules and
/// participate in feature aggregation without re-extraction.
fn resolve_collections(ctx: &mut CompilerContext, manifest: &ProjectManifest) {
    let dep_names: Vec<String> = manifest.dependencies.keys().cloned().collect();
    for name in dep_names {
        if ctx.resolved_collections.contains(&name) {
            continue;
        }
        let pkg_dir = ctx.project_dir.join("node_modules").join(&name);
        let FileReadResult::Found(pkg_json) = ctx.vfs.read_file(&pkg_dir.join("package.json"))
        else {
            continue;
        };
        let Ok(pkg) = serde_json::from_str::<ProjectManifest>(&pkg_json) else {
            debug!(dependency = %name, "dependency manifest unreadable, skipping");
            continue;
        };
        let Some(collection_rel) = pkg.collection else {
            continue;
        };
        let FileReadResult::Found(text) = ctx.vfs.read_file(&pkg_dir.join(&collection_rel))
        else {
            debug!(dependency = %name, "declared collection manifest missing");
            continue;
        };
        let Ok(collection) = serde_json::from_str::<CollectionManifest>(&text) else {
            debug!(dependency = %name, "collection manifest unreadable, skipping");
            continue;
        };

        let manifest_hash = ContentHash::from_bytes(text.as_bytes());
        let mut by_path: BTreeSet<String> = BTreeSet::new();
        for mut cmp in collection.components {
            cmp.is_collection_dependency = true;
            let path = cmp.source_file_path.clone();
            by_path.insert(path.clone());
            let module = ctx.module_map.entry(path.clone()).or_insert_with(|| {
                let mut module = Module::new(path, manifest_hash);
                module.is_collection_dependency = true;
                module
            });
            if module.is_collection_dependency {
                module.cmps.push(cmp);
            }
        }
        info!(
            dependency = %name,
            modules = by_path.len(),
            "collection dependency resolved"
        );
        ctx.resolved_collections.insert(name);
    }
}

/// (Re-)extracts metadata for the modules this build needs to look at:
/// every source file on the first build, otherwise the changed files,
/// the changed modules, and any module whose transform dependencies
/// intersect the changed set.
fn update_modules(ctx: &mut CompilerContext, parser: &dyn ModuleParser, bctx: &mut BuildContext) {
    let candidates: Vec<String> = if !bctx.is_rebuild {
        let mut files = Vec::new();
        collect_source_files(&ctx.project_dir.join(&ctx.config.project.src_dir), &mut files);
        files.sort();
        files
    } else {
        let mut set: BTreeSet<String> = bctx
            .changed_files
            .iter()
            .filter(|p| is_source_file(p))
            .cloned()
            .collect();
        set.extend(bctx.changed_modules.iter().cloned());
        for (path, module) in &ctx.module_map {
            if module.depends_on_changed(&bctx.changed_files) {
                set.insert(path.clone());
            }
        }
        set.into_iter().collect()
    };

    for path in candidates {
        let source = match ctx.vfs.read_file(Path::new(&path)) {
            FileReadResult::Found(source) => source,
            FileReadResult::NotFound => {
                if let Some(module) = ctx.module_map.get_mut(&path) {
                    module.is_stale = true;
                    bctx.modules_touched.push(path.clone());
                }
                continue;
            }
        };

        let source_hash = ContentHash::from_bytes(source.as_bytes());
        if let Some(existing) = ctx.module_map.get(&path) {
            let unchanged = existing.source_hash == source_hash && !existing.is_stale;
            if unchanged && !existing.depends_on_changed(&bctx.changed_files) {
                continue;
            }
        }

        let decls = parser.parse_module(&path, &source);
        let cmps = extract_components(&path, &decls, &bctx.sink);

        let mut module = Module::new(path.clone(), source_hash);
        module.transform_deps = cmps
            .iter()
            .flat_map(|c| c.styles.iter())
            .flat_map(|s| s.external.iter())
            .map(|e| e.absolute_path.clone())
            .collect();
        module.cmps = cmps;

        debug!(path = %path, components = module.cmps.len(), "module extracted");
        ctx.module_map.insert(path.clone(), module);
        bctx.modules_touched.push(path);
    }
}

/// Optimizes every inline style through the cache and the worker pool,
/// then stages the result under each web-app output target.
///
/// The cache key covers the CSS text, the minify flag, and the style id;
/// identical inputs across process restarts reuse the disk cache and
/// never reach a worker.
fn generate_styles(ctx: &mut CompilerContext, bctx: &BuildContext) {
    let minify = ctx.config.build.minify_css;
    let www_dirs: Vec<PathBuf> = ctx
        .config
        .output_targets
        .iter()
        .filter(|t| matches!(t, OutputTarget::Www(_)))
        .map(|t| ctx.project_dir.join(&t.dir_settings().dir))
        .collect();

    for cmp in &bctx.components {
        for style in &cmp.styles {
            for source in &style.sources {
                let StyleSource::Inline { text } = source else {
                    continue;
                };

                let key = CacheKey::derive(
                    "optimizeCss",
                    [
                        text.as_bytes(),
                        &[minify as u8],
                        style.style_id.as_bytes(),
                    ],
                );

                let optimized = match ctx.cache.get(&key) {
                    Some(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    None => {
                        let response = ctx.workers.run(
                            "optimizeCss",
                            json!({
                                "css": text,
                                "minify": minify,
                                "scopeId": style.style_id,
                            }),
                            TaskOptions::default(),
                        );
                        match response {
                            Ok(value) => {
                                let css = value
                                    .as_str()
                                    .unwrap_or(text.as_str())
                                    .to_string();
                                if let Err(err) = ctx.cache.put(key, css.clone().into_bytes()) {
                                    warn!(error = %err, "style cache entry not updated");
                                }
                                css
                            }
                            Err(TaskError::Task(message)) => {
                                bctx.sink.emit(
                                    Diagnostic::error(
                                        DiagnosticCode::new(Category::Style, 310),
                                        "Style Optimization Failed",
                                        message,
                                    )
                                    .with_file(cmp.source_file_path.clone()),
                                );
                                continue;
                            }
                            Err(err) => {
                                bctx.sink.emit(
                                    Diagnostic::error(
                                        DiagnosticCode::new(Category::Style, 311),
                                        "Style Worker Unavailable",
                                        err.to_string(),
                                    )
                                    .with_file(cmp.source_file_path.clone()),
                                );
                                continue;
                            }
                        }
                    }
                };

                let file_name = format!(
                    "{}.css",
                    style.style_id.to_lowercase().replace('#', ".")
                );
                for dir in &www_dirs {
                    ctx.vfs
                        .write_file(&dir.join("build").join(&file_name), &optimized);
                }
            }
        }
    }
}

/// Stages the per-target metadata artifacts: the collection manifest for
/// collection outputs and the feature-flag record for hydrate outputs.
fn write_output_manifests(ctx: &mut CompilerContext, bctx: &BuildContext) {
    let targets = ctx.config.output_targets.clone();
    for target in &targets {
        let dir = ctx.project_dir.join(&target.dir_settings().dir);
        match target {
            OutputTarget::Collection(_) => {
                // Collection dependencies are not re-exported; only this
                // project's own modules ship in its collection.
                let manifest = CollectionManifest {
                    schema_version: 1,
                    compiler: CompilerInfo {
                        name: "lattice".to_string(),
                        version: ctx.compiler_version().to_string(),
                    },
                    entries: ctx
                        .module_map
                        .values()
                        .filter(|m| !m.is_stale && !m.is_collection_dependency)
                        .map(|m| m.path.clone())
                        .collect(),
                    components: bctx
                        .components
                        .iter()
                        .filter(|c| !c.is_collection_dependency)
                        .cloned()
                        .collect(),
                };
                let content = match serde_json::to_string_pretty(&manifest) {
                    Ok(content) => content,
                    Err(_) => continue,
                };
                ctx.vfs
                    .write_file(&dir.join("collection-manifest.json"), &content);
            }
            OutputTarget::Hydrate(_) => {
                let conditionals = get_hydrate_conditionals(&bctx.components);
                let content = match serde_json::to_string_pretty(&conditionals) {
                    Ok(content) => content,
                    Err(_) => continue,
                };
                ctx.vfs
                    .write_file(&dir.join("build-conditionals.json"), &content);
            }
            OutputTarget::Www(_) | OutputTarget::CustomElements(_) => {}
        }
    }
}

/// Whether a path is a component source file.
fn is_source_file(path: &str) -> bool {
    (path.ends_with(".tsx") || path.ends_with(".ts")) && !path.ends_with(".d.ts")
}

/// Recursively collects component source files under `dir`.
fn collect_source_files(dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_source_files(&path, out);
        } else {
            let normalized = normalize_path(&path);
            if is_source_file(&normalized) {
                out.push(normalized);
            }
        }
    }
}
