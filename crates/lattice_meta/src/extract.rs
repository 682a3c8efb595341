//! Extraction of [`ComponentMeta`] records from parsed declarations.

use std::collections::BTreeMap;

use lattice_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use serde::{Deserialize, Serialize};

use crate::component::{
    ComponentMeta, Encapsulation, EventMeta, ListenerMeta, MethodMeta, PropertyMeta, StateMeta,
    WatcherMeta,
};
use crate::flags::set_component_flags;
use crate::styles::{normalize_styles, StyleMeta, StyleSource, DEFAULT_STYLE_MODE};

/// Structural facts for one component declaration, as reported by the
/// external parser.
///
/// This is plain data: the parser has already resolved identifiers and
/// discarded the AST. Everything here is serializable so declarations can
/// cross the worker boundary.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentDecl {
    /// The declared custom-element tag name.
    pub tag_name: String,
    /// The declaring class name.
    pub class_name: String,
    /// Style isolation mode.
    pub encapsulation: Encapsulation,
    /// Declared members.
    pub properties: Vec<PropertyMeta>,
    pub states: Vec<StateMeta>,
    pub methods: Vec<MethodMeta>,
    pub events: Vec<EventMeta>,
    pub listeners: Vec<ListenerMeta>,
    pub watchers: Vec<WatcherMeta>,
    /// Declared styles, in declaration order.
    pub styles: Vec<StyleDecl>,
    /// Whether the class declares an element reference member.
    pub has_element: bool,
    /// Render facts observed by the parser.
    pub has_render_fn: bool,
    pub has_vdom_render: bool,
    pub has_slot: bool,
    pub has_svg: bool,
    /// Lifecycle hooks present on the class.
    pub has_connected_callback_fn: bool,
    pub has_disconnected_callback_fn: bool,
    pub has_component_will_load_fn: bool,
    pub has_component_did_load_fn: bool,
    pub has_component_should_update_fn: bool,
    pub has_component_will_update_fn: bool,
    pub has_component_did_update_fn: bool,
    pub has_component_will_render_fn: bool,
    pub has_component_did_render_fn: bool,
}

/// One declared style: an optional mode name and its source.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StyleDecl {
    /// The declared mode; `None` means the default mode.
    pub mode_name: Option<String>,
    /// Where the CSS comes from.
    pub source: StyleSource,
}

/// Converts the declarations of one module into metadata records.
///
/// A malformed declaration yields a diagnostic on `sink` and either a
/// best-effort partial record (recoverable problems such as a
/// wrongly-cased tag) or no record at all (an empty tag); sibling
/// declarations in the same module are always processed.
pub fn extract_components(
    module_path: &str,
    decls: &[ComponentDecl],
    sink: &DiagnosticSink,
) -> Vec<ComponentMeta> {
    let mut metas = Vec::with_capacity(decls.len());
    for decl in decls {
        if let Some(meta) = extract_one(module_path, decl, sink) {
            metas.push(meta);
        }
    }
    metas
}

fn extract_one(
    module_path: &str,
    decl: &ComponentDecl,
    sink: &DiagnosticSink,
) -> Option<ComponentMeta> {
    let tag_name = match validate_tag(module_path, &decl.tag_name, sink) {
        Some(tag) => tag,
        None => return None,
    };

    let mut meta = ComponentMeta::new(tag_name, decl.class_name.clone(), module_path);
    meta.encapsulation = decl.encapsulation;
    meta.properties = dedupe_properties(module_path, &decl.properties, sink);
    meta.states = decl.states.clone();
    meta.methods = decl.methods.clone();
    meta.events = decl.events.clone();
    meta.listeners = decl.listeners.clone();
    meta.watchers = decl.watchers.clone();
    meta.has_element = decl.has_element;
    meta.has_render_fn = decl.has_render_fn;
    meta.has_vdom_render = decl.has_vdom_render;
    meta.has_slot = decl.has_slot;
    meta.has_svg = decl.has_svg;
    meta.has_connected_callback_fn = decl.has_connected_callback_fn;
    meta.has_disconnected_callback_fn = decl.has_disconnected_callback_fn;
    meta.has_component_will_load_fn = decl.has_component_will_load_fn;
    meta.has_component_did_load_fn = decl.has_component_did_load_fn;
    meta.has_component_should_update_fn = decl.has_component_should_update_fn;
    meta.has_component_will_update_fn = decl.has_component_will_update_fn;
    meta.has_component_did_update_fn = decl.has_component_did_update_fn;
    meta.has_component_will_render_fn = decl.has_component_will_render_fn;
    meta.has_component_did_render_fn = decl.has_component_did_render_fn;

    meta.styles = group_styles(&decl.styles);
    normalize_styles(&meta.tag_name, module_path, &mut meta.styles);

    set_component_flags(&mut meta);
    Some(meta)
}

/// Validates a declared tag name, returning the (possibly repaired) tag to
/// use, or `None` when no usable record can be produced.
fn validate_tag(module_path: &str, tag: &str, sink: &DiagnosticSink) -> Option<String> {
    if tag.is_empty() {
        sink.emit(
            Diagnostic::error(
                DiagnosticCode::new(Category::Meta, 101),
                "Missing Component Tag",
                "Component declaration has an empty tag name.",
            )
            .with_file(module_path),
        );
        return None;
    }

    if tag.chars().any(|c| c.is_ascii_uppercase()) {
        sink.emit(
            Diagnostic::error(
                DiagnosticCode::new(Category::Meta, 102),
                "Invalid Component Tag",
                format!("Tag \"{tag}\" must be all lowercase."),
            )
            .with_file(module_path),
        );
        return Some(tag.to_lowercase());
    }

    if let Some(bad) = tag
        .chars()
        .find(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit() && *c != '-')
    {
        sink.emit(
            Diagnostic::error(
                DiagnosticCode::new(Category::Meta, 103),
                "Invalid Component Tag",
                format!("Tag \"{tag}\" contains the invalid character \"{bad}\"."),
            )
            .with_file(module_path),
        );
        return None;
    }

    if !tag.contains('-') {
        sink.emit(
            Diagnostic::error(
                DiagnosticCode::new(Category::Meta, 104),
                "Invalid Component Tag",
                format!(
                    "Tag \"{tag}\" must contain a dash to work as a custom element."
                ),
            )
            .with_file(module_path),
        );
        // Still usable as a partial record for sibling analysis.
        return Some(tag.to_string());
    }

    Some(tag.to_string())
}

/// Drops duplicate property declarations, keeping the first and warning
/// about the rest.
fn dedupe_properties(
    module_path: &str,
    properties: &[PropertyMeta],
    sink: &DiagnosticSink,
) -> Vec<PropertyMeta> {
    let mut seen = std::collections::BTreeSet::new();
    let mut out = Vec::with_capacity(properties.len());
    for prop in properties {
        if seen.insert(prop.name.clone()) {
            out.push(prop.clone());
        } else {
            sink.emit(
                Diagnostic::warning(
                    DiagnosticCode::new(Category::Meta, 110),
                    "Duplicate Property",
                    format!("Property \"{}\" is declared more than once.", prop.name),
                )
                .with_file(module_path),
            );
        }
    }
    out
}

/// Groups style declarations by mode, preserving per-mode declaration
/// order.
fn group_styles(decls: &[StyleDecl]) -> Vec<StyleMeta> {
    let mut by_mode: BTreeMap<String, StyleMeta> = BTreeMap::new();
    for decl in decls {
        let mode = decl
            .mode_name
            .clone()
            .unwrap_or_else(|| DEFAULT_STYLE_MODE.to_string());
        by_mode
            .entry(mode.clone())
            .or_insert_with(|| StyleMeta::new(mode))
            .sources
            .push(decl.source.clone());
    }
    by_mode.into_values().collect()
}
