//! Aggregation of component flags into the build conditionals record.

use serde::{Deserialize, Serialize};

use crate::component::{ComponentMeta, Encapsulation};

/// The aggregate feature-flag record for one generated output.
///
/// Each fact field is the boolean OR of the corresponding flag across the
/// component set in scope for that output; downstream code generators omit
/// runtime paths whose flag is false. The trailing group of fields is not
/// derived from components at all: they are forced per output kind (see
/// [`set_hydrate_overrides`]) or by the build environment.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConditionals {
    /// Every component in scope has a render function.
    pub all_render_fn: bool,
    pub has_render_fn: bool,

    pub prop: bool,
    pub prop_mutable: bool,
    pub prop_boolean: bool,
    pub prop_number: bool,
    pub prop_string: bool,
    pub reflect: bool,
    pub observe_attribute: bool,
    pub state: bool,
    pub member: bool,
    pub updatable: bool,
    pub method: bool,
    pub event: bool,
    pub watch_callback: bool,
    pub element: bool,

    pub host_listener: bool,
    pub host_listener_target_window: bool,
    pub host_listener_target_document: bool,
    pub host_listener_target_body: bool,
    pub host_listener_target_parent: bool,
    pub host_listener_target: bool,

    pub style: bool,
    pub mode: bool,
    pub scoped: bool,
    pub shadow_dom: bool,
    pub shadow_delegates_focus: bool,
    pub slot: bool,
    pub svg: bool,

    pub lifecycle: bool,
    pub cmp_will_load: bool,
    pub cmp_did_load: bool,
    pub cmp_should_update: bool,
    pub cmp_will_update: bool,
    pub cmp_did_update: bool,
    pub cmp_will_render: bool,
    pub cmp_did_render: bool,
    pub connected_callback: bool,
    pub disconnected_callback: bool,

    pub vdom_render: bool,
    pub vdom_attribute: bool,
    pub vdom_class: bool,
    pub vdom_functional: bool,
    pub vdom_key: bool,
    pub vdom_listener: bool,
    pub vdom_ref: bool,
    pub vdom_style: bool,
    pub vdom_text: bool,

    // Forced per output kind or build environment, never derived from
    // component metadata.
    pub lazy_load: bool,
    pub hydrate_server_side: bool,
    pub hydrate_client_side: bool,
    pub lifecycle_dom_events: bool,
    pub dev_tools: bool,
    pub hot_module_replacement: bool,
    pub clone_node_fix: bool,
    pub append_child_slot_fix: bool,
    pub slot_child_nodes_fix: bool,
    pub safari10: bool,
    pub shadow_dom_shim: bool,
}

/// OR-reduces the flags of every component in scope into one
/// [`BuildConditionals`] record.
///
/// Output-kind overrides are left at their defaults; callers apply them
/// afterwards (e.g. [`get_hydrate_conditionals`]).
pub fn get_build_features(cmps: &[ComponentMeta]) -> BuildConditionals {
    let any = |f: fn(&ComponentMeta) -> bool| cmps.iter().any(f);

    BuildConditionals {
        all_render_fn: !cmps.is_empty() && cmps.iter().all(|c| c.has_render_fn),
        has_render_fn: any(|c| c.has_render_fn),

        prop: any(|c| c.has_prop),
        prop_mutable: any(|c| c.has_prop_mutable),
        prop_boolean: any(|c| c.has_prop_boolean),
        prop_number: any(|c| c.has_prop_number),
        prop_string: any(|c| c.has_prop_string),
        reflect: any(|c| c.has_reflect),
        observe_attribute: any(|c| c.has_attribute),
        state: any(|c| c.has_state),
        member: any(|c| c.has_member),
        updatable: any(|c| c.is_updateable),
        method: any(|c| c.has_method),
        event: any(|c| c.has_event),
        watch_callback: any(|c| c.has_watch_callback),
        element: any(|c| c.has_element),

        host_listener: any(|c| c.has_listener),
        host_listener_target_window: any(|c| c.has_listener_target_window),
        host_listener_target_document: any(|c| c.has_listener_target_document),
        host_listener_target_body: any(|c| c.has_listener_target_body),
        host_listener_target_parent: any(|c| c.has_listener_target_parent),
        host_listener_target: any(|c| c.has_listener_target),

        style: any(|c| c.has_style),
        mode: any(|c| c.has_mode),
        scoped: any(|c| c.encapsulation == Encapsulation::Scoped),
        shadow_dom: any(|c| matches!(c.encapsulation, Encapsulation::Shadow { .. })),
        shadow_delegates_focus: any(|c| {
            matches!(
                c.encapsulation,
                Encapsulation::Shadow {
                    delegates_focus: true
                }
            )
        }),
        slot: any(|c| c.has_slot),
        svg: any(|c| c.has_svg),

        lifecycle: any(|c| c.has_lifecycle),
        cmp_will_load: any(|c| c.has_component_will_load_fn),
        cmp_did_load: any(|c| c.has_component_did_load_fn),
        cmp_should_update: any(|c| c.has_component_should_update_fn),
        cmp_will_update: any(|c| c.has_component_will_update_fn),
        cmp_did_update: any(|c| c.has_component_did_update_fn),
        cmp_will_render: any(|c| c.has_component_will_render_fn),
        cmp_did_render: any(|c| c.has_component_did_render_fn),
        connected_callback: any(|c| c.has_connected_callback_fn),
        disconnected_callback: any(|c| c.has_disconnected_callback_fn),

        vdom_render: any(|c| c.has_vdom_render),
        vdom_attribute: any(|c| c.has_vdom_attribute),
        vdom_class: any(|c| c.has_vdom_class),
        vdom_functional: any(|c| c.has_vdom_functional),
        vdom_key: any(|c| c.has_vdom_key),
        vdom_listener: any(|c| c.has_vdom_listener),
        vdom_ref: any(|c| c.has_vdom_ref),
        vdom_style: any(|c| c.has_vdom_style),
        vdom_text: any(|c| c.has_vdom_text),

        ..BuildConditionals::default()
    }
}

/// Applies the overrides forced on every server-hydration output,
/// regardless of what the components declare.
///
/// Hydration runs in a server DOM: modules load eagerly under lazy-load
/// registration, client-side hydration and DOM lifecycle events are off,
/// and every browser-workaround shim is disabled.
pub fn set_hydrate_overrides(build: &mut BuildConditionals) {
    build.lazy_load = true;
    build.hydrate_client_side = false;
    build.hydrate_server_side = true;
    build.lifecycle_dom_events = false;
    build.dev_tools = false;
    build.hot_module_replacement = false;
    build.clone_node_fix = false;
    build.append_child_slot_fix = false;
    build.slot_child_nodes_fix = false;
    build.safari10 = false;
    build.shadow_dom_shim = false;
}

/// Computes the conditionals for a server-hydration output: the OR-reduced
/// component features with the hydrate overrides applied.
pub fn get_hydrate_conditionals(cmps: &[ComponentMeta]) -> BuildConditionals {
    let mut build = get_build_features(cmps);
    set_hydrate_overrides(&mut build);
    build
}
