//! Derivation of every boolean feature flag from a component's
//! structural facts.

use crate::component::{ComponentMeta, ListenerTarget, PropType};
use crate::styles::DEFAULT_STYLE_MODE;

/// Recomputes every derived flag on `meta` from its structural facts.
///
/// This is a pure function of the declared members: each flag equals its
/// predicate over the declarations, so repeated recomputation can never
/// drift. All derived flags are reset first; stale values from a previous
/// extraction do not survive.
pub fn set_component_flags(meta: &mut ComponentMeta) {
    clear_derived_flags(meta);

    if !meta.properties.is_empty() {
        meta.has_prop = true;
        meta.has_prop_mutable = meta.properties.iter().any(|p| p.mutable);
        meta.has_reflect = meta.properties.iter().any(|p| p.reflect);
        meta.has_attribute = meta.properties.iter().any(|p| p.attribute.is_some());
        meta.has_prop_boolean = meta.properties.iter().any(|p| p.prop_type == PropType::Boolean);
        meta.has_prop_number = meta.properties.iter().any(|p| p.prop_type == PropType::Number);
        meta.has_prop_string = meta.properties.iter().any(|p| p.prop_type == PropType::String);
    }

    meta.has_state = !meta.states.is_empty();
    meta.has_watch_callback = !meta.watchers.is_empty();
    meta.has_method = !meta.methods.is_empty();
    meta.has_event = !meta.events.is_empty();

    if !meta.listeners.is_empty() {
        meta.has_listener = true;
        meta.has_listener_target_window = meta
            .listeners
            .iter()
            .any(|l| l.target == Some(ListenerTarget::Window));
        meta.has_listener_target_document = meta
            .listeners
            .iter()
            .any(|l| l.target == Some(ListenerTarget::Document));
        meta.has_listener_target_body = meta
            .listeners
            .iter()
            .any(|l| l.target == Some(ListenerTarget::Body));
        meta.has_listener_target_parent = meta
            .listeners
            .iter()
            .any(|l| l.target == Some(ListenerTarget::Parent));
        meta.has_listener_target = meta.listeners.iter().any(|l| l.target.is_some());
    }

    meta.has_member = meta.has_prop || meta.has_state || meta.has_element || meta.has_method;
    meta.is_updateable = meta.has_prop || meta.has_state;

    if !meta.styles.is_empty() {
        meta.has_style = true;
        meta.has_mode = meta.styles.iter().any(|s| s.mode_name != DEFAULT_STYLE_MODE);
    }

    meta.has_lifecycle = meta.has_component_will_load_fn
        || meta.has_component_did_load_fn
        || meta.has_component_should_update_fn
        || meta.has_component_will_update_fn
        || meta.has_component_did_update_fn
        || meta.has_component_will_render_fn
        || meta.has_component_did_render_fn;

    meta.is_plain = !meta.has_member
        && !meta.has_style
        && !meta.has_lifecycle
        && !meta.has_listener
        && !meta.has_vdom_render;
}

fn clear_derived_flags(meta: &mut ComponentMeta) {
    meta.has_prop = false;
    meta.has_prop_mutable = false;
    meta.has_reflect = false;
    meta.has_attribute = false;
    meta.has_prop_boolean = false;
    meta.has_prop_number = false;
    meta.has_prop_string = false;
    meta.has_state = false;
    meta.has_watch_callback = false;
    meta.has_method = false;
    meta.has_event = false;
    meta.has_listener = false;
    meta.has_listener_target_window = false;
    meta.has_listener_target_document = false;
    meta.has_listener_target_body = false;
    meta.has_listener_target_parent = false;
    meta.has_listener_target = false;
    meta.has_member = false;
    meta.is_updateable = false;
    meta.has_style = false;
    meta.has_mode = false;
    meta.has_lifecycle = false;
    meta.is_plain = false;
}
