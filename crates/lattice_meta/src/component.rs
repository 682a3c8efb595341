//! Serializable component metadata: structural facts plus derived flags.

use serde::{Deserialize, Serialize};

use crate::styles::StyleMeta;

/// How a component's styles are isolated from the surrounding document.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Encapsulation {
    /// No isolation; styles apply globally.
    #[default]
    None,
    /// Selector-rewritten scoping without shadow DOM.
    Scoped,
    /// Native shadow DOM.
    Shadow {
        /// Whether the shadow root delegates focus to its first focusable
        /// descendant.
        delegates_focus: bool,
    },
}

/// The declared type of a property, as far as codegen cares.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropType {
    Boolean,
    Number,
    String,
    /// Any other type; no attribute parsing is generated for it.
    #[default]
    Any,
}

/// One declared property.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct PropertyMeta {
    /// The property name on the component class.
    pub name: String,
    /// The declared type.
    pub prop_type: PropType,
    /// Whether the component may reassign the property itself.
    pub mutable: bool,
    /// Whether property changes are reflected back to the attribute.
    pub reflect: bool,
    /// The attribute observed for this property, if any.
    pub attribute: Option<String>,
}

/// One declared internal state field.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct StateMeta {
    /// The field name.
    pub name: String,
}

/// One declared public method.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MethodMeta {
    /// The method name.
    pub name: String,
}

/// One declared custom event the component emits.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct EventMeta {
    /// The event name as dispatched.
    pub name: String,
}

/// Where a declared listener attaches.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListenerTarget {
    Window,
    Document,
    Body,
    Parent,
}

/// One declared event listener.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ListenerMeta {
    /// The event name listened for.
    pub event_name: String,
    /// The attach target; `None` means the host element itself.
    pub target: Option<ListenerTarget>,
}

/// One declared watch callback.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct WatcherMeta {
    /// The watched property or state name.
    pub property_name: String,
    /// The callback method name.
    pub callback_name: String,
}

/// The complete metadata record for one declared component.
///
/// Structural facts are filled by extraction from the parsed declaration;
/// every `has_*`/`is_*` flag below the "derived" marker is computed from
/// them by [`set_component_flags`](crate::flags::set_component_flags) and
/// must never be set independently. Serializable because collection
/// dependencies ship their metadata precompiled.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentMeta {
    /// The custom-element tag name, e.g. `app-header`.
    pub tag_name: String,
    /// The declaring class name.
    pub component_class_name: String,
    /// Absolute, normalized path of the declaring source file.
    pub source_file_path: String,
    /// Style isolation mode.
    pub encapsulation: Encapsulation,

    /// Declared properties.
    pub properties: Vec<PropertyMeta>,
    /// Declared state fields.
    pub states: Vec<StateMeta>,
    /// Declared public methods.
    pub methods: Vec<MethodMeta>,
    /// Declared events.
    pub events: Vec<EventMeta>,
    /// Declared listeners.
    pub listeners: Vec<ListenerMeta>,
    /// Declared watch callbacks.
    pub watchers: Vec<WatcherMeta>,
    /// Declared styles, one entry per mode.
    pub styles: Vec<StyleMeta>,

    /// Whether the class declares an element reference member.
    pub has_element: bool,
    /// Whether the class declares a render function.
    pub has_render_fn: bool,
    /// Whether the render output uses virtual-DOM nodes (as opposed to
    /// returning nothing or plain text).
    pub has_vdom_render: bool,
    /// Virtual-DOM facts observed in the render output.
    pub has_vdom_attribute: bool,
    pub has_vdom_class: bool,
    pub has_vdom_functional: bool,
    pub has_vdom_key: bool,
    pub has_vdom_listener: bool,
    pub has_vdom_ref: bool,
    pub has_vdom_style: bool,
    pub has_vdom_text: bool,
    /// Whether the render output contains a `slot` element.
    pub has_slot: bool,
    /// Whether the render output contains an `svg` element.
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

    /// Whether this component came from an already-compiled collection
    /// rather than project source.
    pub is_collection_dependency: bool,

    // Derived flags. Computed by `set_component_flags`, never set by hand.
    pub has_prop: bool,
    pub has_prop_mutable: bool,
    pub has_reflect: bool,
    pub has_attribute: bool,
    pub has_prop_boolean: bool,
    pub has_prop_number: bool,
    pub has_prop_string: bool,
    pub has_state: bool,
    pub has_watch_callback: bool,
    pub has_method: bool,
    pub has_event: bool,
    pub has_listener: bool,
    pub has_listener_target_window: bool,
    pub has_listener_target_document: bool,
    pub has_listener_target_body: bool,
    pub has_listener_target_parent: bool,
    pub has_listener_target: bool,
    pub has_member: bool,
    pub is_updateable: bool,
    pub has_style: bool,
    pub has_mode: bool,
    pub has_lifecycle: bool,
    pub is_plain: bool,
}

impl ComponentMeta {
    /// Creates an empty metadata record for a tag declared in the given
    /// file.
    pub fn new(
        tag_name: impl Into<String>,
        component_class_name: impl Into<String>,
        source_file_path: impl Into<String>,
    ) -> Self {
        Self {
            tag_name: tag_name.into(),
            component_class_name: component_class_name.into(),
            source_file_path: source_file_path.into(),
            ..Self::default()
        }
    }
}
