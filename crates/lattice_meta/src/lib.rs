//! Component metadata pipeline.
//!
//! Converts the structural facts an external parser reports for each
//! component declaration into [`ComponentMeta`] records, derives every
//! boolean feature flag as a pure function of those facts, normalizes
//! style ids and external style paths, and aggregates metadata across a
//! component set into the [`BuildConditionals`] record downstream code
//! generators use to omit unused runtime paths.

pub mod component;
pub mod conditionals;
pub mod extract;
pub mod flags;
pub mod styles;

pub use component::{
    ComponentMeta, Encapsulation, EventMeta, ListenerMeta, ListenerTarget, MethodMeta,
    PropType, PropertyMeta, StateMeta, WatcherMeta,
};
pub use conditionals::{
    get_build_features, get_hydrate_conditionals, set_hydrate_overrides, BuildConditionals,
};
pub use extract::{extract_components, ComponentDecl, StyleDecl};
pub use flags::set_component_flags;
pub use styles::{
    normalize_styles, style_id, ExternalStyle, StyleMeta, StyleSource, DEFAULT_STYLE_MODE,
};
