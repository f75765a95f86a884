//! A schema-driven entity-component-system runtime.
//!
//! Components are declared at runtime by named, typed field schemas and
//! stored in columnar per-field buffers. Entities are recyclable slot
//! handles carrying a component bit mask. Queries are registered structural
//! predicates whose result sets are maintained incrementally on every
//! component add/remove. Systems run once per tick in ascending priority
//! order, each with its own reactive configuration.
//!
//! The [`world::World`] type owns everything and is the single entry point:
//!
//! ```rust,ignore
//! let mut world = World::new();
//! let health = world.register_component(
//!     ComponentDescriptor::new("health")
//!         .field("hp", FieldSpec::int16(100).range(0.0, 100.0))?,
//! )?;
//! let wounded = world.register_query(
//!     QueryDescriptor::new()
//!         .require(health)
//!         .filter(health, "hp", CompareOp::Lt, Value::Int16(50)),
//! )?;
//! world.register_system::<Regeneration>(None)?;
//! world.update(delta, time)?;
//! ```

pub mod component;
pub mod entity;
pub mod error;
pub mod field;
pub mod mask;
pub mod query;
pub(crate) mod storage;
pub mod system;
pub mod world;

pub use component::{ComponentDescriptor, ComponentId, Components};
pub use entity::{Entities, Entity, Generation};
pub use error::{EcsError, checks_enabled, set_checks_enabled};
pub use field::{FieldKind, FieldSpec, Range, Schema, Value};
pub use mask::Mask;
pub use query::{
    CompareOp, Predicate, Queries, QueryDescriptor, QueryEvent, QueryId, SubscriptionId,
};
pub use system::{
    CellSubscription, Config, ReactiveCell, System, SystemContext, SystemMeta,
};
pub use world::{Globals, World, WorldOptions};
