//! Systems: priority-ordered units of per-tick behavior.
//!
//! A system declares a configuration schema, named queries, and a default
//! priority, then receives lifecycle calls from the world: `init` once at
//! registration, `update` each tick (unless paused), `destroy` at
//! unregistration or world teardown.
//!
//! # Architecture
//!
//! - **[`System`]**: the behavior trait. Registered by type via
//!   [`World::register_system`](crate::world::World::register_system); one
//!   instance per world per type.
//! - **[`SystemContext`]**: the world surface handed to lifecycle calls.
//!   It exposes the full entity/component/query API plus this system's
//!   resolved query handles and reactive [`Config`].
//! - **[`Scheduler`]**: the ordered entry list; ascending priority, stable
//!   on ties, paused entries skipped.
//!
//! # Mid-tick visibility
//!
//! Systems run on the caller's thread, one after another. A mutation made by
//! an earlier system is visible to every later system in the same tick, and
//! query subscribers fire synchronously at the mutation point.
//!
//! ```rust,ignore
//! struct Movement;
//!
//! impl System for Movement {
//!     fn queries(&self, components: &Components) -> Vec<(String, QueryDescriptor)> {
//!         let position = components.id_of("position").expect("registered");
//!         vec![("movers".into(), QueryDescriptor::new().require(position))]
//!     }
//!
//!     fn update(&mut self, ctx: &mut SystemContext<'_>, delta: f64, _time: f64)
//!         -> Result<(), EcsError>
//!     {
//!         let position = ctx.component("position").expect("registered");
//!         for entity in ctx.query("movers")?.to_vec() {
//!             let view = ctx.vector_view_mut(entity, position, "at")?;
//!             view[0] += delta as f32;
//!         }
//!         Ok(())
//!     }
//! }
//! ```

pub mod config;
mod schedule;

pub use config::{CellSubscription, Config, ReactiveCell};
pub use schedule::SystemMeta;
pub(crate) use schedule::{Scheduler, SystemEntry};

use std::collections::HashMap;

use downcast_rs::{Downcast, impl_downcast};

use crate::component::{ComponentId, Components};
use crate::entity::Entity;
use crate::error::EcsError;
use crate::field::{Schema, Value};
use crate::mask::Mask;
use crate::query::{QueryDescriptor, QueryId};
use crate::world::{Core, Globals};

/// A unit of per-tick behavior.
///
/// Every method except `update` has a default; a minimal system is just an
/// `update` body. Registration materializes the declared queries, builds the
/// reactive config from the schema defaults, and calls `init` once.
pub trait System: Downcast {
    /// The schema of this system's reactive configuration.
    fn config_schema(&self) -> Schema {
        Schema::new()
    }

    /// The named queries this system consumes, resolved against the world's
    /// component registry at registration time.
    fn queries(&self, components: &Components) -> Vec<(String, QueryDescriptor)> {
        let _ = components;
        Vec::new()
    }

    /// The default priority when registration does not override it. Lower
    /// runs earlier.
    fn priority(&self) -> i32 {
        0
    }

    /// Called once after registration, before the first tick.
    fn init(&mut self, ctx: &mut SystemContext<'_>) -> Result<(), EcsError> {
        let _ = ctx;
        Ok(())
    }

    /// Called every tick with the externally supplied delta and time.
    fn update(
        &mut self,
        ctx: &mut SystemContext<'_>,
        delta: f64,
        time: f64,
    ) -> Result<(), EcsError>;

    /// Called at unregistration or world teardown.
    fn destroy(&mut self, ctx: &mut SystemContext<'_>) {
        let _ = ctx;
    }
}

impl_downcast!(System);

/// The world surface handed to a system's lifecycle calls.
///
/// Query results borrow from the context; copy them out (`to_vec`) before
/// mutating entities in the same scope.
pub struct SystemContext<'w> {
    core: &'w mut Core,
    queries: &'w HashMap<String, QueryId>,
    config: &'w mut Config,
}

impl<'w> SystemContext<'w> {
    pub(crate) fn new(
        core: &'w mut Core,
        queries: &'w HashMap<String, QueryId>,
        config: &'w mut Config,
    ) -> Self {
        Self {
            core,
            queries,
            config,
        }
    }

    /// The result set of one of this system's declared queries, in
    /// qualification order.
    pub fn query(&self, name: &str) -> Result<&[Entity], EcsError> {
        let id = self
            .query_id(name)
            .ok_or_else(|| EcsError::QueryNotRegistered(name.to_string()))?;
        self.core.queries.entities_of(id)
    }

    /// The handle behind one of this system's declared query names.
    pub fn query_id(&self, name: &str) -> Option<QueryId> {
        self.queries.get(name).copied()
    }

    pub fn create_entity(&mut self) -> Entity {
        self.core.create_entity()
    }

    pub fn destroy_entity(&mut self, entity: Entity) -> Result<(), EcsError> {
        self.core.destroy_entity(entity)
    }

    pub fn add_component(
        &mut self,
        entity: Entity,
        component: ComponentId,
        overrides: &[(&str, Value)],
    ) -> Result<(), EcsError> {
        self.core.add_component(entity, component, overrides)
    }

    pub fn remove_component(
        &mut self,
        entity: Entity,
        component: ComponentId,
    ) -> Result<(), EcsError> {
        self.core.remove_component(entity, component)
    }

    pub fn has_component(&self, entity: Entity, component: ComponentId) -> Result<bool, EcsError> {
        self.core.has_component(entity, component)
    }

    pub fn entity_mask(&self, entity: Entity) -> Result<&Mask, EcsError> {
        self.core.entity_mask(entity)
    }

    pub fn value(
        &self,
        entity: Entity,
        component: ComponentId,
        field: &str,
    ) -> Result<Value, EcsError> {
        self.core.value(entity, component, field)
    }

    pub fn set_value(
        &mut self,
        entity: Entity,
        component: ComponentId,
        field: &str,
        value: Value,
    ) -> Result<(), EcsError> {
        self.core.set_value(entity, component, field, value)
    }

    pub fn vector_view(
        &self,
        entity: Entity,
        component: ComponentId,
        field: &str,
    ) -> Result<&[f32], EcsError> {
        self.core.vector_view(entity, component, field)
    }

    pub fn vector_view_mut(
        &mut self,
        entity: Entity,
        component: ComponentId,
        field: &str,
    ) -> Result<&mut [f32], EcsError> {
        self.core.vector_view_mut(entity, component, field)
    }

    /// Re-evaluate every query's membership for one entity. The explicit
    /// counterpart to `set_value` being a non-signal.
    pub fn refresh_entity(&mut self, entity: Entity) -> Result<(), EcsError> {
        self.core.refresh_entity(entity)
    }

    /// Look up a component id by name.
    pub fn component(&self, name: &str) -> Option<ComponentId> {
        self.core.components.id_of(name)
    }

    /// This system's reactive configuration.
    pub fn config(&self) -> &Config {
        self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        self.config
    }

    /// The world-wide globals mapping.
    pub fn globals(&self) -> &Globals {
        &self.core.globals
    }

    pub fn globals_mut(&mut self) -> &mut Globals {
        &mut self.core.globals
    }
}
