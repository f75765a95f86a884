//! The World is the central container for entities, components, queries, and
//! systems.
//!
//! A `World` owns every subsystem of the runtime and is the only public
//! entry point for mutating it. All access happens on the thread that
//! created the world; ticking is a plain in-order walk over the registered
//! systems.
//!
//! # Architecture
//!
//! The world coordinates four subsystems:
//! - **[`Entities`]**: slot allocation, recycling, and the per-entity
//!   component mask
//! - **[`Components`]**: schema registration and columnar field storage
//! - **[`Queries`]**: registered predicates with incrementally maintained
//!   result sets
//! - **Scheduler**: the priority-ordered system list driven by
//!   [`update`](World::update)
//!
//! # Example
//!
//! ```rust,ignore
//! let mut world = World::new();
//!
//! let position = world.register_component(
//!     ComponentDescriptor::new("position").field("at", FieldSpec::vec2([0.0, 0.0]))?,
//! )?;
//!
//! let entity = world.create_entity();
//! world.add_component(entity, position, &[("at", Value::Vec2([3.0, 4.0]))])?;
//!
//! let movers = world.register_query(QueryDescriptor::new().require(position))?;
//! assert_eq!(world.query_entities(movers)?, &[entity]);
//!
//! world.update(1.0 / 60.0, 0.0)?;
//! ```

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;

use log::{debug, warn};

use crate::component::{ComponentDescriptor, ComponentId, Components};
use crate::entity::{Entities, Entity};
use crate::error::{EcsError, checks_enabled};
use crate::field::Value;
use crate::mask::Mask;
use crate::query::{Queries, QueryDescriptor, QueryEvent, QueryId, SubscriptionId};
use crate::system::{Config, Scheduler, System, SystemContext, SystemEntry, SystemMeta};

/// Construction options for a [`World`].
#[derive(Debug, Clone)]
pub struct WorldOptions {
    /// Initial entity capacity; every component column is pre-sized to it.
    /// The world doubles the capacity when allocation exceeds it.
    pub entity_capacity: usize,
}

impl Default for WorldOptions {
    fn default() -> Self {
        Self {
            entity_capacity: 1024,
        }
    }
}

/// An open string-keyed mapping shared by all systems.
///
/// Values are arbitrary; readers name the concrete type they expect.
#[derive(Default)]
pub struct Globals {
    values: HashMap<String, Box<dyn Any>>,
}

impl Globals {
    /// Store a value under a key, replacing any previous value.
    pub fn set<T: 'static>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// Read a value, if present and of the expected type.
    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn get_mut<T: 'static>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    /// Remove a key; false if it was absent.
    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// The non-scheduler half of the world: entities, components, queries, and
/// globals. Split out so a ticking system can borrow the data side while the
/// scheduler entry it lives in stays borrowed separately.
pub(crate) struct Core {
    capacity: usize,
    pub(crate) entities: Entities,
    pub(crate) components: Components,
    pub(crate) queries: Queries,
    pub(crate) globals: Globals,
}

impl Core {
    fn new(options: &WorldOptions) -> Self {
        let capacity = options.entity_capacity.max(1);
        Self {
            capacity,
            entities: Entities::new(),
            components: Components::new(capacity),
            queries: Queries::new(),
            globals: Globals::default(),
        }
    }

    pub(crate) fn create_entity(&mut self) -> Entity {
        if self.entities.next_spawn_is_fresh() && self.entities.slot_count() >= self.capacity {
            let capacity = self.capacity * 2;
            debug!(
                "growing entity capacity from {} to {capacity}",
                self.capacity
            );
            self.components.grow(capacity);
            self.capacity = capacity;
        }
        self.entities.spawn()
    }

    pub(crate) fn destroy_entity(&mut self, entity: Entity) -> Result<(), EcsError> {
        self.entities.ensure_active(entity)?;
        let final_mask = self.entities.mask_at(entity.index()).clone();
        self.entities.release(entity)?;
        self.queries.reset_entity(entity, &final_mask);
        Ok(())
    }

    pub(crate) fn add_component(
        &mut self,
        entity: Entity,
        component: ComponentId,
        overrides: &[(&str, Value)],
    ) -> Result<(), EcsError> {
        self.entities.ensure_active(entity)?;
        self.components.ensure(component)?;
        self.components
            .record_mut(component)
            .attach(entity.index(), overrides)?;
        self.entities
            .mask_at_mut(entity.index())
            .insert(component.index());
        self.queries
            .update_entity(entity, Some(component), &self.entities, &self.components);
        Ok(())
    }

    pub(crate) fn remove_component(
        &mut self,
        entity: Entity,
        component: ComponentId,
    ) -> Result<(), EcsError> {
        self.entities.ensure_active(entity)?;
        self.components.ensure(component)?;
        if !self
            .entities
            .mask_at(entity.index())
            .contains(component.index())
        {
            return Ok(());
        }
        self.entities
            .mask_at_mut(entity.index())
            .remove(component.index());
        self.queries
            .update_entity(entity, Some(component), &self.entities, &self.components);
        Ok(())
    }

    pub(crate) fn has_component(
        &self,
        entity: Entity,
        component: ComponentId,
    ) -> Result<bool, EcsError> {
        self.entities.ensure_active(entity)?;
        self.components.ensure(component)?;
        Ok(self
            .entities
            .mask_at(entity.index())
            .contains(component.index()))
    }

    pub(crate) fn components_of(&self, entity: Entity) -> Result<Vec<ComponentId>, EcsError> {
        self.entities.ensure_active(entity)?;
        Ok(self
            .entities
            .mask_at(entity.index())
            .ones()
            .map(|bit| ComponentId::new(bit as u32))
            .collect())
    }

    pub(crate) fn entity_mask(&self, entity: Entity) -> Result<&Mask, EcsError> {
        self.entities.ensure_active(entity)?;
        Ok(self.entities.mask_at(entity.index()))
    }

    pub(crate) fn value(
        &self,
        entity: Entity,
        component: ComponentId,
        field: &str,
    ) -> Result<Value, EcsError> {
        self.entities.ensure_active(entity)?;
        self.components.ensure(component)?;
        self.components
            .record(component)
            .value(entity.index(), field, &self.entities)
    }

    pub(crate) fn set_value(
        &mut self,
        entity: Entity,
        component: ComponentId,
        field: &str,
        value: Value,
    ) -> Result<(), EcsError> {
        self.entities.ensure_active(entity)?;
        self.components.ensure(component)?;
        self.components
            .record_mut(component)
            .set_value(entity.index(), field, &value)
    }

    pub(crate) fn vector_view(
        &self,
        entity: Entity,
        component: ComponentId,
        field: &str,
    ) -> Result<&[f32], EcsError> {
        self.entities.ensure_active(entity)?;
        self.components.ensure(component)?;
        self.components
            .record(component)
            .vector_view(entity.index(), field)
    }

    pub(crate) fn vector_view_mut(
        &mut self,
        entity: Entity,
        component: ComponentId,
        field: &str,
    ) -> Result<&mut [f32], EcsError> {
        self.entities.ensure_active(entity)?;
        self.components.ensure(component)?;
        self.components
            .record_mut(component)
            .vector_view_mut(entity.index(), field)
    }

    pub(crate) fn refresh_entity(&mut self, entity: Entity) -> Result<(), EcsError> {
        self.entities.ensure_active(entity)?;
        self.queries
            .update_entity(entity, None, &self.entities, &self.components);
        Ok(())
    }
}

/// The central container of the runtime.
pub struct World {
    core: Core,
    scheduler: Scheduler,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self::with_options(WorldOptions::default())
    }

    pub fn with_options(options: WorldOptions) -> Self {
        Self {
            core: Core::new(&options),
            scheduler: Scheduler::default(),
        }
    }

    // ---- components ----

    /// Register a component and get its dense id.
    pub fn register_component(
        &mut self,
        descriptor: ComponentDescriptor,
    ) -> Result<ComponentId, EcsError> {
        self.core.components.register(descriptor)
    }

    /// Look up a component id by its stable name.
    pub fn component(&self, name: &str) -> Option<ComponentId> {
        self.core.components.id_of(name)
    }

    pub fn component_name(&self, id: ComponentId) -> Option<&str> {
        self.core.components.name_of(id)
    }

    /// The single-bit mask of a registered component.
    pub fn component_mask(&self, id: ComponentId) -> Option<&Mask> {
        self.core
            .components
            .contains(id)
            .then(|| self.core.components.record(id).mask())
    }

    /// Every registered component id, in registration order.
    pub fn component_ids(&self) -> Vec<ComponentId> {
        self.core.components.ids().collect()
    }

    // ---- entities ----

    /// Allocate a live entity with an empty mask.
    pub fn create_entity(&mut self) -> Entity {
        self.core.create_entity()
    }

    /// Destroy a live entity: its mask clears, every query drops it (firing
    /// disqualify), and its slot is pooled for reuse.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<(), EcsError> {
        self.core.destroy_entity(entity)
    }

    /// Attach a component, writing `overrides` over the schema defaults.
    /// Re-attaching an already-present component rewrites the row and
    /// re-evaluates the affected queries.
    pub fn add_component(
        &mut self,
        entity: Entity,
        component: ComponentId,
        overrides: &[(&str, Value)],
    ) -> Result<(), EcsError> {
        self.core.add_component(entity, component, overrides)
    }

    /// Detach a component. The column cells stay dormant until the next
    /// attach; detaching an absent component is a no-op.
    pub fn remove_component(
        &mut self,
        entity: Entity,
        component: ComponentId,
    ) -> Result<(), EcsError> {
        self.core.remove_component(entity, component)
    }

    pub fn has_component(
        &self,
        entity: Entity,
        component: ComponentId,
    ) -> Result<bool, EcsError> {
        self.core.has_component(entity, component)
    }

    /// The ids of every component attached to an entity.
    pub fn components_of(&self, entity: Entity) -> Result<Vec<ComponentId>, EcsError> {
        self.core.components_of(entity)
    }

    /// The component mask of a live entity.
    pub fn entity_mask(&self, entity: Entity) -> Result<&Mask, EcsError> {
        self.core.entity_mask(entity)
    }

    /// Read one field of one component of one entity.
    pub fn value(
        &self,
        entity: Entity,
        component: ComponentId,
        field: &str,
    ) -> Result<Value, EcsError> {
        self.core.value(entity, component, field)
    }

    /// Write one field. Queries do not observe value writes; see
    /// [`refresh_entity`](World::refresh_entity).
    pub fn set_value(
        &mut self,
        entity: Entity,
        component: ComponentId,
        field: &str,
        value: Value,
    ) -> Result<(), EcsError> {
        self.core.set_value(entity, component, field, value)
    }

    /// Borrow one entity's lanes of a vector field.
    pub fn vector_view(
        &self,
        entity: Entity,
        component: ComponentId,
        field: &str,
    ) -> Result<&[f32], EcsError> {
        self.core.vector_view(entity, component, field)
    }

    /// Mutably borrow one entity's lanes of a vector field. Writes through
    /// the view are immediately visible to [`value`](World::value).
    pub fn vector_view_mut(
        &mut self,
        entity: Entity,
        component: ComponentId,
        field: &str,
    ) -> Result<&mut [f32], EcsError> {
        self.core.vector_view_mut(entity, component, field)
    }

    /// Re-evaluate every query's membership for one entity. The explicit
    /// counterpart to `set_value` being a non-signal for value predicates.
    pub fn refresh_entity(&mut self, entity: Entity) -> Result<(), EcsError> {
        self.core.refresh_entity(entity)
    }

    /// The live entity currently occupying a raw slot index, if any.
    pub fn entity_at(&self, index: usize) -> Option<Entity> {
        self.core.entities.at(index)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.core.entities.len()
    }

    /// Current entity capacity (column pre-size).
    pub fn entity_capacity(&self) -> usize {
        self.core.capacity
    }

    // ---- queries ----

    /// Register a query, or return the existing one with the same canonical
    /// identity.
    pub fn register_query(&mut self, descriptor: QueryDescriptor) -> Result<QueryId, EcsError> {
        self.core
            .queries
            .register(descriptor, &self.core.entities, &self.core.components)
    }

    /// The live result set, in qualification order.
    pub fn query_entities(&self, query: QueryId) -> Result<&[Entity], EcsError> {
        self.core.queries.entities_of(query)
    }

    /// Whether an entity currently satisfies a query's predicate.
    pub fn query_matches(&self, query: QueryId, entity: Entity) -> Result<bool, EcsError> {
        self.core
            .queries
            .matches(query, entity, &self.core.entities, &self.core.components)
    }

    /// Subscribe to one edge of a query's result set. The callback fires
    /// synchronously at the mutation that moves the entity over the edge.
    pub fn subscribe(
        &mut self,
        query: QueryId,
        event: QueryEvent,
        callback: impl FnMut(Entity) + 'static,
    ) -> Result<SubscriptionId, EcsError> {
        self.core.queries.subscribe(query, event, Box::new(callback))
    }

    pub fn unsubscribe(
        &mut self,
        query: QueryId,
        event: QueryEvent,
        subscription: SubscriptionId,
    ) -> Result<bool, EcsError> {
        self.core.queries.unsubscribe(query, event, subscription)
    }

    /// Every registered query id, in registration order.
    pub fn query_ids(&self) -> Vec<QueryId> {
        self.core.queries.ids().collect()
    }

    /// The canonical key of a registered query.
    pub fn query_key(&self, query: QueryId) -> Option<&str> {
        self.core.queries.key_of(query)
    }

    // ---- systems ----

    /// Register a system type: materialize its declared queries, build its
    /// reactive config from the schema defaults, and run `init` once. An
    /// explicit `priority` overrides the system's own default.
    pub fn register_system<S: System + Default>(
        &mut self,
        priority: Option<i32>,
    ) -> Result<(), EcsError> {
        let type_id = TypeId::of::<S>();
        if checks_enabled() && self.scheduler.contains(type_id) {
            return Err(EcsError::SystemAlreadyRegistered(type_name::<S>()));
        }

        let system = S::default();

        let schema = system.config_schema();
        if checks_enabled() {
            schema.validate()?;
        }
        let config = Config::from_schema(schema);

        let mut queries = HashMap::new();
        for (name, descriptor) in system.queries(&self.core.components) {
            let id = self.core.queries.register(
                descriptor,
                &self.core.entities,
                &self.core.components,
            )?;
            queries.insert(name, id);
        }

        let priority = priority.unwrap_or_else(|| system.priority());
        let mut entry = SystemEntry {
            type_id,
            name: type_name::<S>(),
            system: Box::new(system),
            priority,
            sequence: self.scheduler.next_sequence(),
            paused: false,
            queries,
            config,
        };

        {
            let SystemEntry {
                system,
                queries,
                config,
                ..
            } = &mut entry;
            let mut ctx = SystemContext::new(&mut self.core, queries, config);
            system.init(&mut ctx)?;
        }

        debug!(
            "registered system `{}` at priority {}",
            entry.name, entry.priority
        );
        self.scheduler.insert(entry);
        Ok(())
    }

    /// Unregister a system type, running its `destroy` hook. False if the
    /// type was never registered.
    pub fn unregister_system<S: System>(&mut self) -> bool {
        let Some(mut entry) = self.scheduler.remove(TypeId::of::<S>()) else {
            warn!("unregister of unknown system `{}`", type_name::<S>());
            return false;
        };
        let SystemEntry {
            system,
            queries,
            config,
            ..
        } = &mut entry;
        let mut ctx = SystemContext::new(&mut self.core, queries, config);
        system.destroy(&mut ctx);
        true
    }

    /// Borrow a registered system instance.
    pub fn system<S: System>(&self) -> Option<&S> {
        self.scheduler
            .entry(TypeId::of::<S>())
            .and_then(|entry| entry.system.downcast_ref::<S>())
    }

    pub fn system_mut<S: System>(&mut self) -> Option<&mut S> {
        self.scheduler
            .entry_mut(TypeId::of::<S>())
            .and_then(|entry| entry.system.downcast_mut::<S>())
    }

    /// Summaries of every registered system, in execution order.
    pub fn systems(&self) -> Vec<SystemMeta> {
        self.scheduler.metas()
    }

    /// Resume a paused system. False if the type is not registered.
    pub fn play_system<S: System>(&mut self) -> bool {
        match self.scheduler.entry_mut(TypeId::of::<S>()) {
            Some(entry) => {
                entry.paused = false;
                true
            }
            None => false,
        }
    }

    /// Pause a system; paused systems are skipped entirely by
    /// [`update`](World::update). False if the type is not registered.
    pub fn stop_system<S: System>(&mut self) -> bool {
        match self.scheduler.entry_mut(TypeId::of::<S>()) {
            Some(entry) => {
                entry.paused = true;
                true
            }
            None => false,
        }
    }

    pub fn system_paused<S: System>(&self) -> Option<bool> {
        self.scheduler
            .entry(TypeId::of::<S>())
            .map(|entry| entry.paused)
    }

    /// Write one field of a system's reactive config, validated against its
    /// schema. Subscribers fire synchronously; returns false when the value
    /// was unchanged.
    pub fn configure_system<S: System>(
        &mut self,
        field: &str,
        value: Value,
    ) -> Result<bool, EcsError> {
        let Some(entry) = self.scheduler.entry_mut(TypeId::of::<S>()) else {
            return Err(EcsError::SystemNotRegistered(type_name::<S>()));
        };
        entry.config.write_validated(entry.name, field, value)
    }

    pub fn system_config<S: System>(&self) -> Option<&Config> {
        self.scheduler
            .entry(TypeId::of::<S>())
            .map(|entry| &entry.config)
    }

    pub fn system_config_mut<S: System>(&mut self) -> Option<&mut Config> {
        self.scheduler
            .entry_mut(TypeId::of::<S>())
            .map(|entry| &mut entry.config)
    }

    // ---- tick ----

    /// Run one tick: every unpaused system in ascending priority order,
    /// stable on ties. The first error aborts the remainder of the tick and
    /// propagates.
    pub fn update(&mut self, delta: f64, time: f64) -> Result<(), EcsError> {
        let mut entries = self.scheduler.take();
        let mut result = Ok(());
        for entry in entries.iter_mut() {
            if entry.paused {
                continue;
            }
            let SystemEntry {
                system,
                queries,
                config,
                ..
            } = entry;
            let mut ctx = SystemContext::new(&mut self.core, queries, config);
            if let Err(error) = system.update(&mut ctx, delta, time) {
                result = Err(error);
                break;
            }
        }
        self.scheduler.restore(entries);
        result
    }

    // ---- globals ----

    /// The open mapping shared by all systems.
    pub fn globals(&self) -> &Globals {
        &self.core.globals
    }

    pub fn globals_mut(&mut self) -> &mut Globals {
        &mut self.core.globals
    }
}

impl Drop for World {
    /// World teardown runs every remaining system's `destroy` hook.
    fn drop(&mut self) {
        let mut entries = self.scheduler.take();
        for entry in entries.iter_mut() {
            let SystemEntry {
                system,
                queries,
                config,
                ..
            } = entry;
            let mut ctx = SystemContext::new(&mut self.core, queries, config);
            system.destroy(&mut ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::field::FieldSpec;
    use crate::query::CompareOp;

    /// Components `a` (int16 x = 0) and `b` (bool flag = false).
    fn world_with_ab() -> (World, ComponentId, ComponentId) {
        let mut world = World::new();
        let a = world
            .register_component(
                ComponentDescriptor::new("a")
                    .field("x", FieldSpec::int16(0))
                    .unwrap(),
            )
            .unwrap();
        let b = world
            .register_component(
                ComponentDescriptor::new("b")
                    .field("flag", FieldSpec::boolean(false))
                    .unwrap(),
            )
            .unwrap();
        (world, a, b)
    }

    #[test]
    fn query_membership_tracks_adds_and_removes() {
        // Given
        let (mut world, a, b) = world_with_ab();
        let query = world
            .register_query(QueryDescriptor::new().require(a))
            .unwrap();

        let e1 = world.create_entity();
        let e2 = world.create_entity();
        let e3 = world.create_entity();

        let disqualified = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&disqualified);
        world
            .subscribe(query, QueryEvent::Disqualify, move |e| {
                sink.borrow_mut().push(e)
            })
            .unwrap();

        // When
        world.add_component(e1, a, &[]).unwrap();
        world.add_component(e2, a, &[]).unwrap();
        world.add_component(e3, a, &[]).unwrap();
        world.add_component(e3, b, &[]).unwrap();

        // Then
        assert_eq!(world.query_entities(query).unwrap(), &[e1, e2, e3]);

        // When
        world.remove_component(e2, a).unwrap();

        // Then - e2 left, with exactly one disqualify
        assert_eq!(world.query_entities(query).unwrap(), &[e1, e3]);
        assert_eq!(disqualified.borrow().as_slice(), &[e2]);
    }

    #[test]
    fn excluded_set_disqualifies_on_gain() {
        // Given
        let (mut world, a, b) = world_with_ab();
        let query = world
            .register_query(QueryDescriptor::new().require(a).exclude(b))
            .unwrap();

        let e1 = world.create_entity();
        let e2 = world.create_entity();
        let e3 = world.create_entity();
        world.add_component(e1, a, &[]).unwrap();
        world.add_component(e2, a, &[]).unwrap();
        world.add_component(e3, a, &[]).unwrap();
        world.add_component(e3, b, &[]).unwrap();

        assert_eq!(world.query_entities(query).unwrap(), &[e1, e2]);

        // When
        world.add_component(e2, b, &[]).unwrap();

        // Then
        assert_eq!(world.query_entities(query).unwrap(), &[e1]);
    }

    #[test]
    fn value_predicates_ignore_raw_writes_until_refresh() {
        // Given
        let (mut world, a, _) = world_with_ab();
        let query = world
            .register_query(QueryDescriptor::new().require(a).filter(
                a,
                "x",
                CompareOp::Gt,
                Value::Int16(10),
            ))
            .unwrap();

        let spawned: Vec<Entity> = [5i16, 10, 11, 50]
            .iter()
            .map(|v| {
                let e = world.create_entity();
                world
                    .add_component(e, a, &[("x", Value::Int16(*v))])
                    .unwrap();
                e
            })
            .collect();

        // Then
        assert_eq!(
            world.query_entities(query).unwrap(),
            &[spawned[2], spawned[3]]
        );

        // When - a raw value write; no membership change
        world
            .set_value(spawned[0], a, "x", Value::Int16(100))
            .unwrap();

        // Then - the set is stale by contract
        assert_eq!(world.query_entities(query).unwrap().len(), 2);
        assert!(world.query_matches(query, spawned[0]).unwrap());

        // When - explicit refresh
        world.refresh_entity(spawned[0]).unwrap();

        // Then
        assert_eq!(world.query_entities(query).unwrap().len(), 3);
    }

    #[test]
    fn reattach_reevaluates_value_predicates() {
        // Given
        let (mut world, a, _) = world_with_ab();
        let query = world
            .register_query(QueryDescriptor::new().require(a).filter(
                a,
                "x",
                CompareOp::Ge,
                Value::Int16(10),
            ))
            .unwrap();

        let e = world.create_entity();
        world.add_component(e, a, &[("x", Value::Int16(3))]).unwrap();
        assert!(world.query_entities(query).unwrap().is_empty());

        // When - re-attaching rewrites the row and re-indexes
        world
            .add_component(e, a, &[("x", Value::Int16(25))])
            .unwrap();

        // Then
        assert_eq!(world.query_entities(query).unwrap(), &[e]);
    }

    #[test]
    fn vector_views_alias_column_storage() {
        // Given
        let mut world = World::new();
        let p = world
            .register_component(
                ComponentDescriptor::new("p")
                    .field("pos", FieldSpec::vec3([0.0, 0.0, 0.0]))
                    .unwrap(),
            )
            .unwrap();
        let e = world.create_entity();
        world.add_component(e, p, &[]).unwrap();

        // When - write through the view
        world
            .vector_view_mut(e, p, "pos")
            .unwrap()
            .copy_from_slice(&[1.0, 2.0, 3.0]);

        // Then - visible through value(), and the other way around
        assert_eq!(
            world.value(e, p, "pos").unwrap(),
            Value::Vec3([1.0, 2.0, 3.0])
        );
        world
            .set_value(e, p, "pos", Value::Vec3([9.0, 9.0, 9.0]))
            .unwrap();
        assert_eq!(world.vector_view(e, p, "pos").unwrap(), &[9.0, 9.0, 9.0]);

        // When - the component is removed and re-attached
        world.remove_component(e, p).unwrap();
        assert!(!world.has_component(e, p).unwrap());
        world.add_component(e, p, &[]).unwrap();

        // Then - the fresh attach rewrote the defaults
        assert_eq!(world.vector_view(e, p, "pos").unwrap(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn slot_recycling_reuses_index_with_next_generation() {
        // Given
        let (mut world, a, _) = world_with_ab();
        let e1 = world.create_entity();
        world.add_component(e1, a, &[]).unwrap();

        // When
        world.destroy_entity(e1).unwrap();
        let e2 = world.create_entity();

        // Then
        assert_eq!(e2.index(), e1.index());
        assert_eq!(e2.generation(), e1.generation().next());
        assert!(world.entity_mask(e2).unwrap().is_empty());

        // And the slot table resolves to the new occupant
        assert_eq!(world.entity_at(e1.index()), Some(e2));
        assert!(!world.has_component(e2, a).unwrap());
    }

    #[test]
    fn add_remove_round_trip_leaves_no_residue() {
        // Given
        let (mut world, a, _) = world_with_ab();
        let e = world.create_entity();

        // When
        world
            .add_component(e, a, &[("x", Value::Int16(77))])
            .unwrap();
        world.remove_component(e, a).unwrap();

        // Then
        assert!(!world.has_component(e, a).unwrap());
        assert!(world.components_of(e).unwrap().is_empty());

        // When - a fresh attach with no override
        world.add_component(e, a, &[]).unwrap();

        // Then - the default, not the dormant 77
        assert_eq!(world.value(e, a, "x").unwrap(), Value::Int16(0));
    }

    #[test]
    fn operations_on_destroyed_entities_fail() {
        // Given
        let (mut world, a, _) = world_with_ab();
        let e = world.create_entity();
        world.add_component(e, a, &[]).unwrap();
        world.destroy_entity(e).unwrap();

        // Then - every mutation and read through the stale handle fails
        assert!(matches!(
            world.add_component(e, a, &[]),
            Err(EcsError::ModifyDestroyedEntity(_))
        ));
        assert!(matches!(
            world.remove_component(e, a),
            Err(EcsError::ModifyDestroyedEntity(_))
        ));
        assert!(matches!(
            world.has_component(e, a),
            Err(EcsError::ModifyDestroyedEntity(_))
        ));
        assert!(matches!(
            world.value(e, a, "x"),
            Err(EcsError::ModifyDestroyedEntity(_))
        ));
        assert!(matches!(
            world.destroy_entity(e),
            Err(EcsError::ModifyDestroyedEntity(_))
        ));
    }

    #[test]
    fn destroy_fires_disqualify_for_every_containing_query() {
        // Given
        let (mut world, a, b) = world_with_ab();
        let by_a = world
            .register_query(QueryDescriptor::new().require(a))
            .unwrap();
        let by_b = world
            .register_query(QueryDescriptor::new().require(b))
            .unwrap();

        let e = world.create_entity();
        world.add_component(e, a, &[]).unwrap();
        world.add_component(e, b, &[]).unwrap();

        let count = Rc::new(RefCell::new(0));
        for query in [by_a, by_b] {
            let sink = Rc::clone(&count);
            world
                .subscribe(query, QueryEvent::Disqualify, move |_| {
                    *sink.borrow_mut() += 1
                })
                .unwrap();
        }

        // When
        world.destroy_entity(e).unwrap();

        // Then
        assert_eq!(*count.borrow(), 2);
        assert!(world.query_entities(by_a).unwrap().is_empty());
        assert!(world.query_entities(by_b).unwrap().is_empty());
    }

    #[test]
    fn query_registration_is_deduplicated() {
        // Given
        let (mut world, a, b) = world_with_ab();

        // When
        let first = world
            .register_query(QueryDescriptor::new().require(a).require(b))
            .unwrap();
        let second = world
            .register_query(QueryDescriptor::new().require(b).require(a))
            .unwrap();

        // Then
        assert_eq!(first, second);
        assert_eq!(world.query_ids().len(), 1);
    }

    #[test]
    fn duplicate_registrations_fail() {
        // Given
        let (mut world, _, _) = world_with_ab();

        // Then
        assert!(matches!(
            world.register_component(ComponentDescriptor::new("a")),
            Err(EcsError::ComponentAlreadyRegistered(_))
        ));

        #[derive(Default)]
        struct Noop;
        impl System for Noop {
            fn update(
                &mut self,
                _ctx: &mut SystemContext<'_>,
                _delta: f64,
                _time: f64,
            ) -> Result<(), EcsError> {
                Ok(())
            }
        }

        world.register_system::<Noop>(None).unwrap();
        assert!(matches!(
            world.register_system::<Noop>(None),
            Err(EcsError::SystemAlreadyRegistered(_))
        ));
    }

    // ---- scheduling ----

    #[derive(Default)]
    struct TraceHi;

    #[derive(Default)]
    struct TraceLo;

    fn push_trace(ctx: &mut SystemContext<'_>, name: &'static str) {
        if let Some(trace) = ctx.globals_mut().get_mut::<Vec<&'static str>>("trace") {
            trace.push(name);
        }
    }

    impl System for TraceHi {
        fn priority(&self) -> i32 {
            0
        }

        fn update(
            &mut self,
            ctx: &mut SystemContext<'_>,
            _delta: f64,
            _time: f64,
        ) -> Result<(), EcsError> {
            push_trace(ctx, "hi");
            Ok(())
        }
    }

    impl System for TraceLo {
        fn priority(&self) -> i32 {
            10
        }

        fn update(
            &mut self,
            ctx: &mut SystemContext<'_>,
            _delta: f64,
            _time: f64,
        ) -> Result<(), EcsError> {
            push_trace(ctx, "lo");
            Ok(())
        }
    }

    #[test]
    fn systems_run_in_priority_order_and_skip_paused() {
        // Given - registered out of priority order
        let mut world = World::new();
        world.globals_mut().set("trace", Vec::<&'static str>::new());
        world.register_system::<TraceLo>(None).unwrap();
        world.register_system::<TraceHi>(None).unwrap();

        // When
        world.update(0.0, 0.0).unwrap();

        // Then
        assert_eq!(
            world.globals().get::<Vec<&'static str>>("trace").unwrap(),
            &vec!["hi", "lo"]
        );

        // When - the high-priority system is stopped
        assert!(world.stop_system::<TraceHi>());
        world.globals_mut().set("trace", Vec::<&'static str>::new());
        world.update(0.0, 0.0).unwrap();

        // Then
        assert_eq!(
            world.globals().get::<Vec<&'static str>>("trace").unwrap(),
            &vec!["lo"]
        );
        assert_eq!(world.system_paused::<TraceHi>(), Some(true));

        // When - resumed
        assert!(world.play_system::<TraceHi>());
        world.globals_mut().set("trace", Vec::<&'static str>::new());
        world.update(0.0, 0.0).unwrap();

        // Then
        assert_eq!(
            world.globals().get::<Vec<&'static str>>("trace").unwrap(),
            &vec!["hi", "lo"]
        );
    }

    #[test]
    fn explicit_priority_overrides_and_ties_stay_stable() {
        // Given - TraceLo forced ahead of TraceHi, tie broken by order
        let mut world = World::new();
        world.globals_mut().set("trace", Vec::<&'static str>::new());
        world.register_system::<TraceLo>(Some(0)).unwrap();
        world.register_system::<TraceHi>(Some(0)).unwrap();

        // When
        world.update(0.0, 0.0).unwrap();

        // Then - same priority, registration order wins
        assert_eq!(
            world.globals().get::<Vec<&'static str>>("trace").unwrap(),
            &vec!["lo", "hi"]
        );

        let metas = world.systems();
        assert_eq!(metas.len(), 2);
        assert!(metas[0].name.contains("TraceLo"));
        assert!(metas[1].name.contains("TraceHi"));
    }

    #[test]
    fn mid_tick_mutations_are_visible_to_later_systems() {
        // Given - an early system spawns a tagged entity; a later system
        // counts the query in the same tick.
        #[derive(Default)]
        struct Spawner;
        impl System for Spawner {
            fn priority(&self) -> i32 {
                0
            }
            fn update(
                &mut self,
                ctx: &mut SystemContext<'_>,
                _delta: f64,
                _time: f64,
            ) -> Result<(), EcsError> {
                let tag = ctx.component("a").expect("registered");
                let entity = ctx.create_entity();
                ctx.add_component(entity, tag, &[])?;
                Ok(())
            }
        }

        #[derive(Default)]
        struct Counter;
        impl System for Counter {
            fn priority(&self) -> i32 {
                10
            }
            fn queries(&self, components: &Components) -> Vec<(String, QueryDescriptor)> {
                let tag = components.id_of("a").expect("registered");
                vec![("tagged".into(), QueryDescriptor::new().require(tag))]
            }
            fn update(
                &mut self,
                ctx: &mut SystemContext<'_>,
                _delta: f64,
                _time: f64,
            ) -> Result<(), EcsError> {
                let seen = ctx.query("tagged")?.len();
                ctx.globals_mut().set("seen", seen);
                Ok(())
            }
        }

        let (mut world, _, _) = world_with_ab();
        world.register_system::<Spawner>(None).unwrap();
        world.register_system::<Counter>(None).unwrap();

        // When
        world.update(0.0, 0.0).unwrap();

        // Then - the entity spawned earlier in the tick was counted
        assert_eq!(world.globals().get::<usize>("seen"), Some(&1));
    }

    #[test]
    fn reactive_config_reaches_a_running_system() {
        // Given - a system that mirrors its `scale` config into a global,
        // and counts change notifications via an init-time subscriber.
        #[derive(Default)]
        struct Scaled;
        impl System for Scaled {
            fn config_schema(&self) -> crate::field::Schema {
                crate::field::Schema::new()
                    .field("scale", FieldSpec::float64(1.0))
                    .unwrap()
            }
            fn init(&mut self, ctx: &mut SystemContext<'_>) -> Result<(), EcsError> {
                let changes = Rc::new(RefCell::new(0));
                ctx.globals_mut().set("changes", Rc::clone(&changes));
                if let Some(cell) = ctx.config_mut().cell_mut("scale") {
                    cell.subscribe(move |_| *changes.borrow_mut() += 1);
                }
                Ok(())
            }
            fn update(
                &mut self,
                ctx: &mut SystemContext<'_>,
                _delta: f64,
                _time: f64,
            ) -> Result<(), EcsError> {
                let scale = match ctx.config().read("scale") {
                    Some(Value::Float64(v)) => *v,
                    _ => 0.0,
                };
                ctx.globals_mut().set("scale_seen", scale);
                Ok(())
            }
        }

        let mut world = World::new();
        world.register_system::<Scaled>(None).unwrap();

        // When - first tick with the schema default
        world.update(0.0, 0.0).unwrap();
        assert_eq!(world.globals().get::<f64>("scale_seen"), Some(&1.0));

        // When - reconfigured between ticks
        assert!(world
            .configure_system::<Scaled>("scale", Value::Float64(2.5))
            .unwrap());
        world.update(0.0, 1.0).unwrap();

        // Then
        assert_eq!(world.globals().get::<f64>("scale_seen"), Some(&2.5));

        // And - the equal rewrite was coalesced: one notification only
        assert!(!world
            .configure_system::<Scaled>("scale", Value::Float64(2.5))
            .unwrap());
        let changes = world
            .globals()
            .get::<Rc<RefCell<i32>>>("changes")
            .unwrap();
        assert_eq!(*changes.borrow(), 1);

        // And - schema validation applies to reconfiguration
        assert!(matches!(
            world.configure_system::<Scaled>("scale", Value::Int8(1)),
            Err(EcsError::TypeNotSupported { .. })
        ));
        assert!(matches!(
            world.configure_system::<TraceHi>("scale", Value::Float64(1.0)),
            Err(EcsError::SystemNotRegistered(_))
        ));
    }

    #[test]
    fn unregister_runs_destroy_and_removes_from_order() {
        // Given
        #[derive(Default)]
        struct Ephemeral;
        impl System for Ephemeral {
            fn init(&mut self, ctx: &mut SystemContext<'_>) -> Result<(), EcsError> {
                ctx.globals_mut().set("inits", 1usize);
                Ok(())
            }
            fn update(
                &mut self,
                _ctx: &mut SystemContext<'_>,
                _delta: f64,
                _time: f64,
            ) -> Result<(), EcsError> {
                Ok(())
            }
            fn destroy(&mut self, ctx: &mut SystemContext<'_>) {
                ctx.globals_mut().set("destroyed", true);
            }
        }

        let mut world = World::new();
        world.register_system::<Ephemeral>(None).unwrap();
        assert_eq!(world.globals().get::<usize>("inits"), Some(&1));
        assert!(world.system::<Ephemeral>().is_some());

        // When
        assert!(world.unregister_system::<Ephemeral>());

        // Then
        assert_eq!(world.globals().get::<bool>("destroyed"), Some(&true));
        assert!(world.system::<Ephemeral>().is_none());
        assert!(world.systems().is_empty());
        assert!(!world.unregister_system::<Ephemeral>());
    }

    #[test]
    fn failing_system_aborts_the_rest_of_the_tick() {
        // Given - a failing system ahead of a tracing one
        #[derive(Default)]
        struct Faulty;
        impl System for Faulty {
            fn priority(&self) -> i32 {
                0
            }
            fn update(
                &mut self,
                _ctx: &mut SystemContext<'_>,
                _delta: f64,
                _time: f64,
            ) -> Result<(), EcsError> {
                Err(EcsError::QueryNotRegistered("boom".into()))
            }
        }

        let mut world = World::new();
        world.globals_mut().set("trace", Vec::<&'static str>::new());
        world.register_system::<Faulty>(None).unwrap();
        world.register_system::<TraceLo>(None).unwrap();

        // When
        let result = world.update(0.0, 0.0);

        // Then - the error surfaced and TraceLo never ran
        assert!(matches!(result, Err(EcsError::QueryNotRegistered(_))));
        assert!(world
            .globals()
            .get::<Vec<&'static str>>("trace")
            .unwrap()
            .is_empty());

        // And the next tick runs normally again (minus the faulty system's
        // error, which repeats)
        assert!(world.update(0.0, 1.0).is_err());
    }

    #[test]
    fn capacity_grows_transparently() {
        // Given - a deliberately tiny world
        let mut world = World::with_options(WorldOptions { entity_capacity: 2 });
        let c = world
            .register_component(
                ComponentDescriptor::new("c")
                    .field("n", FieldSpec::int16(0))
                    .unwrap(),
            )
            .unwrap();

        // When - allocate past the initial capacity
        let entities: Vec<Entity> = (0..5)
            .map(|i| {
                let e = world.create_entity();
                world
                    .add_component(e, c, &[("n", Value::Int16(i as i16))])
                    .unwrap();
                e
            })
            .collect();

        // Then - capacity doubled (2 -> 4 -> 8) and early rows survived
        assert_eq!(world.entity_capacity(), 8);
        for (i, entity) in entities.iter().enumerate() {
            assert_eq!(
                world.value(*entity, c, "n").unwrap(),
                Value::Int16(i as i16)
            );
        }
    }

    #[test]
    fn qualify_fires_exactly_at_the_satisfying_mutation() {
        // Given - a query needing both components
        let (mut world, a, b) = world_with_ab();
        let query = world
            .register_query(QueryDescriptor::new().require(a).require(b))
            .unwrap();

        let qualified = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&qualified);
        world
            .subscribe(query, QueryEvent::Qualify, move |e| {
                sink.borrow_mut().push(e)
            })
            .unwrap();

        let e = world.create_entity();

        // When - the first component alone does not qualify
        world.add_component(e, a, &[]).unwrap();
        assert!(qualified.borrow().is_empty());

        // When - the second completes the requirement
        world.add_component(e, b, &[]).unwrap();

        // Then - exactly one qualify, at that mutation
        assert_eq!(qualified.borrow().as_slice(), &[e]);

        // And re-attaching an already-present component fires nothing new
        world.add_component(e, a, &[]).unwrap();
        assert_eq!(qualified.borrow().len(), 1);
    }

    #[test]
    fn world_drop_runs_remaining_destroy_hooks() {
        // Given
        #[derive(Default)]
        struct Watcher;
        thread_local! {
            static DROPPED: RefCell<bool> = const { RefCell::new(false) };
        }
        impl System for Watcher {
            fn update(
                &mut self,
                _ctx: &mut SystemContext<'_>,
                _delta: f64,
                _time: f64,
            ) -> Result<(), EcsError> {
                Ok(())
            }
            fn destroy(&mut self, _ctx: &mut SystemContext<'_>) {
                DROPPED.with(|d| *d.borrow_mut() = true);
            }
        }

        DROPPED.with(|d| *d.borrow_mut() = false);

        // When
        {
            let mut world = World::new();
            world.register_system::<Watcher>(None).unwrap();
        }

        // Then
        assert!(DROPPED.with(|d| *d.borrow()));
    }
}
