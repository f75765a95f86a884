//! Incremental maintenance of query result sets.
//!
//! The manager reacts to component add/remove events one entity at a time.
//! A reverse index from component id to the queries that mention it keeps
//! each event's work proportional to the queries that could actually change,
//! not to the number of registered queries.
//!
//! Value reads through `set_value` are deliberately not observed: predicates
//! are re-evaluated only when an entity's component membership changes (or
//! on an explicit refresh). Callers that filter on mutable values either
//! refresh explicitly or model the condition as a tag component.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::component::{ComponentId, Components};
use crate::entity::{Entities, Entity};
use crate::error::{EcsError, checks_enabled};
use crate::field::Value;
use crate::mask::Mask;
use crate::query::{
    CompareOp, EntitySet, Predicate, Query, QueryDescriptor, QueryEvent, QueryId, SubscriptionId,
    Subscribers,
};

/// The query registry of one world.
pub struct Queries {
    queries: Vec<Query>,
    by_key: HashMap<String, QueryId>,
    /// Reverse index: component id to every query mentioning it.
    by_component: HashMap<ComponentId, Vec<QueryId>>,
    /// Queries that mention no component at all; consulted on every event.
    unindexed: Vec<QueryId>,
}

impl Default for Queries {
    fn default() -> Self {
        Self::new()
    }
}

impl Queries {
    pub(crate) fn new() -> Self {
        Self {
            queries: Vec::new(),
            by_key: HashMap::new(),
            by_component: HashMap::new(),
            unindexed: Vec::new(),
        }
    }

    /// Register a query, or return the existing one with the same canonical
    /// identity. New queries are seeded against every live entity.
    pub(crate) fn register(
        &mut self,
        descriptor: QueryDescriptor,
        entities: &Entities,
        components: &Components,
    ) -> Result<QueryId, EcsError> {
        for id in descriptor.referenced() {
            components.ensure(id)?;
        }
        if checks_enabled() {
            validate_predicates(&descriptor, components)?;
        }

        let key = descriptor.canonical_key();
        if let Some(&id) = self.by_key.get(&key) {
            return Ok(id);
        }

        let mut required = Mask::new();
        for id in descriptor.required() {
            required.insert(id.index());
        }
        let mut excluded = Mask::new();
        for id in descriptor.excluded() {
            excluded.insert(id.index());
        }

        let mut query = Query {
            key: key.clone(),
            required,
            excluded,
            predicates: descriptor.predicates().to_vec(),
            entities: EntitySet::default(),
            qualify: Subscribers::default(),
            disqualify: Subscribers::default(),
        };

        for entity in entities.live() {
            if query_matches(&query, entity, entities, components) {
                query.entities.insert(entity);
            }
        }

        let id = QueryId::new(self.queries.len() as u32);
        let mut mentioned = false;
        for component in descriptor.referenced() {
            mentioned = true;
            let index = self.by_component.entry(component).or_default();
            if !index.contains(&id) {
                index.push(id);
            }
        }
        if !mentioned {
            self.unindexed.push(id);
        }

        debug!(
            "registered query `{key}` as {id:?} ({} seeded)",
            query.entities.len()
        );

        self.by_key.insert(key, id);
        self.queries.push(query);
        Ok(id)
    }

    /// Re-evaluate an entity against the queries a mutation could affect.
    ///
    /// `changed` names the component whose membership changed; `None` means
    /// "anything may have changed" and consults every query. Qualify and
    /// disqualify subscribers fire synchronously from here.
    pub(crate) fn update_entity(
        &mut self,
        entity: Entity,
        changed: Option<ComponentId>,
        entities: &Entities,
        components: &Components,
    ) {
        let mask = entities.mask_at(entity.index());
        if mask.is_empty() {
            for query in &mut self.queries {
                if query.entities.remove(entity) {
                    query.disqualify.fire(entity);
                }
            }
            return;
        }

        match changed {
            Some(component) => {
                let candidates = self.by_component.get(&component).cloned();
                for id in candidates.into_iter().flatten() {
                    self.reindex(id, entity, entities, components);
                }
                let unindexed = self.unindexed.clone();
                for id in unindexed {
                    self.reindex(id, entity, entities, components);
                }
            }
            None => {
                for index in 0..self.queries.len() {
                    self.reindex(QueryId::new(index as u32), entity, entities, components);
                }
            }
        }
    }

    /// Remove a destroyed entity from every query its final mask could have
    /// placed it in, firing disqualify on actual removals.
    pub(crate) fn reset_entity(&mut self, entity: Entity, final_mask: &Mask) {
        if final_mask.is_empty() {
            for query in &mut self.queries {
                if query.entities.remove(entity) {
                    query.disqualify.fire(entity);
                }
            }
            return;
        }

        let mut processed: HashSet<QueryId> = HashSet::new();
        for bit in final_mask.ones() {
            let Some(ids) = self.by_component.get(&ComponentId::new(bit as u32)) else {
                continue;
            };
            for id in ids.clone() {
                if !processed.insert(id) {
                    continue;
                }
                let query = &mut self.queries[id.index()];
                if query.entities.remove(entity) {
                    query.disqualify.fire(entity);
                }
            }
        }
        for id in self.unindexed.clone() {
            let query = &mut self.queries[id.index()];
            if query.entities.remove(entity) {
                query.disqualify.fire(entity);
            }
        }
    }

    fn reindex(&mut self, id: QueryId, entity: Entity, entities: &Entities, components: &Components) {
        let query = &mut self.queries[id.index()];
        let should_be = query_matches(query, entity, entities, components);
        let in_set = query.entities.contains(entity);

        if should_be && !in_set {
            query.entities.insert(entity);
            query.qualify.fire(entity);
        } else if !should_be && in_set {
            query.entities.remove(entity);
            query.disqualify.fire(entity);
        }
    }

    /// Whether an entity currently satisfies a query's predicate.
    pub(crate) fn matches(
        &self,
        id: QueryId,
        entity: Entity,
        entities: &Entities,
        components: &Components,
    ) -> Result<bool, EcsError> {
        self.ensure(id)?;
        Ok(query_matches(
            &self.queries[id.index()],
            entity,
            entities,
            components,
        ))
    }

    /// The live result set, in qualification order.
    pub(crate) fn entities_of(&self, id: QueryId) -> Result<&[Entity], EcsError> {
        self.ensure(id)?;
        Ok(self.queries[id.index()].entities.as_slice())
    }

    pub(crate) fn subscribe(
        &mut self,
        id: QueryId,
        event: QueryEvent,
        callback: Box<dyn FnMut(Entity)>,
    ) -> Result<SubscriptionId, EcsError> {
        self.ensure(id)?;
        let query = &mut self.queries[id.index()];
        let subscribers = match event {
            QueryEvent::Qualify => &mut query.qualify,
            QueryEvent::Disqualify => &mut query.disqualify,
        };
        Ok(subscribers.add(callback))
    }

    pub(crate) fn unsubscribe(
        &mut self,
        id: QueryId,
        event: QueryEvent,
        subscription: SubscriptionId,
    ) -> Result<bool, EcsError> {
        self.ensure(id)?;
        let query = &mut self.queries[id.index()];
        let subscribers = match event {
            QueryEvent::Qualify => &mut query.qualify,
            QueryEvent::Disqualify => &mut query.disqualify,
        };
        Ok(subscribers.remove(subscription))
    }

    /// Number of registered queries.
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Every registered id, in registration order.
    pub fn ids(&self) -> impl Iterator<Item = QueryId> + '_ {
        (0..self.queries.len() as u32).map(QueryId::new)
    }

    /// The canonical key of a registered query.
    pub(crate) fn key_of(&self, id: QueryId) -> Option<&str> {
        self.queries.get(id.index()).map(|q| q.key.as_str())
    }

    pub(crate) fn ensure(&self, id: QueryId) -> Result<(), EcsError> {
        if checks_enabled() && id.index() >= self.queries.len() {
            return Err(EcsError::QueryNotRegistered(format!("#{}", id.index())));
        }
        Ok(())
    }
}

/// The full membership predicate: live, required present, excluded absent,
/// every value predicate holding.
fn query_matches(
    query: &Query,
    entity: Entity,
    entities: &Entities,
    components: &Components,
) -> bool {
    if !entities.is_active(entity) {
        return false;
    }
    let mask = entities.mask_at(entity.index());
    if !mask.contains_all(&query.required) {
        return false;
    }
    if mask.intersects(&query.excluded) {
        return false;
    }
    query
        .predicates
        .iter()
        .all(|predicate| predicate_holds(predicate, entity, entities, components))
}

/// A predicate over an absent component evaluates to false.
fn predicate_holds(
    predicate: &Predicate,
    entity: Entity,
    entities: &Entities,
    components: &Components,
) -> bool {
    let mask = entities.mask_at(entity.index());
    if !mask.contains(predicate.component.index()) {
        return false;
    }
    let Ok(actual) =
        components
            .record(predicate.component)
            .value(entity.index(), &predicate.field, entities)
    else {
        return false;
    };
    compare(&actual, predicate.op, &predicate.value)
}

fn compare(actual: &Value, op: CompareOp, expected: &Value) -> bool {
    match op {
        CompareOp::Eq => actual == expected,
        CompareOp::Ne => actual != expected,
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            let (Some(a), Some(b)) = (actual.as_f64(), expected.as_f64()) else {
                return false;
            };
            match op {
                CompareOp::Lt => a < b,
                CompareOp::Le => a <= b,
                CompareOp::Gt => a > b,
                _ => a >= b,
            }
        }
    }
}

/// Check predicate shapes at registration: the field must exist, ordered
/// operators need a numeric scalar, equality needs a comparable kind, and
/// the expected value must be admitted by the field.
fn validate_predicates(
    descriptor: &QueryDescriptor,
    components: &Components,
) -> Result<(), EcsError> {
    for predicate in descriptor.predicates() {
        let record = components.record(predicate.component);
        let spec = record.schema().spec(&predicate.field).ok_or_else(|| {
            EcsError::UnknownField {
                component: record.name().to_string(),
                field: predicate.field.clone(),
            }
        })?;

        let comparable = spec.kind.is_numeric()
            || matches!(
                spec.kind,
                crate::field::FieldKind::Bool
                    | crate::field::FieldKind::Str
                    | crate::field::FieldKind::Enum(_)
            );
        if !comparable {
            return Err(EcsError::TypeNotSupported {
                field: predicate.field.clone(),
                expected: "a comparable field",
                got: spec.kind.name(),
            });
        }
        if predicate.op.is_ordering() && !spec.kind.is_numeric() {
            return Err(EcsError::TypeNotSupported {
                field: predicate.field.clone(),
                expected: "a numeric scalar",
                got: spec.kind.name(),
            });
        }
        spec.admit(&predicate.field, &predicate.value)?;
    }
    Ok(())
}
