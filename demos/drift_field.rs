//! A tiny drift simulation driving the runtime end to end.
//!
//! Particles drift by their velocity each tick and expire when their
//! lifetime runs out; a query subscription reports expirations the moment
//! they happen.

use slate_ecs::{
    ComponentDescriptor, Components, EcsError, FieldSpec, QueryDescriptor, QueryEvent, Schema,
    System, SystemContext, Value, World,
};

#[derive(Default)]
struct Drift;

impl System for Drift {
    fn config_schema(&self) -> Schema {
        Schema::new()
            .field("speed", FieldSpec::float64(1.0))
            .expect("unique field name")
    }

    fn queries(&self, components: &Components) -> Vec<(String, QueryDescriptor)> {
        let particle = components.id_of("particle").expect("particle registered");
        vec![("drifters".into(), QueryDescriptor::new().require(particle))]
    }

    fn priority(&self) -> i32 {
        0
    }

    fn update(
        &mut self,
        ctx: &mut SystemContext<'_>,
        delta: f64,
        _time: f64,
    ) -> Result<(), EcsError> {
        let particle = ctx.component("particle").expect("particle registered");
        let speed = match ctx.config().read("speed") {
            Some(Value::Float64(v)) => *v,
            _ => 1.0,
        };
        for entity in ctx.query("drifters")?.to_vec() {
            let Value::Vec2(velocity) = ctx.value(entity, particle, "velocity")? else {
                continue;
            };
            let step = (delta * speed) as f32;
            let position = ctx.vector_view_mut(entity, particle, "position")?;
            position[0] += velocity[0] * step;
            position[1] += velocity[1] * step;
        }
        Ok(())
    }
}

#[derive(Default)]
struct Expire;

impl System for Expire {
    fn queries(&self, components: &Components) -> Vec<(String, QueryDescriptor)> {
        let particle = components.id_of("particle").expect("particle registered");
        vec![("drifters".into(), QueryDescriptor::new().require(particle))]
    }

    fn priority(&self) -> i32 {
        10
    }

    fn update(
        &mut self,
        ctx: &mut SystemContext<'_>,
        delta: f64,
        _time: f64,
    ) -> Result<(), EcsError> {
        let particle = ctx.component("particle").expect("particle registered");
        for entity in ctx.query("drifters")?.to_vec() {
            let Value::Float64(ttl) = ctx.value(entity, particle, "ttl")? else {
                continue;
            };
            let remaining = ttl - delta;
            if remaining <= 0.0 {
                ctx.destroy_entity(entity)?;
            } else {
                ctx.set_value(entity, particle, "ttl", Value::Float64(remaining))?;
            }
        }
        Ok(())
    }
}

fn main() -> Result<(), EcsError> {
    let mut world = World::new();

    let particle = world.register_component(
        ComponentDescriptor::new("particle")
            .field("position", FieldSpec::vec2([0.0, 0.0]))?
            .field("velocity", FieldSpec::vec2([0.0, 0.0]))?
            .field("ttl", FieldSpec::float64(1.0))?,
    )?;

    let drifters = world.register_query(QueryDescriptor::new().require(particle))?;
    world.subscribe(drifters, QueryEvent::Disqualify, |entity| {
        println!("particle {entity:?} expired");
    })?;

    for i in 0..6 {
        let entity = world.create_entity();
        let angle = i as f32;
        world.add_component(
            entity,
            particle,
            &[
                ("velocity", Value::Vec2([angle.cos(), angle.sin()])),
                ("ttl", Value::Float64(0.4 + 0.2 * f64::from(i))),
            ],
        )?;
    }

    world.register_system::<Drift>(None)?;
    world.register_system::<Expire>(None)?;
    world.configure_system::<Drift>("speed", Value::Float64(2.0))?;

    let delta = 0.1;
    for tick in 0..12 {
        world.update(delta, f64::from(tick) * delta)?;
    }

    println!(
        "{} particles still drifting",
        world.query_entities(drifters)?.len()
    );
    for entity in world.query_entities(drifters)?.to_vec() {
        let Value::Vec2(position) = world.value(entity, particle, "position")? else {
            continue;
        };
        println!(
            "  {entity:?} at ({:.2}, {:.2})",
            position[0], position[1]
        );
    }
    Ok(())
}
