//! Entity handles and the slot table.
//!
//! Entities are opaque handles tying component data together. A handle is a
//! pair of slot `index` and `generation`; the index addresses columnar
//! storage, while the generation distinguishes the current occupant of a
//! slot from stale handles to earlier occupants.
//!
//! # Architecture
//!
//! - **[`Entity`]**: a copyable `(index, generation)` handle. Identity is
//!   defined by both fields; only the index addresses storage.
//! - **[`Entities`]**: the slot table. Each slot carries its current
//!   generation, an `active` flag, and the component [`Mask`] of the
//!   occupant. Released slots go to a dead pool holding handles with the
//!   generation already incremented, so reuse is a pop.
//!
//! # Generation tracking
//!
//! When an entity is released its slot stays in place; the pooled handle
//! carries `generation + 1`. Any surviving handle to the old occupant fails
//! the generation comparison from then on, which is how use-after-destroy is
//! detected without ever invalidating the index space.

use crate::error::{EcsError, checks_enabled};
use crate::mask::Mask;

/// The generation of an entity slot, incremented on each reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u32);

impl Generation {
    /// The first generation of a slot.
    const FIRST: Self = Self(0);

    /// Get the next generation from the current.
    #[inline]
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// The raw generation counter.
    #[inline]
    pub fn value(&self) -> u32 {
        self.0
    }
}

/// An entity handle: slot index plus the generation it was issued under.
///
/// Two handles are equal only if both index and generation match. A world
/// holds at most one live entity per index at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    index: u32,
    generation: Generation,
}

impl Entity {
    #[inline]
    pub(crate) const fn new(index: u32, generation: Generation) -> Self {
        Self { index, generation }
    }

    /// The slot index of this entity, usable to address columnar storage.
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// The generation this handle was issued under.
    #[inline]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// The same slot at the next generation.
    #[inline]
    pub(crate) fn genned(&self) -> Self {
        Self::new(self.index, self.generation.next())
    }
}

impl PartialOrd for Entity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match self.index.cmp(&other.index) {
            std::cmp::Ordering::Equal => self.generation.cmp(&other.generation),
            ord => ord,
        }
    }
}

/// One slot of the table.
#[derive(Debug)]
struct Slot {
    generation: Generation,
    active: bool,
    mask: Mask,
}

/// The slot table: dense slots plus a recycling pool.
///
/// Fresh slots are appended; released slots are pooled and reused
/// last-in-first-out with their generation already incremented.
#[derive(Debug, Default)]
pub struct Entities {
    slots: Vec<Slot>,
    dead_pool: Vec<Entity>,
}

impl Entities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a live entity, reusing a pooled slot when one is available.
    ///
    /// A reused slot comes back with a bumped generation and an empty mask.
    pub fn spawn(&mut self) -> Entity {
        if let Some(entity) = self.dead_pool.pop() {
            let slot = &mut self.slots[entity.index()];
            slot.generation = entity.generation();
            slot.active = true;
            slot.mask.clear();
            entity
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: Generation::FIRST,
                active: true,
                mask: Mask::new(),
            });
            Entity::new(index, Generation::FIRST)
        }
    }

    /// Release a live entity: deactivate the slot, clear its mask, and pool
    /// the handle for reuse at the next generation.
    pub fn release(&mut self, entity: Entity) -> Result<(), EcsError> {
        self.ensure_active(entity)?;
        let slot = &mut self.slots[entity.index()];
        slot.active = false;
        slot.mask.clear();
        self.dead_pool.push(entity.genned());
        Ok(())
    }

    /// Whether this exact handle refers to a live entity.
    #[inline]
    pub fn is_active(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index())
            .is_some_and(|slot| slot.active && slot.generation == entity.generation())
    }

    /// Fail with [`EcsError::ModifyDestroyedEntity`] unless the handle is
    /// live. Skipped entirely when checks are disabled.
    pub(crate) fn ensure_active(&self, entity: Entity) -> Result<(), EcsError> {
        if checks_enabled() && !self.is_active(entity) {
            return Err(EcsError::ModifyDestroyedEntity(entity));
        }
        Ok(())
    }

    /// The live entity currently occupying a raw slot index, if any.
    pub fn at(&self, index: usize) -> Option<Entity> {
        self.slots.get(index).and_then(|slot| {
            slot.active
                .then(|| Entity::new(index as u32, slot.generation))
        })
    }

    /// The component mask of this exact handle, if it is live.
    pub fn mask(&self, entity: Entity) -> Option<&Mask> {
        self.is_active(entity)
            .then(|| &self.slots[entity.index()].mask)
    }

    /// The mask of the slot at `index`, regardless of occupancy.
    pub(crate) fn mask_at(&self, index: usize) -> &Mask {
        &self.slots[index].mask
    }

    pub(crate) fn mask_at_mut(&mut self, index: usize) -> &mut Mask {
        &mut self.slots[index].mask
    }

    /// Iterate every live entity.
    pub fn live(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.active
                .then(|| Entity::new(index as u32, slot.generation))
        })
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.slots.len() - self.dead_pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// High-water mark of allocated slots (live and pooled).
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Whether the next spawn will allocate a fresh slot index.
    pub(crate) fn next_spawn_is_fresh(&self) -> bool {
        self.dead_pool.is_empty()
    }
}
