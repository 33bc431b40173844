use std::fmt;
use std::num::NonZeroU32;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use zg_core::entity::{EntityId, PlayerId};
use zg_core::volume::Sphere;

use crate::error::{EngineError, EngineResult};

/// Handle to a live time bubble. Always non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BubbleId(pub NonZeroU32);

impl BubbleId {
    /// Construct from a raw value, returning `None` for zero.
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// The raw numeric value.
    pub fn raw(&self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for BubbleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{:08x}", self.0.get())
    }
}

/// What a bubble does to time inside its volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BubbleMode {
    /// Multiply the tick rate of affected entities by the bubble's scale.
    Scale,
    /// Freeze affected entities entirely.
    Pause,
    /// Freeze affected entities and mark them non-interactable for
    /// collision purposes. The resolver exposes the flag; enforcement is
    /// the collision collaborator's job.
    Stasis,
    /// Drive affected entities backward through their captured history by
    /// a fixed tick offset.
    Rewind,
}

/// Which entities a bubble is permitted to affect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorityPolicy {
    /// The bubble affects every entity inside its volume.
    SinglePlayerOnly,
    /// The bubble may be restricted to entities owned by its owning player
    /// (see [`BubbleSpec::affects_owned_only`]).
    LocalPlayerOnly,
}

/// A request to spawn a time bubble.
///
/// Validated when the spawn command is applied: the volume must have positive
/// radius, a `Scale` bubble must have positive scale, and a `Rewind` bubble a
/// positive offset. Invalid specs are rejected outright rather than clamped,
/// so authoring mistakes surface instead of silently shrinking to a bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BubbleSpec {
    /// Spatial extent of the bubble.
    pub volume: Sphere,
    /// Time-dilation mode imposed inside the volume.
    pub mode: BubbleMode,
    /// Tick-rate multiplier for `Scale` bubbles. Ignored by other modes.
    pub scale: f32,
    /// How many ticks back a `Rewind` bubble reads. Ignored by other modes.
    pub rewind_offset_ticks: i32,
    /// Lifetime in ticks. 0 means the bubble lives until destroyed.
    pub duration_ticks: u32,
    /// Higher priority wins when bubbles overlap.
    pub priority: u8,
    /// The entity that spawned the bubble, if any. The bubble is not owned
    /// by this entity's lifetime: it survives the entity and dies only by
    /// expiry or explicit destroy.
    pub source_entity: Option<EntityId>,
    /// The player this bubble belongs to.
    pub owner: Option<PlayerId>,
    /// With `LocalPlayerOnly` authority, restrict the effect to entities
    /// owned by `owner`.
    pub affects_owned_only: bool,
    /// Authority rule for who the bubble may affect.
    pub authority: AuthorityPolicy,
}

impl BubbleSpec {
    fn base(volume: Sphere, mode: BubbleMode) -> Self {
        Self {
            volume,
            mode,
            scale: 1.0,
            rewind_offset_ticks: 0,
            duration_ticks: 0,
            priority: 0,
            source_entity: None,
            owner: None,
            affects_owned_only: false,
            authority: AuthorityPolicy::SinglePlayerOnly,
        }
    }

    /// A bubble that multiplies tick rate by `scale` inside the volume.
    pub fn scale(center: Vec3, radius: f32, scale: f32) -> Self {
        Self {
            scale,
            ..Self::base(Sphere::new(center, radius), BubbleMode::Scale)
        }
    }

    /// A bubble that freezes everything inside the volume.
    pub fn pause(center: Vec3, radius: f32) -> Self {
        Self::base(Sphere::new(center, radius), BubbleMode::Pause)
    }

    /// A bubble that freezes and marks entities non-interactable.
    pub fn stasis(center: Vec3, radius: f32) -> Self {
        Self::base(Sphere::new(center, radius), BubbleMode::Stasis)
    }

    /// A bubble that holds entities `offset_ticks` in their own past.
    pub fn rewind(center: Vec3, radius: f32, offset_ticks: i32) -> Self {
        Self {
            rewind_offset_ticks: offset_ticks,
            ..Self::base(Sphere::new(center, radius), BubbleMode::Rewind)
        }
    }

    /// Set the lifetime in ticks (0 = until destroyed).
    pub fn with_duration(mut self, ticks: u32) -> Self {
        self.duration_ticks = ticks;
        self
    }

    /// Set the overlap priority.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Record the spawning entity.
    pub fn with_source(mut self, entity: EntityId) -> Self {
        self.source_entity = Some(entity);
        self
    }

    /// Attribute the bubble to a player, optionally restricting its effect
    /// to that player's entities.
    pub fn with_owner(mut self, owner: PlayerId, owned_only: bool) -> Self {
        self.owner = Some(owner);
        self.affects_owned_only = owned_only;
        self.authority = AuthorityPolicy::LocalPlayerOnly;
        self
    }

    /// Override the authority policy.
    pub fn with_authority(mut self, authority: AuthorityPolicy) -> Self {
        self.authority = authority;
        self
    }

    /// Check the spec for authoring errors.
    pub fn validate(&self) -> EngineResult<()> {
        if self.volume.radius.is_nan() || self.volume.radius <= 0.0 {
            return Err(EngineError::InvalidBubble(format!(
                "radius must be positive, got {}",
                self.volume.radius
            )));
        }
        if self.mode == BubbleMode::Scale && (self.scale.is_nan() || self.scale <= 0.0) {
            return Err(EngineError::InvalidBubble(format!(
                "scale must be positive, got {}",
                self.scale
            )));
        }
        if self.mode == BubbleMode::Rewind && self.rewind_offset_ticks <= 0 {
            return Err(EngineError::InvalidBubble(format!(
                "rewind offset must be positive, got {}",
                self.rewind_offset_ticks
            )));
        }
        Ok(())
    }
}

/// A live time-dilation region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBubble {
    /// Unique handle, also the deterministic tie-breaker on overlap.
    pub id: BubbleId,
    /// The tick the bubble came alive.
    pub created_at_tick: u64,
    /// The validated spawn request.
    pub spec: BubbleSpec,
}

impl TimeBubble {
    /// Whether the bubble's lifetime has run out at `now`.
    pub fn expired(&self, now: u64) -> bool {
        self.spec.duration_ticks != 0
            && now.saturating_sub(self.created_at_tick) >= self.spec.duration_ticks as u64
    }

    /// Whether the bubble's volume contains `point`.
    pub fn contains(&self, point: Vec3) -> bool {
        self.spec.volume.contains(point)
    }

    /// Whether the authority policy lets this bubble affect an entity with
    /// the given owner.
    pub fn admits(&self, entity_owner: Option<PlayerId>) -> bool {
        match self.spec.authority {
            AuthorityPolicy::SinglePlayerOnly => true,
            AuthorityPolicy::LocalPlayerOnly => {
                if self.spec.affects_owned_only {
                    self.spec.owner.is_some() && entity_owner == self.spec.owner
                } else {
                    true
                }
            }
        }
    }
}

/// Derive the raw id seed for a bubble: a hash of its quantized center
/// folded with the spawn tick. The result may be zero or collide with a
/// live bubble; callers must force non-zero and probe for uniqueness.
pub(crate) fn raw_id_seed(center: Vec3, tick: u64) -> u32 {
    // FNV-1a over the quantized coordinates. Quantizing to millimeters keeps
    // the seed stable under float noise without losing spatial spread.
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET;
    for coord in [center.x, center.y, center.z] {
        let q = (coord as f64 * 1000.0).round() as i64;
        for byte in q.to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(PRIME);
        }
    }
    (hash as u32) ^ (hash >> 32) as u32 ^ tick as u32
}
