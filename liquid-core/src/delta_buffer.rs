use glam::Vec2;

use crate::types::ParticleId;

/// Frame-global buffer of pending positional corrections, one per slot.
///
/// The force phase produces per-particle contribution lists in parallel; they
/// are reduced into this buffer by a single thread, so the summation order is
/// fixed and the result does not depend on worker scheduling.
#[derive(Debug, Clone)]
pub struct DeltaBuffer {
    delta: Vec<Vec2>,
}

impl DeltaBuffer {
    /// Creates a zeroed buffer covering `len` slots.
    pub fn with_len(len: usize) -> Self {
        Self {
            delta: vec![Vec2::ZERO; len],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.delta.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.delta.is_empty()
    }

    /// Resizes to `len` slots and clears every entry, even if the length
    /// was already correct.
    pub fn ensure_len(&mut self, len: usize) {
        if self.delta.len() != len {
            self.delta.resize(len, Vec2::ZERO);
        }
        self.clear();
    }

    pub fn clear(&mut self) {
        self.delta.fill(Vec2::ZERO);
    }

    /// Adds one correction for `id`.
    ///
    /// ### Panics
    /// Panics if `id` is out of bounds.
    #[inline]
    pub fn add(&mut self, id: ParticleId, d: Vec2) {
        self.delta[id] += d;
    }

    #[inline]
    pub fn get(&self, id: ParticleId) -> Vec2 {
        self.delta[id]
    }

    /// Mutable view for phases that own one slot per task.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [Vec2] {
        &mut self.delta
    }

    /// Merges one particle's contribution list, scaling each entry by `scale`.
    pub fn merge_contributions(&mut self, contributions: &[(ParticleId, Vec2)], scale: f32) {
        for &(id, d) in contributions {
            self.add(id, d * scale);
        }
    }
}
