//! Digest engine: content addressing for capture bases, overlays and bundles.
//!
//! # Responsibility
//! - Turn an entity into canonical bytes with its digest field placeholdered.
//! - Hash those bytes and stamp the resulting identifier back on the entity.
//!
//! # Invariants
//! - A digest is a pure function of logical content; map insertion order never
//!   reaches the hashed bytes.
//! - The placeholder has the same width as the final identifier.

pub mod canonical;
pub mod identifier;

use crate::error::{OcaError, OcaResult};
use canonical::to_canonical_string;
use identifier::Said;
use serde_json::Value;

/// Name of the digest field in every digestable object.
pub const DIGEST_FIELD: &str = "d";

/// Entity that carries its own self-addressing identifier.
pub trait Digestable {
    /// Structural form committed to by the digest. Must be a JSON object;
    /// whatever it holds under `d` is replaced by the placeholder.
    fn digest_input(&self) -> OcaResult<Value>;

    fn said(&self) -> Option<&Said>;

    fn set_said(&mut self, said: Said);
}

/// Computes the identifier `entity` should carry, without mutating it.
pub fn compute_said<T: Digestable + ?Sized>(entity: &T) -> OcaResult<Said> {
    let mut value = entity.digest_input()?;
    let object = value.as_object_mut().ok_or_else(|| {
        OcaError::Serialization("digest input must be a structural object".to_string())
    })?;
    object.insert(DIGEST_FIELD.to_string(), Value::String(Said::placeholder()));
    let canonical = to_canonical_string(&value);
    Ok(Said::blake3_256(canonical.as_bytes()))
}

/// Computes and writes the identifier into the entity's digest field.
pub fn stamp<T: Digestable + ?Sized>(entity: &mut T) -> OcaResult<Said> {
    let said = compute_said(entity)?;
    entity.set_said(said.clone());
    Ok(said)
}

/// Returns whether the stored identifier matches the entity's content.
///
/// An entity without an identifier never verifies.
pub fn verify<T: Digestable + ?Sized>(entity: &T) -> OcaResult<bool> {
    match entity.said() {
        Some(current) => Ok(compute_said(entity)? == *current),
        None => Ok(false),
    }
}
