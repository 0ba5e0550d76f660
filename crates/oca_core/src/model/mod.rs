//! Attribute-level domain model.
//!
//! # Responsibility
//! - Define what a single captured field is: its name, its type and the
//!   metadata the builder later spreads across overlays.
//!
//! # Invariants
//! - Every value in this module is validated at construction; downstream
//!   modules never re-check type descriptors, language codes or standards.

pub mod attribute;
pub mod attribute_type;
pub mod conformance;
pub mod encoding;
pub mod language;
pub mod standard;
