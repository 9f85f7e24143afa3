//! Storage seams
//!
//! The portfolio components only see these traits. Concrete backends live in
//! [`crate::deploy`].

pub mod guard;
pub mod index;
pub mod object;
