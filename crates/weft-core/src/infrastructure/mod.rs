//! Infrastructure implementations of domain traits

pub mod graph;
pub mod nlp;
