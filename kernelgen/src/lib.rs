//! Compiles evolved computation graphs into a single OpenCL field-update
//! kernel.
//!
//! Two graphs describe one individual: a connection rule run once per
//! neighbor link and an activation rule run once per cell. [`compile_rule`]
//! lowers each into a pure OpenCL function; [`assemble`] embeds both into a
//! complete two-phase kernel and returns the buffer layout the compute
//! runtime must allocate against. [`cpu_ref::Field`] executes the same
//! semantics on the host for testing.

pub mod cpu_ref;
pub mod emit;
pub mod graph;
pub mod kernel;
pub mod ops;
pub mod rule;
pub mod schema;

pub use cpu_ref::Field;
pub use graph::{Edge, Graph, GraphError, Node, RecurrentEdge, Source};
pub use kernel::{assemble, AssembleError, FieldKernel, FieldParams};
pub use ops::Op;
pub use rule::{compile_rule, CompiledRule, RulePlan, RuleSignature};
pub use schema::{FieldLayout, GeneSchema};
