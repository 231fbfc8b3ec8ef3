//! Item ⇄ domain transforms.
//!
//! [`DomainObjectBuilder`] turns a procedure item into a fresh engine
//! [`Procedure`](oac_engine::Procedure) and remembers which item each
//! domain handle came from. [`ProcedureItemBuilder`] goes the other way,
//! from a job snapshot to an item tree.

mod domain_builder;
mod item_builder;

pub use domain_builder::DomainObjectBuilder;
pub use item_builder::ProcedureItemBuilder;
