//! Data-flow analyses over a function in SSA form.

pub mod liveness;
pub mod points_to;
