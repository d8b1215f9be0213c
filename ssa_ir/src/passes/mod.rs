//! Transformations that run once per function, before optimization.

mod frame_layout;
mod ssa;

pub use frame_layout::layout_stack_frame;
pub use ssa::construct_ssa;
