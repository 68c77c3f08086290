pub mod cors;
pub mod generation_guard;
