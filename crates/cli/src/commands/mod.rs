pub mod local;
pub mod model;
pub mod predict;
