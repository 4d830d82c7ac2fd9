pub mod power;
pub mod registry;
pub mod state;
