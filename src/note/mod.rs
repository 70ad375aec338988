pub mod events;
pub mod tracker;
