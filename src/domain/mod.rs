//! Entities, value objects and the ports checkout talks through.

pub mod cart;
pub mod ids;
pub mod intent;
pub mod money;
pub mod order;
pub mod penalty;
pub mod ports;
pub mod product;
pub mod subscription;
