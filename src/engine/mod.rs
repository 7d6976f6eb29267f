mod builder;
mod sync_engine;

pub use builder::*;
pub use sync_engine::*;

#[cfg(test)]
mod sync_engine_test;
