pub mod config;
pub mod confirm;
pub mod confluence;
pub mod document;
pub mod esa;
pub mod hierarchy;
pub mod migrate;
pub mod space;

#[cfg(test)]
mod testing;
