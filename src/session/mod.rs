pub mod clock;
pub mod controller;
pub mod store;

#[cfg(test)]
pub mod testing;
