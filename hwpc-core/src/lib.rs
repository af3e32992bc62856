pub mod amounts;
pub mod carbon_unit;
#[cfg(test)]
mod example_processors;
pub mod lifetime;
pub mod monte_carlo;
pub mod processor;
pub mod production;
pub mod reference;
pub mod sensitivity;

pub mod errors;
