pub mod activation;
pub mod engine;
pub mod generator;
