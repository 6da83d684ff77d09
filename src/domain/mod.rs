pub mod card;
pub mod customer;
pub mod ports;
pub mod program;
