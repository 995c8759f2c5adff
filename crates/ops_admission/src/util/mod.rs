pub mod errors;
pub mod quantity;
