pub mod decimal;
pub mod errors;
