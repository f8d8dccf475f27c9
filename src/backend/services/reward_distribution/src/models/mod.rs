pub mod coin;
pub mod reward;
pub mod validator;
