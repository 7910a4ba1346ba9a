pub mod native;
pub mod validator;
pub mod web;
