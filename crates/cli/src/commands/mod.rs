pub mod register;
pub mod run;
pub mod validate;
