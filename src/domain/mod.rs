pub mod entities;
pub mod error;
pub mod lending;
pub mod validation;
