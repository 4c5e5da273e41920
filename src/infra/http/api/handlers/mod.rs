//! REST handlers, one submodule per resource.

mod books;
mod health;
mod lending;
mod students;
mod teachers;

pub use books::*;
pub use health::*;
pub use lending::*;
pub use students::*;
pub use teachers::*;
