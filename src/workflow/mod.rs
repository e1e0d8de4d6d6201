mod controller;
pub use controller::*;

mod runner;
pub use runner::*;
