mod commands;
mod logging;
mod print;

pub use commands::run;
