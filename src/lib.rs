pub mod cli;
pub mod error;
pub mod io;
pub mod logging;
pub mod model;
pub mod ops;
pub mod tui;
pub mod util;
pub mod view;
pub mod workflow;
