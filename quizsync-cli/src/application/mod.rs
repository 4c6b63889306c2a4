pub mod commands;
pub mod render;
pub mod simulation;

pub use commands::{execute, Flow, UserCommand, HELP};
pub use simulation::{demo_quiz, simulate, DeviceReport, SimulationConfig};
