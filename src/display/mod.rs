mod controller;

pub use controller::{CommandDisplay, DisplayController, DisplayPower};
