//! Feedback control and environment models for dsim

pub mod flight_controller;
pub mod pid;
pub mod wind;

pub use flight_controller::{FlightController, FlightControllerConfig, FlightMode};
pub use pid::{ControllerConfig, FeedbackController, Gains, PartialGains};
pub use wind::{WeatherState, WindModel};
