pub mod calendar;
pub mod config;
pub mod error;
pub mod rng;
pub mod types;

pub use calendar::{Calendar, Season, TimePeriod, TimeWindow};
pub use config::SimulationConfig;
pub use rng::ParkMiller;
