//! Jetcity CLI - headless tools for the jetcity simulator.
//!
//! This crate provides:
//! - canned city scenarios (rosters + terrain rasters + engine configs)
//! - run_city: a fixed-rate headless driver around `CityEngine`

pub mod scenarios;

pub use scenarios::{commuter_rush, harbor_city_map, harbor_run, open_plain, standard_roster};
