//! Core of a three-lane endless runner driven by body pose.
//!
//! Landmark frames go through [`pose::classify`] and a
//! [`filter::ConsistencyFilter`] to become [`control::Controls`], which a
//! [`session::Session`] applies to its [`world::World`] on a fixed set of
//! timers. The terminal front end lives in the binary.

pub mod config;
pub mod control;
pub mod enemy;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod pattern;
pub mod pose;
pub mod readiness;
pub mod session;
pub mod world;

pub use config::Config;
pub use control::{Controls, PoseControl};
pub use error::{Error, Result};
pub use pose::{ActionCode, LandmarkSet, classify};
pub use session::{Session, SessionEvent, Snapshot};
