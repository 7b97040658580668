//! Output drivers.  Sensor drivers live in [`crate::sensors`].

pub mod relay;
