/*!
    Shared types for the reel crate family.

    This crate defines the vocabulary that crosses crate boundaries — the
    types a host or UI layer needs in order to talk about frame-indexed
    video without pulling in FFmpeg bindings.

    # Core Types

    - [`Rational`] - Rational numbers for time bases and frame rates
    - [`Pts`] and [`MediaDuration`] - Timestamps in time_base units
    - [`Timebase`] - The mapping between frame indices and stream ticks

    # Error Handling

    - [`Error`] and [`Result`] - Common error types
*/

mod error;
mod rational;
mod timebase;
mod timestamp;

pub use error::{Error, Result};
pub use rational::Rational;
pub use timebase::Timebase;
pub use timestamp::{MediaDuration, Pts};
