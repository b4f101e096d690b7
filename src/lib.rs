// SPDX-License-Identifier: MPL-2.0
//! Background video decoding with a time-indexed frame buffer.
//!
//! A [`DecoderThread`] pulls decoded frames from a [`FrameSource`] on a
//! worker thread and stores them in a [`FrameCache`] keyed by presentation
//! time. Consumers ask for the pair of frames bracketing an arbitrary time
//! with [`DecoderThread::get_frames`] and blend between them; frames the
//! consumer has finished with are released through the `done_frames`
//! operations and reclaimed when the buffer reaches its capacity bounds.
//!
//! The crate ships no codec binding. [`SyntheticSource`] generates a
//! deterministic test pattern; real decoders plug in by implementing
//! [`FrameSource`].

pub mod cache;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod source;
pub mod sync;
pub mod synthetic;
pub mod time_units;

#[cfg(test)]
mod test_utils;

pub use cache::{Bracket, CacheConfig, EntrySnapshot, FrameCache};
pub use decoder::DecoderThread;
pub use error::{Error, Result};
pub use frame::DecodedFrame;
pub use source::{AudioFrame, AudioSink, FrameSource};
pub use synthetic::SyntheticSource;
