//! Device volume bridging
//!
//! The engine speaks in percent, the device in discrete levels `0..=max`.
//! [`VolumeBridge`] converts between the two and primes the edge detector when
//! it applies an engine request, so the resulting device change is not
//! reported back to the engine as a user action.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use genie_core::prelude::*;

use crate::connectivity::EdgeDetector;

/// Android's music stream range, a reasonable default for a software mixer
pub const DEFAULT_MAX_LEVEL: u32 = 15;

/// A platform audio output with a discrete volume scale
pub trait AudioOutput: Send + Sync {
    fn max_level(&self) -> u32;

    fn level(&self) -> u32;

    /// Returns `false` if the platform refused the change
    fn set_level(&self, level: u32) -> bool;

    fn set_muted(&self, muted: bool) -> bool;

    fn is_muted(&self) -> bool;
}

/// In-memory audio output
#[derive(Debug)]
pub struct SoftwareMixer {
    max: u32,
    level: AtomicU32,
    muted: AtomicBool,
}

impl SoftwareMixer {
    pub fn new(max: u32, level: u32) -> Self {
        Self {
            max,
            level: AtomicU32::new(level.min(max)),
            muted: AtomicBool::new(false),
        }
    }
}

impl Default for SoftwareMixer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LEVEL, DEFAULT_MAX_LEVEL / 2)
    }
}

impl AudioOutput for SoftwareMixer {
    fn max_level(&self) -> u32 {
        self.max
    }

    fn level(&self) -> u32 {
        self.level.load(Ordering::SeqCst)
    }

    fn set_level(&self, level: u32) -> bool {
        self.level.store(level.min(self.max), Ordering::SeqCst);
        true
    }

    fn set_muted(&self, muted: bool) -> bool {
        self.muted.store(muted, Ordering::SeqCst);
        true
    }

    fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }
}

/// Percentage reported to the engine for a device level (truncating)
pub fn percent_for_level(level: u32, max: u32) -> Option<u8> {
    if max == 0 {
        return None;
    }
    let percent = (level.min(max) as u64 * 100) / max as u64;
    Some(percent as u8)
}

/// Device level for an engine-requested percentage.
///
/// Rounded to nearest and never below 1: an engine "set volume" must not act
/// as a mute.
pub fn level_for_percent(percent: u8, max: u32) -> u32 {
    if max == 0 {
        return 0;
    }
    let percent = percent.min(100) as u64;
    let level = (percent * max as u64 + 50) / 100;
    (level as u32).clamp(1, max)
}

/// Connects an [`AudioOutput`] to the engine's percentage scale
#[derive(Clone)]
pub struct VolumeBridge {
    output: Arc<dyn AudioOutput>,
    detector: Arc<EdgeDetector>,
}

impl VolumeBridge {
    pub fn new(output: Arc<dyn AudioOutput>, detector: Arc<EdgeDetector>) -> Self {
        Self { output, detector }
    }

    pub fn output(&self) -> &Arc<dyn AudioOutput> {
        &self.output
    }

    /// Current device volume as a percentage
    pub fn current_percent(&self) -> Option<u8> {
        percent_for_level(self.output.level(), self.output.max_level())
    }

    /// Apply an engine-requested volume to the device
    pub fn apply_engine_volume(&self, percent: u8) -> bool {
        let max = self.output.max_level();
        if max == 0 {
            warn!(
                "Audio output reports no volume range, ignoring set_volume({})",
                percent
            );
            return false;
        }

        let level = level_for_percent(percent, max);
        if !self.output.set_level(level) {
            warn!("Audio output refused level {}/{}", level, max);
            return false;
        }

        if let Some(applied) = percent_for_level(level, max) {
            self.detector.prime_volume(applied);
        }
        debug!("Engine set volume {}% -> level {}/{}", percent, level, max);
        true
    }

    /// Explicit mute from the control path
    pub fn apply_mute(&self, muted: bool) -> bool {
        self.output.set_muted(muted)
    }
}
