// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Minimum interval between scene classification attempts.
///
/// Classification latency is unbounded relative to frame rate, so this
/// cooldown is the primary backpressure valve: frames arriving inside the
/// window skip classification entirely.
pub const SCENE_CLASSIFY_COOLDOWN: Duration = Duration::from_millis(500);

/// Delay before the first timelapse pulse fires, letting exposure and
/// white balance settle after the encoder starts.
pub const TIMELAPSE_STABILIZATION_DELAY: Duration = Duration::from_millis(1500);

/// How long the encoder is resumed per timelapse pulse. Long enough to
/// observably produce discrete frames; not tuned beyond that.
pub const TIMELAPSE_BURST_DURATION: Duration = Duration::from_millis(120);

/// Default pause interval between timelapse pulses (user-configurable).
pub const TIMELAPSE_DEFAULT_INTERVAL_MS: u64 = 1000;

/// Maximum dimension QR decode operates at; larger frames are downscaled.
pub const QR_MAX_DIMENSION: u32 = 640;

/// Video encoder bitrate presets
///
/// These presets define the target bitrate for video encoding based on
/// resolution. Users can choose between quality and file size trade-offs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BitratePreset {
    /// Low bitrate - smaller files, reduced quality
    Low,
    /// Medium bitrate - balanced quality and file size (default)
    #[default]
    Medium,
    /// High bitrate - larger files, better quality
    High,
}

impl BitratePreset {
    /// All preset variants
    pub const ALL: [BitratePreset; 3] = [
        BitratePreset::Low,
        BitratePreset::Medium,
        BitratePreset::High,
    ];

    /// Display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            BitratePreset::Low => "Low",
            BitratePreset::Medium => "Medium",
            BitratePreset::High => "High",
        }
    }

    /// Bitrate in kbps for a given resolution
    pub fn bitrate_kbps(&self, width: u32, _height: u32) -> u32 {
        let tier = ResolutionTier::for_width(width);

        match (tier, self) {
            (ResolutionTier::SD, BitratePreset::Low) => 1_000,
            (ResolutionTier::SD, BitratePreset::Medium) => 2_000,
            (ResolutionTier::SD, BitratePreset::High) => 4_000,
            (ResolutionTier::HD, BitratePreset::Low) => 2_500,
            (ResolutionTier::HD, BitratePreset::Medium) => 5_000,
            (ResolutionTier::HD, BitratePreset::High) => 10_000,
            (ResolutionTier::FullHD, BitratePreset::Low) => 4_000,
            (ResolutionTier::FullHD, BitratePreset::Medium) => 8_000,
            (ResolutionTier::FullHD, BitratePreset::High) => 16_000,
            (ResolutionTier::FourK, BitratePreset::Low) => 15_000,
            (ResolutionTier::FourK, BitratePreset::Medium) => 30_000,
            (ResolutionTier::FourK, BitratePreset::High) => 50_000,
        }
    }
}

/// Resolution tiers for bitrate calculation and format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResolutionTier {
    /// SD: 640x480 and below
    SD,
    /// HD: 1280x720
    HD,
    /// Full HD: 1920x1080
    #[default]
    FullHD,
    /// 4K: 3840x2160 and above
    FourK,
}

impl ResolutionTier {
    /// All tiers
    pub const ALL: [ResolutionTier; 4] = [
        ResolutionTier::SD,
        ResolutionTier::HD,
        ResolutionTier::FullHD,
        ResolutionTier::FourK,
    ];

    /// Classify a frame width into a tier
    pub fn for_width(width: u32) -> Self {
        match width {
            0..=800 => ResolutionTier::SD,
            801..=1280 => ResolutionTier::HD,
            1281..=2560 => ResolutionTier::FullHD,
            _ => ResolutionTier::FourK,
        }
    }

    /// Nominal (width, height) for the tier
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            ResolutionTier::SD => (640, 480),
            ResolutionTier::HD => (1280, 720),
            ResolutionTier::FullHD => (1920, 1080),
            ResolutionTier::FourK => (3840, 2160),
        }
    }

    /// Display name for the tier
    pub fn display_name(&self) -> &'static str {
        match self {
            ResolutionTier::SD => "SD",
            ResolutionTier::HD => "HD",
            ResolutionTier::FullHD => "Full HD",
            ResolutionTier::FourK => "4K",
        }
    }
}
