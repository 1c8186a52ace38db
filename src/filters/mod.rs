// SPDX-License-Identifier: GPL-3.0-only

//! Filter definitions shared by the GPU and CPU engines
//!
//! Every filter is a fixed, stateless per-pixel color transform: switching
//! filters never requires restarting the frame source and takes effect on
//! the next rendered frame. The RGB math here is the single source of
//! truth; the WGSL shader mirrors it exactly.

pub mod cpu;
pub mod gpu;
pub mod renderer;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

pub use renderer::ShaderFilterRenderer;

/// Selectable color-transform filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterType {
    /// Identity — no color transform
    #[default]
    Standard,
    /// Luminance-only grayscale
    Mono,
    /// Warm sepia tone
    Sepia,
    /// High-contrast black and white
    Noir,
    /// Boosted saturation and contrast
    Vivid,
}

impl FilterType {
    /// All filter variants
    pub const ALL: [FilterType; 5] = [
        FilterType::Standard,
        FilterType::Mono,
        FilterType::Sepia,
        FilterType::Noir,
        FilterType::Vivid,
    ];

    /// Display name for the filter
    pub fn display_name(&self) -> &'static str {
        match self {
            FilterType::Standard => "Standard",
            FilterType::Mono => "Mono",
            FilterType::Sepia => "Sepia",
            FilterType::Noir => "Noir",
            FilterType::Vivid => "Vivid",
        }
    }

    /// Filter code for the GPU shader uniform
    pub fn gpu_filter_code(&self) -> u32 {
        match self {
            FilterType::Standard => 0,
            FilterType::Mono => 1,
            FilterType::Sepia => 2,
            FilterType::Noir => 3,
            FilterType::Vivid => 4,
        }
    }
}

impl std::fmt::Display for FilterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A frame after the filter renderer has processed it
///
/// Always tightly packed RGBA, already rotated upright. The source frame's
/// timestamps are propagated so encoder outputs keep correct PTS.
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA pixels
    pub data: Arc<[u8]>,
    /// Filter that was applied
    pub filter: FilterType,
    /// Sequence number of the source frame
    pub sequence: u64,
    /// Capture timestamp of the source frame
    pub captured_at: Instant,
    /// Sensor timestamp of the source frame
    pub sensor_timestamp_ns: Option<u64>,
}

/// Apply a filter to a single RGB pixel in-place (values 0.0..=1.0)
#[inline]
pub(crate) fn apply_filter_rgb(r: &mut f32, g: &mut f32, b: &mut f32, filter: FilterType) {
    match filter {
        FilterType::Standard => {}

        FilterType::Mono => {
            let gray = 0.299 * *r + 0.587 * *g + 0.114 * *b;
            *r = gray;
            *g = gray;
            *b = gray;
        }

        FilterType::Sepia => {
            let luminance = 0.299 * *r + 0.587 * *g + 0.114 * *b;
            *r = (luminance * 1.2 + 0.1).clamp(0.0, 1.0);
            *g = (luminance * 0.9 + 0.05).clamp(0.0, 1.0);
            *b = (luminance * 0.7).clamp(0.0, 1.0);
        }

        FilterType::Noir => {
            let luminance = 0.299 * *r + 0.587 * *g + 0.114 * *b;
            let contrast = 2.0;
            let adjusted = ((luminance - 0.5) * contrast + 0.5).clamp(0.0, 1.0);
            *r = adjusted;
            *g = adjusted;
            *b = adjusted;
        }

        FilterType::Vivid => {
            let luminance = 0.299 * *r + 0.587 * *g + 0.114 * *b;
            *r = (luminance + (*r - luminance) * 1.4).clamp(0.0, 1.0);
            *g = (luminance + (*g - luminance) * 1.4).clamp(0.0, 1.0);
            *b = (luminance + (*b - luminance) * 1.4).clamp(0.0, 1.0);
            *r = ((*r - 0.5) * 1.15 + 0.5).clamp(0.0, 1.0);
            *g = ((*g - 0.5) * 1.15 + 0.5).clamp(0.0, 1.0);
            *b = ((*b - 0.5) * 1.15 + 0.5).clamp(0.0, 1.0);
        }
    }
}
