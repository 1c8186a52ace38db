// SPDX-License-Identifier: GPL-3.0-only

//! Shader filter renderer
//!
//! Owns the filter engines and the single currently-active filter. Filter
//! selection is recorded immediately but only observed on the next render
//! call, which runs on the render thread — engine work never happens off
//! that thread. If the GPU engine fails mid-stream the renderer falls back
//! to the software engine for that and subsequent frames instead of
//! rendering nothing.

use super::cpu::CpuFilterEngine;
use super::gpu::GpuFilterEngine;
use super::{FilterType, RenderedFrame};
use crate::camera::{CameraFrame, SensorRotation};
use crate::errors::RenderError;
use tracing::{debug, info, warn};

enum Engine {
    Gpu(GpuFilterEngine),
    Cpu(CpuFilterEngine),
}

/// Renders frames under the currently selected filter
pub struct ShaderFilterRenderer {
    engine: Engine,
    /// Filter applied by the most recent render pass
    current_filter: FilterType,
    /// Filter requested by the caller; picked up lazily on the next render
    pending_filter: FilterType,
    mirror: bool,
}

impl ShaderFilterRenderer {
    /// Create a renderer, preferring the GPU engine.
    ///
    /// Must be called on the render thread: the GPU context created here is
    /// owned by that thread for its whole lifetime.
    pub fn new(mirror: bool) -> Self {
        let engine = match GpuFilterEngine::new() {
            Ok(gpu) => {
                info!("Filter renderer using GPU engine");
                Engine::Gpu(gpu)
            }
            Err(e) => {
                warn!(error = %e, "GPU unavailable, using software filter engine");
                Engine::Cpu(CpuFilterEngine::new())
            }
        };

        Self {
            engine,
            current_filter: FilterType::Standard,
            pending_filter: FilterType::Standard,
            mirror,
        }
    }

    /// Create a renderer that always uses the software engine
    pub fn software(mirror: bool) -> Self {
        Self {
            engine: Engine::Cpu(CpuFilterEngine::new()),
            current_filter: FilterType::Standard,
            pending_filter: FilterType::Standard,
            mirror,
        }
    }

    /// Record the desired filter; takes effect on the next render call
    pub fn set_filter(&mut self, filter: FilterType) {
        self.pending_filter = filter;
    }

    /// The filter the next render pass will apply
    pub fn filter(&self) -> FilterType {
        self.pending_filter
    }

    /// Whether output is mirrored horizontally
    pub fn set_mirror(&mut self, mirror: bool) {
        self.mirror = mirror;
    }

    /// Render one frame with the active filter and source transform
    pub fn render(
        &mut self,
        frame: &CameraFrame,
        rotation: SensorRotation,
    ) -> Result<RenderedFrame, RenderError> {
        if self.pending_filter != self.current_filter {
            debug!(
                from = %self.current_filter,
                to = %self.pending_filter,
                "Switching filter"
            );
            self.current_filter = self.pending_filter;
        }

        let filter = self.current_filter;
        match &mut self.engine {
            Engine::Gpu(gpu) => match gpu.render(frame, filter, rotation, self.mirror) {
                Ok(rendered) => Ok(rendered),
                Err(e) => {
                    // A failing GPU stays failed; keep the stream alive on CPU
                    warn!(error = %e, "GPU filter engine failed, falling back to software");
                    let cpu = CpuFilterEngine::new();
                    let rendered = cpu.render(frame, filter, rotation, self.mirror)?;
                    self.engine = Engine::Cpu(cpu);
                    Ok(rendered)
                }
            },
            Engine::Cpu(cpu) => cpu.render(frame, filter, rotation, self.mirror),
        }
    }
}

impl std::fmt::Debug for ShaderFilterRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderFilterRenderer")
            .field(
                "engine",
                &match self.engine {
                    Engine::Gpu(_) => "gpu",
                    Engine::Cpu(_) => "cpu",
                },
            )
            .field("current_filter", &self.current_filter)
            .field("pending_filter", &self.pending_filter)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PixelFormat;
    use std::sync::Arc;
    use std::time::Instant;

    fn frame() -> CameraFrame {
        CameraFrame {
            width: 2,
            height: 2,
            data: Arc::from(vec![128u8; 16]),
            format: PixelFormat::RGBA,
            stride: 8,
            sequence: 1,
            captured_at: Instant::now(),
            sensor_timestamp_ns: None,
        }
    }

    #[test]
    fn test_filter_switch_is_lazy() {
        let mut renderer = ShaderFilterRenderer::software(false);
        renderer.set_filter(FilterType::Sepia);
        // Recorded but not yet applied
        assert_eq!(renderer.filter(), FilterType::Sepia);

        let rendered = renderer.render(&frame(), SensorRotation::None).unwrap();
        assert_eq!(rendered.filter, FilterType::Sepia);
    }

    #[test]
    fn test_switch_does_not_drop_frames() {
        let mut renderer = ShaderFilterRenderer::software(false);
        let first = renderer.render(&frame(), SensorRotation::None).unwrap();
        renderer.set_filter(FilterType::Mono);
        let second = renderer.render(&frame(), SensorRotation::None).unwrap();

        assert_eq!(first.filter, FilterType::Standard);
        assert_eq!(second.filter, FilterType::Mono);
        assert_eq!(first.width, second.width);
    }
}
