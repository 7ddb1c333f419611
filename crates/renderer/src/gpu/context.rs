use scheduler::{PipelineError, TargetKind};
use viewconfig::{PowerSetting, ViewConfig};
use winit::dpi::PhysicalSize;

/// Adapter and presentation preferences shared by the three contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuOptions {
    pub power: PowerSetting,
    /// Allow one retry on the fallback (software) adapter.
    pub allow_fallback: bool,
    pub vsync: bool,
}

impl Default for GpuOptions {
    fn default() -> Self {
        Self {
            power: PowerSetting::High,
            allow_fallback: true,
            vsync: true,
        }
    }
}

impl GpuOptions {
    pub fn from_config(config: &ViewConfig) -> Self {
        Self {
            power: config.gpu.power,
            allow_fallback: config.gpu.allow_fallback,
            vsync: config.window.vsync,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterProfile {
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
    pub driver: String,
}

impl AdapterProfile {
    fn from_info(info: &wgpu::AdapterInfo) -> Self {
        Self {
            name: info.name.clone(),
            backend: info.backend,
            device_type: info.device_type,
            driver: info.driver.clone(),
        }
    }

    pub fn is_software(&self) -> bool {
        matches!(self.device_type, wgpu::DeviceType::Cpu)
    }
}

pub(crate) fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}

/// Picks one adapter for every context, degrading once to the fallback
/// adapter when the preferred request fails.
pub(crate) fn select_adapter(
    instance: &wgpu::Instance,
    options: &GpuOptions,
    compatible_surface: Option<&wgpu::Surface<'_>>,
) -> Result<(wgpu::Adapter, AdapterProfile), PipelineError> {
    let power_preference = match options.power {
        PowerSetting::Low => wgpu::PowerPreference::LowPower,
        PowerSetting::High => wgpu::PowerPreference::HighPerformance,
    };
    let request = |force_fallback_adapter: bool| {
        pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface,
            force_fallback_adapter,
        }))
    };

    let adapter = match request(false) {
        Ok(adapter) => adapter,
        Err(primary) if options.allow_fallback => {
            tracing::warn!(error = %primary, "no preferred GPU adapter; retrying with fallback adapter");
            request(true).map_err(|err| PipelineError::ContextUnavailable {
                context: "adapter".into(),
                reason: format!("{primary}; fallback: {err}"),
            })?
        }
        Err(err) => {
            return Err(PipelineError::ContextUnavailable {
                context: "adapter".into(),
                reason: err.to_string(),
            })
        }
    };

    let profile = AdapterProfile::from_info(&adapter.get_info());
    tracing::debug!(
        name = %profile.name,
        backend = ?profile.backend,
        device_type = ?profile.device_type,
        driver = %profile.driver,
        is_software = profile.is_software(),
        "selected GPU adapter"
    );
    if profile.is_software() {
        tracing::warn!(
            adapter = %profile.name,
            "software rasterizer detected; expect low frame rates"
        );
    }
    Ok((adapter, profile))
}

pub(crate) struct SurfaceState {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

/// Device, queue and optional window surface owned by one render target.
pub(crate) struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    surface: Option<SurfaceState>,
    kind: TargetKind,
}

impl GpuContext {
    pub(crate) fn new(
        adapter: &wgpu::Adapter,
        kind: TargetKind,
        surface: Option<(wgpu::Surface<'static>, PhysicalSize<u32>)>,
        options: &GpuOptions,
    ) -> Result<Self, PipelineError> {
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some(&format!("{kind} device")),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))
        .map_err(|err| PipelineError::ContextUnavailable {
            context: kind.to_string(),
            reason: err.to_string(),
        })?;

        let surface = surface
            .map(|(surface, size)| {
                configure_surface(adapter, &device, surface, size, options.vsync, kind)
            })
            .transpose()?;

        Ok(Self {
            device,
            queue,
            surface,
            kind,
        })
    }

    pub(crate) fn surface_format(&self) -> Option<wgpu::TextureFormat> {
        self.surface.as_ref().map(|state| state.config.format)
    }

    pub(crate) fn resize_surface(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        if let Some(state) = self.surface.as_mut() {
            state.config.width = size.width;
            state.config.height = size.height;
            state.surface.configure(&self.device, &state.config);
        }
    }

    /// Next swapchain image, or `None` for headless targets.
    ///
    /// Lost and outdated surfaces are reconfigured and reported as a
    /// recoverable [`PipelineError::Surface`].
    pub(crate) fn acquire_frame(&mut self) -> Result<Option<wgpu::SurfaceTexture>, PipelineError> {
        let Some(state) = self.surface.as_mut() else {
            return Ok(None);
        };
        match state.surface.get_current_texture() {
            Ok(frame) => Ok(Some(frame)),
            Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                state.surface.configure(&self.device, &state.config);
                Err(PipelineError::Surface {
                    target: self.kind,
                    reason: err.to_string(),
                })
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(PipelineError::ResourceExhausted {
                target: self.kind,
                reason: "surface out of memory".into(),
            }),
            Err(err) => Err(PipelineError::Surface {
                target: self.kind,
                reason: err.to_string(),
            }),
        }
    }
}

fn configure_surface(
    adapter: &wgpu::Adapter,
    device: &wgpu::Device,
    surface: wgpu::Surface<'static>,
    size: PhysicalSize<u32>,
    vsync: bool,
    kind: TargetKind,
) -> Result<SurfaceState, PipelineError> {
    let caps = surface.get_capabilities(adapter);
    // Canvases hold display-referred values, so present them without an sRGB encode.
    let format = caps
        .formats
        .iter()
        .copied()
        .find(|format| !format.is_srgb())
        .or_else(|| caps.formats.first().copied())
        .ok_or_else(|| PipelineError::ContextUnavailable {
            context: kind.to_string(),
            reason: "surface is not supported by the selected adapter".into(),
        })?;
    if format.is_srgb() {
        tracing::warn!(?format, render_target = %kind, "no non-sRGB surface format available");
    }

    let fifo = wgpu::PresentMode::Fifo;
    let present_mode = if vsync {
        fifo
    } else {
        [wgpu::PresentMode::Immediate, wgpu::PresentMode::Mailbox]
            .into_iter()
            .find(|mode| caps.present_modes.contains(mode))
            .unwrap_or(fifo)
    };
    tracing::debug!(?format, ?present_mode, render_target = %kind, "configuring surface");

    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode,
        alpha_mode: caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto),
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(device, &config);
    Ok(SurfaceState { surface, config })
}
