//! Render Target Manager
//!
//! Owns the fixed set of GPU framebuffers the pass sequence renders
//! through, sized to the current output resolution:
//!
//! | Target | Format | Resolution | Notes |
//! |--------|--------|------------|-------|
//! | Albedo | `Rgba8Unorm` | full | G-buffer |
//! | Normal | `Rgba16Float` | full | G-buffer, world-space |
//! | Emission | `Rgba16Float` | full | G-buffer |
//! | ORM | `Rgba8Unorm` | full | G-buffer |
//! | Depth | `Depth32Float` | full | reverse-Z, sampled by SSAO/fog/… |
//! | Diffuse / Specular | `Rgba16Float` | full | lighting accumulation |
//! | Scene ×2 | `Rgba16Float` | full | ping-pong color chain |
//! | SSAO ×2 | `R8Unorm` | half | ping-pong (sample + blur) |
//! | SSIL ×2 | `Rgba16Float` | half | ping-pong (sample + blur) |
//! | SSR | `Rgba16Float` | half, mipped | roughness-aware sampling |
//! | Bloom | `Rgba16Float` | half, mipped | downsample/upsample chain |
//!
//! Targets are allocated once at initialization/resize and reused every
//! frame; allocation failure is fatal and reported before any frame runs.
//!
//! # Ping-pong semantics
//!
//! A ping-pong target is two physical textures behind one logical name.
//! [`PingPong::swap`] flips which one is the write destination and returns
//! the *previous* buffer as the read source, so a pass can sample the last
//! result while producing the next. Swaps happen only at pass boundaries.

pub mod mipmap;

use crate::errors::{EmberError, Result};
use crate::settings::{DEPTH_TEXTURE_FORMAT, HDR_TEXTURE_FORMAT};

/// Logical handle into the pool. Ping-pong handles (`Scene`, `Ssao`,
/// `Ssil`) resolve to their current *read* buffer through
/// [`TargetPool::get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetId {
    Albedo,
    Normal,
    Emission,
    Orm,
    Depth,
    Diffuse,
    Specular,
    Scene,
    Ssao,
    Ssil,
    Ssr,
    Bloom,
}

/// Current-buffer state of a ping-pong pair. Pure index logic, so the
/// alternation contract is testable without a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PingPong {
    current: usize,
}

impl PingPong {
    /// Flips the pair and returns `(write_index, read_index)`: the
    /// now-active destination and the previous buffer, safe to sample.
    pub fn swap(&mut self) -> (usize, usize) {
        let read = self.current;
        let write = 1 - self.current;
        self.current = write;
        (write, read)
    }

    /// Index of the buffer holding the most recently written result.
    #[must_use]
    pub const fn read_index(self) -> usize {
        self.current
    }
}

struct PooledTexture {
    #[allow(dead_code)]
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// A mip-chained target plus its per-level render views.
pub struct MipChainTarget {
    pub texture: wgpu::Texture,
    /// Full-chain sampling view.
    pub view: wgpu::TextureView,
    /// Single-level views for rendering into individual mips.
    pub mip_views: Vec<wgpu::TextureView>,
}

impl MipChainTarget {
    #[must_use]
    pub fn mip_count(&self) -> u32 {
        self.mip_views.len() as u32
    }

    /// Pixel size of a mip level.
    #[must_use]
    pub fn mip_size(&self, level: u32) -> (u32, u32) {
        (
            (self.texture.width() >> level).max(1),
            (self.texture.height() >> level).max(1),
        )
    }
}

/// The fixed render target pool.
pub struct TargetPool {
    size: (u32, u32),

    albedo: PooledTexture,
    normal: PooledTexture,
    emission: PooledTexture,
    orm: PooledTexture,
    depth: PooledTexture,
    diffuse: PooledTexture,
    specular: PooledTexture,

    scene: [PooledTexture; 2],
    pub scene_chain: PingPong,
    ssao: [PooledTexture; 2],
    pub ssao_chain: PingPong,
    ssil: [PooledTexture; 2],
    pub ssil_chain: PingPong,

    ssr: MipChainTarget,
    bloom: MipChainTarget,
}

impl TargetPool {
    /// Allocates the full pool for an output resolution.
    ///
    /// # Errors
    ///
    /// [`EmberError::ZeroSizedTarget`] for a degenerate resolution;
    /// [`EmberError::TargetAllocationFailed`] when the device rejects an
    /// allocation. Both are fatal: no frame may run until the pool is
    /// recreated.
    pub fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        mip_chain_levels: u32,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(EmberError::ZeroSizedTarget { width, height });
        }

        let error_scope = device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let half = ((width / 2).max(1), (height / 2).max(1));
        let color_usage =
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;

        let make = |label, size: (u32, u32), format| {
            Self::create(device, label, size, format, color_usage, 1)
        };

        let pool = Self {
            size: (width, height),
            albedo: make("GBuffer Albedo", (width, height), wgpu::TextureFormat::Rgba8Unorm),
            normal: make("GBuffer Normal", (width, height), HDR_TEXTURE_FORMAT),
            emission: make("GBuffer Emission", (width, height), HDR_TEXTURE_FORMAT),
            orm: make("GBuffer ORM", (width, height), wgpu::TextureFormat::Rgba8Unorm),
            depth: make("Scene Depth", (width, height), DEPTH_TEXTURE_FORMAT),
            diffuse: make("Lighting Diffuse", (width, height), HDR_TEXTURE_FORMAT),
            specular: make("Lighting Specular", (width, height), HDR_TEXTURE_FORMAT),
            scene: [
                make("Scene Color 0", (width, height), HDR_TEXTURE_FORMAT),
                make("Scene Color 1", (width, height), HDR_TEXTURE_FORMAT),
            ],
            scene_chain: PingPong::default(),
            ssao: [
                make("SSAO 0", half, wgpu::TextureFormat::R8Unorm),
                make("SSAO 1", half, wgpu::TextureFormat::R8Unorm),
            ],
            ssao_chain: PingPong::default(),
            ssil: [
                make("SSIL 0", half, HDR_TEXTURE_FORMAT),
                make("SSIL 1", half, HDR_TEXTURE_FORMAT),
            ],
            ssil_chain: PingPong::default(),
            ssr: Self::create_mip_chain(device, "SSR", half, mip_chain_levels),
            bloom: Self::create_mip_chain(device, "Bloom", half, mip_chain_levels),
        };

        if let Some(err) = pollster::block_on(error_scope.pop()) {
            log::error!("Render target allocation failed: {err}");
            return Err(EmberError::TargetAllocationFailed {
                label: "target pool",
                reason: err.to_string(),
            });
        }

        Ok(pool)
    }

    /// Drops and reallocates the pool at a new resolution.
    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
        mip_chain_levels: u32,
    ) -> Result<()> {
        if (width, height) == self.size {
            return Ok(());
        }
        *self = Self::new(device, width, height, mip_chain_levels)?;
        Ok(())
    }

    fn create(
        device: &wgpu::Device,
        label: &'static str,
        size: (u32, u32),
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
        mip_level_count: u32,
    ) -> PooledTexture {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        PooledTexture { texture, view }
    }

    fn create_mip_chain(
        device: &wgpu::Device,
        label: &'static str,
        size: (u32, u32),
        levels: u32,
    ) -> MipChainTarget {
        // Clamp so the smallest level stays at least 1×1.
        let max_levels = 32 - size.0.min(size.1).leading_zeros();
        let levels = levels.clamp(1, max_levels.max(1));

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: HDR_TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mip_views = (0..levels)
            .map(|mip| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(label),
                    base_mip_level: mip,
                    mip_level_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        MipChainTarget {
            texture,
            view,
            mip_views,
        }
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    #[must_use]
    pub fn half_size(&self) -> (u32, u32) {
        ((self.size.0 / 2).max(1), (self.size.1 / 2).max(1))
    }

    /// Resolves a logical target to its sampleable view. Ping-pong targets
    /// resolve to the buffer written most recently.
    #[must_use]
    pub fn get(&self, id: TargetId) -> &wgpu::TextureView {
        match id {
            TargetId::Albedo => &self.albedo.view,
            TargetId::Normal => &self.normal.view,
            TargetId::Emission => &self.emission.view,
            TargetId::Orm => &self.orm.view,
            TargetId::Depth => &self.depth.view,
            TargetId::Diffuse => &self.diffuse.view,
            TargetId::Specular => &self.specular.view,
            TargetId::Scene => &self.scene[self.scene_chain.read_index()].view,
            TargetId::Ssao => &self.ssao[self.ssao_chain.read_index()].view,
            TargetId::Ssil => &self.ssil[self.ssil_chain.read_index()].view,
            TargetId::Ssr => &self.ssr.view,
            TargetId::Bloom => &self.bloom.view,
        }
    }

    /// Flips the scene chain: returns the new write destination and the
    /// previous buffer as read source.
    pub fn swap_scene(&mut self) -> (&wgpu::TextureView, &wgpu::TextureView) {
        let (write, read) = self.scene_chain.swap();
        (&self.scene[write].view, &self.scene[read].view)
    }

    pub fn swap_ssao(&mut self) -> (&wgpu::TextureView, &wgpu::TextureView) {
        let (write, read) = self.ssao_chain.swap();
        (&self.ssao[write].view, &self.ssao[read].view)
    }

    pub fn swap_ssil(&mut self) -> (&wgpu::TextureView, &wgpu::TextureView) {
        let (write, read) = self.ssil_chain.swap();
        (&self.ssil[write].view, &self.ssil[read].view)
    }

    #[must_use]
    pub fn ssr(&self) -> &MipChainTarget {
        &self.ssr
    }

    #[must_use]
    pub fn bloom(&self) -> &MipChainTarget {
        &self.bloom
    }

    #[must_use]
    pub fn mip_count(&self) -> u32 {
        self.bloom.mip_count()
    }
}
