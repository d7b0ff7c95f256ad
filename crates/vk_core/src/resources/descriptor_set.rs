//! Descriptor set layouts and the per-texture descriptor set cache
//!
//! Every draw binds one set: binding 0 is the dynamic uniform buffer holding
//! the MVP slots, followed by one combined image sampler per texture stage.
//! Sets are created on first use of a texture (or ordered texture pair) and
//! kept until the pool is destroyed at shutdown.

use ash::vk;
use std::collections::HashMap;

use super::texture::Texture;
use super::ResourceManager;
use crate::backend::GpuDevice;
use crate::{VulkanError, VulkanResult};

/// Descriptor set layout builder for creating reusable layouts
#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Create a new descriptor set layout builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dynamic-offset uniform buffer binding
    pub fn add_dynamic_uniform_buffer(mut self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Add a combined image sampler binding
    pub fn add_combined_image_sampler(mut self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Bindings added so far
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }

    /// Build the descriptor set layout
    pub fn build(self, device: &dyn GpuDevice) -> VulkanResult<vk::DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);
        device.create_descriptor_set_layout(&layout_info)
    }
}

/// Layout for a uniform block plus `stages` sampled textures
pub fn texture_stage_layout(stages: u32) -> DescriptorSetLayoutBuilder {
    (1..=stages).fold(
        DescriptorSetLayoutBuilder::new().add_dynamic_uniform_buffer(0, vk::ShaderStageFlags::VERTEX),
        |builder, binding| builder.add_combined_image_sampler(binding, vk::ShaderStageFlags::FRAGMENT),
    )
}

/// Identity of the textures a descriptor set points at
///
/// Pairs are ordered: `Multi(a, b)` and `Multi(b, a)` are different sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKey {
    /// One texture stage
    Single(vk::Image),
    /// Two texture stages, in binding order
    Multi(vk::Image, vk::Image),
}

impl DescriptorKey {
    /// Key for a one- or two-texture binding
    pub fn for_textures(textures: &[Texture]) -> VulkanResult<Self> {
        match textures {
            [only] => Ok(Self::Single(only.image)),
            [first, second] => Ok(Self::Multi(first.image, second.image)),
            _ => Err(VulkanError::InvalidOperation {
                reason: format!("Draws take one or two textures, got {}", textures.len()),
            }),
        }
    }
}

/// Lazily populated map from texture identity to descriptor set
pub struct DescriptorSetCache {
    pool: vk::DescriptorPool,
    single_layout: vk::DescriptorSetLayout,
    multi_layout: vk::DescriptorSetLayout,
    uniform: vk::DescriptorBufferInfo,
    sets: HashMap<DescriptorKey, vk::DescriptorSet>,
}

impl DescriptorSetCache {
    /// Create the layouts and a pool for up to `max_sets` sets
    ///
    /// `uniform_buffer` is bound at binding 0 of every set with a range of
    /// one slot; the slot is selected per draw by the dynamic offset.
    pub fn new(
        resources: &mut ResourceManager,
        uniform_buffer: vk::Buffer,
        slot_size: vk::DeviceSize,
        max_sets: u32,
    ) -> VulkanResult<Self> {
        let device = resources.device();
        let single_layout = texture_stage_layout(1).build(&*device)?;
        let single_layout = resources.registry.register_descriptor_set_layout(single_layout);
        let multi_layout = texture_stage_layout(2).build(&*device)?;
        let multi_layout = resources.registry.register_descriptor_set_layout(multi_layout);

        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                descriptor_count: max_sets,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: max_sets * 2,
            },
        ];
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);
        let pool = device.create_descriptor_pool(&pool_info)?;
        let pool = resources.registry.register_descriptor_pool(pool);

        Ok(Self {
            pool,
            single_layout,
            multi_layout,
            uniform: vk::DescriptorBufferInfo {
                buffer: uniform_buffer,
                offset: 0,
                range: slot_size,
            },
            sets: HashMap::new(),
        })
    }

    /// Layout of single-texture sets
    pub fn single_layout(&self) -> vk::DescriptorSetLayout {
        self.single_layout
    }

    /// Layout of two-texture sets
    pub fn multi_layout(&self) -> vk::DescriptorSetLayout {
        self.multi_layout
    }

    /// Number of sets created so far
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether no set has been created yet
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Return the cached set for `textures`, creating and writing it on first use
    pub fn get_or_create(&mut self, device: &dyn GpuDevice, textures: &[Texture]) -> VulkanResult<vk::DescriptorSet> {
        let key = DescriptorKey::for_textures(textures)?;
        if let Some(&set) = self.sets.get(&key) {
            return Ok(set);
        }

        let layout = match key {
            DescriptorKey::Single(_) => self.single_layout,
            DescriptorKey::Multi(..) => self.multi_layout,
        };
        let set = device.allocate_descriptor_set(self.pool, layout)?;

        let image_infos: Vec<vk::DescriptorImageInfo> = textures
            .iter()
            .map(|texture| vk::DescriptorImageInfo {
                sampler: texture.sampler,
                image_view: texture.view,
                image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            })
            .collect();

        let mut writes = vec![vk::WriteDescriptorSet::builder()
            .dst_set(set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
            .buffer_info(std::slice::from_ref(&self.uniform))
            .build()];
        writes.extend((1u32..).zip(&image_infos).map(|(binding, info)| {
            vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(binding)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(std::slice::from_ref(info))
                .build()
        }));
        device.update_descriptor_sets(&writes);

        log::debug!("Created descriptor set {set:?} for {key:?}");
        self.sets.insert(key, set);
        Ok(set)
    }
}
