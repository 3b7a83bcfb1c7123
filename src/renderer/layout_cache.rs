use std::collections::HashMap;

use log::*;

use crate::error::CacheError;
use crate::shaders::BindingDescriptor;

use super::{GraphicsDevice, LayoutEntry, LayoutKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindGroupLayoutHandle(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineLayoutHandle(usize);

/// deduplicates bind group layouts by structure, and pipeline layouts by layout identity
///
/// owns every native object it creates; handles stay valid for as long as the cache that
/// issued them, since [`LayoutCache::destroy`] consumes it
pub struct LayoutCache<D: GraphicsDevice> {
    layouts: Vec<D::BindGroupLayout>,
    layout_lookup: HashMap<LayoutKey, BindGroupLayoutHandle>,

    pipeline_layouts: Vec<D::PipelineLayout>,
    pipeline_layout_lookup: HashMap<Vec<BindGroupLayoutHandle>, PipelineLayoutHandle>,
}

impl<D: GraphicsDevice> Default for LayoutCache<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: GraphicsDevice> LayoutCache<D> {
    pub fn new() -> Self {
        Self {
            layouts: vec![],
            layout_lookup: HashMap::new(),
            pipeline_layouts: vec![],
            pipeline_layout_lookup: HashMap::new(),
        }
    }

    /// entries must already be sorted by slot; unsorted input is an error, not a cache miss
    pub fn get_layout(
        &mut self,
        device: &mut D,
        entries: &[LayoutEntry],
    ) -> Result<BindGroupLayoutHandle, CacheError> {
        for pair in entries.windows(2) {
            if pair[0].slot >= pair[1].slot {
                return Err(CacheError::UnsortedEntries {
                    previous: pair[0].slot,
                    next: pair[1].slot,
                });
            }
        }

        let key = LayoutKey::new(entries);
        if let Some(handle) = self.layout_lookup.get(&key) {
            trace!("bind group layout cache hit: {handle:?}");
            return Ok(*handle);
        }

        let layout = device.create_bind_group_layout(key.entries())?;
        let handle = BindGroupLayoutHandle(self.layouts.len());
        self.layouts.push(layout);
        self.layout_lookup.insert(key, handle);

        debug!(
            "created bind group layout {handle:?} with {} entries",
            entries.len()
        );

        Ok(handle)
    }

    /// the layout for one set of a reflection (already sorted by slot)
    pub fn get_layout_for_group(
        &mut self,
        device: &mut D,
        group: &[BindingDescriptor],
    ) -> Result<BindGroupLayoutHandle, CacheError> {
        let entries: Vec<LayoutEntry> = group.iter().map(LayoutEntry::from).collect();
        self.get_layout(device, &entries)
    }

    /// keyed on the handle sequence; equal handles already mean equal layouts
    pub fn get_pipeline_layout(
        &mut self,
        device: &mut D,
        bind_group_layouts: &[BindGroupLayoutHandle],
    ) -> Result<PipelineLayoutHandle, CacheError> {
        if let Some(handle) = self.pipeline_layout_lookup.get(bind_group_layouts) {
            trace!("pipeline layout cache hit: {handle:?}");
            return Ok(*handle);
        }

        let native_layouts: Vec<&D::BindGroupLayout> = bind_group_layouts
            .iter()
            .map(|handle| &self.layouts[handle.0])
            .collect();
        let pipeline_layout = device.create_pipeline_layout(&native_layouts)?;

        let handle = PipelineLayoutHandle(self.pipeline_layouts.len());
        self.pipeline_layouts.push(pipeline_layout);
        self.pipeline_layout_lookup
            .insert(bind_group_layouts.to_vec(), handle);

        debug!("created pipeline layout {handle:?} from {bind_group_layouts:?}");

        Ok(handle)
    }

    pub fn layout(&self, handle: BindGroupLayoutHandle) -> &D::BindGroupLayout {
        &self.layouts[handle.0]
    }

    pub fn pipeline_layout(&self, handle: PipelineLayoutHandle) -> &D::PipelineLayout {
        &self.pipeline_layouts[handle.0]
    }

    pub fn layout_count(&self) -> usize {
        self.layouts.len()
    }

    pub fn pipeline_layout_count(&self) -> usize {
        self.pipeline_layouts.len()
    }

    /// hands every native object back to the device
    pub fn destroy(self, device: &mut D) {
        for pipeline_layout in self.pipeline_layouts {
            device.destroy_pipeline_layout(pipeline_layout);
        }

        for layout in self.layouts {
            device.destroy_bind_group_layout(layout);
        }
    }
}
