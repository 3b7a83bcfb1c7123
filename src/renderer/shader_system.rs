use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::*;

use crate::error::{CacheError, MergeError, ShaderLoadError};
use crate::shaders::reflection::merge;
use crate::shaders::{MAX_BIND_GROUPS, ShaderAsset, ShaderReflection, Visibility};

use super::{
    BindGroupLayoutHandle, GraphicsDevice, LayoutCache, LayoutEntry, PipelineCache,
    PipelineHandle, PipelineKey, ShaderSystemConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderHandle(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderModuleHandle(pub(super) usize);

#[derive(Debug, Clone)]
pub struct StageModule {
    pub module: ShaderModuleHandle,
    pub entry_point: String,
}

/// one or more compiled stages sharing a single reflection
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    pub reflection: ShaderReflection,
    pub vertex: Option<StageModule>,
    pub fragment: Option<StageModule>,
    pub compute: Option<StageModule>,
    pub bind_group_layouts: [BindGroupLayoutHandle; MAX_BIND_GROUPS],
}

impl ShaderProgram {
    pub fn stages(&self) -> Visibility {
        let mut stages = Visibility::empty();
        stages.set(Visibility::VERTEX, self.vertex.is_some());
        stages.set(Visibility::FRAGMENT, self.fragment.is_some());
        stages.set(Visibility::COMPUTE, self.compute.is_some());
        stages
    }
}

/// owns the device, its caches, and every loaded shader
///
/// not thread-safe; callers loading from several threads must serialize access
pub struct ShaderSystem<D: GraphicsDevice> {
    device: D,
    layouts: LayoutCache<D>,
    pipelines: PipelineCache<D>,
    global_layout: BindGroupLayoutHandle,

    modules: Vec<D::ShaderModule>,
    programs: Vec<ShaderProgram>,

    loaded_shaders: HashMap<PathBuf, ShaderHandle>,
    loaded_render_shaders: HashMap<(PathBuf, PathBuf), ShaderHandle>,
}

impl<D: GraphicsDevice> ShaderSystem<D> {
    pub fn new(mut device: D, config: ShaderSystemConfig) -> Result<Self, CacheError> {
        let mut layouts = LayoutCache::new();
        let global_layout = layouts.get_layout(&mut device, &config.global_layout)?;

        Ok(Self {
            device,
            layouts,
            pipelines: PipelineCache::new(),
            global_layout,
            modules: vec![],
            programs: vec![],
            loaded_shaders: HashMap::new(),
            loaded_render_shaders: HashMap::new(),
        })
    }

    /// registers a single-stage shader asset
    pub fn create_shader(&mut self, asset: &ShaderAsset) -> Result<ShaderHandle, CacheError> {
        let stage = asset.entry_stage;
        if ![Visibility::VERTEX, Visibility::FRAGMENT, Visibility::COMPUTE].contains(&stage) {
            return Err(CacheError::UnknownStage(stage));
        }

        let reflection = asset.reflection()?;
        let bind_group_layouts = self.resolve_layouts(&reflection)?;

        let module = self.device.create_shader_module(stage, &asset.code)?;
        let module_handle = ShaderModuleHandle(self.modules.len());
        self.modules.push(module);

        let stage_module = Some(StageModule {
            module: module_handle,
            entry_point: asset.entry_point.clone(),
        });

        let mut program = ShaderProgram {
            reflection,
            vertex: None,
            fragment: None,
            compute: None,
            bind_group_layouts,
        };
        if stage == Visibility::VERTEX {
            program.vertex = stage_module;
        } else if stage == Visibility::FRAGMENT {
            program.fragment = stage_module;
        } else {
            program.compute = stage_module;
        }

        Ok(self.add_program(program))
    }

    /// combines programs with disjoint stages (usually a vertex and a fragment shader)
    ///
    /// nothing is registered if the stages overlap or the bindings conflict
    pub fn merge_shaders(
        &mut self,
        a: ShaderHandle,
        b: ShaderHandle,
    ) -> Result<ShaderHandle, CacheError> {
        let first = self.program(a)?;
        let second = self.program(b)?;

        let overlap = first.stages() & second.stages();
        if !overlap.is_empty() {
            return Err(MergeError::StageOverlap(overlap).into());
        }

        let reflection = merge(&first.reflection, &second.reflection)?;

        let vertex = first.vertex.clone().or_else(|| second.vertex.clone());
        let fragment = first.fragment.clone().or_else(|| second.fragment.clone());
        let compute = first.compute.clone().or_else(|| second.compute.clone());

        let bind_group_layouts = self.resolve_layouts(&reflection)?;

        Ok(self.add_program(ShaderProgram {
            reflection,
            vertex,
            fragment,
            compute,
            bind_group_layouts,
        }))
    }

    /// reads, decodes and registers a shader asset, once per path
    pub fn load_shader(&mut self, path: impl AsRef<Path>) -> Result<ShaderHandle, ShaderLoadError> {
        let path = path.as_ref();
        if let Some(handle) = self.loaded_shaders.get(path) {
            trace!("shader already loaded: {}", path.display());
            return Ok(*handle);
        }

        let asset = ShaderAsset::read_from_file(path)?;
        let handle = self.create_shader(&asset)?;
        self.loaded_shaders.insert(path.to_path_buf(), handle);

        info!(
            "loaded shader {} ({}, {} bindings)",
            path.display(),
            asset.entry_stage,
            asset.bindings.len()
        );

        Ok(handle)
    }

    /// loads a vertex and a fragment asset and merges them into one render program
    pub fn load_render_shader(
        &mut self,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
    ) -> Result<ShaderHandle, ShaderLoadError> {
        let key = (
            vertex_path.as_ref().to_path_buf(),
            fragment_path.as_ref().to_path_buf(),
        );
        if let Some(handle) = self.loaded_render_shaders.get(&key) {
            return Ok(*handle);
        }

        let vertex = self.load_shader(&key.0)?;
        let fragment = self.load_shader(&key.1)?;
        let handle = self.merge_shaders(vertex, fragment)?;
        self.loaded_render_shaders.insert(key, handle);

        Ok(handle)
    }

    pub fn get_render_pipeline(&mut self, key: &PipelineKey) -> Result<PipelineHandle, CacheError> {
        let program = self
            .programs
            .get(key.shader.0)
            .ok_or(CacheError::UnknownShader(key.shader.0))?;

        self.pipelines.get_render_pipeline(
            &mut self.device,
            &mut self.layouts,
            self.global_layout,
            program,
            &self.modules,
            key,
        )
    }

    pub fn program(&self, handle: ShaderHandle) -> Result<&ShaderProgram, CacheError> {
        self.programs
            .get(handle.0)
            .ok_or(CacheError::UnknownShader(handle.0))
    }

    pub fn reflection(&self, handle: ShaderHandle) -> Result<&ShaderReflection, CacheError> {
        Ok(&self.program(handle)?.reflection)
    }

    /// the native layout of one set of a shader, for building its bind groups
    pub fn bind_group_layout(
        &self,
        handle: ShaderHandle,
        set: usize,
    ) -> Result<Option<&D::BindGroupLayout>, CacheError> {
        let program = self.program(handle)?;

        Ok(program
            .bind_group_layouts
            .get(set)
            .map(|layout| self.layouts.layout(*layout)))
    }

    pub fn global_layout(&self) -> &D::BindGroupLayout {
        self.layouts.layout(self.global_layout)
    }

    pub fn pipeline(&self, handle: PipelineHandle) -> &D::RenderPipeline {
        self.pipelines.pipeline(handle)
    }

    pub fn layouts(&self) -> &LayoutCache<D> {
        &self.layouts
    }

    pub fn pipelines(&self) -> &PipelineCache<D> {
        &self.pipelines
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    fn resolve_layouts(
        &mut self,
        reflection: &ShaderReflection,
    ) -> Result<[BindGroupLayoutHandle; MAX_BIND_GROUPS], CacheError> {
        let mut handles = [self.global_layout; MAX_BIND_GROUPS];

        for (set, handle) in handles.iter_mut().enumerate() {
            let group = reflection.group(set);
            let entries: Vec<LayoutEntry> = group.iter().map(LayoutEntry::from).collect();
            *handle = self.layouts.get_layout(&mut self.device, &entries)?;
        }

        if !reflection.group(0).is_empty() && handles[0] != self.global_layout {
            warn!("shader declares set 0 bindings that differ from the global layout");
        }

        Ok(handles)
    }

    fn add_program(&mut self, program: ShaderProgram) -> ShaderHandle {
        let handle = ShaderHandle(self.programs.len());

        debug!(
            "registered shader {handle:?} ({}, {} bindings)",
            program.stages(),
            program.reflection.bindings().len()
        );
        self.programs.push(program);

        handle
    }
}

impl<D: GraphicsDevice> Drop for ShaderSystem<D> {
    fn drop(&mut self) {
        std::mem::take(&mut self.pipelines).destroy(&mut self.device);
        std::mem::take(&mut self.layouts).destroy(&mut self.device);

        for module in self.modules.drain(..) {
            self.device.destroy_shader_module(module);
        }
    }
}
