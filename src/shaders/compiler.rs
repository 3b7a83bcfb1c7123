use std::ffi::CString;
use std::path::{Path, PathBuf};

use glam::UVec3;
use log::*;
use shader_slang as slang;
use shader_slang::Downcast;

use crate::error::CompileError;

use super::build_tasks::ShaderTarget;
use super::reflection::{extract_reflection, slang as slang_reflection};
use super::{COLUMN_MAJOR, ShaderAsset, Visibility};

/// compiles single slang entry points into shader assets
pub struct SlangCompiler {
    global_session: slang::GlobalSession,
    include_paths: Vec<PathBuf>,
    target: ShaderTarget,
}

impl SlangCompiler {
    pub fn new(include_paths: Vec<PathBuf>, target: ShaderTarget) -> Result<Self, CompileError> {
        let global_session = slang::GlobalSession::new().ok_or(CompileError::InitFailed)?;

        Ok(Self {
            global_session,
            include_paths,
            target,
        })
    }

    fn create_session(
        &self,
        extra_search_path: Option<&Path>,
    ) -> Result<slang::Session, CompileError> {
        let search_paths = self
            .include_paths
            .iter()
            .map(PathBuf::as_path)
            .chain(extra_search_path)
            .map(|path| CString::new(path.to_string_lossy().as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CompileError::CompilationFailed(e.to_string()))?;
        let search_path_ptrs: Vec<_> = search_paths.iter().map(|path| path.as_ptr()).collect();

        let session_options = slang::CompilerOptions::default()
            .vulkan_use_entry_point_name(true)
            .language(slang::SourceLanguage::Slang)
            .optimization(slang::OptimizationLevel::High);
        let session_options = if COLUMN_MAJOR {
            session_options.matrix_layout_column(true)
        } else {
            session_options.matrix_layout_row(true)
        };

        let target_desc = match self.target {
            ShaderTarget::Spirv => slang::TargetDesc::default()
                .format(slang::CompileTarget::Spirv)
                .profile(self.global_session.find_profile("glsl_450+spirv_1_6")),
            ShaderTarget::Wgsl => slang::TargetDesc::default().format(slang::CompileTarget::Wgsl),
        };

        let targets = [target_desc];
        let session_desc = slang::SessionDesc::default()
            .targets(&targets)
            .search_paths(&search_path_ptrs)
            .options(&session_options);

        self.global_session
            .create_session(&session_desc)
            .ok_or(CompileError::InitFailed)
    }

    /// compiles one entry point of a slang file on disk
    pub fn compile(&self, path: &Path, entry_point: &str) -> Result<ShaderAsset, CompileError> {
        if !path.exists() {
            return Err(CompileError::Io {
                path: path.display().to_string(),
            });
        }

        let session = self.create_session(path.parent())?;
        let module_name = path.to_string_lossy();
        let module = session
            .load_module(&module_name)
            .map_err(|e| CompileError::CompilationFailed(e.to_string()))?;

        compile_entry_point(&session, &module, &module_name, entry_point)
    }

    /// compiles one entry point of in-memory slang source
    pub fn compile_from_string(
        &self,
        source: &str,
        module_name: &str,
        entry_point: &str,
    ) -> Result<ShaderAsset, CompileError> {
        let session = self.create_session(None)?;
        let path = format!("{module_name}.slang");
        let module = session
            .load_module_from_source_string(module_name, &path, source)
            .map_err(|e| CompileError::CompilationFailed(e.to_string()))?;

        compile_entry_point(&session, &module, module_name, entry_point)
    }

    /// every entry point a slang file declares with a stage attribute
    pub fn entry_point_names(&self, path: &Path) -> Result<Vec<String>, CompileError> {
        let session = self.create_session(path.parent())?;
        let module = session
            .load_module(&path.to_string_lossy())
            .map_err(|e| CompileError::CompilationFailed(e.to_string()))?;

        let names = module
            .entry_points()
            .map(|entry_point| entry_point.function_reflection().name().to_string())
            .collect();

        Ok(names)
    }
}

fn compile_entry_point(
    session: &slang::Session,
    module: &slang::Module,
    module_name: &str,
    entry_point_name: &str,
) -> Result<ShaderAsset, CompileError> {
    let entry_point = module.find_entry_point_by_name(entry_point_name).ok_or_else(|| {
        CompileError::EntryPointNotFound {
            entry_point: entry_point_name.to_string(),
            module: module_name.to_string(),
        }
    })?;

    let failed = |e: slang::Error| CompileError::CompilationFailed(e.to_string());

    let program = session
        .create_composite_component_type(&[
            module.downcast().clone(),
            entry_point.downcast().clone(),
        ])
        .map_err(failed)?;
    let linked_program = program.link().map_err(failed)?;
    let program_layout = linked_program.layout(0).map_err(failed)?;

    let reflected_entry_point = program_layout.entry_points().next().ok_or_else(|| {
        CompileError::EntryPointNotFound {
            entry_point: entry_point_name.to_string(),
            module: module_name.to_string(),
        }
    })?;

    let stage = slang_reflection::stage_visibility(reflected_entry_point.stage()).ok_or_else(
        || CompileError::UnsupportedStage {
            entry_point: entry_point_name.to_string(),
            stage: format!("{:?}", reflected_entry_point.stage()),
        },
    )?;

    let thread_group_size = if stage == Visibility::COMPUTE {
        let [x, y, z] = reflected_entry_point.compute_thread_group_size();
        UVec3::new(x as u32, y as u32, z as u32)
    } else {
        UVec3::ZERO
    };

    let parameters = slang_reflection::global_parameters(program_layout);
    let reflection = extract_reflection(&parameters, stage)?;

    let code = linked_program.entry_point_code(0, 0).map_err(failed)?;

    info!(
        "compiled {module_name}:{entry_point_name} ({stage}, {} bindings, {} bytes)",
        reflection.bindings().len(),
        code.as_slice().len()
    );

    Ok(ShaderAsset::from_reflection(
        &reflection,
        entry_point_name,
        thread_group_size,
        code.as_slice().to_vec(),
    ))
}
