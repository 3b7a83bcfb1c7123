use std::path::{Path, PathBuf};

use log::*;
use serde::{Deserialize, Serialize};

use super::json::ReflectionJson;
use super::{ShaderAsset, Visibility};

pub const SHADER_ASSET_EXTENSION: &str = "shdr";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum ShaderTarget {
    #[default]
    Spirv,
    Wgsl,
}

pub struct Config {
    /// the directory to read slang files from
    pub shaders_source_dir: PathBuf,
    /// the directory to write shader assets (and json) to
    pub compiled_shaders_dir: PathBuf,
    /// extra directories searched by slang imports
    pub include_paths: Vec<PathBuf>,
    pub target: ShaderTarget,
    /// whether to also write the reflection json next to each asset
    pub write_json: bool,
}

/// the file names of every .slang file directly inside a directory, sorted
pub fn slang_source_files(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut slang_file_names: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry_res| entry_res.ok())
        .map(|dir_entry| dir_entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "slang"))
        .filter_map(|path| {
            path.file_name()
                .and_then(|os_str| os_str.to_str())
                .map(|s| s.to_string())
        })
        .collect();

    slang_file_names.sort();

    Ok(slang_file_names)
}

pub fn stage_suffix(stage: Visibility) -> &'static str {
    if stage.contains(Visibility::COMPUTE) {
        "compute"
    } else if stage.contains(Visibility::VERTEX) {
        "vertex"
    } else if stage.contains(Visibility::FRAGMENT) {
        "fragment"
    } else {
        "unknown"
    }
}

/// writes '<stem>.<stage>.shdr', plus '<stem>.<stage>.json' if configured
pub fn write_baked_shader(
    config: &Config,
    source_file_name: &str,
    asset: &ShaderAsset,
) -> anyhow::Result<PathBuf> {
    let stem = source_file_name.trim_end_matches(".slang");
    let stage = stage_suffix(asset.entry_stage);

    std::fs::create_dir_all(&config.compiled_shaders_dir)?;

    let asset_file_name = format!("{stem}.{stage}.{SHADER_ASSET_EXTENSION}");
    let asset_path = config.compiled_shaders_dir.join(asset_file_name);
    asset.write_to_file(&asset_path)?;

    if config.write_json {
        let reflection_json = ReflectionJson::from_asset(source_file_name, asset);
        let reflection_json = serde_json::to_string_pretty(&reflection_json)?;
        let json_path = asset_path.with_extension("json");
        std::fs::write(json_path, reflection_json)?;
    }

    info!(
        "wrote {} ({} bindings, {} bytes of code)",
        asset_path.display(),
        asset.bindings.len(),
        asset.code.len()
    );

    Ok(asset_path)
}

/// decodes a baked asset for display
pub fn inspect(path: &Path) -> anyhow::Result<ReflectionJson> {
    let asset = ShaderAsset::read_from_file(path)?;

    let file_name = path
        .file_name()
        .and_then(|os_str| os_str.to_str())
        .unwrap_or_default();

    Ok(ReflectionJson::from_asset(file_name, &asset))
}

#[cfg(feature = "slang")]
pub fn bake_shader(
    config: &Config,
    source_file_name: &str,
    entry_point: &str,
) -> anyhow::Result<PathBuf> {
    let compiler =
        super::compiler::SlangCompiler::new(config.include_paths.clone(), config.target)?;
    let source_path = config.shaders_source_dir.join(source_file_name);

    let asset = compiler.compile(&source_path, entry_point)?;

    write_baked_shader(config, source_file_name, &asset)
}

/// compiles every entry point of every slang file in the source dir
#[cfg(feature = "slang")]
pub fn bake_all(config: &Config) -> anyhow::Result<Vec<PathBuf>> {
    let compiler =
        super::compiler::SlangCompiler::new(config.include_paths.clone(), config.target)?;

    let mut written = vec![];
    for slang_file_name in slang_source_files(&config.shaders_source_dir)? {
        let source_path = config.shaders_source_dir.join(&slang_file_name);

        let entry_points = compiler.entry_point_names(&source_path)?;
        if entry_points.is_empty() {
            warn!("{slang_file_name} has no entry points");
        }

        for entry_point in entry_points {
            let asset = compiler.compile(&source_path, &entry_point)?;
            written.push(write_baked_shader(config, &slang_file_name, &asset)?);
        }
    }

    Ok(written)
}
