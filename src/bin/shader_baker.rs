use std::path::PathBuf;

use clap::{Parser, Subcommand};
use slang_layout_cache::build_tasks::{self, Config, ShaderTarget};

#[derive(Parser, Debug)]
#[command(
    name = "shader_baker",
    about = "Compile slang entry points into reflected shader assets, or inspect baked ones."
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile one entry point of one slang file
    Bake {
        /// The slang source file
        #[arg(short, long, value_name = "PATH")]
        input: PathBuf,

        /// The entry point to compile
        #[arg(short, long)]
        entry: String,

        /// The directory to write the asset to
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,

        /// Extra directories searched by slang imports
        #[arg(short = 'I', long = "include", value_name = "DIR")]
        include_paths: Vec<PathBuf>,

        #[arg(long, value_enum, default_value_t = ShaderTarget::Spirv)]
        target: ShaderTarget,

        /// Also write the reflection json next to the asset
        #[arg(long, action = clap::ArgAction::SetTrue)]
        json: bool,
    },

    /// Compile every entry point of every slang file in a directory
    BakeDir {
        source: PathBuf,
        output: PathBuf,

        #[arg(short = 'I', long = "include", value_name = "DIR")]
        include_paths: Vec<PathBuf>,

        #[arg(long, value_enum, default_value_t = ShaderTarget::Spirv)]
        target: ShaderTarget,

        #[arg(long, action = clap::ArgAction::SetTrue)]
        json: bool,
    },

    /// Decode a baked asset and print its reflection as json
    Inspect { path: PathBuf },
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let args = Args::parse();

    match args.command {
        Command::Bake {
            input,
            entry,
            output,
            include_paths,
            target,
            json,
        } => {
            let Some(shaders_source_dir) = input.parent().map(PathBuf::from) else {
                anyhow::bail!("input has no parent directory: {}", input.display());
            };
            let Some(source_file_name) = input.file_name().and_then(|s| s.to_str()) else {
                anyhow::bail!("input is not a file: {}", input.display());
            };

            let config = Config {
                shaders_source_dir,
                compiled_shaders_dir: output,
                include_paths,
                target,
                write_json: json,
            };

            bake(&config, source_file_name, &entry)
        }

        Command::BakeDir {
            source,
            output,
            include_paths,
            target,
            json,
        } => {
            let config = Config {
                shaders_source_dir: source,
                compiled_shaders_dir: output,
                include_paths,
                target,
                write_json: json,
            };

            bake_dir(&config)
        }

        Command::Inspect { path } => {
            let reflection_json = build_tasks::inspect(&path)?;
            println!("{}", serde_json::to_string_pretty(&reflection_json)?);
            Ok(())
        }
    }
}

#[cfg(feature = "slang")]
fn bake(config: &Config, source_file_name: &str, entry_point: &str) -> anyhow::Result<()> {
    let written = build_tasks::bake_shader(config, source_file_name, entry_point)?;
    println!("{}", written.display());
    Ok(())
}

#[cfg(feature = "slang")]
fn bake_dir(config: &Config) -> anyhow::Result<()> {
    for written in build_tasks::bake_all(config)? {
        println!("{}", written.display());
    }
    Ok(())
}

#[cfg(not(feature = "slang"))]
fn bake(_config: &Config, _source_file_name: &str, _entry_point: &str) -> anyhow::Result<()> {
    anyhow::bail!("shader_baker was built without the 'slang' feature")
}

#[cfg(not(feature = "slang"))]
fn bake_dir(_config: &Config) -> anyhow::Result<()> {
    anyhow::bail!("shader_baker was built without the 'slang' feature")
}
