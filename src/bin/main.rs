//! Material Combiner CLI
//!
//! Combine multi-material objects of a scene description into single-material
//! objects backed by a texture atlas.

use clap::{Parser, Subcommand, ValueEnum};
use material_combiner::{
    count_multi_material_descendants, load_scene, BatchRunner, ColorEncoding, CombineContext,
    CombinerConfig, FsAssetStore, ObjectId, Scene, SceneDescription, ShaderLibrary,
    SoftwareDevice,
};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "material-combiner")]
#[command(author, version, about = "Combine multi-material meshes into one atlas-backed material", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Suppress progress output (only show errors)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Combine objects and write atlas, material and mesh assets
    Combine {
        /// Project root that asset paths are relative to
        #[arg(short, long)]
        project: PathBuf,

        /// Scene description (JSON)
        #[arg(short, long)]
        scene: PathBuf,

        /// Configuration file (JSON); flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Objects to combine by name (default: every root object)
        #[arg(short, long)]
        object: Vec<String>,

        /// Atlas size in pixels
        #[arg(long)]
        atlas_size: Option<u32>,

        /// Padding between textures in pixels
        #[arg(long)]
        padding: Option<u32>,

        /// Output folder inside the project
        #[arg(long)]
        output_base: Option<String>,

        /// Use this shader instead of the source material's
        #[arg(long)]
        shader: Option<String>,

        /// Read textures from this slot instead of the main texture
        #[arg(long)]
        texture_property: Option<String>,

        /// Also combine multi-material descendants
        #[arg(short, long)]
        recursive: bool,

        /// Number output folders instead of timestamping them
        #[arg(long)]
        no_timestamp: bool,

        /// Working colour space
        #[arg(long, value_enum, default_value = "gamma")]
        color_space: ColorSpace,
    },

    /// List objects and their material counts
    Inspect {
        /// Project root that asset paths are relative to
        #[arg(short, long)]
        project: PathBuf,

        /// Scene description (JSON)
        #[arg(short, long)]
        scene: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ColorSpace {
    /// Gamma-encoded textures
    Gamma,
    /// Linear textures
    Linear,
}

impl From<ColorSpace> for ColorEncoding {
    fn from(space: ColorSpace) -> Self {
        match space {
            ColorSpace::Gamma => ColorEncoding::Gamma,
            ColorSpace::Linear => ColorEncoding::Linear,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging (suppressed if --quiet)
    if !cli.quiet {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Info)
            .parse_default_env()
            .init();
    }

    let result = match cli.command {
        Commands::Combine {
            project,
            scene,
            config,
            object,
            atlas_size,
            padding,
            output_base,
            shader,
            texture_property,
            recursive,
            no_timestamp,
            color_space,
        } => load_config(config.as_deref()).and_then(|mut config| {
            if let Some(size) = atlas_size {
                config.atlas_size = size;
            }
            if let Some(padding) = padding {
                config.padding = padding;
            }
            if let Some(base) = output_base {
                config.output_base_path = base;
            }
            if let Some(shader) = shader {
                config = config.with_shader(shader);
            }
            if let Some(property) = texture_property {
                config = config.with_custom_texture_property(property);
            }
            if recursive {
                config.process_children_recursively = true;
            }
            if no_timestamp {
                config.use_timestamp_folder = false;
            }
            config.validate()?;

            combine(&project, &scene, &config, &object, color_space.into(), cli.quiet)
        }),
        Commands::Inspect { project, scene } => inspect(&project, &scene),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn load_config(path: Option<&Path>) -> material_combiner::Result<CombinerConfig> {
    match path {
        Some(path) => CombinerConfig::from_json_file(path),
        None => Ok(CombinerConfig::default()),
    }
}

fn open_scene(
    project: &Path,
    scene_path: &Path,
    encoding: ColorEncoding,
) -> material_combiner::Result<(FsAssetStore, ShaderLibrary, Scene)> {
    let store = FsAssetStore::new(project);
    let mut shaders = ShaderLibrary::new();
    let description = SceneDescription::from_json_file(scene_path)?;
    let scene = load_scene(&description, &store, &mut shaders, encoding)?;
    Ok((store, shaders, scene))
}

/// Returns whether every object succeeded.
fn combine(
    project: &Path,
    scene_path: &Path,
    config: &CombinerConfig,
    names: &[String],
    encoding: ColorEncoding,
    quiet: bool,
) -> material_combiner::Result<bool> {
    let (store, shaders, mut scene) = open_scene(project, scene_path, encoding)?;

    let selection: Vec<ObjectId> = if names.is_empty() {
        scene.roots()
    } else {
        names
            .iter()
            .map(|name| {
                scene
                    .find_by_name(name)
                    .ok_or_else(|| material_combiner::CombinerError::ObjectNotFound(name.clone()))
            })
            .collect::<material_combiner::Result<_>>()?
    };

    let context = CombineContext {
        store: &store,
        device: &SoftwareDevice,
        shaders: &shaders,
        encoding,
    };
    let summary = BatchRunner::new(context, config).run_all(&mut scene, &selection);

    if !quiet {
        for report in &summary.reports {
            println!(
                "{} -> {} ({} textures, {} triangles)",
                report.object_name,
                report.output_folder,
                report.texture_count,
                report.mesh.triangle_count()
            );
        }
        println!("Combined {} objects", summary.success_count);
    }
    for line in &summary.errors {
        eprintln!("  {}", line);
    }

    Ok(summary.is_success())
}

fn inspect(project: &Path, scene_path: &Path) -> material_combiner::Result<bool> {
    let (_, _, scene) = open_scene(project, scene_path, ColorEncoding::Gamma)?;

    println!("Scene: {} objects", scene.len());
    for root in scene.roots() {
        print_object(&scene, root, 1);
    }
    Ok(true)
}

fn print_object(scene: &Scene, id: ObjectId, depth: usize) {
    let Some(object) = scene.get(id) else {
        return;
    };

    let mesh = object
        .mesh()
        .map(|m| format!("{} ({} submeshes)", m.name, m.submesh_count()))
        .unwrap_or_else(|| "no mesh".to_string());
    println!(
        "{}{}: {} materials, {}, {} multi-material descendants",
        "  ".repeat(depth),
        object.name,
        object.material_count(),
        mesh,
        count_multi_material_descendants(scene, id)
    );

    for &child in object.children() {
        print_object(scene, child, depth + 1);
    }
}
