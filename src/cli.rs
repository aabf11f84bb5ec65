use std::{num::NonZeroUsize, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use indicatif::ProgressBar;
use tracing_subscriber::EnvFilter;

use kdray::{
    Camera, KdTree, PostProcess, RenderSettings, Scene, WorkerCount,
    geometry::{ScreenSize, WorldBox, WorldPoint, WorldVector},
    render_frame,
    scene::{Cuboid, Mesh, Primitive, Sphere, Surface},
    util::Rgba,
};

/// Renders a demo scene, optionally with a mesh, into a PNG file.
#[derive(Parser)]
#[command(name = "kdray-cli", about, long_about = None)]
struct Cli {
    /// Output PNG file
    #[arg(short, long, default_value = "render.png")]
    output: PathBuf,

    #[arg(long, default_value_t = 800)]
    width: u32,

    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Worker thread count, one per core when not given
    #[arg(short, long)]
    threads: Option<NonZeroUsize>,

    /// Wavefront OBJ mesh to place in the middle of the scene
    #[arg(long)]
    obj: Option<PathBuf>,

    /// Apply gamma correction
    #[arg(long)]
    gamma: bool,

    /// Smooth color edges
    #[arg(long)]
    antialias: bool,

    #[arg(long)]
    blur: bool,

    /// Pin worker threads to cores
    #[arg(long)]
    pin_threads: bool,

    /// Dump the kd-tree structure to stdout before rendering
    #[arg(long)]
    print_tree: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let objects = demo_objects(&cli)?;
    let tree = KdTree::builder().objects(objects).build();
    if cli.print_tree {
        tree.print_tree();
    }
    tree.print_statistics();
    let scene = Scene::new(tree);

    let camera = Camera::builder()
        .center(WorldPoint::new(0.0, 3.0, 12.0))
        .forward(WorldVector::new(0.0, -0.2, -1.0))
        .up(WorldVector::new(0.0, 1.0, 0.0))
        .resolution(ScreenSize::new(cli.width, cli.height))
        .build();

    let mut post_process = Vec::new();
    if cli.antialias {
        post_process.push(PostProcess::Antialias);
    }
    if cli.blur {
        post_process.push(PostProcess::Blur);
    }
    if cli.gamma {
        post_process.push(PostProcess::GammaCorrection);
    }
    let settings = RenderSettings {
        worker_count: cli.threads.map_or(WorkerCount::Auto, WorkerCount::Manual),
        post_process,
        pin_threads: cli.pin_threads,
    };

    let bar = ProgressBar::new(cli.height.into());
    let buffer = render_frame(&scene, &camera, &settings, |progress| {
        bar.set_position(progress.claimed.into())
    })?;
    bar.finish();

    buffer
        .save_png(&cli.output)
        .with_context(|| format!("Saving {}", cli.output.display()))?;
    tracing::info!(output = %cli.output.display(), "image saved");

    Ok(())
}

/// Floor, a row of colored spheres and the optional mesh.
fn demo_objects(cli: &Cli) -> anyhow::Result<Vec<Arc<Primitive>>> {
    let mut objects = vec![Arc::new(Primitive::from(Cuboid {
        bounds: WorldBox::new(
            WorldPoint::new(-20.0, -1.5, -20.0),
            WorldPoint::new(20.0, -1.0, 5.0),
        ),
        surface: Surface::diffuse(Rgba::new(0.6, 0.6, 0.6, 1.0)),
    }))];

    let colors = [
        Rgba::new(0.9, 0.2, 0.2, 1.0),
        Rgba::new(0.2, 0.9, 0.2, 1.0),
        Rgba::new(0.2, 0.2, 0.9, 1.0),
        Rgba::new(0.9, 0.9, 0.2, 1.0),
        Rgba::new(0.9, 0.2, 0.9, 1.0),
    ];
    for (i, color) in colors.into_iter().enumerate() {
        objects.push(Arc::new(Primitive::from(Sphere {
            center: WorldPoint::new(-6.0 + 3.0 * i as f64, 0.0, -4.0),
            radius: 1.0,
            surface: Surface::diffuse(color),
        })));
    }

    if let Some(path) = &cli.obj {
        let mesh = Mesh::with_obj(path, Surface::WHITE)
            .with_context(|| format!("Loading {}", path.display()))?;
        objects.push(Arc::new(Primitive::from(mesh)));
    }

    Ok(objects)
}
