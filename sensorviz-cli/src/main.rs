use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;
use sensorviz::io::{RigDocument, load_settings, write_bxyz};
use sensorviz::{EngineSettings, Mesh, Visualizer};
use std::collections::HashSet;
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;

/// Run scan cycles for a sensor rig against scenario geometry and write the resulting point
/// clouds
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The rig document (JSON) describing the sensors
    #[arg(short, long)]
    document: PathBuf,

    /// Scenario meshes to scan, as STL files
    #[arg(short, long, num_args = 1..)]
    scenario: Vec<PathBuf>,

    /// Engine settings (JSON); defaults are used when omitted
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Directory the point clouds are written to
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Number of forced scan cycles to run
    #[arg(short, long, default_value_t = 1)]
    cycles: usize,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

/// A file stem for a sensor's output which cannot leave the output directory. Anything other
/// than ASCII letters, digits, `-` and `_` becomes `_`, and a stem already handed out gets a
/// numeric suffix.
fn output_stem(name: &str, taken: &mut HashSet<String>) -> String {
    let mut base = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>();
    if base.is_empty() {
        base = "sensor".to_string();
    }

    let mut stem = base.clone();
    let mut n = 2;
    while !taken.insert(stem.clone()) {
        stem = format!("{}-{}", base, n);
        n += 1;
    }
    stem
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .filter(
            None,
            if args.verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            },
        )
        .parse_default_env()
        .init();

    let settings = match &args.settings {
        Some(path) => load_settings(path)?,
        None => EngineSettings::default(),
    };

    let mut meshes = Vec::with_capacity(args.scenario.len());
    for path in &args.scenario {
        let mesh = Mesh::load_stl(path)?;
        log::info!(
            "loaded {:?}: {} vertices, {} faces",
            path,
            mesh.vertices().len(),
            mesh.faces().len()
        );
        meshes.push(mesh);
    }

    let document = RigDocument::load(&args.document)?;
    let mut visualizer = Visualizer::new(settings);
    visualizer.replace_scenario(meshes);
    let ids = visualizer.apply_document(document)?;

    for cycle in 0..args.cycles {
        for id in &ids {
            visualizer.force_rescan(*id);
        }
        log::debug!("cycle {} complete", cycle + 1);
    }

    std::fs::create_dir_all(&args.output)?;
    let mut stems = HashSet::new();
    for id in &ids {
        let Some(state) = visualizer.sensor(*id) else {
            continue;
        };

        if state.kind.is_lidar() {
            if let Some(cloud) = visualizer.point_cloud(*id) {
                let stem = output_stem(&state.name, &mut stems);
                let path = args.output.join(format!("{}.bxyz", stem));
                write_bxyz(&path, cloud)?;
                log::info!("{}: {} points written to {:?}", state.name, cloud.len(), path);
            }
        }

        if let Some(preview) = visualizer.camera_preview(*id) {
            log::info!(
                "{}: {}x{} depth preview, {} of {} pixels hit",
                state.name,
                preview.width(),
                preview.height(),
                preview.hit_count(),
                preview.depths().len()
            );
        }
    }

    let combined = visualizer.combined_point_cloud();
    log::info!("{} points across {} sensors", combined.len(), ids.len());

    Ok(())
}
