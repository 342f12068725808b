use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use megagen::{Project, build_project, output_path, project_path};

#[derive(Parser)]
#[command(author, version, about = "Composite a layer project into a mega-texture source TGA")]
struct Arguments {
    /// Project name, read from <root>/megagen/<project>.megagen.
    project: String,
    /// Edge length of the square output image in pixels.
    size: u32,
    /// Content root; project files and layer images are resolved against it.
    #[arg(long, short = 'r', value_parser, default_value = ".")]
    root: PathBuf,
    /// Output file. Defaults to <root>/megagen/bin/<project>.tga.
    #[arg(long, short = 'o', value_parser)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let arguments = Arguments::parse();

    let project_file = project_path(&arguments.root, &arguments.project);
    let project = Project::load_file(&project_file, &arguments.root)
        .with_context(|| format!("load project {}", project_file.display()))?;

    let output = arguments
        .output
        .unwrap_or_else(|| output_path(&arguments.root, &arguments.project));
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create output directory {}", parent.display()))?;
    }
    let file =
        File::create(&output).with_context(|| format!("create output {}", output.display()))?;
    let mut writer = BufWriter::new(file);

    let stats = build_project(arguments.size, &mut writer, &project)
        .with_context(|| format!("build {}", output.display()))?;
    writer
        .flush()
        .with_context(|| format!("flush {}", output.display()))?;

    println!(
        "[megagen] {} built successfully: {} rows, {} bytes -> {}",
        arguments.project,
        stats.rows,
        stats.bytes_written,
        output.display()
    );
    Ok(())
}
