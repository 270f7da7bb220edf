use anyhow::{bail, Result};
use std::path::PathBuf;
use std::str::FromStr;

use billstitch::error::StitchError;
use billstitch::{config, image_io, pipeline, scans, StitchConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Incremental,
    Scans,
}

impl FromStr for Mode {
    type Err = StitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "incremental" => Ok(Mode::Incremental),
            "scans" => Ok(Mode::Scans),
            _ => Err(StitchError::UnknownStrategy {
                axis: "stitch mode",
                name: s.to_string(),
            }),
        }
    }
}

struct Args {
    inputs: Vec<PathBuf>,
    output: PathBuf,
    mode: Mode,
    config: StitchConfig,
}

const USAGE: &str = "\
Usage: billstitch [OPTIONS] <IMAGE_OR_DIR>...

Stitches overlapping photos of a bill into one rectified document image.

Options:
  -o, --output <PATH>    output image path (default: stitched.png)
      --features <NAME>  orb | sift | akaze | brisk
      --model <NAME>     affine | homography
      --policy <NAME>    strict | best-effort
      --mode <NAME>      incremental | scans
      --config <PATH>    JSON config file (flags above override it)
      --no-preprocess    skip white balance / denoise / CLAHE
  -h, --help             print this help
";

fn parse_args() -> Result<Args> {
    let mut inputs = Vec::new();
    let mut output = PathBuf::from("stitched.png");
    let mut mode = Mode::Incremental;
    let mut file_config: Option<StitchConfig> = None;
    let mut features = None;
    let mut model = None;
    let mut policy = None;
    let mut no_preprocess = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = |name: &str| -> Result<String> {
            args.next()
                .ok_or_else(|| anyhow::anyhow!("{name} requires a value\n\n{USAGE}"))
        };
        match arg.as_str() {
            "-h" | "--help" => {
                print!("{USAGE}");
                std::process::exit(0);
            }
            "-o" | "--output" => output = PathBuf::from(value("--output")?),
            "--features" => features = Some(value("--features")?.parse()?),
            "--model" => model = Some(value("--model")?.parse()?),
            "--policy" => policy = Some(value("--policy")?.parse()?),
            "--mode" => mode = value("--mode")?.parse()?,
            "--config" => {
                file_config = Some(config::load_config(&PathBuf::from(value("--config")?))?)
            }
            "--no-preprocess" => no_preprocess = true,
            other if other.starts_with('-') => bail!("unknown option '{other}'\n\n{USAGE}"),
            _ => inputs.push(PathBuf::from(arg)),
        }
    }

    if inputs.is_empty() {
        bail!("no input images given\n\n{USAGE}");
    }

    let mut config = file_config.unwrap_or_default();
    if let Some(kind) = features {
        config.feature_kind = kind;
    }
    if let Some(model) = model {
        config.motion_model = model;
    }
    if let Some(policy) = policy {
        config.failure_policy = policy;
    }
    if no_preprocess {
        config.preprocess = false;
    }

    Ok(Args {
        inputs,
        output,
        mode,
        config,
    })
}

fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "billstitch=info");
    }
    env_logger::init();

    let args = parse_args()?;
    let start = std::time::Instant::now();

    let paths = image_io::collect_images(&args.inputs)?;
    log::info!("Stitching {} images:", paths.len());
    for path in &paths {
        log::info!("  {}", path.display());
    }

    let images = paths
        .iter()
        .map(|path| image_io::load_image(path))
        .collect::<Result<Vec<_>>>()?;

    let result = match args.mode {
        Mode::Incremental => pipeline::stitch(&images, &args.config)?,
        Mode::Scans => scans::stitch_scans(&images)?,
    };

    image_io::save_image(&args.output, &result)?;
    log::info!("Done in {:?}", start.elapsed());
    Ok(())
}
