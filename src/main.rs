use std::env;
use std::path::PathBuf;

use ahmed_body_rs::{
    plot, residuals, AhmedGenerator, CaseConfig, CasePaths, Float, Symmetry,
};
use anyhow::{bail, Context, Result};
use log::info;

/// Residual variables of the standard solver setup and their non-orthogonal
/// corrector counts; only pressure runs with a corrector.
const DEFAULT_RESIDUAL_VARS: [(&str, usize); 7] = [
    ("ux", 0),
    ("uy", 0),
    ("uz", 0),
    ("p", 1),
    ("omega", 0),
    ("k", 0),
    ("continuity", 0),
];

fn usage(program: &str) -> String {
    format!(
        "Usage: {program} <command> <slant_angle_deg> [options]\n\
         \n\
         Commands:\n\
         \x20 generate        generate body, legs and domain meshes for one case\n\
         \x20 plot-residuals  plot solver residual histories for one case\n\
         \x20 plot-cd         plot the drag coefficient history for one case\n\
         \n\
         Generate options:\n\
         \x20 --config <file.json>  load the full case configuration from JSON\n\
         \x20 --freestream          suspend the body instead of grounding it\n\
         \x20 --full                model the full width instead of one half\n\
         \x20 --body-size <mm>      body surface mesh edge length (default 2)\n\
         \x20 --legs-size <mm>      leg surface mesh edge length (default 2)\n\
         \x20 --domain-size <mm>    domain wall mesh edge length (default coarse)\n\
         \n\
         Plot options:\n\
         \x20 --y-max <value>       cap of the residual plot y axis (default 1)\n\
         \x20 --no-y-max            do not cap the y axis\n\
         \x20 --linear              linear y axis for plot-cd (default log)\n\
         \n\
         Output root comes from the AHMED_SLANT_PATH environment variable."
    )
}

fn save_path_base() -> Result<PathBuf> {
    let base = env::var("AHMED_SLANT_PATH")
        .context("AHMED_SLANT_PATH is not set; it must point at the case output root")?;
    Ok(PathBuf::from(base))
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = args
        .get(i)
        .with_context(|| format!("{flag} needs a value"))?;
    raw.parse()
        .with_context(|| format!("bad value {raw:?} for {flag}"))
}

fn generate(slant_angle_deg: Float, args: &[String]) -> Result<()> {
    let mut config = match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path: PathBuf = parse_value(args, i + 1, "--config")?;
            let mut config = CaseConfig::from_file(&path)?;
            config.slant_angle_deg = slant_angle_deg;
            config
        }
        None => CaseConfig::new(slant_angle_deg, save_path_base()?),
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--freestream" => config.is_freestream = true,
            "--full" => config.symmetry = Symmetry::Full,
            "--body-size" => {
                config.body_mesh_size = parse_value(args, i + 1, "--body-size")?;
                i += 1;
            }
            "--legs-size" => {
                config.legs_mesh_size = parse_value(args, i + 1, "--legs-size")?;
                i += 1;
            }
            "--domain-size" => {
                config.domain_mesh_size = Some(parse_value(args, i + 1, "--domain-size")?);
                i += 1;
            }
            "--config" => i += 1,
            flag => bail!("unknown generate option {flag}"),
        }
        i += 1;
    }

    let generator = AhmedGenerator::new(config);
    generator.generate_all()
}

fn residuals_dir(slant_angle_deg: Float) -> Result<PathBuf> {
    let paths = CasePaths::new(&save_path_base()?, slant_angle_deg);
    let dir = paths.residuals_dir;
    if !dir.is_dir() {
        bail!("no residuals directory at {}", dir.display());
    }
    Ok(dir)
}

fn plot_residuals(slant_angle_deg: Float, args: &[String]) -> Result<()> {
    let mut y_max = Some(1.0);
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--y-max" => {
                y_max = Some(parse_value(args, i + 1, "--y-max")?);
                i += 1;
            }
            "--no-y-max" => y_max = None,
            flag => bail!("unknown plot-residuals option {flag}"),
        }
        i += 1;
    }

    let dir = residuals_dir(slant_angle_deg)?;
    let set = residuals::load_set(&dir, &DEFAULT_RESIDUAL_VARS)?;
    let rendered = plot::plot_residuals(&dir, &set, y_max)?;
    info!("residual plot saved to {}", rendered.path.display());
    Ok(())
}

fn plot_cd(slant_angle_deg: Float, args: &[String]) -> Result<()> {
    let mut logy = true;
    for flag in args {
        match flag.as_str() {
            "--linear" => logy = false,
            other => bail!("unknown plot-cd option {other}"),
        }
    }

    let dir = residuals_dir(slant_angle_deg)?;
    let values = residuals::load_series(&residuals::series_path(&dir, "cd"))?;
    let series = residuals::ResidualSeries {
        name: "cd".to_string(),
        values,
    };
    let rendered = plot::plot_series(&dir, &series, logy)?;
    info!("drag history plot saved to {}", rendered.path.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("{}", usage(&args[0]));
        std::process::exit(1);
    }

    let command = args[1].as_str();
    let slant_angle_deg: Float = args[2]
        .parse()
        .with_context(|| format!("bad slant angle {:?}", args[2]))?;
    let rest = &args[3..];

    match command {
        "generate" => generate(slant_angle_deg, rest),
        "plot-residuals" => plot_residuals(slant_angle_deg, rest),
        "plot-cd" => plot_cd(slant_angle_deg, rest),
        other => {
            eprintln!("unknown command {other}\n\n{}", usage(&args[0]));
            std::process::exit(1);
        }
    }
}
