// Command-line front end for glyphtrace.
//
// Usage:
//   fontgen <image> [-o <output-base>] [--ttf] [--otf] [options]
//   fontgen preview <image> -o <output.svg> [options]

use std::path::PathBuf;
use std::process;

use glyphtrace::{
    ExportFormat, FontGenerator, FontInfo, GeneratorConfig, ImageSource, Invert,
    SegmentationMethod, SmoothingLevel,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args[0] == "-h" || args[0] == "--help" {
        print_usage();
        process::exit(if args.is_empty() { 1 } else { 0 });
    }

    let (preview, rest) = if args[0] == "preview" {
        (true, &args[1..])
    } else {
        (false, &args[..])
    };

    let parsed = match parse_args(rest) {
        Ok(p) => p,
        Err(msg) => {
            eprintln!("{msg}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = run(parsed, preview) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn print_usage() {
    eprintln!("fontgen — turn an alphabet sheet into a font");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  fontgen <image> [-o <output-base>] [options]");
    eprintln!("  fontgen preview <image> -o <output.svg> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -o <path>            Output base name (default: input name)");
    eprintln!("  --ttf                Emit TrueType (default)");
    eprintln!("  --otf                Emit OpenType/CFF");
    eprintln!("  --family <name>      Font family name");
    eprintln!("  --style <name>       Style name (default: Regular)");
    eprintln!("  --chars <string>     Expected characters in reading order");
    eprintln!("  --smoothing <level>  none | low | medium | high | maximum");
    eprintln!("  --method <method>    auto | grid | contour | row-column");
    eprintln!("  --invert <mode>      auto | always | never");
    eprintln!("  --small-glyphs       Keep small punctuation components");
    eprintln!("  --upm <n>            Units per em (default 1000)");
    eprintln!("  --config <file>      Load a TOML GeneratorConfig");
}

struct Parsed {
    input: PathBuf,
    output: Option<PathBuf>,
    config: GeneratorConfig,
    info: FontInfo,
}

fn parse_args(args: &[String]) -> Result<Parsed, String> {
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut config = GeneratorConfig::default();
    let mut info = FontInfo::default();
    let mut formats: Vec<ExportFormat> = Vec::new();

    fn value(args: &[String], i: usize, name: &str) -> Result<String, String> {
        args.get(i + 1)
            .cloned()
            .ok_or_else(|| format!("{name} needs a value"))
    }

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "-o" => {
                output = Some(PathBuf::from(value(args, i, "-o")?));
                i += 2;
            }
            "--ttf" => {
                formats.push(ExportFormat::Ttf);
                i += 1;
            }
            "--otf" => {
                formats.push(ExportFormat::Otf);
                i += 1;
            }
            "--family" => {
                info.family_name = value(args, i, "--family")?;
                i += 2;
            }
            "--style" => {
                info.style_name = value(args, i, "--style")?;
                i += 2;
            }
            "--chars" => {
                config.expected_chars = Some(value(args, i, "--chars")?);
                i += 2;
            }
            "--smoothing" => {
                config.smoothing_level = match value(args, i, "--smoothing")?.as_str() {
                    "none" => SmoothingLevel::None,
                    "low" => SmoothingLevel::Low,
                    "medium" => SmoothingLevel::Medium,
                    "high" => SmoothingLevel::High,
                    "maximum" => SmoothingLevel::Maximum,
                    other => return Err(format!("unknown smoothing level '{other}'")),
                };
                i += 2;
            }
            "--method" => {
                config.segmentation_method = match value(args, i, "--method")?.as_str() {
                    "auto" => SegmentationMethod::Auto,
                    "grid" => SegmentationMethod::Grid,
                    "contour" => SegmentationMethod::Contour,
                    "row-column" => SegmentationMethod::RowColumn,
                    other => return Err(format!("unknown segmentation method '{other}'")),
                };
                i += 2;
            }
            "--invert" => {
                config.invert = match value(args, i, "--invert")?.as_str() {
                    "auto" => Invert::Auto,
                    "always" => Invert::Always,
                    "never" => Invert::Never,
                    other => return Err(format!("unknown invert mode '{other}'")),
                };
                i += 2;
            }
            "--small-glyphs" => {
                config.include_small_glyphs = true;
                i += 1;
            }
            "--upm" => {
                config.units_per_em = value(args, i, "--upm")?
                    .parse()
                    .map_err(|_| "--upm needs a positive integer".to_string())?;
                i += 2;
            }
            "--config" => {
                let path = value(args, i, "--config")?;
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| format!("cannot read {path}: {e}"))?;
                config = toml::from_str(&text).map_err(|e| format!("bad config: {e}"))?;
                i += 2;
            }
            _ if arg.starts_with('-') => return Err(format!("unknown option '{arg}'")),
            _ => {
                if input.is_some() {
                    return Err(format!("unexpected argument '{arg}'"));
                }
                input = Some(PathBuf::from(arg));
                i += 1;
            }
        }
    }

    if !formats.is_empty() {
        config.export_formats = formats;
    }
    let input = input.ok_or_else(|| "no input image given".to_string())?;
    Ok(Parsed {
        input,
        output,
        config,
        info,
    })
}

fn run(parsed: Parsed, preview: bool) -> Result<(), Box<dyn std::error::Error>> {
    let Parsed {
        input,
        output,
        mut config,
        info,
    } = parsed;

    if preview {
        // SVG preview needs the traced glyphs only; skip binary assembly.
        config.export_formats = Vec::new();
    }

    let generator = FontGenerator::new(&config, &info);
    let font = generator.generate(ImageSource::Path(input.clone()))?;

    for warning in &font.warnings {
        eprintln!("warning: {warning}");
    }
    log::info!(
        "labeled against '{}' via {:?} segmentation",
        font.alphabet,
        font.method
    );

    let base = output.unwrap_or_else(|| input.with_extension(""));
    if preview {
        let svg = glyphtrace::svg::glyphs_to_svg_font(
            &font.glyphs,
            &info.family_name,
            config.units_per_em,
        );
        let path = if base.extension().is_some() {
            base
        } else {
            base.with_extension("svg")
        };
        std::fs::write(&path, svg)?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    if let Some(ttf) = &font.ttf {
        let path = base.with_extension("ttf");
        std::fs::write(&path, ttf)?;
        println!("wrote {} ({} bytes)", path.display(), ttf.len());
    }
    if let Some(otf) = &font.otf {
        let path = base.with_extension("otf");
        std::fs::write(&path, otf)?;
        println!("wrote {} ({} bytes)", path.display(), otf.len());
    }
    Ok(())
}
