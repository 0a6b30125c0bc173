use anyhow::{bail, ensure, Context, Result};
use clap::{App, Arg, ArgMatches};
use console::style;
use j2k_by_frame::*;
use log::{info, warn};
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "j2k_by_frame=info");
    }
    env_logger::builder()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    let scalers: Vec<&str> = Scaler::ALL.iter().map(|s| s.id()).collect();
    let matches = App::new("j2k-by-frame")
        .arg(
            Arg::with_name("INPUT")
                .help("Sets the input image to encode")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("OUTPUT")
                .help("Directory to write the J2K frame into")
                .short("o")
                .long("output")
                .required(true)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("FRAME")
                .help("Index of this frame within the film; names the output file")
                .short("f")
                .long("frame")
                .default_value("0")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("FPS")
                .help("Frame rate of the film")
                .long("fps")
                .default_value("24")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("SIZE")
                .help("Output size including padding, as WIDTHxHEIGHT")
                .short("s")
                .long("size")
                .default_value("1998x1080")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("PADDING")
                .help("Black pixels to add on the left and right of the picture")
                .long("padding")
                .default_value("0")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("SCALER")
                .help("Resampling filter used to reach the output size")
                .long("scaler")
                .possible_values(&scalers)
                .default_value("bicubic")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("POST_PROCESS")
                .help("Post-process filters to run before scaling, e.g. `md/al`")
                .long("post-process")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("CONFIG")
                .help("A path to the TOML file with encoding settings and remote servers")
                .short("c")
                .long("config")
                .default_value("j2k.toml")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("NO_REMOTE")
                .help("Encode on this machine even if remote servers are configured")
                .long("no-remote"),
        )
        .get_matches();
    let opts = CliOptions::from_matches(&matches)?;

    info!(
        "Encoding {} as frame {} at {}, {} fps",
        style(opts.input.display()).cyan(),
        style(opts.request.frame).cyan(),
        style(opts.request.out_size).cyan(),
        style(opts.request.frames_per_second).cyan()
    );

    let image = load_image(&opts.input)?;
    let encoded = encode_frame(&image, &opts)?;
    let path = encoded
        .write_to_file(&opts.output, opts.request.frame)
        .context("Failed writing encoded frame")?;

    info!(
        "{} {} ({} bytes)",
        style("Finished!").yellow(),
        path.display(),
        encoded.size()
    );
    Ok(())
}

#[derive(Debug, Clone)]
struct CliOptions {
    input: PathBuf,
    output: PathBuf,
    request: FrameEncodeRequest,
    servers: Vec<ServerDescription>,
}

impl CliOptions {
    fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let config_path = Path::new(matches.value_of("CONFIG").unwrap());
        let config = if config_path.exists() {
            let config = Config::from_file(config_path)?;
            info!("Loaded config file");
            config
        } else {
            info!("Could not open config file; using defaults");
            Config::default()
        };

        let output = PathBuf::from(matches.value_of("OUTPUT").unwrap());
        ensure!(output.is_dir(), "Output must be an existing directory");

        let out_size = parse_size(matches.value_of("SIZE").unwrap())?;
        let padding: u32 = matches
            .value_of("PADDING")
            .unwrap()
            .parse()
            .context("Padding must be a whole number")?;
        check_padding(padding, out_size)?;
        let fps: f32 = matches
            .value_of("FPS")
            .unwrap()
            .parse()
            .context("Frame rate must be a number")?;
        ensure!(fps > 0.0, "Frame rate must be positive");
        ColourLut::from_index(config.colour_lut_index)?;

        let request = FrameEncodeRequest::new(
            out_size,
            padding,
            matches.value_of("SCALER").unwrap().parse()?,
            matches
                .value_of("FRAME")
                .unwrap()
                .parse()
                .context("Frame must be a whole number")?,
            fps,
            matches.value_of("POST_PROCESS").unwrap_or(""),
            config.colour_lut_index,
            config.j2k_bandwidth,
        );
        parse_post_process(&request.post_process)?;

        Ok(CliOptions {
            input: PathBuf::from(matches.value_of("INPUT").unwrap()),
            output,
            request,
            servers: if matches.is_present("NO_REMOTE") {
                Vec::new()
            } else {
                config.servers()
            },
        })
    }
}

fn parse_size(s: &str) -> Result<Size> {
    let mut parts = s.splitn(2, 'x');
    match (parts.next(), parts.next()) {
        (Some(w), Some(h)) => {
            let size = Size::new(
                w.parse().context("Invalid width")?,
                h.parse().context("Invalid height")?,
            );
            ensure!(size.area() > 0, "Size must not be empty");
            Ok(size)
        }
        _ => bail!("Size must be given as WIDTHxHEIGHT"),
    }
}

fn check_padding(padding: u32, out_size: Size) -> Result<()> {
    ensure!(
        padding
            .checked_mul(2)
            .map_or(false, |both| both < out_size.width),
        "Padding must leave room for the picture"
    );
    Ok(())
}

fn load_image(path: &Path) -> Result<Image> {
    let rgb = image::open(path)
        .with_context(|| format!("Could not open image {}", path.display()))?
        .to_rgb8();
    let size = Size::new(rgb.width(), rgb.height());
    Ok(Image::from_rgb24(size, rgb.into_raw())?)
}

/// Try each configured server in turn, and encode here if none of them
/// manages it.
fn encode_frame(image: &Image, opts: &CliOptions) -> Result<EncodedData> {
    for server in &opts.servers {
        match encode_remotely(image, &opts.request, server, SOCKET_TIMEOUT) {
            Ok(encoded) => return Ok(encoded),
            Err(e) if e.is_recoverable() => {
                warn!("Remote encode on {} failed: {}", server, e);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(encode_locally(image, &opts.request)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_must_leave_room() {
        let size = Size::new(1998, 1080);
        assert!(check_padding(0, size).is_ok());
        assert!(check_padding(998, size).is_ok());
        assert!(check_padding(999, size).is_err());
        assert!(check_padding(u32::MAX, size).is_err());
    }

    #[test]
    fn sizes() {
        assert_eq!(parse_size("1998x1080").unwrap(), Size::new(1998, 1080));
        assert!(parse_size("1998").is_err());
        assert!(parse_size("0x1080").is_err());
        assert!(parse_size("wide x tall").is_err());
    }
}
