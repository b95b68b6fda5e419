//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las diferentes fases del proceso de
//! compilación y expone una CLI.

use anyhow::{self, bail, Context};
use clap::{self, crate_version, Arg, ArgMatches, Command};
use seqc::{
    config::{ClockConfig, ClockMode, DeviceConfig},
    ir::Program,
    source::Source,
    toolchain::{self, ArduinoCli, FlashOptions, Runtime},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use std::{
    fs::{self, File},
    io,
    path::PathBuf,
    rc::Rc,
};

fn main() -> anyhow::Result<()> {
    let args = cli().get_matches();
    init_logging(args.occurrences_of("verbose"));

    match args.subcommand() {
        Some(("check", args)) => {
            let (source, program) = load_and_check(args)?;
            info!(
                pins = program.pins.len(),
                equations = program.combinational.len() + program.sequential.len(),
                "check passed"
            );

            println!("{}: ok", source.name());
        }

        Some(("generate", args)) => {
            let (source, _) = load_and_check(args)?;
            let sketch = seqc::generate(&source, &clock_config(args)?);

            match args.value_of("output") {
                None | Some("-") => print!("{}", sketch),
                Some(path) => fs::write(path, sketch)
                    .with_context(|| format!("Failed to write sketch: {}", path))?,
            }
        }

        Some(("flash", args)) => {
            let (source, _) = load_and_check(args)?;
            let sketch = seqc::generate(&source, &clock_config(args)?);
            flash(args, &sketch)?;
        }

        Some(("boards", args)) => match arduino_cli(args).detect_port()? {
            Some(port) => println!("Detected device on port {}", port),
            None => bail!(
                "No serial ports reported by arduino-cli. \
                 If your board is connected, pass the port manually with --port."
            ),
        },

        _ => unreachable!("clap requires a subcommand"),
    }

    Ok(())
}

fn cli() -> Command<'static> {
    let file = Arg::new("FILE")
        .required(true)
        .help("Source .seq file ('-' for stdin)");

    let clock = [
        Arg::new("clock")
            .long("clock")
            .value_name("MODE")
            .takes_value(true)
            .possible_values(["internal", "external"])
            .ignore_case(true)
            .default_value("internal")
            .help("Clock source"),
        Arg::new("clock-pin")
            .long("clock-pin")
            .value_name("PIN")
            .takes_value(true)
            .default_value("4")
            .help("Clock pin"),
        Arg::new("freq")
            .long("freq")
            .value_name("HZ")
            .takes_value(true)
            .default_value("2")
            .help("Internal clock frequency, 1 to 10 Hz"),
        Arg::new("no-mirror")
            .long("no-mirror")
            .help("Do not mirror the clock on the LED at pin 13"),
    ];

    let cli_path = Arg::new("arduino-cli")
        .long("arduino-cli")
        .value_name("PATH")
        .takes_value(true)
        .env("SEQC_ARDUINO_CLI")
        .default_value("arduino-cli")
        .help("arduino-cli executable");

    Command::new("seqc")
        .version(crate_version!())
        .about("Compiles .seq logic descriptions into Arduino sketches")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .multiple_occurrences(true)
                .global(true)
                .help("Increase logging verbosity"),
        )
        .subcommand(
            Command::new("check")
                .about("Validates a source file")
                .arg(file.clone()),
        )
        .subcommand(
            Command::new("generate")
                .about("Emits the sketch for a source file")
                .arg(file.clone())
                .args(clock.clone())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .takes_value(true)
                        .help("Output file ('-' for stdout)"),
                ),
        )
        .subcommand(
            Command::new("flash")
                .about("Writes, compiles and uploads the sketch for a source file")
                .arg(file)
                .args(clock)
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .value_name("PORT")
                        .takes_value(true)
                        .env("SEQC_PORT")
                        .help("Serial port (detected if omitted)"),
                )
                .arg(
                    Arg::new("device")
                        .short('b')
                        .long("device")
                        .value_name("FQBN")
                        .takes_value(true)
                        .env("SEQC_DEVICE")
                        .default_value(seqc::config::DEFAULT_DEVICE)
                        .help("Fully qualified board name"),
                )
                .arg(
                    Arg::new("sketch-dir")
                        .long("sketch-dir")
                        .value_name("DIR")
                        .takes_value(true)
                        .env("SEQC_SKETCH_DIR")
                        .help("Base directory for seq_sketch/ (defaults to home)"),
                )
                .arg(Arg::new("no-upload").long("no-upload").help("Compile only"))
                .arg(
                    Arg::new("replace-runtime")
                        .long("replace-runtime")
                        .help("Overwrite an existing isrClock.h"),
                )
                .arg(cli_path.clone()),
        )
        .subcommand(
            Command::new("boards")
                .about("Looks for a connected board")
                .arg(cli_path),
        )
}

fn init_logging(verbosity: u64) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Lee el código fuente y lo verifica. Ninguna otra operación procede
/// si la verificación falla.
fn load_and_check(args: &ArgMatches) -> anyhow::Result<(Rc<Source>, Program)> {
    let path = args.value_of("FILE").unwrap_or("-");
    let source = match path {
        "-" => Source::read(io::stdin().lock(), "<stdin>").context("Failed to read stdin")?,
        path => {
            let file = File::open(path).with_context(|| format!("Failed to open: {}", path))?;
            Source::read(file, path).with_context(|| format!("Failed to read: {}", path))?
        }
    };

    match seqc::check(&source) {
        Ok(program) => Ok((source, program)),
        Err(diagnostic) => {
            eprint!("{}", diagnostic);
            bail!("Check failed: {}", diagnostic.summary())
        }
    }
}

fn clock_config(args: &ArgMatches) -> anyhow::Result<ClockConfig> {
    let mode: ClockMode = args.value_of_t("clock")?;
    let pin: u8 = args.value_of_t("clock-pin")?;
    let frequency: u32 = args.value_of_t("freq")?;
    let mirror = !args.is_present("no-mirror");

    Ok(ClockConfig::new(mode, pin, frequency, mirror)?)
}

fn arduino_cli(args: &ArgMatches) -> ArduinoCli {
    ArduinoCli::new(args.value_of("arduino-cli").unwrap_or("arduino-cli"))
}

fn flash(args: &ArgMatches, sketch: &str) -> anyhow::Result<()> {
    let cli = arduino_cli(args);
    let upload = !args.is_present("no-upload");

    let mut config = DeviceConfig::default();
    if let Some(device) = args.value_of("device") {
        config.device = device.to_owned();
    }

    if let Some(dir) = args.value_of("sketch-dir").filter(|dir| !dir.trim().is_empty()) {
        config.sketch_dir = PathBuf::from(dir);
    }

    config.port = match args.value_of("port") {
        Some(port) => port.to_owned(),
        None if upload => {
            let port = cli.detect_port().context("Failed to detect a board")?;
            if let Some(port) = &port {
                info!(%port, "detected device");
            }

            port.unwrap_or_default()
        }

        None => String::new(),
    };

    let mut options = FlashOptions::empty();
    options.set(FlashOptions::UPLOAD, upload);
    options.set(FlashOptions::REPLACE_RUNTIME, args.is_present("replace-runtime"));

    let flashed = match toolchain::flash(&cli, &config, sketch, options) {
        Ok(flashed) => flashed,
        Err(toolchain::ToolchainError::Failed { status, captured }) => {
            eprint!("{}", captured);
            bail!("{} failed ({})", captured.step, status)
        }

        Err(error) => return Err(error).context("Flash failed"),
    };

    let runtime = match flashed.runtime {
        Runtime::Existing => "kept existing",
        Runtime::Copied => "copied from base directory",
        Runtime::Installed => "installed",
    };

    println!("Sketch: {}", flashed.sketch.display());
    println!("isrClock.h: {}", runtime);
    print!("{}", flashed.compile);
    println!("Compile succeeded for {}", config.device);

    if let Some(upload) = flashed.upload {
        print!("{}", upload);
        println!("Upload succeeded on {}", config.port);
    }

    Ok(())
}
