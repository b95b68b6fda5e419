//! Compilación y carga de sketches.
//!
//! Una vez generado el código fuente del sketch, este debe escribirse
//! en un directorio de sketch junto a `isrClock.h`, compilarse para la
//! placa objetivo y cargarse por el puerto serie. Todo esto se delega
//! a `arduino-cli`; aquí solo se inspecciona su estado de salida y se
//! captura su salida para reportarla.

use std::{
    ffi::{OsStr, OsString},
    fmt::{self, Display},
    fs, io,
    path::{Path, PathBuf},
    process::{Command, ExitStatus},
};

use bitflags::bitflags;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ConfigError, DeviceConfig};

/// Nombre del encabezado de soporte que incluye todo sketch generado.
pub const RUNTIME_NAME: &str = "isrClock.h";

/// Contenido de `isrClock.h` que se distribuye con el compilador.
pub const RUNTIME_HEADER: &str = include_str!("../runtime/isrClock.h");

bitflags! {
    /// Opciones de [`flash()`].
    pub struct FlashOptions: u32 {
        /// Cargar el sketch a la placa luego de compilarlo.
        const UPLOAD = 0x01;

        /// Sobrescribir `isrClock.h` en el directorio de sketch aunque
        /// ya exista uno.
        const REPLACE_RUNTIME = 0x02;
    }
}

/// Un error durante la preparación, compilación o carga.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ToolchainError {
    /// Ocurrió un evento de error de E/S.
    #[error("I/O error")]
    Io(#[from] io::Error),

    #[error("arduino-cli not found. Install it or add it to PATH.")]
    NotFound,

    #[error("Cannot create sketch directory '{}'", .path.display())]
    SketchDir { path: PathBuf, source: io::Error },

    /// `arduino-cli` inició pero terminó con error.
    #[error("{} failed ({status})", .captured.step)]
    Failed { status: ExitStatus, captured: Captured },

    #[error("Failed to parse JSON from arduino-cli output")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Salida capturada de un paso de `arduino-cli`.
#[derive(Debug, Clone)]
pub struct Captured {
    pub step: &'static str,
    pub stdout: String,
    pub stderr: String,
}

impl Display for Captured {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let streams = [("stdout", &self.stdout), ("stderr", &self.stderr)];
        for (stream, text) in streams {
            let text = text.trim();
            if !text.is_empty() {
                writeln!(fmt, "=== {} {} ===", self.step.to_lowercase(), stream)?;
                writeln!(fmt, "{}", text)?;
            }
        }

        Ok(())
    }
}

/// Procedencia de `isrClock.h` en el directorio de sketch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Runtime {
    /// Ya estaba presente y se conservó.
    Existing,

    /// Se copió desde el directorio base.
    Copied,

    /// Se escribió la versión distribuida con el compilador.
    Installed,
}

/// Directorio de sketch `<base>/seq_sketch`.
pub struct Sketch {
    base: PathBuf,
    dir: PathBuf,
}

impl Sketch {
    /// Nombre del sketch y de su directorio.
    pub const NAME: &'static str = "seq_sketch";

    /// Crea, si hace falta, el directorio base y el de sketch.
    pub fn prepare<P: AsRef<Path>>(base: P) -> Result<Self, ToolchainError> {
        let base = base.as_ref().to_path_buf();
        let dir = base.join(Self::NAME);

        for path in [&base, &dir] {
            fs::create_dir_all(path).map_err(|source| ToolchainError::SketchDir {
                path: path.clone(),
                source,
            })?;
        }

        debug!(dir = %dir.display(), "sketch directory ready");
        Ok(Sketch { base, dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ruta del archivo `.ino`, cuyo nombre debe coincidir con el del directorio.
    pub fn ino_path(&self) -> PathBuf {
        self.dir.join(format!("{}.ino", Self::NAME))
    }

    /// Escribe el código fuente del sketch.
    pub fn write(&self, source: &str) -> Result<PathBuf, ToolchainError> {
        let path = self.ino_path();
        fs::write(&path, source)?;

        Ok(path)
    }

    /// Asegura que `isrClock.h` esté junto al sketch.
    ///
    /// Sin `replace`, se respeta un encabezado ya presente en el directorio
    /// de sketch o, en su defecto, en el directorio base.
    pub fn install_runtime(&self, replace: bool) -> Result<Runtime, ToolchainError> {
        let target = self.dir.join(RUNTIME_NAME);
        let beside = self.base.join(RUNTIME_NAME);

        let runtime = if !replace && target.is_file() {
            Runtime::Existing
        } else if !replace && beside.is_file() {
            fs::copy(&beside, &target)?;
            Runtime::Copied
        } else {
            fs::write(&target, RUNTIME_HEADER)?;
            Runtime::Installed
        };

        debug!(?runtime, path = %target.display(), "runtime header");
        Ok(runtime)
    }
}

/// Invocación de `arduino-cli`.
pub struct ArduinoCli {
    program: OsString,
}

impl ArduinoCli {
    pub fn new<P: Into<OsString>>(program: P) -> Self {
        ArduinoCli {
            program: program.into(),
        }
    }

    /// `arduino-cli compile --fqbn <device> <sketch>`
    pub fn compile(&self, device: &str, sketch: &Sketch) -> Result<Captured, ToolchainError> {
        let args = [
            OsStr::new("compile"),
            OsStr::new("--fqbn"),
            OsStr::new(device),
            sketch.dir().as_os_str(),
        ];

        self.run("Compile", &args)
    }

    /// `arduino-cli upload -p <port> --fqbn <device> <sketch>`
    pub fn upload(&self, port: &str, device: &str, sketch: &Sketch) -> Result<Captured, ToolchainError> {
        let args = [
            OsStr::new("upload"),
            OsStr::new("-p"),
            OsStr::new(port),
            OsStr::new("--fqbn"),
            OsStr::new(device),
            sketch.dir().as_os_str(),
        ];

        self.run("Upload", &args)
    }

    /// Busca un puerto serie con alguna placa conectada.
    pub fn detect_port(&self) -> Result<Option<String>, ToolchainError> {
        let args = ["board", "list", "--format", "json"].map(OsStr::new);
        let captured = self.run("Board scan", &args)?;

        Ok(detect_port(&captured.stdout)?)
    }

    fn run(&self, step: &'static str, args: &[&OsStr]) -> Result<Captured, ToolchainError> {
        info!(program = ?self.program, ?args, "{}", step);

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|error| match error.kind() {
                io::ErrorKind::NotFound => ToolchainError::NotFound,
                _ => ToolchainError::Io(error),
            })?;

        let captured = Captured {
            step,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if output.status.success() {
            Ok(captured)
        } else {
            Err(ToolchainError::Failed {
                status: output.status,
                captured,
            })
        }
    }
}

impl Default for ArduinoCli {
    fn default() -> Self {
        ArduinoCli::new("arduino-cli")
    }
}

/// Resultado de un [`flash()`] exitoso.
#[derive(Debug)]
pub struct Flashed {
    pub sketch: PathBuf,
    pub runtime: Runtime,
    pub compile: Captured,
    pub upload: Option<Captured>,
}

/// Escribe, compila y opcionalmente carga un sketch ya generado.
///
/// El dispositivo se valida justo antes de compilar y el puerto justo
/// antes de cargar, de manera que un puerto vacío no impide compilar.
#[tracing::instrument(skip_all)]
pub fn flash(
    cli: &ArduinoCli,
    config: &DeviceConfig,
    source: &str,
    options: FlashOptions,
) -> Result<Flashed, ToolchainError> {
    let sketch = Sketch::prepare(&config.sketch_dir)?;
    let runtime = sketch.install_runtime(options.contains(FlashOptions::REPLACE_RUNTIME))?;
    let path = sketch.write(source)?;
    info!(path = %path.display(), "sketch written");

    let device = config.require_device()?;
    let compile = cli.compile(device, &sketch)?;

    let upload = if options.contains(FlashOptions::UPLOAD) {
        let port = config.require_port()?;
        Some(cli.upload(port, device, &sketch)?)
    } else {
        None
    };

    Ok(Flashed {
        sketch: path,
        runtime,
        compile,
        upload,
    })
}

/// Elige un puerto a partir de la salida JSON de `arduino-cli board list`.
///
/// Se aceptan tanto el formato actual (`{"detected_ports": [...]}`) como
/// el antiguo (un arreglo en el nivel superior). Se prefiere el primer
/// puerto cuya etiqueta mencione USB y, si no hay, el primero con dirección.
pub fn detect_port(json: &str) -> Result<Option<String>, serde_json::Error> {
    let entries = match serde_json::from_str(json)? {
        BoardList::Detected { detected_ports } => detected_ports,
        BoardList::Legacy(entries) => entries,
        BoardList::Other(_) => Vec::new(),
    };

    let mut fallback = None;
    for port in entries.into_iter().map(Entry::into_port) {
        let address = match port.address.filter(|address| !address.is_empty()) {
            Some(address) => address,
            None => continue,
        };

        let label = [port.label, port.protocol_label]
            .iter()
            .flatten()
            .map(|label| label.to_uppercase())
            .collect::<Vec<_>>()
            .join(" ");

        if label.contains("USB") {
            return Ok(Some(address));
        }

        fallback.get_or_insert(address);
    }

    Ok(fallback)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoardList {
    Detected { detected_ports: Vec<Entry> },
    Legacy(Vec<Entry>),
    Other(serde::de::IgnoredAny),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Entry {
    Nested { port: Port },
    Flat(Port),
}

impl Entry {
    fn into_port(self) -> Port {
        match self {
            Entry::Nested { port } | Entry::Flat(port) => port,
        }
    }
}

#[derive(Deserialize)]
struct Port {
    address: Option<String>,
    label: Option<String>,
    protocol_label: Option<String>,
}
