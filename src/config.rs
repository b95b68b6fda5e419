//! Configuración de generación y de dispositivo.
//!
//! Nada de esto se persiste: cada invocación recibe estos valores de
//! forma explícita, típicamente desde la línea de comandos.

use std::{
    fmt::{self, Display},
    ops::RangeInclusive,
    path::PathBuf,
    str::FromStr,
};

use thiserror::Error;

use crate::lex::NoCase;

/// FQBN por defecto.
pub const DEFAULT_DEVICE: &str = "adafruit:avr:itsybitsy32u4_5V";

/// Frecuencias de reloj interno admitidas, en Hz.
pub const FREQUENCIES: RangeInclusive<u32> = 1..=10;

#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    #[error("Clock frequency must be between 1 and 10 Hz, got {0}")]
    Frequency(u32),

    #[error("Unknown clock mode '{0}', expected 'internal' or 'external'")]
    ClockMode(String),
}

/// Origen de la señal de reloj.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClockMode {
    /// Onda cuadrada generada por Timer1 en el mismo pin.
    Internal,

    /// Reloj provisto desde fuera de la placa.
    External,
}

impl Display for ClockMode {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockMode::Internal => fmt.write_str("internal"),
            ClockMode::External => fmt.write_str("external"),
        }
    }
}

impl FromStr for ClockMode {
    type Err = ConfigError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        const MODES: &[(NoCase<&str>, ClockMode)] = &[
            (NoCase::new("internal"), ClockMode::Internal),
            (NoCase::new("external"), ClockMode::External),
        ];

        MODES
            .iter()
            .find(|&&(name, _)| name == NoCase::new(string))
            .map(|&(_, mode)| mode)
            .ok_or_else(|| ConfigError::ClockMode(string.to_owned()))
    }
}

/// Parámetros de reloj con que se genera un sketch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClockConfig {
    mode: ClockMode,
    pin: u8,
    frequency: u32,
    mirror: bool,
}

impl ClockConfig {
    /// Valida y construye una configuración.
    pub fn new(mode: ClockMode, pin: u8, frequency: u32, mirror: bool) -> Result<Self, ConfigError> {
        if !FREQUENCIES.contains(&frequency) {
            return Err(ConfigError::Frequency(frequency));
        }

        Ok(ClockConfig {
            mode,
            pin,
            frequency,
            mirror,
        })
    }

    pub fn mode(&self) -> ClockMode {
        self.mode
    }

    /// Pin físico del reloj.
    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Frecuencia en Hz. Solo tiene efecto con reloj interno.
    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    /// Si el reloj se refleja en el LED integrado (pin 13).
    pub fn mirror(&self) -> bool {
        self.mirror
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        ClockConfig {
            mode: ClockMode::Internal,
            pin: 4,
            frequency: 2,
            mirror: true,
        }
    }
}

/// Destino de compilación y carga.
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    /// Puerto serie, por ejemplo `/dev/ttyACM0`. Solo se requiere para cargar.
    pub port: String,

    /// FQBN de la placa.
    pub device: String,

    /// Directorio base bajo el cual se crea `seq_sketch/`.
    pub sketch_dir: PathBuf,
}

impl DeviceConfig {
    /// Verifica que haya un dispositivo, antes de compilar.
    pub fn require_device(&self) -> Result<&str, ConfigError> {
        non_empty(&self.device, "Device (FQBN)")
    }

    /// Verifica que haya un puerto, antes de cargar.
    pub fn require_port(&self) -> Result<&str, ConfigError> {
        non_empty(&self.port, "Port")
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let sketch_dir = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        DeviceConfig {
            port: String::new(),
            device: String::from(DEFAULT_DEVICE),
            sketch_dir,
        }
    }
}

fn non_empty<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ConfigError::Empty { field })
    } else {
        Ok(value)
    }
}
