//! Reporte de errores de compilación.
//!
//! Toda fase del compilador se detiene en su primer error, por lo cual
//! un [`Diagnostic`] describe exactamente una falla: su clase, su mensaje
//! y la línea de código fuente en donde ocurrió.

use crate::source::{Located, Location};
use std::{
    error::Error,
    fmt::{self, Debug, Display},
};

mod sealed {
    pub trait Sealed {}
}

pub trait LocatedError: sealed::Sealed {
    fn source(&self) -> &dyn Error;
    fn location(&self) -> &Location;
}

/// Un error reportable al usuario.
pub struct Diagnostic {
    kind: &'static str,
    error: Box<dyn 'static + LocatedError>,
}

impl Diagnostic {
    /// Cambia la clase de error que se reporta.
    pub fn kind(self, kind: &'static str) -> Self {
        Diagnostic { kind, ..self }
    }

    /// Número de línea, a partir de 1.
    pub fn line(&self) -> u32 {
        self.error.location().line()
    }

    /// Mensaje legible, sin ubicación.
    pub fn message(&self) -> String {
        self.error.source().to_string()
    }

    /// Ubicación completa del error.
    pub fn location(&self) -> &Location {
        self.error.location()
    }

    /// Forma corta de una línea, `Line N: mensaje`.
    pub fn summary(&self) -> String {
        format!("Line {}: {}", self.line(), self.message())
    }
}

impl<E: 'static + LocatedError> From<E> for Diagnostic {
    fn from(error: E) -> Self {
        Diagnostic {
            kind: "error",
            error: Box::new(error),
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostic { kind, error } = self;

        writeln!(fmt, "{}: {}", kind, error.source())?;

        let location = error.location();
        writeln!(fmt, " --> {}", location)?;

        let line_number = location.line();
        let digits = line_number.to_string().chars().count();
        writeln!(fmt, "{:digits$} |", "", digits = digits)?;

        let line = location.source().line(line_number).unwrap_or_default();
        writeln!(fmt, "{:>digits$} | {}", line_number, line, digits = digits)?;

        let (from, to) = (location.start().column(), location.end().column() - 1);
        let min = from.min(to);
        let max = from.max(to);

        let skip = (min - 1) as usize;
        let highlight = (max - min + 1) as usize;

        writeln!(
            fmt,
            "{:digits$} | {:skip$}{:^<highlight$}",
            "",
            "",
            "",
            digits = digits,
            skip = skip,
            highlight = highlight
        )
    }
}

impl Debug for Diagnostic {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{} ({}): {}", self.kind, self.location(), self.message())
    }
}

impl Error for Diagnostic {}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn source(&self) -> &dyn Error {
        self.as_ref()
    }

    fn location(&self) -> &Location {
        Located::location(self)
    }
}
