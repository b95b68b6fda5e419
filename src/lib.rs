//! Compilador de descripciones `.seq` a sketches de Arduino.
//!
//! # Front end
//! Un programa `.seq` es una secuencia de líneas independientes. Cada
//! línea se clasifica primero en [`line`] como declaración de pin,
//! ecuación secuencial o ecuación combinacional. Los lados derechos de
//! las ecuaciones se descomponen en tokens en [`lex`] y se disponen en
//! un árbol de expresión en [`parse`]. El análisis semántico en
//! [`semantic`] construye la tabla de símbolos, verifica que toda señal
//! leída esté definida y produce la representación validada de [`ir`].
//!
//! Todas las fases se detienen en el primer error, el cual se reporta
//! como un único [`error::Diagnostic`].
//!
//! # Back end
//! El generador en [`target`] traduce el programa validado a un sketch
//! que simula la lógica por muestreo, según la configuración de reloj
//! de [`config`]. El módulo [`sim`] ejecuta esa misma semántica sin
//! hardware. Finalmente, [`toolchain`] escribe el sketch junto a
//! `isrClock.h` y delega compilación y carga a `arduino-cli`.

#[macro_use]
mod macros;

pub mod config;
pub mod error;
pub mod ir;
pub mod lex;
pub mod line;
pub mod parse;
pub mod semantic;
pub mod sim;
pub mod source;
pub mod toolchain;

mod codegen;

pub use semantic::check;
pub use target::generate;

/// Emisión de código.
///
/// Este módulo reexporta suficientes ítems internos relacionados a
/// generación de código para traducir un programa validado a un sketch.
pub mod target {
    pub use crate::codegen::{emit, generate, CExpr};
}
