//! Generación de código.
//!
//! El programa validado se traduce a un sketch de Arduino que simula
//! la lógica descrita por medio de un ciclo de muestreo (polling):
//!
//! 1. Se lee el pin de reloj y se detecta un flanco de subida.
//! 2. Se leen los pines de entrada.
//! 3. Se recalculan las ecuaciones combinacionales, en orden de archivo.
//! 4. Se calculan las entradas D de todos los registros.
//! 5. Solo si hubo flanco, todos los registros toman su entrada D a la vez.
//! 6. Se escriben los pines de salida.
//!
//! La salida es determinista: los pines, las señales y los registros se
//! emiten ordenados por nombre, y las ecuaciones en orden de declaración.
//! Un flanco más rápido que una iteración del ciclo se pierde.

use std::{
    fmt::{self, Write},
    rc::Rc,
};

use crate::{
    config::{ClockConfig, ClockMode},
    ir::Program,
    semantic,
    source::Source,
};

mod expr;

pub use expr::CExpr;

/// Sangría por nivel de bloque.
const INDENT: usize = 2;

/// Genera un sketch completo a partir de código fuente.
///
/// Esta operación nunca falla. Debe invocarse solo sobre código que
/// pasó [`crate::check()`]; de lo contrario las líneas inválidas se
/// omiten y las expresiones que no se pueden traducir se sustituyen
/// por `0`, lo cual produce texto bien formado pero sin significado.
#[tracing::instrument(skip_all, fields(source = %source.name()))]
pub fn generate(source: &Rc<Source>, clock: &ClockConfig) -> String {
    let program = semantic::salvage(source);

    let mut output = String::new();
    emit(&program, clock, &mut output).expect("formatting into a String cannot fail");

    tracing::debug!(bytes = output.len(), "sketch generated");
    output
}

/// Emite el sketch de un programa.
pub fn emit<W: Write>(program: &Program, clock: &ClockConfig, output: &mut W) -> fmt::Result {
    let mut cx = Context {
        output,
        indent: 0,
        program,
        clock,
    };

    cx.configuration()?;
    cx.declarations()?;
    cx.setup()?;
    emit!(cx)?;
    cx.main_loop()
}

/// Estado de emisión.
struct Context<'a, W> {
    output: &'a mut W,
    indent: usize,
    program: &'a Program,
    clock: &'a ClockConfig,
}

impl<'a, W: Write> Context<'a, W> {
    /// Parámetros de reloj que consume `isrClock.h`.
    fn configuration(&mut self) -> fmt::Result {
        let clock = self.clock;
        let internal = flag(clock.mode() == ClockMode::Internal);

        emit!(self, "// --- Configuration ---")?;
        emit!(
            self,
            "#define USE_INTERNAL_CLOCK   {}      // 1 = internal Timer1 clock, 0 = external",
            internal
        )?;

        emit!(self, "#define CLOCK_HZ             {}      // frequency in Hz", clock.frequency())?;
        emit!(self, "#define PIN_CLK              {}      // clock pin", clock.pin())?;
        emit!(
            self,
            "#define CLOCK_LED_MIRROR     {}      // mirror clock to LED (pin 13)",
            flag(clock.mirror())
        )?;

        emit!(self)?;
        emit!(self, "#include \"isrClock.h\"")?;
        emit!(self)
    }

    /// Constantes de pines y variables globales.
    fn declarations(&mut self) -> fmt::Result {
        let program = self.program;

        let pins = program.pin_map();
        if !pins.is_empty() {
            emit!(self, "// --- Pin mapping from .seq ---")?;
            for (name, number) in &pins {
                emit!(self, "const uint8_t PIN_{} = {};", name, number)?;
            }

            emit!(self)?;
        }

        let signals = program.signals();
        let registers = program.registers();
        if !signals.is_empty() || !registers.is_empty() {
            emit!(self, "// --- Logic signals ---")?;
            for name in &signals {
                emit!(self, "uint8_t {} = 0;", name)?;
            }

            // Entradas D, separadas de los registros mismos
            for register in &registers {
                emit!(self, "uint8_t D_{} = 0;", register)?;
            }

            emit!(self)?;
        }

        emit!(self, "int __clk_prev = LOW;")?;
        emit!(self)
    }

    fn setup(&mut self) -> fmt::Result {
        let program = self.program;

        self.block("void setup()", |cx| {
            emit!(cx, "// Initialize clock pin for edge detection")?;
            emit!(cx, "pinMode(PIN_CLK, INPUT);")?;
            emit!(cx, "__clk_prev = digitalRead(PIN_CLK);")?;
            emit!(cx)?;

            if !program.pins.is_empty() {
                emit!(cx, "// Configure user pins from .seq")?;
                for name in program.inputs() {
                    emit!(cx, "pinMode(PIN_{}, INPUT);", name)?;
                }

                for name in program.outputs() {
                    emit!(cx, "pinMode(PIN_{}, OUTPUT);", name)?;
                }

                emit!(cx)?;
            }

            emit!(cx, "// Start the hardware Timer1 clock on PIN_CLK if internal mode is enabled")?;
            cx.directive("#if USE_INTERNAL_CLOCK")?;
            emit!(cx, "T1Clock_begin(PIN_CLK, CLOCK_HZ);")?;
            cx.directive("#endif")
        })
    }

    fn main_loop(&mut self) -> fmt::Result {
        let program = self.program;

        self.block("void loop()", |cx| {
            emit!(cx, "int clk_now = digitalRead(PIN_CLK);")?;
            emit!(cx, "bool rising = (__clk_prev == LOW && clk_now == HIGH);")?;
            emit!(cx, "__clk_prev = clk_now;")?;
            emit!(cx)?;

            let inputs = program.inputs();
            if !inputs.is_empty() {
                emit!(cx, "// Read input pins")?;
                for name in inputs {
                    emit!(cx, "{0} = (digitalRead(PIN_{0}) == HIGH) ? 1 : 0;", name)?;
                }

                emit!(cx)?;
            }

            if !program.combinational.is_empty() {
                emit!(cx, "// Combinational logic")?;
                for equation in &program.combinational {
                    emit!(cx, "{} = {};", equation.target, expr::rhs(equation))?;
                }

                emit!(cx)?;
            }

            if !program.sequential.is_empty() {
                emit!(cx, "// Compute D inputs for flip-flops")?;
                for equation in &program.sequential {
                    emit!(cx, "D_{} = {};", equation.target, expr::rhs(equation))?;
                }

                emit!(cx)?;
                cx.block("if (rising)", |cx| {
                    for register in program.registers() {
                        emit!(cx, "{0} = D_{0};", register)?;
                    }

                    Ok(())
                })?;

                emit!(cx)?;
            }

            let outputs = program.outputs();
            if !outputs.is_empty() {
                emit!(cx, "// Drive output pins")?;
                for name in outputs {
                    emit!(cx, "digitalWrite(PIN_{0}, {0} ? HIGH : LOW);", name)?;
                }
            }

            Ok(())
        })
    }

    /// Emite `header {`, el cuerpo con un nivel más de sangría y `}`.
    fn block<F>(&mut self, header: &str, body: F) -> fmt::Result
    where
        F: FnOnce(&mut Self) -> fmt::Result,
    {
        emit!(self, "{} {{", header)?;

        self.indent += INDENT;
        body(self)?;
        self.indent -= INDENT;

        emit!(self, "}}")
    }

    /// Directivas de preprocesador, siempre en la primera columna.
    fn directive(&mut self, directive: &str) -> fmt::Result {
        writeln!(self.output, "{}", directive)
    }
}

fn flag(value: bool) -> u8 {
    u8::from(value)
}
