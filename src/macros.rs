/// Emite una línea con la sangría actual del contexto.
///
/// Sin argumentos de formato, emite una línea vacía sin sangría.
macro_rules! emit {
    ($cx:expr) => {
        writeln!($cx.output)
    };

    ($cx:expr, $($format:tt)*) => {{
        write!($cx.output, "{:indent$}", "", indent = $cx.indent)?;
        writeln!($cx.output, $($format)*)
    }};
}
