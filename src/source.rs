//! Rastreo de ubicaciones originales en código fuente.
//!
//! Los distintos objetos internos que el compilador construye
//! deben llevar cuenta de posiciones o rangos de ubicaciones en
//! el código fuente original, lo cual permite señalar la línea y
//! columna exactas en donde ocurre un error.
//!
//! A diferencia de un flujo de caracteres, un programa `.seq` se
//! procesa línea por línea. Cada línea (o fragmento de línea) se
//! representa con un [`Snippet`], el cual conoce su posición de
//! inicio y puede construir [`Location`]s para cualquier subrango.

use std::{
    fmt::{self, Debug, Display, Formatter},
    io::{self, Read},
    ops::Range,
    rc::Rc,
};

/// Un objeto cualquiera con una posición original asociada.
#[derive(Debug, Clone)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    /// Obtiene el valor.
    pub fn val(&self) -> &T {
        &self.value
    }

    /// Obtiene la ubicación.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Descarta la ubicación y toma ownership del valor.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone y toma ownership de las dos partes.
    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }

    /// Construye a partir de un valor y una ubicación.
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Texto fuente completo, junto a su nombre de origen.
pub struct Source {
    name: String,
    lines: Vec<String>,
}

impl Source {
    /// Construye un origen a partir de texto ya leído.
    pub fn new<N, T>(name: N, text: T) -> Rc<Self>
    where
        N: Into<String>,
        T: AsRef<str>,
    {
        let lines = text.as_ref().lines().map(String::from).collect();
        Rc::new(Source {
            name: name.into(),
            lines,
        })
    }

    /// Lee un origen completo desde un flujo de entrada.
    pub fn read<R, N>(mut reader: R, name: N) -> io::Result<Rc<Self>>
    where
        R: Read,
        N: Into<String>,
    {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;

        Ok(Source::new(name, text))
    }

    /// Nombre de origen, típicamente una ruta.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Obtiene el texto de una línea, numerada a partir de 1.
    pub fn line(&self, number: u32) -> Option<&str> {
        let index = (number as usize).checked_sub(1)?;
        self.lines.get(index).map(String::as_str)
    }

    /// Itera sobre todas las líneas del origen, en orden.
    pub fn lines(self: &Rc<Self>) -> impl Iterator<Item = Snippet<'_>> {
        self.lines.iter().enumerate().map(move |(index, text)| Snippet {
            from: self,
            start: Position {
                line: index as u32 + 1,
                column: 1,
            },
            text,
        })
    }
}

/// Una ubicación está conformada por un origen y un rango de posiciones.
#[derive(Clone)]
pub struct Location {
    from: Rc<Source>,
    position: Range<Position>,
}

impl Location {
    /// Unifica un rango de ubicaciones. Se asume el mismo origen.
    pub fn span(from: Location, to: &Location) -> Self {
        Location {
            from: from.from,
            position: from.position.start..to.position.end,
        }
    }

    /// Obtiene la posición de inicio.
    pub fn start(&self) -> Position {
        self.position.start
    }

    /// Obtiene la posición de fin, exclusiva.
    pub fn end(&self) -> Position {
        self.position.end
    }

    /// Obtiene el número de línea de inicio.
    pub fn line(&self) -> u32 {
        self.position.start.line
    }

    /// Obtiene el origen.
    pub fn source(&self) -> &Source {
        &self.from
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:", self.from.name)?;

        let Range { start, end } = self.position;
        if end == start.advance() {
            // Solo se señala una columna en específico
            write!(formatter, "{}", start)
        } else {
            write!(formatter, "[{}-{}]", start, end.back())
        }
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

/// Una posición línea-columna en un archivo.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    /// Obtiene el número de línea.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Obtiene el número de columna.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Incrementa el número de columna.
    pub fn advance(self) -> Position {
        self.skip(1)
    }

    /// Avanza una cantidad arbitraria de columnas.
    pub fn skip(self, columns: u32) -> Position {
        Position {
            line: self.line,
            column: self.column + columns,
        }
    }

    /// Decrementa el número de columna.
    pub fn back(self) -> Position {
        Position {
            line: self.line,
            column: self.column - 1,
        }
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

/// Un fragmento contiguo de una única línea de código fuente.
///
/// Las columnas se cuentan por carácter, no por byte. Todos los
/// recortes de un fragmento preservan la posición original de su
/// primer carácter.
#[derive(Copy, Clone)]
pub struct Snippet<'a> {
    from: &'a Rc<Source>,
    start: Position,
    text: &'a str,
}

impl<'a> Snippet<'a> {
    /// Texto del fragmento.
    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Número de línea del fragmento.
    pub fn line(&self) -> u32 {
        self.start.line
    }

    /// Posición del primer carácter.
    pub fn start(&self) -> Position {
        self.start
    }

    /// Determina si el fragmento no contiene más que espacios en blanco.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Descarta espacios en blanco en ambos extremos.
    pub fn trim(self) -> Self {
        let leading = self.text.len() - self.text.trim_start().len();
        self.slice(leading..leading + self.text.trim().len())
    }

    /// Recorta a un subrango de bytes del texto.
    pub fn slice(self, range: Range<usize>) -> Self {
        let skipped = self.text[..range.start].chars().count() as u32;
        Snippet {
            from: self.from,
            start: self.start.skip(skipped),
            text: &self.text[range],
        }
    }

    /// Caracteres del fragmento junto a sus posiciones.
    pub fn chars(self) -> impl Iterator<Item = (char, Position)> + 'a {
        let start = self.start;
        self.text
            .chars()
            .enumerate()
            .map(move |(index, c)| (c, start.skip(index as u32)))
    }

    /// Ubicación que abarca a todo el fragmento.
    ///
    /// Un fragmento vacío señala la columna donde comenzaría.
    pub fn location(&self) -> Location {
        let length = self.text.chars().count().max(1) as u32;
        self.locate(self.start..self.start.skip(length))
    }

    /// Ubicación de la columna inmediatamente posterior al fragmento.
    pub fn end_location(&self) -> Location {
        let end = self.start.skip(self.text.chars().count() as u32);
        self.locate(end..end.advance())
    }

    /// Construye una ubicación dentro del mismo origen.
    pub fn locate(&self, position: Range<Position>) -> Location {
        Location {
            from: Rc::clone(self.from),
            position,
        }
    }
}

impl Debug for Snippet<'_> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:?} @ {}", self.text, self.start)
    }
}
