use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

/// One compile message, tied to the source unit and 1-based line it came from.
/// Line `0` means the unit as a whole (I/O failures, empty documents).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub unit: String,
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn error(unit: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            unit: unit.into(),
            line,
            message: message.into(),
        }
    }

    pub fn warning(unit: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            unit: unit.into(),
            line,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warning => "warning",
        };
        if self.line == 0 {
            write!(f, "{level} in {}: {}", self.unit, self.message)
        } else {
            write!(f, "{level} at {}:{}: {}", self.unit, self.line, self.message)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiagnosticBag {
    items: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn error(&mut self, unit: &str, line: usize, message: impl Into<String>) {
        self.push(Diagnostic::error(unit, line, message));
    }

    pub fn warning(&mut self, unit: &str, line: usize, message: impl Into<String>) {
        self.push(Diagnostic::warning(unit, line, message));
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_error()).count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl fmt::Display for DiagnosticBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in &self.items {
            writeln!(f, "{d}")?;
        }
        Ok(())
    }
}
