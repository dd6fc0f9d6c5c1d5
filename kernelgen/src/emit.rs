/// Ordered line buffer used by the code generators.
///
/// Statements are collected in emission order and rendered exactly once,
/// so the produced text is a pure function of the appended lines. Indentation
/// uses tabs to match the rest of the generated OpenCL.
pub struct CodeBuilder {
    lines: Vec<String>,
    indent: usize,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            indent: 0,
        }
    }

    /// Append one line at the current indentation level.
    pub fn line(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            self.lines.push(String::new());
        } else {
            self.lines.push(format!("{}{}", "\t".repeat(self.indent), text));
        }
    }

    /// Append an empty line.
    pub fn blank(&mut self) {
        self.lines.push(String::new());
    }

    /// Append a pre-rendered block verbatim, ignoring the current indentation.
    pub fn raw(&mut self, block: &str) {
        for line in block.split('\n') {
            self.lines.push(line.to_string());
        }
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        debug_assert!(self.indent > 0);
        self.indent -= 1;
    }

    /// Render the collected lines into the final text.
    pub fn render(self) -> String {
        self.lines.join("\n")
    }
}

impl Default for CodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Format an `f32` as an OpenCL float literal.
///
/// Uses Rust's shortest round-trip formatting so identical inputs always
/// produce identical text.
pub fn float_literal(value: f32) -> String {
    format!("{:?}f", value)
}
