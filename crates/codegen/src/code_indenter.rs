//! A `fmt::Write` wrapper that auto-indents every line, plus a scoped-block
//! helper for emitting well-nested `struct { ... };`-shaped source.

use std::fmt;
use std::ops::{Deref, DerefMut};

pub const INDENT: &str = "    ";

pub type Indenter = CodeIndenter<String>;

#[macro_export]
macro_rules! indent_scope {
    ($x:ident) => {
        let mut $x = $x.indented(1);
    };
}

pub struct CodeIndenter<W: fmt::Write> {
    writer: W,
    level: u32,
    needs_indenting: bool,
}

impl<W: fmt::Write> CodeIndenter<W> {
    pub fn new(writer: W) -> Self {
        CodeIndenter { writer, level: 0, needs_indenting: true }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn indent(&mut self, n: u32) {
        self.level = self.level.saturating_add(n);
    }

    pub fn dedent(&mut self, n: u32) {
        self.level = self.level.saturating_sub(n);
    }

    pub fn indented(&mut self, n: u32) -> IndentScope<'_, W> {
        self.indent(n);
        IndentScope { fmt: self }
    }

    fn write_indent(&mut self) -> fmt::Result {
        for _ in 0..self.level {
            self.writer.write_str(INDENT)?;
        }
        Ok(())
    }

    /// Invoke `f` while indenting one level greater than `self` currently does.
    pub fn with_indent<Res>(&mut self, f: impl FnOnce(&mut Self) -> Res) -> Res {
        let mut indenter = self.indented(1);
        f(&mut indenter)
    }

    pub fn newline(&mut self) {
        self.writer.write_char('\n').unwrap();
    }

}

/// Writes `before` on its own line, runs `f` one indent level deeper, then
/// writes `after` back at the original level. Covers every brace-delimited
/// shape this crate emits: `struct { ... };`, `method(...) { ... }`,
/// `switch (tag) { ... }`.
pub fn block<Res>(out: &mut Indenter, before: &str, after: &str, f: impl FnOnce(&mut Indenter) -> Res) -> Res {
    writeln!(out, "{before}");
    let res = out.with_indent(f);
    writeln!(out, "{after}");
    res
}

impl<W: fmt::Write> fmt::Write for CodeIndenter<W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for (i, line) in s.split_inclusive('\n').enumerate() {
            let write_indent = i != 0 || std::mem::take(&mut self.needs_indenting);
            if write_indent && line != "\n" {
                self.write_indent()?;
            }
            self.writer.write_str(line)?;
        }
        self.needs_indenting = s.ends_with('\n');
        Ok(())
    }
}

impl CodeIndenter<String> {
    pub fn write_fmt(&mut self, args: fmt::Arguments) {
        fmt::Write::write_fmt(self, args).unwrap()
    }
}

pub struct IndentScope<'a, W: fmt::Write> {
    fmt: &'a mut CodeIndenter<W>,
}

impl<W: fmt::Write> Drop for IndentScope<'_, W> {
    fn drop(&mut self) {
        self.fmt.dedent(1);
    }
}

impl<T: fmt::Write> Deref for IndentScope<'_, T> {
    type Target = CodeIndenter<T>;
    fn deref(&self) -> &Self::Target {
        self.fmt
    }
}

impl<T: fmt::Write> DerefMut for IndentScope<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.fmt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_indents_its_body() {
        let mut out = CodeIndenter::new(String::new());
        block(
            &mut out,
            "struct Foo {",
            "};",
            |out| {
                writeln!(out, "int x;");
            },
        );
        let text = out.into_inner();
        assert_eq!(text, "struct Foo {\n    int x;\n};\n");
    }
}
