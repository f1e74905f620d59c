use std::io::{self, Write};

/// Line-oriented writer for GNU-style RISC-V assembly
pub struct AsmWriter<W: Write> {
    writer: W,
}

impl<W: Write> AsmWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// `  op arg0, arg1, ...`
    pub fn write_inst(&mut self, op: &str, args: &[&str]) -> io::Result<()> {
        if args.is_empty() {
            writeln!(self.writer, "  {}", op)
        } else {
            writeln!(self.writer, "  {} {}", op, args.join(", "))
        }
    }

    pub fn write_label(&mut self, label: &str) -> io::Result<()> {
        writeln!(self.writer, "{}:", label)
    }

    /// `  .directive arg0, arg1, ...`
    pub fn write_directive(&mut self, directive: &str, args: &[&str]) -> io::Result<()> {
        if args.is_empty() {
            writeln!(self.writer, "  .{}", directive)
        } else {
            writeln!(self.writer, "  .{} {}", directive, args.join(", "))
        }
    }

    pub fn write_blank_line(&mut self) -> io::Result<()> {
        writeln!(self.writer)
    }
}
