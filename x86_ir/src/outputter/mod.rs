#[cfg(test)]
mod test;

use crate::{Block, Function, Instruction, Root};
use std::fmt::Result;

#[derive(Debug, Clone, Default)]
pub struct AsmOutputConfig {
    /// If `true`, a `jmp` at the end of a block is written even when it targets the block that
    /// follows it.
    pub keep_fallthrough_jumps: bool,
    /// If `true`, the `section .text` header and `extern` declarations are not written.
    pub omit_header: bool,
}

/// Can be used to format [`Root`]s as NASM assembly to a writer.
///
/// A mutable reference to the writer---an implementor of [`std::fmt::Write`]---must be passed to
/// [`new`]. Then [`Root`]s can be formatted using [`write_root`], or single functions using
/// [`write_function`].
///
/// Instructions are indented by four spaces; labels are not indented.
pub struct AsmOutputter<'w, W: std::fmt::Write> {
    writer: &'w mut W,
    config: AsmOutputConfig,
}

impl<'w, W: std::fmt::Write> AsmOutputter<'w, W> {
    pub fn new(writer: &'w mut W) -> Self {
        Self {
            writer,
            config: Default::default(),
        }
    }

    pub fn with_config(self, config: AsmOutputConfig) -> Self {
        Self { config, ..self }
    }

    pub fn write_root(&mut self, value: &Root) -> Result {
        if !self.config.omit_header {
            self.writer.write_str("section .text\n")?;
            for label in value.external_labels() {
                writeln!(self.writer, "extern {label}")?;
            }
        }

        for (i, function) in value.functions().iter().enumerate() {
            if i > 0 || !self.config.omit_header {
                self.writeln()?;
            }
            self.write_function(function)?;
        }
        Ok(())
    }

    pub fn write_function(&mut self, value: &Function) -> Result {
        writeln!(self.writer, "global {}", value.name())?;
        writeln!(self.writer, "{}:", value.name())?;

        let blocks = value.blocks();
        for (i, block) in blocks.iter().enumerate() {
            let next = blocks.get(i + 1);
            self.write_block(block, next)?;
        }
        Ok(())
    }

    fn write_block(&mut self, block: &Block, next: Option<&Block>) -> Result {
        writeln!(self.writer, "{}:", block.label)?;

        let mut instructions = block.instructions.as_slice();
        if !self.config.keep_fallthrough_jumps {
            if let (Some((Instruction::Jmp(target), rest)), Some(next)) =
                (instructions.split_last(), next)
            {
                if *target == next.label {
                    instructions = rest;
                }
            }
        }

        for instruction in instructions {
            self.write_instruction(instruction)?;
        }
        Ok(())
    }

    pub fn write_instruction(&mut self, value: &Instruction) -> Result {
        writeln!(self.writer, "    {value}")
    }

    fn writeln(&mut self) -> Result {
        self.writer.write_char('\n')
    }
}
