use crate::chip8::Chip8;
use crate::context::Context;
use crate::error::Error;
use crate::quirks::Quirks;

/// Assembles a machine from its context, program and optional quirks
///
/// Misuse of the builder itself (a missing context or program) is reported
/// as a plain message, distinct from the machine's runtime [`Error`]s.
pub struct Builder<'a, C: Context> {
    context: Option<C>,
    program: Option<&'a [u8]>,
    quirks: Option<Quirks>,
}

impl<'a, C: Context> Builder<'a, C> {
    pub fn new() -> Self {
        Self {
            context: None,
            program: None,
            quirks: None,
        }
    }

    pub fn with_context(mut self, ctx: C) -> Self {
        self.context = Some(ctx);
        self
    }

    pub fn with_program(mut self, prog: &'a [u8]) -> Self {
        self.program = Some(prog);
        self
    }

    /// Override the default behaviour dialect
    pub fn with_quirks(mut self, quirks: Quirks) -> Self {
        self.quirks = Some(quirks);
        self
    }

    pub fn build(self) -> Result<Chip8<C>, &'static str> {
        let context = self.context.ok_or("Context not provided")?;
        let program = self.program.ok_or("Program not provided")?;
        let mut chip = Chip8::new(context);
        if let Some(quirks) = self.quirks {
            chip.configure(quirks);
        }
        chip.load(program).map_err(|err| match err {
            Error::RomTooLarge { .. } => "Program too large",
            _ => "Failed to load program",
        })?;
        Ok(chip)
    }
}

impl<'a, C: Context> Default for Builder<'a, C> {
    fn default() -> Self {
        Self::new()
    }
}
