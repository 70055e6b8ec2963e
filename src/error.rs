use core::fmt;

/// Faults surfaced by `load` and `step`.
///
/// Every condition is reported as its own variant so a frontend can decide
/// whether to halt, reset or reload; none of them is recovered from
/// internally, and stepping on after a fault without a reset is on the
/// caller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// A computed address left the 4096-byte address space.
    MemoryOutOfBounds { addr: u16 },
    /// No operation matches the fetched bit pattern.
    UnknownOpcode { raw: u16 },
    /// A call was issued with every stack slot in use.
    StackOverflow,
    /// A return was issued with no return address on the stack.
    StackUnderflow,
    /// The program does not fit between 0x200 and the end of memory.
    RomTooLarge { len: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MemoryOutOfBounds { addr } => {
                write!(f, "address {:#05X} is out of address space", addr)
            }
            Error::UnknownOpcode { raw } => write!(f, "no operation matches {:#06X}", raw),
            Error::StackOverflow => write!(f, "cannot enter subroutine, stack is full"),
            Error::StackUnderflow => write!(f, "cannot return, not in subroutine"),
            Error::RomTooLarge { len } => {
                write!(f, "program of {} bytes does not fit in memory", len)
            }
        }
    }
}
