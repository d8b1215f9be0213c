
/// Represents an x86-64 general purpose register, always used with its full 64 bit width.
///
/// The System V ABI uses the registers as follows:
///
/// | register          | preserved? | usage |
/// | ----------------- | --- | ------------ |
/// |`rax`              | no  | return value |
/// |`rbx`              | yes | |
/// |`rcx`              | no  | 4th argument |
/// |`rdx`              | no  | 3rd argument, high half of the `idiv` dividend |
/// |`rsi`              | no  | 2nd argument |
/// |`rdi`              | no  | 1st argument |
/// |`rbp`              | yes | frame pointer |
/// |`rsp`              | yes | stack pointer |
/// |`r8` - `r9`        | no  | 5th and 6th argument |
/// |`r10` - `r11`      | no  | temporaries |
/// |`r12` - `r15`      | yes | |
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Reg {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    Rbp,
    Rsp,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

impl Reg {
    pub const ALL: [Reg; 16] = [
        Reg::Rax,
        Reg::Rbx,
        Reg::Rcx,
        Reg::Rdx,
        Reg::Rsi,
        Reg::Rdi,
        Reg::Rbp,
        Reg::Rsp,
        Reg::R8,
        Reg::R9,
        Reg::R10,
        Reg::R11,
        Reg::R12,
        Reg::R13,
        Reg::R14,
        Reg::R15,
    ];

    /// The position of this register in [`Reg::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Returns `true` if the register is by convention preserved when calling a function.
    pub fn is_callee_saved(self) -> bool {
        matches!(
            self,
            Reg::Rbx | Reg::Rbp | Reg::Rsp | Reg::R12 | Reg::R13 | Reg::R14 | Reg::R15
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Reg::Rax => "rax",
            Reg::Rbx => "rbx",
            Reg::Rcx => "rcx",
            Reg::Rdx => "rdx",
            Reg::Rsi => "rsi",
            Reg::Rdi => "rdi",
            Reg::Rbp => "rbp",
            Reg::Rsp => "rsp",
            Reg::R8 => "r8",
            Reg::R9 => "r9",
            Reg::R10 => "r10",
            Reg::R11 => "r11",
            Reg::R12 => "r12",
            Reg::R13 => "r13",
            Reg::R14 => "r14",
            Reg::R15 => "r15",
        }
    }

    /// Looks a register up by its lowercase name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|reg| reg.name() == name)
    }
}

impl std::fmt::Debug for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
