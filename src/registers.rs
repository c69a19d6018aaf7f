//! ARM register operands.
//!
//! `Reg` can name any of the 16 architectural registers. `LowReg` is the
//! subtype that most Thumb-1 encodings with an immediate operand are
//! restricted to (`r0`..`r7`). The distinction is enforced at construction
//! time rather than checked at emission time, the same way [`crate::asm`]'s
//! mnemonic methods take the narrowest operand type the real encoding
//! allows.

use std::ops::Not;

pub type RegisterNumber = u8;

/// Any of the 16 architectural registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reg {
    n: RegisterNumber,
}

impl Reg {
    pub const fn new(n: RegisterNumber) -> Self {
        assert!(n <= 15, "register number must be in 0..=15");
        Reg { n }
    }

    pub const fn n(self) -> RegisterNumber {
        self.n
    }

    pub const fn is_low(self) -> bool {
        self.n < 8
    }

    /// Bit 3 of the register number, as used by the high-register-operation
    /// encodings that spread a 4-bit register field across a single "H" bit
    /// and a 3-bit field.
    pub const fn high_bit(self) -> RegisterNumber {
        (self.n >> 3) & 1
    }

    pub const fn low_bits(self) -> RegisterNumber {
        self.n & 7
    }
}

/// One of `r0`..`r7`. Most Thumb-1 encodings that embed an immediate
/// restrict their register operands to this subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LowReg {
    n: RegisterNumber,
}

impl LowReg {
    pub const fn new(n: RegisterNumber) -> Self {
        assert!(n <= 7, "low register number must be in 0..=7");
        LowReg { n }
    }

    pub const fn n(self) -> RegisterNumber {
        self.n
    }
}

impl From<LowReg> for Reg {
    fn from(r: LowReg) -> Self {
        Reg::new(r.n)
    }
}

/// A load/store-multiple base register with the writeback (`!`) suffix,
/// e.g. the `r0` in `stmia r0!, {r1, r2}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WritebackLowReg {
    r: LowReg,
}

impl WritebackLowReg {
    pub const fn new(r: LowReg) -> Self {
        WritebackLowReg { r }
    }

    pub const fn n(self) -> RegisterNumber {
        self.r.n
    }

    pub const fn reg(self) -> LowReg {
        self.r
    }
}

impl Not for LowReg {
    type Output = WritebackLowReg;

    /// `!r0` spells the writeback form of `r0`, the way lzasm's C++
    /// ancestor overloads `operator!` for the same purpose.
    fn not(self) -> WritebackLowReg {
        WritebackLowReg::new(self)
    }
}

pub const R0: LowReg = LowReg::new(0);
pub const R1: LowReg = LowReg::new(1);
pub const R2: LowReg = LowReg::new(2);
pub const R3: LowReg = LowReg::new(3);
pub const R4: LowReg = LowReg::new(4);
pub const R5: LowReg = LowReg::new(5);
pub const R6: LowReg = LowReg::new(6);
pub const R7: LowReg = LowReg::new(7);
pub const R8: Reg = Reg::new(8);
pub const R9: Reg = Reg::new(9);
pub const R10: Reg = Reg::new(10);
pub const R11: Reg = Reg::new(11);
pub const R12: Reg = Reg::new(12);
pub const R13: Reg = Reg::new(13);
pub const R14: Reg = Reg::new(14);
pub const R15: Reg = Reg::new(15);

/// Alias for `r13`.
pub const SP: Reg = R13;
/// Alias for `r14`.
pub const LR: Reg = R14;
/// Alias for `r15`.
pub const PC: Reg = R15;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_registers_report_as_low() {
        assert!(Reg::from(R7).is_low());
        assert!(!R8.is_low());
    }

    #[test]
    fn high_bit_and_low_bits_split_the_register_number() {
        let r = Reg::new(11);
        assert_eq!(r.high_bit(), 1);
        assert_eq!(r.low_bits(), 3);
    }

    #[test]
    fn writeback_is_spelled_with_not() {
        let wb = !R3;
        assert_eq!(wb.n(), 3);
    }
}
