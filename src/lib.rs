//! A runtime assembler for the 32-bit ARM Thumb instruction set (the
//! ARMv4T baseline: Thumb-1 plus `bl` and the two ARM-state bridging
//! pseudo-instructions).
//!
//! This crate does not parse assembly source. Instead, a caller builds a
//! program by calling one method per instruction on a [`ThumbAssembler`],
//! using Rust's own type system (not a parser) to reject most malformed
//! operands at compile time. Anything that can only be checked once the
//! final layout is known -- a branch target that turns out to be too far
//! away, a symbol that is referenced but never defined -- is checked by
//! [`ThumbAssembler::link`], which turns the accumulated instructions and
//! data into a finished byte image relocated to a chosen origin address.
//!
//! # Examples
//!
//! ```
//! use thumb_asm::{Assembler, Symbol};
//! use thumb_asm::registers::{R0, R7};
//!
//! let mut asm = Assembler::new();
//! asm.label(Symbol::new("done".to_string())).unwrap();
//! asm.add_imm3(R0, R7, "done").unwrap();
//! let bytes = asm.link(4).unwrap();
//! assert_eq!(bytes, vec![0x38, 0x1D]);
//! ```
//!
//! Labels can be named with any type that is `Clone + Ord`; [`Assembler`]
//! fixes that type to `String` for convenience, and [`CompactAssembler`]
//! fixes it to `u32` for callers who would rather not pay for string
//! allocation in label-heavy generated code.

mod asm;
mod basic_types;
mod error;
mod immediate;
mod literal;
mod object;
mod operations;
mod reference;
mod register_lists;
pub mod registers;
mod symbol;

pub use crate::asm::ThumbAssembler;
pub use crate::basic_types::{Address, ByteVector};
pub use crate::error::{AssemblerError, Reason, Result};
pub use crate::immediate::Immediate;
pub use crate::register_lists::{low_reg_range, LowRegList, PopList, PushList};
pub use crate::registers::{LowReg, Reg, WritebackLowReg};
pub use crate::symbol::Symbol;

/// A Thumb assembler whose labels are named by `String`.
///
/// This is the binding most callers want: labels read like `"loop_top"`
/// and convert implicitly wherever an operand expects one.
pub type Assembler = ThumbAssembler<String>;

/// A Thumb assembler whose labels are named by `u32`.
///
/// Useful for generated code with many labels and no need for readable
/// names -- a basic-block index, for instance -- where carrying a `String`
/// per label would be wasted allocation.
pub type CompactAssembler = ThumbAssembler<u32>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::*;

    #[test]
    fn string_assembler_resolves_a_forward_label() {
        let mut asm = Assembler::new();
        asm.beq("end");
        asm.label(Symbol::new("end".to_string())).unwrap();
        let bytes = asm.link(0x80).unwrap();
        assert_eq!(bytes, vec![0xFE, 0xD0]);
    }

    #[test]
    fn compact_assembler_resolves_an_integer_label() {
        let mut asm = CompactAssembler::new();
        asm.label(Symbol::new(1)).unwrap();
        asm.add_imm3(R0, R7, Symbol::new(1)).unwrap();
        let bytes = asm.link(4).unwrap();
        assert_eq!(bytes, vec![0x38, 0x1D]);
    }

    #[test]
    fn linking_twice_is_impossible_by_construction() {
        // `link` consumes the assembler, so a caller cannot accidentally
        // keep emitting into an already-linked program; this is enforced
        // entirely by the borrow checker and needs no runtime state flag.
        let mut asm = Assembler::new();
        asm.nop();
        let _bytes = asm.link(0).unwrap();
        // asm.nop(); // would not compile: `asm` was moved into `link`.
    }
}
