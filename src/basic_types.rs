//! Fixed-width types shared by the rest of the assembler.

/// An address in the final, linked byte image.
pub type Address = u32;

/// A 32-bit signed immediate value, as it appears in source or in a resolved
/// reference.
pub type Immediate = i32;

/// The byte buffer that the assembler builds up and that `link` eventually
/// hands back to the caller.
pub type ByteVector = Vec<u8>;

/// The largest address the resolver will ever have to reason about.
///
/// Used by [`crate::object::Object::link`] to guard against an origin that,
/// added to the length of the program, would overflow 32 bits.
pub const MAX_ADDRESS: Address = 0xffff_ffff;

/// The largest alignment shift accepted by `align`. More than this is
/// pointless (`1 << 32` does not fit in an `Address`) and would overflow.
pub const MAX_ALIGNMENT: u32 = 31;
