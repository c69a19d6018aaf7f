//! Pending entries in the current literal-pool window, used by the pseudo
//! `ldr Rd, =value` form.

use crate::basic_types::Address;
use crate::immediate::Immediate;

/// One pending constant, waiting to be materialized by
/// [`crate::object::Object::emit_literal_pool`].
///
/// `address` is meaningless until the owning pool has been emitted.
#[derive(Debug, Clone)]
pub struct Literal<TSymbolName> {
    pub value: Immediate<TSymbolName>,
    pub address: Address,
}

impl<TSymbolName> Literal<TSymbolName> {
    pub fn new(value: Immediate<TSymbolName>) -> Self {
        Literal { value, address: 0 }
    }
}

/// A placeholder `ldr Rd, [PC, #0]` waiting to be patched once its literal's
/// pool slot is known.
#[derive(Debug, Clone, Copy)]
pub struct LiteralReference {
    pub fixup_offset: Address,
    pub literal_index: usize,
}

impl LiteralReference {
    pub fn new(fixup_offset: Address, literal_index: usize) -> Self {
        LiteralReference {
            fixup_offset,
            literal_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_literal_has_no_address_yet() {
        let lit: Literal<String> = Literal::new(Immediate::Value(42));
        assert_eq!(lit.address, 0);
    }
}
