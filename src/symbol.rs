//! Symbolic names bound to an address in the buffer.

/// A name bound to an address within an [`crate::object::Object`].
///
/// `TSymbolName` is generic so that callers can pick whatever is cheapest
/// for their use case: a small integer for compact embedded label tables,
/// or a `String` for human-readable ones. Construction is explicit on
/// purpose -- `Symbol::new(42)` and a literal immediate `42` must never be
/// confused with each other.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Symbol<TSymbolName> {
    name: TSymbolName,
}

impl<TSymbolName> Symbol<TSymbolName> {
    pub fn new(name: TSymbolName) -> Self {
        Symbol { name }
    }

    pub fn name(&self) -> &TSymbolName {
        &self.name
    }
}

// `String`-named symbols may be constructed implicitly from anything that
// converts to a `String`, since there is no literal-immediate ambiguity to
// guard against for this binding (see `immediate::Immediate`'s `From<&str>`
// impl, which is the only place the ambiguity could arise).
impl From<&str> for Symbol<String> {
    fn from(name: &str) -> Self {
        Symbol::new(name.to_string())
    }
}

impl From<String> for Symbol<String> {
    fn from(name: String) -> Self {
        Symbol::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_symbols_order_by_name() {
        let a = Symbol::new(1);
        let b = Symbol::new(2);
        assert!(a < b);
        assert_eq!(a, Symbol::new(1));
    }

    #[test]
    fn string_symbols_convert_implicitly() {
        let a: Symbol<String> = "loop_top".into();
        let b = Symbol::new("loop_top".to_string());
        assert_eq!(a, b);
    }
}
