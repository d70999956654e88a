//! Address-to-symbol mapping.
//!
//! A read-only lookup used by disassembly and trace formatting. Symbols with
//! a size enclose a region; zero-size symbols are labels (basic blocks)
//! inside the most recent enclosing symbol.

use crate::common::data::Uword;

/// One symbol: address, region size (zero for labels), and name.
#[derive(Clone, Debug)]
pub struct Symbol {
    /// Start address.
    pub address: Uword,
    /// Region size in bytes; zero marks a label.
    pub size: Uword,
    /// Symbol name.
    pub name: String,
}

/// An ordered collection of symbols.
#[derive(Default)]
pub struct SymbolMap {
    symbols: Vec<Symbol>,
    sorted: bool,
}

impl SymbolMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a symbol; call [`SymbolMap::sort`] before lookups.
    pub fn add(&mut self, address: Uword, size: Uword, name: impl Into<String>) {
        self.symbols.push(Symbol { address, size, name: name.into() });
        self.sorted = false;
    }

    /// Sorts the map by address, enabling lookups.
    pub fn sort(&mut self) {
        self.symbols.sort_by_key(|s| s.address);
        self.sorted = true;
    }

    /// True when a symbol starts exactly at `address`.
    pub fn contains(&self, address: Uword) -> bool {
        debug_assert!(self.sorted || self.symbols.is_empty());
        self.symbols
            .binary_search_by_key(&address, |s| s.address)
            .is_ok()
    }

    /// Renders the symbol covering `address` as `<name>`, `<name + 0x12>`,
    /// or `<func:label + 0x12>`; empty when nothing covers the address.
    pub fn find(&self, address: Uword) -> String {
        debug_assert!(self.sorted || self.symbols.is_empty());
        let mut enclosing: Option<&Symbol> = None;
        let mut label: Option<&Symbol> = None;
        for symbol in &self.symbols {
            if symbol.size != 0
                && symbol.address <= address
                && address <= symbol.address + symbol.size
            {
                enclosing = Some(symbol);
            } else if enclosing.is_some() && symbol.address <= address && symbol.size == 0 {
                label = Some(symbol);
            } else if address < symbol.address {
                break;
            }
        }

        let Some(enclosing) = enclosing else {
            return String::new();
        };
        let mut out = format!("<{}", enclosing.name);
        let mut offset = address - enclosing.address;
        if let Some(label) = label {
            out.push(':');
            out.push_str(&label.name);
            offset = address - label.address;
        }
        if offset != 0 {
            out.push_str(&format!(" + {:#x}", offset));
        }
        out.push('>');
        out
    }

    /// Like [`SymbolMap::find`] but prefixed with a space, for appending to
    /// a disassembly line.
    pub fn annotate(&self, address: Uword) -> String {
        let found = self.find(address);
        if found.is_empty() {
            found
        } else {
            format!(" {}", found)
        }
    }

    /// True when the map holds no symbols.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
