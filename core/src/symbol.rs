//! Bit-group to tone mapping.
//!
//! A symbol carries `4 × tones_per_symbol` bits. Each tone slot carries one
//! nibble and selects one of its 16 candidate frequencies; the most
//! significant nibble goes to slot 0, so bytes keep their order on the air.

/// Candidate frequencies per tone slot (one nibble).
pub const TONES_PER_SLOT: usize = 16;

/// Which marker tone set a window carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    /// Opens a frame; first preamble window
    Start,
    /// Second preamble window and both postamble windows
    End,
}

/// One modulation symbol, stored as its tone indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    tones: Vec<u8>,
}

impl Symbol {
    /// Build a symbol from tone indices (each below 16).
    pub fn from_tones(tones: Vec<u8>) -> Self {
        debug_assert!(tones.iter().all(|&t| (t as usize) < TONES_PER_SLOT));
        Self { tones }
    }

    /// Split `bytes` into nibbles, high nibble first.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let tones = bytes.iter().flat_map(|&b| [b >> 4, b & 0x0F]).collect();
        Self { tones }
    }

    pub fn tones(&self) -> &[u8] {
        &self.tones
    }

    pub fn tone(&self, slot: usize) -> u8 {
        self.tones[slot]
    }

    /// Reassemble the bytes carried by this symbol.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.tones
            .chunks(2)
            .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
            .collect()
    }
}

/// Split frame bytes into symbols of `bytes_per_symbol`, zero-padding the tail.
pub fn symbols_from_bytes(bytes: &[u8], bytes_per_symbol: usize) -> Vec<Symbol> {
    bytes
        .chunks(bytes_per_symbol)
        .map(|chunk| {
            let mut padded = chunk.to_vec();
            padded.resize(bytes_per_symbol, 0);
            Symbol::from_bytes(&padded)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibble_mapping_is_msb_first() {
        let symbol = Symbol::from_bytes(&[0xAB, 0xCD, 0xEF]);
        assert_eq!(symbol.tones(), &[0xA, 0xB, 0xC, 0xD, 0xE, 0xF]);
        assert_eq!(symbol.to_bytes(), vec![0xAB, 0xCD, 0xEF]);
    }

    #[test]
    fn test_from_tones() {
        let symbol = Symbol::from_tones(vec![1, 2, 3, 4]);
        assert_eq!(symbol.tone(2), 3);
        assert_eq!(symbol.to_bytes(), vec![0x12, 0x34]);
    }

    #[test]
    fn test_symbols_pad_tail() {
        let symbols = symbols_from_bytes(&[1, 2, 3, 4], 3);
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[1].to_bytes(), vec![4, 0, 0]);
    }
}
