/// Fixed-capacity bit-set over pair indices, stored as little-endian 64-bit words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitSet {
    n_bits: usize,
    words: Vec<u64>,
}

impl BitSet {
    pub fn new(n_bits: usize) -> Self {
        Self {
            n_bits,
            words: vec![0; Self::n_words_for(n_bits)],
        }
    }

    pub fn n_words_for(n_bits: usize) -> usize {
        n_bits.div_ceil(64)
    }

    #[inline]
    pub fn insert(&mut self, idx: usize) {
        debug_assert!(idx < self.n_bits);
        self.words[idx / 64] |= 1u64 << (idx % 64);
    }

    #[inline]
    pub fn contains(&self, idx: usize) -> bool {
        idx < self.n_bits && self.words[idx / 64] & (1u64 << (idx % 64)) != 0
    }

    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(word_idx, &word)| {
            let mut rest = word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(word_idx * 64 + bit)
            })
        })
    }

    pub fn write_words(&self, out: &mut Vec<u8>) {
        for word in &self.words {
            out.extend_from_slice(&word.to_le_bytes());
        }
    }

    /// Overwrites the set from a byte slice produced by [`BitSet::write_words`].
    pub fn read_words(&mut self, bytes: &[u8]) {
        for (word, chunk) in self.words.iter_mut().zip(bytes.chunks_exact(8)) {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            *word = u64::from_le_bytes(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_iterate_across_words() {
        let mut bits = BitSet::new(130);
        for idx in [0, 63, 64, 129] {
            bits.insert(idx);
        }
        assert_eq!(bits.count_ones(), 4);
        assert!(bits.contains(64));
        assert!(!bits.contains(65));
        assert!(!bits.contains(500));
        assert_eq!(bits.iter_ones().collect::<Vec<_>>(), vec![0, 63, 64, 129]);

        let mut bytes = Vec::new();
        bits.write_words(&mut bytes);
        assert_eq!(bytes.len(), 3 * 8);
        let mut copy = BitSet::new(130);
        copy.read_words(&bytes);
        assert_eq!(copy, bits);

        bits.clear();
        assert_eq!(bits.count_ones(), 0);
    }
}
