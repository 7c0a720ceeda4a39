//! Reed-Solomon block code over GF(2^8).
//!
//! Systematic encoder plus an errors-and-erasures decoder. Codewords are
//! stored data first, parity last; byte `i` of an `n`-byte codeword is the
//! coefficient of `x^(n-1-i)`. Generator roots are `α^0 .. α^(2t-1)` with
//! `α = 2` and primitive polynomial `0x11d`. Shortened codes (n < 255) are
//! handled implicitly.

use crate::error::{AudioModemError, Result};

const PRIMITIVE_POLY: u16 = 0x11d;
const FIELD_ORDER: usize = 255;

struct GfTables {
    exp: [u8; 2 * FIELD_ORDER],
    log: [u8; 256],
}

const fn build_tables() -> GfTables {
    let mut exp = [0u8; 2 * FIELD_ORDER];
    let mut log = [0u8; 256];
    let mut x: u16 = 1;
    let mut i = 0;
    while i < FIELD_ORDER {
        exp[i] = x as u8;
        log[x as usize] = i as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= PRIMITIVE_POLY;
        }
        i += 1;
    }
    while i < 2 * FIELD_ORDER {
        exp[i] = exp[i - FIELD_ORDER];
        i += 1;
    }
    GfTables { exp, log }
}

static GF: GfTables = build_tables();

fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    GF.exp[GF.log[a as usize] as usize + GF.log[b as usize] as usize]
}

// b must be non-zero
fn gf_div(a: u8, b: u8) -> u8 {
    if a == 0 {
        return 0;
    }
    GF.exp[GF.log[a as usize] as usize + FIELD_ORDER - GF.log[b as usize] as usize]
}

fn gf_inv(a: u8) -> u8 {
    GF.exp[FIELD_ORDER - GF.log[a as usize] as usize]
}

fn alpha_pow(power: usize) -> u8 {
    GF.exp[power % FIELD_ORDER]
}

/// Product of two polynomials stored in the same coefficient order.
fn poly_mul(p: &[u8], q: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; p.len() + q.len() - 1];
    for (i, &a) in p.iter().enumerate() {
        if a == 0 {
            continue;
        }
        for (j, &b) in q.iter().enumerate() {
            out[i + j] ^= gf_mul(a, b);
        }
    }
    out
}

/// Evaluate a polynomial stored lowest degree first.
fn poly_eval(p: &[u8], x: u8) -> u8 {
    p.iter().rev().fold(0u8, |acc, &c| gf_mul(acc, x) ^ c)
}

fn degree(p: &[u8]) -> usize {
    p.iter().rposition(|&c| c != 0).unwrap_or(0)
}

/// Berlekamp-Massey over a syndrome sequence. Returns the connection
/// polynomial (lowest degree first), or `None` if the sequence needs more
/// than `len / 2` errors to explain.
fn berlekamp_massey(syndromes: &[u8]) -> Option<Vec<u8>> {
    let mut current = vec![1u8];
    let mut previous = vec![1u8];
    let mut order = 0usize;
    let mut shift = 1usize;
    let mut last_discrepancy = 1u8;

    for n in 0..syndromes.len() {
        let mut discrepancy = syndromes[n];
        for i in 1..=order.min(current.len() - 1) {
            discrepancy ^= gf_mul(current[i], syndromes[n - i]);
        }

        if discrepancy == 0 {
            shift += 1;
            continue;
        }

        let scale = gf_div(discrepancy, last_discrepancy);
        let snapshot = current.clone();
        if current.len() < previous.len() + shift {
            current.resize(previous.len() + shift, 0);
        }
        for (i, &b) in previous.iter().enumerate() {
            current[i + shift] ^= gf_mul(scale, b);
        }

        if 2 * order <= n {
            order = n + 1 - order;
            previous = snapshot;
            last_discrepancy = discrepancy;
            shift = 1;
        } else {
            shift += 1;
        }
    }

    if 2 * order > syndromes.len() {
        return None;
    }
    current.resize(order + 1, 0);
    Some(current)
}

/// Reed-Solomon codec with a fixed number of parity bytes per codeword.
#[derive(Debug, Clone)]
pub struct ReedSolomon {
    parity_len: usize,
    /// Generator polynomial, highest degree first (monic)
    generator: Vec<u8>,
}

impl ReedSolomon {
    pub fn new(parity_len: usize) -> Result<Self> {
        if parity_len == 0 || parity_len >= FIELD_ORDER {
            return Err(AudioModemError::InvalidConfig(format!(
                "Reed-Solomon parity length {} out of range",
                parity_len
            )));
        }

        let mut generator = vec![1u8];
        for i in 0..parity_len {
            generator = poly_mul(&generator, &[1, alpha_pow(i)]);
        }

        Ok(Self { parity_len, generator })
    }

    pub fn parity_len(&self) -> usize {
        self.parity_len
    }

    /// Number of byte errors with unknown positions one codeword can absorb.
    pub fn correctable(&self) -> usize {
        self.parity_len / 2
    }

    /// Compute the parity bytes for `data`.
    pub fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() + self.parity_len > FIELD_ORDER {
            return Err(AudioModemError::InvalidInputSize);
        }

        let mut remainder = vec![0u8; self.parity_len];
        for &byte in data {
            let coef = byte ^ remainder[0];
            remainder.copy_within(1.., 0);
            remainder[self.parity_len - 1] = 0;
            if coef != 0 {
                for (r, &g) in remainder.iter_mut().zip(&self.generator[1..]) {
                    *r ^= gf_mul(g, coef);
                }
            }
        }
        Ok(remainder)
    }

    fn syndromes(&self, codeword: &[u8]) -> Vec<u8> {
        (0..self.parity_len)
            .map(|i| {
                let x = alpha_pow(i);
                codeword.iter().fold(0u8, |acc, &c| gf_mul(acc, x) ^ c)
            })
            .collect()
    }

    /// True when every syndrome vanishes.
    pub fn is_valid(&self, codeword: &[u8]) -> bool {
        self.syndromes(codeword).iter().all(|&s| s == 0)
    }

    /// Correct `codeword` (data followed by parity) in place.
    ///
    /// `erasures` are byte positions known to be unreliable. Up to `e`
    /// erasures and `v` unknown errors are corrected as long as
    /// `2v + e <= parity_len`. Returns the number of bytes changed, or `None`
    /// when the damage exceeds the code's capacity; the codeword is left
    /// untouched in that case.
    pub fn correct(&self, codeword: &mut [u8], erasures: &[usize]) -> Option<usize> {
        let n = codeword.len();
        if n > FIELD_ORDER || n < self.parity_len {
            return None;
        }

        let mut erasures: Vec<usize> = erasures.iter().copied().filter(|&p| p < n).collect();
        erasures.sort_unstable();
        erasures.dedup();
        if erasures.len() > self.parity_len {
            return None;
        }

        let syndromes = self.syndromes(codeword);
        if syndromes.iter().all(|&s| s == 0) {
            return Some(0);
        }

        let locator_of = |position: usize| alpha_pow(n - 1 - position);

        let mut erasure_locator = vec![1u8];
        for &p in &erasures {
            erasure_locator = poly_mul(&erasure_locator, &[1, locator_of(p)]);
        }

        let mut forney = poly_mul(&syndromes, &erasure_locator);
        forney.truncate(self.parity_len);

        let error_locator = berlekamp_massey(&forney[erasures.len()..])?;
        let locator = poly_mul(&error_locator, &erasure_locator);
        let locator_degree = degree(&locator);

        let positions: Vec<usize> = (0..n)
            .filter(|&p| poly_eval(&locator, gf_inv(locator_of(p))) == 0)
            .collect();
        if positions.len() != locator_degree {
            return None;
        }

        let mut evaluator = poly_mul(&syndromes, &locator);
        evaluator.truncate(self.parity_len);

        // Formal derivative: in characteristic 2 only odd powers survive.
        let derivative: Vec<u8> = locator
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, &c)| if i % 2 == 1 { c } else { 0 })
            .collect();

        let mut corrected = codeword.to_vec();
        let mut changed = 0;
        for &p in &positions {
            let x = locator_of(p);
            let x_inv = gf_inv(x);
            let denominator = poly_eval(&derivative, x_inv);
            if denominator == 0 {
                return None;
            }
            let magnitude = gf_mul(x, gf_div(poly_eval(&evaluator, x_inv), denominator));
            if magnitude != 0 {
                corrected[p] ^= magnitude;
                changed += 1;
            }
        }

        if !self.is_valid(&corrected) {
            return None;
        }
        codeword.copy_from_slice(&corrected);
        Some(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codeword(rs: &ReedSolomon, data: &[u8]) -> Vec<u8> {
        let mut out = data.to_vec();
        out.extend(rs.encode(data).unwrap());
        out
    }

    #[test]
    fn test_field_tables() {
        assert_eq!(GF.exp[0], 1);
        assert_eq!(GF.exp[8], 0x1d);
        for a in 1..=255u8 {
            assert_eq!(gf_mul(a, gf_inv(a)), 1);
            assert_eq!(gf_div(gf_mul(a, 7), 7), a);
        }
    }

    #[test]
    fn test_encode_is_systematic_and_valid() {
        let rs = ReedSolomon::new(8).unwrap();
        let data: Vec<u8> = (0..32).map(|i| (i * 37 + 11) as u8).collect();
        let cw = codeword(&rs, &data);
        assert_eq!(cw.len(), 40);
        assert_eq!(&cw[..32], &data[..]);
        assert!(rs.is_valid(&cw));
    }

    #[test]
    fn test_corrects_up_to_t_errors() {
        let rs = ReedSolomon::new(8).unwrap();
        let data = b"The quick brown fox jumps over t".to_vec();
        let clean = codeword(&rs, &data);

        for errors in 1..=4 {
            let mut cw = clean.clone();
            for k in 0..errors {
                cw[k * 9 + 2] ^= 0x5a + k as u8;
            }
            assert_eq!(rs.correct(&mut cw, &[]), Some(errors));
            assert_eq!(cw, clean);
        }
    }

    #[test]
    fn test_rejects_beyond_capacity() {
        let rs = ReedSolomon::new(8).unwrap();
        let data: Vec<u8> = (0..20).collect();
        let clean = codeword(&rs, &data);

        let mut cw = clean.clone();
        for k in 0..5 {
            cw[k * 5] ^= 0xff;
        }
        let before = cw.clone();
        let result = rs.correct(&mut cw, &[]);
        // Five errors either fail or land on another codeword, never on the original.
        if result.is_none() {
            assert_eq!(cw, before);
        } else {
            assert_ne!(cw, clean);
        }
    }

    #[test]
    fn test_erasures_double_capacity() {
        let rs = ReedSolomon::new(8).unwrap();
        let data: Vec<u8> = (100..132).collect();
        let clean = codeword(&rs, &data);

        let mut cw = clean.clone();
        let erased = [0usize, 3, 7, 12, 20, 25, 33, 39];
        for &p in &erased {
            cw[p] = 0;
        }
        assert!(rs.correct(&mut cw, &erased).is_some());
        assert_eq!(cw, clean);
    }

    #[test]
    fn test_mixed_errors_and_erasures() {
        let rs = ReedSolomon::new(8).unwrap();
        let data = b"errors and erasures".to_vec();
        let clean = codeword(&rs, &data);

        let mut cw = clean.clone();
        let erased = [1usize, 4, 9, 16];
        for &p in &erased {
            cw[p] = 0;
        }
        cw[6] ^= 0x21;
        cw[22] ^= 0x99;
        assert!(rs.correct(&mut cw, &erased).is_some());
        assert_eq!(cw, clean);
    }

    #[test]
    fn test_erased_but_correct_bytes() {
        let rs = ReedSolomon::new(4).unwrap();
        let data = [0x00, 0x8c];
        let clean = codeword(&rs, &data);
        let mut cw = clean.clone();
        assert_eq!(rs.correct(&mut cw, &[0, 1]), Some(0));
        assert_eq!(cw, clean);
    }

    #[test]
    fn test_short_header_code() {
        let rs = ReedSolomon::new(4).unwrap();
        let clean = codeword(&rs, &[0x00, 0x2a]);
        assert_eq!(clean.len(), 6);

        let mut cw = clean.clone();
        cw[1] ^= 0x13;
        cw[4] ^= 0x01;
        assert_eq!(rs.correct(&mut cw, &[]), Some(2));
        assert_eq!(cw, clean);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(ReedSolomon::new(0).is_err());
        assert!(ReedSolomon::new(255).is_err());
        let rs = ReedSolomon::new(8).unwrap();
        assert_eq!(rs.encode(&[0u8; 248]), Err(AudioModemError::InvalidInputSize));
    }
}
