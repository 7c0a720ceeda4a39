//! Sample format conversion between native `f32` and signed 16-bit PCM.

/// Full-scale magnitude of 16-bit PCM, shared by both directions.
const I16_SCALE: f32 = 32768.0;

/// Convert `f32` samples in `[-1, 1]` to `i16`, clamping out-of-range input.
/// `+1.0` saturates at `i16::MAX`.
pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * I16_SCALE).round() as i16)
        .collect()
}

/// Convert `i16` samples to `f32` in `[-1, 1)`.
pub fn i16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / I16_SCALE).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_to_i16_clamps() {
        assert_eq!(
            f32_to_i16(&[0.0, 1.0, -1.0, 2.0, -3.0]),
            vec![0, i16::MAX, i16::MIN, i16::MAX, i16::MIN]
        );
        assert_eq!(f32_to_i16(&[0.5, -0.5]), vec![16384, -16384]);
    }

    #[test]
    fn test_i16_round_trip_is_exact() {
        let all: Vec<i16> = (i16::MIN..=i16::MAX).collect();
        assert_eq!(f32_to_i16(&i16_to_f32(&all)), all);
        assert_eq!(i16_to_f32(&[i16::MIN, 0, 16384]), vec![-1.0, 0.0, 0.5]);
    }

    #[test]
    fn test_f32_round_trip_is_close() {
        let original = vec![0.25f32, -0.75, 0.001, 0.9];
        let back = i16_to_f32(&f32_to_i16(&original));
        for (a, b) in original.iter().zip(&back) {
            assert!((a - b).abs() <= 0.5 / I16_SCALE);
        }
    }
}
