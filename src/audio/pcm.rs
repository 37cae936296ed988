//! PCM sample conversion between the capture format (f32) and the wire
//! format (little-endian 16-bit signed linear PCM).

use anyhow::{bail, Result};

/// Convert float samples in [-1.0, 1.0] to 16-bit signed PCM.
///
/// Samples are scaled by 32768 and saturated, so +1.0 maps to `i16::MAX`
/// rather than wrapping. Out-of-range input is clamped the same way.
pub fn f32_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s * 32768.0).clamp(-32768.0, 32767.0) as i16)
        .collect()
}

/// Convert 16-bit signed PCM back to float samples in [-1.0, 1.0).
pub fn pcm16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| f32::from(s) / 32768.0).collect()
}

/// Pack 16-bit samples as little-endian bytes.
pub fn pcm16_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Unpack little-endian bytes into 16-bit samples.
///
/// Fails on an odd byte count, which indicates a truncated payload.
pub fn bytes_to_pcm16(bytes: &[u8]) -> Result<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        bail!("PCM payload has odd length ({} bytes)", bytes.len());
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_saturates_at_positive_full_scale() {
        let converted = f32_to_pcm16(&[1.0, 2.0]);
        assert_eq!(converted, vec![i16::MAX, i16::MAX]);
    }

    #[test]
    fn test_conversion_saturates_at_negative_full_scale() {
        let converted = f32_to_pcm16(&[-1.0, -2.0]);
        assert_eq!(converted, vec![i16::MIN, i16::MIN]);
    }

    #[test]
    fn test_zero_maps_to_zero() {
        assert_eq!(f32_to_pcm16(&[0.0]), vec![0]);
    }

    #[test]
    fn test_round_trip_within_quantization_error() {
        let original = vec![0.0_f32, 0.25, -0.25, 0.5, -0.5, 0.999, -0.999];

        let pcm = f32_to_pcm16(&original);
        let restored = pcm16_to_f32(&pcm);

        for (a, b) in original.iter().zip(restored.iter()) {
            assert!(
                (a - b).abs() <= 1.0 / 32768.0,
                "sample {} restored as {} exceeds quantization error",
                a,
                b
            );
        }
    }

    #[test]
    fn test_byte_packing_round_trip() {
        let samples = vec![100_i16, -200, 300, -400, i16::MAX, i16::MIN];

        let bytes = pcm16_to_bytes(&samples);
        assert_eq!(bytes.len(), samples.len() * 2);

        let restored = bytes_to_pcm16(&bytes).unwrap();
        assert_eq!(restored, samples);
    }

    #[test]
    fn test_odd_byte_count_rejected() {
        assert!(bytes_to_pcm16(&[0x01, 0x02, 0x03]).is_err());
    }
}
