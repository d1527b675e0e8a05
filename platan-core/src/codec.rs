//! IMA ADPCM codec: 16-bit signed PCM to 4 bits per sample and back.
//!
//! Standard IMA tables; both directions run the same reconstruction so
//! encoder and decoder state stay in lockstep. Two samples pack into one
//! byte, first of the pair in the high nibble.

/// Fixed step-size table, indexed by `step_index` in [0, 88].
const STEP_TABLE: [i32; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17,
    19, 21, 23, 25, 28, 31, 34, 37, 41, 45,
    50, 55, 60, 66, 73, 80, 88, 97, 107, 118,
    130, 143, 157, 173, 190, 209, 230, 253, 279, 307,
    337, 371, 408, 449, 494, 544, 598, 658, 724, 796,
    876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066,
    2272, 2499, 2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358,
    5894, 6484, 7132, 7845, 8630, 9493, 10442, 11487, 12635, 13899,
    15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794, 32767,
];

/// Step-index adjustment per 4-bit delta code.
const INDEX_TABLE: [i32; 16] = [
    -1, -1, -1, -1, 2, 4, 6, 8,
    -1, -1, -1, -1, 2, 4, 6, 8,
];

/// Adaptive codec state, carried across samples within one stream.
/// Fresh state (`default`) at every stream or chunk boundary; a chunk is
/// only independently decodable if both sides reset here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodecState {
    predicted_sample: i32,
    step_index: i32,
}

impl CodecState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last predicted sample, always within i16 range.
    pub fn predicted_sample(&self) -> i16 {
        self.predicted_sample as i16
    }

    /// Current step-table index, always within [0, 88].
    pub fn step_index(&self) -> u8 {
        self.step_index as u8
    }

    /// Encode one sample into a 4-bit delta code (0..=15).
    pub fn encode_sample(&mut self, sample: i16) -> u8 {
        let step = STEP_TABLE[self.step_index as usize];

        let mut diff = sample as i32 - self.predicted_sample;
        let sign = if diff < 0 { 8 } else { 0 };
        if sign != 0 {
            diff = -diff;
        }

        // Three magnitude-halving comparisons: a logarithmic quantizer
        // without a division.
        let mut delta = 0;
        let mut temp_step = step;
        if diff >= temp_step {
            delta |= 4;
            diff -= temp_step;
        }
        temp_step >>= 1;
        if diff >= temp_step {
            delta |= 2;
            diff -= temp_step;
        }
        temp_step >>= 1;
        if diff >= temp_step {
            delta |= 1;
        }
        delta |= sign;

        self.advance(delta, step);
        delta as u8
    }

    /// Decode one 4-bit delta code into the reconstructed sample.
    pub fn decode_nibble(&mut self, delta: u8) -> i16 {
        let delta = (delta & 0x0F) as i32;
        let step = STEP_TABLE[self.step_index as usize];
        self.advance(delta, step);
        self.predicted_sample as i16
    }

    /// Shared reconstruction: must be identical on both sides or every
    /// subsequent sample diverges.
    fn advance(&mut self, delta: i32, step: i32) {
        let mut vpdiff = step >> 3;
        if delta & 4 != 0 {
            vpdiff += step;
        }
        if delta & 2 != 0 {
            vpdiff += step >> 1;
        }
        if delta & 1 != 0 {
            vpdiff += step >> 2;
        }
        if delta & 8 != 0 {
            self.predicted_sample -= vpdiff;
        } else {
            self.predicted_sample += vpdiff;
        }
        self.predicted_sample = self.predicted_sample.clamp(-32768, 32767);

        self.step_index = (self.step_index + INDEX_TABLE[delta as usize]).clamp(0, 88);
    }
}

/// Caller contract violation: the provided output buffer cannot hold the
/// required result. Never silently truncated.
#[derive(Debug, thiserror::Error)]
#[error("output buffer too small: need {needed}, have {capacity}")]
pub struct CodecContractError {
    pub needed: usize,
    pub capacity: usize,
}

/// Number of packed bytes produced by encoding `nsamples` samples.
pub fn encoded_len(nsamples: usize) -> usize {
    (nsamples + 1) / 2
}

/// Number of samples produced by decoding `nbytes` packed bytes.
pub fn decoded_len(nbytes: usize) -> usize {
    nbytes * 2
}

/// Encode a PCM buffer from a fresh stream state. An odd sample count
/// leaves the low nibble of the final byte zero; the true sample count is
/// the caller's metadata to carry.
pub fn encode(pcm: &[i16]) -> Vec<u8> {
    let mut out = vec![0u8; encoded_len(pcm.len())];
    let mut state = CodecState::new();
    encode_with_state(&mut state, pcm, &mut out);
    out
}

/// Encode into a caller-provided buffer. Returns the number of bytes
/// written, or a contract error if the buffer is too small.
pub fn encode_into(pcm: &[i16], out: &mut [u8]) -> Result<usize, CodecContractError> {
    let needed = encoded_len(pcm.len());
    if out.len() < needed {
        return Err(CodecContractError {
            needed,
            capacity: out.len(),
        });
    }
    let mut state = CodecState::new();
    encode_with_state(&mut state, pcm, out);
    Ok(needed)
}

fn encode_with_state(state: &mut CodecState, pcm: &[i16], out: &mut [u8]) {
    for (i, &sample) in pcm.iter().enumerate() {
        let delta = state.encode_sample(sample);
        if i & 1 == 0 {
            out[i >> 1] = delta << 4;
        } else {
            out[i >> 1] |= delta & 0x0F;
        }
    }
}

/// Decode a packed buffer from a fresh stream state. Empty input decodes
/// to empty output.
pub fn decode(adpcm: &[u8]) -> Vec<i16> {
    let mut out = vec![0i16; decoded_len(adpcm.len())];
    let mut state = CodecState::new();
    decode_with_state(&mut state, adpcm, &mut out);
    out
}

/// Decode into a caller-provided buffer. Returns the number of samples
/// written, or a contract error if the buffer is too small.
pub fn decode_into(adpcm: &[u8], out: &mut [i16]) -> Result<usize, CodecContractError> {
    let needed = decoded_len(adpcm.len());
    if out.len() < needed {
        return Err(CodecContractError {
            needed,
            capacity: out.len(),
        });
    }
    let mut state = CodecState::new();
    decode_with_state(&mut state, adpcm, out);
    Ok(needed)
}

fn decode_with_state(state: &mut CodecState, adpcm: &[u8], out: &mut [i16]) {
    for i in 0..decoded_len(adpcm.len()) {
        let packed = adpcm[i >> 1];
        let delta = if i & 1 == 0 { packed >> 4 } else { packed & 0x0F };
        out[i] = state.decode_nibble(delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn reference_vector() {
        // Precomputed against the IMA reference tables.
        let pcm: [i16; 8] = [0, 100, -100, 5000, -5000, 32000, -32000, 0];
        let encoded = encode(&pcm);
        assert_eq!(encoded, vec![0x07, 0xF7, 0xF7, 0xF2]);

        let decoded = decode(&encoded);
        assert_eq!(decoded, vec![0, 11, -19, 44, -92, 201, -430, 22]);
    }

    #[test]
    fn encode_is_deterministic() {
        let mut rng = rand::thread_rng();
        let pcm: Vec<i16> = (0..2048).map(|_| rng.gen()).collect();
        assert_eq!(encode(&pcm), encode(&pcm));
    }

    #[test]
    fn roundtrip_tracks_reference_decoder() {
        // decode(encode(s)) must be bit-exact to the decoder's own
        // reconstruction, i.e. the predicted-sample sequence the encoder
        // itself produced.
        let pcm: Vec<i16> = (0..1000)
            .map(|i| ((i as f32 * 0.1).sin() * 12000.0) as i16)
            .collect();
        let encoded = encode(&pcm);
        let decoded = decode(&encoded);

        let mut state = CodecState::new();
        let reference: Vec<i16> = pcm
            .iter()
            .map(|&s| {
                state.encode_sample(s);
                state.predicted_sample()
            })
            .collect();
        assert_eq!(decoded, reference);
    }

    #[test]
    fn state_stays_clamped_under_adversarial_input() {
        let mut state = CodecState::new();
        for i in 0..10_000 {
            let sample = if i % 2 == 0 { i16::MAX } else { i16::MIN };
            state.encode_sample(sample);
            assert!(state.step_index() <= 88);
            // predicted_sample() is i16 by construction; check the raw
            // accumulator never escaped either.
            assert!((-32768..=32767).contains(&state.predicted_sample));
        }
    }

    #[test]
    fn odd_length_pads_low_nibble() {
        let pcm: [i16; 3] = [0, 100, -100];
        let encoded = encode(&pcm);
        assert_eq!(encoded.len(), 2);
        assert_eq!(encoded[1] & 0x0F, 0);
        // Decoder sees 2 * bytes samples, one more than was encoded.
        assert_eq!(decode(&encoded).len(), 4);
    }

    #[test]
    fn empty_input() {
        assert!(encode(&[]).is_empty());
        assert!(decode(&[]).is_empty());
    }

    #[test]
    fn into_variants_check_capacity() {
        let pcm: [i16; 8] = [0; 8];
        let mut small = [0u8; 3];
        let err = encode_into(&pcm, &mut small).unwrap_err();
        assert_eq!(err.needed, 4);
        assert_eq!(err.capacity, 3);

        let mut ok = [0u8; 4];
        assert_eq!(encode_into(&pcm, &mut ok).unwrap(), 4);

        let mut out = [0i16; 7];
        assert!(decode_into(&ok, &mut out).is_err());
        let mut out = [0i16; 8];
        assert_eq!(decode_into(&ok, &mut out).unwrap(), 8);
    }

    #[test]
    fn into_matches_allocating_variants() {
        let mut rng = rand::thread_rng();
        let pcm: Vec<i16> = (0..512).map(|_| rng.gen()).collect();
        let mut buf = vec![0u8; encoded_len(pcm.len())];
        let n = encode_into(&pcm, &mut buf).unwrap();
        assert_eq!(&buf[..n], encode(&pcm).as_slice());

        let mut samples = vec![0i16; decoded_len(n)];
        let m = decode_into(&buf[..n], &mut samples).unwrap();
        assert_eq!(&samples[..m], decode(&buf[..n]).as_slice());
    }
}
