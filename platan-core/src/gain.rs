//! Peak normalization for recorded PCM before encoding.
//!
//! Scales a whole buffer so its peak lands just under full scale. PDM
//! capture often starts with a loud click; a leading window that is much
//! louder than the rest is treated as that click and dropped before peak
//! measurement and scaling.

/// Fraction below full scale to leave as margin. 0.0 would be true full
/// scale; the default avoids DAC clipping on playback.
pub const DEFAULT_HEADROOM: f32 = 0.002;

/// Leading samples inspected for a capture-start transient.
const CLICK_WINDOW: usize = 256;

/// Ratio between leading-window mean and remainder mean above which the
/// window is considered a click.
const CLICK_RATIO: f32 = 10.0;

/// Scale `pcm` so its peak reaches `(1 - headroom) * 32767`. Returns the
/// scaled samples; the result is shorter than the input when the leading
/// click window was dropped. Silent, empty, or shorter-than-window input
/// is returned unchanged.
pub fn normalize_peak(pcm: &[i16], headroom: f32) -> Vec<i16> {
    if pcm.is_empty() || pcm.len() < CLICK_WINDOW {
        return pcm.to_vec();
    }

    let mut body = pcm;
    let lead_mean = mean_abs(&pcm[..CLICK_WINDOW]);
    let rest_mean = mean_abs(&pcm[CLICK_WINDOW..]);
    if rest_mean > 0.0 && lead_mean > CLICK_RATIO * rest_mean {
        body = &pcm[CLICK_WINDOW..];
    }

    let max_abs = body
        .iter()
        .map(|&s| (s as i32).unsigned_abs())
        .max()
        .unwrap_or(0);
    if max_abs == 0 {
        return body.to_vec();
    }

    let target = ((1.0 - headroom) * 32767.0) as u32;
    let g = target as f32 / max_abs as f32;
    // Widen to f32 for the multiply, then round and saturate back to i16.
    body.iter()
        .map(|&s| (s as f32 * g).round().clamp(-32768.0, 32767.0) as i16)
        .collect()
}

fn mean_abs(pcm: &[i16]) -> f32 {
    if pcm.is_empty() {
        return 0.0;
    }
    let sum: u64 = pcm.iter().map(|&s| (s as i64).unsigned_abs()).sum();
    sum as f32 / pcm.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_reaches_target() {
        let mut pcm = vec![100i16; 1024];
        pcm[500] = 1000;
        pcm[501] = -1000;
        let out = normalize_peak(&pcm, DEFAULT_HEADROOM);
        let peak = out.iter().map(|&s| (s as i32).abs()).max().unwrap();
        let target = ((1.0 - DEFAULT_HEADROOM) * 32767.0) as i32;
        assert_eq!(peak, target);
        assert_eq!(out.len(), pcm.len());
    }

    #[test]
    fn silence_is_unchanged() {
        let pcm = vec![0i16; 1024];
        assert_eq!(normalize_peak(&pcm, DEFAULT_HEADROOM), pcm);
    }

    #[test]
    fn short_input_is_unchanged() {
        let pcm = vec![50i16; 100];
        assert_eq!(normalize_peak(&pcm, DEFAULT_HEADROOM), pcm);
    }

    #[test]
    fn leading_click_is_dropped() {
        let mut pcm = vec![200i16; 2048];
        for s in pcm.iter_mut().take(CLICK_WINDOW) {
            *s = 30000;
        }
        let out = normalize_peak(&pcm, DEFAULT_HEADROOM);
        assert_eq!(out.len(), pcm.len() - CLICK_WINDOW);
        // Peak is measured on the remainder, so the quiet body is scaled
        // all the way up instead of being dominated by the click.
        let peak = out.iter().map(|&s| (s as i32).abs()).max().unwrap();
        let target = ((1.0 - DEFAULT_HEADROOM) * 32767.0) as i32;
        assert_eq!(peak, target);
    }

    #[test]
    fn loud_start_below_ratio_is_kept() {
        let mut pcm = vec![1000i16; 2048];
        for s in pcm.iter_mut().take(CLICK_WINDOW) {
            *s = 5000; // 5x the rest, under the 10x threshold
        }
        let out = normalize_peak(&pcm, DEFAULT_HEADROOM);
        assert_eq!(out.len(), pcm.len());
    }

    #[test]
    fn scaling_saturates() {
        let mut pcm = vec![0i16; 1024];
        pcm[0] = i16::MIN; // abs = 32768, slightly above the i16::MAX peak
        pcm[1] = 16000;
        let out = normalize_peak(&pcm, 0.0);
        assert!(out.iter().all(|&s| (-32768..=32767).contains(&(s as i32))));
    }
}
