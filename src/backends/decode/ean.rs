// SPDX-License-Identifier: GPL-3.0-only

//! Single-row EAN/UPC decoding
//!
//! Run-length decoder for the retail formats printed on warehouse labels.
//! A row is binarized (adaptive sliding-mean with a global-threshold
//! fallback), collapsed into bar widths, normalized to modules 1..4, then
//! matched against the guard and digit patterns. UPC-A is EAN-13 with a
//! leading zero and is reported as 12 digits.

use crate::config::{CodeFamily, ReaderSet};

/// Left "A" digit patterns; four run widths summing to 7 modules
const A_PATTERNS: [(u8, u8, u8, u8); 10] = [
    (3, 2, 1, 1),
    (2, 2, 2, 1),
    (2, 1, 2, 2),
    (1, 4, 1, 1),
    (1, 1, 3, 2),
    (1, 2, 3, 1),
    (1, 1, 1, 4),
    (1, 3, 1, 2),
    (1, 2, 1, 3),
    (3, 1, 1, 2),
];

/// Left "B" patterns: A mirrored
const B_PATTERNS: [(u8, u8, u8, u8); 10] = [
    (1, 1, 2, 3),
    (1, 2, 2, 2),
    (2, 2, 1, 2),
    (1, 1, 4, 1),
    (2, 3, 1, 1),
    (1, 3, 2, 1),
    (4, 1, 1, 1),
    (2, 1, 3, 1),
    (3, 1, 2, 1),
    (2, 1, 1, 3),
];

/// Right-side patterns match A by run widths; bar/space inversion does not
/// change the widths.
const C_PATTERNS: [(u8, u8, u8, u8); 10] = A_PATTERNS;

/// First digit encoded in the A/B parity of the six left digits.
/// true = B
const FIRST_DIGIT_MASKS: [[bool; 6]; 10] = [
    [false, false, false, false, false, false],
    [false, false, true, false, true, true],
    [false, false, true, true, false, true],
    [false, false, true, true, true, false],
    [false, true, false, false, true, true],
    [false, true, true, false, false, true],
    [false, true, true, true, false, false],
    [false, true, false, true, false, true],
    [false, true, false, true, true, false],
    [false, true, true, false, true, false],
];

/// Minimum pixel width worth attempting; narrower rows cannot hold the
/// 95 modules of an EAN-13.
const MIN_ROW_PX: usize = 95;

/// A decoded 1D result with the family that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearDetection {
    pub text: String,
    pub family: CodeFamily,
}

/// Try to decode one grayscale row against the enabled 1D families
pub fn decode_row(row: &[u8], readers: &ReaderSet) -> Option<LinearDetection> {
    if row.len() < MIN_ROW_PX {
        return None;
    }

    let modules = modules_for_row(row)?;

    if readers.contains(CodeFamily::Ean13) || readers.contains(CodeFamily::UpcA) {
        if let Some(detection) = decode_ean13(&modules, readers) {
            return Some(detection);
        }
    }
    if readers.contains(CodeFamily::Ean8) {
        if let Some(text) = decode_ean8(&modules) {
            return Some(LinearDetection {
                text,
                family: CodeFamily::Ean8,
            });
        }
    }
    None
}

/// Binarize and normalize a row into module widths.
///
/// Adaptive thresholding first; when it yields too few bars (washed-out
/// rows), fall back to the global threshold.
fn modules_for_row(row: &[u8]) -> Option<Vec<u8>> {
    let adaptive = binarize_adaptive(row);
    let rl = runs(&adaptive);
    if rl.len() >= 40 {
        return Some(normalize_modules(&rl));
    }
    let global = binarize_global(row);
    let rl = runs(&global);
    if rl.len() < 40 {
        return None;
    }
    Some(normalize_modules(&rl))
}

fn decode_ean13(modules: &[u8], readers: &ReaderSet) -> Option<LinearDetection> {
    let mut idx = find_start_guard(modules)? + 3;

    let mut left_digits = [0u8; 6];
    let mut left_is_b = [false; 6];
    for d in 0..6 {
        let pat = pattern_at(modules, idx)?;
        let (digit_a, dist_a) = best_match(pat, &A_PATTERNS);
        let (digit_b, dist_b) = best_match(pat, &B_PATTERNS);
        if dist_a <= dist_b {
            left_digits[d] = digit_a;
        } else {
            left_digits[d] = digit_b;
            left_is_b[d] = true;
        }
        idx += 4;
    }

    if !is_center_guard(modules, idx) {
        return None;
    }
    idx += 5;

    let mut right_digits = [0u8; 6];
    for d in 0..6 {
        let pat = pattern_at(modules, idx)?;
        right_digits[d] = best_match(pat, &C_PATTERNS).0;
        idx += 4;
    }

    if !is_end_guard(modules, idx) {
        return None;
    }

    let first = FIRST_DIGIT_MASKS.iter().position(|m| *m == left_is_b)? as u8;
    let mut digits = [0u8; 13];
    digits[0] = first;
    digits[1..7].copy_from_slice(&left_digits);
    digits[7..13].copy_from_slice(&right_digits);

    if !ean13_checksum_ok(&digits) {
        return None;
    }

    // Leading zero means UPC-A; report whichever family is enabled.
    if digits[0] == 0 && readers.contains(CodeFamily::UpcA) {
        Some(LinearDetection {
            text: digits[1..].iter().map(|d| (b'0' + d) as char).collect(),
            family: CodeFamily::UpcA,
        })
    } else if readers.contains(CodeFamily::Ean13) {
        Some(LinearDetection {
            text: digits.iter().map(|d| (b'0' + d) as char).collect(),
            family: CodeFamily::Ean13,
        })
    } else {
        None
    }
}

/// EAN-8: start guard, four A digits, center guard, four C digits, end guard
fn decode_ean8(modules: &[u8]) -> Option<String> {
    let mut idx = find_start_guard(modules)? + 3;

    let mut digits = [0u8; 8];
    for d in 0..4 {
        let pat = pattern_at(modules, idx)?;
        let (digit, dist) = best_match(pat, &A_PATTERNS);
        if dist > 2 {
            return None;
        }
        digits[d] = digit;
        idx += 4;
    }

    if !is_center_guard(modules, idx) {
        return None;
    }
    idx += 5;

    for d in 4..8 {
        let pat = pattern_at(modules, idx)?;
        digits[d] = best_match(pat, &C_PATTERNS).0;
        idx += 4;
    }

    if !is_end_guard(modules, idx) {
        return None;
    }
    if !ean8_checksum_ok(&digits) {
        return None;
    }

    Some(digits.iter().map(|d| (b'0' + d) as char).collect())
}

fn pattern_at(m: &[u8], idx: usize) -> Option<(u8, u8, u8, u8)> {
    if idx + 3 >= m.len() {
        return None;
    }
    Some((m[idx], m[idx + 1], m[idx + 2], m[idx + 3]))
}

fn find_start_guard(m: &[u8]) -> Option<usize> {
    (0..m.len().saturating_sub(2)).find(|&i| m[i] == 1 && m[i + 1] == 1 && m[i + 2] == 1)
}

fn is_center_guard(m: &[u8], i: usize) -> bool {
    i + 4 < m.len() && m[i..=i + 4].iter().all(|&w| w == 1)
}

fn is_end_guard(m: &[u8], i: usize) -> bool {
    i + 2 < m.len() && m[i..=i + 2].iter().all(|&w| w == 1)
}

/// Nearest digit by Manhattan distance over the four run widths
fn best_match(pat: (u8, u8, u8, u8), dict: &[(u8, u8, u8, u8); 10]) -> (u8, u32) {
    let mut best = (0u8, u32::MAX);
    for (i, &cand) in dict.iter().enumerate() {
        let dist = pat.0.abs_diff(cand.0) as u32
            + pat.1.abs_diff(cand.1) as u32
            + pat.2.abs_diff(cand.2) as u32
            + pat.3.abs_diff(cand.3) as u32;
        if dist < best.1 {
            best = (i as u8, dist);
        }
    }
    best
}

fn ean13_checksum_ok(d: &[u8; 13]) -> bool {
    let sum: u32 = d[..12]
        .iter()
        .enumerate()
        .map(|(i, &v)| v as u32 * if i % 2 == 0 { 1 } else { 3 })
        .sum();
    (10 - sum % 10) % 10 == d[12] as u32
}

fn ean8_checksum_ok(d: &[u8; 8]) -> bool {
    let sum: u32 = d[..7]
        .iter()
        .enumerate()
        .map(|(i, &v)| v as u32 * if i % 2 == 0 { 3 } else { 1 })
        .sum();
    (10 - sum % 10) % 10 == d[7] as u32
}

/// Global threshold: mean blended with the min/max midpoint. Fast but
/// degrades under lighting gradients.
fn binarize_global(row: &[u8]) -> Vec<bool> {
    let (mut min_v, mut max_v) = (u8::MAX, 0u8);
    let mut sum = 0u64;
    for &v in row {
        min_v = min_v.min(v);
        max_v = max_v.max(v);
        sum += v as u64;
    }
    let mean = (sum / row.len() as u64) as u16;
    let mid = (min_v as u16 + max_v as u16) / 2;
    let t = ((mean + mid) / 2) as u8;
    row.iter().map(|&v| v < t).collect()
}

/// Sliding-mean adaptive threshold with a small dark bias; handles the
/// uneven illumination typical of handheld captures.
fn binarize_adaptive(row: &[u8]) -> Vec<bool> {
    let n = row.len();
    if n == 0 {
        return Vec::new();
    }
    let win = (n / 32).clamp(8, 64);
    let bias = 5i32;

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0u32);
    for &v in row {
        prefix.push(prefix[prefix.len() - 1] + v as u32);
    }

    (0..n)
        .map(|i| {
            let left = i.saturating_sub(win);
            let right = (i + win).min(n - 1);
            let mean = ((prefix[right + 1] - prefix[left]) / (right - left + 1) as u32) as i32;
            (row[i] as i32) < mean - bias
        })
        .collect()
}

/// Collapse a binarized row into run lengths
fn runs(bin: &[bool]) -> Vec<usize> {
    let mut out = Vec::new();
    let Some(&first) = bin.first() else {
        return out;
    };
    let mut cur = first;
    let mut len = 1usize;
    for &b in &bin[1..] {
        if b == cur {
            len += 1;
        } else {
            out.push(len);
            cur = b;
            len = 1;
        }
    }
    out.push(len);
    out
}

/// Normalize run lengths to module widths 1..4.
///
/// The base module is estimated as the lower quartile, which is robust to
/// the wide quiet-zone runs at either end.
fn normalize_modules(rl: &[usize]) -> Vec<u8> {
    let mut sorted = rl.to_vec();
    sorted.sort_unstable();
    let base = sorted[sorted.len() / 4].max(1);
    rl.iter()
        .map(|&w| ((w + base / 2) / base).clamp(1, 4) as u8)
        .collect()
}

/// Render an ideal grayscale row for a digit string (12 digits = UPC-A,
/// 13 = EAN-13), `unit` pixels per module. Used by the synthetic capture
/// path and tests; `None` when the input is not 12 or 13 ASCII digits.
pub fn synthesize_ean13_row(digits: &str, unit: usize) -> Option<Vec<u8>> {
    if !digits.bytes().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let ds: Vec<u8> = digits.bytes().map(|c| c - b'0').collect();
    let mut ean13 = [0u8; 13];
    match ds.len() {
        12 => {
            ean13[1..13].copy_from_slice(&ds);
            let sum: u32 = ean13[..12]
                .iter()
                .enumerate()
                .map(|(i, &v)| v as u32 * if i % 2 == 0 { 1 } else { 3 })
                .sum();
            ean13[12] = ((10 - sum % 10) % 10) as u8;
        }
        13 => ean13.copy_from_slice(&ds),
        _ => return None,
    }

    let mask = FIRST_DIGIT_MASKS[ean13[0] as usize];
    let mut modules: Vec<u8> = vec![9]; // quiet zone, white
    modules.extend([1, 1, 1]);
    for i in 0..6 {
        let d = ean13[1 + i] as usize;
        let (a, b, c, w) = if mask[i] { B_PATTERNS[d] } else { A_PATTERNS[d] };
        modules.extend([a, b, c, w]);
    }
    modules.extend([1, 1, 1, 1, 1]);
    for i in 0..6 {
        let (a, b, c, w) = C_PATTERNS[ean13[7 + i] as usize];
        modules.extend([a, b, c, w]);
    }
    modules.extend([1, 1, 1]);
    modules.push(9);

    Some(render_modules(&modules, unit))
}

/// Render an ideal EAN-8 row; `None` unless given exactly 8 ASCII digits
pub fn synthesize_ean8_row(digits: &str, unit: usize) -> Option<Vec<u8>> {
    if digits.len() != 8 || !digits.bytes().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let ds: Vec<u8> = digits.bytes().map(|c| c - b'0').collect();
    let mut modules: Vec<u8> = vec![9];
    modules.extend([1, 1, 1]);
    for &d in &ds[..4] {
        let (a, b, c, w) = A_PATTERNS[d as usize];
        modules.extend([a, b, c, w]);
    }
    modules.extend([1, 1, 1, 1, 1]);
    for &d in &ds[4..8] {
        let (a, b, c, w) = C_PATTERNS[d as usize];
        modules.extend([a, b, c, w]);
    }
    modules.extend([1, 1, 1]);
    modules.push(9);

    Some(render_modules(&modules, unit))
}

/// Modules to pixels; alternating white/black starting with white
fn render_modules(modules: &[u8], unit: usize) -> Vec<u8> {
    let mut pix = Vec::new();
    let mut black = false;
    for &m in modules {
        let val = if black { 0u8 } else { 255u8 };
        pix.extend(std::iter::repeat(val).take(m as usize * unit));
        black = !black;
    }
    pix
}
