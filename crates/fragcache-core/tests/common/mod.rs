#![allow(dead_code)]

/// Builds `count` distinct keys that use the whole allowed charset.
pub fn sample_keys(count: usize) -> Vec<String> {
    const SEPARATORS: [&str; 9] = ["~", "_", "!", "&", "=", "|", ".", "-", "+"];

    (0..count)
        .map(|i| format!("item {}{}Z{}", i, SEPARATORS[i % SEPARATORS.len()], i * 7))
        .collect()
}
