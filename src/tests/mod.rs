use super::*;

// Shared fixtures and helpers

const FULL_QUIZ: &str = r#"{"title":"Exodus","examiner":"Moses","level":"beginner","questions":[{"id":"q1","type":"multiple_choice","question":"Who led the Exodus?","hint":"He parted the sea","options":[{"id":"o1","text":"Moses","is_correct":true},{"id":"o2","text":"Aaron","is_correct":false,"explanation":"His brother"}]},{"id":"q2","type":"fill_in_blank","question":"The sea that parted was the ___ Sea.","correct_answer":"Red"}],"result_analysis":{"strengths":[{"category":"history","description":"Knows the story"}],"improvements":[]},"is_streaming_partial":false}"#;

const EXODUS_TRUNCATED: &str = r#"{"title":"Quiz","questions":[{"question":"Who led the Exodus?","options":[{"text":"Moses","is_correct":true},{"text":"Aaron","is_correct":false}]"#;

fn lcg_sizes(seed: u64, len: usize) -> Vec<usize> {
    let mut x = seed;
    let mut out = Vec::new();
    let mut total = 0usize;
    while total < len {
        // LCG: constants from Numerical Recipes
        x = x.wrapping_mul(1664525).wrapping_add(1013904223);
        // chunk size in [1..16]
        let mut n = (((x >> 24) as usize) % 16) + 1;
        if total + n > len {
            n = len - total;
        }
        out.push(n);
        total += n;
    }
    out
}

/// Split raw bytes at the given sizes, ignoring char boundaries.
fn chunk_bytes<'a>(s: &'a [u8], sizes: &[usize]) -> Vec<&'a [u8]> {
    let mut res = Vec::new();
    let mut at = 0usize;
    for &n in sizes {
        if at >= s.len() {
            break;
        }
        let end = (at + n).min(s.len());
        res.push(&s[at..end]);
        at = end;
    }
    if at < s.len() {
        res.push(&s[at..]);
    }
    res
}

fn byte_by_byte(s: &str) -> Vec<&[u8]> {
    s.as_bytes().chunks(1).collect()
}

mod extract;
mod identity;
