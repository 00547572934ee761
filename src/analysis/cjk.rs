//! CJK-aware tokenizer (spec §4.4 text/cjk processor).
//!
//! Non-CJK runs are split into whole words exactly like
//! [`crate::analysis::StandardTokenizer`] (`"Some english text"` yields the
//! three word tokens `some@1, english@2, text@3`, per spec example 4). Runs
//! of CJK-range characters (CJK Unified Ideographs, Hiragana, Katakana,
//! Hangul) are instead split one character at a time, since word-boundary
//! segmentation doesn't apply to scripts without inter-word spacing. Tokens
//! landing on the same position are de-duplicated by dropping the prior one.

use crate::analysis::token::Token;
use unicode_segmentation::UnicodeSegmentation;

fn is_cjk_char(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF      // CJK Unified Ideographs
        | 0x3400..=0x4DBF    // CJK Unified Ideographs Extension A
        | 0x3040..=0x309F    // Hiragana
        | 0x30A0..=0x30FF    // Katakana
        | 0xAC00..=0xD7A3    // Hangul Syllables
        | 0xF900..=0xFAFF    // CJK Compatibility Ideographs
    )
}

fn push_token(tokens: &mut Vec<Token>, position: &mut u32, offset: usize, text: String) {
    if text.is_empty() || text.len() >= 32 {
        return;
    }
    if let Some(last) = tokens.last() {
        if last.position == *position {
            tokens.pop();
        }
    }
    tokens.push(Token::new(text, *position, offset));
    *position += 1;
}

pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut position = 0u32;

    for word in text.split_word_bounds() {
        if word.trim().is_empty() {
            continue;
        }
        let offset = word.as_ptr() as usize - text.as_ptr() as usize;
        if word.chars().any(is_cjk_char) {
            let mut char_offset = offset;
            for ch in word.chars() {
                let lowered: String = ch.to_lowercase().collect();
                push_token(&mut tokens, &mut position, char_offset, lowered);
                char_offset += ch.len_utf8();
            }
        } else if word.chars().any(|c| c.is_alphanumeric()) {
            push_token(&mut tokens, &mut position, offset, word.to_lowercase());
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin_runs_are_whole_word_tokens() {
        let tokens = tokenize("Some english text");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["some", "english", "text"]);
        let positions: Vec<u32> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn lowercases_tokens() {
        let tokens = tokenize("ABC");
        assert_eq!(tokens[0].text, "abc");
    }

    #[test]
    fn cjk_runs_are_split_per_character() {
        let tokens = tokenize("\u{4F60}\u{597D}");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["\u{4F60}", "\u{597D}"]);
    }

    #[test]
    fn mixed_cjk_and_latin_runs() {
        let tokens = tokenize("hi \u{4F60}\u{597D} world");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["hi", "\u{4F60}", "\u{597D}", "world"]);
    }

    #[test]
    fn tokens_over_32_bytes_are_dropped() {
        let long = "x".repeat(40);
        let tokens = tokenize(&long);
        assert!(tokens.is_empty());
    }
}
