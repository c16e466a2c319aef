use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Unit the diff engine compares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum Granularity {
    /// Words and whitespace runs as separate tokens
    #[default]
    Word,
    /// Single characters
    Char,
    /// Lines, each keeping its trailing newline
    Line,
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "word" => Ok(Self::Word),
            "char" => Ok(Self::Char),
            "line" => Ok(Self::Line),
            _ => Err(format!("Invalid value: {}", s)),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Word => "word",
                Self::Char => "char",
                Self::Line => "line",
            }
        )
    }
}

/// Splits `text` into tokens whose concatenation is exactly `text`.
pub fn tokenize(text: &str, granularity: Granularity) -> Vec<&str> {
    match granularity {
        Granularity::Word => split_words(text),
        Granularity::Char => text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect(),
        Granularity::Line => text.split_inclusive('\n').collect(),
    }
}

fn split_words(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_space = None;
    for (i, c) in text.char_indices() {
        let space = c.is_whitespace();
        match in_space {
            Some(prev) if prev != space => {
                tokens.push(&text[start..i]);
                start = i;
            }
            _ => {}
        }
        in_space = Some(space);
    }
    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}
