use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::labels::{
    BLANK_TOKEN, END_TOKEN, NEW_LINE_TOKEN, PAD_TOKEN, PLACEHOLDER_TOKENS, START_TOKEN,
    tokenize_paragraph,
};

const SPECIAL_TOKENS: [&str; 4] = [BLANK_TOKEN, START_TOKEN, END_TOKEN, PAD_TOKEN];
const ASCII_PUNCTUATION: &str = " !\"#&'()*+,-./:;?";
const BENGALI_BLOCK: std::ops::RangeInclusive<u32> = 0x0980..=0x09FF;

/// Ordered symbol list; a symbol's position is its token id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParagraphVocab {
    symbols: IndexSet<String>,
    pad: u32,
    start: u32,
    end: u32,
}

impl ParagraphVocab {
    /// Mapping shipped with the crate: special tokens, ASCII digits, letters
    /// and punctuation, the Bengali block, placeholders, then the new-line token.
    pub fn builtin() -> Self {
        let mut symbols: Vec<String> = SPECIAL_TOKENS.iter().map(|t| t.to_string()).collect();
        symbols.extend(('0'..='9').map(String::from));
        symbols.extend(('A'..='Z').map(String::from));
        symbols.extend(('a'..='z').map(String::from));
        symbols.extend(ASCII_PUNCTUATION.chars().map(String::from));
        symbols.extend(BENGALI_BLOCK.filter_map(char::from_u32).map(String::from));
        symbols.extend(PLACEHOLDER_TOKENS.iter().map(|t| t.to_string()));
        symbols.push(NEW_LINE_TOKEN.to_string());

        // Positions follow SPECIAL_TOKENS.
        Self {
            symbols: symbols.into_iter().collect(),
            pad: 3,
            start: 1,
            end: 2,
        }
    }

    pub fn from_symbols<I, S>(symbols: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = IndexSet::new();
        for symbol in symbols {
            let symbol = symbol.into();
            if set.contains(&symbol) {
                return Err(anyhow!("duplicate symbol {symbol:?} in mapping"));
            }
            set.insert(symbol);
        }

        if set.is_empty() {
            return Err(anyhow!("mapping cannot be empty"));
        }

        let lookup = |token: &str| {
            set.get_index_of(token)
                .map(|idx| idx as u32)
                .ok_or_else(|| anyhow!("mapping is missing the {token} token"))
        };
        let pad = lookup(PAD_TOKEN)?;
        let start = lookup(START_TOKEN)?;
        let end = lookup(END_TOKEN)?;

        Ok(Self {
            symbols: set,
            pad,
            start,
            end,
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let record = VocabRecord {
            mapping: self.symbols.iter().cloned().collect(),
        };
        let json =
            serde_json::to_string_pretty(&record).context("failed to serialize mapping")?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read mapping {}", path.display()))?;
        Self::from_json_str(&data)
            .with_context(|| format!("failed to parse mapping {}", path.display()))
    }

    pub fn from_json_str(data: &str) -> Result<Self> {
        let record: VocabRecord =
            serde_json::from_str(data).context("failed to parse mapping json")?;
        Self::from_symbols(record.mapping)
    }

    /// Variable-length encoding of one paragraph; unknown symbols map to pad.
    pub fn encode(&self, text: &str, add_start: bool, add_end: bool) -> Vec<u32> {
        let tokens = tokenize_paragraph(text);
        let last = tokens.len() - 1;
        tokens
            .iter()
            .enumerate()
            .filter(|(idx, _)| (add_start || *idx != 0) && (add_end || *idx != last))
            .map(|(_, token)| self.index_of(token).unwrap_or(self.pad))
            .collect()
    }

    /// Render ids as text, skipping blank/start/pad and stopping at end.
    pub fn decode(&self, ids: &[u32]) -> String {
        let mut text = String::new();
        for &id in ids {
            if id == self.end {
                break;
            }
            if id == self.pad || id == self.start {
                continue;
            }
            match self.symbol(id) {
                Some(BLANK_TOKEN) | None => continue,
                Some(symbol) => text.push_str(symbol),
            }
        }
        text
    }

    pub fn index_of(&self, symbol: &str) -> Option<u32> {
        self.symbols.get_index_of(symbol).map(|idx| idx as u32)
    }

    pub fn symbol(&self, id: u32) -> Option<&str> {
        self.symbols.get_index(id as usize).map(String::as_str)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    pub fn mapping(&self) -> Vec<String> {
        self.symbols.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn pad(&self) -> u32 {
        self.pad
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }
}

impl Default for ParagraphVocab {
    fn default() -> Self {
        Self::builtin()
    }
}

#[derive(Serialize, Deserialize)]
struct VocabRecord {
    mapping: Vec<String>,
}
