//! Label maps and the category index.
//!
//! Label maps use the protobuf text format produced for object-detection models:
//!
//! ```text
//! item {
//!   id: 1
//!   name: '/m/01g317'
//!   display_name: 'person'
//! }
//! ```
//!
//! Display names win over names. Ids must be non-negative and id 0 is reserved
//! for the background class, which never enters the index. When an id appears
//! twice the first item wins.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{DetectError, Result};

const BACKGROUND: &str = "background";

/// A detection class record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

impl Category {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Immutable class id to category mapping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CategoryIndex {
    categories: BTreeMap<i64, Category>,
}

impl CategoryIndex {
    pub fn from_categories<I: IntoIterator<Item = Category>>(categories: I) -> Self {
        Self {
            categories: categories.into_iter().map(|c| (c.id, c)).collect(),
        }
    }

    /// Load and validate a label map file.
    pub fn from_labelmap<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DetectError::model_load(path, anyhow::Error::new(e)))?;
        let index = Self::parse_labelmap(&raw)
            .map_err(|e| DetectError::model_load(path, anyhow::Error::new(e)))?;
        log::info!(
            "loaded {} categories from label map {}",
            index.len(),
            path.display()
        );
        Ok(index)
    }

    /// Parse label map text.
    pub fn parse_labelmap(text: &str) -> Result<Self> {
        let tokens = tokenize(text)?;
        let items = parse_items(&tokens)?;
        let mut ids = Vec::with_capacity(items.len());
        for item in &items {
            let id = item.id.ok_or_else(|| DetectError::LabelMap {
                line: item.line,
                message: "item is missing an id".to_string(),
            })?;
            validate_item(id, item)?;
            ids.push(id);
        }

        let mut categories = BTreeMap::new();
        for (id, item) in ids.into_iter().zip(items) {
            if id == 0 {
                continue;
            }
            if categories.contains_key(&id) {
                log::warn!("label map id {} is defined more than once; keeping the first", id);
                continue;
            }
            let name = item.display_name.or(item.name).unwrap_or_default();
            categories.insert(id, Category { id, name });
        }
        Ok(Self { categories })
    }

    pub fn get(&self, id: i64) -> Option<&Category> {
        self.categories.get(&id)
    }

    /// Look up a class id, failing when the label map does not cover it.
    pub fn lookup(&self, id: i64) -> Result<&Category> {
        self.get(id).ok_or(DetectError::UnknownClassId(id))
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Categories in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }
}

fn validate_item(id: i64, item: &RawItem) -> Result<()> {
    if id < 0 {
        return Err(DetectError::LabelMap {
            line: item.line,
            message: format!("label map ids should be >= 0, found {}", id),
        });
    }
    let is_background = |field: &Option<String>| field.as_deref() == Some(BACKGROUND);
    if id == 0 && !is_background(&item.name) && !is_background(&item.display_name) {
        return Err(DetectError::LabelMap {
            line: item.line,
            message: "label map id 0 is reserved for the background label".to_string(),
        });
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Text-format tokenizer and item parser
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    Open,
    Close,
    Colon,
    Str(String),
    Word(String),
}

#[derive(Debug)]
struct Token {
    tok: Tok,
    line: usize,
}

fn token_re() -> &'static Regex {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    TOKEN_RE.get_or_init(|| {
        Regex::new(r#"\s+|#.*|\{|\}|:|'[^']*'|"[^"]*"|[A-Za-z0-9_./+-]+"#)
            .expect("token regex is valid")
    })
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let re = token_re();
    let mut tokens = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let mut pos = 0;
        while pos < line.len() {
            let m = re
                .find_at(line, pos)
                .filter(|m| m.start() == pos)
                .ok_or_else(|| DetectError::LabelMap {
                    line: line_no,
                    message: format!("unexpected input near '{}'", &line[pos..]),
                })?;
            pos = m.end();
            let s = m.as_str();
            let tok = match s {
                "{" => Tok::Open,
                "}" => Tok::Close,
                ":" => Tok::Colon,
                _ if s.starts_with('#') || s.trim().is_empty() => continue,
                _ if s.starts_with('\'') || s.starts_with('"') => {
                    Tok::Str(s[1..s.len() - 1].to_string())
                }
                _ => Tok::Word(s.to_string()),
            };
            tokens.push(Token { tok, line: line_no });
        }
    }
    Ok(tokens)
}

#[derive(Debug, Default)]
struct RawItem {
    id: Option<i64>,
    name: Option<String>,
    display_name: Option<String>,
    line: usize,
}

fn parse_items(tokens: &[Token]) -> Result<Vec<RawItem>> {
    let mut items = Vec::new();
    let mut pos = 0;
    while pos < tokens.len() {
        let head = &tokens[pos];
        match &head.tok {
            Tok::Word(w) if w == "item" => {}
            other => {
                return Err(DetectError::LabelMap {
                    line: head.line,
                    message: format!("expected 'item', found {:?}", other),
                })
            }
        }
        pos += 1;
        if matches!(tokens.get(pos).map(|t| &t.tok), Some(Tok::Colon)) {
            pos += 1;
        }
        expect(tokens, pos, &Tok::Open, head.line)?;
        pos += 1;
        let mut item = RawItem {
            line: head.line,
            ..RawItem::default()
        };
        pos = parse_item_body(tokens, pos, &mut item)?;
        items.push(item);
    }
    Ok(items)
}

/// Parse fields up to and including the item's closing brace.
fn parse_item_body(tokens: &[Token], mut pos: usize, item: &mut RawItem) -> Result<usize> {
    loop {
        let token = tokens.get(pos).ok_or_else(|| DetectError::LabelMap {
            line: item.line,
            message: "unterminated item".to_string(),
        })?;
        let field = match &token.tok {
            Tok::Close => return Ok(pos + 1),
            Tok::Word(w) => w.clone(),
            other => {
                return Err(DetectError::LabelMap {
                    line: token.line,
                    message: format!("expected field name, found {:?}", other),
                })
            }
        };
        pos += 1;
        let has_colon = matches!(tokens.get(pos).map(|t| &t.tok), Some(Tok::Colon));
        if has_colon {
            pos += 1;
        }
        let value = tokens.get(pos).ok_or_else(|| DetectError::LabelMap {
            line: token.line,
            message: format!("field '{}' has no value", field),
        })?;
        if value.tok == Tok::Open {
            // Nested message such as keypoints; not needed for the index.
            pos = skip_block(tokens, pos + 1, value.line)?;
            continue;
        }
        if !has_colon {
            return Err(DetectError::LabelMap {
                line: token.line,
                message: format!("expected ':' after '{}'", field),
            });
        }
        let text = match &value.tok {
            Tok::Str(s) | Tok::Word(s) => s.clone(),
            other => {
                return Err(DetectError::LabelMap {
                    line: value.line,
                    message: format!("unexpected {:?} as value of '{}'", other, field),
                })
            }
        };
        pos += 1;
        match field.as_str() {
            "id" => {
                let id = text.parse::<i64>().map_err(|_| DetectError::LabelMap {
                    line: value.line,
                    message: format!("id '{}' is not an integer", text),
                })?;
                item.id = Some(id);
            }
            "name" => item.name = Some(text),
            "display_name" => item.display_name = Some(text),
            _ => {}
        }
    }
}

fn skip_block(tokens: &[Token], mut pos: usize, line: usize) -> Result<usize> {
    let mut depth = 1usize;
    while depth > 0 {
        let token = tokens.get(pos).ok_or_else(|| DetectError::LabelMap {
            line,
            message: "unterminated block".to_string(),
        })?;
        match token.tok {
            Tok::Open => depth += 1,
            Tok::Close => depth -= 1,
            _ => {}
        }
        pos += 1;
    }
    Ok(pos)
}

fn expect(tokens: &[Token], pos: usize, want: &Tok, line: usize) -> Result<()> {
    match tokens.get(pos) {
        Some(t) if &t.tok == want => Ok(()),
        Some(t) => Err(DetectError::LabelMap {
            line: t.line,
            message: format!("expected {:?}, found {:?}", want, t.tok),
        }),
        None => Err(DetectError::LabelMap {
            line,
            message: format!("expected {:?}, found end of file", want),
        }),
    }
}
