//! Per-column value caches for table masking
//!
//! A [`ColumnMaskCache`] lives for one `mask_table` call and belongs to one
//! column. Within it a raw value is masked once and every later occurrence
//! reuses the result; entity tokens are assigned per column, so the same raw
//! value in two columns does not map to a shared token.

use crate::detector::EntityCategory;
use base64::Engine;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Length of the keyed token suffix
const KEYED_TOKEN_CHARS: usize = 10;

/// How detected entities inside table cells are tokenized
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum PseudonymStyle {
    /// Plain category placeholder (`<PERSON>`)
    Placeholder,

    /// Numbered per column and category by first appearance (`<PERSON_1>`)
    #[default]
    Indexed,

    /// HMAC token under a per-column key derived from `secret` (`<PERSON_Zk3…>`)
    Keyed { secret: String },
}

impl fmt::Debug for PseudonymStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PseudonymStyle::Placeholder => f.write_str("Placeholder"),
            PseudonymStyle::Indexed => f.write_str("Indexed"),
            PseudonymStyle::Keyed { .. } => f.write_str("Keyed { secret: [REDACTED] }"),
        }
    }
}

enum TokenScheme {
    Placeholder,
    Indexed {
        assigned: HashMap<(EntityCategory, String), usize>,
        next: HashMap<EntityCategory, usize>,
    },
    Keyed {
        key: [u8; 32],
    },
}

/// Raw value to masked value mapping for a single column
pub struct ColumnMaskCache {
    column: String,
    values: HashMap<String, String>,
    scheme: TokenScheme,
}

impl fmt::Debug for ColumnMaskCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Raw values stay out of debug output
        f.debug_struct("ColumnMaskCache")
            .field("column", &self.column)
            .field("entries", &self.values.len())
            .finish()
    }
}

impl ColumnMaskCache {
    /// Fresh, empty cache for `column`
    pub fn new(column: impl Into<String>, style: &PseudonymStyle) -> Self {
        let column = column.into();
        let scheme = match style {
            PseudonymStyle::Placeholder => TokenScheme::Placeholder,
            PseudonymStyle::Indexed => TokenScheme::Indexed {
                assigned: HashMap::new(),
                next: HashMap::new(),
            },
            PseudonymStyle::Keyed { secret } => TokenScheme::Keyed {
                key: derive_column_key(secret, &column),
            },
        };

        Self {
            column,
            values: HashMap::new(),
            scheme,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Previously masked value for `raw`
    pub fn get(&self, raw: &str) -> Option<&str> {
        self.values.get(raw).map(String::as_str)
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.values.contains_key(raw)
    }

    pub fn insert(&mut self, raw: impl Into<String>, masked: impl Into<String>) {
        self.values.insert(raw.into(), masked.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Token for one entity found inside a cell of this column
    pub fn token_for(&mut self, category: EntityCategory, entity: &str) -> String {
        match &mut self.scheme {
            TokenScheme::Placeholder => category.placeholder().to_string(),
            TokenScheme::Indexed { assigned, next } => {
                let index = *assigned
                    .entry((category, entity.to_string()))
                    .or_insert_with(|| {
                        let counter = next.entry(category).or_insert(0);
                        *counter += 1;
                        *counter
                    });
                format!("<{}_{}>", category.label(), index)
            }
            TokenScheme::Keyed { key } => {
                let mut mac =
                    HmacSha256::new_from_slice(key.as_slice()).expect("HMAC can take key of any size");
                mac.update(entity.as_bytes());
                let digest = mac.finalize().into_bytes();

                let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest);
                let short = &encoded[..KEYED_TOKEN_CHARS.min(encoded.len())];
                format!("<{}_{}>", category.label(), short)
            }
        }
    }
}

/// Per-column HMAC key so identical values in different columns never share a token
fn derive_column_key(secret: &str, column: &str) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(None, secret.as_bytes());
    let mut key = [0u8; 32];
    let info = format!("trailguard-column:{}", column);
    hk.expand(info.as_bytes(), &mut key)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    key
}
