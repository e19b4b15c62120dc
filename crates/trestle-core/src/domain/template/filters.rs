//! Named helper transforms applied with `{{ value | helper }}`.
//!
//! The set is fixed and every helper is a pure `&str -> String` function.
//!
//! | Helper                 | `"myHTTP server"` →   |
//! |------------------------|-----------------------|
//! | `lower`                | `myhttp server`       |
//! | `upper`                | `MYHTTP SERVER`       |
//! | `trim`                 | (surrounding ws only) |
//! | `snake_case`           | `my_http_server`      |
//! | `kebab_case`           | `my-http-server`      |
//! | `pascal_case`          | `MyHttpServer`        |
//! | `camel_case`           | `myHttpServer`        |
//! | `screaming_snake_case` | `MY_HTTP_SERVER`      |
//! | `title_case`           | `My Http Server`      |

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Helper {
    Lower,
    Upper,
    Trim,
    SnakeCase,
    KebabCase,
    PascalCase,
    CamelCase,
    ScreamingSnakeCase,
    TitleCase,
}

impl Helper {
    pub const ALL: [Helper; 9] = [
        Self::Lower,
        Self::Upper,
        Self::Trim,
        Self::SnakeCase,
        Self::KebabCase,
        Self::PascalCase,
        Self::CamelCase,
        Self::ScreamingSnakeCase,
        Self::TitleCase,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|h| h.name() == name)
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Lower => "lower",
            Self::Upper => "upper",
            Self::Trim => "trim",
            Self::SnakeCase => "snake_case",
            Self::KebabCase => "kebab_case",
            Self::PascalCase => "pascal_case",
            Self::CamelCase => "camel_case",
            Self::ScreamingSnakeCase => "screaming_snake_case",
            Self::TitleCase => "title_case",
        }
    }

    pub fn apply(&self, input: &str) -> String {
        match self {
            Self::Lower => input.to_lowercase(),
            Self::Upper => input.to_uppercase(),
            Self::Trim => input.trim().to_string(),
            Self::SnakeCase => split_words(input).join("_"),
            Self::KebabCase => split_words(input).join("-"),
            Self::PascalCase => split_words(input).iter().map(|w| capitalize(w)).collect(),
            Self::CamelCase => {
                let words = split_words(input);
                let mut out = String::new();
                for (i, word) in words.iter().enumerate() {
                    if i == 0 {
                        out.push_str(word);
                    } else {
                        out.push_str(&capitalize(word));
                    }
                }
                out
            }
            Self::ScreamingSnakeCase => split_words(input).join("_").to_uppercase(),
            Self::TitleCase => split_words(input)
                .iter()
                .map(|w| capitalize(w))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl fmt::Display for Helper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            let mut out = String::new();
            // to_uppercase handles Unicode correctly (e.g., "ß" -> "SS")
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
            out
        }
        None => String::new(),
    }
}

/// Split a string into lowercase words based on casing and separators.
///
/// ## Word Boundary Detection
///
/// 1. **Explicit separators:** `_`, `-`, `.`, whitespace → always split
/// 2. **Case transition (camelCase):** `aB` → split between `a` and `B`
/// 3. **Acronym boundary:** `HTTPRequest` → split between `P` and `R`
///    (detected by `Upper Upper Lower` pattern)
/// 4. **Digit to letter:** `v2Api` → `v2` + `api`
pub(crate) fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '_' || c == '-' || c == '.' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(current.to_lowercase());
                current.clear();
            }
            continue;
        }

        if let Some(&next) = chars.peek() {
            if (c.is_lowercase() || c.is_ascii_digit()) && next.is_uppercase() {
                current.push(c);
                words.push(current.to_lowercase());
                current.clear();
                continue;
            }

            // "HTTPServer" → "HTTP" + "Server"
            if c.is_uppercase()
                && next.is_uppercase()
                && chars.clone().nth(1).is_some_and(|n| n.is_lowercase())
            {
                current.push(c);
                words.push(current.to_lowercase());
                current.clear();
                continue;
            }
        }

        current.push(c);
    }

    if !current.is_empty() {
        words.push(current.to_lowercase());
    }

    words
}
