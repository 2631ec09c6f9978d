//! User-facing count and scope phrases. `%1` is the placeholder substituted in every template.

const PLACEHOLDER: &str = "%1";

pub const SCOPE_TEMPLATE: &str = "Search result in %1";

/// Zero, one and many forms of a counted phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountPhrases {
    pub none: String,
    pub one: String,
    pub many: String,
}

impl CountPhrases {
    pub fn new(none: &str, one: &str, many: &str) -> Self {
        Self {
            none: none.to_string(),
            one: one.to_string(),
            many: many.to_string(),
        }
    }

    pub fn results() -> Self {
        Self::new("No result.", "1 result.", "%1 results.")
    }

    pub fn songs() -> Self {
        Self::new("No song.", "1 song.", "%1 songs.")
    }

    pub fn describe(&self, count: usize) -> String {
        let template = match count {
            0 => &self.none,
            1 => &self.one,
            _ => &self.many,
        };
        template.replace(PLACEHOLDER, &count.to_string())
    }
}

/// Title shown for a search confined to one category bucket.
pub fn describe_scope(template: &str, key: &str) -> String {
    template.replace(PLACEHOLDER, key)
}
