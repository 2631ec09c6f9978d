//! Text folding shared by collation and search.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Case- and diacritic-insensitive form of `text`: "Beyoncé" and "BEYONCE" fold alike.
pub fn fold(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}
