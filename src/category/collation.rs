use crate::{domain::field::Field, text::fold};

/// Sort key of a bucket key.
///
/// Numbers order before text, so for numeric fields like year the
/// numeric-looking keys come first and in numeric order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey {
    Number(i64),
    /// folded form first, raw key to keep distinct spellings apart
    Text(String, String),
}

impl SortKey {
    pub fn new(field: Field, key: &str) -> Self {
        if field.is_numeric() {
            if let Ok(n) = key.trim().parse::<i64>() {
                return SortKey::Number(n);
            }
        }
        SortKey::Text(fold(key), key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::SortKey;
    use crate::domain::field::Field;

    fn sorted(field: Field, keys: &[&str]) -> Vec<String> {
        let mut keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        keys.sort_by_cached_key(|k| SortKey::new(field, k));
        keys
    }

    #[test]
    fn text_keys_ignore_case_and_accents() {
        assert_eq!(
            sorted(Field::Artist, &["beta", "Émile", "Alpha", "echo"]),
            vec!["Alpha", "beta", "echo", "Émile"]
        );
    }

    #[test]
    fn numeric_fields_sort_numerically() {
        assert_eq!(
            sorted(Field::Year, &["2001", "", "999", "1980"]),
            vec!["999", "1980", "2001", ""]
        );
    }

    #[test]
    fn numbers_in_text_fields_sort_as_text() {
        assert_eq!(sorted(Field::Album, &["10", "9"]), vec!["10", "9"]);
    }
}
