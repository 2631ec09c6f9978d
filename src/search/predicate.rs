use crate::{
    domain::{
        field::{Field, FieldValue},
        song::SongRecord,
    },
    text::fold,
};

use super::lexer::Clause;

/// Fields a bare term is looked up in, besides the file name.
pub const FREE_TEXT_FIELDS: &[Field] = &[
    Field::Name,
    Field::Artist,
    Field::Album,
    Field::AlbumArtist,
    Field::Genre,
    Field::Composer,
    Field::Comments,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn holds(self, left: i64, right: i64) -> bool {
        match self {
            Comparison::Eq => left == right,
            Comparison::Lt => left < right,
            Comparison::Le => left <= right,
            Comparison::Gt => left > right,
            Comparison::Ge => left >= right,
        }
    }

    /// Splits a leading operator off `value`; no operator means equality.
    fn split(value: &str) -> (Comparison, &str) {
        for (prefix, op) in [
            (">=", Comparison::Ge),
            ("<=", Comparison::Le),
            (">", Comparison::Gt),
            ("<", Comparison::Lt),
            ("=", Comparison::Eq),
        ] {
            if let Some(rest) = value.strip_prefix(prefix) {
                return (op, rest);
            }
        }
        (Comparison::Eq, value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// folded needle, matched against the folded rendering of the value
    Contains(String),
    Compare(Comparison, i64),
}

impl Matcher {
    /// Numeric fields compare when the value parses as a number, otherwise
    /// every field falls back to substring matching.
    pub fn for_field(field: Field, value: &str) -> Matcher {
        if field.is_numeric() {
            let (op, operand) = Comparison::split(value.trim());
            if let Ok(n) = operand.trim().parse::<i64>() {
                return Matcher::Compare(op, n);
            }
        }
        Matcher::Contains(fold(value))
    }

    pub fn matches(&self, value: &FieldValue) -> bool {
        match self {
            Matcher::Contains(needle) => fold(&value.render()).contains(needle.as_str()),
            Matcher::Compare(op, operand) => match value {
                FieldValue::Number(Some(n)) => op.holds(*n, *operand),
                _ => false,
            },
        }
    }
}

/// Compiled form of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Field { field: Field, matcher: Matcher },
    /// folded term
    FreeText(String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Clauses are implicitly AND-ed; a single clause is returned as is.
    pub fn from_clauses(clauses: &[Clause]) -> Predicate {
        let mut children: Vec<Predicate> = clauses.iter().map(Predicate::from_clause).collect();
        if children.len() == 1 {
            children.remove(0)
        } else {
            Predicate::And(children)
        }
    }

    fn from_clause(clause: &Clause) -> Predicate {
        match clause.field.as_deref().map(Field::from_query_name) {
            Some(Some(field)) => Predicate::Field {
                field,
                matcher: Matcher::for_field(field, &clause.value),
            },
            Some(None) => Predicate::FreeText(fold(&clause.literal())),
            None => Predicate::FreeText(fold(&clause.value)),
        }
    }

    pub fn matches(&self, song: &SongRecord) -> bool {
        match self {
            Predicate::Field { field, matcher } => matcher.matches(&field.value_of(song)),
            Predicate::FreeText(term) => {
                FREE_TEXT_FIELDS
                    .iter()
                    .any(|field| fold(&field.value_of(song).render()).contains(term.as_str()))
                    || song
                        .path
                        .file_name()
                        .is_some_and(|name| fold(&name.to_string_lossy()).contains(term.as_str()))
            }
            Predicate::And(children) => children.iter().all(|child| child.matches(song)),
            Predicate::Or(children) => children.iter().any(|child| child.matches(song)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::domain::song::{SongId, SongMetadata, SongRecord, SongStats};

    fn song(name: &str, artist: &str, year: Option<u32>) -> SongRecord {
        SongRecord {
            id: SongId::from_raw(1),
            path: PathBuf::from(format!("/music/{name}.mp3")),
            metadata: SongMetadata {
                name: name.to_string(),
                artist: artist.to_string(),
                year,
                ..Default::default()
            },
            stats: SongStats::default(),
        }
    }

    #[test]
    fn numeric_operators() {
        let s = song("a", "b", Some(1999));
        let check = |value: &str| {
            Predicate::Field {
                field: Field::Year,
                matcher: Matcher::for_field(Field::Year, value),
            }
            .matches(&s)
        };
        assert!(check("1999"));
        assert!(check("=1999"));
        assert!(check(">1990"));
        assert!(check(">=1999"));
        assert!(!check("<1999"));
        assert!(check("<=1999"));
        assert!(!check(">2000"));
    }

    #[test]
    fn unparsable_numeric_value_falls_back_to_substring() {
        assert_eq!(
            Matcher::for_field(Field::Year, "19x"),
            Matcher::Contains("19x".to_string())
        );
        let m = Matcher::for_field(Field::Year, "99");
        assert!(m.matches(&FieldValue::Number(Some(99))));
        assert!(!m.matches(&FieldValue::Number(Some(1999))));
        assert!(Matcher::Contains("99".into()).matches(&FieldValue::Number(Some(1999))));
    }

    #[test]
    fn missing_numbers_never_compare() {
        let s = song("a", "b", None);
        let p = Predicate::Field {
            field: Field::Year,
            matcher: Matcher::Compare(Comparison::Lt, 3000),
        };
        assert!(!p.matches(&s));
    }

    #[test]
    fn free_text_checks_file_name() {
        let mut s = song("", "", None);
        s.path = PathBuf::from("/music/Bohemian Rhapsody.flac");
        assert!(Predicate::FreeText("rhapsody".into()).matches(&s));
        assert!(!Predicate::FreeText("music".into()).matches(&s));
    }

    #[test]
    fn empty_conjunction_matches_everything() {
        assert!(Predicate::And(vec![]).matches(&song("a", "b", None)));
        assert!(!Predicate::Or(vec![]).matches(&song("a", "b", None)));
    }
}
