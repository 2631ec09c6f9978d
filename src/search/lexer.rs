//! Splits a query string into clauses.

/// One whitespace-separated piece of a query: `field:value`, `field:"a b"`, or a bare term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    /// text before the first unquoted `:`, as typed
    pub field: Option<String>,
    /// value with quotes removed
    pub value: String,
}

impl Clause {
    /// The clause as plain text, used when its field name means nothing.
    pub fn literal(&self) -> String {
        match &self.field {
            Some(field) => format!("{field}:{}", self.value),
            None => self.value.clone(),
        }
    }
}

/// Something the tokenizer had to guess about. Never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIssue {
    /// quote opened at this byte offset was never closed; the rest of the query is read literally
    UnbalancedQuote { position: usize },
}

pub fn tokenize(query: &str) -> (Vec<Clause>, Vec<QueryIssue>) {
    let mut clauses = Vec::new();
    let mut issues = Vec::new();
    let mut chars = query.char_indices().peekable();

    loop {
        while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut field = None;
        let mut current = String::new();
        let mut quoted = false;

        while let Some(&(position, c)) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            chars.next();

            if c == '"' {
                quoted = true;
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '"' {
                        closed = true;
                        break;
                    }
                    current.push(c);
                }
                if !closed {
                    issues.push(QueryIssue::UnbalancedQuote { position });
                }
            } else if c == ':' && field.is_none() && !quoted && !current.is_empty() {
                field = Some(std::mem::take(&mut current));
            } else {
                current.push(c);
            }
        }

        clauses.push(Clause {
            field,
            value: current,
        });
    }

    (clauses, issues)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clause(field: Option<&str>, value: &str) -> Clause {
        Clause {
            field: field.map(str::to_string),
            value: value.to_string(),
        }
    }

    #[test]
    fn splits_on_whitespace() {
        let (clauses, issues) = tokenize("  love   artist:queen ");
        assert_eq!(
            clauses,
            vec![clause(None, "love"), clause(Some("artist"), "queen")]
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn quoted_values_keep_spaces() {
        let (clauses, _) = tokenize(r#"artist:"John Doe" "free text" x"#);
        assert_eq!(
            clauses,
            vec![
                clause(Some("artist"), "John Doe"),
                clause(None, "free text"),
                clause(None, "x"),
            ]
        );
    }

    #[test]
    fn unterminated_quote_reads_to_end() {
        let (clauses, issues) = tokenize(r#"year:1999 album:"Best of  the rest"#);
        assert_eq!(
            clauses,
            vec![
                clause(Some("year"), "1999"),
                clause(Some("album"), "Best of  the rest"),
            ]
        );
        assert_eq!(issues, vec![QueryIssue::UnbalancedQuote { position: 16 }]);
    }

    #[test]
    fn only_first_colon_separates_field() {
        let (clauses, _) = tokenize("path:C:/music :odd");
        assert_eq!(
            clauses,
            vec![clause(Some("path"), "C:/music"), clause(None, ":odd")]
        );
    }

    #[test]
    fn literal_restores_clause_text() {
        assert_eq!(clause(Some("mood"), "calm").literal(), "mood:calm");
        assert_eq!(clause(None, "calm").literal(), "calm");
    }
}
