// src/matching/author_key.rs
use crate::models::record::Author;

/// Compact author signature: lowercase first letter of given name and surname
/// for every author, in order. The "others" sentinel and authors missing either
/// name part contribute nothing.
pub fn author_key(authors: &[Author]) -> String {
    let mut key = String::with_capacity(authors.len() * 2);
    for author in authors {
        if author.is_others() {
            continue;
        }
        let given = author.given.trim().chars().next();
        let surname = author.surname.trim().chars().next();
        if let (Some(g), Some(s)) = (given, surname) {
            key.extend(g.to_lowercase());
            key.extend(s.to_lowercase());
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_case_insensitive() {
        let lower = author_key(&[Author::new("John", "Smith")]);
        let upper = author_key(&[Author::new("JOHN", "SMITH")]);
        assert_eq!(lower, "js");
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_key_skips_sentinel_and_malformed_authors() {
        let authors = vec![
            Author::new("Ada", "Lovelace"),
            Author::new("", "Anonymous"),
            Author::new("Charles", "Babbage"),
            Author::others(),
        ];
        assert_eq!(author_key(&authors), "alcb");
        assert_eq!(author_key(&[]), "");
    }

    #[test]
    fn test_abbreviated_given_name_keeps_initial() {
        assert_eq!(author_key(&[Author::new("J.", "Smith")]), "js");
    }
}
