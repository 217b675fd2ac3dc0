//! Archive search: a case-insensitive substring filter over the four
//! identifying fields of a letter.

use crate::letter::{LetterField, LetterRecord};

/// Fields a query is matched against. Body and date are not searched.
pub const SEARCHABLE_FIELDS: [LetterField; 4] = [
    LetterField::Subject,
    LetterField::LetterNumber,
    LetterField::SenderService,
    LetterField::ReceiverService,
];

/// Filter `letters` down to those matching `query`.
///
/// An empty query returns every letter. Otherwise a letter matches when the
/// lower-cased query is a substring of the lower-cased value of any
/// [`SEARCHABLE_FIELDS`] entry. Input order is preserved.
pub fn search<'a>(query: &str, letters: &'a [LetterRecord]) -> Vec<&'a LetterRecord> {
    if query.is_empty() {
        return letters.iter().collect();
    }
    let needle = query.to_lowercase();
    letters
        .iter()
        .filter(|letter| matches(letter, &needle))
        .collect()
}

fn matches(letter: &LetterRecord, needle: &str) -> bool {
    SEARCHABLE_FIELDS
        .iter()
        .any(|field| letter.field(*field).to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::letter::Importance;

    fn letter(id: &str, subject: &str, number: &str, sender: &str, receiver: &str) -> LetterRecord {
        LetterRecord {
            id: id.into(),
            created_at: chrono::Utc::now(),
            sender_service: sender.into(),
            receiver_service: receiver.into(),
            date: "01/02/2024".into(),
            letter_number: number.into(),
            subject: subject.into(),
            body: "budget".into(),
            importance: Importance::Normal,
            image_data: String::new(),
        }
    }

    fn archive() -> Vec<LetterRecord> {
        vec![
            letter("3", "Convocation", "N°12", "Ministère de la Santé", "Hôpital"),
            letter("2", "Budget 2024", "DF/7", "Finances", "Direction"),
            letter("1", "Rapport annuel", "R-99", "Mairie", "Préfecture"),
        ]
    }

    fn ids(found: &[&LetterRecord]) -> Vec<String> {
        found.iter().map(|l| l.id.clone()).collect()
    }

    #[test]
    fn empty_query_is_identity() {
        let letters = archive();
        let found = search("", &letters);
        assert_eq!(found.len(), letters.len());
        assert!(found.iter().zip(&letters).all(|(a, b)| *a == b));
    }

    #[test]
    fn matches_accented_text_case_insensitively() {
        let letters = archive();
        assert_eq!(ids(&search("MINISTÈRE", &letters)), vec!["3"]);
        assert_eq!(ids(&search("minist", &letters)), vec!["3"]);
    }

    #[test]
    fn matches_any_of_the_four_fields() {
        let letters = archive();
        assert_eq!(ids(&search("budget 2024", &letters)), vec!["2"]);
        assert_eq!(ids(&search("r-99", &letters)), vec!["1"]);
        assert_eq!(ids(&search("direction", &letters)), vec!["2"]);
        assert_eq!(ids(&search("préfecture", &letters)), vec!["1"]);
    }

    #[test]
    fn body_and_date_are_not_searched() {
        let letters = archive();
        // Every body says "budget" but only one subject does.
        assert_eq!(ids(&search("budget", &letters)), vec!["2"]);
        assert!(search("01/02", &letters).is_empty());
    }

    #[test]
    fn results_keep_input_order() {
        let letters = archive();
        // "e" appears in every record.
        assert_eq!(ids(&search("e", &letters)), vec!["3", "2", "1"]);
    }

    #[test]
    fn partition_is_exact() {
        let letters = archive();
        let query = "ion";
        let found = search(query, &letters);
        for l in &letters {
            let hit = SEARCHABLE_FIELDS
                .iter()
                .any(|f| l.field(*f).to_lowercase().contains(query));
            assert_eq!(found.iter().any(|f| f.id == l.id), hit, "record {}", l.id);
        }
    }
}
