pub mod handlers;

use chrono::Datelike;
use chrono::NaiveDate;

use crate::models::quote::Quote;

/// The quote shown on `day`: one per calendar day, cycling through the collection.
pub fn quote_of_the_day(quotes: &[Quote], day: NaiveDate) -> Option<&Quote> {
    if quotes.is_empty() {
        return None;
    }
    let index = day.ordinal0() as usize % quotes.len();
    quotes.get(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn quote(text: &str) -> Quote {
        Quote {
            id: Uuid::new_v4(),
            text: text.into(),
            author: None,
        }
    }

    #[test]
    fn test_quote_rotates_by_day_of_year() {
        let quotes = vec![quote("a"), quote("b"), quote("c")];
        let jan1 = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let jan2 = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let jan4 = NaiveDate::from_ymd_opt(2026, 1, 4).unwrap();

        assert_eq!(quote_of_the_day(&quotes, jan1).unwrap().text, "a");
        assert_eq!(quote_of_the_day(&quotes, jan2).unwrap().text, "b");
        assert_eq!(quote_of_the_day(&quotes, jan4).unwrap().text, "a");
        assert_eq!(quote_of_the_day(&quotes, jan1), quote_of_the_day(&quotes, jan1));
        assert!(quote_of_the_day(&[], jan1).is_none());
    }
}
