//! Weighted free-text term generation.
//!
//! Text is split into lowercase alphanumeric words. Every occurrence adds
//! the field weight to the word's within-document frequency, so a word in
//! the application name counts ten times as much as the same word in the
//! long description. The raw text is also kept per field for the engine's
//! own full-text table.

use crate::models::{IndexDocument, TextField};

/// Words shorter than this are not recorded as spelling candidates.
const MIN_SPELLING_LEN: usize = 3;

/// Split text into normalized words.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

pub struct TermGenerator<'a> {
    doc: &'a mut IndexDocument,
}

impl<'a> TermGenerator<'a> {
    pub fn new(doc: &'a mut IndexDocument) -> Self {
        Self { doc }
    }

    /// Index `text` under `field`, without positional information.
    pub fn index_text(&mut self, field: TextField, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let weight = field.weight();
        for word in tokenize(text) {
            *self.doc.postings.entry(word).or_insert(0) += weight;
        }
        let slot = self.doc.text.entry(field).or_default();
        if !slot.is_empty() {
            slot.push('\n');
        }
        slot.push_str(text);
    }
}

/// Words of a document worth offering as spelling corrections.
pub fn spelling_words(doc: &IndexDocument) -> impl Iterator<Item = &str> {
    doc.postings
        .keys()
        .map(String::as_str)
        .filter(|w| w.chars().count() >= MIN_SPELLING_LEN && !w.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_splits() {
        let words: Vec<String> = tokenize("GIMP: Image-Editor (2.8)").collect();
        assert_eq!(words, vec!["gimp", "image", "editor", "2", "8"]);
    }

    #[test]
    fn weights_accumulate_per_field() {
        let mut doc = IndexDocument::new("GIMP");
        {
            let mut tg = TermGenerator::new(&mut doc);
            tg.index_text(TextField::Name, "GIMP Image Editor");
            tg.index_text(TextField::Description, "An image editor");
            tg.index_text(TextField::Comment, "   ");
        }
        assert_eq!(doc.postings["gimp"], 10);
        assert_eq!(doc.postings["image"], 11);
        assert_eq!(doc.postings["an"], 1);
        assert_eq!(doc.text[&TextField::Name], "GIMP Image Editor");
        assert!(!doc.text.contains_key(&TextField::Comment));
    }

    #[test]
    fn repeated_field_text_is_joined() {
        let mut doc = IndexDocument::new("x");
        let mut tg = TermGenerator::new(&mut doc);
        tg.index_text(TextField::Keywords, "paint");
        tg.index_text(TextField::Keywords, "draw");
        assert_eq!(doc.text[&TextField::Keywords], "paint\ndraw");
    }

    #[test]
    fn spelling_skips_short_and_numeric() {
        let mut doc = IndexDocument::new("x");
        TermGenerator::new(&mut doc).index_text(TextField::Name, "Go 2048 Chess");
        let words: Vec<&str> = spelling_words(&doc).collect();
        assert_eq!(words, vec!["chess"]);
    }
}
