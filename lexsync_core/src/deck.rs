//! Deck naming for class vocabulary decks.

/// Deck name for a class's vocabulary cards.
pub fn class_deck_name(class: &str) -> String {
    format!("Vocabulary::Class {}", class)
}
