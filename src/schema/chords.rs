//! Chord table: the names backing the enumerated `chord` attribute.

const CHORDS: &[&str] = &[
    "single", "octave", "fifth", "major", "minor", "dim", "aug", "sus2", "sus4", "maj7", "min7",
    "dom7", "add9",
];

/// All chord names in table order.
pub fn chord_names() -> impl Iterator<Item = &'static str> {
    CHORDS.iter().copied()
}
