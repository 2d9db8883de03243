//! Note names for `note` triggers: `c4`, `Eb3`, `f#2` to MIDI note numbers.

/// Parse a note name into a MIDI note number.
///
/// Format: `<letter><optional accidental><octave>`
/// - Letter: C, D, E, F, G, A, B (either case)
/// - Accidental: # (sharp) or b (flat)
/// - Octave: -1 to 9 (C4 = middle C = MIDI 60)
pub fn parse_note_name(name: &str) -> Option<u8> {
    let chars: Vec<char> = name.chars().collect();
    if chars.is_empty() {
        return None;
    }

    let base = match chars[0].to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let mut i = 1;
    let accidental: i32 = match chars.get(i) {
        Some('#') => {
            i += 1;
            1
        }
        Some('b') => {
            i += 1;
            -1
        }
        _ => 0,
    };

    let octave_str: String = chars[i..].iter().collect();
    let octave: i32 = octave_str.parse().ok()?;

    // C-1 = 0, C4 = 60, A4 = 69
    let midi = (octave + 1) * 12 + base + accidental;

    if !(0..=127).contains(&midi) {
        None
    } else {
        Some(midi as u8)
    }
}
