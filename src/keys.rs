// 🔑 Key Normalization - safe identifiers from raw CSV headers
// Raw headers may carry umlauts, accents, spaces; selectors and JSON keys need ASCII

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Normalize a raw header (or column name typed by the user) into a safe key:
/// ASCII-only, lowercase-preserving, underscore-separated.
///
/// German letters transliterate first (ä→ae, ß→ss), remaining Latin-1 accents
/// fold to their base letter, and every other non-alphanumeric run collapses
/// to a single underscore. An input that normalizes to nothing becomes `col`.
pub fn normalize_key(raw: &str) -> String {
    let trimmed = raw.trim();

    let mut folded = String::with_capacity(trimmed.len() + 4);
    for ch in trimmed.chars() {
        match ch {
            // Transliteration first, preserves German-specific umlauts
            'ä' => folded.push_str("ae"),
            'ö' => folded.push_str("oe"),
            'ü' => folded.push_str("ue"),
            'Ä' => folded.push_str("Ae"),
            'Ö' => folded.push_str("Oe"),
            'Ü' => folded.push_str("Ue"),
            'ß' => folded.push_str("ss"),
            other => folded.push(fold_accent(other)),
        }
    }

    // Keep alphanumerics only, collapse everything else into single underscores
    let mut key = String::with_capacity(folded.len());
    let mut pending_sep = false;
    for ch in folded.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !key.is_empty() {
                key.push('_');
            }
            pending_sep = false;
            key.push(ch);
        } else {
            pending_sep = true;
        }
    }

    if key.is_empty() {
        // Fallback if normalization stripped the whole string
        "col".to_string()
    } else {
        key
    }
}

/// Strip the diacritic from a Latin-1 letter. Uploads are decoded as Latin-1,
/// so this table covers the full accented range the data can contain.
/// Characters outside it pass through and get collapsed later.
fn fold_accent(ch: char) -> char {
    match ch {
        'À'..='Å' => 'A',
        'Ç' => 'C',
        'È'..='Ë' => 'E',
        'Ì'..='Ï' => 'I',
        'Ð' => 'D',
        'Ñ' => 'N',
        'Ò'..='Õ' | 'Ø' => 'O',
        'Ù'..='Û' => 'U',
        'Ý' => 'Y',
        'à'..='å' => 'a',
        'ç' => 'c',
        'è'..='ë' => 'e',
        'ì'..='ï' => 'i',
        'ð' => 'd',
        'ñ' => 'n',
        'ò'..='õ' | 'ø' => 'o',
        'ù'..='û' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

// ============================================================================
// KEY MAP
// ============================================================================

/// Ordered mapping raw header → unique safe key, plus the inverse direction.
/// Two headers that normalize to the same key get `_2`, `_3`, … suffixes.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct KeyMap {
    pairs: Vec<(String, String)>,
}

impl KeyMap {
    /// Build the map from raw headers, in header order.
    pub fn from_headers<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut pairs: Vec<(String, String)> = Vec::new();
        for header in headers {
            let raw = header.as_ref().to_string();
            let base = normalize_key(&raw);
            let mut safe = base.clone();
            let mut i = 2;
            while pairs.iter().any(|(_, s)| *s == safe) {
                safe = format!("{}_{}", base, i);
                i += 1;
            }
            pairs.push((raw, safe));
        }
        KeyMap { pairs }
    }

    /// Safe key for a raw header (first match wins on duplicate raw headers).
    pub fn safe(&self, raw: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(r, _)| r == raw)
            .map(|(_, s)| s.as_str())
    }

    /// Raw header for a safe key.
    pub fn raw(&self, safe: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(_, s)| s == safe)
            .map(|(r, _)| r.as_str())
    }

    /// Resolve a user-supplied column name, raw or already-safe, to the safe
    /// key. Unknown names still normalize, so the caller can match against
    /// whatever key the data would have had.
    pub fn resolve(&self, name: &str) -> String {
        if let Some(safe) = self.safe(name) {
            return safe.to_string();
        }
        let normalized = normalize_key(name);
        if self.raw(&normalized).is_some() {
            return normalized;
        }
        normalized
    }

    /// Safe keys in header order.
    pub fn safe_keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(_, s)| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(r, s)| (r.as_str(), s.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plain() {
        assert_eq!(normalize_key("front die"), "front_die");
        assert_eq!(normalize_key("  Back Die  "), "Back_Die");
        assert_eq!(normalize_key("id"), "id");
    }

    #[test]
    fn test_normalize_umlauts() {
        assert_eq!(normalize_key("Münze"), "Muenze");
        assert_eq!(normalize_key("Prägung"), "Praegung");
        assert_eq!(normalize_key("Größe"), "Groesse");
        assert_eq!(normalize_key("ÄÖÜ"), "AeOeUe");
    }

    #[test]
    fn test_normalize_accents() {
        assert_eq!(normalize_key("légende"), "legende");
        assert_eq!(normalize_key("Año"), "Ano");
        assert_eq!(normalize_key("Î-ç-ù"), "I_c_u");
    }

    #[test]
    fn test_normalize_collapses_runs() {
        assert_eq!(normalize_key("front -- die!!"), "front_die");
        assert_eq!(normalize_key("__a__b__"), "a_b");
    }

    #[test]
    fn test_normalize_empty_falls_back() {
        assert_eq!(normalize_key(""), "col");
        assert_eq!(normalize_key("   "), "col");
        assert_eq!(normalize_key("!!!"), "col");
    }

    #[test]
    fn test_key_map_unique_suffixes() {
        let map = KeyMap::from_headers(["front die", "front-die", "front_die"]);
        let safes: Vec<&str> = map.safe_keys().collect();
        assert_eq!(safes, vec!["front_die", "front_die_2", "front_die_3"]);
    }

    #[test]
    fn test_key_map_round_trip() {
        let map = KeyMap::from_headers(["ID", "front die", "back die"]);
        assert_eq!(map.safe("front die"), Some("front_die"));
        assert_eq!(map.raw("front_die"), Some("front die"));
        assert_eq!(map.safe("missing"), None);
    }

    #[test]
    fn test_key_map_resolve_raw_or_safe() {
        let map = KeyMap::from_headers(["Front Die", "back die"]);
        // Raw name resolves through the map
        assert_eq!(map.resolve("Front Die"), "Front_Die");
        // Already-safe name resolves to itself
        assert_eq!(map.resolve("back_die"), "back_die");
        // Unknown name still normalizes
        assert_eq!(map.resolve("nicht da"), "nicht_da");
    }

    #[test]
    fn test_empty_header_normalizes_to_col() {
        let map = KeyMap::from_headers(["", ""]);
        let safes: Vec<&str> = map.safe_keys().collect();
        assert_eq!(safes, vec!["col", "col_2"]);
    }
}
