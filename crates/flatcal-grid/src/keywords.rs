//! An insertion-order-preserving keyword map, used for FITS/XISF header
//! key-value pairs. Lookups are case-insensitive on the key (FITS keywords
//! are conventionally upper-case, but some producers are sloppy about it),
//! while the original casing is preserved for round-tripping on write.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Keywords {
    entries: Vec<(String, String)>,
}

impl Keywords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the first non-empty value among `keys`, in order.
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| {
            self.get(k).and_then(|v| {
                let trimmed = v.trim();
                (!trimmed.is_empty()).then_some(trimmed)
            })
        })
    }

    /// Inserts or replaces a keyword, preserving original position on replace.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(k, _)| k.eq_ignore_ascii_case(key))?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for Keywords {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut map = Keywords::new();
        for (k, v) in iter {
            map.set(k, v);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut kw = Keywords::new();
        kw.set("EXPTIME", "1.500");
        assert_eq!(kw.get("exptime"), Some("1.500"));
    }

    #[test]
    fn set_replaces_in_place() {
        let mut kw = Keywords::new();
        kw.set("A", "1");
        kw.set("B", "2");
        kw.set("A", "3");
        let collected: Vec<_> = kw.iter().collect();
        assert_eq!(collected, vec![("A", "3"), ("B", "2")]);
    }

    #[test]
    fn get_any_skips_blank_values() {
        let mut kw = Keywords::new();
        kw.set("EXPTIME", "   ");
        kw.set("EXPOSURE", "2.0");
        assert_eq!(kw.get_any(&["EXPTIME", "EXPOSURE"]), Some("2.0"));
    }
}
