//! Insertion-ordered ICAP header collection.
//!
//! Names keep the exact spelling they were given and iteration follows
//! insertion order, so serialized requests are deterministic. Writing an
//! existing name replaces its value in place.

use indexmap::IndexMap;
use indexmap::map::Iter;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: IndexMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `name` (exact match). Returns the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.inner.insert(name.into(), value.into())
    }

    /// Overwrite the value of a header whose name matches case-insensitively,
    /// keeping its original spelling and position; append it otherwise.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        match self.position_ignore_case(name) {
            Some(idx) => {
                if let Some((_, v)) = self.inner.get_index_mut(idx) {
                    *v = value.into();
                }
            }
            None => {
                self.inner.insert(name.to_string(), value.into());
            }
        }
    }

    /// Add `name` only if no header with that name (any case) exists yet.
    pub fn insert_default(&mut self, name: &str, value: impl Into<String>) {
        if !self.contains_ignore_case(name) {
            self.inner.insert(name.to_string(), value.into());
        }
    }

    /// Exact-name lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner.get(name).map(String::as_str)
    }

    /// Case-insensitive lookup; the last match in insertion order wins.
    pub fn get_ignore_case(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    pub fn contains_ignore_case(&self, name: &str) -> bool {
        self.position_ignore_case(name).is_some()
    }

    /// Remove `name` (exact match), preserving the order of the rest.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.inner.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, String, String> {
        self.inner.iter()
    }

    /// Serialize as `Name: Value\r\n` lines.
    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        for (name, value) in &self.inner {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
    }

    fn position_ignore_case(&self, name: &str) -> Option<usize> {
        self.inner.keys().position(|k| k.eq_ignore_ascii_case(name))
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a String, &'a String);
    type IntoIter = Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Headers {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.inner {
            writeln!(f, "{name}: {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order_and_overwrites_in_place() {
        let mut h = Headers::new();
        h.insert("Host", "a");
        h.insert("Allow", "204");
        h.insert("X-Trace", "1");
        assert_eq!(h.insert("Allow", "206"), Some("204".to_string()));

        let names: Vec<&str> = h.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, ["Host", "Allow", "X-Trace"]);
        assert_eq!(h.get("Allow"), Some("206"));
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn names_are_case_sensitive_for_exact_access() {
        let mut h = Headers::new();
        h.insert("ISTag", "x");
        h.insert("istag", "y");
        assert_eq!(h.len(), 2);
        assert_eq!(h.get("ISTag"), Some("x"));
        assert_eq!(h.get("istag"), Some("y"));
        assert!(!h.contains("ISTAG"));
        assert_eq!(h.get_ignore_case("ISTAG"), Some("y"));
    }

    #[test]
    fn insert_default_fills_gaps_only() {
        let mut h: Headers = [("host", "caller")].into_iter().collect();
        h.insert_default("Host", "default");
        h.insert_default("Connection", "close");
        assert_eq!(h.get("host"), Some("caller"));
        assert!(!h.contains("Host"));
        assert_eq!(h.get("Connection"), Some("close"));
    }

    #[test]
    fn set_replaces_any_case_in_place() {
        let mut h: Headers = [("A", "1"), ("encapsulated", "old"), ("B", "2")]
            .into_iter()
            .collect();
        h.set("Encapsulated", "new");
        assert_eq!(h.get("encapsulated"), Some("new"));
        assert_eq!(h.len(), 3);

        h.set("Preview", "0");
        assert_eq!(h.iter().last().map(|(k, _)| k.as_str()), Some("Preview"));
    }

    #[test]
    fn remove_preserves_order() {
        let mut h: Headers = [("A", "1"), ("B", "2"), ("C", "3")].into_iter().collect();
        assert_eq!(h.remove("B"), Some("2".to_string()));
        let names: Vec<&str> = h.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, ["A", "C"]);
    }

    #[test]
    fn writes_wire_lines() {
        let h: Headers = [("Host", "h"), ("Connection", "close")].into_iter().collect();
        let mut out = Vec::new();
        h.write_to(&mut out);
        assert_eq!(out, b"Host: h\r\nConnection: close\r\n");
        assert_eq!(h.to_string(), "Host: h\nConnection: close\n");
    }
}
