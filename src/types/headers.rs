//! Ordered, multi-valued header collection.
//!
//! Batch bodies need more from a header map than `http::HeaderMap` gives:
//! field names keep their original spelling (serialized output is compared
//! line by line), repeated fields keep their order, and every field parsed
//! from a batch body remembers the line it came from so validation errors can
//! point at it.
//!
//! Lookup is case-insensitive. Headers built in code (for example on a
//! processor's response) use line number `0`.

/// One header field with all of its values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    name: String,
    values: Vec<String>,
    line: usize,
}

impl HeaderField {
    /// Create a field with a single value.
    pub fn new(name: impl Into<String>, value: impl Into<String>, line: usize) -> Self {
        HeaderField {
            name: name.into(),
            values: vec![value.into()],
            line,
        }
    }

    /// The field name as it was written.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every value in source order, one per occurrence of the field.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Line of the first occurrence, `0` for fields built in code.
    pub fn line(&self) -> usize {
        self.line
    }

    /// All values joined the way they are written on the wire.
    pub fn value(&self) -> String {
        self.values.join(", ")
    }

    /// The value, if the field carries exactly one non-list value.
    pub fn single_value(&self) -> Option<&str> {
        match self.values.as_slice() {
            [value] if !value.contains(',') => Some(value.as_str()),
            _ => None,
        }
    }

    /// Whether the field has the given name, ignoring case.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub(crate) fn push_value(&mut self, value: impl Into<String>) {
        self.values.push(value.into());
    }

    pub(crate) fn append_to_last(&mut self, continuation: &str) {
        if let Some(last) = self.values.last_mut() {
            if !last.is_empty() {
                last.push(' ');
            }
            last.push_str(continuation);
        }
    }
}

/// An ordered header block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<HeaderField>,
    line: usize,
}

impl Headers {
    /// Create an empty header block built in code.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty header block that starts at `line` of a batch body.
    pub fn at_line(line: usize) -> Self {
        Headers {
            fields: Vec::new(),
            line,
        }
    }

    /// Line at which this block starts.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Add a value, merging it into an existing field of the same name.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>, line: usize) {
        let name = name.into();
        match self.fields.iter_mut().find(|f| f.is(&name)) {
            Some(field) => field.push_value(value),
            None => self.fields.push(HeaderField::new(name, value, line)),
        }
    }

    /// Replace every field of this name by a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.fields.iter().position(|f| f.is(&name)) {
            Some(pos) => {
                let line = self.fields[pos].line;
                self.fields[pos] = HeaderField::new(name.clone(), value, line);
                let mut index = 0;
                self.fields.retain(|f| {
                    index += 1;
                    index - 1 == pos || !f.is(&name)
                });
            }
            None => self.fields.push(HeaderField::new(name, value, 0)),
        }
    }

    /// Replace the field with the same name by `field`, or append it.
    pub fn replace_field(&mut self, field: HeaderField) {
        match self.fields.iter_mut().find(|f| f.is(field.name())) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    /// Look up a field.
    pub fn get(&self, name: &str) -> Option<&HeaderField> {
        self.fields.iter().find(|f| f.is(name))
    }

    /// Look up a field's joined value.
    pub fn value(&self, name: &str) -> Option<String> {
        self.get(name).map(HeaderField::value)
    }

    /// Whether a field with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove a field, returning it.
    pub fn remove(&mut self, name: &str) -> Option<HeaderField> {
        let pos = self.fields.iter().position(|f| f.is(name))?;
        Some(self.fields.remove(pos))
    }

    /// Iterate fields in order.
    pub fn iter(&self) -> std::slice::Iter<'_, HeaderField> {
        self.fields.iter()
    }

    /// Number of distinct fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the block has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut HeaderField> {
        self.fields.last_mut()
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a HeaderField;
    type IntoIter = std::slice::Iter<'a, HeaderField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut headers = Headers::at_line(3);
        headers.add("Content-Type", "application/http", 3);
        assert!(headers.contains("content-type"));
        assert_eq!(headers.value("CONTENT-TYPE").as_deref(), Some("application/http"));
        assert_eq!(headers.get("content-type").map(HeaderField::line), Some(3));
    }

    #[test]
    fn test_duplicates_merge_in_order() {
        let mut headers = Headers::new();
        headers.add("Prefer", "odata.track-changes", 1);
        headers.add("prefer", "odata.continue-on-error", 2);

        let field = headers.get("Prefer").unwrap();
        assert_eq!(field.values(), ["odata.track-changes", "odata.continue-on-error"]);
        assert_eq!(field.line(), 1);
        assert_eq!(headers.len(), 1);
        assert_eq!(field.single_value(), None);
    }

    #[test]
    fn test_single_value_rejects_lists() {
        let field = HeaderField::new("Content-ID", "1, 2", 4);
        assert_eq!(field.single_value(), None);
        let field = HeaderField::new("Content-ID", "1", 4);
        assert_eq!(field.single_value(), Some("1"));
    }

    #[test]
    fn test_set_replaces_and_keeps_position() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain", 0);
        headers.add("Content-Length", "10", 0);
        headers.set("content-type", "application/json");

        let names: Vec<&str> = headers.iter().map(HeaderField::name).collect();
        assert_eq!(names, ["content-type", "Content-Length"]);
        assert_eq!(headers.value("Content-Type").as_deref(), Some("application/json"));
    }

    #[test]
    fn test_remove() {
        let mut headers = Headers::new();
        headers.add("Content-Id", "1", 0);
        assert!(headers.remove("content-id").is_some());
        assert!(headers.is_empty());
        assert!(headers.remove("content-id").is_none());
    }

    #[test]
    fn test_folded_value() {
        let mut headers = Headers::new();
        headers.add("X-Long", "first", 1);
        headers.last_mut().unwrap().append_to_last("second");
        assert_eq!(headers.value("x-long").as_deref(), Some("first second"));
    }
}
