//! Dotted field paths over decoded documents
//!
//! `find("a.b")` descends into embedded documents and fans out over arrays,
//! so a path can match many values. An array reached at the last segment
//! contributes its elements rather than itself.

use crate::bson::{Document, Value};

impl Document {
    /// All values reachable by the dot-separated `path`
    pub fn find(&self, path: &str) -> Vec<&Value> {
        let fields: Vec<&str> = path.split('.').collect();
        let mut found = Vec::new();
        find_in_document(self, &fields, 0, &mut found);
        found
    }

    /// First value reachable by `path`
    pub fn find_first(&self, path: &str) -> Option<&Value> {
        self.find(path).into_iter().next()
    }
}

fn find_in_document<'a>(doc: &'a Document, fields: &[&str], index: usize, found: &mut Vec<&'a Value>) {
    let Some(matched) = doc.get(fields[index]) else {
        return;
    };

    if index == fields.len() - 1 {
        match matched {
            Value::Null => {}
            Value::Array(values) => found.extend(values.iter()),
            other => found.push(other),
        }
        return;
    }

    match matched {
        Value::Document(inner) => find_in_document(inner, fields, index + 1, found),
        Value::Array(values) => find_in_array(values, fields, index + 1, found),
        _ => {}
    }
}

fn find_in_array<'a>(values: &'a [Value], fields: &[&str], index: usize, found: &mut Vec<&'a Value>) {
    for value in values {
        match value {
            Value::Document(inner) => find_in_document(inner, fields, index, found),
            Value::Array(nested) => find_in_array(nested, fields, index, found),
            _ => {}
        }
    }
}
