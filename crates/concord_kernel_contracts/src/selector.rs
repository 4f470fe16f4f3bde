#![forbid(unsafe_code)]

use serde_json::{Map, Value};

use crate::record::DocType;
use crate::ContractViolation;

/// Conjunction of field-equality predicates, rendered as a rich-query
/// selector document: `{"selector":{"field":"value",...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selector {
    predicates: Vec<(String, String)>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_doc_type(doc_type: DocType) -> Self {
        Self::new().eq("docType", doc_type.as_str())
    }

    /// Adds `field == value`. A repeated field replaces the earlier value.
    pub fn eq(mut self, field: &str, value: &str) -> Self {
        match self.predicates.iter_mut().find(|(f, _)| f == field) {
            Some((_, v)) => *v = value.to_string(),
            None => self.predicates.push((field.to_string(), value.to_string())),
        }
        self
    }

    pub fn predicates(&self) -> &[(String, String)] {
        &self.predicates
    }

    pub fn to_query_string(&self) -> String {
        let mut fields = Map::new();
        for (f, v) in &self.predicates {
            fields.insert(f.clone(), Value::String(v.clone()));
        }
        let mut root = Map::new();
        root.insert("selector".to_string(), Value::Object(fields));
        Value::Object(root).to_string()
    }

    /// Reads back a flat equality selector. Anything richer (operators,
    /// nested documents, non-string values) is refused.
    pub fn parse(query: &str) -> Result<Self, ContractViolation> {
        let root: Value = serde_json::from_str(query).map_err(|_| ContractViolation::InvalidValue {
            field: "selector",
            reason: "must be a JSON document",
        })?;
        let fields = root
            .get("selector")
            .and_then(Value::as_object)
            .ok_or(ContractViolation::InvalidValue {
                field: "selector",
                reason: "must contain a \"selector\" object",
            })?;
        let mut out = Self::new();
        for (f, v) in fields {
            let Some(v) = v.as_str() else {
                return Err(ContractViolation::InvalidValue {
                    field: "selector",
                    reason: "only string equality predicates are supported",
                });
            };
            out = out.eq(f, v);
        }
        Ok(out)
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.predicates
            .iter()
            .all(|(f, v)| doc.get(f).and_then(Value::as_str) == Some(v.as_str()))
    }
}
