//! Field and collection references of a parsed shell query.
//!
//! Filters, projections, sort keys, distinct keys and `"$field"` expressions
//! all name field paths. Paths that must exist on a stored collection are
//! recorded on the [`ParsedQuery`]; paths that name fields produced by an
//! earlier aggregation stage are not, since no schema can know them.

use docanalyst_core::{FieldReference, ParsedQuery, QueryOperation};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// A pipeline stage names a field that an earlier stage removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScopeViolation {
    pub path: String,
    pub location: String,
}

type Visit = Result<(), ScopeViolation>;

/// Which fields a stage can see.
#[derive(Debug, Clone)]
enum Scope {
    /// Stored documents, plus fields added by earlier stages.
    Stored { added: HashSet<String> },
    /// Only the listed fields exist.
    Derived { visible: HashSet<String> },
    /// Shape unknown; nothing is checked.
    Opaque,
}

impl Scope {
    fn stored() -> Self {
        Self::Stored {
            added: HashSet::new(),
        }
    }

    fn derived<I: IntoIterator<Item = S>, S: Into<String>>(fields: I) -> Self {
        Self::Derived {
            visible: fields.into_iter().map(Into::into).collect(),
        }
    }

    fn add(&mut self, path: &str) {
        let root = root_of(path).to_string();
        match self {
            Self::Stored { added } => {
                added.insert(root);
            }
            Self::Derived { visible } => {
                visible.insert(root);
            }
            Self::Opaque => {}
        }
    }
}

#[derive(Debug, Default)]
struct Collector {
    collections: Vec<String>,
    fields: Vec<FieldReference>,
}

/// Record every collection and stored field path `parsed` reads.
pub(crate) fn collect_references(parsed: &mut ParsedQuery) -> Visit {
    let mut collector = Collector::default();
    let collection = parsed.collection.clone();
    let stored = Scope::stored();

    match parsed.operation {
        QueryOperation::Find | QueryOperation::FindOne => {
            if let Some(filter) = parsed.arguments.first() {
                collector.filter(filter, "", &collection, "filter", &stored)?;
            }
            if let Some(Value::Object(projection)) = parsed.arguments.get(1) {
                collector.projection(projection, &collection, "projection", &stored)?;
            }
        }
        QueryOperation::Count => {
            if let Some(filter) = parsed.arguments.first() {
                collector.filter(filter, "", &collection, "filter", &stored)?;
            }
        }
        QueryOperation::Distinct => {
            if let Some(Value::String(key)) = parsed.arguments.first() {
                collector.field(key, &collection, "distinct key", &stored)?;
            }
            if let Some(filter) = parsed.arguments.get(1) {
                collector.filter(filter, "", &collection, "filter", &stored)?;
            }
        }
        QueryOperation::Aggregate => {
            if let Some(Value::Array(stages)) = parsed.arguments.first() {
                collector.pipeline(stages, &collection, Scope::stored())?;
            }
        }
    }

    if let Some(Value::Object(sort)) = &parsed.modifiers.sort {
        for key in sort.keys() {
            collector.field(key, &collection, "sort", &stored)?;
        }
    }

    for name in collector.collections {
        parsed.reference_collection(name);
    }
    for reference in collector.fields {
        parsed.reference_field(reference);
    }
    Ok(())
}

impl Collector {
    fn field(&mut self, path: &str, collection: &str, location: &str, scope: &Scope) -> Visit {
        let path = path.trim_end_matches(".$");
        let root = root_of(path);
        // `$$ROOT`, `$$item.price` and friends are variables, not fields.
        if root.is_empty() || root.starts_with('$') {
            return Ok(());
        }

        match scope {
            Scope::Stored { added } => {
                if root != "_id" && !added.contains(root) {
                    self.fields
                        .push(FieldReference::new(collection, path, location));
                }
                Ok(())
            }
            Scope::Derived { visible } if !visible.contains(root) => Err(ScopeViolation {
                path: path.to_string(),
                location: location.to_string(),
            }),
            Scope::Derived { .. } | Scope::Opaque => Ok(()),
        }
    }

    /// Query-language filter: keys are paths, values are conditions.
    fn filter(
        &mut self,
        filter: &Value,
        prefix: &str,
        collection: &str,
        location: &str,
        scope: &Scope,
    ) -> Visit {
        let Value::Object(clauses) = filter else {
            return Ok(());
        };

        for (key, condition) in clauses {
            match key.as_str() {
                "$and" | "$or" | "$nor" => {
                    for clause in condition.as_array().into_iter().flatten() {
                        self.filter(clause, prefix, collection, location, scope)?;
                    }
                }
                "$expr" => self.expression(condition, collection, location, scope)?,
                // $text, $where, $comment, ...
                other if other.starts_with('$') => {}
                field => {
                    let path = join(prefix, field);
                    self.field(&path, collection, location, scope)?;
                    self.condition(condition, &path, collection, location, scope)?;
                }
            }
        }
        Ok(())
    }

    fn condition(
        &mut self,
        condition: &Value,
        path: &str,
        collection: &str,
        location: &str,
        scope: &Scope,
    ) -> Visit {
        let Value::Object(operators) = condition else {
            return Ok(());
        };

        for (operator, operand) in operators {
            match operator.as_str() {
                // Element conditions name sub-fields relative to the array.
                "$elemMatch" => self.filter(operand, path, collection, location, scope)?,
                "$not" => self.condition(operand, path, collection, location, scope)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Aggregation expression: `"$path"` strings are field references.
    fn expression(
        &mut self,
        expression: &Value,
        collection: &str,
        location: &str,
        scope: &Scope,
    ) -> Visit {
        match expression {
            Value::String(text) => match text.strip_prefix('$') {
                Some(path) => self.field(path, collection, location, scope),
                None => Ok(()),
            },
            Value::Array(items) => {
                for item in items {
                    self.expression(item, collection, location, scope)?;
                }
                Ok(())
            }
            Value::Object(entries) => {
                for (key, value) in entries {
                    if key != "$literal" {
                        self.expression(value, collection, location, scope)?;
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Returns the visible fields when the projection is an inclusion.
    fn projection(
        &mut self,
        spec: &Map<String, Value>,
        collection: &str,
        location: &str,
        scope: &Scope,
    ) -> Result<Option<HashSet<String>>, ScopeViolation> {
        let mut visible = HashSet::new();
        let mut inclusion = false;
        let mut keep_id = true;

        for (key, value) in spec {
            let key = key.trim_end_matches(".$");
            if key == "_id" {
                if is_falsy(value) {
                    keep_id = false;
                } else {
                    self.expression(value, collection, location, scope)?;
                }
                continue;
            }

            match value {
                Value::Bool(_) | Value::Number(_) => {
                    if !is_falsy(value) {
                        inclusion = true;
                        self.field(key, collection, location, scope)?;
                        visible.insert(root_of(key).to_string());
                    }
                }
                Value::Object(operators)
                    if operators.contains_key("$slice") || operators.contains_key("$elemMatch") =>
                {
                    inclusion = true;
                    self.field(key, collection, location, scope)?;
                    if let Some(operand) = operators.get("$elemMatch") {
                        self.filter(operand, key, collection, location, scope)?;
                    }
                    visible.insert(root_of(key).to_string());
                }
                computed => {
                    inclusion = true;
                    self.expression(computed, collection, location, scope)?;
                    visible.insert(root_of(key).to_string());
                }
            }
        }

        if !inclusion {
            return Ok(None);
        }
        if keep_id {
            visible.insert("_id".to_string());
        }
        Ok(Some(visible))
    }

    fn pipeline(&mut self, stages: &[Value], collection: &str, mut scope: Scope) -> Visit {
        for (index, stage) in stages.iter().enumerate() {
            let Some((name, spec)) = stage.as_object().and_then(|s| s.iter().next()) else {
                continue;
            };
            let location = format!("{name} (stage {})", index + 1);
            let location = location.as_str();

            match name.as_str() {
                "$match" => self.filter(spec, "", collection, location, &scope)?,
                "$project" => {
                    if let Value::Object(projection) = spec {
                        if let Some(visible) =
                            self.projection(projection, collection, location, &scope)?
                        {
                            scope = Scope::Derived { visible };
                        }
                    }
                }
                "$addFields" | "$set" => {
                    for (key, value) in spec.as_object().into_iter().flatten() {
                        self.expression(value, collection, location, &scope)?;
                        scope.add(key);
                    }
                }
                "$group" => {
                    let mut outputs = vec!["_id".to_string()];
                    for (key, value) in spec.as_object().into_iter().flatten() {
                        self.expression(value, collection, location, &scope)?;
                        outputs.push(key.clone());
                    }
                    scope = Scope::derived(outputs);
                }
                "$sort" => {
                    for (key, direction) in spec.as_object().into_iter().flatten() {
                        // {$meta: "textScore"} sorts on a computed value
                        if !direction.is_object() {
                            self.field(key, collection, location, &scope)?;
                        }
                    }
                }
                "$unwind" => {
                    let (path, index_field) = match spec {
                        Value::Object(options) => (
                            options.get("path").and_then(Value::as_str),
                            options.get("includeArrayIndex").and_then(Value::as_str),
                        ),
                        other => (other.as_str(), None),
                    };
                    if let Some(path) = path {
                        self.field(path.trim_start_matches('$'), collection, location, &scope)?;
                    }
                    if let Some(index_field) = index_field {
                        scope.add(index_field);
                    }
                }
                "$lookup" => self.lookup(spec, collection, location, &mut scope)?,
                "$graphLookup" => {
                    if let Some(from) = spec.get("from").and_then(Value::as_str) {
                        self.collections.push(from.to_string());
                    }
                    if let Some(start) = spec.get("startWith") {
                        self.expression(start, collection, location, &scope)?;
                    }
                    if let Some(target) = spec.get("as").and_then(Value::as_str) {
                        scope.add(target);
                    }
                }
                "$count" => {
                    if let Some(output) = spec.as_str() {
                        scope = Scope::derived([output]);
                    }
                }
                "$sortByCount" => {
                    self.expression(spec, collection, location, &scope)?;
                    scope = Scope::derived(["_id", "count"]);
                }
                "$bucket" | "$bucketAuto" => {
                    if let Some(group_by) = spec.get("groupBy") {
                        self.expression(group_by, collection, location, &scope)?;
                    }
                    let outputs = spec.get("output").and_then(Value::as_object);
                    let mut visible = vec!["_id".to_string()];
                    match outputs {
                        Some(outputs) => {
                            for (key, value) in outputs {
                                self.expression(value, collection, location, &scope)?;
                                visible.push(key.clone());
                            }
                        }
                        None => visible.push("count".to_string()),
                    }
                    scope = Scope::derived(visible);
                }
                "$replaceRoot" | "$replaceWith" => {
                    self.expression(spec, collection, location, &scope)?;
                    scope = Scope::Opaque;
                }
                "$facet" => {
                    for branch in spec.as_object().into_iter().flat_map(Map::values) {
                        if let Value::Array(branch) = branch {
                            self.pipeline(branch, collection, scope.clone())?;
                        }
                    }
                    scope = Scope::Opaque;
                }
                "$unionWith" => {
                    let other = spec
                        .as_str()
                        .or_else(|| spec.get("coll").and_then(Value::as_str));
                    if let Some(other) = other {
                        self.collections.push(other.to_string());
                    }
                    scope = Scope::Opaque;
                }
                "$limit" | "$skip" | "$sample" | "$unset" | "$out" | "$merge" => {}
                _ => scope = Scope::Opaque,
            }
        }
        Ok(())
    }

    fn lookup(
        &mut self,
        spec: &Value,
        collection: &str,
        location: &str,
        scope: &mut Scope,
    ) -> Visit {
        let from = spec.get("from").and_then(Value::as_str);
        if let Some(from) = from {
            self.collections.push(from.to_string());
        }

        if let Some(local) = spec.get("localField").and_then(Value::as_str) {
            self.field(local, collection, location, scope)?;
        }
        if let (Some(from), Some(foreign)) = (from, spec.get("foreignField").and_then(Value::as_str)) {
            self.field(foreign, from, location, &Scope::stored())?;
        }
        if let Some(variables) = spec.get("let") {
            self.expression(variables, collection, location, scope)?;
        }
        if let (Some(from), Some(Value::Array(inner))) = (from, spec.get("pipeline")) {
            self.pipeline(inner, from, Scope::stored())?;
        }
        if let Some(target) = spec.get("as").and_then(Value::as_str) {
            scope.add(target);
        }
        Ok(())
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn root_of(path: &str) -> &str {
    path.split('.').next().unwrap_or(path).trim_end_matches("[]")
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => !flag,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Null => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mongo::literal::parse_literal;
    use docanalyst_core::QueryModifiers;
    use pretty_assertions::assert_eq;

    fn query(collection: &str, operation: QueryOperation, args: &[&str]) -> ParsedQuery {
        let mut parsed = ParsedQuery::new(collection, operation);
        parsed.arguments = args.iter().map(|a| parse_literal(a).unwrap()).collect();
        parsed
    }

    fn paths(parsed: &ParsedQuery) -> Vec<(&str, &str, &str)> {
        parsed
            .fields
            .iter()
            .map(|f| (f.collection.as_str(), f.path.as_str(), f.location.as_str()))
            .collect()
    }

    #[test]
    fn test_filter_and_projection_paths() {
        let mut parsed = query(
            "customers",
            QueryOperation::Find,
            &[
                "{$or: [{city: 'NY'}, {'address.city': 'NY'}], age: {$not: {$lt: 18}}}",
                "{_id: 0, name: 1, 'orders.$': 1}",
            ],
        );
        parsed.modifiers = QueryModifiers {
            sort: parse_literal("{signup: -1}"),
            ..QueryModifiers::default()
        };

        collect_references(&mut parsed).unwrap();

        assert_eq!(
            paths(&parsed),
            vec![
                ("customers", "city", "filter"),
                ("customers", "address.city", "filter"),
                ("customers", "age", "filter"),
                ("customers", "name", "projection"),
                ("customers", "orders", "projection"),
                ("customers", "signup", "sort"),
            ]
        );
    }

    #[test]
    fn test_elem_match_paths_are_relative_to_the_array() {
        let mut parsed = query(
            "orders",
            QueryOperation::Count,
            &["{items: {$elemMatch: {sku: 'A1', qty: {$gt: 2}}}}"],
        );

        collect_references(&mut parsed).unwrap();

        let mut names: Vec<&str> = parsed.fields.iter().map(|f| f.path.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["items", "items.qty", "items.sku"]);
    }

    #[test]
    fn test_distinct_key_and_id_are_handled() {
        let mut parsed = query(
            "customers",
            QueryOperation::Distinct,
            &["'city'", "{_id: {$exists: true}}"],
        );

        collect_references(&mut parsed).unwrap();

        assert_eq!(paths(&parsed), vec![("customers", "city", "distinct key")]);
    }

    #[test]
    fn test_pipeline_scoping() {
        let mut parsed = query(
            "orders",
            QueryOperation::Aggregate,
            &["[
                {$match: {status: 'shipped'}},
                {$lookup: {from: 'customers', localField: 'customerId', foreignField: 'id', as: 'customer'}},
                {$unwind: '$customer'},
                {$addFields: {total: {$multiply: ['$price', '$qty']}}},
                {$group: {_id: '$customer.city', revenue: {$sum: '$total'}, orders: {$sum: 1}}},
                {$sort: {revenue: -1}},
                {$project: {_id: 0, city: '$_id', revenue: 1}},
                {$match: {revenue: {$gt: 100}}}
            ]"],
        );

        collect_references(&mut parsed).unwrap();

        assert_eq!(parsed.collections, vec!["orders", "customers"]);
        assert_eq!(
            paths(&parsed),
            vec![
                ("orders", "status", "$match (stage 1)"),
                ("orders", "customerId", "$lookup (stage 2)"),
                ("customers", "id", "$lookup (stage 2)"),
                ("orders", "price", "$addFields (stage 4)"),
                ("orders", "qty", "$addFields (stage 4)"),
            ]
        );
    }

    #[test]
    fn test_fields_removed_by_group_are_violations() {
        let mut parsed = query(
            "orders",
            QueryOperation::Aggregate,
            &["[{$group: {_id: '$city', n: {$sum: 1}}}, {$match: {status: 'shipped'}}]"],
        );

        let violation = collect_references(&mut parsed).unwrap_err();

        assert_eq!(
            violation,
            ScopeViolation {
                path: "status".to_string(),
                location: "$match (stage 2)".to_string(),
            }
        );
    }

    #[test]
    fn test_count_stage_and_variables() {
        let mut parsed = query(
            "orders",
            QueryOperation::Aggregate,
            &["[
                {$project: {items: {$filter: {input: '$items', as: 'i', cond: {$gt: ['$$i.price', 5]}}}}},
                {$count: 'expensive'},
                {$project: {expensive: 1}}
            ]"],
        );

        collect_references(&mut parsed).unwrap();

        assert_eq!(paths(&parsed), vec![("orders", "items", "$project (stage 1)")]);
    }

    #[test]
    fn test_replace_root_stops_checking() {
        let mut parsed = query(
            "customers",
            QueryOperation::Aggregate,
            &["[{$replaceRoot: {newRoot: '$profile'}}, {$match: {anything: 1}}]"],
        );

        collect_references(&mut parsed).unwrap();

        assert_eq!(paths(&parsed), vec![("customers", "profile", "$replaceRoot (stage 1)")]);
    }
}
