//! Normalised input schemas.
//!
//! Parameter structs derive `JsonSchema`; at registration the generated JSON
//! schema is reduced to an ordered list of [`ParamSpec`]s which the dispatcher
//! validates arguments against before any handler runs.

use rmcp::model::JsonObject;
use serde_json::Value;
use std::sync::Arc;

use super::error::{ParamProblem, Problem};

/// JSON type a parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    /// No type constraint (or one we do not check).
    Any,
}

impl ParamKind {
    fn from_type_name(name: &str) -> Option<Self> {
        Some(match name {
            "string" => Self::String,
            "integer" => Self::Integer,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "array" => Self::Array,
            "object" => Self::Object,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => "any",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    /// `null` is an accepted value.
    pub nullable: bool,
    /// Smallest accepted number.
    pub minimum: Option<i64>,
    /// Closed set of accepted values.
    pub allowed: Option<Vec<Value>>,
}

impl ParamSpec {
    fn check_constraints(&self, value: &Value) -> Option<Problem> {
        if let Some(minimum) = self.minimum {
            let below = match value.as_i64() {
                Some(n) => n < minimum,
                None => value.as_f64().is_some_and(|n| n < minimum as f64),
            };
            if below {
                return Some(Problem::BelowMinimum { minimum });
            }
        }
        match &self.allowed {
            Some(allowed) if !allowed.contains(value) => Some(Problem::NotAllowed {
                allowed: allowed.clone(),
            }),
            _ => None,
        }
    }
}

/// Ordered parameter list of one tool.
#[derive(Debug, Clone, Default)]
pub struct InputSchema {
    params: Vec<ParamSpec>,
}

impl InputSchema {
    /// Normalise a JSON schema object. Fails if the schema is not an object
    /// schema or a required name has no property.
    pub fn from_json_schema(schema: &Arc<JsonObject>) -> Result<Self, String> {
        match schema.get("type") {
            Some(Value::String(t)) if t == "object" => {}
            None => {}
            Some(other) => return Err(format!("top-level type must be object, got {}", other)),
        }

        let required: Vec<&str> = match schema.get("required") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().ok_or("required entries must be strings"))
                .collect::<Result<_, _>>()?,
            None => Vec::new(),
            Some(_) => return Err("required must be an array".to_string()),
        };

        let mut params = Vec::new();
        if let Some(props) = schema.get("properties") {
            let props = props
                .as_object()
                .ok_or_else(|| "properties must be an object".to_string())?;
            for (name, prop) in props {
                let shape = describe_property(prop, schema);
                params.push(ParamSpec {
                    name: name.clone(),
                    kind: shape.kind,
                    required: required.contains(&name.as_str()),
                    nullable: shape.nullable,
                    minimum: shape.minimum,
                    allowed: shape.allowed,
                });
            }
        }

        if let Some(missing) = required.iter().find(|r| !params.iter().any(|p| p.name == **r)) {
            return Err(format!("required parameter '{}' has no property", missing));
        }

        Ok(Self { params })
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Check `arguments` and report every problem found.
    pub fn validate(&self, arguments: &JsonObject) -> Vec<ParamProblem> {
        let mut problems = Vec::new();

        for spec in &self.params {
            match arguments.get(&spec.name) {
                None if spec.required => {
                    problems.push(ParamProblem::new(&spec.name, Problem::Missing));
                }
                None => {}
                Some(Value::Null) if spec.nullable || !spec.required => {}
                Some(Value::Null) => problems.push(ParamProblem::new(&spec.name, Problem::Null)),
                Some(value) if !spec.kind.accepts(value) => {
                    problems.push(ParamProblem::new(
                        &spec.name,
                        Problem::WrongType {
                            expected: spec.kind.as_str().to_string(),
                            found: json_type_name(value).to_string(),
                        },
                    ));
                }
                Some(value) => {
                    if let Some(problem) = spec.check_constraints(value) {
                        problems.push(ParamProblem::new(&spec.name, problem));
                    }
                }
            }
        }

        for name in arguments.keys() {
            if self.get(name).is_none() {
                problems.push(ParamProblem::new(name, Problem::Unknown));
            }
        }

        problems
    }
}

/// What a property accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Shape {
    kind: ParamKind,
    nullable: bool,
    minimum: Option<i64>,
    allowed: Option<Vec<Value>>,
}

impl Shape {
    fn any(nullable: bool) -> Self {
        Self {
            kind: ParamKind::Any,
            nullable,
            minimum: None,
            allowed: None,
        }
    }
}

/// `{"type": "null"}`, or the `{"const": null, "nullable": true}` form the
/// nullable transform rewrites it to.
fn is_null_arm(arm: &Value) -> bool {
    arm.get("type").and_then(Value::as_str) == Some("null")
        || (arm.get("const") == Some(&Value::Null) && arm.get("type").is_none())
}

/// Resolve a property's accepted kind, nullability and constraints.
///
/// Handles plain `type`, `type: [T, "null"]`, `anyOf`/`oneOf` with a null arm,
/// the OpenAPI `nullable` keyword, and `$ref` into the root
/// `$defs`/`definitions`.
fn describe_property(prop: &Value, root: &JsonObject) -> Shape {
    let Some(obj) = prop.as_object() else {
        return Shape::any(true);
    };
    let flagged = obj.get("nullable").and_then(Value::as_bool).unwrap_or(false);

    let mut shape = if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
        match resolve_ref(reference, root) {
            Some(target) => describe_property(target, root),
            None => Shape::any(false),
        }
    } else {
        match obj.get("type") {
            Some(Value::String(t)) => Shape {
                kind: ParamKind::from_type_name(t).unwrap_or(ParamKind::Any),
                nullable: t == "null",
                minimum: None,
                allowed: None,
            },
            Some(Value::Array(types)) => {
                let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
                let kinds: Vec<ParamKind> = names
                    .iter()
                    .filter(|n| **n != "null")
                    .filter_map(|n| ParamKind::from_type_name(n))
                    .collect();
                Shape {
                    kind: match kinds.as_slice() {
                        [single] => *single,
                        _ => ParamKind::Any,
                    },
                    nullable: names.contains(&"null"),
                    minimum: None,
                    allowed: None,
                }
            }
            _ => describe_alternatives(obj, root).unwrap_or_else(|| Shape::any(false)),
        }
    };

    shape.nullable |= flagged;
    if let Some(minimum) = obj.get("minimum").and_then(Value::as_i64) {
        shape.minimum = Some(minimum);
    }
    if let Some(Value::Array(values)) = obj.get("enum") {
        shape.allowed = Some(values.iter().filter(|v| !v.is_null()).cloned().collect());
    }
    shape
}

/// `anyOf`/`oneOf`: constraints survive only when one non-null arm remains.
fn describe_alternatives(obj: &JsonObject, root: &JsonObject) -> Option<Shape> {
    let arms = ["anyOf", "oneOf"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_array))?;

    let mut nullable = false;
    let mut shapes = Vec::new();
    for arm in arms {
        if is_null_arm(arm) {
            nullable = true;
        } else {
            shapes.push(describe_property(arm, root));
        }
    }

    let consts: Option<Vec<Value>> = arms
        .iter()
        .filter(|arm| !is_null_arm(arm))
        .map(|arm| arm.get("const").cloned())
        .collect();

    let mut shape = match (shapes.as_slice(), consts) {
        ([single], _) => single.clone(),
        // Documented enum variants come out as one `const` arm each.
        ([first, rest @ ..], Some(consts)) => Shape {
            kind: if rest.iter().all(|s| s.kind == first.kind) {
                first.kind
            } else {
                ParamKind::Any
            },
            nullable: false,
            minimum: None,
            allowed: Some(consts),
        },
        (many, _) => Shape::any(many.iter().any(|s| s.nullable)),
    };
    shape.nullable |= nullable;
    Some(shape)
}

fn resolve_ref<'a>(reference: &str, root: &'a JsonObject) -> Option<&'a Value> {
    let path = reference.strip_prefix("#/")?;
    let mut parts = path.split('/');
    let mut current = root.get(parts.next()?)?;
    for part in parts {
        current = current.get(part)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::handler::server::tool::cached_schema_for_type;
    use schemars::JsonSchema;
    use serde::Deserialize;
    use serde_json::json;

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    enum Mode {
        Fast,
        Slow,
    }

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Params {
        /// File id.
        file_id: String,
        limit: Option<u32>,
        tags: Option<Vec<String>>,
        recursive: bool,
        mode: Option<Mode>,
    }

    fn schema() -> InputSchema {
        InputSchema::from_json_schema(&cached_schema_for_type::<Params>()).unwrap()
    }

    fn args(value: Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_params_in_declaration_order() {
        let names: Vec<_> = schema().params().iter().map(|p| p.name.clone()).collect();
        assert_eq!(names, ["file_id", "limit", "tags", "recursive", "mode"]);
    }

    #[test]
    fn test_required_and_kinds() {
        let schema = schema();
        let file_id = schema.get("file_id").unwrap();
        assert!(file_id.required);
        assert_eq!(file_id.kind, ParamKind::String);

        let limit = schema.get("limit").unwrap();
        assert!(!limit.required);
        assert!(limit.nullable);
        assert_eq!(limit.kind, ParamKind::Integer);

        assert_eq!(schema.get("tags").unwrap().kind, ParamKind::Array);
        assert!(schema.get("recursive").unwrap().required);
    }

    #[test]
    fn test_valid_arguments() {
        let problems = schema().validate(&args(json!({
            "file_id": "123",
            "limit": 5,
            "recursive": false,
            "mode": "Fast"
        })));
        assert!(problems.is_empty(), "{:?}", problems);
    }

    #[test]
    fn test_reports_every_problem() {
        let problems = schema().validate(&args(json!({
            "limit": "ten",
            "recursive": null,
            "bogus": 1
        })));
        assert_eq!(
            problems,
            vec![
                ParamProblem::new("file_id", Problem::Missing),
                ParamProblem::new(
                    "limit",
                    Problem::WrongType {
                        expected: "integer".into(),
                        found: "string".into()
                    }
                ),
                ParamProblem::new("recursive", Problem::Null),
                ParamProblem::new("bogus", Problem::Unknown),
            ]
        );
    }

    #[test]
    fn test_optional_null_is_accepted() {
        let problems = schema().validate(&args(json!({
            "file_id": "1",
            "recursive": true,
            "limit": null
        })));
        assert!(problems.is_empty());
    }

    #[test]
    fn test_minimum_and_enum_are_enforced() {
        let schema = schema();
        assert_eq!(schema.get("limit").unwrap().minimum, Some(0));
        assert_eq!(
            schema.get("mode").unwrap().allowed,
            Some(vec![json!("Fast"), json!("Slow")])
        );

        let problems = schema.validate(&args(json!({
            "file_id": "1",
            "recursive": true,
            "limit": -1,
            "mode": "Medium"
        })));
        assert_eq!(
            problems,
            vec![
                ParamProblem::new("limit", Problem::BelowMinimum { minimum: 0 }),
                ParamProblem::new(
                    "mode",
                    Problem::NotAllowed {
                        allowed: vec![json!("Fast"), json!("Slow")]
                    }
                ),
            ]
        );
    }

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    #[serde(rename_all = "lowercase")]
    enum Action {
        /// Make a new one.
        Create,
        /// Remove it.
        Delete,
    }

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct ActionParams {
        action: Action,
    }

    #[test]
    fn test_documented_variants_become_allowed_values() {
        let schema =
            InputSchema::from_json_schema(&cached_schema_for_type::<ActionParams>()).unwrap();
        let action = schema.get("action").unwrap();
        assert_eq!(action.kind, ParamKind::String);
        assert_eq!(action.allowed, Some(vec![json!("create"), json!("delete")]));

        assert!(schema.validate(&args(json!({"action": "delete"}))).is_empty());
        assert_eq!(schema.validate(&args(json!({"action": "rename"}))).len(), 1);
    }

    #[test]
    fn test_rejects_non_object_schema() {
        let schema = Arc::new(args(json!({"type": "string"})));
        assert!(InputSchema::from_json_schema(&schema).is_err());

        let schema = Arc::new(args(json!({"type": "object", "required": ["x"]})));
        assert!(InputSchema::from_json_schema(&schema).is_err());
    }
}
