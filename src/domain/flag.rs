//! Dynamic flag domain types.
//!
//! A flag definition describes a named signal derived from entity metadata
//! through an ordered list of rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::value::{present, Value};

/// Kind of value a flag emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FlagType {
    /// Emits `true` when a rule matches.
    Boolean,
    /// Emits the matched metadata value.
    Numeric,
    /// Emits the matched metadata value as a category label.
    Category,
}

impl std::fmt::Display for FlagType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlagType::Boolean => write!(f, "boolean"),
            FlagType::Numeric => write!(f, "numeric"),
            FlagType::Category => write!(f, "category"),
        }
    }
}

impl std::str::FromStr for FlagType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "boolean" => Ok(FlagType::Boolean),
            "numeric" => Ok(FlagType::Numeric),
            "category" => Ok(FlagType::Category),
            _ => Err(format!("Unknown flag type: {}", s)),
        }
    }
}

/// Comparison applied by a rule. The metadata value is always the left operand.
///
/// Unrecognized condition strings deserialize to `Unknown`, which never matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RuleCondition {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    In,
    NotContains,
    NotIn,
    Unknown,
}

impl std::fmt::Display for RuleCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RuleCondition::Eq => "eq",
            RuleCondition::Ne => "ne",
            RuleCondition::Gt => "gt",
            RuleCondition::Gte => "gte",
            RuleCondition::Lt => "lt",
            RuleCondition::Lte => "lte",
            RuleCondition::Contains => "contains",
            RuleCondition::In => "in",
            RuleCondition::NotContains => "not_contains",
            RuleCondition::NotIn => "not_in",
            RuleCondition::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for RuleCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "eq" => Ok(RuleCondition::Eq),
            "ne" => Ok(RuleCondition::Ne),
            "gt" => Ok(RuleCondition::Gt),
            "gte" => Ok(RuleCondition::Gte),
            "lt" => Ok(RuleCondition::Lt),
            "lte" => Ok(RuleCondition::Lte),
            "contains" => Ok(RuleCondition::Contains),
            "in" => Ok(RuleCondition::In),
            "not_contains" => Ok(RuleCondition::NotContains),
            "not_in" => Ok(RuleCondition::NotIn),
            _ => Err(format!("Unknown rule condition: {}", s)),
        }
    }
}

impl<'de> Deserialize<'de> for RuleCondition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or(RuleCondition::Unknown))
    }
}

/// A single field/condition/value test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Rule {
    /// Metadata key to read.
    pub field: String,
    /// Comparison to apply.
    pub condition: RuleCondition,
    /// Right-hand operand.
    #[schema(value_type = Object)]
    pub value: Value,
}

impl Rule {
    pub fn new(field: impl Into<String>, condition: RuleCondition, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            condition,
            value: value.into(),
        }
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.field, self.condition, self.value)
    }
}

/// Stored definition of a dynamic flag.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FlagDefinition {
    pub id: Uuid,

    /// Unique name of the flag.
    pub name: String,

    pub description: String,

    #[serde(rename = "type")]
    pub flag_type: FlagType,

    /// Value emitted when no rule matches.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub default_value: Value,

    /// Rules evaluated in order; the first match wins.
    #[serde(default)]
    pub rules: Vec<Rule>,

    /// Weight used by score aggregation.
    #[serde(default)]
    pub weight: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FlagDefinition {
    /// Create a definition with no rules and a null default.
    pub fn new(name: impl Into<String>, flag_type: FlagType, weight: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            flag_type,
            default_value: Value::Null,
            rules: Vec::new(),
            weight,
            category: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = value.into();
        self
    }

    /// Apply a partial update. The name never changes.
    pub fn apply_update(&mut self, update: UpdateFlagDefinition) {
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(flag_type) = update.flag_type {
            self.flag_type = flag_type;
        }
        if let Some(default_value) = update.default_value {
            self.default_value = default_value;
        }
        if let Some(rules) = update.rules {
            self.rules = rules;
        }
        if let Some(weight) = update.weight {
            self.weight = weight;
        }
        if let Some(category) = update.category {
            self.category = Some(category);
        }
        self.updated_at = Utc::now();
    }
}

/// Request body for creating a flag definition.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateFlagDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub flag_type: FlagType,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub default_value: Value,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub category: Option<String>,
}

impl CreateFlagDefinition {
    pub fn into_definition(self) -> FlagDefinition {
        let mut definition = FlagDefinition::new(self.name, self.flag_type, self.weight);
        definition.description = self.description;
        definition.default_value = self.default_value;
        definition.rules = self.rules;
        definition.category = self.category;
        definition
    }
}

/// Partial update for a flag definition. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateFlagDefinition {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub flag_type: Option<FlagType>,
    /// An explicit `null` clears the default.
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Object)]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub rules: Option<Vec<Rule>>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Outcome of evaluating one flag against metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FlagEvaluationResult {
    pub flag_name: String,
    #[schema(value_type = Object)]
    pub value: Value,
    pub is_active: bool,
    pub weight: f64,
    /// Human-readable trace; not meant to be parsed.
    pub reason: String,
}

/// Active flags keyed by name, kept in evaluation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveFlagSummary(Vec<(String, Value)>);

impl ActiveFlagSummary {
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }
}

impl Serialize for ActiveFlagSummary {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Response of applying every flag definition to an entity.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FlagApplyResult {
    pub entity_id: String,
    pub evaluated_flags: Vec<FlagEvaluationResult>,
    /// Name to value for every active flag, in evaluation order.
    #[schema(value_type = Object)]
    pub active_flags_summary: ActiveFlagSummary,
}
