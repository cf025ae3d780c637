//! Access policies
//!
//! An access policy is an ordered list of allow/deny rules bound to one
//! storage container. The storage network evaluates it first-match-wins, so
//! the position of a rule is part of its meaning: moving a deny below an
//! allow changes what the bearer may do.
//!
//! Rules are plain values. The builder in [`crate::builder`] produces them,
//! the minter signs them, and [`AccessPolicy::evaluate`] replays the network's
//! matching so the precedence can be checked without a network.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Object attribute carrying the MIME type of the payload
pub const ATTRIBUTE_CONTENT_TYPE: &str = "Content-Type";

/// Object attribute carrying the epoch after which the object is removed
pub const ATTRIBUTE_EXPIRATION_EPOCH: &str = "__NEOFS__EXPIRATION_EPOCH";

/// Identifier of the storage container a policy applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    /// Create a container identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rule outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    Deny,
}

/// Object operations a rule can govern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Get,
    Head,
    Put,
    Delete,
    Search,
    Range,
    RangeHash,
}

/// Requester role a rule targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Container owner
    User,
    /// Storage nodes
    System,
    /// Everyone else, including bearer-token holders
    Others,
}

/// What a filter inspects
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum FilterSubject {
    /// A named object attribute
    Attribute(String),
    /// Payload size in bytes
    PayloadLength,
}

/// Comparison applied by a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Matcher {
    /// Present and equal
    StringEqual,
    /// Absent, or present and different
    StringNotEqual,
    /// Present, numeric, and not greater than the filter value
    NumLe,
    /// Absent
    NotPresent,
}

/// A single predicate on an incoming object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter {
    pub subject: FilterSubject,
    pub matcher: Matcher,
    pub value: String,
}

impl Filter {
    /// Attribute must equal `value`
    pub fn attribute_eq(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            subject: FilterSubject::Attribute(key.into()),
            matcher: Matcher::StringEqual,
            value: value.into(),
        }
    }

    /// Attribute must not equal `value`
    pub fn attribute_ne(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            subject: FilterSubject::Attribute(key.into()),
            matcher: Matcher::StringNotEqual,
            value: value.into(),
        }
    }

    /// Attribute must be numeric and at most `bound`
    pub fn attribute_le(key: impl Into<String>, bound: u64) -> Self {
        Self {
            subject: FilterSubject::Attribute(key.into()),
            matcher: Matcher::NumLe,
            value: bound.to_string(),
        }
    }

    /// Attribute must be missing
    pub fn attribute_absent(key: impl Into<String>) -> Self {
        Self {
            subject: FilterSubject::Attribute(key.into()),
            matcher: Matcher::NotPresent,
            value: String::new(),
        }
    }

    /// Payload must be at most `bound` bytes
    pub fn payload_le(bound: u64) -> Self {
        Self {
            subject: FilterSubject::PayloadLength,
            matcher: Matcher::NumLe,
            value: bound.to_string(),
        }
    }

    /// Check the filter against a request
    pub fn matches(&self, request: &ObjectRequest) -> bool {
        let actual = match &self.subject {
            FilterSubject::Attribute(key) => request.attributes.get(key).cloned(),
            FilterSubject::PayloadLength => request.payload_length.map(|len| len.to_string()),
        };

        match self.matcher {
            Matcher::StringEqual => actual.is_some_and(|v| v == self.value),
            Matcher::StringNotEqual => actual.map_or(true, |v| v != self.value),
            Matcher::NumLe => {
                let actual = actual.and_then(|v| v.parse::<u64>().ok());
                let bound = self.value.parse::<u64>().ok();
                matches!((actual, bound), (Some(a), Some(b)) if a <= b)
            }
            Matcher::NotPresent => actual.is_none(),
        }
    }
}

/// One allow/deny rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub action: Action,
    pub operation: Operation,
    pub targets: Vec<Role>,
    /// Conjunctive: every filter must match
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl Rule {
    /// Create a rule with no targets and no filters
    pub fn new(action: Action, operation: Operation) -> Self {
        Self {
            action,
            operation,
            targets: Vec::new(),
            filters: Vec::new(),
        }
    }

    /// Shorthand for an allow rule
    pub fn allow(operation: Operation) -> Self {
        Self::new(Action::Allow, operation)
    }

    /// Shorthand for a deny rule
    pub fn deny(operation: Operation) -> Self {
        Self::new(Action::Deny, operation)
    }

    /// Add a target role
    pub fn for_role(mut self, role: Role) -> Self {
        if !self.targets.contains(&role) {
            self.targets.push(role);
        }
        self
    }

    /// Add a filter
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add several filters, keeping their order
    pub fn with_filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    /// True if the rule applies to every request for its operation and roles
    pub fn is_unconditional(&self) -> bool {
        self.filters.is_empty()
    }

    /// Check whether the rule applies to a request
    pub fn applies_to(&self, request: &ObjectRequest) -> bool {
        self.operation == request.operation
            && self.targets.contains(&request.role)
            && self.filters.iter().all(|f| f.matches(request))
    }
}

/// Ordered rule list bound to a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub container: ContainerId,
    pub rules: Vec<Rule>,
}

impl AccessPolicy {
    /// Create an empty policy for a container
    pub fn new(container: ContainerId) -> Self {
        Self {
            container,
            rules: Vec::new(),
        }
    }

    /// Append a rule at the lowest precedence
    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Get the rules in evaluation order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// First-match-wins evaluation
    ///
    /// Returns the action of the first applicable rule, or `None` when no
    /// rule applies and the decision falls back to the container's basic ACL.
    pub fn evaluate(&self, request: &ObjectRequest) -> Option<Action> {
        self.rules
            .iter()
            .find(|rule| rule.applies_to(request))
            .map(|rule| rule.action)
    }
}

/// The parts of an incoming object operation a policy can see
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRequest {
    pub operation: Operation,
    pub role: Role,
    pub attributes: HashMap<String, String>,
    pub payload_length: Option<u64>,
}

impl ObjectRequest {
    /// Create a request with no attributes
    pub fn new(operation: Operation, role: Role) -> Self {
        Self {
            operation,
            role,
            attributes: HashMap::new(),
            payload_length: None,
        }
    }

    /// Shorthand for an upload by a bearer-token holder
    pub fn put() -> Self {
        Self::new(Operation::Put, Role::Others)
    }

    /// Set an attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the payload size
    pub fn with_payload_length(mut self, length: u64) -> Self {
        self.payload_length = Some(length);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_equal_requires_presence() {
        let filter = Filter::attribute_eq("Email", "abc");
        assert!(filter.matches(&ObjectRequest::put().with_attribute("Email", "abc")));
        assert!(!filter.matches(&ObjectRequest::put().with_attribute("Email", "abd")));
        assert!(!filter.matches(&ObjectRequest::put()));
    }

    #[test]
    fn test_not_equal_passes_on_missing_attribute() {
        let filter = Filter::attribute_ne(ATTRIBUTE_CONTENT_TYPE, "text/html");
        let typed =
            |value: &str| ObjectRequest::put().with_attribute(ATTRIBUTE_CONTENT_TYPE, value);
        assert!(filter.matches(&ObjectRequest::put()));
        assert!(filter.matches(&typed("image/png")));
        assert!(!filter.matches(&typed("text/html")));
    }

    #[test]
    fn test_num_le() {
        let filter = Filter::payload_le(100);
        assert!(filter.matches(&ObjectRequest::put().with_payload_length(100)));
        assert!(!filter.matches(&ObjectRequest::put().with_payload_length(101)));
        assert!(!filter.matches(&ObjectRequest::put()));

        let filter = Filter::attribute_le(ATTRIBUTE_EXPIRATION_EPOCH, 154);
        let expiring =
            |value: &str| ObjectRequest::put().with_attribute(ATTRIBUTE_EXPIRATION_EPOCH, value);
        assert!(filter.matches(&expiring("154")));
        assert!(!filter.matches(&expiring("155")));
        assert!(!filter.matches(&expiring("soon")));
    }

    #[test]
    fn test_not_present() {
        let filter = Filter::attribute_absent(ATTRIBUTE_CONTENT_TYPE);
        assert!(filter.matches(&ObjectRequest::put()));
        assert!(!filter.matches(&ObjectRequest::put().with_attribute(ATTRIBUTE_CONTENT_TYPE, "")));
    }

    #[test]
    fn test_first_match_wins() {
        let mut policy = AccessPolicy::new(ContainerId::new("cid"));
        policy.push(Rule::deny(Operation::Put).for_role(Role::Others).with_filter(
            Filter::attribute_eq("Tier", "cold"),
        ));
        policy.push(Rule::allow(Operation::Put).for_role(Role::Others));

        let cold = ObjectRequest::put().with_attribute("Tier", "cold");
        let hot = ObjectRequest::put().with_attribute("Tier", "hot");
        assert_eq!(policy.evaluate(&cold), Some(Action::Deny));
        assert_eq!(policy.evaluate(&hot), Some(Action::Allow));

        policy.rules.swap(0, 1);
        assert_eq!(policy.evaluate(&cold), Some(Action::Allow));
    }

    #[test]
    fn test_rule_scoped_by_operation_and_role() {
        let mut policy = AccessPolicy::new(ContainerId::new("cid"));
        policy.push(Rule::deny(Operation::Put).for_role(Role::Others));

        assert_eq!(policy.evaluate(&ObjectRequest::new(Operation::Get, Role::Others)), None);
        assert_eq!(policy.evaluate(&ObjectRequest::new(Operation::Put, Role::User)), None);
        assert_eq!(policy.evaluate(&ObjectRequest::put()), Some(Action::Deny));
    }

    #[test]
    fn test_for_role_deduplicates() {
        let rule = Rule::allow(Operation::Put).for_role(Role::Others).for_role(Role::Others);
        assert_eq!(rule.targets, vec![Role::Others]);
    }

    #[test]
    fn test_serialization_preserves_order() {
        let mut policy = AccessPolicy::new(ContainerId::new("cid"));
        policy.push(
            Rule::deny(Operation::Put)
                .for_role(Role::Others)
                .with_filter(Filter::payload_le(1)),
        );
        policy.push(Rule::allow(Operation::Put).for_role(Role::Others));

        let json = serde_json::to_vec(&policy).unwrap();
        let restored: AccessPolicy = serde_json::from_slice(&json).unwrap();
        assert_eq!(restored, policy);
        assert_eq!(restored.rules[0].action, Action::Deny);
    }
}
