use serde::{Deserialize, Serialize};
use std::fmt;

/// Description of a live query a subscription is registered for.
///
/// The binding layer never interprets the filter; it is passed through to the
/// transport as-is. Two descriptors are equal when both the collection and
/// the filter text match.
///
/// # Example
///
/// ```rust
/// use kalam_bind::QueryDescriptor;
///
/// let all_cats = QueryDescriptor::collection("Cat");
/// let old_dogs = QueryDescriptor::collection("Dog").with_filter("age > 10");
/// assert_eq!(old_dogs.to_string(), "Dog WHERE age > 10");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Collection (table) name
    pub collection: String,

    /// Optional filter expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl QueryDescriptor {
    /// Subscribe to every row of a collection
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filter: None,
        }
    }

    /// Restrict the subscription with a filter expression
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

impl From<&str> for QueryDescriptor {
    fn from(collection: &str) -> Self {
        Self::collection(collection)
    }
}

impl fmt::Display for QueryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.filter {
            Some(filter) => write!(f, "{} WHERE {}", self.collection, filter),
            None => write!(f, "{}", self.collection),
        }
    }
}
