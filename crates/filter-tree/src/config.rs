//! Grouping configuration model.
//!
//! A grouping configuration nests arbitrarily deep. A mapping holding a
//! `filters` key is a leaf; any other mapping is a group whose keys name
//! sub-groups:
//!
//! ```yaml
//! EW:
//!   HH:
//!     filters:
//!       - {type: eq, args: [instrumentMode, EW]}
//!       - {type: listContains, args: [transmitterReceiverPolarisation, HH]}
//! IW:
//!   filters: []
//! ```

use serde::de::{self, Deserialize, Deserializer, MapAccess, Visitor};
use std::collections::BTreeMap;
use std::fmt;

use catalog::FilterSpec;

use crate::Node;

/// Ordered, conjunctive list of catalog predicates.
pub type FilterSet = Vec<FilterSpec>;

/// A grouping configuration node.
pub type GroupNode = Node<FilterSet>;

/// Reserved key marking a leaf mapping.
pub const FILTERS_KEY: &str = "filters";

/// Path segment appended when flattening gives up on a too-deep branch.
pub const TRUNCATED_SEGMENT: &str = "<truncated>";

impl<'de> Deserialize<'de> for Node<FilterSet> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(GroupNodeVisitor)
    }
}

struct GroupNodeVisitor;

impl<'de> Visitor<'de> for GroupNodeVisitor {
    type Value = GroupNode;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a mapping of group keys, or a mapping with a 'filters' list")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut filters: Option<FilterSet> = None;
        let mut groups = BTreeMap::new();

        while let Some(key) = map.next_key::<String>()? {
            if key == FILTERS_KEY {
                if filters.is_some() {
                    return Err(de::Error::duplicate_field(FILTERS_KEY));
                }
                // `filters: ~` reads as no filters.
                let value: Option<FilterSet> = map.next_value()?;
                filters = Some(value.unwrap_or_default());
            } else if key == TRUNCATED_SEGMENT {
                return Err(de::Error::custom(format!(
                    "group key '{}' is reserved",
                    TRUNCATED_SEGMENT
                )));
            } else {
                let child: GroupNode = map.next_value()?;
                if groups.insert(key.clone(), child).is_some() {
                    return Err(de::Error::custom(format!("duplicate group key '{}'", key)));
                }
            }
        }

        match filters {
            Some(_) if !groups.is_empty() => Err(de::Error::custom(format!(
                "'filters' cannot be mixed with group keys ({})",
                groups.keys().cloned().collect::<Vec<_>>().join(", ")
            ))),
            Some(filters) => Ok(Node::Leaf(filters)),
            None => Ok(Node::Group(groups)),
        }
    }
}
