use actionloop_core::{Error, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::debug;

use crate::fs::expand_path;
use crate::metadata::{schema_description, Signature, ToolDescriptor};
use crate::{Tool, ToolContext};

const DEFAULT_DATA_FILE: &str = "data/property_data.json";

/// Home search criteria. Absent fields are unconstrained in a partial search.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, JsonSchema)]
pub struct PropertyCriteria {
    pub location: Option<String>,
    pub num_of_bedrooms: Option<i64>,
    pub num_of_bathrooms: Option<i64>,
    pub has_garage: Option<bool>,
    /// Minimum construction year
    pub year_built: Option<i64>,
}

/// Criteria arrive either as an object or as a JSON-encoded string.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CriteriaInput {
    Map(PropertyCriteria),
    Encoded(String),
}

impl CriteriaInput {
    fn resolve(self) -> Result<PropertyCriteria> {
        match self {
            CriteriaInput::Map(c) => Ok(c),
            CriteriaInput::Encoded(s) => serde_json::from_str(&s)
                .map_err(|e| Error::Validation(format!("search_criteria is not valid JSON: {}", e))),
        }
    }
}

/// Search for properties based on a set of criteria.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchPropertyArgs {
    /// Criteria used to search for the property
    pub search_criteria: CriteriaInput,
    /// When false, every criterion must be given and must match
    #[serde(default = "default_partial_search")]
    pub partial_search: bool,
}

fn default_partial_search() -> bool {
    true
}

impl PropertyCriteria {
    /// Each given criterion must match; `year_built` is a lower bound. Without
    /// `partial`, a missing criterion rejects every listing.
    pub fn matches(&self, listing: &Value, partial: bool) -> bool {
        fn check<T>(wanted: &Option<T>, partial: bool, test: impl Fn(&T) -> bool) -> bool {
            match wanted {
                Some(w) => test(w),
                None => partial,
            }
        }

        check(&self.location, partial, |w| {
            listing
                .get("location")
                .and_then(|v| v.as_str())
                .map_or(false, |l| l.eq_ignore_ascii_case(w))
        }) && check(&self.num_of_bedrooms, partial, |w| {
            listing.get("num_of_bedrooms").and_then(|v| v.as_i64()) == Some(*w)
        }) && check(&self.num_of_bathrooms, partial, |w| {
            listing.get("num_of_bathrooms").and_then(|v| v.as_i64()) == Some(*w)
        }) && check(&self.has_garage, partial, |w| {
            listing.get("has_garage").and_then(|v| v.as_bool()) == Some(*w)
        }) && check(&self.year_built, partial, |w| {
            listing
                .get("year_built")
                .and_then(|v| v.as_i64())
                .map_or(false, |y| y >= *w)
        })
    }
}

// ============ search_property ============

pub struct SearchPropertyTool {
    data_file: PathBuf,
}

impl SearchPropertyTool {
    pub fn with_data_file(data_file: impl Into<PathBuf>) -> Self {
        Self {
            data_file: data_file.into(),
        }
    }
}

impl Default for SearchPropertyTool {
    fn default() -> Self {
        Self::with_data_file(DEFAULT_DATA_FILE)
    }
}

#[async_trait]
impl Tool for SearchPropertyTool {
    fn descriptor(&self) -> ToolDescriptor {
        let mut descriptor = ToolDescriptor::new("search_property")
            .signature(Signature::of::<SearchPropertyArgs>())
            .tags(&["property_search"]);
        if let Some(doc) = schema_description::<SearchPropertyArgs>() {
            descriptor = descriptor.description(&doc);
        }
        descriptor
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let args: SearchPropertyArgs = serde_json::from_value(params)
            .map_err(|e| Error::Validation(format!("Invalid arguments for 'search_property': {}", e)))?;
        let criteria = args.search_criteria.resolve()?;

        let path = expand_path(&self.data_file.to_string_lossy(), &ctx.workspace);
        let raw = tokio::fs::read_to_string(&path).await?;
        let listings: Vec<Value> = serde_json::from_str(&raw)?;

        let matches: Vec<Value> = listings
            .into_iter()
            .filter(|l| criteria.matches(l, args.partial_search))
            .collect();
        debug!(count = matches.len(), partial = args.partial_search, "Property search finished");

        Ok(json!({
            "count": matches.len(),
            "matches": matches
        }))
    }
}
