//! geocode tool - resolve a place name to coordinates

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{ParamSpec, ParamType, Tool, ToolError, ToolOutput, ToolSpec};
use crate::weather::{Geocoder, parse_coordinates};

pub struct GeocodeTool {
    geocoder: Arc<dyn Geocoder>,
}

impl GeocodeTool {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self { geocoder }
    }
}

#[async_trait]
impl Tool for GeocodeTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "geocode",
            "Convert a location name or address to latitude/longitude coordinates. \
             Use this when you need coordinates for a location.",
        )
        .param(
            "location",
            ParamSpec::new(ParamType::String, "Location string like 'Denver, CO' or 'New York City'").required(),
        )
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput, ToolError> {
        let location = input["location"].as_str().unwrap_or_default().trim();
        if location.is_empty() {
            return Err(ToolError::InvalidInput("location must not be empty".to_string()));
        }

        let place = match parse_coordinates(location) {
            Some(place) => place,
            None => self.geocoder.geocode(location).await?,
        };
        ToolOutput::json(&place)
    }
}
