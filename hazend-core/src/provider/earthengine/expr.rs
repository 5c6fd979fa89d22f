//! Builder for Earth Engine expression graphs.
//!
//! The REST API evaluates a tree of `ValueNode`s. Every node used here is
//! either a constant or a call of a named algorithm with named arguments.
//! [`Expr`] mirrors that tree and the methods below name the handful of
//! algorithms the indicator queries need.

use serde_json::{Map, Value, json};

use crate::model::{GeoPoint, TimeWindow};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(Value),
    Call {
        function: &'static str,
        args: Vec<(&'static str, Expr)>,
    },
}

impl Expr {
    pub fn constant(value: impl Into<Value>) -> Self {
        Expr::Constant(value.into())
    }

    pub fn call(function: &'static str, args: Vec<(&'static str, Expr)>) -> Self {
        Expr::Call { function, args }
    }

    pub fn point(point: GeoPoint) -> Self {
        Self::call(
            "GeometryConstructors.Point",
            vec![("coordinates", Self::constant(json!([point.longitude, point.latitude])))],
        )
    }

    pub fn image_collection(id: &str) -> Self {
        Self::call("ImageCollection.load", vec![("id", Self::constant(id))])
    }

    pub fn feature_collection(id: &str) -> Self {
        Self::call("Collection.loadTable", vec![("tableId", Self::constant(id))])
    }

    fn date(value: String) -> Self {
        Self::call("Date", vec![("value", Self::constant(value))])
    }

    /// Circular region of `meters` around a geometry.
    pub fn buffer(self, meters: f64) -> Self {
        Self::call("Geometry.buffer", vec![("geometry", self), ("distance", Self::constant(meters))])
    }

    fn filter(self, filter: Expr) -> Self {
        Self::call("Collection.filter", vec![("collection", self), ("filter", filter)])
    }

    /// Keep elements whose `system:time_start` falls in `[start, end)`.
    pub fn filter_date(self, window: TimeWindow) -> Self {
        let range = Self::call(
            "DateRange",
            vec![
                ("start", Self::date(window.start.to_string())),
                ("end", Self::date(window.end.to_string())),
            ],
        );
        self.filter(Self::call(
            "Filter.dateRangeContains",
            vec![("leftValue", range), ("rightField", Self::constant("system:time_start"))],
        ))
    }

    pub fn filter_bounds(self, geometry: Expr) -> Self {
        self.filter(Self::call(
            "Filter.intersects",
            vec![("leftField", Self::constant(".all")), ("rightValue", geometry)],
        ))
    }

    /// Sort by `key`, newest first.
    pub fn sort_desc(self, key: &str) -> Self {
        Self::call(
            "Collection.limit",
            vec![
                ("collection", self),
                ("key", Self::constant(key)),
                ("ascending", Self::constant(false)),
            ],
        )
    }

    pub fn size(self) -> Self {
        Self::call("Collection.size", vec![("collection", self)])
    }

    pub fn first(self) -> Self {
        Self::call("Collection.first", vec![("collection", self)])
    }

    pub fn normalized_difference(self, first: &str, second: &str) -> Self {
        Self::call(
            "Image.normalizedDifference",
            vec![("input", self), ("bandNames", Self::constant(json!([first, second])))],
        )
    }

    pub fn rename(self, name: &str) -> Self {
        Self::call("Image.rename", vec![("input", self), ("names", Self::constant(json!([name])))])
    }

    pub fn select(self, band: &str) -> Self {
        Self::call(
            "Image.select",
            vec![("input", self), ("bandSelectors", Self::constant(json!([band])))],
        )
    }

    /// Spatial mean over `geometry` at `scale` meters per pixel.
    pub fn reduce_mean(self, geometry: Expr, scale: f64) -> Self {
        Self::call(
            "Image.reduceRegion",
            vec![
                ("image", self),
                ("reducer", Self::call("Reducer.mean", vec![])),
                ("geometry", geometry),
                ("scale", Self::constant(scale)),
            ],
        )
    }

    pub fn get(self, key: &str) -> Self {
        Self::call("Dictionary.get", vec![("dictionary", self), ("key", Self::constant(key))])
    }

    /// Render as a single `ValueNode`.
    pub fn to_node(&self) -> Value {
        match self {
            Expr::Constant(value) => json!({ "constantValue": value }),
            Expr::Call { function, args } => {
                let arguments: Map<String, Value> =
                    args.iter().map(|(name, arg)| (name.to_string(), arg.to_node())).collect();
                json!({
                    "functionInvocationValue": {
                        "functionName": function,
                        "arguments": arguments,
                    }
                })
            }
        }
    }

    /// Render as the `Expression` message expected by `value:compute`.
    pub fn to_expression(&self) -> Value {
        json!({ "result": "0", "values": { "0": self.to_node() } })
    }
}
