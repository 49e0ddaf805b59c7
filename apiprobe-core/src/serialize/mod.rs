//! Wire serialization of generated parameter values.
//!
//! Each location gets an ordered list of [`Transform`]s built from the
//! declared style/explode or `collectionFormat`. The first declared
//! transform for a key is applied last.

use std::collections::BTreeMap;

use crate::operation::{
    CollectionFormat, Operation, Parameter, ParameterLocation, ParameterStyle, SpecDialect,
};
use crate::schema::inferred_type;
use crate::{Case, JsonObject};

mod transform;

pub use transform::{stringify_leaves, wire_string, Transform, ValueShape};

/// Composed transforms of one parameter location.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LocationSerializer {
    transforms: Vec<Transform>,
}

impl LocationSerializer {
    pub fn new(transforms: Vec<Transform>) -> Self {
        Self { transforms }
    }

    /// Builds the serializer for `parameters`, all declared in one location.
    pub fn for_parameters<'a, I>(dialect: SpecDialect, parameters: I) -> Self
    where
        I: IntoIterator<Item = &'a Parameter>,
    {
        let mut transforms = Vec::new();
        for parameter in parameters {
            transforms.extend(parameter_transforms(dialect, parameter));
        }
        Self { transforms }
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Returns the wire form of `values`; the input is left untouched.
    pub fn apply(&self, values: &JsonObject) -> JsonObject {
        let mut serialized = values.clone();
        for transform in self.transforms.iter().rev() {
            transform.apply(&mut serialized);
        }
        serialized
    }
}

/// Per-location serializers of one operation.
#[derive(Clone, Debug, Default)]
pub struct OperationSerializer {
    locations: BTreeMap<ParameterLocation, LocationSerializer>,
}

impl OperationSerializer {
    pub fn new(operation: &Operation) -> Self {
        let locations = ParameterLocation::ALL
            .into_iter()
            .filter_map(|location| {
                let serializer = LocationSerializer::for_parameters(
                    operation.dialect,
                    operation.parameters_in(location),
                );
                (!serializer.is_empty()).then_some((location, serializer))
            })
            .collect();
        Self { locations }
    }

    pub fn location(&self, location: ParameterLocation) -> Option<&LocationSerializer> {
        self.locations.get(&location)
    }

    /// Copy of `case` with every location map in wire form.
    pub fn serialize(&self, case: &Case) -> Case {
        let mut serialized = case.clone();
        for (location, serializer) in &self.locations {
            let slot = serialized.location_mut(*location);
            if let Some(values) = slot.take() {
                *slot = Some(serializer.apply(&values));
            }
        }
        serialized
    }
}

fn is_json_media_type(media_type: &str) -> bool {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// Transforms for one parameter, outermost first.
fn parameter_transforms(dialect: SpecDialect, parameter: &Parameter) -> Vec<Transform> {
    if let Some(media_type) = &parameter.media_type {
        if is_json_media_type(media_type) {
            return vec![Transform::ToJson {
                name: parameter.name.clone(),
            }];
        }
        return Vec::new();
    }
    let type_name = parameter.schema.as_object().and_then(inferred_type);
    let shape = ValueShape::from_type(type_name);
    match dialect {
        SpecDialect::Swagger2 => swagger2_transforms(parameter, shape),
        SpecDialect::OpenApi3 => match parameter.location {
            ParameterLocation::Path => path_transforms(parameter, shape),
            ParameterLocation::Query => query_transforms(parameter, shape),
            ParameterLocation::Header => header_transforms(parameter, shape),
            ParameterLocation::Cookie => cookie_transforms(parameter, shape),
        },
    }
}

fn delimited(name: &str, delimiter: &str) -> Transform {
    Transform::Delimited {
        name: name.to_string(),
        delimiter: delimiter.to_string(),
    }
}

/// `simple` style shared by path and header parameters.
fn simple(name: &str, shape: ValueShape, explode: bool) -> Option<Transform> {
    let name = name.to_string();
    match shape {
        ValueShape::Array => Some(Transform::Delimited {
            name,
            delimiter: ",".to_string(),
        }),
        ValueShape::Object if explode => Some(Transform::DelimitedObject { name }),
        ValueShape::Object => Some(Transform::CommaDelimitedObject { name }),
        ValueShape::Primitive => None,
    }
}

fn path_transforms(parameter: &Parameter, shape: ValueShape) -> Vec<Transform> {
    let name = parameter.name.clone();
    let explode = parameter.explode.unwrap_or(false);
    let mut transforms = vec![Transform::ToString { name: name.clone() }];
    match parameter.style.unwrap_or(ParameterStyle::Simple) {
        ParameterStyle::Label => transforms.push(Transform::Label {
            name,
            shape,
            explode,
        }),
        ParameterStyle::Matrix => transforms.push(Transform::Matrix {
            name,
            shape,
            explode,
        }),
        _ => transforms.extend(simple(&name, shape, explode)),
    }
    transforms
}

fn query_transforms(parameter: &Parameter, shape: ValueShape) -> Vec<Transform> {
    let name = parameter.name.clone();
    let style = parameter.style.unwrap_or(ParameterStyle::Form);
    let explode = parameter
        .explode
        .unwrap_or(matches!(style, ParameterStyle::Form));
    let transform = match (shape, style) {
        (ValueShape::Object, ParameterStyle::DeepObject) => Some(Transform::DeepObject { name }),
        (ValueShape::Object, ParameterStyle::Form) if explode => {
            Some(Transform::ExtractedObject { name })
        }
        (ValueShape::Object, ParameterStyle::Form) => {
            Some(Transform::CommaDelimitedObject { name })
        }
        (ValueShape::Array, _) if explode => None,
        (ValueShape::Array, ParameterStyle::Form) => Some(delimited(&name, ",")),
        (ValueShape::Array, ParameterStyle::SpaceDelimited) => Some(delimited(&name, " ")),
        (ValueShape::Array, ParameterStyle::PipeDelimited) => Some(delimited(&name, "|")),
        _ => None,
    };
    transform.into_iter().collect()
}

fn header_transforms(parameter: &Parameter, shape: ValueShape) -> Vec<Transform> {
    let name = parameter.name.clone();
    let explode = parameter.explode.unwrap_or(false);
    let mut transforms = vec![Transform::ToString { name: name.clone() }];
    transforms.extend(simple(&name, shape, explode));
    transforms
}

fn cookie_transforms(parameter: &Parameter, shape: ValueShape) -> Vec<Transform> {
    let name = parameter.name.clone();
    let explode = parameter.explode.unwrap_or(false);
    let mut transforms = vec![Transform::ToString { name: name.clone() }];
    match shape {
        // A cookie cannot carry several values.
        ValueShape::Array | ValueShape::Object if explode => {
            transforms.push(Transform::Nothing { name });
        }
        ValueShape::Array => transforms.push(delimited(&name, ",")),
        ValueShape::Object => transforms.push(Transform::CommaDelimitedObject { name }),
        ValueShape::Primitive => {}
    }
    transforms
}

fn swagger2_transforms(parameter: &Parameter, shape: ValueShape) -> Vec<Transform> {
    let name = parameter.name.clone();
    let mut transforms = Vec::new();
    if parameter.location == ParameterLocation::Header {
        transforms.push(Transform::ToString { name: name.clone() });
    }
    if shape != ValueShape::Primitive {
        let format = parameter.collection_format.unwrap_or(CollectionFormat::Csv);
        if let Some(delimiter) = format.delimiter() {
            transforms.push(delimited(&name, delimiter));
        }
    }
    transforms
}

#[cfg(test)]
#[path = "../../tests/internal/serialize_unit_tests.rs"]
mod tests;
