//! Typed sub-plans produced by the four domain planners, plus the
//! [`TaskPlan`] that collects them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_xy() -> HashMap<String, f64> {
    HashMap::from([("x".to_string(), 0.0), ("y".to_string(), 0.0)])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    Rectangle,
    Circle,
    Ellipse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryShape {
    #[serde(rename = "type")]
    pub shape_type: ShapeType,
    pub parameters: HashMap<String, f64>,
    #[serde(default = "default_xy")]
    pub position: HashMap<String, f64>,
    #[serde(default)]
    pub name: String,
}

impl GeometryShape {
    /// Mirrors the Python validator: rectangle needs `width`/`height` > 0,
    /// circle needs `radius` > 0, ellipse needs `a`/`b` > 0.
    pub fn validate(&self) -> Result<(), String> {
        let get = |k: &str| self.parameters.get(k).copied();
        match self.shape_type {
            ShapeType::Rectangle => match (get("width"), get("height")) {
                (Some(w), Some(h)) if w > 0.0 && h > 0.0 => Ok(()),
                (Some(_), Some(_)) => Err("rectangle width/height must be > 0".to_string()),
                _ => Err("rectangle requires width and height parameters".to_string()),
            },
            ShapeType::Circle => match get("radius") {
                Some(r) if r > 0.0 => Ok(()),
                Some(_) => Err("circle radius must be > 0".to_string()),
                None => Err("circle requires a radius parameter".to_string()),
            },
            ShapeType::Ellipse => match (get("a"), get("b")) {
                (Some(a), Some(b)) if a > 0.0 && b > 0.0 => Ok(()),
                (Some(_), Some(_)) => Err("ellipse a/b must be > 0".to_string()),
                _ => Err("ellipse requires a and b parameters".to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeometryOperation {
    pub op_type: String,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

fn default_units() -> String {
    "m".to_string()
}

fn default_model_name() -> String {
    "geometry_model".to_string()
}

fn default_dimension() -> u8 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryPlan {
    pub shapes: Vec<GeometryShape>,
    #[serde(default = "default_units")]
    pub units: String,
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default)]
    pub operations: Vec<GeometryOperation>,
    #[serde(default = "default_dimension")]
    pub dimension: u8,
}

impl GeometryPlan {
    pub fn validate(&self) -> Result<(), String> {
        if self.shapes.is_empty() {
            return Err("at least one geometry shape is required".to_string());
        }
        for shape in &self.shapes {
            shape.validate()?;
        }
        Ok(())
    }

    pub fn empty(model_name: impl Into<String>) -> Self {
        Self {
            shapes: Vec::new(),
            units: default_units(),
            model_name: model_name.into(),
            operations: Vec::new(),
            dimension: default_dimension(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialProperty {
    pub name: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialDefinition {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub builtin_name: Option<String>,
    #[serde(default)]
    pub properties: Vec<MaterialProperty>,
    #[serde(default = "default_property_group")]
    pub property_group: String,
}

fn default_property_group() -> String {
    "Def".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialAssignment {
    pub material_name: String,
    #[serde(default)]
    pub domain_ids: Vec<i64>,
    #[serde(default)]
    pub assign_all: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialPlan {
    #[serde(default)]
    pub materials: Vec<MaterialDefinition>,
    #[serde(default)]
    pub assignments: Vec<MaterialAssignment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhysicsFieldType {
    Heat,
    Electromagnetic,
    Structural,
    Fluid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsField {
    #[serde(rename = "type")]
    pub field_type: PhysicsFieldType,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhysicsPlan {
    #[serde(default)]
    pub fields: Vec<PhysicsField>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyKind {
    Stationary,
    TimeDependent,
    Eigenvalue,
    Frequency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyType {
    #[serde(rename = "type")]
    pub study_kind: StudyKind,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudyPlan {
    #[serde(default)]
    pub studies: Vec<StudyType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPlan {
    pub geometry: Option<GeometryPlan>,
    pub material: Option<MaterialPlan>,
    pub physics: Option<PhysicsPlan>,
    pub study: Option<StudyPlan>,
}

impl TaskPlan {
    pub fn has_geometry(&self) -> bool {
        self.geometry.is_some()
    }

    pub fn has_material(&self) -> bool {
        self.material.is_some()
    }

    pub fn has_physics(&self) -> bool {
        self.physics.is_some()
    }

    pub fn has_study(&self) -> bool {
        self.study.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangle_requires_positive_width_height() {
        let shape = GeometryShape {
            shape_type: ShapeType::Rectangle,
            parameters: HashMap::from([("width".to_string(), 1.0), ("height".to_string(), 0.0)]),
            position: default_xy(),
            name: String::new(),
        };
        assert!(shape.validate().is_err());
    }

    #[test]
    fn circle_with_radius_is_valid() {
        let shape = GeometryShape {
            shape_type: ShapeType::Circle,
            parameters: HashMap::from([("radius".to_string(), 2.0)]),
            position: default_xy(),
            name: "c1".to_string(),
        };
        assert!(shape.validate().is_ok());
    }

    #[test]
    fn geometry_plan_rejects_empty_shapes() {
        let plan = GeometryPlan::empty("m");
        assert!(plan.validate().is_err());
    }
}
