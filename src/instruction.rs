//! Edit instructions: the structured output of both the AI path and the
//! rule-based fallback path.
//!
//! On the wire an instruction is a flat JSON record:
//!
//! ```json
//! { "action": "filter", "parameters": { "type": "grayscale" },
//!   "explanation": "Convert to black and white",
//!   "usedFallback": true, "fallbackReason": "AI service temporarily unavailable" }
//! ```
//!
//! In Rust the `action`/`parameters` pair is one [`EditOperation`] so that
//! parameters are always the shape their action requires. Deserialisation
//! goes through a loose wire struct and then validates, which is how
//! untrusted model output is turned into something the image executor can
//! run without further inference.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// The closed set of edit actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditAction {
    Resize,
    Crop,
    Enhance,
    Filter,
    Transform,
}

impl EditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditAction::Resize => "resize",
            EditAction::Crop => "crop",
            EditAction::Enhance => "enhance",
            EditAction::Filter => "filter",
            EditAction::Transform => "transform",
        }
    }
}

impl fmt::Display for EditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Parameters ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFit {
    Cover,
    Contain,
    Fill,
    Inside,
    Outside,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResizeParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<ResizeFit>,
}

/// A `W:H` aspect ratio such as `16:9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub const WIDE: AspectRatio = AspectRatio { width: 16, height: 9 };
    pub const STANDARD: AspectRatio = AspectRatio { width: 4, height: 3 };
    pub const SQUARE: AspectRatio = AspectRatio { width: 1, height: 1 };
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("aspect ratio '{s}' is not W:H"))?;
        let width: u32 = w.trim().parse().map_err(|_| format!("bad ratio width '{w}'"))?;
        let height: u32 = h.trim().parse().map_err(|_| format!("bad ratio height '{h}'"))?;
        if width == 0 || height == 0 {
            return Err(format!("aspect ratio '{s}' has a zero side"));
        }
        Ok(Self { width, height })
    }
}

impl TryFrom<String> for AspectRatio {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AspectRatio> for String {
    fn from(r: AspectRatio) -> Self {
        r.to_string()
    }
}

/// Either an explicit rectangle or a named aspect ratio (centre crop).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CropParams {
    Rect {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    Aspect {
        #[serde(rename = "aspectRatio")]
        aspect_ratio: AspectRatio,
    },
}

/// Multipliers are relative to the original (1.0 = unchanged).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnhanceParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contrast: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturation: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharpen: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Grayscale,
    Sepia,
    Blur,
    Vintage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterParams {
    #[serde(rename = "type")]
    pub kind: FilterKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlipAxis {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransformParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flip: Option<FlipAxis>,
}

/// An action together with parameters of the matching shape.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOperation {
    Resize(ResizeParams),
    Crop(CropParams),
    Enhance(EnhanceParams),
    Filter(FilterParams),
    Transform(TransformParams),
}

impl EditOperation {
    pub fn action(&self) -> EditAction {
        match self {
            EditOperation::Resize(_) => EditAction::Resize,
            EditOperation::Crop(_) => EditAction::Crop,
            EditOperation::Enhance(_) => EditAction::Enhance,
            EditOperation::Filter(_) => EditAction::Filter,
            EditOperation::Transform(_) => EditAction::Transform,
        }
    }

    pub fn filter(kind: FilterKind) -> Self {
        EditOperation::Filter(FilterParams { kind })
    }

    /// Reject parameter sets the executor could not act on.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            EditOperation::Resize(p) => {
                if p.width.is_none() && p.height.is_none() {
                    return Err("resize needs a width or a height".into());
                }
                if p.width == Some(0) || p.height == Some(0) {
                    return Err("resize dimensions must be positive".into());
                }
            }
            EditOperation::Crop(CropParams::Rect { width, height, .. }) => {
                if *width == 0 || *height == 0 {
                    return Err("crop rectangle must be non-empty".into());
                }
            }
            EditOperation::Crop(CropParams::Aspect { .. }) | EditOperation::Filter(_) => {}
            EditOperation::Enhance(p) => {
                let factors = [p.brightness, p.contrast, p.saturation];
                if factors.iter().all(Option::is_none) && p.sharpen.is_none() {
                    return Err("enhance needs at least one adjustment".into());
                }
                if factors.iter().flatten().any(|f| !f.is_finite() || *f <= 0.0) {
                    return Err("enhance multipliers must be positive".into());
                }
            }
            EditOperation::Transform(p) => {
                if p.rotate.is_none() && p.flip.is_none() {
                    return Err("transform needs rotate or flip".into());
                }
            }
        }
        Ok(())
    }

    fn parameters_value(&self) -> Value {
        let v = match self {
            EditOperation::Resize(p) => serde_json::to_value(p),
            EditOperation::Crop(p) => serde_json::to_value(p),
            EditOperation::Enhance(p) => serde_json::to_value(p),
            EditOperation::Filter(p) => serde_json::to_value(p),
            EditOperation::Transform(p) => serde_json::to_value(p),
        };
        v.unwrap_or_default()
    }

    fn from_parts(action: EditAction, parameters: Value) -> Result<Self, String> {
        let parameters = match parameters {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let bad = |e: serde_json::Error| format!("invalid {action} parameters: {e}");
        let op = match action {
            EditAction::Resize => EditOperation::Resize(serde_json::from_value(parameters).map_err(bad)?),
            EditAction::Crop => EditOperation::Crop(serde_json::from_value(parameters).map_err(bad)?),
            EditAction::Enhance => EditOperation::Enhance(serde_json::from_value(parameters).map_err(bad)?),
            EditAction::Filter => EditOperation::Filter(serde_json::from_value(parameters).map_err(bad)?),
            EditAction::Transform => {
                EditOperation::Transform(serde_json::from_value(parameters).map_err(bad)?)
            }
        };
        op.validate()?;
        Ok(op)
    }
}

// ── Instruction ──────────────────────────────────────────────────────────

/// A single, executor-ready edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireInstruction", into = "WireInstruction")]
pub struct EditInstruction {
    pub operation: EditOperation,
    pub explanation: String,
    /// Set when the rule-based extractor produced this instead of the model.
    pub used_fallback: bool,
    pub fallback_reason: Option<String>,
}

impl EditInstruction {
    pub fn new(operation: EditOperation, explanation: impl Into<String>) -> Self {
        Self {
            operation,
            explanation: explanation.into(),
            used_fallback: false,
            fallback_reason: None,
        }
    }

    /// Tag as produced by the rule-based path.
    pub fn with_fallback(mut self, reason: impl Into<String>) -> Self {
        self.used_fallback = true;
        self.fallback_reason = Some(reason.into());
        self
    }

    pub fn action(&self) -> EditAction {
        self.operation.action()
    }

    /// The `parameters` object exactly as it appears on the wire.
    pub fn parameters(&self) -> Value {
        self.operation.parameters_value()
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Serialize, Deserialize)]
struct WireInstruction {
    action: EditAction,
    #[serde(default)]
    parameters: Value,
    #[serde(default)]
    explanation: String,
    #[serde(rename = "usedFallback", default, skip_serializing_if = "is_false")]
    used_fallback: bool,
    #[serde(rename = "fallbackReason", default, skip_serializing_if = "Option::is_none")]
    fallback_reason: Option<String>,
}

impl TryFrom<WireInstruction> for EditInstruction {
    type Error = String;

    fn try_from(w: WireInstruction) -> Result<Self, Self::Error> {
        Ok(Self {
            operation: EditOperation::from_parts(w.action, w.parameters)?,
            explanation: w.explanation,
            used_fallback: w.used_fallback,
            fallback_reason: w.fallback_reason,
        })
    }
}

impl From<EditInstruction> for WireInstruction {
    fn from(i: EditInstruction) -> Self {
        Self {
            action: i.operation.action(),
            parameters: i.operation.parameters_value(),
            explanation: i.explanation,
            used_fallback: i.used_fallback,
            fallback_reason: i.fallback_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_serialises_flat() {
        let i = EditInstruction::new(EditOperation::filter(FilterKind::Grayscale), "bw");
        let v = serde_json::to_value(&i).unwrap();
        assert_eq!(v, json!({"action": "filter", "parameters": {"type": "grayscale"}, "explanation": "bw"}));
    }

    #[test]
    fn fallback_fields_use_camel_case() {
        let i = EditInstruction::new(EditOperation::filter(FilterKind::Sepia), "old")
            .with_fallback("AI service temporarily unavailable");
        let v = serde_json::to_value(&i).unwrap();
        assert_eq!(v["usedFallback"], true);
        assert_eq!(v["fallbackReason"], "AI service temporarily unavailable");
    }

    #[test]
    fn parses_model_output() {
        let i: EditInstruction = serde_json::from_value(json!({
            "action": "transform",
            "parameters": {"rotate": 90},
            "explanation": "Rotate a quarter turn"
        }))
        .unwrap();
        assert_eq!(i.action(), EditAction::Transform);
        assert_eq!(
            i.operation,
            EditOperation::Transform(TransformParams { rotate: Some(90), flip: None })
        );
        assert!(!i.used_fallback);
    }

    #[test]
    fn crop_accepts_rect_or_ratio() {
        let rect: EditInstruction = serde_json::from_value(json!({
            "action": "crop", "parameters": {"x": 0, "y": 10, "width": 100, "height": 50}
        }))
        .unwrap();
        assert!(matches!(rect.operation, EditOperation::Crop(CropParams::Rect { y: 10, .. })));

        let ratio: EditInstruction = serde_json::from_value(json!({
            "action": "crop", "parameters": {"aspectRatio": "16:9"}
        }))
        .unwrap();
        assert_eq!(
            ratio.operation,
            EditOperation::Crop(CropParams::Aspect { aspect_ratio: AspectRatio::WIDE })
        );
    }

    #[test]
    fn rejects_unknown_action() {
        let r: Result<EditInstruction, _> =
            serde_json::from_value(json!({"action": "teleport", "parameters": {}}));
        assert!(r.is_err());
    }

    #[test]
    fn rejects_mismatched_parameters() {
        let r: Result<EditInstruction, _> =
            serde_json::from_value(json!({"action": "filter", "parameters": {"type": "neon"}}));
        assert!(r.is_err());
        let r: Result<EditInstruction, _> =
            serde_json::from_value(json!({"action": "resize", "parameters": {}}));
        assert!(r.is_err());
        let r: Result<EditInstruction, _> =
            serde_json::from_value(json!({"action": "enhance", "parameters": {"contrast": -1.0}}));
        assert!(r.is_err());
    }

    #[test]
    fn aspect_ratio_parsing() {
        assert_eq!("4:3".parse::<AspectRatio>().unwrap(), AspectRatio::STANDARD);
        assert!("4x3".parse::<AspectRatio>().is_err());
        assert!("0:3".parse::<AspectRatio>().is_err());
        assert_eq!(AspectRatio::SQUARE.to_string(), "1:1");
    }

    #[test]
    fn parameters_value_matches_wire() {
        let i = EditInstruction::new(
            EditOperation::Enhance(EnhanceParams {
                contrast: Some(1.2),
                sharpen: Some(true),
                ..Default::default()
            }),
            "",
        );
        let p = i.parameters();
        assert_eq!(p["sharpen"], true);
        assert!(p.get("brightness").is_none());
    }
}
