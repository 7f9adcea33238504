//! Rule-based intent extraction: free-text instruction → [`EditInstruction`].
//!
//! Used when the model cannot be reached, or answered with something that is
//! not a usable instruction. Deterministic and infallible.
//!
//! ## Rule Order
//!
//! Prompts routinely match several rules ("make it brighter and black and
//! white"). The first matching rule wins, so the order of [`RULES`] is part of
//! the behaviour:
//!
//! 1. grayscale / black and white
//! 2. sepia / vintage
//! 3. blur
//! 4. vibrant / saturate
//! 5. bright / lighten
//! 6. dark / dim
//! 7. sharpen / detail
//! 8. contrast
//! 9. rotate (optional degrees)
//! 10. flip / mirror (optional axis)
//! 11. aspect ratios 16:9, 4:3, 1:1
//! 12. warm / golden
//!
//! No match yields a general enhancement.

use crate::instruction::{
    AspectRatio, CropParams, EditInstruction, EditOperation, EnhanceParams, FilterKind, FlipAxis,
    TransformParams,
};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

/// Reason attached when the model could not be reached at all.
pub const SERVICE_UNAVAILABLE_REASON: &str = "AI service temporarily unavailable";

/// Reason attached when the model answered without a usable instruction.
pub const UNINTERPRETABLE_REASON: &str = "AI response could not be interpreted";

/// One entry of the priority table: a pattern and the instruction it yields.
pub struct IntentRule {
    pub name: &'static str,
    pattern: Regex,
    build: fn(&Captures<'_>) -> EditInstruction,
}

impl IntentRule {
    fn new(name: &'static str, pattern: &str, build: fn(&Captures<'_>) -> EditInstruction) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).unwrap(),
            build,
        }
    }

    /// Apply this rule to an already lower-cased prompt.
    pub fn apply(&self, prompt: &str) -> Option<EditInstruction> {
        self.pattern.captures(prompt).map(|caps| (self.build)(&caps))
    }
}

fn enhance(params: EnhanceParams, explanation: &str) -> EditInstruction {
    EditInstruction::new(EditOperation::Enhance(params), explanation)
}

fn transform(params: TransformParams, explanation: String) -> EditInstruction {
    EditInstruction::new(EditOperation::Transform(params), explanation)
}

/// The priority-ordered rule table.
pub static RULES: Lazy<Vec<IntentRule>> = Lazy::new(|| {
    vec![
        IntentRule::new(
            "grayscale",
            r"gr[ae]yscale|black\s*(?:and|&)\s*white|\bb\s*&\s*w\b|monochrome",
            |_| {
                EditInstruction::new(
                    EditOperation::filter(FilterKind::Grayscale),
                    "Convert the image to grayscale",
                )
            },
        ),
        IntentRule::new("sepia", r"(sepia)|vintage|retro", |caps| {
            if caps.get(1).is_some() {
                EditInstruction::new(EditOperation::filter(FilterKind::Sepia), "Apply a sepia tone")
            } else {
                EditInstruction::new(
                    EditOperation::filter(FilterKind::Vintage),
                    "Apply a vintage look",
                )
            }
        }),
        IntentRule::new("blur", r"blur", |_| {
            EditInstruction::new(EditOperation::filter(FilterKind::Blur), "Blur the image")
        }),
        IntentRule::new("saturate", r"vibran|saturat|colou?rful", |_| {
            enhance(
                EnhanceParams {
                    saturation: Some(1.5),
                    ..Default::default()
                },
                "Boost colour saturation",
            )
        }),
        IntentRule::new("brighten", r"bright|lighten|lighter", |_| {
            enhance(
                EnhanceParams {
                    brightness: Some(1.3),
                    ..Default::default()
                },
                "Increase brightness",
            )
        }),
        IntentRule::new("darken", r"\bdark|\bdim(?:m\w*)?\b", |_| {
            enhance(
                EnhanceParams {
                    brightness: Some(0.7),
                    ..Default::default()
                },
                "Decrease brightness",
            )
        }),
        IntentRule::new("sharpen", r"sharp|detail", |_| {
            enhance(
                EnhanceParams {
                    sharpen: Some(true),
                    ..Default::default()
                },
                "Sharpen details",
            )
        }),
        IntentRule::new("contrast", r"contrast", |_| {
            enhance(
                EnhanceParams {
                    contrast: Some(1.4),
                    ..Default::default()
                },
                "Increase contrast",
            )
        }),
        // Degrees either follow the verb directly ("rotate it by 45") or
        // carry a unit ("rotate so it's 45 degrees"); other numbers are ignored.
        IntentRule::new(
            "rotate",
            r"rotat\w*(?:(?:\s+(?:it|this|the|image|photo|picture|by))*\s+(-?\d{1,3})\b|.*?(-?\d{1,3})\s*(?:°|deg))?",
            |caps| {
                let degrees = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .and_then(|m| m.as_str().parse::<i32>().ok())
                    .unwrap_or(90);
                transform(
                    TransformParams {
                        rotate: Some(degrees),
                        flip: None,
                    },
                    format!("Rotate {degrees} degrees"),
                )
            },
        ),
        IntentRule::new(
            "flip",
            r"(?:flip|mirror)\w*(?:.*?\b(horizontal|vertical|upside))?",
            |caps| {
                let axis = match caps.get(1).map(|m| m.as_str()) {
                    Some("vertical") | Some("upside") => FlipAxis::Vertical,
                    _ => FlipAxis::Horizontal,
                };
                let name = match axis {
                    FlipAxis::Horizontal => "horizontally",
                    FlipAxis::Vertical => "vertically",
                };
                transform(
                    TransformParams {
                        rotate: None,
                        flip: Some(axis),
                    },
                    format!("Flip {name}"),
                )
            },
        ),
        IntentRule::new(
            "aspect_ratio",
            r"(16\s*:\s*9|widescreen)|(4\s*:\s*3)|(1\s*:\s*1|square)",
            |caps| {
                let ratio = if caps.get(1).is_some() {
                    AspectRatio::WIDE
                } else if caps.get(2).is_some() {
                    AspectRatio::STANDARD
                } else {
                    AspectRatio::SQUARE
                };
                EditInstruction::new(
                    EditOperation::Crop(CropParams::Aspect { aspect_ratio: ratio }),
                    format!("Crop to {ratio} aspect ratio"),
                )
            },
        ),
        IntentRule::new("warm", r"warm|golden", |_| {
            enhance(
                EnhanceParams {
                    brightness: Some(1.1),
                    saturation: Some(1.3),
                    ..Default::default()
                },
                "Add warm, golden tones",
            )
        }),
    ]
});

/// The instruction used when no rule matches.
pub fn default_instruction() -> EditInstruction {
    enhance(
        EnhanceParams {
            contrast: Some(1.2),
            saturation: Some(1.2),
            sharpen: Some(true),
            ..Default::default()
        },
        "Apply a general enhancement",
    )
}

/// Map a free-text prompt to an edit instruction. First matching rule wins.
pub fn classify(prompt: &str) -> EditInstruction {
    let lower = prompt.to_lowercase();
    for rule in RULES.iter() {
        if let Some(instruction) = rule.apply(&lower) {
            debug!("Fallback rule '{}' matched", rule.name);
            return instruction;
        }
    }
    debug!("No fallback rule matched; using general enhancement");
    default_instruction()
}

/// [`classify`] tagged as a degraded result with `reason`.
pub fn degraded(prompt: &str, reason: &str) -> EditInstruction {
    classify(prompt).with_fallback(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::EditAction;
    use serde_json::json;

    fn params(prompt: &str) -> serde_json::Value {
        classify(prompt).parameters()
    }

    #[test]
    fn black_and_white_is_grayscale() {
        let i = classify("convert to black and white");
        assert_eq!(i.action(), EditAction::Filter);
        assert_eq!(i.parameters(), json!({"type": "grayscale"}));
        assert!(!i.used_fallback);
    }

    #[test]
    fn rotate_captures_degrees() {
        let i = classify("rotate this 90 degrees");
        assert_eq!(i.action(), EditAction::Transform);
        assert_eq!(i.parameters(), json!({"rotate": 90}));
        assert_eq!(params("Rotate it by 180"), json!({"rotate": 180}));
        assert_eq!(params("please rotate"), json!({"rotate": 90}));
        assert_eq!(params("rotate the photo by 45°"), json!({"rotate": 45}));
        assert_eq!(params("rotate so it sits at 270 degrees"), json!({"rotate": 270}));
    }

    #[test]
    fn rotate_ignores_unrelated_numbers() {
        assert_eq!(params("rotate it and then crop to 16:9"), json!({"rotate": 90}));
        assert_eq!(params("rotate it twice, 2 times"), json!({"rotate": 90}));
    }

    #[test]
    fn empty_and_unmatched_prompts_get_default() {
        assert_eq!(classify(""), default_instruction());
        assert_eq!(classify("make it look nice"), default_instruction());
        assert_eq!(
            default_instruction().parameters(),
            json!({"contrast": 1.2f32, "saturation": 1.2f32, "sharpen": true})
        );
    }

    #[test]
    fn priority_order_breaks_ties() {
        // grayscale beats brightness
        assert_eq!(params("make it brighter and black and white"), json!({"type": "grayscale"}));
        // blur beats rotate
        assert_eq!(params("rotate 90 and blur"), json!({"type": "blur"}));
        // contrast beats flip
        assert_eq!(params("flip it and add contrast"), json!({"contrast": 1.4f32}));
        // sepia beats warm
        assert_eq!(params("warm sepia tone"), json!({"type": "sepia"}));
    }

    #[test]
    fn sepia_and_vintage() {
        assert_eq!(params("Sepia please"), json!({"type": "sepia"}));
        assert_eq!(params("give it a vintage feel"), json!({"type": "vintage"}));
    }

    #[test]
    fn brightness_rules() {
        assert_eq!(params("lighten the photo"), json!({"brightness": 1.3f32}));
        assert_eq!(params("darken it"), json!({"brightness": 0.7f32}));
        assert_eq!(params("a bit dim please"), json!({"brightness": 0.7f32}));
        assert_eq!(params("make it dimmed"), json!({"brightness": 0.7f32}));
        assert_eq!(params("try dimming the highlights"), json!({"brightness": 0.7f32}));
        // "dimension" is not "dim"
        assert_eq!(classify("keep the dimension"), default_instruction());
    }

    #[test]
    fn flip_axes() {
        assert_eq!(params("mirror the image"), json!({"flip": "horizontal"}));
        assert_eq!(params("flip it vertically"), json!({"flip": "vertical"}));
        assert_eq!(params("flip upside down"), json!({"flip": "vertical"}));
    }

    #[test]
    fn aspect_ratios() {
        assert_eq!(params("crop to 16:9"), json!({"aspectRatio": "16:9"}));
        assert_eq!(params("crop to 4:3"), json!({"aspectRatio": "4:3"}));
        assert_eq!(params("make it square"), json!({"aspectRatio": "1:1"}));
    }

    #[test]
    fn warm_tones() {
        let i = classify("golden hour look");
        assert_eq!(i.action(), EditAction::Enhance);
        assert_eq!(i.parameters()["saturation"], json!(1.3f32));
    }

    #[test]
    fn degraded_is_tagged() {
        let i = degraded("blur the background", SERVICE_UNAVAILABLE_REASON);
        assert!(i.used_fallback);
        assert_eq!(i.fallback_reason.as_deref(), Some(SERVICE_UNAVAILABLE_REASON));
        assert_eq!(i.parameters(), json!({"type": "blur"}));
    }

    #[test]
    fn deterministic() {
        for p in ["sharpen details", "saturate", "", "rotate -45"] {
            assert_eq!(classify(p), classify(p));
        }
        assert_eq!(params("rotate -45"), json!({"rotate": -45}));
    }

    #[test]
    fn every_rule_produces_a_valid_instruction() {
        for prompt in [
            "grayscale", "sepia", "blur", "vibrant", "bright", "dark", "sharpen", "contrast",
            "rotate 30", "flip", "16:9", "warm",
        ] {
            assert!(classify(prompt).operation.validate().is_ok(), "{prompt}");
        }
        assert_eq!(RULES.len(), 12);
    }
}
