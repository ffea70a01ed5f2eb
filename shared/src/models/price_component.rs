//! Service price components
//!
//! A service's price widget is built from typed components. The component
//! config is stored as JSON; its shape depends on the component type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, ErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceComponentKind {
    /// Range slider with one or several step breakpoints
    Bar,
    /// Single choice among priced boxes
    Box,
    /// Free amount input with optional presets
    Custom,
    /// Named dropdowns of priced options
    Selectors,
    /// Checkbox group of priced extras
    Additional,
}

impl PriceComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::Box => "box",
            Self::Custom => "custom",
            Self::Selectors => "selectors",
            Self::Additional => "additional",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bar" => Some(Self::Bar),
            "box" => Some(Self::Box),
            "custom" => Some(Self::Custom),
            "selectors" => Some(Self::Selectors),
            "additional" => Some(Self::Additional),
            _ => None,
        }
    }
}

/// Stored price component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceComponent {
    pub id: i64,
    pub service_id: i64,
    #[serde(rename = "type")]
    pub kind: PriceComponentKind,
    pub config: Value,
    pub position: i32,
}

/// Price component as submitted with a service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceComponentInput {
    #[serde(rename = "type")]
    pub kind: PriceComponentKind,
    pub config: Value,
}

fn invalid(kind: PriceComponentKind, msg: impl Into<String>) -> AppError {
    AppError::with_message(ErrorCode::InvalidPriceComponent, msg).with_detail("type", kind.as_str())
}

fn require_object(
    kind: PriceComponentKind,
    value: &Value,
) -> Result<&Map<String, Value>, AppError> {
    value
        .as_object()
        .ok_or_else(|| invalid(kind, "config must be a JSON object"))
}

fn require_number(
    kind: PriceComponentKind,
    obj: &Map<String, Value>,
    key: &str,
) -> Result<f64, AppError> {
    obj.get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| invalid(kind, format!("{key} must be a number")))
}

fn require_label(kind: PriceComponentKind, obj: &Map<String, Value>) -> Result<(), AppError> {
    match obj.get("label").and_then(Value::as_str) {
        Some(label) if !label.trim().is_empty() => Ok(()),
        _ => Err(invalid(kind, "label must be a non-empty string")),
    }
}

/// `[{label, value}, ...]`, at least one entry
fn validate_options(
    kind: PriceComponentKind,
    value: Option<&Value>,
    what: &str,
) -> Result<(), AppError> {
    let options = value
        .and_then(Value::as_array)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| invalid(kind, format!("{what} must be a non-empty list")))?;
    for option in options {
        let obj = require_object(kind, option)?;
        require_label(kind, obj)?;
        require_number(kind, obj, "value")?;
    }
    Ok(())
}

impl PriceComponentInput {
    /// Check that `config` has the shape its type expects
    pub fn validate(&self) -> Result<(), AppError> {
        let kind = self.kind;
        let obj = require_object(kind, &self.config)?;
        match kind {
            PriceComponentKind::Bar => {
                let mode = obj.get("mode").and_then(Value::as_str).unwrap_or("simple");
                match mode {
                    "simple" => {
                        let init = require_number(kind, obj, "initValue")?;
                        let fin = require_number(kind, obj, "finalValue")?;
                        let step = require_number(kind, obj, "step")?;
                        if init >= fin {
                            return Err(invalid(kind, "initValue must be below finalValue"));
                        }
                        if step <= 0.0 {
                            return Err(invalid(kind, "step must be positive"));
                        }
                    }
                    "breakpoints" => {
                        let breakpoints = obj
                            .get("breakpoints")
                            .and_then(Value::as_array)
                            .filter(|a| !a.is_empty())
                            .ok_or_else(|| invalid(kind, "breakpoints must be a non-empty list"))?;
                        for bp in breakpoints {
                            let bp = require_object(kind, bp)?;
                            require_number(kind, bp, "initValue")?;
                            require_number(kind, bp, "finalValue")?;
                            require_number(kind, bp, "step")?;
                        }
                    }
                    other => return Err(invalid(kind, format!("unknown bar mode '{other}'"))),
                }
            }
            PriceComponentKind::Box => validate_options(kind, obj.get("options"), "options")?,
            PriceComponentKind::Custom => {
                require_label(kind, obj)?;
                if let Some(presets) = obj.get("presets") {
                    let all_numbers = presets
                        .as_array()
                        .is_some_and(|a| a.iter().all(Value::is_number));
                    if !all_numbers {
                        return Err(invalid(kind, "presets must be a list of numbers"));
                    }
                }
            }
            PriceComponentKind::Selectors => {
                if obj.is_empty() {
                    return Err(invalid(kind, "at least one selector is required"));
                }
                for (title, options) in obj {
                    validate_options(kind, Some(options), title)?;
                }
            }
            PriceComponentKind::Additional => {
                let mut count = 0;
                for (key, option) in obj {
                    if key == "title" {
                        continue;
                    }
                    let option = require_object(kind, option)?;
                    require_label(kind, option)?;
                    require_number(kind, option, "value")?;
                    count += 1;
                }
                if count == 0 {
                    return Err(invalid(kind, "at least one option is required"));
                }
            }
        }
        Ok(())
    }
}
