//! The Reasoner tool schema from §4.4.3: a planned fallback for the Options
//! phase, kept behind [`crate::navigator::Navigator`]'s deterministic path.
//! The deterministic algorithm in [`crate::phase1`]/[`crate::phase2`] is
//! authoritative; this module exists so that path has somewhere to escalate
//! to without the rest of the crate depending on any particular reasoner
//! backend.

use mitchell_reasoner::{Decision, ToolSchema};
use serde_json::json;

use crate::error::NavError;

/// One tool call the Reasoner can choose to make in response to the current
/// selector state. Only one per step, per §4.4.3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavAction {
    SelectYear(String),
    SelectMake(String),
    SelectModel(String),
    SelectEngine(String),
    SelectSubmodel(String),
    SelectBodyStyle(String),
    SelectDriveType(String),
    RequestInfo { option_name: String, message: String },
    ConfirmVehicle,
    Done,
}

fn string_param(schema_name: &str, description: &str) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            schema_name: { "type": "string", "description": description }
        },
        "required": [schema_name]
    })
}

/// The 10 tools a reasoner may call while driving the Options phase.
pub fn schema() -> Vec<ToolSchema> {
    vec![
        ToolSchema {
            name: "select_year".to_string(),
            description: "Select the vehicle's model year".to_string(),
            parameters: string_param("year", "The 4-digit model year"),
        },
        ToolSchema {
            name: "select_make".to_string(),
            description: "Select the vehicle's make".to_string(),
            parameters: string_param("make", "The vehicle make, e.g. 'Ford'"),
        },
        ToolSchema {
            name: "select_model".to_string(),
            description: "Select the vehicle's model".to_string(),
            parameters: string_param("model", "The vehicle model, e.g. 'F-150'"),
        },
        ToolSchema {
            name: "select_engine".to_string(),
            description: "Select the vehicle's engine".to_string(),
            parameters: string_param("engine", "The engine displacement, e.g. '5.0L'"),
        },
        ToolSchema {
            name: "select_submodel".to_string(),
            description: "Select the vehicle's submodel/trim".to_string(),
            parameters: string_param("submodel", "The submodel or trim, e.g. 'XLT'"),
        },
        ToolSchema {
            name: "select_body_style".to_string(),
            description: "Select the vehicle's body style".to_string(),
            parameters: string_param("body_style", "The body style, e.g. '4D Pickup Crew Cab'"),
        },
        ToolSchema {
            name: "select_drive_type".to_string(),
            description: "Select the vehicle's drive type".to_string(),
            parameters: string_param("drive_type", "The drive type, e.g. '4WD' or 'RWD'"),
        },
        ToolSchema {
            name: "request_info".to_string(),
            description: "Ask the caller to disambiguate an option the reasoner cannot resolve".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "option_name": { "type": "string" },
                    "available_values": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "List of available options to choose from"
                    },
                    "message": { "type": "string" }
                },
                "required": ["option_name", "available_values", "message"]
            }),
        },
        ToolSchema {
            name: "confirm_vehicle".to_string(),
            description: "Confirm the vehicle selection after all options are selected".to_string(),
            parameters: json!({ "type": "object", "properties": {} }),
        },
        ToolSchema {
            name: "done".to_string(),
            description: "Report that the selector has already closed".to_string(),
            parameters: json!({ "type": "object", "properties": {} }),
        },
    ]
}

/// Translates a reasoner [`Decision`] into a [`NavAction`], validating the
/// tool name and argument shape. An unrecognized tool name or a missing
/// required argument is itself a navigation failure — the reasoner is
/// expected to only ever pick from [`schema`].
pub fn interpret(decision: &Decision) -> Result<NavAction, NavError> {
    let Decision::ToolCall { name, arguments } = decision else {
        return Err(NavError::Fail("reasoner returned text instead of a tool call".to_string()));
    };

    let str_arg = |key: &str| -> Result<String, NavError> {
        arguments
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| NavError::Fail(format!("tool '{name}' missing required argument '{key}'")))
    };

    match name.as_str() {
        "select_year" => Ok(NavAction::SelectYear(str_arg("year")?)),
        "select_make" => Ok(NavAction::SelectMake(str_arg("make")?)),
        "select_model" => Ok(NavAction::SelectModel(str_arg("model")?)),
        "select_engine" => Ok(NavAction::SelectEngine(str_arg("engine")?)),
        "select_submodel" => Ok(NavAction::SelectSubmodel(str_arg("submodel")?)),
        "select_body_style" => Ok(NavAction::SelectBodyStyle(str_arg("body_style")?)),
        "select_drive_type" => Ok(NavAction::SelectDriveType(str_arg("drive_type")?)),
        "request_info" => Ok(NavAction::RequestInfo {
            option_name: str_arg("option_name")?,
            message: str_arg("message")?,
        }),
        "confirm_vehicle" => Ok(NavAction::ConfirmVehicle),
        "done" => Ok(NavAction::Done),
        other => Err(NavError::Fail(format!("reasoner called unknown tool '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_has_ten_tools() {
        assert_eq!(schema().len(), 10);
    }

    #[test]
    fn interprets_select_body_style_call() {
        let decision = Decision::ToolCall {
            name: "select_body_style".to_string(),
            arguments: json!({ "body_style": "4D Pickup" }),
        };
        assert_eq!(
            interpret(&decision).unwrap(),
            NavAction::SelectBodyStyle("4D Pickup".to_string())
        );
    }

    #[test]
    fn missing_argument_fails_descriptively() {
        let decision = Decision::ToolCall { name: "select_make".to_string(), arguments: json!({}) };
        let err = interpret(&decision).unwrap_err();
        assert!(matches!(err, NavError::Fail(msg) if msg.contains("select_make") && msg.contains("make")));
    }

    #[test]
    fn unknown_tool_name_fails() {
        let decision = Decision::ToolCall { name: "teleport".to_string(), arguments: json!({}) };
        assert!(interpret(&decision).is_err());
    }

    #[test]
    fn text_response_is_not_a_valid_step() {
        let decision = Decision::Text("I'm not sure what to do".to_string());
        assert!(interpret(&decision).is_err());
    }
}
