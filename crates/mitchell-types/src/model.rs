//! Shared data model: requests pulled from job servers, the closed tool set,
//! vehicle descriptions, and the results the agent submits back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The closed set of automotive lookup operations the agent can dispatch.
///
/// `Unknown` is a deserialization fallback for tool names the agent does not
/// recognize; it is never produced by this side and exists only so that a
/// malformed or newer-than-us request deserializes successfully and fails at
/// dispatch time with a `ToolDispatchError`, rather than rejecting the whole
/// poll response.
///
/// Serialized as its bare wire name (a JSON string), not an externally
/// tagged enum, so `Unknown` round-trips through the same representation as
/// the named variants. Implemented by hand rather than derived because the
/// `Unknown(String)` fallback needs to retain the original string, which
/// `#[serde(other)]` cannot do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tool {
    GetFluidCapacities,
    GetDtcInfo,
    GetTorqueSpecs,
    GetResetProcedure,
    GetTsbList,
    GetAdasCalibration,
    GetTireSpecs,
    GetWiringDiagram,
    GetSpecsProcedures,
    GetComponentLocation,
    GetComponentTests,
    LookupVehicle,
    QueryByPlate,
    SearchMitchell,
    QueryMitchell,
    QueryAutonomous,
    Unknown(String),
}

impl Tool {
    /// Returns the wire name of this tool, e.g. `"get_tire_specs"`.
    pub fn as_str(&self) -> &str {
        match self {
            Self::GetFluidCapacities => "get_fluid_capacities",
            Self::GetDtcInfo => "get_dtc_info",
            Self::GetTorqueSpecs => "get_torque_specs",
            Self::GetResetProcedure => "get_reset_procedure",
            Self::GetTsbList => "get_tsb_list",
            Self::GetAdasCalibration => "get_adas_calibration",
            Self::GetTireSpecs => "get_tire_specs",
            Self::GetWiringDiagram => "get_wiring_diagram",
            Self::GetSpecsProcedures => "get_specs_procedures",
            Self::GetComponentLocation => "get_component_location",
            Self::GetComponentTests => "get_component_tests",
            Self::LookupVehicle => "lookup_vehicle",
            Self::QueryByPlate => "query_by_plate",
            Self::SearchMitchell => "search_mitchell",
            Self::QueryMitchell => "query_mitchell",
            Self::QueryAutonomous => "query_autonomous",
            Self::Unknown(name) => name,
        }
    }

    fn from_wire_name(name: &str) -> Self {
        match name {
            "get_fluid_capacities" => Self::GetFluidCapacities,
            "get_dtc_info" => Self::GetDtcInfo,
            "get_torque_specs" => Self::GetTorqueSpecs,
            "get_reset_procedure" => Self::GetResetProcedure,
            "get_tsb_list" => Self::GetTsbList,
            "get_adas_calibration" => Self::GetAdasCalibration,
            "get_tire_specs" => Self::GetTireSpecs,
            "get_wiring_diagram" => Self::GetWiringDiagram,
            "get_specs_procedures" => Self::GetSpecsProcedures,
            "get_component_location" => Self::GetComponentLocation,
            "get_component_tests" => Self::GetComponentTests,
            "lookup_vehicle" => Self::LookupVehicle,
            "query_by_plate" => Self::QueryByPlate,
            "search_mitchell" => Self::SearchMitchell,
            "query_mitchell" => Self::QueryMitchell,
            "query_autonomous" => Self::QueryAutonomous,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Tools that perform their own vehicle navigation and must skip the
    /// Navigator entirely.
    pub fn skips_vehicle_navigation(&self) -> bool {
        matches!(self, Self::LookupVehicle | Self::QueryByPlate)
    }
}

impl Serialize for Tool {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Tool {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_wire_name(&name))
    }
}

/// A vehicle description as supplied by the originating request.
///
/// Optional fields that are absent or empty are filled in by the Navigator
/// via its auto-selection policy, and the chosen values are reported back on
/// [`AgentResult::auto_selected`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleSpec {
    pub year: u16,
    pub make: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submodel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive_type: Option<String>,
}

/// A job unit pulled from a server: identifies the tool to run and the
/// vehicle to run it against.
///
/// `source_server` is attached by the poller after deserialization and is
/// never sent back to any server; `#[serde(skip)]` both omits it from the
/// outgoing submit-result payload and from the struct's `Deserialize` impl
/// (it always starts `None` and must be set explicitly).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub tool: Tool,
    pub vehicle: VehicleSpec,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip)]
    pub source_server: Option<reqwest::Url>,
}

/// The result of executing one [`Request`], ready to submit back to its
/// origin server.
///
/// Named `AgentResult` rather than `Result` to avoid shadowing
/// [`std::result::Result`] at every call site in the workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tool_used: Tool,
    pub execution_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_selected: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
}

impl AgentResult {
    /// Builds a failed result carrying only an error message, with zero
    /// timing — used when a request fails before the Request Handler can
    /// even start its timer (e.g. claim-to-acquire races).
    pub fn failure(tool_used: Tool, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            tool_used,
            execution_time_ms: 0,
            images: None,
            auto_selected: None,
            tokens_used: None,
        }
    }
}

/// A vehicle-selection goal parsed from the non-empty fields of a
/// [`VehicleSpec`], joined into free text for the Navigator to walk through
/// the portal's selector tabs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleGoal {
    pub year: u16,
    pub make: String,
    pub model: String,
    pub engine: Option<String>,
    pub submodel: Option<String>,
    pub body_style: Option<String>,
    pub drive_type: Option<String>,
    /// The original free-text goal string this was parsed from.
    pub raw: String,
}

/// One unresolved portal option the Navigator could not pick unambiguously
/// without more information from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clarification {
    pub option_name: String,
    pub available_values: Vec<String>,
    pub message: String,
}

/// Outcome of running the Navigator against one [`VehicleGoal`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NavigationResult {
    pub success: bool,
    pub error: Option<String>,
    pub clarifications: Vec<Clarification>,
    pub auto_selected: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_round_trips_through_json() {
        let json = serde_json::to_value(Tool::GetTireSpecs).unwrap();
        assert_eq!(json, serde_json::json!("get_tire_specs"));

        let parsed: Tool = serde_json::from_value(serde_json::json!("get_tire_specs")).unwrap();
        assert_eq!(parsed, Tool::GetTireSpecs);
    }

    #[test]
    fn unrecognized_tool_name_falls_back_to_unknown() {
        let parsed: Tool = serde_json::from_value(serde_json::json!("not_a_real_tool")).unwrap();
        assert_eq!(parsed, Tool::Unknown("not_a_real_tool".to_string()));
    }

    #[test]
    fn plate_lookup_tools_skip_navigation() {
        assert!(Tool::LookupVehicle.skips_vehicle_navigation());
        assert!(Tool::QueryByPlate.skips_vehicle_navigation());
        assert!(!Tool::GetTireSpecs.skips_vehicle_navigation());
    }

    #[test]
    fn source_server_is_never_serialized() {
        let mut req = Request {
            id: "x1".to_string(),
            tool: Tool::GetTireSpecs,
            vehicle: VehicleSpec {
                year: 2018,
                make: "Ford".to_string(),
                model: "F-150".to_string(),
                engine: Some("5.0L".to_string()),
                submodel: None,
                body_style: None,
                drive_type: None,
            },
            params: serde_json::json!({}),
            user_id: None,
            source_server: None,
        };
        req.source_server = Some(reqwest::Url::parse("https://shop.example/").unwrap());

        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("source_server").is_none());
    }
}
