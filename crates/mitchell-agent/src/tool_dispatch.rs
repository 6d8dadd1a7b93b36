//! Tool dispatch: maps a closed [`Tool`] name onto a concrete portal
//! extraction, special-casing `query_by_plate`'s lookup-then-dispatch
//! recursion.
//!
//! Grounded in the original agent's `_execute_tool`/`_execute_query_by_plate`
//! (`request_handler.py`): this module is the table-lookup half of that
//! function, generalized onto [`PortalTools`] so it can be exercised in
//! tests against a fake rather than a real browser — the same reason
//! `mitchell_navigator::PortalView` exists as a trait rather than a concrete
//! `thirtyfour` type.

use async_trait::async_trait;
use futures::future::BoxFuture;
use mitchell_types::{Error, ErrorKind, Result, Tool, VehicleSpec};
use serde_json::Value;

fn param_str(params: &Value, key: &str) -> Option<String> {
    params.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Everything the tool dispatcher needs from a live portal session once a
/// vehicle is on-screen (or, for `lookup_vehicle`/`query_by_plate`,
/// without one).
#[async_trait]
pub trait PortalTools: Send + Sync {
    async fn get_fluid_capacities(&self, vehicle: &VehicleSpec, fluid_type: Option<&str>) -> Result<Value>;
    async fn get_dtc_info(&self, vehicle: &VehicleSpec, dtc_code: Option<&str>) -> Result<Value>;
    async fn get_torque_specs(&self, vehicle: &VehicleSpec, component: Option<&str>) -> Result<Value>;
    async fn get_reset_procedure(&self, vehicle: &VehicleSpec, procedure: Option<&str>) -> Result<Value>;
    async fn get_tsb_list(&self, vehicle: &VehicleSpec, category: Option<&str>) -> Result<Value>;
    async fn get_adas_calibration(&self, vehicle: &VehicleSpec, component: Option<&str>) -> Result<Value>;
    async fn get_tire_specs(&self, vehicle: &VehicleSpec) -> Result<Value>;
    async fn get_wiring_diagram(&self, vehicle: &VehicleSpec, system: Option<&str>) -> Result<Value>;
    async fn get_specs_procedures(&self, vehicle: &VehicleSpec, category: Option<&str>) -> Result<Value>;
    async fn get_component_location(&self, vehicle: &VehicleSpec, component: Option<&str>) -> Result<Value>;
    async fn get_component_tests(&self, vehicle: &VehicleSpec, component: Option<&str>) -> Result<Value>;

    /// Decodes a VIN or license plate into vehicle fields. Takes no
    /// `VehicleSpec` — it produces one.
    async fn lookup_vehicle(
        &self,
        vin: Option<&str>,
        plate: Option<&str>,
        state: Option<&str>,
    ) -> Result<Value>;

    /// Free-text lookup against the portal's general search, shared by
    /// `search_mitchell`, `query_mitchell`, and `query_autonomous`.
    async fn query(&self, vehicle: &VehicleSpec, question: Option<&str>) -> Result<Value>;
}

/// Dispatches `tool` against `tools`, special-casing `query_by_plate`'s
/// lookup-then-recursive-dispatch.
pub fn dispatch<'a>(
    tools: &'a dyn PortalTools,
    tool: &'a Tool,
    vehicle: &'a VehicleSpec,
    params: &'a Value,
) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        match tool {
            Tool::GetFluidCapacities => {
                tools.get_fluid_capacities(vehicle, param_str(params, "fluid_type").as_deref()).await
            }
            Tool::GetDtcInfo => tools.get_dtc_info(vehicle, param_str(params, "dtc_code").as_deref()).await,
            Tool::GetTorqueSpecs => {
                tools.get_torque_specs(vehicle, param_str(params, "component").as_deref()).await
            }
            Tool::GetResetProcedure => {
                tools.get_reset_procedure(vehicle, param_str(params, "procedure").as_deref()).await
            }
            Tool::GetTsbList => tools.get_tsb_list(vehicle, param_str(params, "category").as_deref()).await,
            Tool::GetAdasCalibration => {
                tools.get_adas_calibration(vehicle, param_str(params, "component").as_deref()).await
            }
            Tool::GetTireSpecs => tools.get_tire_specs(vehicle).await,
            Tool::GetWiringDiagram => {
                tools.get_wiring_diagram(vehicle, param_str(params, "system").as_deref()).await
            }
            Tool::GetSpecsProcedures => {
                tools.get_specs_procedures(vehicle, param_str(params, "category").as_deref()).await
            }
            Tool::GetComponentLocation => {
                tools.get_component_location(vehicle, param_str(params, "component").as_deref()).await
            }
            Tool::GetComponentTests => {
                tools.get_component_tests(vehicle, param_str(params, "component").as_deref()).await
            }
            Tool::LookupVehicle => {
                tools
                    .lookup_vehicle(
                        param_str(params, "vin").as_deref(),
                        param_str(params, "plate").as_deref(),
                        param_str(params, "state").as_deref(),
                    )
                    .await
            }
            Tool::QueryByPlate => dispatch_by_plate(tools, params).await,
            Tool::SearchMitchell | Tool::QueryMitchell | Tool::QueryAutonomous => {
                tools.query(vehicle, param_str(params, "query").or_else(|| param_str(params, "question")).as_deref()).await
            }
            Tool::Unknown(name) => Err(Error::new(
                ErrorKind::ToolDispatchError,
                format!("unknown tool '{name}'"),
            )),
        }
    })
}

/// Looks a vehicle up by plate, then recursively dispatches `target_tool`
/// against the decoded vehicle, attaching the lookup under
/// `looked_up_vehicle` in the returned data.
async fn dispatch_by_plate(tools: &dyn PortalTools, params: &Value) -> Result<Value> {
    let plate = param_str(params, "plate").ok_or_else(|| {
        Error::new(ErrorKind::ToolDispatchError, "query_by_plate requires a 'plate' parameter")
    })?;
    let state = param_str(params, "state");
    let target_tool_name = param_str(params, "target_tool").ok_or_else(|| {
        Error::new(ErrorKind::ToolDispatchError, "query_by_plate requires a 'target_tool' parameter")
    })?;

    let looked_up = tools.lookup_vehicle(None, Some(&plate), state.as_deref()).await?;
    let vehicle = decode_vehicle(&looked_up)?;

    // `Tool` only exposes construction-by-name through its `Deserialize`
    // impl (the `from_wire_name` mapping is private); round-tripping
    // through a JSON string is the public way to get one from this name.
    let target_tool: Tool = serde_json::from_value(Value::String(target_tool_name.clone()))
        .map_err(|e| Error::with_source(ErrorKind::ToolDispatchError, "invalid target_tool", Box::new(e)))?;
    let mut tool_params = params.clone();
    if let Value::Object(ref mut map) = tool_params {
        map.remove("plate");
        map.remove("state");
        map.remove("target_tool");
    }

    let mut data = dispatch(tools, &target_tool, &vehicle, &tool_params).await?;
    match data {
        Value::Object(ref mut map) => {
            map.insert("looked_up_vehicle".to_string(), looked_up);
        }
        other => {
            data = serde_json::json!({ "result": other, "looked_up_vehicle": looked_up });
        }
    }
    Ok(data)
}

/// Decodes a `lookup_vehicle` result's `year`/`make`/`model`/`engine` fields
/// into a [`VehicleSpec`] for the recursive dispatch.
fn decode_vehicle(looked_up: &Value) -> Result<VehicleSpec> {
    let year = looked_up
        .get("year")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::new(ErrorKind::ToolDispatchError, "vehicle lookup did not return a year"))?;
    let make = looked_up
        .get("make")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::new(ErrorKind::ToolDispatchError, "vehicle lookup did not return a make"))?
        .to_string();
    let model = looked_up
        .get("model")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::new(ErrorKind::ToolDispatchError, "vehicle lookup did not return a model"))?
        .to_string();
    let engine = looked_up.get("engine").and_then(Value::as_str).map(str::to_string);

    Ok(VehicleSpec {
        year: year as u16,
        make,
        model,
        engine,
        submodel: None,
        body_style: None,
        drive_type: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeTools {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PortalTools for FakeTools {
        async fn get_fluid_capacities(&self, _vehicle: &VehicleSpec, fluid_type: Option<&str>) -> Result<Value> {
            self.calls.lock().unwrap().push("get_fluid_capacities".to_string());
            Ok(serde_json::json!({ "fluid_type": fluid_type }))
        }
        async fn get_dtc_info(&self, _vehicle: &VehicleSpec, _dtc_code: Option<&str>) -> Result<Value> {
            Ok(Value::Null)
        }
        async fn get_torque_specs(&self, _vehicle: &VehicleSpec, _component: Option<&str>) -> Result<Value> {
            Ok(Value::Null)
        }
        async fn get_reset_procedure(&self, _vehicle: &VehicleSpec, _procedure: Option<&str>) -> Result<Value> {
            Ok(Value::Null)
        }
        async fn get_tsb_list(&self, _vehicle: &VehicleSpec, _category: Option<&str>) -> Result<Value> {
            Ok(Value::Null)
        }
        async fn get_adas_calibration(&self, _vehicle: &VehicleSpec, _component: Option<&str>) -> Result<Value> {
            Ok(Value::Null)
        }
        async fn get_tire_specs(&self, _vehicle: &VehicleSpec) -> Result<Value> {
            Ok(Value::Null)
        }
        async fn get_wiring_diagram(&self, _vehicle: &VehicleSpec, _system: Option<&str>) -> Result<Value> {
            Ok(Value::Null)
        }
        async fn get_specs_procedures(&self, _vehicle: &VehicleSpec, _category: Option<&str>) -> Result<Value> {
            Ok(Value::Null)
        }
        async fn get_component_location(&self, _vehicle: &VehicleSpec, _component: Option<&str>) -> Result<Value> {
            Ok(Value::Null)
        }
        async fn get_component_tests(&self, _vehicle: &VehicleSpec, _component: Option<&str>) -> Result<Value> {
            Ok(Value::Null)
        }
        async fn lookup_vehicle(
            &self,
            _vin: Option<&str>,
            plate: Option<&str>,
            _state: Option<&str>,
        ) -> Result<Value> {
            self.calls.lock().unwrap().push("lookup_vehicle".to_string());
            Ok(serde_json::json!({
                "plate": plate,
                "year": 2019,
                "make": "Toyota",
                "model": "Camry",
                "engine": "2.5L",
            }))
        }
        async fn query(&self, _vehicle: &VehicleSpec, question: Option<&str>) -> Result<Value> {
            Ok(serde_json::json!({ "question": question }))
        }
    }

    fn vehicle() -> VehicleSpec {
        VehicleSpec {
            year: 2020,
            make: "Ford".to_string(),
            model: "F-150".to_string(),
            engine: None,
            submodel: None,
            body_style: None,
            drive_type: None,
        }
    }

    #[tokio::test]
    async fn unknown_tool_fails_dispatch() {
        let tools = FakeTools::default();
        let result = dispatch(&tools, &Tool::Unknown("not_real".to_string()), &vehicle(), &Value::Null).await;
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind(), ErrorKind::ToolDispatchError);
    }

    #[tokio::test]
    async fn generic_tools_route_through_query() {
        let tools = FakeTools::default();
        let params = serde_json::json!({ "question": "what oil type" });
        let result = dispatch(&tools, &Tool::QueryAutonomous, &vehicle(), &params).await.unwrap();
        assert_eq!(result["question"], "what oil type");
    }

    #[tokio::test]
    async fn query_by_plate_looks_up_then_dispatches_target_tool() {
        let tools = FakeTools::default();
        let params = serde_json::json!({
            "plate": "ABC123",
            "state": "CA",
            "target_tool": "get_fluid_capacities",
            "fluid_type": "engine_oil",
        });
        let result = dispatch(&tools, &Tool::QueryByPlate, &vehicle(), &params).await.unwrap();

        assert_eq!(result["fluid_type"], "engine_oil");
        assert_eq!(result["looked_up_vehicle"]["make"], "Toyota");

        let calls = tools.calls.lock().unwrap();
        assert_eq!(*calls, vec!["lookup_vehicle", "get_fluid_capacities"]);
    }

    #[tokio::test]
    async fn query_by_plate_requires_plate_and_target_tool() {
        let tools = FakeTools::default();
        let result = dispatch(&tools, &Tool::QueryByPlate, &vehicle(), &serde_json::json!({})).await;
        assert!(result.is_err());
    }
}
