//! Generic tool-result extraction over a live portal session.
//!
//! Per spec §1/§9, the portal's per-tool selector/extraction catalog is out
//! of scope: every typed method here funnels through [`run_query`], a
//! single search-and-extract helper in the same fallback-chain spirit as
//! `mitchell-browser::connection`'s `locate`. The concrete selector strings
//! are illustrative, not load-bearing.

use async_trait::async_trait;
use base64::Engine as _;
use mitchell_browser::{By, WebDriver};
use mitchell_types::{Result, VehicleSpec};
use serde_json::Value;

use crate::tool_dispatch::PortalTools;

fn werr(context: &'static str, error: thirtyfour::error::WebDriverError) -> mitchell_types::Error {
    mitchell_browser::BrowserError::webdriver(error, Some(context.to_string())).into()
}

const SEARCH_INPUT: &[&str] = &[
    "[data-testid='mitchell-search-input']",
    "input[name='q']",
    "#search-input",
];
const SEARCH_BUTTON: &[&str] = &["[data-testid='mitchell-search-submit']", "button[type='submit']"];
const RESULTS_PANEL: &[&str] = &["[data-testid='mitchell-results']", ".results-panel"];

const DECODE_INPUT: &[&str] = &["[data-testid='vin-plate-decode-input']", "input[name='vin_or_plate']"];
const DECODE_STATE_INPUT: &[&str] = &["[data-testid='vin-plate-decode-state']", "select[name='state']"];
const DECODE_SUBMIT: &[&str] = &["[data-testid='vin-plate-decode-submit']"];

fn vehicle_query(vehicle: &VehicleSpec, detail: &str) -> String {
    let mut parts = vec![vehicle.year.to_string(), vehicle.make.clone(), vehicle.model.clone()];
    if let Some(engine) = &vehicle.engine {
        parts.push(engine.clone());
    }
    parts.push(detail.to_string());
    parts.join(" ")
}

/// Extracts tool results (fluid capacities, DTC info, torque specs, ...)
/// from a live portal session over a borrowed [`WebDriver`].
pub struct BrowserPortalTools<'a> {
    client: &'a WebDriver,
    capture_images: bool,
}

impl<'a> BrowserPortalTools<'a> {
    pub fn new(client: &'a WebDriver, capture_images: bool) -> Self {
        Self { client, capture_images }
    }

    /// Types `query` into the portal's search affordance, submits, waits
    /// for a results panel, and returns its text content.
    async fn run_query(&self, query: &str) -> Result<String> {
        let input = self.locate(SEARCH_INPUT).await?;
        input.clear().await.map_err(|e| werr("run_query", e))?;
        input.send_keys(query).await.map_err(|e| werr("run_query", e))?;

        if let Ok(submit) = self.locate(SEARCH_BUTTON).await {
            submit.click().await.map_err(|e| werr("run_query", e))?;
        } else {
            input.send_keys("\n").await.map_err(|e| werr("run_query", e))?;
        }

        let panel = self.locate(RESULTS_PANEL).await?;
        panel.text().await.map_err(|e| werr("run_query", e))
    }

    /// Like [`Self::run_query`], but also base64-encodes a screenshot of
    /// the results panel into the returned object under `image_base64` —
    /// for the tools whose results are plausibly image-bearing
    /// (wiring diagrams, tire placards).
    async fn run_query_with_image(&self, query: &str) -> Result<Value> {
        let text = self.run_query(query).await?;
        let mut data = serde_json::json!({ "summary": text });

        if let Ok(screenshot) = self.client.screenshot_as_png().await {
            let encoded = base64::engine::general_purpose::STANDARD.encode(screenshot);
            data["image_base64"] = Value::String(encoded);
        }
        Ok(data)
    }

    async fn locate(&self, selectors: &[&str]) -> Result<thirtyfour::WebElement> {
        for selector in selectors {
            if let Ok(el) = self.client.find(By::Css(selector)).await {
                return Ok(el);
            }
        }
        Err(mitchell_browser::BrowserError::element_error(
            "locate",
            selectors.first().map(|s| s.to_string()),
            "not found by any selector in the fallback chain",
        )
        .into())
    }

    /// Captures a base64-encoded screenshot of the current page, for
    /// `RequestHandler`'s `MITCHELL_DEBUG_SCREENSHOTS` capture-on-failure
    /// path.
    pub async fn capture_screenshot(&self) -> Result<String> {
        let screenshot = self
            .client
            .screenshot_as_png()
            .await
            .map_err(|e| werr("capture_screenshot", e))?;
        Ok(base64::engine::general_purpose::STANDARD.encode(screenshot))
    }
}

#[async_trait]
impl<'a> PortalTools for BrowserPortalTools<'a> {
    async fn get_fluid_capacities(&self, vehicle: &VehicleSpec, fluid_type: Option<&str>) -> Result<Value> {
        let detail = fluid_type.unwrap_or("fluid capacities");
        let text = self.run_query(&vehicle_query(vehicle, detail)).await?;
        Ok(serde_json::json!({ "summary": text, "fluid_type": fluid_type }))
    }

    async fn get_dtc_info(&self, vehicle: &VehicleSpec, dtc_code: Option<&str>) -> Result<Value> {
        let detail = dtc_code.map(|c| format!("DTC {c}")).unwrap_or_else(|| "DTC codes".to_string());
        let text = self.run_query(&vehicle_query(vehicle, &detail)).await?;
        Ok(serde_json::json!({ "summary": text, "dtc_code": dtc_code }))
    }

    async fn get_torque_specs(&self, vehicle: &VehicleSpec, component: Option<&str>) -> Result<Value> {
        let detail = component.map(|c| format!("{c} torque spec")).unwrap_or_else(|| "torque specs".to_string());
        let text = self.run_query(&vehicle_query(vehicle, &detail)).await?;
        Ok(serde_json::json!({ "summary": text, "component": component }))
    }

    async fn get_reset_procedure(&self, vehicle: &VehicleSpec, procedure: Option<&str>) -> Result<Value> {
        let detail = procedure.map(|p| format!("{p} reset procedure")).unwrap_or_else(|| "reset procedure".to_string());
        let text = self.run_query(&vehicle_query(vehicle, &detail)).await?;
        Ok(serde_json::json!({ "summary": text, "procedure": procedure }))
    }

    async fn get_tsb_list(&self, vehicle: &VehicleSpec, category: Option<&str>) -> Result<Value> {
        let detail = category.map(|c| format!("TSBs {c}")).unwrap_or_else(|| "technical service bulletins".to_string());
        let text = self.run_query(&vehicle_query(vehicle, &detail)).await?;
        Ok(serde_json::json!({ "summary": text, "category": category }))
    }

    async fn get_adas_calibration(&self, vehicle: &VehicleSpec, component: Option<&str>) -> Result<Value> {
        let detail = component.map(|c| format!("ADAS calibration {c}")).unwrap_or_else(|| "ADAS calibration".to_string());
        let text = self.run_query(&vehicle_query(vehicle, &detail)).await?;
        Ok(serde_json::json!({ "summary": text, "component": component }))
    }

    async fn get_tire_specs(&self, vehicle: &VehicleSpec) -> Result<Value> {
        if self.capture_images {
            self.run_query_with_image(&vehicle_query(vehicle, "tire specifications")).await
        } else {
            let text = self.run_query(&vehicle_query(vehicle, "tire specifications")).await?;
            Ok(serde_json::json!({ "summary": text }))
        }
    }

    async fn get_wiring_diagram(&self, vehicle: &VehicleSpec, system: Option<&str>) -> Result<Value> {
        let detail = system.map(|s| format!("{s} wiring diagram")).unwrap_or_else(|| "wiring diagram".to_string());
        let mut data = if self.capture_images {
            self.run_query_with_image(&vehicle_query(vehicle, &detail)).await?
        } else {
            let text = self.run_query(&vehicle_query(vehicle, &detail)).await?;
            serde_json::json!({ "summary": text })
        };
        data["system"] = serde_json::json!(system);
        Ok(data)
    }

    async fn get_specs_procedures(&self, vehicle: &VehicleSpec, category: Option<&str>) -> Result<Value> {
        let detail = category.map(|c| format!("specs and procedures {c}")).unwrap_or_else(|| "specs and procedures".to_string());
        let text = self.run_query(&vehicle_query(vehicle, &detail)).await?;
        Ok(serde_json::json!({ "summary": text, "category": category }))
    }

    async fn get_component_location(&self, vehicle: &VehicleSpec, component: Option<&str>) -> Result<Value> {
        let detail = component.map(|c| format!("{c} location")).unwrap_or_else(|| "component location".to_string());
        let text = self.run_query(&vehicle_query(vehicle, &detail)).await?;
        Ok(serde_json::json!({ "summary": text, "component": component }))
    }

    async fn get_component_tests(&self, vehicle: &VehicleSpec, component: Option<&str>) -> Result<Value> {
        let detail = component.map(|c| format!("{c} component test")).unwrap_or_else(|| "component tests".to_string());
        let text = self.run_query(&vehicle_query(vehicle, &detail)).await?;
        Ok(serde_json::json!({ "summary": text, "component": component }))
    }

    async fn lookup_vehicle(&self, vin: Option<&str>, plate: Option<&str>, state: Option<&str>) -> Result<Value> {
        let query_value = vin.or(plate).ok_or_else(|| {
            mitchell_types::Error::new(
                mitchell_types::ErrorKind::ToolDispatchError,
                "lookup_vehicle requires a 'vin' or 'plate' parameter",
            )
        })?;

        let input = self.locate(DECODE_INPUT).await?;
        input.clear().await.map_err(|e| werr("lookup_vehicle", e))?;
        input.send_keys(query_value).await.map_err(|e| werr("lookup_vehicle", e))?;

        if let Some(state) = state
            && let Ok(state_field) = self.locate(DECODE_STATE_INPUT).await
        {
            state_field.send_keys(state).await.map_err(|e| werr("lookup_vehicle", e))?;
        }

        if let Ok(submit) = self.locate(DECODE_SUBMIT).await {
            submit.click().await.map_err(|e| werr("lookup_vehicle", e))?;
        } else {
            input.send_keys("\n").await.map_err(|e| werr("lookup_vehicle", e))?;
        }

        let year = self.read_decoded_field("[data-testid='decode-year']").await?;
        let make = self.read_decoded_field("[data-testid='decode-make']").await?;
        let model = self.read_decoded_field("[data-testid='decode-model']").await?;
        let engine = self.read_decoded_field("[data-testid='decode-engine']").await.ok();
        let vin_out = self.read_decoded_field("[data-testid='decode-vin']").await.ok();

        Ok(serde_json::json!({
            "year": year.parse::<u64>().unwrap_or_default(),
            "make": make,
            "model": model,
            "engine": engine,
            "vin": vin_out,
            "plate": plate,
            "state": state,
        }))
    }

    async fn query(&self, vehicle: &VehicleSpec, question: Option<&str>) -> Result<Value> {
        let detail = question.unwrap_or("general information");
        let text = self.run_query(&vehicle_query(vehicle, detail)).await?;
        Ok(serde_json::json!({ "summary": text, "question": question }))
    }
}

impl<'a> BrowserPortalTools<'a> {
    async fn read_decoded_field(&self, selector: &str) -> Result<String> {
        self.client
            .find(By::Css(selector))
            .await
            .map_err(|e| werr("read decoded vehicle field", e))?
            .text()
            .await
            .map_err(|e| werr("read decoded vehicle field", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vehicle_query_joins_year_make_model_and_detail() {
        let vehicle = VehicleSpec {
            year: 2021,
            make: "Honda".to_string(),
            model: "Civic".to_string(),
            engine: Some("2.0L".to_string()),
            submodel: None,
            body_style: None,
            drive_type: None,
        };
        let query = vehicle_query(&vehicle, "torque spec");
        assert_eq!(query, "2021 Honda Civic 2.0L torque spec");
    }
}
