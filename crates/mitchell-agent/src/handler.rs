//! The Request Handler (C5): executes one already-claimed [`Request`]
//! against the portal using a [`Navigator`] and the tool dispatch table,
//! enforcing the session-reuse policy of spec §4.5.

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Instant;

use futures::future::BoxFuture;
use mitchell_browser::{BrowserError, SessionManager};
use mitchell_navigator::{ClarificationCallback, Navigator};
use mitchell_reasoner::{CloudReasoner, LocalReasoner, ProxyReasoner, Reasoner};
use mitchell_types::{AgentResult, Error, ErrorKind, Request, Result, Tool, VehicleSpec};
use regex::Regex;
use serde_json::Value;

use crate::config::{AgentConfig, ReasonerBackend};
use crate::portal::view::NavDelays;
use crate::portal::{BrowserPortalTools, BrowserPortalView};
use crate::tool_dispatch;

/// Where this handler gets a [`Reasoner`] from for the Navigator's
/// Phase-2 fallback. `Cloud`/`Local` backends are stateless and built once;
/// `Server` must be rebuilt per request because `ProxyReasoner` is scoped
/// to one `request_id`.
enum ReasonerSource {
    Cached(Arc<dyn Reasoner>),
    PerRequest { default_server: String, shop_id: String },
}

fn drive_type_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(4WD|AWD|RWD|FWD|2WD|4x4)\b").expect("valid regex"))
}

/// Extracts a drive-type token from whichever of `submodel`, `body_style`,
/// `engine` contains one, in that order, per spec §4.5 step 3.
fn extract_drive_type(vehicle: &VehicleSpec) -> Option<String> {
    for field in [&vehicle.submodel, &vehicle.body_style, &vehicle.engine] {
        if let Some(text) = field
            && let Some(m) = drive_type_regex().find(text)
        {
            return Some(m.as_str().to_uppercase());
        }
    }
    None
}

/// Builds the Navigator's goal text directly from a [`VehicleSpec`]'s
/// fields, in the fixed order year/make/model/engine/submodel/body_style/
/// drive_type. Deliberately distinct from
/// [`mitchell_navigator::goal::join`], which re-joins an already-parsed
/// [`mitchell_types::VehicleGoal`] and extracts drive type from the whole
/// joined string rather than only these three fields.
fn build_goal_text(vehicle: &VehicleSpec) -> String {
    let drive_type = vehicle.drive_type.clone().or_else(|| extract_drive_type(vehicle));

    let mut parts = vec![vehicle.year.to_string(), vehicle.make.clone(), vehicle.model.clone()];
    if let Some(engine) = &vehicle.engine {
        parts.push(engine.clone());
    }
    if let Some(submodel) = &vehicle.submodel {
        parts.push(submodel.clone());
    }
    if let Some(body_style) = &vehicle.body_style {
        parts.push(body_style.clone());
    }
    if let Some(drive_type) = drive_type {
        parts.push(drive_type);
    }
    parts.join(" ")
}

/// Moves an `image_base64` field out of a tool's result data and into the
/// Result's top-level `images` list, per the data model's split between
/// tool-defined `data` and `images`.
fn extract_images(data: &mut Value) -> Option<Vec<String>> {
    if let Value::Object(map) = data
        && let Some(Value::String(image)) = map.remove("image_base64")
    {
        return Some(vec![image]);
    }
    None
}

/// Resolves a missing required Year/Make/Model field by logging it and
/// declining, per spec §4.4.4/§4.5 step 4: the handler never answers on the
/// caller's behalf, it only surfaces the request so the unresolved field
/// comes back on `NavigationResult::clarifications` instead of failing
/// navigation outright.
struct AbortOnClarification;

impl ClarificationCallback for AbortOnClarification {
    fn ask<'a>(
        &'a self,
        option_name: &'a str,
        available_values: &'a [String],
        message: &'a str,
    ) -> BoxFuture<'a, Option<String>> {
        Box::pin(async move {
            tracing::info!(option_name, ?available_values, message, "navigation needs clarification");
            None
        })
    }
}

fn failure(tool: Tool, message: impl Into<String>, start: Instant, images: Option<Vec<String>>) -> AgentResult {
    AgentResult {
        success: false,
        data: None,
        error: Some(message.into()),
        tool_used: tool,
        execution_time_ms: start.elapsed().as_millis() as u64,
        images,
        auto_selected: None,
        tokens_used: None,
    }
}

/// Executes one claimed [`Request`] against a Worker's portal session.
///
/// Unlike the Worker itself, a `RequestHandler` is stateless across
/// requests except for its cached Cloud/Local reasoner (if configured) —
/// nothing here is specific to one Worker, so a single handler is shared
/// across every Worker in the pool.
pub struct RequestHandler {
    nav_delays: NavDelays,
    debug_screenshots: bool,
    reasoner: ReasonerSource,
}

impl RequestHandler {
    pub fn new(config: &AgentConfig) -> Result<Self> {
        let backend = config.reasoner_backend()?;
        let reasoner = match backend {
            ReasonerBackend::Gemini => {
                let api_key = config.gemini_api_key.clone().ok_or_else(|| {
                    Error::new(
                        ErrorKind::ConfigInvalid,
                        "GEMINI_API_KEY is required when NAVIGATOR_BACKEND=gemini",
                    )
                })?;
                let mut cloud = CloudReasoner::new(api_key);
                if let Some(model) = &config.gemini_model {
                    cloud = cloud.with_model(model.clone());
                }
                ReasonerSource::Cached(Arc::new(cloud))
            }
            ReasonerBackend::Ollama => {
                let local = LocalReasoner::new(config.ollama_url.clone()).with_model(config.ollama_model.clone());
                ReasonerSource::Cached(Arc::new(local))
            }
            ReasonerBackend::Server => {
                let default_server = config
                    .server_url
                    .first()
                    .cloned()
                    .ok_or_else(|| Error::new(ErrorKind::ConfigInvalid, "no server URLs configured"))?;
                ReasonerSource::PerRequest { default_server, shop_id: config.shop_id.clone() }
            }
        };

        Ok(Self {
            nav_delays: config.nav_delays(),
            debug_screenshots: config.debug_screenshots,
            reasoner,
        })
    }

    fn navigator_for(&self, request: &Request) -> Navigator {
        match &self.reasoner {
            ReasonerSource::Cached(reasoner) => Navigator::with_reasoner(Arc::clone(reasoner)),
            ReasonerSource::PerRequest { default_server, shop_id } => {
                let server = request
                    .source_server
                    .as_ref()
                    .map(|u| u.as_str().trim_end_matches('/').to_string())
                    .unwrap_or_else(|| default_server.clone());
                let proxy = ProxyReasoner::new(server, request.id.clone(), shop_id.clone());
                Navigator::with_reasoner(Arc::new(proxy))
            }
        }
    }

    /// Runs spec §4.5's six-step algorithm against `session`'s live
    /// browser. `session` is the Worker's Session Manager, borrowed for
    /// the duration of exactly one request — the Worker Pool guarantees
    /// no other call touches the same session concurrently.
    pub async fn process(&self, session: &SessionManager, request: &Request) -> AgentResult {
        let start = Instant::now();
        let tool = request.tool.clone();

        if let Err(err) = session.ensure_logged_in().await {
            let message = match &err {
                BrowserError::SessionLimit => {
                    "ShopKeyPro sessions are currently in use; try again once one frees up".to_string()
                }
                other => format!("Failed to connect: {other}"),
            };
            return failure(tool, message, start, None);
        }
        session.update_activity().await;

        let mut driver = session.driver().await;
        let Some(client) = driver.client() else {
            drop(driver);
            let _ = session.logout().await;
            return failure(tool, "browser driver has no active client after login", start, None);
        };

        let view = BrowserPortalView::new(client, self.nav_delays);
        let tools = BrowserPortalTools::new(client, self.debug_screenshots);

        let mut auto_selected = None;

        if !tool.skips_vehicle_navigation() {
            let goal_text = build_goal_text(&request.vehicle);
            let navigator = self.navigator_for(request);
            let nav_result = navigator.navigate(&view, &goal_text, Some(&AbortOnClarification)).await;
            session.update_activity().await;

            if !nav_result.success {
                if let Some(clarification) = nav_result.clarifications.into_iter().next() {
                    drop(driver);
                    return AgentResult {
                        success: false,
                        data: Some(serde_json::json!({
                            "clarification_needed": true,
                            "missing_field": clarification.option_name,
                            "options": clarification.available_values,
                            "message": clarification.message,
                        })),
                        error: None,
                        tool_used: tool,
                        execution_time_ms: start.elapsed().as_millis() as u64,
                        images: None,
                        auto_selected: None,
                        tokens_used: None,
                    };
                }

                let debug_images = self.capture_debug_screenshot(&tools).await;
                drop(driver);
                let _ = session.logout().await;
                return failure(
                    tool,
                    nav_result.error.unwrap_or_else(|| "navigation failed".to_string()),
                    start,
                    debug_images,
                );
            }

            if !nav_result.auto_selected.is_empty() {
                auto_selected = Some(nav_result.auto_selected);
            }
        }

        let dispatch_result = tool_dispatch::dispatch(&tools, &tool, &request.vehicle, &request.params).await;

        match dispatch_result {
            Ok(mut data) => {
                let images = extract_images(&mut data);
                drop(driver);
                session.update_activity().await;
                AgentResult {
                    success: true,
                    data: Some(data),
                    error: None,
                    tool_used: tool,
                    execution_time_ms: start.elapsed().as_millis() as u64,
                    images,
                    auto_selected,
                    tokens_used: None,
                }
            }
            Err(err) => {
                let debug_images = self.capture_debug_screenshot(&tools).await;
                drop(driver);
                let _ = session.logout().await;
                failure(tool, err.to_string(), start, debug_images)
            }
        }
    }

    async fn capture_debug_screenshot(&self, tools: &BrowserPortalTools<'_>) -> Option<Vec<String>> {
        if !self.debug_screenshots {
            return None;
        }
        tools.capture_screenshot().await.ok().map(|b64| vec![b64])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle(
        engine: Option<&str>,
        submodel: Option<&str>,
        body_style: Option<&str>,
        drive_type: Option<&str>,
    ) -> VehicleSpec {
        VehicleSpec {
            year: 2018,
            make: "Ford".to_string(),
            model: "F-150".to_string(),
            engine: engine.map(str::to_string),
            submodel: submodel.map(str::to_string),
            body_style: body_style.map(str::to_string),
            drive_type: drive_type.map(str::to_string),
        }
    }

    #[test]
    fn goal_text_joins_present_fields_in_order() {
        let v = vehicle(Some("5.0L"), Some("XLT"), Some("4D Pickup"), Some("4WD"));
        assert_eq!(build_goal_text(&v), "2018 Ford F-150 5.0L XLT 4D Pickup 4WD");
    }

    #[test]
    fn goal_text_extracts_drive_type_from_body_style_when_absent() {
        let v = vehicle(Some("5.0L"), None, "4D Pickup 4WD".into(), None);
        assert_eq!(build_goal_text(&v), "2018 Ford F-150 5.0L 4D Pickup 4WD 4WD");
    }

    #[test]
    fn goal_text_omits_missing_optional_fields() {
        let v = vehicle(None, None, None, None);
        assert_eq!(build_goal_text(&v), "2018 Ford F-150");
    }

    #[test]
    fn extract_images_pulls_image_base64_into_its_own_list() {
        let mut data = serde_json::json!({ "summary": "text", "image_base64": "Zm9v" });
        let images = extract_images(&mut data);
        assert_eq!(images, Some(vec!["Zm9v".to_string()]));
        assert!(data.get("image_base64").is_none());
        assert_eq!(data["summary"], "text");
    }

    #[test]
    fn extract_images_is_none_without_an_image_field() {
        let mut data = serde_json::json!({ "summary": "text" });
        assert_eq!(extract_images(&mut data), None);
    }
}
