//! Ties goal parsing, Phase 1, and Phase 2 into the single entry point
//! `Navigator::navigate`, per §4.4.

use std::collections::BTreeMap;
use std::sync::Arc;

use mitchell_reasoner::{Message, MessageRole, Reasoner};
use mitchell_types::{NavigationResult, VehicleGoal};

use crate::clarify::ClarificationCallback;
use crate::error::NavError;
use crate::tools::{self, NavAction};
use crate::view::PortalView;
use crate::{goal, phase1, phase2};

/// A reasoner-driven fallback is attempted only when Phase 2 exhausts its
/// own step budget; it gets a much smaller one of its own.
const REASONER_FALLBACK_STEPS: u32 = 5;

/// Drives a [`PortalView`] from an empty selector to a confirmed vehicle.
///
/// The deterministic two-phase algorithm (`phase1`, `phase2`) is
/// authoritative. A [`Reasoner`] is optional and, when present, is only
/// ever consulted after Phase 2 gives up on its own step budget — it never
/// substitutes for Phase 1's required-field checks or clarification
/// protocol, per §4.4.5 ("do not call the Reasoner" on a missing required
/// field).
pub struct Navigator {
    reasoner: Option<Arc<dyn Reasoner>>,
}

impl Navigator {
    pub fn new() -> Self {
        Self { reasoner: None }
    }

    pub fn with_reasoner(reasoner: Arc<dyn Reasoner>) -> Self {
        Self { reasoner: Some(reasoner) }
    }

    /// Parses `goal_text`, opens the selector, and walks it to completion.
    /// Every failure path cancels the in-progress selection before
    /// returning, per §4.4.5.
    pub async fn navigate(
        &self,
        view: &dyn PortalView,
        goal_text: &str,
        clarify: Option<&dyn ClarificationCallback>,
    ) -> NavigationResult {
        let goal = goal::parse(goal_text);
        let mut auto_selected = BTreeMap::new();

        match self.run(view, &goal, &mut auto_selected, clarify).await {
            Ok(()) => NavigationResult {
                success: true,
                error: None,
                clarifications: Vec::new(),
                auto_selected,
            },
            Err(NavError::NeedsClarification(clarification)) => {
                let _ = view.cancel().await;
                NavigationResult {
                    success: false,
                    error: None,
                    clarifications: vec![clarification],
                    auto_selected,
                }
            }
            Err(NavError::Fail(message)) => {
                let _ = view.cancel().await;
                NavigationResult { success: false, error: Some(message), clarifications: Vec::new(), auto_selected }
            }
        }
    }

    async fn run(
        &self,
        view: &dyn PortalView,
        goal: &VehicleGoal,
        auto_selected: &mut BTreeMap<String, String>,
        clarify: Option<&dyn ClarificationCallback>,
    ) -> Result<(), NavError> {
        phase1::open_selector(view).await?;
        phase1::run(view, goal, auto_selected, clarify).await?;

        match phase2::run(view, goal, auto_selected).await {
            Err(NavError::Fail(message)) if message.contains("max options steps") && self.reasoner.is_some() => {
                tracing::warn!("Phase 2 exhausted its step budget, falling back to the reasoner");
                self.reasoner_fallback(view, goal, auto_selected).await
            }
            other => other,
        }
    }

    async fn reasoner_fallback(
        &self,
        view: &dyn PortalView,
        goal: &VehicleGoal,
        auto_selected: &mut BTreeMap<String, String>,
    ) -> Result<(), NavError> {
        let reasoner = self.reasoner.as_ref().expect("reasoner_fallback only called when configured");
        let schema = tools::schema();
        let system = "Drive the remaining vehicle-selector options to a confirmed vehicle. \
            Call exactly one tool per step.";
        let mut turns = vec![Message::new(MessageRole::User, format!("Goal: {}", goal.raw))];

        for _ in 0..REASONER_FALLBACK_STEPS {
            let decision = reasoner
                .decide(system, &turns, &schema, None)
                .await
                .map_err(|e| NavError::Fail(format!("reasoner fallback: {e}")))?;
            let action = tools::interpret(&decision)?;

            match action {
                NavAction::Done => return Ok(()),
                NavAction::ConfirmVehicle => {
                    view.confirm().await.map_err(|e| NavError::Fail(e.to_string()))?;
                    if !view.is_open().await.map_err(|e| NavError::Fail(e.to_string()))? {
                        return Ok(());
                    }
                }
                NavAction::RequestInfo { option_name, message } => {
                    return Err(NavError::Fail(format!(
                        "reasoner could not resolve '{option_name}': {message}"
                    )));
                }
                NavAction::SelectYear(value)
                | NavAction::SelectMake(value)
                | NavAction::SelectModel(value)
                | NavAction::SelectEngine(value)
                | NavAction::SelectSubmodel(value)
                | NavAction::SelectBodyStyle(value)
                | NavAction::SelectDriveType(value) => {
                    view.click_value(&value).await.map_err(|e| NavError::Fail(e.to_string()))?;
                    auto_selected.insert("reasoner".to_string(), value.clone());
                    turns.push(Message::new(MessageRole::Assistant, format!("selected '{value}'")));
                }
            }
        }

        Err(NavError::Fail("reasoner fallback exceeded its step budget".to_string()))
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::fake::{FakeTabState, FakeView};
    use crate::view::Tab;

    #[tokio::test]
    async fn full_navigation_without_reasoner_succeeds() {
        let view = FakeView::new(vec![
            FakeTabState { tab: Tab::Year, values: vec!["2018".into()] },
            FakeTabState { tab: Tab::Make, values: vec!["Ford".into()] },
            FakeTabState { tab: Tab::Model, values: vec!["F-150".into()] },
        ]);

        let navigator = Navigator::new();
        let result = navigator.navigate(&view, "2018 Ford F-150", None).await;

        assert!(result.success);
        assert!(!*view.cancelled.lock().unwrap());
        assert_eq!(view.clicks.lock().unwrap().clone(), vec!["2018", "Ford", "F-150"]);
    }

    #[tokio::test]
    async fn missing_required_field_cancels_selector() {
        let view = FakeView::new(vec![]);
        let navigator = Navigator::new();
        let result = navigator.navigate(&view, "a vehicle of some kind", None).await;

        assert!(!result.success);
        assert!(result.error.is_some());
        assert!(*view.cancelled.lock().unwrap());
    }
}
