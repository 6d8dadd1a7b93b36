//! Phase 1: deterministic Year → Make → Model → Engine → Submodel
//! selection, per §4.4.2.

use std::collections::BTreeMap;

use mitchell_types::{Clarification, VehicleGoal};

use crate::clarify::ClarificationCallback;
use crate::error::NavError;
use crate::matching::{best_match, substring_in_goal};
use crate::view::{PortalView, Tab};

/// Retries [`PortalView::open`] up to 3 times, per §4.4.2 step 1. The
/// underlying trait call already performs the click-accordion-wait
/// sequence; this loop only covers the case where the portal's own
/// animation/loading hiccups and the tab list never appears.
pub async fn open_selector(view: &dyn PortalView) -> Result<(), NavError> {
    for attempt in 1..=3 {
        view.open().await.map_err(|e| NavError::Fail(e.to_string()))?;
        if view.is_open().await.map_err(|e| NavError::Fail(e.to_string()))? {
            return Ok(());
        }
        tracing::warn!(attempt, "vehicle selector did not open, retrying");
    }
    Err(NavError::Fail(
        "could not open vehicle selector after 3 attempts".to_string(),
    ))
}

/// Walks Year, Make, Model, Engine, and Submodel in order. Year/Make/Model
/// are required: if unspecified and a clarification callback is
/// registered, the callback is asked to resolve it (per §4.4.4); otherwise,
/// or if unmatched against the portal's own values, the navigation fails
/// immediately. Engine auto-selects the first option when unspecified;
/// Submodel prefers a parsed match, then a goal-substring match, then the
/// sole option, then auto-selects the first and records it.
pub async fn run(
    view: &dyn PortalView,
    goal: &VehicleGoal,
    auto_selected: &mut BTreeMap<String, String>,
    clarify: Option<&dyn ClarificationCallback>,
) -> Result<(), NavError> {
    let year_str = if goal.year == 0 { String::new() } else { goal.year.to_string() };
    select_required(view, Tab::Year, &year_str, clarify).await?;
    select_required(view, Tab::Make, &goal.make, clarify).await?;
    select_required(view, Tab::Model, &goal.model, clarify).await?;
    select_engine(view, goal.engine.as_deref()).await?;
    select_submodel(view, goal, auto_selected).await?;
    Ok(())
}

async fn select_required(
    view: &dyn PortalView,
    tab: Tab,
    value: &str,
    clarify: Option<&dyn ClarificationCallback>,
) -> Result<(), NavError> {
    if value.is_empty() {
        let Some(clarify) = clarify else {
            return Err(NavError::Fail(format!("{tab} not specified in goal")));
        };

        ensure_active_tab(view, tab).await?;
        let values = view.wait_for_values().await.map_err(|e| NavError::Fail(e.to_string()))?;
        let message = format!("which {tab} should be used for this vehicle?");

        return match clarify.ask(tab.auto_selected_key(), &values, &message).await {
            Some(resolved) => select_required(view, tab, &resolved, None).await,
            None => Err(NavError::NeedsClarification(Clarification {
                option_name: tab.auto_selected_key().to_string(),
                available_values: values,
                message,
            })),
        };
    }

    ensure_active_tab(view, tab).await?;
    let values = view.wait_for_values().await.map_err(|e| NavError::Fail(e.to_string()))?;

    match best_match(value, &values) {
        Some(matched) => {
            view.click_value(&matched).await.map_err(|e| NavError::Fail(e.to_string()))?;
            Ok(())
        }
        None => Err(NavError::Fail(format!("{tab} '{value}' not found"))),
    }
}

async fn select_engine(view: &dyn PortalView, engine: Option<&str>) -> Result<(), NavError> {
    let Some(Tab::Engine) = view.active_tab().await.map_err(|e| NavError::Fail(e.to_string()))? else {
        return Ok(());
    };
    let values = view.wait_for_values().await.map_err(|e| NavError::Fail(e.to_string()))?;
    if values.is_empty() {
        return Ok(());
    }

    let chosen = match engine.filter(|e| !e.is_empty()) {
        Some(engine) => best_match(engine, &values).unwrap_or_else(|| values[0].clone()),
        None => values[0].clone(),
    };
    view.click_value(&chosen).await.map_err(|e| NavError::Fail(e.to_string()))
}

async fn select_submodel(
    view: &dyn PortalView,
    goal: &VehicleGoal,
    auto_selected: &mut BTreeMap<String, String>,
) -> Result<(), NavError> {
    let Some(Tab::Submodel) = view.active_tab().await.map_err(|e| NavError::Fail(e.to_string()))? else {
        return Ok(());
    };
    let values = view.wait_for_values().await.map_err(|e| NavError::Fail(e.to_string()))?;
    if values.is_empty() {
        return Ok(());
    }

    let parsed_match = goal
        .submodel
        .as_deref()
        .filter(|s| !s.is_empty())
        .and_then(|s| best_match(s, &values));
    let goal_substring_match = substring_in_goal(&goal.raw, &values);

    let chosen = parsed_match
        .clone()
        .or_else(|| goal_substring_match.clone())
        .unwrap_or_else(|| values[0].clone());

    if parsed_match.is_none() && goal_substring_match.is_none() {
        auto_selected.insert("submodel".to_string(), chosen.clone());
    }

    view.click_value(&chosen).await.map_err(|e| NavError::Fail(e.to_string()))
}

/// Checks that the portal's active tab is `target`. Phase 1's fixed order
/// plus the portal's auto-advance-on-select behavior (selecting a value on
/// one tab always advances to the next) mean this should never need to
/// click backwards — a mismatch here is itself the failure condition.
async fn ensure_active_tab(view: &dyn PortalView, target: Tab) -> Result<(), NavError> {
    let current = view.active_tab().await.map_err(|e| NavError::Fail(e.to_string()))?;
    if current == Some(target) {
        return Ok(());
    }
    Err(NavError::Fail(format!(
        "expected tab {target}, portal is on {current:?}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::fake::{FakeTabState, FakeView};

    fn goal(raw: &str) -> VehicleGoal {
        crate::goal::parse(raw)
    }

    #[tokio::test]
    async fn selects_year_make_model_in_order() {
        let view = FakeView::new(vec![
            FakeTabState { tab: Tab::Year, values: vec!["2018".into(), "2019".into()] },
            FakeTabState { tab: Tab::Make, values: vec!["Ford".into(), "Toyota".into()] },
            FakeTabState { tab: Tab::Model, values: vec!["F-150".into(), "Explorer".into()] },
        ]);

        let goal = goal("2018 Ford F-150");
        let mut auto_selected = BTreeMap::new();
        run(&view, &goal, &mut auto_selected, None).await.unwrap();

        let clicks = view.clicks.lock().unwrap().clone();
        assert_eq!(clicks, vec!["2018", "Ford", "F-150"]);
    }

    #[tokio::test]
    async fn missing_year_fails_without_clarification_callback() {
        let view = FakeView::new(vec![]);
        let goal = goal("Ford F-150");
        let mut auto_selected = BTreeMap::new();

        let err = run(&view, &goal, &mut auto_selected, None).await.unwrap_err();
        assert!(matches!(err, NavError::Fail(msg) if msg.contains("Year")));
    }

    #[tokio::test]
    async fn unmatched_make_fails_with_descriptive_error() {
        let view = FakeView::new(vec![
            FakeTabState { tab: Tab::Year, values: vec!["2018".into()] },
            FakeTabState { tab: Tab::Make, values: vec!["Toyota".into(), "Honda".into()] },
        ]);
        let goal = goal("2018 Ford F-150");
        let mut auto_selected = BTreeMap::new();

        let err = run(&view, &goal, &mut auto_selected, None).await.unwrap_err();
        assert!(matches!(err, NavError::Fail(msg) if msg.contains("Make") && msg.contains("Ford")));
    }

    #[tokio::test]
    async fn submodel_with_no_match_auto_selects_first() {
        let view = FakeView::new(vec![
            FakeTabState { tab: Tab::Year, values: vec!["2018".into()] },
            FakeTabState { tab: Tab::Make, values: vec!["Ford".into()] },
            FakeTabState { tab: Tab::Model, values: vec!["F-150".into()] },
            FakeTabState { tab: Tab::Submodel, values: vec!["XL".into(), "XLT".into(), "Lariat".into()] },
        ]);
        let goal = goal("2018 Ford F-150");
        let mut auto_selected = BTreeMap::new();
        run(&view, &goal, &mut auto_selected, None).await.unwrap();

        assert_eq!(auto_selected.get("submodel"), Some(&"XL".to_string()));
    }

    #[tokio::test]
    async fn missing_year_with_clarification_callback_resolves_and_continues() {
        use futures::FutureExt;

        let view = FakeView::new(vec![
            FakeTabState { tab: Tab::Year, values: vec!["2018".into(), "2019".into()] },
            FakeTabState { tab: Tab::Make, values: vec!["Ford".into()] },
            FakeTabState { tab: Tab::Model, values: vec!["F-150".into()] },
        ]);
        let goal = goal("Ford F-150");
        let mut auto_selected = BTreeMap::new();

        let callback = move |_: &str, _: &[String], _: &str| async { Some("2018".to_string()) }.boxed();
        run(&view, &goal, &mut auto_selected, Some(&callback)).await.unwrap();

        let clicks = view.clicks.lock().unwrap().clone();
        assert_eq!(clicks, vec!["2018", "Ford", "F-150"]);
    }

    #[tokio::test]
    async fn missing_year_with_declined_clarification_reports_unresolved_request() {
        use futures::FutureExt;

        let view = FakeView::new(vec![FakeTabState {
            tab: Tab::Year,
            values: vec!["2018".into(), "2019".into()],
        }]);
        let goal = goal("Ford F-150");
        let mut auto_selected = BTreeMap::new();

        let callback = move |_: &str, _: &[String], _: &str| async { None }.boxed();
        let err = run(&view, &goal, &mut auto_selected, Some(&callback)).await.unwrap_err();

        match err {
            NavError::NeedsClarification(c) => {
                assert_eq!(c.option_name, "year");
                assert_eq!(c.available_values, vec!["2018".to_string(), "2019".to_string()]);
            }
            other => panic!("expected NeedsClarification, got {other:?}"),
        }
    }
}
