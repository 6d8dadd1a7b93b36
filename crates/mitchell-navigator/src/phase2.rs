//! Phase 2: the Options tab hybrid loop, per §4.4.2.
//!
//! The Options tab is the one part of the selector whose shape varies by
//! vehicle: sometimes it presents named groups (Body Style, Drive Type,
//! Transmission, ...), sometimes a single flat list of values with no group
//! headers. Both shapes are read fresh from [`PortalView`] on every step,
//! since selecting one option can change what the next step sees.

use std::collections::BTreeMap;

use mitchell_types::VehicleGoal;

use crate::error::NavError;
use crate::matching::{body_style_token_match, drive_type_token_match, substring_in_goal};
use crate::view::{OptionGroup, OptionsLayout, PortalView, Tab};

/// Options tab has at most this many steps to resolve before navigation
/// gives up; the reference navigator uses the same bound.
const MAX_STEPS: u32 = 15;

/// Drives the Options tab to completion (selector closes) or gives up after
/// [`MAX_STEPS`]. Returns `Ok(true)` if the selector closed (vehicle
/// confirmed), `Ok(false)` should never be observed by callers — every path
/// either closes the selector or returns `Err`.
pub async fn run(
    view: &dyn PortalView,
    goal: &VehicleGoal,
    auto_selected: &mut BTreeMap<String, String>,
) -> Result<(), NavError> {
    for step in 1..=MAX_STEPS {
        let Some(tab) = view.active_tab().await.map_err(|e| NavError::Fail(e.to_string()))? else {
            return Ok(());
        };

        if tab == Tab::Submodel {
            let values = view.wait_for_values().await.map_err(|e| NavError::Fail(e.to_string()))?;
            if !values.is_empty() {
                let first = values[0].clone();
                view.click_value(&first).await.map_err(|e| NavError::Fail(e.to_string()))?;
                auto_selected.insert("submodel".to_string(), first);
            }
            continue;
        }

        if tab != Tab::Options {
            if step > 5 && matches!(tab, Tab::Year | Tab::Make | Tab::Model | Tab::Engine) {
                return Err(NavError::Fail(format!("navigation stuck on {tab} selection")));
            }
            continue;
        }

        match view.options_layout().await.map_err(|e| NavError::Fail(e.to_string()))? {
            OptionsLayout::Flat { values, selected } => {
                handle_flat(view, goal, &values, &selected, auto_selected).await?;
            }
            OptionsLayout::Structured(groups) => {
                handle_structured(view, goal, &groups, auto_selected).await?;
            }
        }

        if view.confirm_enabled().await.map_err(|e| NavError::Fail(e.to_string()))? {
            view.confirm().await.map_err(|e| NavError::Fail(e.to_string()))?;
            if !view.is_open().await.map_err(|e| NavError::Fail(e.to_string()))? {
                return Ok(());
            }
        }
    }

    Err(NavError::Fail("max options steps reached".to_string()))
}

async fn handle_flat(
    view: &dyn PortalView,
    goal: &VehicleGoal,
    values: &[String],
    selected: &[String],
    auto_selected: &mut BTreeMap<String, String>,
) -> Result<(), NavError> {
    let unselected: Vec<String> = values.iter().filter(|v| !selected.contains(v)).cloned().collect();
    if unselected.is_empty() {
        return Ok(());
    }

    if let Some(matched) = substring_in_goal(&goal.raw, &unselected)
        .or_else(|| body_style_token_match(&goal.raw, &unselected))
        .or_else(|| drive_type_token_match(&goal.raw, &unselected))
    {
        view.click_value(&matched).await.map_err(|e| NavError::Fail(e.to_string()))?;
        return Ok(());
    }

    let goal_relevant_already_selected = substring_in_goal(&goal.raw, selected).is_some()
        || drive_type_token_match(&goal.raw, selected).is_some();
    if goal_relevant_already_selected {
        return Ok(());
    }

    let first = unselected[0].clone();
    view.click_value(&first).await.map_err(|e| NavError::Fail(e.to_string()))?;
    auto_selected.insert("options".to_string(), first);
    Ok(())
}

async fn handle_structured(
    view: &dyn PortalView,
    goal: &VehicleGoal,
    groups: &[OptionGroup],
    auto_selected: &mut BTreeMap<String, String>,
) -> Result<(), NavError> {
    for group in groups {
        if group.selected.is_some() {
            continue;
        }

        let key = group.name.to_ascii_lowercase().replace(':', "").trim().replace(' ', "_");

        let matched = if key.contains("body") || key.contains("style") {
            goal.body_style
                .as_deref()
                .and_then(|b| group.values.iter().find(|v| v.to_ascii_lowercase().contains(&b.to_ascii_lowercase())))
                .cloned()
                .or_else(|| substring_in_goal(&goal.raw, &group.values))
        } else if key.contains("drive") {
            goal.drive_type
                .as_deref()
                .and_then(|d| group.values.iter().find(|v| v.to_ascii_lowercase().contains(&d.to_ascii_lowercase())))
                .cloned()
                .or_else(|| drive_type_token_match(&goal.raw, &group.values))
        } else {
            None
        };

        let Some(value) = matched else {
            let Some(first) = group.values.first().cloned() else {
                return Err(NavError::Fail(format!("no options available for {}", group.name)));
            };
            view.click_group_value(&group.name, &first).await.map_err(|e| NavError::Fail(e.to_string()))?;
            auto_selected.insert(key, first);
            return Ok(());
        };

        view.click_group_value(&group.name, &value).await.map_err(|e| NavError::Fail(e.to_string()))?;
        return Ok(());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::fake::FakeView;

    fn goal(raw: &str) -> VehicleGoal {
        crate::goal::parse(raw)
    }

    #[tokio::test]
    async fn structured_body_style_matched_from_goal() {
        let view = FakeView::new(vec![]);
        view.set_options(OptionsLayout::Structured(vec![OptionGroup {
            name: "Body Style".to_string(),
            values: vec!["2D Pickup".to_string(), "4D Pickup".to_string()],
            selected: None,
        }]));

        let goal = goal("2018 Ford F-150 2D Pickup");
        let mut auto_selected = BTreeMap::new();
        run(&view, &goal, &mut auto_selected).await.unwrap();

        let clicks = view.clicks.lock().unwrap().clone();
        assert_eq!(clicks, vec!["Body Style:2D Pickup"]);
        assert!(*view.confirmed.lock().unwrap());
        assert!(auto_selected.is_empty());
    }

    #[tokio::test]
    async fn structured_drive_type_auto_selects_first_when_unmatched() {
        let view = FakeView::new(vec![]);
        view.set_options(OptionsLayout::Structured(vec![OptionGroup {
            name: "Drive Type".to_string(),
            values: vec!["AWD".to_string(), "RWD".to_string()],
            selected: None,
        }]));

        let goal = goal("2018 Ford F-150");
        let mut auto_selected = BTreeMap::new();
        run(&view, &goal, &mut auto_selected).await.unwrap();

        assert_eq!(auto_selected.get("drive_type"), Some(&"AWD".to_string()));
    }

    #[tokio::test]
    async fn flat_layout_matches_unselected_value_against_goal() {
        let view = FakeView::new(vec![]);
        view.set_options(OptionsLayout::Flat {
            values: vec!["4D Pickup".to_string()],
            selected: vec![],
        });

        let goal = goal("2018 Ford F-150 4D Pickup");
        let mut auto_selected = BTreeMap::new();
        run(&view, &goal, &mut auto_selected).await.unwrap();

        let clicks = view.clicks.lock().unwrap().clone();
        assert_eq!(clicks, vec!["4D Pickup"]);
        assert!(auto_selected.is_empty());
    }

    #[tokio::test]
    async fn empty_option_group_fails_with_descriptive_error() {
        let view = FakeView::new(vec![]);
        view.set_options(OptionsLayout::Structured(vec![OptionGroup {
            name: "Transmission".to_string(),
            values: vec![],
            selected: None,
        }]));

        let goal = goal("2018 Ford F-150");
        let mut auto_selected = BTreeMap::new();
        let err = run(&view, &goal, &mut auto_selected).await.unwrap_err();
        assert!(matches!(err, NavError::Fail(msg) if msg.contains("no options available")));
    }
}
