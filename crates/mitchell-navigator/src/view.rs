//! The `PortalView` capability surface: everything the Navigator needs to
//! drive the vehicle selector, with no dependency on a concrete DOM library.
//!
//! Per the design note on "Opaque portal selectors", the actual selector
//! strings that locate a tab, a value list, an option group, or the confirm
//! button are not part of this crate's contract — they belong to whatever
//! implements this trait against a real browser (`mitchell-browser`'s
//! `BrowserDriver`/`thirtyfour`). This crate owns only the *policy*: which
//! tab to act on next, which value to pick, when to auto-select, when to
//! ask for clarification.

use async_trait::async_trait;
use mitchell_types::Result;

/// The selector's seven tabs, in the fixed order the portal presents them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Year,
    Make,
    Model,
    Engine,
    Submodel,
    Options,
}

impl std::fmt::Display for Tab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Tab::Year => "Year",
            Tab::Make => "Make",
            Tab::Model => "Model",
            Tab::Engine => "Engine",
            Tab::Submodel => "Submodel",
            Tab::Options => "Options",
        })
    }
}

impl Tab {
    /// The tab that follows this one in Phase 1's fixed order, or `None`
    /// once Phase 1 is exhausted (Submodel is the last Phase 1 tab).
    pub fn next(self) -> Option<Tab> {
        match self {
            Tab::Year => Some(Tab::Make),
            Tab::Make => Some(Tab::Model),
            Tab::Model => Some(Tab::Engine),
            Tab::Engine => Some(Tab::Submodel),
            Tab::Submodel => Some(Tab::Options),
            Tab::Options => None,
        }
    }

    /// The normalized key this tab's selection is recorded under in
    /// `auto_selected`, e.g. `Tab::Submodel` -> `"submodel"`.
    pub fn auto_selected_key(self) -> &'static str {
        match self {
            Tab::Year => "year",
            Tab::Make => "make",
            Tab::Model => "model",
            Tab::Engine => "engine",
            Tab::Submodel => "submodel",
            Tab::Options => "options",
        }
    }
}

/// One named group of selectable values on the Options tab, e.g. `"Body
/// Style"` with values `["2D Pickup", "4D Pickup", "Crew Cab"]`. Present
/// only in the *structured* Options-tab layout (§4.4.2); the *flat* layout
/// has no groups and is read via [`PortalView::flat_option_values`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionGroup {
    pub name: String,
    pub values: Vec<String>,
    pub selected: Option<String>,
}

/// Whether the Options tab is presenting structured groups or one flat list
/// of values with no group headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionsLayout {
    Structured(Vec<OptionGroup>),
    Flat {
        /// Every selectable value, in display order.
        values: Vec<String>,
        /// The subset of `values` already selected (clicked).
        selected: Vec<String>,
    },
}

/// Abstracts the vehicle-selector DOM so the Navigator's matching policy can
/// be exercised against a fake implementation in tests.
#[async_trait]
pub trait PortalView: Send + Sync {
    /// Runs the selector's open sequence (vehicle-selector button, "Vehicle
    /// Selection" accordion, wait for the tab list) and resets to the Year
    /// tab. Idempotent: calling this when already open just resets to Year.
    async fn open(&self) -> Result<()>;

    /// Whether the selector is currently visible at all. `false` once the
    /// user has confirmed a vehicle and the selector has closed.
    async fn is_open(&self) -> Result<bool>;

    /// The tab the selector currently has active, if the selector is open
    /// and a tab is unambiguously current.
    async fn active_tab(&self) -> Result<Option<Tab>>;

    /// The right-column value list for the active tab, waiting briefly for
    /// it to populate if it is momentarily empty (the portal loads each
    /// tab's values asynchronously after a click).
    async fn wait_for_values(&self) -> Result<Vec<String>>;

    /// Clicks the value matching `text` (exact case-insensitive match is
    /// attempted by the caller first; this method clicks whatever text was
    /// decided on).
    async fn click_value(&self, text: &str) -> Result<()>;

    /// Reads the Options tab's layout, structured or flat.
    async fn options_layout(&self) -> Result<OptionsLayout>;

    /// Clicks a value within a named option group (structured layout only).
    async fn click_group_value(&self, group: &str, value: &str) -> Result<()>;

    /// Whether the "Use This Vehicle" confirm button is present and
    /// enabled.
    async fn confirm_enabled(&self) -> Result<bool>;

    /// Clicks the confirm button.
    async fn confirm(&self) -> Result<()>;

    /// Clicks the cancel/close affordance, abandoning the in-progress
    /// selection. Called on every failure path before `navigate` returns,
    /// per §4.4.5.
    async fn cancel(&self) -> Result<()>;
}

#[cfg(test)]
pub mod fake {
    //! A scripted, in-memory [`PortalView`] used by this crate's own tests
    //! and by `mitchell-agent`'s Request Handler tests. Not part of the
    //! public API surface shipped to downstream crates.

    use std::sync::Mutex;

    use super::*;

    /// One step of canned portal state, consumed in order as the Navigator
    /// progresses through tabs.
    #[derive(Debug, Clone)]
    pub struct FakeTabState {
        pub tab: Tab,
        pub values: Vec<String>,
    }

    pub struct FakeView {
        steps: Mutex<Vec<FakeTabState>>,
        options: Mutex<Option<OptionsLayout>>,
        confirm_ready: Mutex<bool>,
        pub opened: Mutex<bool>,
        pub cancelled: Mutex<bool>,
        pub confirmed: Mutex<bool>,
        pub clicks: Mutex<Vec<String>>,
    }

    impl FakeView {
        pub fn new(steps: Vec<FakeTabState>) -> Self {
            Self {
                steps: Mutex::new(steps),
                options: Mutex::new(None),
                confirm_ready: Mutex::new(false),
                opened: Mutex::new(false),
                cancelled: Mutex::new(false),
                confirmed: Mutex::new(false),
                clicks: Mutex::new(Vec::new()),
            }
        }

        pub fn set_options(&self, layout: OptionsLayout) {
            *self.options.lock().unwrap() = Some(layout);
        }

        pub fn set_confirm_ready(&self, ready: bool) {
            *self.confirm_ready.lock().unwrap() = ready;
        }
    }

    #[async_trait]
    impl PortalView for FakeView {
        async fn open(&self) -> Result<()> {
            *self.opened.lock().unwrap() = true;
            Ok(())
        }

        async fn is_open(&self) -> Result<bool> {
            Ok(!self.steps.lock().unwrap().is_empty() || self.options.lock().unwrap().is_some())
        }

        async fn active_tab(&self) -> Result<Option<Tab>> {
            let steps = self.steps.lock().unwrap();
            if let Some(step) = steps.first() {
                return Ok(Some(step.tab));
            }
            if self.options.lock().unwrap().is_some() {
                return Ok(Some(Tab::Options));
            }
            Ok(None)
        }

        async fn wait_for_values(&self) -> Result<Vec<String>> {
            let steps = self.steps.lock().unwrap();
            Ok(steps.first().map(|s| s.values.clone()).unwrap_or_default())
        }

        async fn click_value(&self, text: &str) -> Result<()> {
            self.clicks.lock().unwrap().push(text.to_string());

            let mut steps = self.steps.lock().unwrap();
            if !steps.is_empty() {
                steps.remove(0);
                return Ok(());
            }
            drop(steps);

            let mut options = self.options.lock().unwrap();
            if let Some(OptionsLayout::Flat { values, selected }) = options.as_mut()
                && values.contains(&text.to_string())
                && !selected.contains(&text.to_string())
            {
                selected.push(text.to_string());
                if selected.len() == values.len() {
                    *self.confirm_ready.lock().unwrap() = true;
                }
            }
            Ok(())
        }

        async fn options_layout(&self) -> Result<OptionsLayout> {
            Ok(self
                .options
                .lock()
                .unwrap()
                .clone()
                .unwrap_or(OptionsLayout::Flat { values: vec![], selected: vec![] }))
        }

        async fn click_group_value(&self, group: &str, value: &str) -> Result<()> {
            self.clicks.lock().unwrap().push(format!("{group}:{value}"));
            let mut options = self.options.lock().unwrap();
            if let Some(OptionsLayout::Structured(groups)) = options.as_mut() {
                for g in groups.iter_mut() {
                    if g.name == group {
                        g.selected = Some(value.to_string());
                    }
                }
                if groups.iter().all(|g| g.selected.is_some()) {
                    *self.confirm_ready.lock().unwrap() = true;
                }
            }
            Ok(())
        }

        async fn confirm_enabled(&self) -> Result<bool> {
            Ok(*self.confirm_ready.lock().unwrap())
        }

        async fn confirm(&self) -> Result<()> {
            *self.confirmed.lock().unwrap() = true;
            *self.options.lock().unwrap() = None;
            Ok(())
        }

        async fn cancel(&self) -> Result<()> {
            *self.cancelled.lock().unwrap() = true;
            self.steps.lock().unwrap().clear();
            *self.options.lock().unwrap() = None;
            Ok(())
        }
    }
}
