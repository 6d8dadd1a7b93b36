//! Drives the vehicle-selector DOM for [`mitchell_navigator::Navigator`]
//! against a real portal session.
//!
//! Selector strategy mirrors `mitchell-browser::connection`'s fallback
//! chain: a primary `data-testid` attribute selector first, then looser
//! class/content-based fallbacks. Per the design note on "Opaque portal
//! selectors" (spec §9), these strings are illustrative, not load-bearing —
//! the real portal markup is unknown outside a live ShopKeyPro session.

use std::time::Duration;

use async_trait::async_trait;
use mitchell_browser::{By, WebDriver, WebElement};
use mitchell_navigator::{OptionGroup, OptionsLayout, PortalView, Tab};
use mitchell_types::{Error, ErrorKind, Result};
use tokio::time::sleep;

fn werr(context: &'static str, error: thirtyfour::error::WebDriverError) -> Error {
    mitchell_browser::BrowserError::webdriver(error, Some(context.to_string())).into()
}

fn elerr(operation: &str, selector: Option<&str>, reason: impl Into<String>) -> Error {
    mitchell_browser::BrowserError::element_error(operation, selector.map(str::to_string), reason)
        .into()
}

/// The `MITCHELL_NAV_DELAY_*` timing knobs the portal view sleeps on
/// between DOM interactions. All six are configurable rather than
/// compiled-in constants, per §9's navigator-timing Open Question
/// resolution; these values are the defaults the spec's fixed figures
/// become.
#[derive(Debug, Clone, Copy)]
pub struct NavDelays {
    /// After clicking a tab value, before reading the next tab's state.
    pub short: Duration,
    /// After an action with a moderate visual transition.
    pub medium: Duration,
    /// After confirming a vehicle, while the portal navigates away from
    /// the selector.
    pub long: Duration,
    /// Waiting for a tab's value list to populate after becoming active.
    pub ajax: Duration,
    /// Between the steps of a multi-click interaction (e.g. group then
    /// value).
    pub step: Duration,
    /// After opening the vehicle-selector modal.
    pub modal: Duration,
}

impl Default for NavDelays {
    fn default() -> Self {
        Self {
            short: Duration::from_millis(500),
            medium: Duration::from_millis(1_000),
            long: Duration::from_millis(2_000),
            ajax: Duration::from_millis(1_500),
            step: Duration::from_secs(1),
            modal: Duration::from_secs(1),
        }
    }
}

const OPEN_BUTTON: &[&str] = &[
    "[data-testid='vehicle-selector-open']",
    "[data-testid='vehicle-selector']",
    ".vehicle-selector-trigger",
];
const TAB_LIST: &str = "[data-testid='vehicle-selector-tabs']";
const ACTIVE_TAB: &str = "[data-testid='vehicle-selector-tabs'] [aria-selected='true']";
const VALUE_LIST: &str = "[data-testid='vehicle-selector-values'] [data-testid^='value-']";
const OPTION_GROUPS: &str = "[data-testid='vehicle-selector-values'] [data-testid='option-group']";
const GROUP_NAME: &str = "[data-testid='option-group-name']";
const GROUP_VALUES: &str = "[data-testid^='option-value-']";
const CONFIRM_BUTTON: &str = "[data-testid='confirm-vehicle']";
const CANCEL_BUTTON: &str = "[data-testid='cancel-vehicle-selector'], [data-testid='close-vehicle-selector']";

/// Drives the vehicle-selector tabs/value-list/option-group/confirm flow
/// over a borrowed [`WebDriver`].
pub struct BrowserPortalView<'a> {
    client: &'a WebDriver,
    delays: NavDelays,
}

impl<'a> BrowserPortalView<'a> {
    pub fn new(client: &'a WebDriver, delays: NavDelays) -> Self {
        Self { client, delays }
    }

    async fn locate(&self, selectors: &[&str]) -> Result<WebElement> {
        for selector in selectors {
            if let Ok(el) = self.client.find(By::Css(selector)).await {
                return Ok(el);
            }
        }
        Err(elerr("locate", selectors.first().copied(), "not found by any selector in the fallback chain"))
    }

    async fn tab_selector(&self, tab: Tab) -> String {
        format!("{TAB_LIST} [data-tab='{}']", tab.auto_selected_key())
    }
}

#[async_trait]
impl<'a> PortalView for BrowserPortalView<'a> {
    async fn open(&self) -> Result<()> {
        if self.is_open().await? {
            return self.click_value_by_selector(&self.tab_selector(Tab::Year).await).await;
        }

        let open_button = self.locate(OPEN_BUTTON).await?;
        open_button.click().await.map_err(|e| werr("open vehicle selector", e))?;
        sleep(self.delays.modal).await;

        self.client
            .find(By::Css(TAB_LIST))
            .await
            .map_err(|e| werr("wait for vehicle selector tabs", e))?;
        Ok(())
    }

    async fn is_open(&self) -> Result<bool> {
        Ok(self.client.find(By::Css(TAB_LIST)).await.is_ok())
    }

    async fn active_tab(&self) -> Result<Option<Tab>> {
        let Ok(el) = self.client.find(By::Css(ACTIVE_TAB)).await else {
            return Ok(None);
        };
        let key = el.attr("data-tab").await.map_err(|e| werr("read active tab", e))?;
        Ok(key.and_then(|k| match k.as_str() {
            "year" => Some(Tab::Year),
            "make" => Some(Tab::Make),
            "model" => Some(Tab::Model),
            "engine" => Some(Tab::Engine),
            "submodel" => Some(Tab::Submodel),
            "options" => Some(Tab::Options),
            _ => None,
        }))
    }

    async fn wait_for_values(&self) -> Result<Vec<String>> {
        sleep(self.delays.ajax).await;
        let mut values = self.read_value_list().await?;
        if values.is_empty() {
            sleep(self.delays.short).await;
            values = self.read_value_list().await?;
        }
        Ok(values)
    }

    async fn click_value(&self, text: &str) -> Result<()> {
        let elements = self
            .client
            .find_all(By::Css(VALUE_LIST))
            .await
            .map_err(|e| werr("click value", e))?;

        for el in &elements {
            if let Ok(label) = el.text().await
                && label.eq_ignore_ascii_case(text)
            {
                el.click().await.map_err(|e| werr("click value", e))?;
                sleep(self.delays.step).await;
                return Ok(());
            }
        }
        Err(elerr("click_value", Some(VALUE_LIST), format!("no value matching '{text}'")))
    }

    async fn options_layout(&self) -> Result<OptionsLayout> {
        let groups = self
            .client
            .find_all(By::Css(OPTION_GROUPS))
            .await
            .map_err(|e| werr("read options layout", e))?;

        if groups.is_empty() {
            let values = self.read_value_list().await?;
            let mut selected = Vec::new();
            for el in self
                .client
                .find_all(By::Css(&format!("{VALUE_LIST}[aria-selected='true']")))
                .await
                .unwrap_or_default()
            {
                if let Ok(text) = el.text().await {
                    selected.push(text);
                }
            }
            return Ok(OptionsLayout::Flat { values, selected });
        }

        let mut structured = Vec::with_capacity(groups.len());
        for group in &groups {
            let name = group
                .find(By::Css(GROUP_NAME))
                .await
                .map_err(|e| werr("read option group name", e))?
                .text()
                .await
                .map_err(|e| werr("read option group name", e))?;

            let value_elements = group
                .find_all(By::Css(GROUP_VALUES))
                .await
                .map_err(|e| werr("read option group values", e))?;

            let mut values = Vec::with_capacity(value_elements.len());
            let mut selected = None;
            for el in &value_elements {
                let text = el.text().await.map_err(|e| werr("read option group value", e))?;
                if el.attr("aria-selected").await.ok().flatten().as_deref() == Some("true") {
                    selected = Some(text.clone());
                }
                values.push(text);
            }

            structured.push(OptionGroup { name, values, selected });
        }
        Ok(OptionsLayout::Structured(structured))
    }

    async fn click_group_value(&self, group: &str, value: &str) -> Result<()> {
        let groups = self
            .client
            .find_all(By::Css(OPTION_GROUPS))
            .await
            .map_err(|e| werr("click group value", e))?;

        for group_el in &groups {
            let Ok(name_el) = group_el.find(By::Css(GROUP_NAME)).await else {
                continue;
            };
            let Ok(name) = name_el.text().await else {
                continue;
            };
            if !name.eq_ignore_ascii_case(group) {
                continue;
            }

            let values = group_el
                .find_all(By::Css(GROUP_VALUES))
                .await
                .map_err(|e| werr("click group value", e))?;
            for value_el in &values {
                if let Ok(text) = value_el.text().await
                    && text.eq_ignore_ascii_case(value)
                {
                    value_el.click().await.map_err(|e| werr("click group value", e))?;
                    sleep(self.delays.step).await;
                    return Ok(());
                }
            }
        }

        Err(elerr(
            "click_group_value",
            Some(OPTION_GROUPS),
            format!("no group '{group}' with value '{value}'"),
        ))
    }

    async fn confirm_enabled(&self) -> Result<bool> {
        let Ok(el) = self.client.find(By::Css(CONFIRM_BUTTON)).await else {
            return Ok(false);
        };
        let disabled = el.attr("disabled").await.map_err(|e| werr("confirm_enabled", e))?;
        Ok(disabled.is_none())
    }

    async fn confirm(&self) -> Result<()> {
        let el = self
            .client
            .find(By::Css(CONFIRM_BUTTON))
            .await
            .map_err(|e| werr("confirm", e))?;
        el.click().await.map_err(|e| werr("confirm", e))?;
        sleep(self.delays.long).await;
        Ok(())
    }

    async fn cancel(&self) -> Result<()> {
        if let Ok(el) = self.client.find(By::Css(CANCEL_BUTTON)).await {
            let _ = el.click().await;
        }
        Ok(())
    }
}

impl<'a> BrowserPortalView<'a> {
    async fn click_value_by_selector(&self, selector: &str) -> Result<()> {
        let el = self.client.find(By::Css(selector)).await.map_err(|e| werr("reset to year tab", e))?;
        el.click().await.map_err(|e| werr("reset to year tab", e))
    }

    async fn read_value_list(&self) -> Result<Vec<String>> {
        let elements = self
            .client
            .find_all(By::Css(VALUE_LIST))
            .await
            .unwrap_or_default();
        let mut values = Vec::with_capacity(elements.len());
        for el in &elements {
            if let Ok(text) = el.text().await {
                values.push(text);
            }
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_auto_selected_keys_match_portal_data_attributes() {
        assert_eq!(Tab::Year.auto_selected_key(), "year");
        assert_eq!(Tab::Options.auto_selected_key(), "options");
    }

    #[test]
    fn default_delays_are_all_nonzero() {
        let delays = NavDelays::default();
        assert!(delays.short.as_millis() > 0);
        assert!(delays.modal.as_millis() > 0);
    }
}
