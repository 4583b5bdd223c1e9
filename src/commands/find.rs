//! Element lookup. The base runtime owns strategy validation and the
//! find-failure page-source dump; the actual search is a device hook.

use async_trait::async_trait;
use serde_json::Value;

use crate::driver::CoreHolder;
use crate::error::{DriverError, Result};

#[async_trait]
pub trait FindCommands: CoreHolder {
    /// Device hook: perform the actual search. `context` is the parent
    /// element id for from-element lookups.
    async fn find_el_or_els(
        &self,
        _strategy: &str,
        _selector: &str,
        _multiple: bool,
        _context: Option<&str>,
    ) -> Result<Value> {
        Err(DriverError::NotYetImplemented("findElOrEls".into()))
    }

    /// Device hook: a serialized dump of the current UI.
    async fn get_page_source(&self) -> Result<String> {
        Err(DriverError::NotYetImplemented("getPageSource".into()))
    }

    /// Reject strategies the session has not enabled, naming the ones it
    /// has.
    fn validate_locator_strategy(&self, strategy: &str) -> Result<()> {
        let strategies = self.core().state().read().locator_strategies.clone();
        if strategies.iter().any(|s| s == strategy) {
            return Ok(());
        }
        Err(DriverError::InvalidSelector(format!(
            "locator strategy '{strategy}' is not supported for this session; \
             supported strategies: [{}]",
            strategies.join(", "),
        )))
    }

    async fn find_element(&self, strategy: &str, selector: &str) -> Result<Value> {
        self.find_checked(strategy, selector, false, None).await
    }

    async fn find_elements(&self, strategy: &str, selector: &str) -> Result<Value> {
        self.find_checked(strategy, selector, true, None).await
    }

    async fn find_element_from_element(
        &self,
        strategy: &str,
        selector: &str,
        element_id: &str,
    ) -> Result<Value> {
        self.find_checked(strategy, selector, false, Some(element_id)).await
    }

    async fn find_elements_from_element(
        &self,
        strategy: &str,
        selector: &str,
        element_id: &str,
    ) -> Result<Value> {
        self.find_checked(strategy, selector, true, Some(element_id)).await
    }

    /// Common find path: validate the strategy, run the device hook, and
    /// on failure dump the page source when the session asked for it.
    async fn find_checked(
        &self,
        strategy: &str,
        selector: &str,
        multiple: bool,
        context: Option<&str>,
    ) -> Result<Value> {
        self.validate_locator_strategy(strategy)?;
        match self.find_el_or_els(strategy, selector, multiple, context).await {
            Ok(found) => Ok(found),
            Err(err) => {
                let dump_source =
                    self.core().state().read().opts.print_page_source_on_find_failure;
                if dump_source {
                    match self.get_page_source().await {
                        Ok(source) => {
                            tracing::info!(%strategy, %selector, source = %source,
                                "page source at find failure");
                        }
                        Err(source_err) => {
                            tracing::warn!(error = %source_err,
                                "could not capture page source after find failure");
                        }
                    }
                }
                Err(err)
            }
        }
    }
}
