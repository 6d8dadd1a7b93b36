//! The clarification callback, invoked only when a required field
//! (Year/Make/Model) is entirely absent from the goal, per §4.4.4.

use futures::future::BoxFuture;

/// Asks the caller to resolve a missing required option. Returning `Some`
/// continues navigation as if that value had been part of the goal all
/// along; returning `None` aborts navigation, and the unresolved request is
/// reported on `NavigationResult::clarifications`.
pub trait ClarificationCallback: Send + Sync {
    fn ask<'a>(
        &'a self,
        option_name: &'a str,
        available_values: &'a [String],
        message: &'a str,
    ) -> BoxFuture<'a, Option<String>>;
}

impl<F> ClarificationCallback for F
where
    F: Fn(&str, &[String], &str) -> BoxFuture<'static, Option<String>> + Send + Sync,
{
    fn ask<'a>(
        &'a self,
        option_name: &'a str,
        available_values: &'a [String],
        message: &'a str,
    ) -> BoxFuture<'a, Option<String>> {
        self(option_name, available_values, message)
    }
}
