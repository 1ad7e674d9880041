//! Low-level helpers for driving a tab: bounded waits, form filling and
//! HTML capture. Every wait polls with a hard deadline so a hung page can
//! never park a worker forever.

use super::manager::BrowserError;
use headless_chrome::Tab;
use std::sync::Arc;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Navigate to a URL and wait for the page load to settle
pub fn navigate(tab: &Arc<Tab>, url: &str) -> Result<(), BrowserError> {
    tab.navigate_to(url)
        .map_err(|e| BrowserError::Navigation(format!("failed to navigate to {}: {}", url, e)))?;
    tab.wait_until_navigated()
        .map_err(|e| BrowserError::Navigation(format!("navigation timeout for {}: {}", url, e)))?;
    Ok(())
}

/// Wait until an element matching `selector` exists
pub fn wait_for_selector(
    tab: &Arc<Tab>,
    selector: &str,
    timeout: Duration,
) -> Result<(), BrowserError> {
    let start = Instant::now();
    loop {
        if element_exists(tab, selector) {
            return Ok(());
        }
        if start.elapsed() > timeout {
            return Err(BrowserError::Timeout(format!("selector {}", selector)));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Wait until any of the candidate selectors matches, returning the winner.
/// Candidate lists tolerate markup variation across Unit3D themes.
pub fn wait_for_any<'a>(
    tab: &Arc<Tab>,
    selectors: &[&'a str],
    timeout: Duration,
) -> Result<&'a str, BrowserError> {
    let start = Instant::now();
    loop {
        for &selector in selectors {
            if element_exists(tab, selector) {
                return Ok(selector);
            }
        }
        if start.elapsed() > timeout {
            return Err(BrowserError::Timeout(format!(
                "any of [{}]",
                selectors.join(", ")
            )));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Wait until the tab's URL satisfies `pred`
pub fn wait_for_url<F>(tab: &Arc<Tab>, pred: F, timeout: Duration) -> Result<String, BrowserError>
where
    F: Fn(&str) -> bool,
{
    let start = Instant::now();
    loop {
        let url = tab.get_url();
        if pred(&url) {
            return Ok(url);
        }
        if start.elapsed() > timeout {
            return Err(BrowserError::Timeout(format!("url change from {}", url)));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn element_exists(tab: &Arc<Tab>, selector: &str) -> bool {
    let script = format!(
        r#"document.querySelector('{}') !== null"#,
        selector.replace('\'', "\\'")
    );
    match tab.evaluate(&script, false) {
        Ok(result) => result.value.and_then(|v| v.as_bool()).unwrap_or(false),
        Err(_) => false,
    }
}

/// Type text into the first element matching `selector`
pub fn type_into(tab: &Arc<Tab>, selector: &str, text: &str) -> Result<(), BrowserError> {
    let element = tab
        .find_element(selector)
        .map_err(|e| BrowserError::ElementNotFound(format!("{}: {}", selector, e)))?;
    element
        .click()
        .and_then(|el| el.type_into(text))
        .map_err(|e| BrowserError::Navigation(format!("typing into {}: {}", selector, e)))?;
    Ok(())
}

/// Click the first element matching `selector`
pub fn click(tab: &Arc<Tab>, selector: &str) -> Result<(), BrowserError> {
    let element = tab
        .find_element(selector)
        .map_err(|e| BrowserError::ElementNotFound(format!("{}: {}", selector, e)))?;
    element
        .click()
        .map_err(|e| BrowserError::Navigation(format!("clicking {}: {}", selector, e)))?;
    Ok(())
}

/// Get the full HTML of the current page
pub fn get_html(tab: &Arc<Tab>) -> Result<String, BrowserError> {
    tab.get_content()
        .map_err(|e| BrowserError::HtmlExtraction(e.to_string()))
}

/// Close the tab, logging instead of failing; used on every exit path so a
/// dead tab never leaks into the shared browser.
pub fn close_tab(tab: &Arc<Tab>) {
    if let Err(e) = tab.close(true) {
        log::debug!("Tab close failed (already gone?): {}", e);
    }
}
