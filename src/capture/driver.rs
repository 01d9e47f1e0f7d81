//! Chromiumoxide-backed browser driver (§5, §9 "Browser ownership").
//!
//! Navigation, DOM/element extraction, and the a11y scan are all driven by
//! injected JavaScript evaluated in the page — the driver itself never
//! inspects the DOM through anything but `Page::evaluate`, so everything
//! it produces is already capture-scoped, serializable data by the time
//! it leaves this module.

use super::{A11yReport, A11yViolation, DomNode, ElementInfo, PageCapture, Viewport};
use crate::error::{Error, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::task::JoinHandle;

const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns a headless browser process for the lifetime of one or more
/// captures. Dropping it aborts the background handler task so the
/// chromium subprocess isn't leaked (§9).
pub struct BrowserDriver {
    browser: Browser,
    handler: Option<JoinHandle<()>>,
}

impl BrowserDriver {
    pub async fn launch(viewport: Viewport) -> Result<Self> {
        let config = BrowserConfig::builder()
            .window_size(viewport.width.max(1), viewport.height.max(1))
            .build()
            .map_err(|e| Error::NavigationError(format!("browser config: {e}")))?;

        let (browser, mut handler_stream) = Browser::launch(config)
            .await
            .map_err(|e| Error::NavigationError(format!("launch failed: {e}")))?;

        let handler = tokio::spawn(async move { while handler_stream.next().await.is_some() {} });

        Ok(Self { browser, handler: Some(handler) })
    }

    /// Navigate to `url` and wait for the load event, bounded by `timeout`
    /// (default 30s, §5 "Cancellation & timeouts").
    pub async fn navigate(&self, url: &str, timeout: Option<Duration>) -> Result<Page> {
        let timeout = timeout.unwrap_or(DEFAULT_NAVIGATION_TIMEOUT);

        tokio::time::timeout(timeout, async {
            let page = self
                .browser
                .new_page(url)
                .await
                .map_err(|e| Error::NavigationError(e.to_string()))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| Error::NavigationError(e.to_string()))?;
            Ok::<Page, Error>(page)
        })
        .await
        .map_err(|_| Error::NavigationTimeout(timeout))?
    }

    /// Capture screenshot + bounded DOM tree + a11y scan + per-element data
    /// for `page`, writing `screenshot.png` under `artifact_dir`. Run once
    /// per review (§4.2 step 3); everything downstream reads this snapshot.
    pub async fn capture(
        &self,
        page: &Page,
        artifact_dir: &Path,
        scope_selector: Option<&str>,
    ) -> Result<PageCapture> {
        let url = page.url().await.map_err(|e| Error::NavigationError(e.to_string()))?.unwrap_or_default();

        let screenshot_bytes = page
            .screenshot(chromiumoxide::page::ScreenshotParams::builder().full_page(false).build())
            .await
            .map_err(|e| Error::NavigationError(format!("screenshot failed: {e}")))?;

        std::fs::create_dir_all(artifact_dir)?;
        let screenshot_path = artifact_dir.join("screenshot.png");
        std::fs::write(&screenshot_path, &screenshot_bytes)?;

        let viewport = evaluate_json::<Viewport>(page, VIEWPORT_SCRIPT).await.unwrap_or_default();

        let dom_tree = evaluate_json::<DomNode>(page, &dom_script(scope_selector)).await.ok();

        let a11y_report = match evaluate_json::<Vec<A11yViolation>>(page, A11Y_SCRIPT).await {
            Ok(violations) => A11yReport { violations, skipped: false },
            Err(_) => A11yReport { violations: Vec::new(), skipped: true },
        };

        let elements = evaluate_json::<Vec<ElementInfo>>(page, &elements_script(scope_selector))
            .await
            .unwrap_or_default();

        Ok(PageCapture {
            url,
            viewport,
            timestamp: chrono::Utc::now(),
            screenshot_path: screenshot_path.to_string_lossy().to_string(),
            dom_tree,
            a11y_report,
            elements,
        })
    }
}

impl Drop for BrowserDriver {
    fn drop(&mut self) {
        if let Some(handle) = self.handler.take() {
            handle.abort();
        }
    }
}

async fn evaluate_json<T: serde::de::DeserializeOwned>(page: &Page, script: &str) -> Result<T> {
    let value: serde_json::Value = page
        .evaluate(script)
        .await
        .map_err(|e| Error::NavigationError(format!("evaluate failed: {e}")))?
        .into_value()
        .map_err(|e| Error::NavigationError(format!("evaluate result: {e}")))?;
    serde_json::from_value(value).map_err(Error::from)
}

const VIEWPORT_SCRIPT: &str = "({width: window.innerWidth, height: window.innerHeight})";

/// Walks up to 3 non-utility-agnostic ancestors and the element's own
/// selected computed style properties; depth/children/text are capped per
/// §3.2 (full-mode bounds: depth ≤5, ≤20 children, text ≤100 chars).
fn dom_script(scope_selector: Option<&str>) -> String {
    let root = scope_selector.unwrap_or("body");
    format!(
        r#"(function() {{
  function node(el, depth) {{
    if (!el || depth > 5) return null;
    const children = [];
    const kids = el.children ? Array.from(el.children).slice(0, 20) : [];
    for (const kid of kids) {{
      const child = node(kid, depth + 1);
      if (child) children.push(child);
    }}
    return {{
      tag: el.tagName ? el.tagName.toLowerCase() : '',
      id: el.id || null,
      classes: el.className && el.className.split ? el.className.split(/\s+/).filter(Boolean) : [],
      text: (el.textContent || '').trim().slice(0, 100),
      children: children,
    }};
  }}
  const root = document.querySelector({root:?});
  return node(root, 0) || {{tag: '', id: null, classes: [], text: '', children: []}};
}})()"#
    )
}

/// Per-element extraction: tag/id/classes/selected computed styles/bounding
/// box/ancestor chain (≤3)/truncated text, for every element under scope
/// (or the full document). This is the only source elements.rs evaluators
/// read from (§4.3 contract boundary). Focusable elements are momentarily
/// `.focus()`ed so `outline-style`/`box-shadow` reflect the page's
/// `:focus-visible` styling rather than the resting state (§4.3
/// focus-indicators).
fn elements_script(scope_selector: Option<&str>) -> String {
    let root = scope_selector.unwrap_or("body");
    r#"(function() {
  const STYLE_PROPS = ['color', 'background-color', 'outline-style', 'box-shadow', 'font-size'];
  function ancestorChain(el) {
    const chain = [];
    let cur = el.parentElement;
    while (cur && chain.length < 3) {
      chain.push({
        tag: cur.tagName.toLowerCase(),
        id: cur.id || null,
        classes: cur.className && cur.className.split ? cur.className.split(/\s+/).filter(Boolean) : [],
        background_color: window.getComputedStyle(cur).getPropertyValue('background-color'),
      });
      cur = cur.parentElement;
    }
    return chain;
  }
  const FOCUSABLE_TAGS = ['A', 'BUTTON', 'INPUT', 'SELECT', 'TEXTAREA'];
  function isFocusable(el) {
    return FOCUSABLE_TAGS.includes(el.tagName) || el.hasAttribute('tabindex');
  }
  function elementInfo(el) {
    const cs = window.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    const styles = {};
    for (const prop of STYLE_PROPS) styles[prop] = cs.getPropertyValue(prop);
    if (isFocusable(el)) {
      // outline-style/box-shadow are read again under :focus(-visible) so
      // the focus-indicators check sees what a keyboard user actually does.
      try {
        el.focus({ preventScroll: true });
        const focusedStyle = window.getComputedStyle(el);
        styles['outline-style'] = focusedStyle.getPropertyValue('outline-style');
        styles['box-shadow'] = focusedStyle.getPropertyValue('box-shadow');
        el.blur();
      } catch (e) {}
    }
    if (el.getAttribute('role')) styles['role'] = el.getAttribute('role');
    if (el.hasAttribute('alt')) styles['alt'] = el.getAttribute('alt');
    if (el.type) styles['type'] = el.type;
    return {
      tag: el.tagName.toLowerCase(),
      id: el.id || null,
      classes: el.className && el.className.split ? el.className.split(/\s+/).filter(Boolean) : [],
      computed_styles: styles,
      bounding_box: { x: rect.x, y: rect.y, width: rect.width, height: rect.height },
      parent_chain: ancestorChain(el),
      text_content: (el.textContent || '').trim().slice(0, 100),
    };
  }
  const root = document.querySelector(ROOT_PLACEHOLDER) || document.body;
  return Array.from(root.querySelectorAll('*')).map(elementInfo);
})()"#
        .replace("ROOT_PLACEHOLDER", &format!("{root:?}"))
}

/// Minimal heuristic accessibility scan (missing alt text, unlabeled form
/// controls, unnamed buttons) standing in for the wire-compatible
/// axe-like engine schema the capture type (§6.1) describes.
const A11Y_SCRIPT: &str = r#"(function() {
  const violations = [];
  function pushViolation(id, impact, description, el) {
    violations.push({ id, impact, description, nodes: [{ html: el.outerHTML.slice(0, 200) }] });
  }
  document.querySelectorAll('img').forEach((img) => {
    if (!img.hasAttribute('alt')) pushViolation('image-alt', 'serious', 'Image has no alt attribute', img);
  });
  document.querySelectorAll('input, select, textarea').forEach((field) => {
    const labelled = field.id && document.querySelector(`label[for="${field.id}"]`);
    const hasAria = field.hasAttribute('aria-label') || field.hasAttribute('aria-labelledby');
    if (!labelled && !hasAria) pushViolation('label', 'moderate', 'Form field has no associated label', field);
  });
  document.querySelectorAll('button, [role=button]').forEach((btn) => {
    const text = (btn.textContent || '').trim();
    if (!text && !btn.hasAttribute('aria-label')) pushViolation('button-name', 'serious', 'Button has no accessible name', btn);
  });
  return violations;
})()"#;
