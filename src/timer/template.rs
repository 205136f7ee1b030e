//! HTML rendering of a [`TimerSpec`].
//!
//! The script below is fixed; each timer differs only in the JSON spec and the
//! element id substituted into the template.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use uuid::Uuid;

use super::spec::TimerSpec;

const ELEMENT_ID_SLOT: &str = "{{ELEMENT_ID}}";
const SPEC_SLOT: &str = "{{TIMER_SPEC}}";
const BODY_SLOT: &str = "{{BODY}}";

const FRAGMENT_TEMPLATE: &str = r#"<div id="{{ELEMENT_ID}}" class="advscope-timer" style="font-size:72px;font-weight:600;font-family:monospace;text-align:center;margin-top:40px;"></div>
<script type="application/json" id="{{ELEMENT_ID}}-spec">{{TIMER_SPEC}}</script>
<script>
(function () {
  const el = document.getElementById("{{ELEMENT_ID}}");
  const spec = JSON.parse(document.getElementById("{{ELEMENT_ID}}-spec").textContent);
  let remaining = spec.total_seconds;
  let warned = false;
  el.style.color = spec.base_color;

  function pad(n) { return n.toString().padStart(2, "0"); }
  function clock(s) { return pad(Math.floor(s / 60)) + ":" + pad(s % 60); }
  function speak(text) {
    if (!("speechSynthesis" in window)) return;
    window.speechSynthesis.cancel();
    window.speechSynthesis.speak(new SpeechSynthesisUtterance(text));
  }

  const interval = setInterval(function () {
    if (!warned && spec.warn_seconds > 0 && remaining === spec.warn_seconds) {
      warned = true;
      speak(spec.warning_speech);
    }
    if (remaining <= spec.alert_below_seconds) {
      el.style.color = spec.alert_color;
    }
    el.innerText = spec.title + " " + clock(remaining);
    remaining--;
    if (remaining < 0) {
      clearInterval(interval);
      el.innerText = spec.finished_text;
      speak(spec.end_message);
    }
  }, spec.tick_millis);
})();
</script>"#;

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Countdown</title>
</head>
<body>
{{BODY}}
</body>
</html>
"#;

/// Serialize the spec so it can sit inside a `<script>` element: `<`, `>` and
/// `&` are escaped so the payload can never close the element early.
fn embeddable_json(spec: &TimerSpec) -> Result<String> {
    let json = serde_json::to_string(spec).context("Failed to serialize timer spec")?;
    Ok(json
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026"))
}

/// Render an embeddable `<div>` plus script, using `element_id` for the node.
pub fn render_fragment_with_id(spec: &TimerSpec, element_id: &str) -> Result<String> {
    let json = embeddable_json(spec)?;
    Ok(FRAGMENT_TEMPLATE
        .replace(ELEMENT_ID_SLOT, element_id)
        .replace(SPEC_SLOT, &json))
}

/// Render an embeddable fragment with a fresh element id, so several timers
/// can share one page.
pub fn render_fragment(spec: &TimerSpec) -> Result<String> {
    let id = format!("advscope-timer-{}", Uuid::new_v4().simple());
    render_fragment_with_id(spec, &id)
}

/// Render a standalone HTML document.
pub fn render_page(spec: &TimerSpec) -> Result<String> {
    let fragment = render_fragment(spec)?;
    Ok(PAGE_TEMPLATE.replace(BODY_SLOT, &fragment))
}

/// Write a standalone page to `path`.
pub fn write_page(spec: &TimerSpec, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let page = render_page(spec)?;
    std::fs::write(path, page)
        .with_context(|| format!("Failed to write timer page to {}", path.display()))?;
    info!(
        path = %path.display(),
        total_seconds = spec.total_seconds,
        warn_seconds = spec.warn_seconds,
        "Wrote countdown timer"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::spec::{TimerEnabled, TimerRequest};

    fn spec() -> TimerSpec {
        TimerSpec::resolve(&TimerRequest {
            enabled: TimerEnabled::Minutes(10.0),
            ..TimerRequest::default()
        })
        .unwrap()
    }

    #[test]
    fn test_fragment_substitutes_every_slot() {
        let html = render_fragment_with_id(&spec(), "t1").unwrap();
        assert!(!html.contains("{{"));
        assert!(html.contains(r#"<div id="t1""#));
        assert!(html.contains(r#"id="t1-spec""#));
        assert!(html.contains(r#""total_seconds":600"#));
        assert!(html.contains(r#""warn_seconds":300"#));
        assert!(html.contains(r#""tick_millis":1000"#));
    }

    #[test]
    fn test_spec_payload_cannot_close_script() {
        let mut spec = spec();
        spec.title = "</script><b>x</b> & more".into();
        let html = render_fragment_with_id(&spec, "t2").unwrap();
        let payload_start = html.find("t2-spec\">").unwrap();
        let payload = &html[payload_start..];
        let payload = &payload[..payload.find("</script>").unwrap()];
        assert!(!payload.contains("<b>"));
        assert!(payload.contains("\\u003c/script\\u003e"));
        assert!(payload.contains("\\u0026 more"));
    }

    #[test]
    fn test_fresh_ids_per_fragment() {
        let a = render_fragment(&spec()).unwrap();
        let b = render_fragment(&spec()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_write_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("timer.html");
        write_page(&spec(), &path).unwrap();
        let page = std::fs::read_to_string(&path).unwrap();
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("speechSynthesis"));
        assert!(page.contains("Exercise time finished"));
    }
}
