//! The preview page loaded into the browser host.
//!
//! A single self-contained HTML document: a window mockup around a `<pre>`
//! and a small script that types the code with the same timing rules as
//! [`Typewriter`](crate::animation::Typewriter). The script exposes
//! `window.snippetMotion.start()` (a promise) and `reset()`.

use crate::animation::TypingConfig;
use crate::config::parse_hex_color;
use crate::result::MotionResult;
use serde::Serialize;

/// Element id of the capture target
pub const PREVIEW_ELEMENT_ID: &str = "snippet-motion-preview";

/// Timing handed to the page script, in milliseconds
#[derive(Debug, Serialize)]
struct ScriptConfig {
    char_delay: u64,
    pause: u64,
    hold: u64,
    pause_points: Vec<usize>,
}

/// Inputs for one preview page
#[derive(Debug, Clone)]
pub struct PreviewDocument {
    code: String,
    typing: TypingConfig,
    background: String,
    title: String,
    watermark: bool,
}

impl PreviewDocument {
    /// Preview of `code` typed with `typing`
    #[must_use]
    pub fn new(code: impl Into<String>, typing: TypingConfig) -> Self {
        Self {
            code: code.into(),
            typing,
            background: "#0d1117".to_string(),
            title: "snippet.js".to_string(),
            watermark: false,
        }
    }

    /// Page background behind the mockup
    #[must_use]
    pub fn with_background(mut self, color: impl Into<String>) -> Self {
        self.background = color.into();
        self
    }

    /// File name shown in the title bar
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Show the "Made with Snippet Motion" badge
    #[must_use]
    pub fn with_watermark(mut self, watermark: bool) -> Self {
        self.watermark = watermark;
        self
    }

    /// The code being typed
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Render the HTML document
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the background is not a hex color, or an error if
    /// the script data cannot be serialized.
    pub fn render(&self) -> MotionResult<String> {
        parse_hex_color(&self.background)?;
        let config = ScriptConfig {
            char_delay: self.typing.char_delay.as_millis() as u64,
            pause: self.typing.pause.as_millis() as u64,
            hold: self.typing.hold.as_millis() as u64,
            pause_points: self.typing.pause_points(&self.code).into_iter().collect(),
        };
        let config_json = script_safe(&serde_json::to_string(&config)?);
        let code_json = script_safe(&serde_json::to_string(&self.code)?);
        let watermark = if self.watermark {
            r#"<div class="badge">Made with Snippet Motion</div>"#
        } else {
            ""
        };

        let title = escape_html(&self.title);
        Ok(fill_template(TEMPLATE, |name| match name {
            "BACKGROUND" => Some(self.background.as_str()),
            "TITLE" => Some(title.as_str()),
            "ELEMENT_ID" => Some(PREVIEW_ELEMENT_ID),
            "WATERMARK" => Some(watermark),
            "CONFIG" => Some(config_json.as_str()),
            "CODE" => Some(code_json.as_str()),
            _ => None,
        }))
    }
}

/// Replace each `__NAME__` in `template` in a single pass. Substituted text
/// is never scanned again; unknown names are left as they are.
fn fill_template<'a>(template: &str, value: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("__") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let filled = after
            .find("__")
            .map(|close| (&after[..close], close))
            .filter(|(name, _)| {
                !name.is_empty() && name.bytes().all(|b| b.is_ascii_uppercase() || b == b'_')
            })
            .and_then(|(name, close)| value(name).map(|v| (v, close)));
        match filled {
            Some((v, close)) => {
                out.push_str(v);
                rest = &after[close + 2..];
            }
            None => {
                out.push_str("__");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Escape text for HTML content and attribute values
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Keep JSON from closing the surrounding `<script>` element
fn script_safe(json: &str) -> String {
    json.replace("</", "<\\/").replace("<!--", "<\\!--")
}

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>__TITLE__</title>
<style>
  html, body { margin: 0; height: 100%; background: __BACKGROUND__; }
  body { display: flex; align-items: center; justify-content: center; }
  #__ELEMENT_ID__ {
    position: relative; box-sizing: border-box; width: 640px; padding: 24px;
    background: __BACKGROUND__;
  }
  .window {
    border-radius: 12px; padding: 16px; border: 1px solid rgba(255,255,255,0.1);
    background: rgba(255,255,255,0.04); box-shadow: 0 20px 50px rgba(0,0,0,0.5);
  }
  .bar { display: flex; align-items: center; gap: 8px; margin-bottom: 16px; }
  .dot { width: 12px; height: 12px; border-radius: 50%; }
  .red { background: #ef4444; } .yellow { background: #eab308; } .green { background: #22c55e; }
  .name { margin-left: 8px; font: 10px ui-monospace, monospace; color: rgba(255,255,255,0.4); }
  pre {
    margin: 0; min-height: 100px; white-space: pre-wrap; word-break: break-word;
    font: 13px/1.6 ui-monospace, SFMono-Regular, Menlo, monospace; color: rgba(255,255,255,0.9);
  }
  #snippet-motion-cursor {
    display: inline-block; width: 2px; height: 14px; margin-left: 1px;
    vertical-align: middle; background: #fff; animation: blink 0.5s infinite alternate;
  }
  #snippet-motion-cursor[hidden] { display: none; }
  @keyframes blink { to { opacity: 0; } }
  .badge {
    position: absolute; right: 16px; bottom: 16px; padding: 4px 8px; border-radius: 4px;
    background: rgba(0,0,0,0.5); color: rgba(255,255,255,0.6); font: 500 9px sans-serif;
  }
</style>
</head>
<body>
<div id="__ELEMENT_ID__">
  <div class="window">
    <div class="bar">
      <div class="dot red"></div><div class="dot yellow"></div><div class="dot green"></div>
      <span class="name">__TITLE__</span>
    </div>
    <pre><code id="snippet-motion-code"></code><span id="snippet-motion-cursor" hidden></span></pre>
  </div>
  __WATERMARK__
</div>
<script>
(() => {
  const cfg = __CONFIG__;
  const chars = Array.from(__CODE__);
  const pausePoints = new Set(cfg.pause_points);
  const codeEl = document.getElementById("snippet-motion-code");
  const cursor = document.getElementById("snippet-motion-cursor");
  const sleep = (ms) => new Promise((resolve) => setTimeout(resolve, ms));
  const show = (n) => { codeEl.textContent = chars.slice(0, n).join(""); };
  let run = 0;

  window.snippetMotion = {
    async start() {
      const id = ++run;
      show(0);
      cursor.hidden = false;
      for (let shown = 0; shown <= chars.length; shown++) {
        if (shown > 0) {
          await sleep(cfg.char_delay);
          if (id !== run) return;
          show(shown);
        }
        if (pausePoints.has(shown)) await sleep(cfg.pause);
      }
      cursor.hidden = true;
      await sleep(cfg.hold);
    },
    reset() {
      run++;
      show(chars.length);
      cursor.hidden = true;
    },
  };

  show(chars.length);
})();
</script>
</body>
</html>
"#;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::time::Duration;

    #[test]
    fn test_render_contains_target_and_hooks() {
        let html = PreviewDocument::new("fn main() {}", TypingConfig::default())
            .render()
            .unwrap();
        assert!(html.contains(r#"<div id="snippet-motion-preview">"#));
        assert!(html.contains("window.snippetMotion"));
        assert!(html.contains(r#"Array.from("fn main() {}")"#));
        assert!(!html.contains("__"));
    }

    #[test]
    fn test_typing_config_embedded_in_millis() {
        let typing = TypingConfig {
            char_delay: Duration::from_millis(25),
            breakpoints: BTreeSet::from([0]),
            pause: Duration::from_millis(700),
            hold: Duration::from_millis(500),
        };
        let html = PreviewDocument::new("ab\ncd", typing).render().unwrap();
        assert!(html.contains(
            r#"{"char_delay":25,"pause":700,"hold":500,"pause_points":[2]}"#
        ));
    }

    #[test]
    fn test_code_cannot_close_script() {
        let html = PreviewDocument::new("</script><script>alert(1)", TypingConfig::default())
            .render()
            .unwrap();
        assert_eq!(html.matches("</script>").count(), 1);
        assert!(html.contains(r"<\/script>"));
    }

    #[test]
    fn test_title_escaped() {
        let html = PreviewDocument::new("x", TypingConfig::default())
            .with_title("<b>main.rs</b>")
            .render()
            .unwrap();
        assert!(html.contains("&lt;b&gt;main.rs&lt;/b&gt;"));
        assert!(!html.contains("<b>main.rs"));
    }

    #[test]
    fn test_placeholder_names_in_title_stay_literal() {
        let html = PreviewDocument::new("let x = 1;", TypingConfig::default())
            .with_title("__CODE__ and __CONFIG__")
            .render()
            .unwrap();
        assert_eq!(html.matches("__CODE__ and __CONFIG__").count(), 2);
        assert_eq!(html.matches(r#"Array.from("let x = 1;")"#).count(), 1);
    }

    #[test]
    fn test_placeholder_names_in_code_stay_literal() {
        let html = PreviewDocument::new("__TITLE__", TypingConfig::default())
            .with_title("main.rs")
            .render()
            .unwrap();
        assert!(html.contains(r#"Array.from("__TITLE__")"#));
    }

    #[test]
    fn test_background_inserted_as_css_color() {
        let html = PreviewDocument::new("x", TypingConfig::default())
            .with_background("#1e1e2e")
            .render()
            .unwrap();
        assert!(html.contains("background: #1e1e2e; }"));
    }

    #[test]
    fn test_non_hex_background_rejected() {
        let result = PreviewDocument::new("x", TypingConfig::default())
            .with_background("red; } body { color: blue")
            .render();
        assert!(matches!(result, Err(crate::MotionError::InvalidConfig { .. })));
    }

    #[test]
    fn test_fill_template_keeps_unknown_and_lone_markers() {
        let filled = fill_template("a __X__ b __Y__ __ c", |name| (name == "X").then_some("1"));
        assert_eq!(filled, "a 1 b __Y__ __ c");
    }

    #[test]
    fn test_watermark_optional() {
        let plain = PreviewDocument::new("x", TypingConfig::default()).render().unwrap();
        let marked = PreviewDocument::new("x", TypingConfig::default())
            .with_watermark(true)
            .render()
            .unwrap();
        assert!(!plain.contains("Made with Snippet Motion"));
        assert!(marked.contains("Made with Snippet Motion"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"a&b<"c">'"#), "a&amp;b&lt;&quot;c&quot;&gt;&#39;");
    }
}
