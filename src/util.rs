//! Small utility helpers used across modules.

use chrono::Utc;

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
  Utc::now().timestamp_millis()
}

/// Log-safe truncation for provider error bodies.
pub fn trunc_for_log(s: &str, max_chars: usize) -> String {
  let count = s.chars().count();
  if count <= max_chars {
    s.to_string()
  } else {
    let head: String = s.chars().take(max_chars).collect();
    format!("{}… ({} chars total)", head, count)
  }
}
