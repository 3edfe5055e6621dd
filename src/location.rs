use std::fmt;
use std::sync::LazyLock;
use url::{Url, form_urlencoded};

/// Resolves relative locations; only path and query are kept afterwards.
static PARSE_BASE: LazyLock<Url> =
  LazyLock::new(|| Url::parse("http://localhost/").expect("static base URL is valid"));

/// The persisted part of an address: path plus ordered query pairs.
///
/// Query pairs are held decoded and serialized with form-urlencoded rules, the
/// same rules a browser's `URLSearchParams` applies. The fragment is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
  pub path: String,
  pub query: Vec<(String, String)>,
}

impl Default for Location {
  fn default() -> Self {
    Self { path: "/".to_string(), query: Vec::new() }
  }
}

impl Location {
  /// Parse `path?query` or an absolute URL.
  pub fn parse(input: &str) -> Result<Self, url::ParseError> {
    let url = Url::options().base_url(Some(&PARSE_BASE)).parse(input.trim())?;
    Ok(Self { path: url.path().to_string(), query: url.query_pairs().into_owned().collect() })
  }

  /// First value of `name`, like `URLSearchParams::get`.
  pub fn get(&self, name: &str) -> Option<&str> {
    self.query.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
  }

  pub fn has(&self, name: &str) -> bool {
    self.query.iter().any(|(k, _)| k == name)
  }

  /// Remove every pair named `name`.
  pub fn remove(&mut self, name: &str) {
    self.query.retain(|(k, _)| k != name);
  }

  /// Replace the first pair named `name` and drop the rest, or append.
  pub fn set(&mut self, name: &str, value: impl Into<String>) {
    let value = value.into();
    match self.query.iter().position(|(k, _)| k == name) {
      Some(first) => {
        self.query[first].1 = value;
        let mut index = 0;
        self.query.retain(|(k, _)| {
          let keep = index <= first || k != name;
          index += 1;
          keep
        });
      }
      None => self.query.push((name.to_string(), value)),
    }
  }

  /// Serialized query without the leading `?`; empty when there are no pairs.
  pub fn query_string(&self) -> String {
    form_urlencoded::Serializer::new(String::new()).extend_pairs(self.query.iter()).finish()
  }
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.path)?;
    let query = self.query_string();
    if !query.is_empty() {
      write!(f, "?{}", query)?;
    }
    Ok(())
  }
}
