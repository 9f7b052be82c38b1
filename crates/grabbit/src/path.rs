//! Structural paths locating a leaf inside a response body.

use std::fmt;

use serde_json::Value;

/// Path marker reported for matches found in the rendered page text.
pub const PAGE_TEXT_PATH: &str = "document.body.innerText";

/// One access step: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    Key(String),
    Index(usize),
}

/// A sequence of access steps from the root of a response body.
///
/// Displays in dotted/bracketed form: `data.items[0].viewCount`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuralPath(Vec<PathStep>);

impl StructuralPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// This path extended by one step.
    pub fn child(&self, step: PathStep) -> Self {
        let mut steps = self.0.clone();
        steps.push(step);
        Self(steps)
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse the dotted/bracketed form back into steps.
    ///
    /// A segment like `items[0][1]` yields a key followed by two indices.
    /// Bracket groups that are not plain integers keep the whole segment as a key.
    pub fn parse(path: &str) -> Self {
        let mut steps = Vec::new();
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            match split_indices(segment) {
                Some((key, indices)) => {
                    if !key.is_empty() {
                        steps.push(PathStep::Key(key.to_string()));
                    }
                    steps.extend(indices.into_iter().map(PathStep::Index));
                }
                None => steps.push(PathStep::Key(segment.to_string())),
            }
        }
        Self(steps)
    }

    /// Follow the path through a value.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(root, |node, step| match step {
            PathStep::Key(key) => node.get(key.as_str()),
            PathStep::Index(i) => node.get(*i),
        })
    }
}

fn split_indices(segment: &str) -> Option<(&str, Vec<usize>)> {
    let open = segment.find('[')?;
    let (key, mut rest) = segment.split_at(open);
    let mut indices = Vec::new();
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        indices.push(inner[..close].parse().ok()?);
        rest = &inner[close + 1..];
    }
    Some((key, indices))
}

impl fmt::Display for StructuralPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            match step {
                PathStep::Key(key) if i == 0 => write!(f, "{key}")?,
                PathStep::Key(key) => write!(f, ".{key}")?,
                PathStep::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

impl FromIterator<PathStep> for StructuralPath {
    fn from_iter<I: IntoIterator<Item = PathStep>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
