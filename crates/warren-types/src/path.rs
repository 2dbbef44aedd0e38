//! Repository paths.
//!
//! A [`Path`] is an ordered sequence of [`PathElement`]s. Absolute paths
//! start with the root marker; the remaining elements are named steps, each
//! optionally carrying a 1-based same-name-sibling index. Two named steps
//! compare equal when their names match and their *normalized* indexes match,
//! so `b` and `b[1]` denote the same step.
//!
//! Text form: `/a/b[2]`, with names in non-default namespaces expanded as
//! `{uri}local`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::name::{InvalidNameError, Name};

/// Index value of a step that carries no explicit index.
pub const INDEX_UNDEFINED: u32 = 0;

/// The first (and default) same-name-sibling index.
pub const INDEX_DEFAULT: u32 = 1;

/// One step of a path.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum PathElement {
    /// The root marker; only valid as the first element.
    Root,
    /// The current-element marker (`.`).
    Current,
    /// The parent-element marker (`..`).
    Parent,
    /// A named step with an optional 1-based same-name-sibling index.
    Named { name: Name, index: u32 },
}

impl PathElement {
    /// The step name, if this is a named step.
    pub fn name(&self) -> Option<&Name> {
        match self {
            PathElement::Named { name, .. } => Some(name),
            _ => None,
        }
    }

    /// The raw index of a named step (`INDEX_UNDEFINED` when unspecified).
    pub fn index(&self) -> u32 {
        match self {
            PathElement::Named { index, .. } => *index,
            _ => INDEX_UNDEFINED,
        }
    }

    /// The effective same-name-sibling index: unspecified normalizes to 1.
    pub fn normalized_index(&self) -> u32 {
        self.index().max(INDEX_DEFAULT)
    }

    /// Whether this step carries an explicit index suffix.
    pub fn has_explicit_index(&self) -> bool {
        self.index() != INDEX_UNDEFINED
    }

    fn rank(&self) -> u8 {
        match self {
            PathElement::Root => 0,
            PathElement::Current => 1,
            PathElement::Parent => 2,
            PathElement::Named { .. } => 3,
        }
    }
}

impl PartialEq for PathElement {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PathElement::Root, PathElement::Root)
            | (PathElement::Current, PathElement::Current)
            | (PathElement::Parent, PathElement::Parent) => true,
            (PathElement::Named { name: a, .. }, PathElement::Named { name: b, .. }) => {
                a == b && self.normalized_index() == other.normalized_index()
            }
            _ => false,
        }
    }
}

impl Eq for PathElement {}

impl Hash for PathElement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        if let PathElement::Named { name, .. } = self {
            name.hash(state);
            self.normalized_index().hash(state);
        }
    }
}

impl PartialOrd for PathElement {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PathElement {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (PathElement::Named { name: a, .. }, PathElement::Named { name: b, .. }) => a
                .cmp(b)
                .then_with(|| self.normalized_index().cmp(&other.normalized_index())),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Root => Ok(()),
            PathElement::Current => f.write_str("."),
            PathElement::Parent => f.write_str(".."),
            PathElement::Named { name, .. } => {
                name.fmt(f)?;
                if self.normalized_index() > INDEX_DEFAULT {
                    write!(f, "[{}]", self.normalized_index())?;
                }
                Ok(())
            }
        }
    }
}

/// An ordered, totally comparable sequence of path elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Path {
    elements: Vec<PathElement>,
}

impl Path {
    /// The absolute root path `/`.
    pub fn root() -> Self {
        Self {
            elements: vec![PathElement::Root],
        }
    }

    /// Build a path from raw elements. The caller is responsible for placing
    /// the root marker first (absolute) or omitting it (relative).
    pub fn from_elements(elements: Vec<PathElement>) -> Self {
        debug_assert!(!elements.is_empty(), "a path has at least one element");
        Self { elements }
    }

    #[inline]
    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    #[inline]
    pub fn is_absolute(&self) -> bool {
        matches!(self.elements.first(), Some(PathElement::Root))
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.elements.len() == 1 && self.is_absolute()
    }

    /// Number of steps below the root (0 for the root path itself).
    pub fn depth(&self) -> usize {
        self.elements.len() - 1
    }

    /// The final element. Paths are never empty.
    pub fn last(&self) -> &PathElement {
        &self.elements[self.elements.len() - 1]
    }

    /// Append a named step without an explicit index.
    pub fn child(&self, name: Name) -> Self {
        self.child_indexed(name, INDEX_UNDEFINED)
    }

    /// Append a named step with the given raw index.
    pub fn child_indexed(&self, name: Name, index: u32) -> Self {
        let mut elements = self.elements.clone();
        elements.push(PathElement::Named { name, index });
        Self { elements }
    }

    /// The parent path, or `None` for a single-element path.
    pub fn parent(&self) -> Option<Self> {
        if self.elements.len() < 2 {
            return None;
        }
        Some(Self {
            elements: self.elements[..self.elements.len() - 1].to_vec(),
        })
    }

    /// The ancestor `degree` steps up (`ancestor(0)` is the path itself).
    pub fn ancestor(&self, degree: usize) -> Option<Self> {
        if degree >= self.elements.len() {
            return None;
        }
        Some(Self {
            elements: self.elements[..self.elements.len() - degree].to_vec(),
        })
    }

    /// Whether `prefix` is an ancestor-or-self of this path, element-wise.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.elements.len() >= prefix.elements.len()
            && self.elements[..prefix.elements.len()] == prefix.elements[..]
    }

    /// The relative path from `base` to this path.
    ///
    /// Returns `None` when this path is not under `base`; the relative path
    /// of a path to itself is the current-element marker.
    pub fn relativize(&self, base: &Path) -> Option<Self> {
        if !self.starts_with(base) {
            return None;
        }
        let rest = &self.elements[base.elements.len()..];
        if rest.is_empty() {
            return Some(Self {
                elements: vec![PathElement::Current],
            });
        }
        Some(Self {
            elements: rest.to_vec(),
        })
    }

    /// Resolve `.` and `..` markers.
    ///
    /// Fails when a `..` would climb above the root of an absolute path.
    pub fn normalize(&self) -> Result<Self, InvalidPathError> {
        let mut elements: Vec<PathElement> = Vec::with_capacity(self.elements.len());
        for element in &self.elements {
            match element {
                PathElement::Current => {}
                PathElement::Parent => match elements.last() {
                    Some(PathElement::Named { .. }) => {
                        elements.pop();
                    }
                    Some(PathElement::Root) => {
                        return Err(InvalidPathError {
                            detail: format!("path '{self}' escapes the root"),
                        })
                    }
                    _ => elements.push(PathElement::Parent),
                },
                other => elements.push(other.clone()),
            }
        }
        if elements.is_empty() {
            elements.push(PathElement::Current);
        }
        Ok(Self { elements })
    }

    /// Parse the text form produced by [`Display`](fmt::Display).
    pub fn parse(text: &str) -> Result<Self, InvalidPathError> {
        if text.is_empty() {
            return Err(InvalidPathError {
                detail: "empty path".to_owned(),
            });
        }
        let mut elements = Vec::new();
        let rest = if let Some(rest) = text.strip_prefix('/') {
            elements.push(PathElement::Root);
            rest
        } else {
            text
        };
        if rest.is_empty() {
            return Ok(Self { elements });
        }
        for step in rest.split('/') {
            match step {
                "" => {
                    return Err(InvalidPathError {
                        detail: format!("empty step in path '{text}'"),
                    })
                }
                "." => elements.push(PathElement::Current),
                ".." => elements.push(PathElement::Parent),
                _ => elements.push(parse_named(step, text)?),
            }
        }
        Ok(Self { elements })
    }
}

fn parse_named(step: &str, whole: &str) -> Result<PathElement, InvalidPathError> {
    let (name_part, index) = match step.find('[') {
        Some(open) => {
            let Some(close) = step.ends_with(']').then_some(step.len() - 1) else {
                return Err(InvalidPathError {
                    detail: format!("unterminated index in path '{whole}'"),
                });
            };
            let index: u32 = step[open + 1..close].parse().map_err(|_| InvalidPathError {
                detail: format!("malformed index in path '{whole}'"),
            })?;
            if index < INDEX_DEFAULT {
                return Err(InvalidPathError {
                    detail: format!("index must be >= 1 in path '{whole}'"),
                });
            }
            (&step[..open], index)
        }
        None => (step, INDEX_UNDEFINED),
    };
    let name = Name::parse(name_part).map_err(InvalidPathError::from)?;
    Ok(PathElement::Named { name, index })
}

impl PartialOrd for Path {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Path {
    fn cmp(&self, other: &Self) -> Ordering {
        self.elements.cmp(&other.elements)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("/");
        }
        for (i, element) in self.elements.iter().enumerate() {
            match element {
                PathElement::Root => f.write_str("/")?,
                other => {
                    if i > 0 && !matches!(self.elements[i - 1], PathElement::Root) {
                        f.write_str("/")?;
                    }
                    other.fmt(f)?;
                }
            }
        }
        Ok(())
    }
}

/// Error returned when parsing or normalizing a malformed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPathError {
    detail: String,
}

impl fmt::Display for InvalidPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)
    }
}

impl std::error::Error for InvalidPathError {}

impl From<InvalidNameError> for InvalidPathError {
    fn from(err: InvalidNameError) -> Self {
        Self {
            detail: err.to_string(),
        }
    }
}
