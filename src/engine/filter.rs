//! Filter values shared by every chart.

use serde::{Deserialize, Serialize};

/// Multi-select value meaning "no constraint".
pub const ALL: &str = "All";

/// A multi-select filter (locations, modes, origin zones, destination zones).
///
/// Selecting [`ALL`], alone or next to explicit values, or selecting
/// nothing at all leaves the filter unconstrained. Otherwise it matches
/// exactly the selected values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    values: Vec<String>,
}

impl Selection {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// The unconstrained selection.
    pub fn all() -> Self {
        Selection::default()
    }

    pub fn is_unconstrained(&self) -> bool {
        self.values.is_empty() || self.values.iter().any(|v| v == ALL)
    }

    pub fn matches(&self, value: &str) -> bool {
        self.is_unconstrained() || self.values.iter().any(|v| v == value)
    }

    /// The explicitly selected values in selection order, without
    /// duplicates; `None` when unconstrained.
    pub fn explicit(&self) -> Option<Vec<&str>> {
        if self.is_unconstrained() {
            return None;
        }
        let mut out: Vec<&str> = Vec::with_capacity(self.values.len());
        for v in &self.values {
            if !out.contains(&v.as_str()) {
                out.push(v);
            }
        }
        Some(out)
    }

    /// Values to split a chart by: more than one explicit selection.
    pub fn split_values(&self) -> Option<Vec<&str>> {
        self.explicit().filter(|v| v.len() > 1)
    }

    /// Human label: `All` or the comma-joined selection.
    pub fn label(&self) -> String {
        match self.explicit() {
            None => ALL.to_string(),
            Some(v) => v.join(", "),
        }
    }
}

/// A single-select radio group whose options include an explicit "All".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Choice {
    #[default]
    All,
    Only(String),
}

impl Choice {
    /// Reads a radio value; the [`ALL`] value is the `All` choice.
    pub fn parse(s: &str) -> Self {
        if s == ALL {
            Choice::All
        } else {
            Choice::Only(s.to_string())
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Choice::All => true,
            Choice::Only(v) => v == value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_unconstrained() {
        let s = Selection::all();
        assert!(s.is_unconstrained());
        assert!(s.matches("anything"));
        assert_eq!(s.explicit(), None);
        assert_eq!(s.label(), "All");
    }

    #[test]
    fn test_all_with_explicit_values_equals_all() {
        let mixed = Selection::new(["North", ALL, "South"]);
        let all = Selection::new([ALL]);
        for zone in ["North", "South", "East"] {
            assert_eq!(mixed.matches(zone), all.matches(zone));
            assert!(mixed.matches(zone));
        }
        assert_eq!(mixed.explicit(), all.explicit());
        assert_eq!(mixed.split_values(), None);
    }

    #[test]
    fn test_constrained_matches_exactly() {
        let s = Selection::new(["North", "South"]);
        assert!(s.matches("North"));
        assert!(!s.matches("north"));
        assert!(!s.matches("East"));
        assert_eq!(s.label(), "North, South");
    }

    #[test]
    fn test_split_requires_two_distinct_values() {
        assert_eq!(Selection::new(["A"]).split_values(), None);
        assert_eq!(Selection::new(["A", "A"]).split_values(), None);
        assert_eq!(Selection::new(["B", "A"]).split_values(), Some(vec!["B", "A"]));
    }

    #[test]
    fn test_choice() {
        assert_eq!(Choice::parse("All"), Choice::All);
        assert!(Choice::All.matches("Night"));
        let weekend = Choice::parse("Weekend");
        assert!(weekend.matches("Weekend"));
        assert!(!weekend.matches("Weekday"));
    }
}
