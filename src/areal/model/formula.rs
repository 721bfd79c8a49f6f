use std::{fmt, str::FromStr};

use crate::error::InterpError;

/// An R-style model formula: `response ~ x1 + x2`.
///
/// Terms are column names. `- 1` or `0` drops the intercept, `+ 1` keeps it
/// (the default). Transformations and interactions are not supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    text: String,
    response: String,
    terms: Vec<String>,
    intercept: bool,
}

impl Formula {
    #[inline] pub fn response(&self) -> &str { &self.response }

    #[inline] pub fn terms(&self) -> &[String] { &self.terms }

    #[inline] pub fn intercept(&self) -> bool { self.intercept }

    /// Names of the design matrix columns, in order.
    pub fn coefficient_names(&self) -> Vec<String> {
        self.intercept.then(|| "Intercept".to_string()).into_iter()
            .chain(self.terms.iter().cloned())
            .collect()
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.text) }
}

impl FromStr for Formula {
    type Err = InterpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason: &str| InterpError::Formula { formula: s.to_string(), reason: reason.to_string() };

        let (lhs, rhs) = s.split_once('~').ok_or_else(|| fail("missing '~'"))?;
        if rhs.contains('~') { return Err(fail("more than one '~'")) }

        let response = lhs.trim();
        if response.is_empty() { return Err(fail("missing response")) }

        // Split the right-hand side into (sign, term) pairs.
        let mut signed = Vec::new();
        let mut sign = '+';
        let mut term = String::new();
        for c in rhs.chars().chain(std::iter::once('+')) {
            if c != '+' && c != '-' {
                term.push(c);
                continue
            }
            let name = term.trim();
            if name.is_empty() {
                // Only a leading sign may stand without a term before it.
                if !signed.is_empty() || sign != '+' { return Err(fail("empty term")) }
            } else {
                signed.push((sign, name.to_string()));
            }
            sign = c;
            term.clear();
        }
        if signed.is_empty() { return Err(fail("no terms on the right-hand side")) }

        let mut intercept = true;
        let mut terms: Vec<String> = Vec::new();
        for (sign, name) in signed {
            match (sign, name.as_str()) {
                ('+', "1") => intercept = true,
                ('-', "1") | ('+', "0") => intercept = false,
                ('-', _) => return Err(fail("only the intercept can be removed")),
                (_, _) if name == response => return Err(fail("response used as a predictor")),
                (_, _) => if !terms.contains(&name) { terms.push(name) },
            }
        }
        if terms.is_empty() && !intercept { return Err(fail("model has no predictors")) }

        Ok(Self { text: s.trim().to_string(), response: response.to_string(), terms, intercept })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_terms_and_intercept() {
        let formula: Formula = "pop ~ buildings + roads".parse().unwrap();
        assert_eq!(formula.response(), "pop");
        assert_eq!(formula.terms(), &["buildings".to_string(), "roads".to_string()]);
        assert!(formula.intercept());
        assert_eq!(formula.coefficient_names(), vec!["Intercept", "buildings", "roads"]);
    }

    #[test]
    fn leading_minus_one_drops_intercept() {
        let formula: Formula = "pop_count ~ -1 + build_counts".parse().unwrap();
        assert!(!formula.intercept());
        assert_eq!(formula.terms(), &["build_counts".to_string()]);

        let formula: Formula = "y ~ 0 + x".parse().unwrap();
        assert!(!formula.intercept());
        assert_eq!(formula.to_string(), "y ~ 0 + x");
    }

    #[test]
    fn duplicates_are_collapsed() {
        let formula: Formula = "y ~ x + x + 1".parse().unwrap();
        assert_eq!(formula.terms().len(), 1);
        assert!(formula.intercept());
    }

    #[test]
    fn malformed_formulas() {
        for bad in ["y x", "~ x", "y ~", "y ~ x ~ z", "y ~ x + ", "y ~ x - z", "y ~ -1", "y ~ y", "y ~ x ++ z"] {
            assert!(
                matches!(bad.parse::<Formula>(), Err(InterpError::Formula { .. })),
                "expected {bad:?} to be rejected"
            );
        }
    }
}
