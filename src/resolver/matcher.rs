use serde_json::Value;
use std::fmt;

/// First point where the actual response diverges from the expectation
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    /// JSON path, e.g. `$.payload.address`
    pub path: String,
    pub expected: Value,
    pub actual: Option<Value>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.actual {
            Some(actual) => write!(
                f,
                "mismatch at {}: expected {}, got {}",
                self.path, self.expected, actual
            ),
            None => write!(f, "mismatch at {}: expected {}, got nothing", self.path, self.expected),
        }
    }
}

impl std::error::Error for Mismatch {}

/// Checks that `actual` contains everything in `expected`.
///
/// Objects may carry extra keys, arrays must have the same length and match
/// element-wise, scalars must be equal.
pub fn match_subset(expected: &Value, actual: &Value) -> Result<(), Mismatch> {
    match_at("$", expected, actual)
}

fn match_at(path: &str, expected: &Value, actual: &Value) -> Result<(), Mismatch> {
    let mismatch = || Mismatch {
        path: path.to_string(),
        expected: expected.clone(),
        actual: Some(actual.clone()),
    };

    match (expected, actual) {
        (Value::Object(exp), Value::Object(act)) => {
            for (key, exp_value) in exp {
                let child = format!("{}.{}", path, key);
                match act.get(key) {
                    Some(act_value) => match_at(&child, exp_value, act_value)?,
                    None => {
                        return Err(Mismatch {
                            path: child,
                            expected: exp_value.clone(),
                            actual: None,
                        })
                    }
                }
            }
            Ok(())
        }
        (Value::Array(exp), Value::Array(act)) => {
            if exp.len() != act.len() {
                return Err(mismatch());
            }
            for (i, (e, a)) in exp.iter().zip(act).enumerate() {
                match_at(&format!("{}[{}]", path, i), e, a)?;
            }
            Ok(())
        }
        (e, a) if e == a => Ok(()),
        _ => Err(mismatch()),
    }
}
