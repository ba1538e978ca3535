// ── Positional argument access ──
//
// Commands arrive as a name plus a JSON argument array. `Args` reads
// typed values by index and turns every shape mismatch into a
// `CoreError::Marshalling` naming the command and the offending index.

use serde_json::Value;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Args<'a> {
    command: &'a str,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    pub(crate) fn new(command: &'a str, values: &'a [Value]) -> Self {
        Self { command, values }
    }

    pub(crate) fn command(&self) -> &'a str {
        self.command
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    fn get(&self, index: usize) -> Option<&'a Value> {
        self.values.get(index).filter(|v| !v.is_null())
    }

    fn mismatch(&self, index: usize, expected: &'static str) -> CoreError {
        CoreError::marshalling(self.command, index, expected)
    }

    pub(crate) fn string(&self, index: usize) -> Result<&'a str, CoreError> {
        self.get(index)
            .and_then(Value::as_str)
            .ok_or_else(|| self.mismatch(index, "a string"))
    }

    /// A string that may be absent or null.
    pub(crate) fn opt_string(&self, index: usize) -> Result<Option<&'a str>, CoreError> {
        match self.get(index) {
            None => Ok(None),
            Some(v) => v
                .as_str()
                .map(Some)
                .ok_or_else(|| self.mismatch(index, "a string or null")),
        }
    }

    pub(crate) fn int(&self, index: usize) -> Result<i64, CoreError> {
        self.get(index)
            .and_then(integral)
            .ok_or_else(|| self.mismatch(index, "an integer"))
    }

    pub(crate) fn i32(&self, index: usize) -> Result<i32, CoreError> {
        i32::try_from(self.int(index)?).map_err(|_| self.mismatch(index, "a 32-bit integer"))
    }

    pub(crate) fn u32(&self, index: usize) -> Result<u32, CoreError> {
        u32::try_from(self.int(index)?)
            .map_err(|_| self.mismatch(index, "an unsigned 32-bit integer"))
    }

    pub(crate) fn f64(&self, index: usize) -> Result<f64, CoreError> {
        self.get(index)
            .and_then(Value::as_f64)
            .ok_or_else(|| self.mismatch(index, "a number"))
    }

    pub(crate) fn bool(&self, index: usize) -> Result<bool, CoreError> {
        self.get(index)
            .and_then(Value::as_bool)
            .ok_or_else(|| self.mismatch(index, "a boolean"))
    }

    /// A trailing flag: absent or null reads as `false`.
    pub(crate) fn opt_bool(&self, index: usize) -> Result<bool, CoreError> {
        match self.get(index) {
            None => Ok(false),
            Some(v) => v
                .as_bool()
                .ok_or_else(|| self.mismatch(index, "a boolean or null")),
        }
    }

    pub(crate) fn array(&self, index: usize) -> Result<Args<'a>, CoreError> {
        self.get(index)
            .and_then(Value::as_array)
            .map(|items| Args::new(self.command, items))
            .ok_or_else(|| self.mismatch(index, "an array"))
    }

    pub(crate) fn opt_array(&self, index: usize) -> Result<Option<Args<'a>>, CoreError> {
        match self.get(index) {
            None => Ok(None),
            Some(v) => v
                .as_array()
                .map(|items| Some(Args::new(self.command, items)))
                .ok_or_else(|| self.mismatch(index, "an array or null")),
        }
    }

    pub(crate) fn strings(&self) -> Result<Vec<String>, CoreError> {
        (0..self.len())
            .map(|i| self.string(i).map(str::to_owned))
            .collect()
    }
}

/// Integers may arrive as JSON floats with no fractional part.
fn integral(v: &Value) -> Option<i64> {
    if let Some(i) = v.as_i64() {
        return Some(i);
    }
    let f = v.as_f64()?;
    #[allow(clippy::cast_possible_truncation)]
    (f.fract() == 0.0 && f.abs() < 9.0e15).then(|| f as i64)
}
