use crate::osc::{argument::OscArgument, message::OscMessage};

use super::{controls::ControlValue, error::ResponseError};

/// Typed cursor over a reply's arguments
pub(crate) struct ArgumentCursor<'a> {
    address: &'a str,
    arguments: &'a [OscArgument],
    index: usize,
}

impl<'a> ArgumentCursor<'a> {
    pub fn new(message: &'a OscMessage) -> Self {
        Self {
            address: &message.address,
            arguments: &message.arguments,
            index: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.arguments.len().saturating_sub(self.index)
    }

    pub fn has_more(&self) -> bool {
        self.remaining() > 0
    }

    pub fn next(&mut self) -> Result<&'a OscArgument, ResponseError> {
        let argument = self
            .arguments
            .get(self.index)
            .ok_or_else(|| ResponseError::MissingArgument {
                address: self.address.to_string(),
                index: self.index,
            })?;
        self.index += 1;
        Ok(argument)
    }

    pub fn int(&mut self) -> Result<i32, ResponseError> {
        let argument = self.next()?;
        argument.as_int().ok_or_else(|| self.unexpected("an integer"))
    }

    /// Integer where -1 means "none".
    pub fn optional_id(&mut self) -> Result<Option<i32>, ResponseError> {
        let value = self.int()?;
        Ok(if value == -1 { None } else { Some(value) })
    }

    pub fn float(&mut self) -> Result<f32, ResponseError> {
        let argument = self.next()?;
        argument.as_float().ok_or_else(|| self.unexpected("a float"))
    }

    pub fn double(&mut self) -> Result<f64, ResponseError> {
        match self.next()? {
            OscArgument::Double(value) => Ok(*value),
            OscArgument::Float(value) => Ok(f64::from(*value)),
            OscArgument::Int(value) => Ok(f64::from(*value)),
            _ => Err(self.unexpected("a double")),
        }
    }

    pub fn string(&mut self) -> Result<String, ResponseError> {
        let argument = self.next()?;
        argument
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.unexpected("a string"))
    }

    /// Control names may be sent as strings or as indices.
    pub fn control_name(&mut self) -> Result<String, ResponseError> {
        match self.next()? {
            OscArgument::String(name) => Ok(name.clone()),
            OscArgument::Int(index) => Ok(index.to_string()),
            _ => Err(self.unexpected("a control name or index")),
        }
    }

    pub fn control_value(&mut self) -> Result<ControlValue, ResponseError> {
        let argument = self.next()?;
        ControlValue::from_argument(argument).ok_or_else(|| self.unexpected("a control value"))
    }

    pub fn rest(&mut self) -> Vec<OscArgument> {
        let rest = self.arguments[self.index.min(self.arguments.len())..].to_vec();
        self.index = self.arguments.len();
        rest
    }

    /// Checks that the unread arguments split evenly into `arity`-tuples.
    pub fn expect_items(&self, arity: usize) -> Result<usize, ResponseError> {
        let count = self.remaining();
        if count % arity != 0 {
            return Err(ResponseError::MalformedItems {
                address: self.address.to_string(),
                arity,
                count,
            });
        }
        Ok(count / arity)
    }

    fn unexpected(&self, expected: &'static str) -> ResponseError {
        ResponseError::UnexpectedArgument {
            address: self.address.to_string(),
            index: self.index - 1,
            expected,
        }
    }
}
